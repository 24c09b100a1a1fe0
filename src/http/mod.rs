// HTTP plumbing shared by the backend client

pub mod client;


pub use client::RateLimitedHttpClient;
