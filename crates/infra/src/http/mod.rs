//! HTTP transport shared by the marketplace and token clients

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
