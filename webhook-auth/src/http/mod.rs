//! HTTP client building for certificate retrieval.

mod client;

pub use client::{ClientBuilder, HttpClientConfig};
