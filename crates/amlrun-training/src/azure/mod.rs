//! Azure Machine Learning REST adapter.

pub mod client;
pub mod models;

pub use client::{AzureMlClient, ACCESS_TOKEN_ENV, API_VERSION, ARM_ENDPOINT, DEFAULT_POLL_INTERVAL};
