use crate::config::Target;
use anyhow::{Context, Result};
use reqwest::Client;

/// The controller authenticates with a session cookie, so the store is required.
pub fn build(target: &Target) -> Result<Client> {
    Client::builder()
        .timeout(target.timeout())
        .cookie_store(true)
        .danger_accept_invalid_certs(target.insecure())
        .build()
        .context("http client build failed")
}
