// src/core/net.rs

// Blocking HTTP with an explicit timeout. A timeout is reported as its own
// error so callers can tell a slow source from a broken one.

use std::time::Duration;

use reqwest::blocking::Client;

use crate::config::consts::USER_AGENT;
use crate::error::FetchError;

pub fn client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

pub fn http_get(client: &Client, url: &str) -> Result<String, FetchError> {
    let wrap = |e: reqwest::Error| {
        if e.is_timeout() {
            FetchError::Timeout { url: url.to_string() }
        } else {
            FetchError::Http { url: url.to_string(), source: e }
        }
    };

    let resp = client.get(url).send().map_err(wrap)?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status { url: url.to_string(), status: status.as_u16() });
    }
    resp.text().map_err(wrap)
}
