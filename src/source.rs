// src/source.rs

use reqwest::blocking::Client;

use crate::config::RunOptions;
use crate::core::net;
use crate::error::FetchError;

/// Where raw leaderboard text comes from.
pub trait Source {
    fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Live source over blocking HTTP.
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(opts: &RunOptions) -> Result<Self, FetchError> {
        let client = net::client(opts.http_timeout).map_err(FetchError::Client)?;
        Ok(Self { client })
    }
}

impl Source for HttpSource {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        net::http_get(&self.client, url)
    }
}
