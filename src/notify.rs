// src/notify.rs
//! Chart delivery to a Discord webhook.
//!
//! The endpoint comes from `DISCORD_WEBHOOK_URL`. Without it every delivery
//! fails with a configuration error; nothing panics.

use std::fs;
use std::path::Path;

use reqwest::blocking::{
    Client,
    multipart::{Form, Part},
};
use tracing::{debug, warn};

use crate::config::RunOptions;
use crate::config::consts::WEBHOOK_ENV;
use crate::core::net;
use crate::error::{ConfigError, NotifyError};

/// Discord rejects message content over this many characters.
pub const MAX_CAPTION_CHARS: usize = 2000;

pub trait Notifier {
    fn notify(&self, image: &Path, caption: &str) -> Result<(), NotifyError>;
}

pub struct DiscordWebhook {
    url: Option<String>,
    client: Client,
}

impl DiscordWebhook {
    pub fn new(opts: &RunOptions) -> Result<Self, NotifyError> {
        let client = net::client(opts.http_timeout).map_err(NotifyError::Http)?;
        Ok(Self { url: opts.webhook_url.clone(), client })
    }

    pub fn is_configured(&self) -> bool { self.url.is_some() }
}

impl Notifier for DiscordWebhook {
    fn notify(&self, image: &Path, caption: &str) -> Result<(), NotifyError> {
        let url = self
            .url
            .as_deref()
            .ok_or(ConfigError::MissingEndpoint { var: WEBHOOK_ENV })?;

        let bytes = fs::read(image)
            .map_err(|source| NotifyError::Attachment { path: image.to_path_buf(), source })?;
        let file_name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "chart.png".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/png")
            .map_err(NotifyError::Http)?;
        let form = Form::new()
            .text("content", clip_caption(caption))
            .part("file", part);

        let resp = self.client.post(url).multipart(form).send().map_err(|e| {
            if e.is_timeout() { NotifyError::Timeout } else { NotifyError::Http(e) }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_else(|_| "<unreadable body>".to_string());
            warn!(%status, body = %body, "webhook returned non-2xx status");
            return Err(NotifyError::Status { status: status.as_u16(), body });
        }

        debug!(%status, image = %image.display(), "chart delivered");
        Ok(())
    }
}

pub fn clip_caption(caption: &str) -> String {
    if caption.chars().count() <= MAX_CAPTION_CHARS {
        return caption.to_string();
    }
    let mut out: String = caption.chars().take(MAX_CAPTION_CHARS - 1).collect();
    out.push('…');
    out
}
