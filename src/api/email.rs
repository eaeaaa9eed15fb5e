use anyhow::Context;
use base64::Engine;
use reqwest::Client;
use serde::Serialize;

use crate::core::{app_error::AppError, config::MailConfig};

/// Adapter for the transactional email provider (JSON REST API).
#[derive(Clone)]
pub struct MailerClient {
    http: Client,
    api_url: String,
    api_key: String,
    from_address: String,
}

#[derive(Serialize, Debug)]
pub struct Attachment {
    pub filename: String,
    /// Base64-encoded file content, as the provider expects.
    pub content: String,
}

impl Attachment {
    pub fn from_bytes(filename: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            filename: filename.into(),
            content: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

#[derive(Serialize, Debug)]
struct SendReq<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<Attachment>,
}

impl MailerClient {
    pub fn new(http: Client, config: &MailConfig) -> Self {
        Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            from_address: config.from_address.clone(),
        }
    }

    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        attachments: Vec<Attachment>,
    ) -> Result<(), AppError> {
        let _res = self
            .http
            .post(format!("{}/emails", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&SendReq {
                from: &self.from_address,
                to,
                subject,
                html,
                attachments,
            })
            .send()
            .await
            .map_err(|_| AppError::ServiceUnreachable("MailProvider".into()))?
            .error_for_status()
            .context("Email send rejected")?;

        Ok(())
    }
}
