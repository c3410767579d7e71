//! hCaptcha server-side verification.
//!
//! A front end collects the `h-captcha-response` token from the widget and
//! hands it to [`crate::export::export_verified`], which checks it here before
//! any Reddit request is made.

use crate::config::CaptchaConfig;
use crate::error::ExportError;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Body of the siteverify response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiteVerifyResponse {
    pub success: bool,
    #[serde(default, rename = "error-codes")]
    pub error_codes: Vec<String>,
    #[serde(default)]
    pub hostname: Option<String>,
}

impl SiteVerifyResponse {
    /// `Ok` when the token passed, `CaptchaRejected` otherwise.
    pub fn into_result(self) -> Result<(), ExportError> {
        if self.success {
            Ok(())
        } else {
            Err(ExportError::CaptchaRejected {
                codes: self.error_codes,
            })
        }
    }
}

/// Verifies captcha tokens against the configured endpoint.
pub struct CaptchaVerifier {
    http: reqwest::Client,
    config: CaptchaConfig,
}

impl CaptchaVerifier {
    pub fn new(config: CaptchaConfig, timeout_secs: u64) -> Result<Self, ExportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExportError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Check `token`, optionally binding it to the client's address.
    pub async fn verify(&self, token: &str, remote_ip: Option<&str>) -> Result<(), ExportError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ExportError::CaptchaRejected {
                codes: vec!["missing-input-response".into()],
            });
        }

        let mut form = vec![
            ("secret", self.config.secret_key.as_str()),
            ("response", token),
        ];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip));
        }

        let response = self
            .http
            .post(&self.config.verify_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| ExportError::CaptchaUnavailable {
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ExportError::CaptchaUnavailable {
                reason: format!("HTTP {}", response.status()),
            });
        }

        let body: SiteVerifyResponse =
            response
                .json()
                .await
                .map_err(|e| ExportError::CaptchaUnavailable {
                    reason: format!("unreadable response: {e}"),
                })?;

        if body.success {
            debug!("Captcha passed (host {:?})", body.hostname);
        } else {
            warn!("Captcha rejected: {:?}", body.error_codes);
        }
        body.into_result()
    }
}
