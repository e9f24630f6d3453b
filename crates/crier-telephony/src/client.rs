//! HTTP client for the telephony provider's REST API.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::types::{ApiErrorBody, CallResource, ProviderStatus};

/// Client for the telephony provider.
///
/// Status fetches retry transient failures; call placement is issued exactly
/// once, since a retried placement that actually went through would ring the
/// recipient twice.
pub struct VoiceClient {
    http: Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    caller_number: String,
}

impl VoiceClient {
    /// Create a new client for the given API base URL and account.
    pub fn new(
        base_url: impl Into<String>,
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        caller_number: impl Into<String>,
    ) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: base_url.into(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            caller_number: caller_number.into(),
        }
    }

    /// The API base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Place an outbound call that plays the given audio, returning the
    /// provider's opaque call handle.
    pub async fn place_call(&self, to: &str, media_url: &str) -> Result<String, ProviderError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.base_url, self.account_sid
        );

        let twiml = format!("<Response><Play>{}</Play></Response>", media_url);
        let params = [
            ("To", to),
            ("From", self.caller_number.as_str()),
            ("Twiml", twiml.as_str()),
        ];

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await?;

        let call: CallResource = self.handle_response(response, None).await?;
        debug!(to, sid = %call.sid, "placed call");
        Ok(call.sid)
    }

    /// Fetch the current status of a previously placed call.
    pub async fn fetch_status(&self, call_id: &str) -> Result<ProviderStatus, ProviderError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Calls/{}.json",
            self.base_url, self.account_sid, call_id
        );

        // Retry up to 3 times: initial + 2 retries with backoff
        let mut last_error = None;
        for attempt in 0..3 {
            let response = match self
                .http
                .get(&url)
                .basic_auth(&self.account_sid, Some(&self.auth_token))
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < 2 => {
                    let backoff_ms = 500 * (1 << attempt); // 500ms, 1s
                    warn!(attempt = attempt + 1, backoff_ms, error = %e, "transport error, retrying status fetch");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    last_error = Some(ProviderError::Http(e));
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let result = self.handle_response::<CallResource>(response, Some(call_id)).await;

            match result {
                Ok(call) => {
                    let status = ProviderStatus::parse(&call.status);
                    debug!(call_id, status = %status, "fetched call status");
                    return Ok(status);
                }
                Err(ref e) if Self::is_transient(e) && attempt < 2 => {
                    let backoff_ms = 500 * (1 << attempt); // 500ms, 1s
                    warn!(attempt = attempt + 1, backoff_ms, error = %e, "transient error, retrying status fetch");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    last_error = Some(result.unwrap_err());
                    continue;
                }
                Err(_) => return Err(result.unwrap_err()),
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::InvalidResponse("retry exhausted".into())))
    }

    /// Check if an error is transient and worth retrying.
    fn is_transient(err: &ProviderError) -> bool {
        matches!(err, ProviderError::Api { status, .. } if *status >= 500)
    }

    /// Handle HTTP response and parse JSON.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
        call_id: Option<&str>,
    ) -> Result<T, ProviderError> {
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND
            && let Some(call_id) = call_id
        {
            return Err(ProviderError::CallNotFound {
                call_id: call_id.to_string(),
            });
        }

        if !status.is_success() {
            let text = response.text().await.map_err(|e| {
                ProviderError::InvalidResponse(format!(
                    "request failed ({}): failed to read response: {}",
                    status, e
                ))
            })?;

            if let Ok(body) = serde_json::from_str::<ApiErrorBody>(&text) {
                let message = match body.code {
                    Some(code) => format!("{} (code {})", body.message, code),
                    None => body.message,
                };
                return Err(ProviderError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let body = response.json().await?;
        Ok(body)
    }
}
