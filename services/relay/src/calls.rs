//! Places outbound calls whose audio is streamed back to the relay.

use crate::{config::TwilioConfig, error::RelayError};
use async_trait::async_trait;
use callbridge_core::phone::PhoneNumber;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Name given to the media stream in the TwiML document.
pub const STREAM_NAME: &str = "LiveAudioStream123";

/// Parameters for one outbound call with a media stream attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamCallRequest {
    pub to: PhoneNumber,
    pub from: String,
    pub stream_url: String,
}

/// Structured result returned to the HTTP caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallOutcome {
    pub is_successful: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_sid: Option<String>,
}

impl CallOutcome {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            is_successful: false,
            message: message.into(),
            call_sid: None,
        }
    }
}

/// Creates calls against the telephony provider's REST API.
#[async_trait]
pub trait CallInitiator: Send + Sync {
    /// Returns the provider's call identifier.
    async fn create_stream_call(&self, request: &StreamCallRequest) -> Result<String, RelayError>;
}

/// Validates the target and places the call, folding every failure into a
/// [`CallOutcome`].
pub async fn place_stream_call(
    initiator: &dyn CallInitiator,
    target: &str,
    from: &str,
    stream_url: &str,
) -> CallOutcome {
    let to = match target.parse::<PhoneNumber>() {
        Ok(number) => number,
        Err(e) => {
            info!(error = %e, "Rejected target phone number");
            return CallOutcome::failure(RelayError::from(e).to_string());
        }
    };

    let request = StreamCallRequest {
        to,
        from: from.to_string(),
        stream_url: stream_url.to_string(),
    };
    match initiator.create_stream_call(&request).await {
        Ok(call_sid) => {
            info!(%call_sid, to = %request.to, "Call initiated with audio stream");
            CallOutcome {
                is_successful: true,
                message: "Call initiated with audio stream".to_string(),
                call_sid: Some(call_sid),
            }
        }
        Err(e) => {
            error!(error = %e, "Call creation failed");
            CallOutcome::failure(e.to_string())
        }
    }
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Builds the TwiML document connecting the call to our media stream.
pub fn stream_twiml(stream_url: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Response><Connect><Stream url="{}" name="{}"/></Connect></Response>"#,
        escape_attribute(stream_url),
        STREAM_NAME
    )
}

#[derive(Deserialize)]
struct CallResource {
    sid: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// [`CallInitiator`] backed by the Twilio REST API.
pub struct TwilioCalls {
    client: reqwest::Client,
    api_base: String,
    account_sid: String,
    auth_token: SecretString,
}

impl TwilioCalls {
    pub fn new(client: reqwest::Client, config: &TwilioConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            account_sid: config.account_sid.clone(),
            auth_token: SecretString::from(config.auth_token.expose_secret().to_string()),
        }
    }

    fn calls_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.api_base, self.account_sid
        )
    }
}

#[async_trait]
impl CallInitiator for TwilioCalls {
    async fn create_stream_call(&self, request: &StreamCallRequest) -> Result<String, RelayError> {
        let twiml = stream_twiml(&request.stream_url);
        let to = request.to.e164();
        let form = [
            ("To", to.as_str()),
            ("From", request.from.as_str()),
            ("Twiml", twiml.as_str()),
            ("Record", "false"),
            ("MachineDetection", "Enable"),
        ];

        let response = self
            .client
            .post(self.calls_url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&form)
            .send()
            .await
            .map_err(|e| RelayError::CallCreationFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| format!("Failed to initiate call (HTTP {})", status));
            return Err(RelayError::CallCreationFailure(message));
        }

        let call = response
            .json::<CallResource>()
            .await
            .map_err(|e| RelayError::CallCreationFailure(e.to_string()))?;
        Ok(call.sid)
    }
}
