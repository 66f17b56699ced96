use callbridge_core::{agent_settings::AgentProfile, chunker::DEFAULT_CHUNK_LEN};
use secrecy::SecretString;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_AGENT_URL: &str = "wss://sts.sandbox.deepgram.com/agent";
pub const DEFAULT_TWILIO_API_BASE: &str = "https://api.twilio.com";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Credentials and endpoint for the telephony REST API.
#[derive(Debug)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    pub from_number: String,
    pub api_base: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    /// Public host name the telephony provider reaches us on.
    pub public_host: String,
    pub instructions_url: Option<String>,
    pub test_secret: Option<String>,
    pub deepgram_api_key: SecretString,
    pub agent_url: String,
    pub agent_profile: AgentProfile,
    pub twilio: TwilioConfig,
    pub target_phone_number: String,
    pub chunk_len: NonZeroUsize,
    pub teardown_grace: Duration,
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn or_default(name: &str, default: &str) -> String {
    optional(name).unwrap_or_else(|| default.to_string())
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str = or_default("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let log_level_str = or_default("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let public_host = optional("PUBLIC_HOST")
            .or_else(|| optional("WORKER_HOST"))
            .ok_or_else(|| ConfigError::MissingVar("PUBLIC_HOST".to_string()))?;

        let default_profile = AgentProfile::default();
        let agent_profile = AgentProfile {
            listen_model: or_default("AGENT_LISTEN_MODEL", &default_profile.listen_model),
            think_provider: or_default("AGENT_THINK_PROVIDER", &default_profile.think_provider),
            think_model: or_default("AGENT_THINK_MODEL", &default_profile.think_model),
            speak_model: or_default("AGENT_SPEAK_MODEL", &default_profile.speak_model),
        };

        let twilio = TwilioConfig {
            account_sid: required("TWILIO_ACCOUNT_SID")?,
            auth_token: SecretString::from(required("TWILIO_AUTH_TOKEN")?),
            from_number: required("TWILIO_FROM_NUMBER")?,
            api_base: or_default("TWILIO_API_BASE", DEFAULT_TWILIO_API_BASE),
        };

        let chunk_len = match optional("AUDIO_CHUNK_BYTES") {
            Some(raw) => raw
                .parse::<NonZeroUsize>()
                .map_err(|e| ConfigError::InvalidValue("AUDIO_CHUNK_BYTES".to_string(), e.to_string()))?,
            None => NonZeroUsize::new(DEFAULT_CHUNK_LEN)
                .ok_or_else(|| ConfigError::InvalidValue("AUDIO_CHUNK_BYTES".to_string(), "0".to_string()))?,
        };

        let teardown_grace = match optional("TEARDOWN_GRACE_MS") {
            Some(raw) => Duration::from_millis(raw.parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue("TEARDOWN_GRACE_MS".to_string(), e.to_string())
            })?),
            None => Duration::from_secs(2),
        };

        Ok(Self {
            bind_address,
            log_level,
            public_host,
            instructions_url: optional("INSTRUCTIONS_URL"),
            test_secret: optional("TEST_SECRET"),
            deepgram_api_key: SecretString::from(required("DEEPGRAM_API_KEY")?),
            agent_url: or_default("AGENT_URL", DEFAULT_AGENT_URL),
            agent_profile,
            twilio,
            target_phone_number: required("TARGET_PHONE_NUMBER")?,
            chunk_len,
            teardown_grace,
        })
    }

    /// The media-stream URL handed to the telephony provider.
    pub fn stream_url(&self) -> String {
        format!("wss://{}/media-stream", self.public_host)
    }
}
