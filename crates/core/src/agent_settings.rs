//! Agent Configuration Message
//!
//! The voice agent must receive a `SettingsConfiguration` message as the very
//! first frame on its socket. It pins both audio directions to the telephony
//! provider's narrowband format and carries the free-text instructions the
//! agent should follow for the call.

use serde::{Deserialize, Serialize};

/// Sample rate of the telephony leg, in Hz.
pub const TELEPHONY_SAMPLE_RATE: u32 = 8000;
/// Milliseconds of synthesized audio the agent buffers per binary frame.
pub const OUTPUT_BUFFER_SIZE: u32 = 250;

/// Substituted when the instructions could not be fetched.
pub const FALLBACK_INSTRUCTIONS: &str = "The instructions couldn't be found. Please let the user know that this is the case, and end your conversation afterwards";

/// The instruction text for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instructions {
    Fetched(String),
    Fallback,
}

impl Instructions {
    /// Resolves a fetch outcome, degrading to the fallback on any failure.
    pub fn from_fetch<E: std::fmt::Display>(result: Result<String, E>) -> Self {
        match result {
            Ok(text) => Self::Fetched(text),
            Err(e) => {
                tracing::warn!(error = %e, "Instructions unavailable, using fallback text");
                Self::Fallback
            }
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Fetched(text) => text,
            Self::Fallback => FALLBACK_INSTRUCTIONS,
        }
    }
}

/// Model choices for the three stages of the agent pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentProfile {
    pub listen_model: String,
    pub think_provider: String,
    pub think_model: String,
    pub speak_model: String,
}

impl Default for AgentProfile {
    fn default() -> Self {
        Self {
            listen_model: "nova-2".to_string(),
            think_provider: "open_ai".to_string(),
            think_model: "gpt-4o".to_string(),
            speak_model: "aura-asteria-en".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioEncoding {
    Mulaw,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioInput {
    pub encoding: AudioEncoding,
    pub sample_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioOutput {
    pub encoding: AudioEncoding,
    pub sample_rate: u32,
    pub container: String,
    pub buffer_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSettings {
    pub input: AudioInput,
    pub output: AudioOutput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listen {
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Think {
    pub provider: String,
    pub model: String,
    pub instructions: String,
    pub functions: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speak {
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPipeline {
    pub listen: Listen,
    pub think: Think,
    pub speak: Speak,
}

/// The `SettingsConfiguration` message sent when the agent socket opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(rename = "type")]
    pub kind: String,
    pub audio: AudioSettings,
    pub agent: AgentPipeline,
}

impl AgentSettings {
    pub fn new(profile: &AgentProfile, instructions: &Instructions) -> Self {
        Self {
            kind: "SettingsConfiguration".to_string(),
            audio: AudioSettings {
                input: AudioInput {
                    encoding: AudioEncoding::Mulaw,
                    sample_rate: TELEPHONY_SAMPLE_RATE,
                },
                output: AudioOutput {
                    encoding: AudioEncoding::Mulaw,
                    sample_rate: TELEPHONY_SAMPLE_RATE,
                    container: "none".to_string(),
                    buffer_size: OUTPUT_BUFFER_SIZE,
                },
            },
            agent: AgentPipeline {
                listen: Listen {
                    model: profile.listen_model.clone(),
                },
                think: Think {
                    provider: profile.think_provider.clone(),
                    model: profile.think_model.clone(),
                    instructions: instructions.text().to_string(),
                    functions: Vec::new(),
                },
                speak: Speak {
                    model: profile.speak_model.clone(),
                },
            },
        }
    }

    pub fn instructions(&self) -> &str {
        &self.agent.think.instructions
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_to_the_agent_wire_shape() {
        let settings = AgentSettings::new(
            &AgentProfile::default(),
            &Instructions::Fetched("Be brief.".to_string()),
        );
        let value: serde_json::Value = serde_json::from_str(&settings.to_json().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "type": "SettingsConfiguration",
                "audio": {
                    "input": { "encoding": "mulaw", "sample_rate": 8000 },
                    "output": {
                        "encoding": "mulaw",
                        "sample_rate": 8000,
                        "container": "none",
                        "buffer_size": 250
                    }
                },
                "agent": {
                    "listen": { "model": "nova-2" },
                    "think": {
                        "provider": "open_ai",
                        "model": "gpt-4o",
                        "instructions": "Be brief.",
                        "functions": []
                    },
                    "speak": { "model": "aura-asteria-en" }
                }
            })
        );
    }

    #[test]
    fn failed_fetch_uses_fallback_verbatim() {
        let instructions = Instructions::from_fetch::<&str>(Err("HTTP 404"));
        assert_eq!(instructions, Instructions::Fallback);

        let settings = AgentSettings::new(&AgentProfile::default(), &instructions);
        assert_eq!(settings.instructions(), FALLBACK_INSTRUCTIONS);
    }

    #[test]
    fn profile_overrides_models() {
        let profile = AgentProfile {
            listen_model: "nova-3".to_string(),
            think_provider: "groq".to_string(),
            think_model: "llama-3.1-8b".to_string(),
            speak_model: "aura-luna-en".to_string(),
        };
        let settings = AgentSettings::new(&profile, &Instructions::Fallback);
        assert_eq!(settings.agent.listen.model, "nova-3");
        assert_eq!(settings.agent.think.provider, "groq");
        assert_eq!(settings.agent.speak.model, "aura-luna-en");
    }
}
