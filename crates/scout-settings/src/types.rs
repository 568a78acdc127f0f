use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutSettings {
    pub endpoint: EndpointSettings,
    pub session: SessionSettings,
    pub logging: LoggingSettings,
}

/// Where turns are streamed from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EndpointSettings {
    /// Base URL of the backend, without the stream path.
    pub base_url: String,
    /// Path segment under the base URL that serves the event stream.
    pub stream_path: String,
    pub connect_timeout_ms: u64,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            stream_path: "chat_stream".to_string(),
            connect_timeout_ms: 30_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Assistant greeting seeded as the first message. Empty disables it.
    pub greeting: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            greeting: "Hi there, how can I help you?".to_string(),
        }
    }
}

impl SessionSettings {
    pub fn greeting(&self) -> Option<&str> {
        let trimmed = self.greeting.trim();
        (!trimmed.is_empty()).then_some(self.greeting.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
