use std::path::PathBuf;

use clap::Parser;
use scout_settings::ScoutSettings;

/// Interactive research assistant client.
///
/// Reads one question per line from stdin and streams the answer back.
/// `/debug` raises client logging to debug; `/quit` exits.
#[derive(Parser, Debug, Clone, Default)]
#[command(version)]
pub struct Cli {
    /// Backend base URL (overrides settings and SCOUT_API_URL).
    #[arg(long = "api-url", value_name = "URL")]
    pub api_url: Option<String>,

    /// Settings file to load instead of ~/.scout/settings.json.
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long = "json-logs", default_value_t = false)]
    pub json_logs: bool,

    /// Base log level (trace, debug, info, warn, error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Flags win over every settings layer.
    pub fn apply(&self, settings: &mut ScoutSettings) {
        if let Some(url) = &self.api_url {
            settings.endpoint.base_url = url.clone();
        }
        if let Some(level) = &self.log_level {
            settings.logging.level = level.clone();
        }
        if self.json_logs {
            settings.logging.json = true;
        }
    }
}
