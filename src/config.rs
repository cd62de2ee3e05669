// Process configuration - loaded once at startup, immutable afterwards.
//
// Everything comes from environment variables (a .env file is honored), with
// optional JSON files for the pattern set and notice templates. Any problem
// here is fatal: the bot must not start half-configured.

use crate::core::moderation::PatternSet;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_DATABASE_PATH: &str = "data/subguard.db";
const DEFAULT_MEMBERSHIP_TIMEOUT_SECS: u64 = 5;

/// Texts rendered by the Telegram layer. `{mention}` and `{channel}` are the
/// only placeholders.
#[derive(Debug, Clone, Deserialize)]
pub struct NoticeTemplates {
    pub warning: String,
    pub subscribe_button: String,
    pub recheck_button: String,
    pub still_unsubscribed: String,
    pub success: String,
    #[serde(default)]
    pub footer: Option<String>,
}

impl Default for NoticeTemplates {
    fn default() -> Self {
        Self {
            warning: "{mention}\n\nAds and media are not allowed in this group!\n\
                      Only subscribers of the channels below may post them:"
                .to_string(),
            subscribe_button: "Subscribe \u{2192} {channel}".to_string(),
            recheck_button: "I've subscribed".to_string(),
            still_unsubscribed: "You are not subscribed yet! Subscribe and press the button again."
                .to_string(),
            success: "Congratulations! You may now post freely.".to_string(),
            footer: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub required_channels: Vec<String>,
    pub database_path: String,
    pub membership_timeout: Duration,
    pub patterns: PatternSet,
    pub templates: NoticeTemplates,
}

impl Config {
    /// Read configuration from the environment. Call `dotenv::dotenv()`
    /// before this so a local .env file is picked up.
    pub fn from_env() -> Result<Self> {
        let bot_token = std::env::var("BOT_TOKEN")
            .context("Missing BOT_TOKEN environment variable")?;

        let channels_raw = std::env::var("REQUIRED_CHANNELS")
            .context("Missing REQUIRED_CHANNELS environment variable (comma-separated @handles)")?;
        let required_channels = parse_channels(&channels_raw)?;

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| DEFAULT_DATABASE_PATH.to_string());

        let membership_timeout = match std::env::var("MEMBERSHIP_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.parse::<u64>()
                    .context("MEMBERSHIP_TIMEOUT_SECS must be a positive integer")?,
            ),
            Err(_) => Duration::from_secs(DEFAULT_MEMBERSHIP_TIMEOUT_SECS),
        };

        let patterns = match std::env::var("PATTERNS_FILE") {
            Ok(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read pattern file at {path}"))?;
                PatternSet::from_json(&text)
                    .with_context(|| format!("Invalid pattern file at {path}"))?
            }
            Err(_) => PatternSet::default(),
        };

        let templates = match std::env::var("TEMPLATES_FILE") {
            Ok(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read template file at {path}"))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Invalid template file at {path}"))?
            }
            Err(_) => NoticeTemplates::default(),
        };

        Ok(Self {
            bot_token,
            required_channels,
            database_path,
            membership_timeout,
            patterns,
            templates,
        })
    }
}

/// Parse and validate the comma-separated channel list. Channels are public
/// @handles; the gate and the keyboard both rely on that form.
fn parse_channels(raw: &str) -> Result<Vec<String>> {
    let channels: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect();

    if channels.is_empty() {
        bail!("REQUIRED_CHANNELS must list at least one channel");
    }
    for channel in &channels {
        if !channel.starts_with('@') || channel.len() < 2 {
            bail!("channel {channel:?} must be a public @handle");
        }
    }
    Ok(channels)
}
