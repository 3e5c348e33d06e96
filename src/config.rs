use anyhow::{Context, Result};
use chrono::NaiveTime;
use huecal_core::{FilterRules, InProgressClamp, SchedulePolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Google OAuth credentials and account selection
    pub google: GoogleConfig,

    /// Which events count as meetings
    pub calendar: CalendarConfig,

    /// Hue bridge connection, room and scene names
    pub hue: HueConfig,

    /// Timing knobs for the emitted schedule
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// OAuth credentials for Google Calendar
#[derive(Debug, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Which authenticated account's tokens to use
    pub account: Option<String>,
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CalendarConfig {
    /// The calendar owner's email, as it appears in attendee lists
    pub user_account: String,

    /// Events created by these addresses never qualify
    #[serde(default)]
    pub blocked_creators: Vec<String>,

    /// Title keywords that let a single-attendee event qualify anyway
    #[serde(default = "default_keyword_exceptions")]
    pub keyword_exceptions: Vec<String>,

    /// How far back to look, to catch a meeting that started before now
    #[serde(default = "default_lookback_minutes")]
    pub lookback_minutes: i64,

    /// Cap on fetched events
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

#[derive(Debug, Deserialize)]
pub struct HueConfig {
    /// Bridge address, e.g. "192.168.178.66"
    pub host: String,
    /// Application key registered with the bridge
    pub app_key: String,
    /// Room (Hue group) to control
    pub group: String,
    pub scenes: SceneNames,
}

/// Names of the four scenes as configured on the bridge
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SceneNames {
    pub meeting: String,
    pub meeting_soon: String,
    pub meeting_later: String,
    pub chill: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub in_progress_clamp: InProgressClamp,
    /// "HH:MM" local time for the final lights-off
    pub lights_off_time: String,
    pub linger_minutes: i64,
    pub lead_minutes: i64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            in_progress_clamp: InProgressClamp::Now,
            lights_off_time: "22:00".to_string(),
            linger_minutes: 3,
            lead_minutes: 10,
        }
    }
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

fn default_keyword_exceptions() -> Vec<String> {
    vec!["Interview".to_string()]
}

fn default_lookback_minutes() -> i64 {
    200
}

fn default_max_results() -> usize {
    20
}

impl Config {
    pub fn filter_rules(&self) -> FilterRules {
        FilterRules {
            user_account: self.calendar.user_account.clone(),
            blocked_creators: self.calendar.blocked_creators.clone(),
            keyword_exceptions: self.calendar.keyword_exceptions.clone(),
        }
    }

    pub fn schedule_policy(&self) -> Result<SchedulePolicy> {
        let raw = &self.schedule.lights_off_time;
        let lights_off_time = NaiveTime::parse_from_str(raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .with_context(|| {
                format!("Invalid lights_off_time '{}'. Expected HH:MM", raw)
            })?;

        Ok(SchedulePolicy {
            in_progress_clamp: self.schedule.in_progress_clamp,
            lights_off_time,
            linger_minutes: self.schedule.linger_minutes,
            lead_minutes: self.schedule.lead_minutes,
        })
    }
}

/// Tokens storage: account email -> tokens
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Tokens {
    #[serde(default)]
    pub google: HashMap<String, AccountTokens>,
}

/// Tokens for a single authenticated account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountTokens {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Get the config directory path (~/.config/huecal)
pub fn config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Could not determine config directory")?
        .join("huecal");
    Ok(config_dir)
}

/// Get the config file path (~/.config/huecal/config.toml)
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Get the tokens file path (~/.config/huecal/tokens.json)
pub fn tokens_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("tokens.json"))
}

/// Load config from ~/.config/huecal/config.toml
pub fn load_config() -> Result<Config> {
    let path = config_path()?;

    if !path.exists() {
        anyhow::bail!(
            "Config file not found at {}\n\n\
            Create it with your Google OAuth credentials and Hue bridge details:\n\n\
            [google]\n\
            client_id = \"your-client-id.apps.googleusercontent.com\"\n\
            client_secret = \"your-client-secret\"\n\n\
            [calendar]\n\
            user_account = \"you@example.com\"\n\n\
            [hue]\n\
            host = \"192.168.1.2\"\n\
            app_key = \"your-bridge-app-key\"\n\
            group = \"Office\"\n\n\
            [hue.scenes]\n\
            meeting = \"Meeting\"\n\
            meeting_soon = \"MeetingSoon\"\n\
            meeting_later = \"MeetingLater\"\n\
            chill = \"Chill\"",
            path.display()
        );
    }

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;

    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

    Ok(config)
}

/// Load tokens from ~/.config/huecal/tokens.json
pub fn load_tokens() -> Result<Tokens> {
    let path = tokens_path()?;

    if !path.exists() {
        return Ok(Tokens::default());
    }

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read tokens file at {}", path.display()))?;

    let tokens: Tokens = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse tokens file at {}", path.display()))?;

    Ok(tokens)
}

/// Save tokens to ~/.config/huecal/tokens.json
pub fn save_tokens(tokens: &Tokens) -> Result<()> {
    let path = tokens_path()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory at {}", parent.display()))?;
    }

    let contents = serde_json::to_string_pretty(tokens).context("Failed to serialize tokens")?;

    std::fs::write(&path, contents)
        .with_context(|| format!("Failed to write tokens file at {}", path.display()))?;

    Ok(())
}
