use serde::Deserialize;
use std::{fmt, fs, str::FromStr};

use anyhow::{anyhow, bail, Context};
use time::{macros::format_description, Date};

use crate::sources::DateWindow;

#[derive(Debug, Clone, Deserialize)]
pub struct DateRangeConfig {
    /// Inclusive start, `YYYY-MM-DD`.
    pub start: String,
    /// Exclusive end, `YYYY-MM-DD`.
    pub end: String,
    #[serde(default = "default_window_months")]
    pub window_months: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UkpnConfig {
    #[serde(default = "default_ukpn_base_url")]
    pub base_url: String,
    #[serde(default = "default_ukpn_dataset")]
    pub dataset_id: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_max_offset")]
    pub max_offset: usize,
    pub output_path: String,
    pub date_range: Option<DateRangeConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GopacsConfig {
    #[serde(default = "default_gopacs_base_url")]
    pub base_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    pub output_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartsConfig {
    #[serde(default = "default_chart_dir")]
    pub output_dir: String,
    #[serde(default = "default_chart_width")]
    pub width: u32,
    #[serde(default = "default_chart_height")]
    pub height: u32,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_chart_dir(),
            width: default_chart_width(),
            height: default_chart_height(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Prometheus exposition is written here when a run finishes.
    pub textfile_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub ukpn: Option<UkpnConfig>,
    pub gopacs: Option<GopacsConfig>,
    #[serde(default)]
    pub charts: ChartsConfig,
    pub metrics: Option<MetricsConfig>,
}

const MAX_WINDOW_MONTHS: u32 = 1200;

fn default_window_months() -> u32 {
    6
}

fn default_ukpn_base_url() -> String {
    "https://ukpowernetworks.opendatasoft.com/api/v2/catalog/datasets".to_string()
}

fn default_ukpn_dataset() -> String {
    "ukpn-flexibility-dispatches".to_string()
}

fn default_api_key_env() -> String {
    "UKPN_API_KEY".to_string()
}

fn default_gopacs_base_url() -> String {
    "https://public-reporting.gopacs-services.eu/clearedbuckets".to_string()
}

fn default_page_size() -> usize {
    100
}

fn default_request_delay_ms() -> u64 {
    500
}

fn default_max_offset() -> usize {
    10_000
}

fn default_chart_dir() -> String {
    "charts".to_string()
}

fn default_chart_width() -> u32 {
    1200
}

fn default_chart_height() -> u32 {
    700
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("FLEXMARKET_CONFIG").unwrap_or_else(|_| "flexmarket-config.toml".to_string());
        let contents = fs::read_to_string(&path).with_context(|| format!("reading config {path}"))?;
        Self::from_toml_str(&contents).with_context(|| format!("loading config {path}"))
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if let Some(ukpn) = &self.ukpn {
            if ukpn.page_size == 0 {
                bail!("ukpn.page_size must be positive");
            }
            if ukpn.page_size > ukpn.max_offset {
                bail!(
                    "ukpn.page_size ({}) exceeds ukpn.max_offset ({})",
                    ukpn.page_size,
                    ukpn.max_offset
                );
            }
            ukpn.windows()?;
        }
        if let Some(gopacs) = &self.gopacs {
            if gopacs.page_size == 0 {
                bail!("gopacs.page_size must be positive");
            }
        }
        Ok(())
    }
}

fn parse_date(raw: &str, field: &str) -> anyhow::Result<Date> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|e| anyhow!("invalid {field} '{raw}': {e}"))
}

impl UkpnConfig {
    /// The API key, read from the configured environment variable. Absent or
    /// empty means unauthenticated requests.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    /// Date windows to page through; empty when no range is configured.
    pub fn windows(&self) -> anyhow::Result<Vec<DateWindow>> {
        let Some(range) = &self.date_range else {
            return Ok(Vec::new());
        };
        let start = parse_date(&range.start, "ukpn.date_range.start")?;
        let end = parse_date(&range.end, "ukpn.date_range.end")?;
        if start >= end {
            bail!("ukpn.date_range is empty: {start} is not before {end}");
        }
        if range.window_months == 0 || range.window_months > MAX_WINDOW_MONTHS {
            bail!(
                "ukpn.date_range.window_months must be between 1 and {MAX_WINDOW_MONTHS}, got {}",
                range.window_months
            );
        }
        Ok(DateWindow::split(start, end, range.window_months))
    }
}

/// Which flattened table a command operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Ukpn,
    Gopacs,
}

impl FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ukpn" => Ok(Self::Ukpn),
            "gopacs" => Ok(Self::Gopacs),
            other => Err(anyhow!("unknown source '{other}', expected 'ukpn' or 'gopacs'")),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ukpn => "ukpn",
            Self::Gopacs => "gopacs",
        })
    }
}
