// src/config.rs
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_DAILY_LIMIT: u32 = 3;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Strings stamped onto outputs and used for download names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branding {
    pub watermark: String,
    pub frame_title: String,
    pub frame_subtitle: String,
    pub file_prefix: String,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            watermark: "[ THEMEBOOTH ]".to_string(),
            frame_title: "Made with Gemini".to_string(),
            frame_subtitle: "Themebooth".to_string(),
            file_prefix: "themebooth".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles after each further one.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given 1-based attempt fails.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.initial_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

#[derive(Debug, Clone)]
pub struct BoothConfig {
    pub api_key: String,
    pub api_base: String,
    pub image_model: String,
    pub text_model: String,
    pub request_timeout: Duration,
    pub daily_limit: u32,
    pub quota_file: PathBuf,
    pub redis_url: Option<String>,
    pub font: Option<PathBuf>,
    pub out_dir: PathBuf,
    pub branding: Branding,
    pub retry: RetryPolicy,
}

impl Default for BoothConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            daily_limit: DEFAULT_DAILY_LIMIT,
            quota_file: PathBuf::from(".themebooth-quota.json"),
            redis_url: None,
            font: None,
            out_dir: PathBuf::from("out"),
            branding: Branding::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Initialises `env_logger`. `RUST_LOG` still wins over the default filter.
pub fn setup_logging(debug: bool) {
    let default_filter = if debug {
        "themebooth=debug,info"
    } else {
        "info"
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::new().default_filter_or(default_filter))
        .format_timestamp_millis()
        .try_init();
}
