// ABOUTME: Configuration module for the hero-panel application
// ABOUTME: Provides configuration settings and environment variable handling

use crate::panel::PanelConfig;
use crate::render::RenderOptions;
use std::env;
use std::str::FromStr;

pub const DEFAULT_INTERVAL_MS: i64 = 6000;
pub const DEFAULT_PRELOAD_DELAY_MS: u64 = 100;
pub const DEFAULT_FADE_MS: u64 = 1000;
pub const DEFAULT_LOAD_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_BREVO_API_URL: &str = "https://api.brevo.com/v3/smtp/email";
pub const DEFAULT_SENDER_NAME: &str = "Progreso Consultants";
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Settings for the contact-form relay
#[derive(Debug, Clone, PartialEq)]
pub struct ContactConfig {
    pub brevo_api_key: Option<String>,
    pub brevo_sender_email: Option<String>,
    pub brevo_sender_name: String,
    pub brevo_api_url: String,
    pub contact_email: Option<String>,
    pub smtp_host: String,
    /// 465 means implicit TLS; any other port upgrades with STARTTLS
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    /// Include delivery error details in failed responses
    pub expose_errors: bool,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            brevo_api_key: None,
            brevo_sender_email: None,
            brevo_sender_name: DEFAULT_SENDER_NAME.to_string(),
            brevo_api_url: DEFAULT_BREVO_API_URL.to_string(),
            contact_email: None,
            smtp_host: DEFAULT_SMTP_HOST.to_string(),
            smtp_port: DEFAULT_SMTP_PORT,
            smtp_user: None,
            smtp_password: None,
            expose_errors: false,
        }
    }
}

impl ContactConfig {
    /// True when every setting the HTTP relay needs is present
    pub fn is_complete(&self) -> bool {
        self.brevo_api_key.is_some() && self.brevo_sender_email.is_some() && self.contact_email.is_some()
    }

    /// True when every setting the SMTP relay needs is present
    pub fn has_smtp(&self) -> bool {
        self.smtp_user.is_some() && self.smtp_password.is_some() && self.contact_email.is_some()
    }
}

/// Global configuration for the application
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub auto_play_interval_ms: i64,
    pub preload_delay_ms: u64,
    pub fade_duration_ms: u64,
    pub load_timeout_ms: u64,
    pub image_pattern: String,
    pub poll_interval_ms: u64,
    pub port: u16,
    pub debounce_ms: u64,
    pub contact: ContactConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_play_interval_ms: DEFAULT_INTERVAL_MS,
            preload_delay_ms: DEFAULT_PRELOAD_DELAY_MS,
            fade_duration_ms: DEFAULT_FADE_MS,
            load_timeout_ms: DEFAULT_LOAD_TIMEOUT_MS,
            image_pattern: "*".to_string(),
            poll_interval_ms: 500,
            port: 8080,
            debounce_ms: 500,
            contact: ContactConfig::default(),
        }
    }
}

impl Config {
    /// Create a new configuration instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup, falling back to defaults
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        let contact = ContactConfig {
            brevo_api_key: parsed("BREVO_API_KEY"),
            brevo_sender_email: parsed("BREVO_SENDER_EMAIL"),
            brevo_sender_name: parsed("BREVO_SENDER_NAME")
                .unwrap_or(defaults.contact.brevo_sender_name),
            brevo_api_url: parsed("BREVO_API_URL").unwrap_or(defaults.contact.brevo_api_url),
            contact_email: parsed("CONTACT_EMAIL"),
            smtp_host: parsed("SMTP_HOST").unwrap_or(defaults.contact.smtp_host),
            smtp_port: parse_or(&lookup, "SMTP_PORT", defaults.contact.smtp_port),
            smtp_user: parsed("SMTP_USER"),
            smtp_password: parsed("SMTP_PASSWORD"),
            expose_errors: parsed("CONTACT_EXPOSE_ERRORS")
                .map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        };

        Self {
            auto_play_interval_ms: parse_or(&lookup, "HERO_INTERVAL_MS", defaults.auto_play_interval_ms),
            preload_delay_ms: parse_or(&lookup, "HERO_PRELOAD_DELAY_MS", defaults.preload_delay_ms),
            fade_duration_ms: parse_or(&lookup, "HERO_FADE_MS", defaults.fade_duration_ms),
            load_timeout_ms: parse_or(&lookup, "HERO_LOAD_TIMEOUT_MS", defaults.load_timeout_ms),
            image_pattern: parsed("HERO_IMAGE_PATTERN").unwrap_or(defaults.image_pattern),
            poll_interval_ms: parse_or(&lookup, "HERO_POLL_MS", defaults.poll_interval_ms),
            port: parse_or(&lookup, "PORT", defaults.port),
            debounce_ms: parse_or(&lookup, "HERO_DEBOUNCE_MS", defaults.debounce_ms),
            contact,
        }
    }

    /// Get a panel configuration, optionally overriding the rotation interval
    pub fn get_panel_config(&self, interval_ms: Option<i64>) -> PanelConfig {
        PanelConfig {
            auto_play_interval_ms: interval_ms.unwrap_or(self.auto_play_interval_ms),
            preload_delay_ms: self.preload_delay_ms,
        }
    }

    /// Get render options matching this configuration
    pub fn get_render_options(&self) -> RenderOptions {
        RenderOptions {
            fade_duration_ms: self.fade_duration_ms,
            ..RenderOptions::default()
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}
