use std::env;
use std::sync::Arc;
use tera::Tera;

use crate::controller::ViewController;
use crate::error::Result;
use crate::fetcher::StatsSource;
use crate::format::{compact_filter, delta_filter, script_json_filter};

/// Application configuration from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the HTTP server to.
    pub bind_address: String,
    /// Cron expression for the scheduled country list / snapshot refresh.
    pub refresh_cron: String,
    /// Upstream API root, without trailing slash.
    pub api_base_url: String,
    /// Static credential sent on every upstream request, if set.
    pub api_key: Option<String>,
    /// Header carrying `api_key`.
    pub api_key_header: String,
    pub request_timeout_secs: u64,
    pub template_glob: String,
    pub static_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Creates Config from environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset or unparsable values fall
    /// back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.into());
        Self {
            bind_address: get("BIND_ADDRESS", "0.0.0.0:8201"),
            refresh_cron: get("REFRESH_CRON", "0 */30 * * * *"),
            api_base_url: get("COVID_API_BASE_URL", "https://disease.sh"),
            api_key: lookup("COVID_API_KEY").filter(|k| !k.is_empty()),
            api_key_header: get("COVID_API_KEY_HEADER", "X-RapidAPI-Key"),
            request_timeout_secs: lookup("REQUEST_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            template_glob: get("TEMPLATE_GLOB", "templates/**/*.html"),
            static_dir: get("STATIC_DIR", "static"),
        }
    }
}

/// Loads the templates and registers the number formatting and script-safe
/// JSON filters.
pub fn build_tera(glob: &str) -> Result<Tera> {
    let mut tera = Tera::new(glob)?;
    tera.register_filter("delta", delta_filter);
    tera.register_filter("compact", compact_filter);
    tera.register_filter("script_json", script_json_filter);
    Ok(tera)
}

/// Shared application state passed to all request handlers.
pub struct AppState<S: StatsSource> {
    /// Template engine for rendering HTML pages.
    pub tera: Tera,
    /// Owner of everything the dashboard displays.
    pub controller: Arc<ViewController<S>>,
}

impl<S: StatsSource> AppState<S> {
    pub fn new(tera: Tera, controller: Arc<ViewController<S>>) -> Self {
        Self { tera, controller }
    }
}
