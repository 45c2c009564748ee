//! Application-level configuration loading, including scoring knobs and the
//! organizer credential.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use rand::{Rng, distr::Alphanumeric};
use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "ESCAPE_HUNT_CONFIG_PATH";
/// Environment variable that overrides the configured organizer token.
const ADMIN_TOKEN_ENV: &str = "ADMIN_TOKEN";

/// Completions faster than this many seconds into a stage earn a time bonus.
const DEFAULT_BONUS_WINDOW_SECONDS: i64 = 300;
/// Divisor applied to the unused window seconds to compute the bonus.
const DEFAULT_BONUS_DIVISOR: i64 = 6;
/// Hint coins charged per first-time hint reveal.
const DEFAULT_HINT_COST: u32 = 1;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Token required on the `x-admin-token` header for organizer endpoints.
    pub admin_token: String,
    /// Width of the time-bonus window in seconds.
    pub time_bonus_window_seconds: i64,
    /// Divisor turning unused window seconds into bonus points.
    pub time_bonus_divisor: i64,
    /// Hint coins charged per reveal.
    pub hint_cost: u32,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in
    /// defaults. A missing organizer token is generated and logged so a dev
    /// instance is usable without any setup.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let raw = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded configuration file");
                    raw
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    RawConfig::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                RawConfig::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                RawConfig::default()
            }
        };

        let admin_token = env::var(ADMIN_TOKEN_ENV)
            .ok()
            .filter(|token| !token.is_empty())
            .or(raw.admin_token)
            .unwrap_or_else(|| {
                let token = generate_token();
                warn!(%token, "no organizer token configured; generated one for this run");
                token
            });

        Self {
            admin_token,
            time_bonus_window_seconds: raw
                .time_bonus_window_seconds
                .unwrap_or(DEFAULT_BONUS_WINDOW_SECONDS),
            time_bonus_divisor: raw.time_bonus_divisor.unwrap_or(DEFAULT_BONUS_DIVISOR),
            hint_cost: raw.hint_cost.unwrap_or(DEFAULT_HINT_COST),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            admin_token: generate_token(),
            time_bonus_window_seconds: DEFAULT_BONUS_WINDOW_SECONDS,
            time_bonus_divisor: DEFAULT_BONUS_DIVISOR,
            hint_cost: DEFAULT_HINT_COST,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    admin_token: Option<String>,
    time_bonus_window_seconds: Option<i64>,
    time_bonus_divisor: Option<i64>,
    hint_cost: Option<u32>,
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}
