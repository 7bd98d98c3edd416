// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use roastery_app::Millis;
use roastery_app::binding::WidgetDefaults;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "roastery";
const CONFIG_VERSION: i64 = 1;
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/";
const DEFAULT_TIMEOUT: &str = "10s";
const DEFAULT_LOG_LEVEL: &str = "info";
const CONFIG_PATH_ENV: &str = "ROASTERY_CONFIG_PATH";
const CSRF_TOKEN_ENV: &str = "ROASTERY_CSRF_TOKEN";
const SESSION_ID_ENV: &str = "ROASTERY_SESSION_ID";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: Server::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
    pub csrf_token: Option<String>,
    pub session_id: Option<String>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_BASE_URL.to_owned()),
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
            csrf_token: None,
            session_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ui {
    pub search_delay: Option<String>,
    pub search_min_length: Option<i64>,
    pub auto_save_interval: Option<String>,
    pub toast_duration: Option<String>,
    pub tooltip_margin: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Some(DEFAULT_LOG_LEVEL.to_owned()),
            file: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version. Add `version = 1` and keep values under [server], [ui], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1. Regenerate it with `roastery --print-example-config`",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(base_url) = &self.server.base_url
            && base_url.trim().is_empty()
        {
            bail!("server.base_url in {} must not be empty", path.display());
        }

        if let Some(timeout) = &self.server.timeout
            && parse_duration(timeout)? <= Duration::ZERO
        {
            bail!(
                "server.timeout in {} must be positive, got {}",
                path.display(),
                timeout
            );
        }

        if let Some(min_length) = self.ui.search_min_length
            && min_length < 0
        {
            bail!(
                "ui.search_min_length in {} must be non-negative, got {}",
                path.display(),
                min_length
            );
        }

        if let Some(margin) = self.ui.tooltip_margin
            && !(0..=64).contains(&margin)
        {
            bail!(
                "ui.tooltip_margin in {} must be between 0 and 64, got {}",
                path.display(),
                margin
            );
        }

        for (key, value) in [
            ("ui.search_delay", &self.ui.search_delay),
            ("ui.auto_save_interval", &self.ui.auto_save_interval),
            ("ui.toast_duration", &self.ui.toast_duration),
        ] {
            if let Some(raw) = value {
                parse_duration(raw).with_context(|| format!("{key} in {}", path.display()))?;
            }
        }

        if let Some(level) = &self.log.level {
            tracing_subscriber::EnvFilter::try_new(level).with_context(|| {
                format!(
                    "log.level {level:?} in {} is not a valid filter; use a level like \"info\" or \"roastery_app=debug\"",
                    path.display()
                )
            })?;
        }

        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.server.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(self.server.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    /// `ROASTERY_CSRF_TOKEN` wins over `server.csrf_token`.
    pub fn csrf_token(&self) -> Option<String> {
        env::var(CSRF_TOKEN_ENV)
            .ok()
            .or_else(|| self.server.csrf_token.clone())
            .map(|token| token.trim().to_owned())
            .filter(|token| !token.is_empty())
    }

    /// The `sessionid` cookie of a logged-in browser session.
    /// `ROASTERY_SESSION_ID` wins over `server.session_id`.
    pub fn session_id(&self) -> Option<String> {
        env::var(SESSION_ID_ENV)
            .ok()
            .or_else(|| self.server.session_id.clone())
            .map(|session| session.trim().to_owned())
            .filter(|session| !session.is_empty())
    }

    pub fn widget_defaults(&self) -> Result<WidgetDefaults> {
        let mut defaults = WidgetDefaults::default();
        if let Some(raw) = &self.ui.search_delay {
            defaults.search_delay = millis(parse_duration(raw)?);
        }
        if let Some(min_length) = self.ui.search_min_length {
            defaults.search_min_length = usize::try_from(min_length)
                .with_context(|| format!("ui.search_min_length {min_length} is out of range"))?;
        }
        if let Some(raw) = &self.ui.auto_save_interval {
            defaults.auto_save_interval = millis(parse_duration(raw)?);
        }
        if let Some(raw) = &self.ui.toast_duration {
            defaults.toast_duration = millis(parse_duration(raw)?);
        }
        if let Some(margin) = self.ui.tooltip_margin {
            defaults.tooltip_margin = i32::try_from(margin)
                .with_context(|| format!("ui.tooltip_margin {margin} is out of range"))?;
        }
        Ok(defaults)
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        if let Some(file) = &self.log.file {
            return Ok(PathBuf::from(file));
        }
        let cache_root = dirs::cache_dir().ok_or_else(|| {
            anyhow!("cannot resolve cache directory; set [log].file in the config")
        })?;
        Ok(cache_root.join(APP_NAME).join("roastery.log"))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# roastery config\n# Place this file at: {}\n\nversion = 1\n\n[server]\nbase_url = \"{}\"\ntimeout = \"{}\"\n# Prefer the ROASTERY_CSRF_TOKEN environment variable over storing the token here.\n# csrf_token = \"\"\n# The API only answers logged-in sessions. Prefer ROASTERY_SESSION_ID for the sessionid cookie.\n# session_id = \"\"\n\n[ui]\nsearch_delay = \"300ms\"\nsearch_min_length = 1\nauto_save_interval = \"30s\"\ntoast_duration = \"3s\"\ntooltip_margin = 8\n\n[log]\n# ROASTERY_LOG overrides this filter.\nlevel = \"{}\"\n# Optional. Default is the platform cache dir (for example ~/.cache/roastery/roastery.log)\n# file = \"/absolute/path/to/roastery.log\"\n",
            path.display(),
            DEFAULT_BASE_URL,
            DEFAULT_TIMEOUT,
            DEFAULT_LOG_LEVEL,
        )
    }
}

#[cfg(test)]
pub(crate) fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn millis(duration: Duration) -> Millis {
    Millis::try_from(duration.as_millis()).unwrap_or(Millis::MAX)
}

fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 300ms or 30s)")
}

#[cfg(test)]
mod tests {
    use super::{Config, env_lock, parse_duration};
    use anyhow::Result;
    use std::path::PathBuf;
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.base_url(), "http://127.0.0.1:8000/");
        assert_eq!(config.timeout()?, Duration::from_secs(10));
        assert_eq!(config.widget_defaults()?.search_delay, 300);
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[server]\nbase_url = \"http://erp.local/\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[server], [ui], and [log]"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 3\n")?;
        let error = Config::load(&path).expect_err("v3 config should fail");
        let message = error.to_string();
        assert!(message.contains("unsupported config version 3"));
        assert!(message.contains("--print-example-config"));
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn ui_section_overrides_widget_defaults() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[ui]\nsearch_delay = \"150ms\"\nsearch_min_length = 2\nauto_save_interval = \"1m\"\ntoast_duration = \"5s\"\ntooltip_margin = 4\n",
        )?;
        let defaults = Config::load(&path)?.widget_defaults()?;
        assert_eq!(defaults.search_delay, 150);
        assert_eq!(defaults.search_min_length, 2);
        assert_eq!(defaults.auto_save_interval, 60_000);
        assert_eq!(defaults.toast_duration, 5_000);
        assert_eq!(defaults.tooltip_margin, 4);
        assert_eq!(defaults.indicator_duration, 2_000);
        Ok(())
    }

    #[test]
    fn invalid_values_are_rejected() -> Result<()> {
        for (content, expected) in [
            ("version = 1\n[server]\ntimeout = \"0s\"\n", "must be positive"),
            ("version = 1\n[server]\nbase_url = \"  \"\n", "must not be empty"),
            ("version = 1\n[ui]\nsearch_min_length = -1\n", "must be non-negative"),
            ("version = 1\n[ui]\ntooltip_margin = 500\n", "between 0 and 64"),
            ("version = 1\n[ui]\nsearch_delay = \"soon\"\n", "ui.search_delay"),
        ] {
            let (_temp, path) = write_config(content)?;
            let error = Config::load(&path).expect_err("invalid config should fail");
            let message = format!("{error:#}");
            assert!(message.contains(expected), "{content:?}: {message}");
        }
        Ok(())
    }

    #[test]
    fn csrf_token_prefers_environment() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config("version = 1\n[server]\ncsrf_token = \"from-file\"\n")?;
        let config = Config::load(&path)?;

        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var("ROASTERY_CSRF_TOKEN");
        }
        assert_eq!(config.csrf_token().as_deref(), Some("from-file"));

        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("ROASTERY_CSRF_TOKEN", "from-env");
        }
        let token = config.csrf_token();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("ROASTERY_CSRF_TOKEN");
        }
        assert_eq!(token.as_deref(), Some("from-env"));
        Ok(())
    }

    #[test]
    fn session_id_prefers_environment_and_ignores_blanks() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config("version = 1\n[server]\nsession_id = \"from-file\"\n")?;
        let config = Config::load(&path)?;

        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var("ROASTERY_SESSION_ID");
        }
        assert_eq!(config.session_id().as_deref(), Some("from-file"));

        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("ROASTERY_SESSION_ID", " from-env ");
        }
        let session = config.session_id();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("ROASTERY_SESSION_ID", "   ");
        }
        let blank = Config::default().session_id();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("ROASTERY_SESSION_ID");
        }
        assert_eq!(session.as_deref(), Some("from-env"));
        assert_eq!(blank, None);
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("ROASTERY_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("ROASTERY_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn log_path_prefers_config_file() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[log]\nlevel = \"debug\"\nfile = \"/var/log/roastery.log\"\n")?;
        let config = Config::load(&path)?;
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.log_path()?, PathBuf::from("/var/log/roastery.log"));
        Ok(())
    }

    #[test]
    fn durations_parse_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        let error = parse_duration("oops").expect_err("invalid duration should fail");
        assert!(error.to_string().contains("invalid duration"));
        Ok(())
    }

    #[test]
    fn example_config_round_trips() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        let example = Config::example_config(&path);
        assert!(example.contains("[server]"));
        assert!(example.contains("[ui]"));
        assert!(example.contains("[log]"));
        assert!(example.contains("session_id"));
        std::fs::write(&path, &example)?;
        let config = Config::load(&path)?;
        assert_eq!(config.widget_defaults()?.auto_save_interval, 30_000);
        Ok(())
    }
}
