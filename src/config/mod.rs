use std::{
    collections::HashMap,
    env,
    fs,
    io::{BufRead, BufReader},
    path::PathBuf,
    time::Duration,
};

use directories::BaseDirs;

use crate::console::ConsoleMode;
use crate::stream::{StreamSettings, DEFAULT_ERROR_ELEMENT, DEFAULT_OUTPUT_ELEMENT};

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        let mut map = default_map();
        let config_path = default_config_path();

        // Read .srunrc if exists
        if config_path.exists() {
            if let Ok(file) = fs::File::open(&config_path) {
                let reader = BufReader::new(file);
                for line in reader.lines().map_while(Result::ok) {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    if let Some((k, v)) = line.split_once('=') {
                        map.insert(k.trim().to_string(), v.trim().to_string());
                    }
                }
            }
        }

        // Overlay environment variables (take precedence)
        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self { inner: map, config_path }
    }

    /// Built-in defaults only: no rc file, no environment.
    pub fn with_defaults() -> Self {
        Self {
            inner: default_map(),
            config_path: default_config_path(),
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.inner.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.parse::<u64>().ok())
    }

    pub fn interpreter(&self) -> String {
        self.get("INTERPRETER")
            .unwrap_or_else(|| default_interpreter().to_string())
    }

    pub fn console_mode(&self) -> ConsoleMode {
        self.get("CONSOLE_MODE")
            .and_then(|v| v.parse().ok())
            .unwrap_or(ConsoleMode::Tui)
    }

    pub fn show_exit_banner(&self) -> bool {
        self.get_bool("SHOW_EXIT_BANNER")
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            output_element: self
                .get("OUTPUT_ELEMENT")
                .unwrap_or_else(|| DEFAULT_OUTPUT_ELEMENT.to_string()),
            error_element: self
                .get("ERROR_ELEMENT")
                .unwrap_or_else(|| DEFAULT_ERROR_ELEMENT.to_string()),
            poll_interval: Duration::from_millis(self.get_u64("READ_POLL_MS").unwrap_or(10).max(1)),
        }
    }

    /// Directory for the application's own log when the terminal is taken
    /// by the console.
    pub fn app_log_dir(&self) -> PathBuf {
        self.get("APP_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| env::temp_dir().join("script_runner"))
    }
}

fn is_config_key(k: &str) -> bool {
    // Accept known keys or SRUN_* for forward-compat
    const KEYS: &[&str] = &[
        "INTERPRETER",
        "OUTPUT_ELEMENT",
        "ERROR_ELEMENT",
        "READ_POLL_MS",
        "CONSOLE_MODE",
        "SHOW_EXIT_BANNER",
        "APP_LOG_DIR",
    ];

    KEYS.contains(&k) || k.starts_with("SRUN_")
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("script_runner").join(".srunrc")
}

fn default_interpreter() -> &'static str {
    if cfg!(windows) {
        "python"
    } else {
        "python3"
    }
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();

    m.insert("INTERPRETER".into(), default_interpreter().into());
    m.insert("OUTPUT_ELEMENT".into(), DEFAULT_OUTPUT_ELEMENT.into());
    m.insert("ERROR_ELEMENT".into(), DEFAULT_ERROR_ELEMENT.into());
    m.insert("READ_POLL_MS".into(), "10".into());
    m.insert("CONSOLE_MODE".into(), "tui".into());
    m.insert("SHOW_EXIT_BANNER".into(), "true".into());

    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_produce_stock_stream_settings() {
        let cfg = Config::with_defaults();
        assert_eq!(cfg.stream_settings(), StreamSettings::default());
        assert_eq!(cfg.console_mode(), ConsoleMode::Tui);
        assert!(cfg.show_exit_banner());
    }

    #[test]
    fn overrides_flow_into_stream_settings() {
        let mut cfg = Config::with_defaults();
        cfg.set("ERROR_ELEMENT", "pre");
        cfg.set("READ_POLL_MS", "0");
        cfg.set("CONSOLE_MODE", "plain");
        let settings = cfg.stream_settings();
        assert_eq!(settings.error_element, "pre");
        assert_eq!(settings.poll_interval, Duration::from_millis(1));
        assert_eq!(cfg.console_mode(), ConsoleMode::Plain);
    }

    #[test]
    fn only_known_or_prefixed_keys_are_taken_from_env() {
        assert!(is_config_key("INTERPRETER"));
        assert!(is_config_key("SRUN_EXTRA"));
        assert!(!is_config_key("PATH"));
    }
}
