use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Status broadcast settings.
#[derive(Debug, Deserialize, Clone)]
pub struct EventsConfig {
    /// Ring-buffer capacity of the broadcast channel. Slow subscribers
    /// that fall more than this many events behind start dropping events.
    #[serde(default = "default_event_buffer")]
    pub buffer: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            buffer: default_event_buffer(),
        }
    }
}

fn default_event_buffer() -> usize {
    256
}

/// Crawl and profiling settings.
#[derive(Debug, Deserialize, Clone)]
pub struct CrawlConfig {
    /// How many representative values to sample per column.
    #[serde(default = "default_sample_values")]
    pub sample_values: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            sample_values: default_sample_values(),
        }
    }
}

fn default_sample_values() -> usize {
    5
}

impl Config {
    /// A minimal config for tests and ad hoc tooling: a database path and
    /// defaults for everything else.
    pub fn minimal(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            events: EventsConfig::default(),
            crawl: CrawlConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.events.buffer == 0 {
        anyhow::bail!("events.buffer must be > 0");
    }
    if config.crawl.sample_values > 100 {
        anyhow::bail!("crawl.sample_values must be <= 100");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let cfg: Config = toml::from_str("[db]\npath = \"/tmp/dock.sqlite\"\n").unwrap();
        assert_eq!(cfg.events.buffer, 256);
        assert_eq!(cfg.crawl.sample_values, 5);
    }

    #[test]
    fn explicit_values_win() {
        let cfg: Config = toml::from_str(
            r#"
[db]
path = "/tmp/dock.sqlite"

[events]
buffer = 64

[crawl]
sample_values = 10
"#,
        )
        .unwrap();
        assert_eq!(cfg.events.buffer, 64);
        assert_eq!(cfg.crawl.sample_values, 10);
    }

    #[test]
    fn zero_buffer_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dock.toml");
        std::fs::write(&path, "[db]\npath = \"x.sqlite\"\n\n[events]\nbuffer = 0\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("events.buffer"));
    }
}
