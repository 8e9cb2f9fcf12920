use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub lists: ListConfig,
    #[serde(default)]
    pub prefs: PrefsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Overall request timeout. Also bounds how long a blocked caller waits
    /// for an in-flight token refresh.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.poptato.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListConfig {
    #[serde(default = "default_backlog_page_size")]
    pub backlog_page_size: u32,
    #[serde(default = "default_today_page_size")]
    pub today_page_size: u32,
    #[serde(default = "default_backlog_page_size")]
    pub yesterday_page_size: u32,
}

fn default_backlog_page_size() -> u32 {
    100
}

fn default_today_page_size() -> u32 {
    50
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            backlog_page_size: default_backlog_page_size(),
            today_page_size: default_today_page_size(),
            yesterday_page_size: default_backlog_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PrefsConfig {
    /// Preference file location. Defaults to `prefs.json` in the config dir.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

pub fn config_dir() -> Result<PathBuf> {
    let dir = directories::ProjectDirs::from("", "", "poptato")
        .context("Could not determine config directory")?
        .config_dir()
        .to_path_buf();
    Ok(dir)
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Where the preference store lives for this config.
pub fn prefs_path(config: &Config) -> Result<PathBuf> {
    match &config.prefs.path {
        Some(p) => Ok(p.clone()),
        None => Ok(config_dir()?.join("prefs.json")),
    }
}

pub fn load(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    if !path.exists() {
        anyhow::bail!(
            "Config file not found at {}. Run `poptato --init` to create one.",
            path.display()
        );
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    parse(&content).with_context(|| format!("Failed to parse config from {}", path.display()))
}

pub fn parse(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;
    if config.api.base_url.trim().is_empty() {
        anyhow::bail!("api.base_url must not be empty");
    }
    Ok(config)
}

pub async fn init_wizard() -> Result<()> {
    use std::io::{self, Write};

    println!("Poptato Configuration Wizard");
    println!("============================\n");

    let config_path = default_config_path()?;
    if config_path.exists() {
        print!("Config already exists at {}. Overwrite? [y/N] ", config_path.display());
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    print!("API base URL (press Enter for {}): ", default_base_url());
    io::stdout().flush()?;
    let mut base_url = String::new();
    io::stdin().read_line(&mut base_url)?;

    let config = Config {
        api: ApiConfig {
            base_url: if base_url.trim().is_empty() {
                default_base_url()
            } else {
                base_url.trim().trim_end_matches('/').to_string()
            },
            ..ApiConfig::default()
        },
        ..Config::default()
    };

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(&config)?;
    std::fs::write(&config_path, content)?;

    println!("\nConfig saved to {}", config_path.display());
    println!("Run `poptato login` to store your tokens.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.api.base_url, "https://api.poptato.com");
        assert_eq!(config.api.timeout(), Duration::from_secs(30));
        assert_eq!(config.lists.backlog_page_size, 100);
        assert_eq!(config.lists.today_page_size, 50);
        assert!(config.prefs.path.is_none());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = parse(
            r#"
            [api]
            base_url = "http://localhost:8080"
            "#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, "http://localhost:8080");
        assert_eq!(config.api.connect_timeout_secs, 10);
    }

    #[test]
    fn test_blank_base_url_rejected() {
        assert!(parse("[api]\nbase_url = \"  \"").is_err());
    }

    #[test]
    fn test_load_missing_file_mentions_init() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(err.to_string().contains("--init"));
    }

    #[test]
    fn test_explicit_prefs_path() {
        let config = parse("[prefs]\npath = \"/tmp/poptato-prefs.json\"").unwrap();
        assert_eq!(
            prefs_path(&config).unwrap(),
            PathBuf::from("/tmp/poptato-prefs.json")
        );
    }
}
