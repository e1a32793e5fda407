use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::filters::{self, CommentFilter};

const DEFAULT_ENV_PREFIX: &str = "BSKY_COMMENTS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub bluesky: BlueskyConfig,
    #[serde(default)]
    pub widget: WidgetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlueskyConfig {
    #[serde(default = "default_service_url")]
    pub service_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_http_timeout", with = "humantime_serde")]
    pub http_timeout: Duration,
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            user_agent: default_user_agent(),
            http_timeout: default_http_timeout(),
        }
    }
}

fn default_service_url() -> String {
    "https://public.api.bsky.app".to_string()
}

fn default_user_agent() -> String {
    "bsky-comments/0.1 (+https://github.com/danielmerja/bsky-comments)".to_string()
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct WidgetConfig {
    /// Post to load when the command line supplies none; at:// or web form.
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub page_url: String,
    #[serde(default)]
    pub filters: FilterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FilterConfig {
    #[serde(default)]
    pub min_likes: Option<i64>,
    #[serde(default)]
    pub min_characters: Option<usize>,
    #[serde(default)]
    pub hide_pins: bool,
    #[serde(default)]
    pub muted_substrings: Vec<String>,
    #[serde(default)]
    pub muted_texts: Vec<String>,
}

impl FilterConfig {
    pub fn build(&self) -> Vec<CommentFilter> {
        let mut set: Vec<CommentFilter> = Vec::new();
        if let Some(min) = self.min_likes {
            set.push(filters::min_like_count(min));
        }
        if let Some(min) = self.min_characters {
            set.push(filters::min_character_count(min));
        }
        for needle in &self.muted_substrings {
            set.push(filters::text_contains(needle));
        }
        for text in &self.muted_texts {
            set.push(filters::exact_match(text));
        }
        if self.hide_pins {
            set.push(filters::no_pins());
        }
        set
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    cfg = merge_config(cfg, load_env(prefix)?);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.bluesky.service_url.is_empty() {
        base.bluesky.service_url = other.bluesky.service_url;
    }
    if !other.bluesky.user_agent.is_empty() {
        base.bluesky.user_agent = other.bluesky.user_agent;
    }
    if other.bluesky.http_timeout != default_http_timeout() {
        base.bluesky.http_timeout = other.bluesky.http_timeout;
    }

    if !other.widget.uri.is_empty() {
        base.widget.uri = other.widget.uri;
    }
    if !other.widget.author.is_empty() {
        base.widget.author = other.widget.author;
    }
    if !other.widget.page_url.is_empty() {
        base.widget.page_url = other.widget.page_url;
    }

    if other.widget.filters.min_likes.is_some() {
        base.widget.filters.min_likes = other.widget.filters.min_likes;
    }
    if other.widget.filters.min_characters.is_some() {
        base.widget.filters.min_characters = other.widget.filters.min_characters;
    }
    if other.widget.filters.hide_pins {
        base.widget.filters.hide_pins = true;
    }
    if !other.widget.filters.muted_substrings.is_empty() {
        base.widget.filters.muted_substrings = other.widget.filters.muted_substrings;
    }
    if !other.widget.filters.muted_texts.is_empty() {
        base.widget.filters.muted_texts = other.widget.filters.muted_texts;
    }

    base
}

fn load_env(prefix: &str) -> Result<Config> {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    // start from a neutral config so unset env keys cannot shadow
    // values the config file already provided
    let mut cfg = env_seed();

    for (key, value) in map {
        apply_env_value(&mut cfg, &key, value);
    }

    Ok(cfg)
}

fn env_seed() -> Config {
    Config {
        bluesky: BlueskyConfig {
            service_url: String::new(),
            user_agent: String::new(),
            http_timeout: default_http_timeout(),
        },
        widget: WidgetConfig::default(),
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "bluesky.service_url" => cfg.bluesky.service_url = value,
        "bluesky.user_agent" => cfg.bluesky.user_agent = value,
        "bluesky.http_timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.bluesky.http_timeout = duration;
            }
        }
        "widget.uri" => cfg.widget.uri = value,
        "widget.author" => cfg.widget.author = value,
        "widget.page_url" => cfg.widget.page_url = value,
        "widget.filters.min_likes" => {
            if let Ok(parsed) = value.parse::<i64>() {
                cfg.widget.filters.min_likes = Some(parsed);
            }
        }
        "widget.filters.min_characters" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.widget.filters.min_characters = Some(parsed);
            }
        }
        "widget.filters.hide_pins" => {
            cfg.widget.filters.hide_pins = matches!(value.as_str(), "1" | "true" | "TRUE" | "True");
        }
        "widget.filters.muted_substrings" => {
            cfg.widget.filters.muted_substrings = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        "widget.filters.muted_texts" => {
            cfg.widget.filters.muted_texts = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("bsky-comments").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_defaults_without_files() {
        let cfg = load(LoadOptions {
            config_file: Some(PathBuf::from("/nonexistent/config.yaml")),
            env_prefix: Some("BSKY_COMMENTS_TEST_NONE".into()),
        })
        .unwrap();
        assert_eq!(cfg.bluesky.service_url, "https://public.api.bsky.app");
        assert_eq!(cfg.bluesky.http_timeout, Duration::from_secs(20));
        assert!(cfg.widget.filters.build().is_empty());
    }

    #[test]
    fn reads_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "bluesky:\n  user_agent: tester/1.0\nwidget:\n  author: alice.example.com\n  page_url: https://example.com/post\n  filters:\n    min_likes: 2\n    hide_pins: true\n    muted_substrings: [spam]\n",
        )
        .unwrap();
        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("BSKY_COMMENTS_TEST_FILE".into()),
        })
        .unwrap();
        assert_eq!(cfg.bluesky.user_agent, "tester/1.0");
        assert_eq!(cfg.widget.author, "alice.example.com");
        assert_eq!(cfg.widget.filters.min_likes, Some(2));
        assert!(cfg.widget.filters.hide_pins);
        assert_eq!(cfg.widget.filters.build().len(), 3);
    }

    #[test]
    fn env_overrides() {
        env::set_var("BSKY_COMMENTS_TEST_ENV_WIDGET__AUTHOR", "env.example.com");
        env::set_var("BSKY_COMMENTS_TEST_ENV_BLUESKY__HTTP_TIMEOUT", "5s");
        let cfg = load(LoadOptions {
            config_file: Some(PathBuf::from("/nonexistent/config.yaml")),
            env_prefix: Some("BSKY_COMMENTS_TEST_ENV".into()),
        })
        .unwrap();
        assert_eq!(cfg.widget.author, "env.example.com");
        assert_eq!(cfg.bluesky.http_timeout, Duration::from_secs(5));
        env::remove_var("BSKY_COMMENTS_TEST_ENV_WIDGET__AUTHOR");
        env::remove_var("BSKY_COMMENTS_TEST_ENV_BLUESKY__HTTP_TIMEOUT");
    }
}
