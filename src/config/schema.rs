use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
#[cfg(unix)]
use tokio::fs::File;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::providers;

const CONFIG_FILE_NAME: &str = "config.toml";
const CHAT_CACHE_DIR_NAME: &str = "chat_cache";

// ── Top-level config ──────────────────────────────────────────────

/// Top-level shellchat configuration, loaded from `config.toml`.
///
/// Resolution order: `--config-dir` / `SHELLCHAT_CONFIG_DIR` → `~/.config/shellchat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// API key for the selected provider. Overridden by `SHELLCHAT_API_KEY`.
    pub api_key: Option<String>,
    /// Base URL override for the provider API (e.g. a local OpenAI-compatible proxy).
    pub api_url: Option<String>,
    /// Provider ID. Default: `"openai"`.
    pub default_provider: Option<String>,
    /// Model used for completions and stamped on saved chat sessions.
    /// Default: the provider's own default (`"gpt-4o"` for openai).
    pub default_model: Option<String>,
    /// Default model temperature (0.0 - 2.0). Default: `0.7`.
    #[serde(default = "default_temperature")]
    pub default_temperature: f64,

    /// Chat session persistence (`[chat]`).
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Chat session persistence configuration (`[chat]` section).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Directory holding one history file per chat id. `~` and `$VARS` are
    /// expanded. Default: `chat_cache` next to `config.toml`.
    #[serde(default)]
    pub cache_dir: Option<String>,
}

// ── Config impl ──────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());

        Self {
            config_path: home.join(".config").join("shellchat").join(CONFIG_FILE_NAME),
            api_key: None,
            api_url: None,
            default_provider: Some("openai".to_string()),
            default_model: None,
            default_temperature: default_temperature(),
            chat: ChatConfig::default(),
        }
    }
}

fn default_temperature() -> f64 {
    0.7
}

fn default_config_dir() -> Result<PathBuf> {
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .context("Could not find home directory")?;
    Ok(home.join(".config").join("shellchat"))
}

fn resolve_config_dir() -> Result<PathBuf> {
    match std::env::var("SHELLCHAT_CONFIG_DIR") {
        Ok(dir) if !dir.trim().is_empty() => expand_path(&dir),
        _ => default_config_dir(),
    }
}

fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw.trim())
        .with_context(|| format!("Failed to expand path: {raw}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

fn parse_env_f64(name: &str) -> Option<f64> {
    std::env::var(name).ok()?.trim().parse().ok()
}

impl Config {
    pub async fn load_or_init() -> Result<Self> {
        let config_dir = resolve_config_dir()?;
        Self::load_or_init_in(&config_dir).await
    }

    /// Load `config.toml` from `config_dir`, writing a default one on first run.
    pub async fn load_or_init_in(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        fs::create_dir_all(config_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let initialized = if fs::try_exists(&config_path).await.unwrap_or(false) {
            false
        } else {
            let mut config = Config::default();
            config.config_path = config_path.clone();
            config.save().await?;
            true
        };

        // Warn if config file is world-readable (may contain API keys)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(meta) = fs::metadata(&config_path).await {
                if meta.permissions().mode() & 0o004 != 0 {
                    tracing::warn!(
                        "Config file {:?} is world-readable (mode {:o}). \
                         Consider restricting with: chmod 600 {:?}",
                        config_path,
                        meta.permissions().mode() & 0o777,
                        config_path,
                    );
                }
            }
        }

        let contents = fs::read_to_string(&config_path)
            .await
            .context("Failed to read config file")?;
        let mut config: Config =
            toml::from_str(&contents).context("Failed to parse config file")?;
        config.config_path = config_path;

        config.apply_env_overrides();
        config.validate()?;
        tracing::debug!(
            path = %config.config_path.display(),
            initialized,
            "Config loaded"
        );
        Ok(config)
    }

    /// Validate configuration values that would cause runtime failures.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            anyhow::bail!(
                "default_temperature must be between 0.0 and 2.0 (got {})",
                self.default_temperature
            );
        }

        if self
            .default_model
            .as_deref()
            .is_some_and(|model| model.trim().is_empty())
        {
            anyhow::bail!("default_model must not be empty");
        }

        if self
            .chat
            .cache_dir
            .as_deref()
            .is_some_and(|dir| dir.trim().is_empty())
        {
            anyhow::bail!("chat.cache_dir must not be empty");
        }

        Ok(())
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        // Provider-specific key variables are resolved later, in `providers::create_provider`.
        if let Ok(key) = std::env::var("SHELLCHAT_API_KEY") {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }

        if let Ok(provider) = std::env::var("SHELLCHAT_PROVIDER") {
            if !provider.is_empty() {
                self.default_provider = Some(provider);
            }
        }

        if let Ok(model) = std::env::var("SHELLCHAT_MODEL") {
            if !model.is_empty() {
                self.default_model = Some(model);
            }
        }

        if let Ok(url) = std::env::var("SHELLCHAT_API_URL") {
            if !url.is_empty() {
                self.api_url = Some(url);
            }
        }

        if let Some(temp) = parse_env_f64("SHELLCHAT_TEMPERATURE") {
            if (0.0..=2.0).contains(&temp) {
                self.default_temperature = temp;
            } else {
                tracing::warn!(temperature = temp, "Ignoring out-of-range SHELLCHAT_TEMPERATURE");
            }
        }

        if let Ok(dir) = std::env::var("SHELLCHAT_CHAT_CACHE_DIR") {
            if !dir.trim().is_empty() {
                self.chat.cache_dir = Some(dir);
            }
        }
    }

    pub fn provider(&self) -> &str {
        self.default_provider.as_deref().unwrap_or("openai")
    }

    pub fn model(&self) -> &str {
        self.default_model
            .as_deref()
            .unwrap_or_else(|| providers::default_model(self.provider()))
    }

    /// Directory that holds chat session files.
    pub fn chat_cache_dir(&self) -> Result<PathBuf> {
        match self.chat.cache_dir.as_deref() {
            Some(dir) => expand_path(dir),
            None => {
                let parent = self
                    .config_path
                    .parent()
                    .context("Config path must have a parent directory")?;
                Ok(parent.join(CHAT_CACHE_DIR_NAME))
            }
        }
    }

    pub async fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let parent_dir = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;

        fs::create_dir_all(parent_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                parent_dir.display()
            )
        })?;

        let file_name = self
            .config_path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or(CONFIG_FILE_NAME);
        let temp_path = parent_dir.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));

        let mut options = OpenOptions::new();
        options.create_new(true).write(true);
        // Restrict permissions (may contain API keys)
        #[cfg(unix)]
        options.mode(0o600);

        let mut temp_file = options.open(&temp_path).await.with_context(|| {
            format!(
                "Failed to create temporary config file: {}",
                temp_path.display()
            )
        })?;
        temp_file
            .write_all(toml_str.as_bytes())
            .await
            .context("Failed to write temporary config contents")?;
        temp_file
            .sync_all()
            .await
            .context("Failed to fsync temporary config file")?;
        drop(temp_file);

        if let Err(e) = fs::rename(&temp_path, &self.config_path).await {
            let _ = fs::remove_file(&temp_path).await;
            anyhow::bail!("Failed to atomically replace config file: {e}");
        }

        sync_directory(parent_dir).await?;
        Ok(())
    }
}

async fn sync_directory(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        let dir = File::open(path)
            .await
            .with_context(|| format!("Failed to open directory for fsync: {}", path.display()))?;
        dir.sync_all()
            .await
            .with_context(|| format!("Failed to fsync directory metadata: {}", path.display()))?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}
