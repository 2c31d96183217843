use crate::history::{
    ConversationMode, HistoryLimits, ModeDefinition, MAX_CONVERSATIONS, MAX_FAVORITES,
};
use anyhow::{Context, Result};
use config::{Config, ConfigError, Environment, File, Source};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

const COUNSELING_PROMPT: &str = "あなたは丁寧で共感力のある悩み相談カウンセラーです。\
相手の気持ちを尊重し、安心して話してもらえるように、\
短すぎず長すぎない自然な日本語で、具体的な気づきや次の一歩を提案してください。";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub history: HistoryConfig,
    #[serde(default = "default_modes")]
    pub modes: Vec<ModeDefinition>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub data_dir: PathBuf,
    pub max_conversations: usize,
    pub max_favorites: usize,
    pub default_mode: ConversationMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

fn default_modes() -> Vec<ModeDefinition> {
    vec![
        ModeDefinition {
            mode: ConversationMode::Counseling,
            display_name: "Mind-Chat".to_string(),
            history_file: "history_mindchat.json".to_string(),
            system_prompt: Some(COUNSELING_PROMPT.to_string()),
        },
        ModeDefinition {
            mode: ConversationMode::Plain,
            display_name: "Plain chat".to_string(),
            history_file: "history_plain.json".to_string(),
            system_prompt: None,
        },
    ]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            history: HistoryConfig {
                data_dir: PathBuf::from("./data"),
                max_conversations: MAX_CONVERSATIONS,
                max_favorites: MAX_FAVORITES,
                default_mode: ConversationMode::Counseling,
            },
            modes: default_modes(),
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Settings {
    /// Reads `config/{CONFIG_ENV}` (optional) and `APP__*` environment overrides.
    pub fn new() -> Result<Self, ConfigError> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());
        Self::build(File::with_name(&format!("config/{}", config_env)).required(false))
    }

    /// Reads settings from an explicit file plus environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::build(File::from(path).required(true))
    }

    /// [`Settings::new`] followed by [`Settings::validate`].
    pub fn load() -> Result<Self> {
        let settings = Self::new().context("Failed to load settings")?;
        settings.validate()?;
        Ok(settings)
    }

    fn build<S>(file: S) -> Result<Self, ConfigError>
    where
        S: Source + Send + Sync + 'static,
    {
        let config = Config::builder()
            .set_default("history.data_dir", "./data")?
            .set_default("history.max_conversations", MAX_CONVERSATIONS as i64)?
            .set_default("history.max_favorites", MAX_FAVORITES as i64)?
            .set_default("history.default_mode", ConversationMode::Counseling.as_str())?
            .set_default("logging.level", "info")?
            .add_source(file)
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn validate(&self) -> Result<()> {
        if self.history.max_conversations == 0 {
            anyhow::bail!("history.max_conversations must be at least 1");
        }
        if self.history.max_favorites == 0 {
            anyhow::bail!("history.max_favorites must be at least 1");
        }
        if self.modes.is_empty() {
            anyhow::bail!("at least one conversation mode must be configured");
        }

        let mut modes = HashSet::new();
        let mut files = HashSet::new();
        for definition in &self.modes {
            if !modes.insert(definition.mode) {
                anyhow::bail!("mode '{}' is configured more than once", definition.mode);
            }
            if definition.history_file.trim().is_empty() {
                anyhow::bail!("mode '{}' has an empty history_file", definition.mode);
            }
            if !files.insert(definition.history_file.as_str()) {
                anyhow::bail!(
                    "history file '{}' is shared by more than one mode",
                    definition.history_file
                );
            }
        }

        if !modes.contains(&self.history.default_mode) {
            anyhow::bail!(
                "default mode '{}' is not among the configured modes",
                self.history.default_mode
            );
        }
        Ok(())
    }

    pub fn limits(&self) -> HistoryLimits {
        HistoryLimits {
            max_conversations: self.history.max_conversations,
            max_favorites: self.history.max_favorites,
        }
    }

    pub fn definition(&self, mode: ConversationMode) -> Option<&ModeDefinition> {
        self.modes.iter().find(|d| d.mode == mode)
    }

    pub fn history_path(&self, mode: ConversationMode) -> Option<PathBuf> {
        self.definition(mode)
            .map(|d| self.history.data_dir.join(&d.history_file))
    }
}
