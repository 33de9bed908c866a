// Language configuration management for the Syllabus worker
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use syllabus_common::types::Language;

pub const DEFAULT_CONFIG_PATH: &str = "config/languages.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageExecution {
    pub command: String,
    pub args: Vec<String>,
    pub file_extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub name: String,
    pub version: String,
    pub image: String,
    pub execution: LanguageExecution,
    pub memory_limit_mb: u32,
    pub cpu_limit: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct LanguagesJson {
    languages: Vec<LanguageConfig>,
}

/// Language configuration manager
#[derive(Debug, Clone)]
pub struct LanguageConfigManager {
    configs: HashMap<String, LanguageConfig>,
}

impl LanguageConfigManager {
    /// Load language configurations from languages.json
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Language config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let languages_json: LanguagesJson =
            serde_json::from_str(content).context("Failed to parse languages.json")?;

        let mut configs = HashMap::new();
        for lang in languages_json.languages {
            if Language::from_str(&lang.name).is_none() {
                bail!("Unknown language '{}' in languages.json", lang.name);
            }
            configs.insert(lang.name.to_lowercase(), lang);
        }

        if configs.is_empty() {
            bail!("No languages configured in languages.json");
        }

        Ok(Self { configs })
    }

    /// Load from `LANGUAGES_CONFIG`, falling back to config/languages.json
    pub fn load_default() -> Result<Self> {
        let path = std::env::var("LANGUAGES_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(Path::new(&path))
    }

    /// Get configuration for a specific language
    pub fn get_config(&self, language: &Language) -> Result<&LanguageConfig> {
        let lang_name = language.to_string();
        self.configs
            .get(&lang_name)
            .ok_or_else(|| anyhow::anyhow!("No configuration found for language: {}", lang_name))
    }

    /// Container command: the configured executable followed by its args
    pub fn get_command(&self, language: &Language) -> Result<Vec<String>> {
        let execution = &self.get_config(language)?.execution;
        let mut cmd = vec![execution.command.clone()];
        cmd.extend(execution.args.iter().cloned());
        Ok(cmd)
    }

    /// Memory limit in bytes
    pub fn get_memory_limit_bytes(&self, language: &Language) -> Result<i64> {
        Ok(self.get_config(language)?.memory_limit_mb as i64 * 1024 * 1024)
    }

    /// CPU limit in nano CPUs
    pub fn get_nano_cpus(&self, language: &Language) -> Result<i64> {
        Ok((self.get_config(language)?.cpu_limit as f64 * 1_000_000_000.0) as i64)
    }

    /// List all supported languages
    pub fn list_languages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.configs.keys().cloned().collect();
        names.sort();
        names
    }
}
