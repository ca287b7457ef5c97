use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2:latest";

/// Settings given on the command line for this run.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model: Option<String>,
    pub ollama_url: Option<String>,
    pub template_path: Option<PathBuf>,
    pub echo_template: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub ollama_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// JSON diagnostic table to use instead of the built-in one
    #[serde(default)]
    pub template_path: Option<PathBuf>,
    /// Show the full prompt, template included, in the user's bubble
    #[serde(default)]
    pub echo_template: bool,
}

impl Config {
    /// Load the saved config and apply `overrides` on top.
    ///
    /// A new `--model` becomes the saved default. Nothing else from the
    /// command line is written back, and an unreadable file is never
    /// overwritten.
    pub fn resolve_at(path: &Path, overrides: &Overrides) -> Self {
        let (saved, readable) = match Self::load_from(path) {
            Ok(config) => (config, true),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
                (Self::default(), false)
            }
        };

        if readable {
            if let Some(model) = &overrides.model {
                if saved.model.as_deref() != Some(model.as_str()) {
                    let persisted = Self {
                        model: Some(model.clone()),
                        ..saved.clone()
                    };
                    match persisted.save_to(path) {
                        Ok(()) => tracing::info!(model = %model, "Saved default model"),
                        Err(e) => tracing::warn!(error = %e, "Could not save default model"),
                    }
                }
            }
        }

        let mut config = saved;
        config.merge(overrides);
        config
    }

    /// Command-line values win over the file. Returns whether the model changed.
    pub fn merge(&mut self, overrides: &Overrides) -> bool {
        let mut model_changed = false;
        if let Some(model) = &overrides.model {
            model_changed = self.model.as_deref() != Some(model.as_str());
            self.model = Some(model.clone());
        }
        if overrides.ollama_url.is_some() {
            self.ollama_url = overrides.ollama_url.clone();
        }
        if overrides.template_path.is_some() {
            self.template_path = overrides.template_path.clone();
        }
        self.echo_template |= overrides.echo_template;
        model_changed
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn ollama_url(&self) -> &str {
        self.ollama_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL)
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("obd-chat").join("config.json"))
    }
}
