use crate::models::PanelConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;

/// Name of the configuration file inside the configuration directory
pub const CONFIG_FILE_NAME: &str = "painel.yaml";

/// Prefix of environment variables overriding file values
/// (`PAINEL_ROTATION_INTERVAL_SECS=20`, `PAINEL_FEED_URL=...`)
pub const ENV_PREFIX: &str = "PAINEL";

/// Configuration manager for loading and saving the panel configuration.
///
/// Layers, lowest priority first:
/// - built-in defaults ([`PanelConfig::default`])
/// - `painel.yaml` in the configuration directory (optional)
/// - `PAINEL_*` environment variables, `__` separating nested keys
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing `painel.yaml` (created if missing)
    ///
    /// # Returns
    /// A new ConfigManager instance
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        // Create config directory if it doesn't exist
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
        })
    }

    /// Load the configuration, applying overrides from the process environment.
    ///
    /// # Returns
    /// The merged and validated PanelConfig; defaults when no file exists
    ///
    /// # Errors
    /// Fails if the file cannot be parsed, a value has the wrong type, or the
    /// merged configuration does not validate
    pub fn load_config(&self) -> Result<PanelConfig> {
        self.load_layers(None)
    }

    /// Load the configuration with overrides taken from `env` instead of the
    /// process environment.
    ///
    /// # Arguments
    /// * `env` - Variables as they would appear in the environment (`PAINEL_...`)
    pub fn load_config_with_env<I>(&self, env: I) -> Result<PanelConfig>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.load_layers(Some(env.into_iter().collect()))
    }

    fn load_layers(&self, env: Option<config::Map<String, String>>) -> Result<PanelConfig> {
        if self.config_path.exists() {
            tracing::info!("Loading panel config from {}", self.config_path);
        } else {
            tracing::warn!(
                "Panel config file not found at {}, using defaults",
                self.config_path
            );
        }

        // Missing keys fall back to PanelConfig's serde defaults
        let layered = Config::builder()
            .add_source(
                File::from(self.config_path.as_std_path())
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .with_context(|| format!("Failed to read panel config: {}", self.config_path))?;

        let config: PanelConfig = layered
            .try_deserialize()
            .with_context(|| format!("Failed to parse panel config: {}", self.config_path))?;

        let problems = config.problems();
        if !problems.is_empty() {
            anyhow::bail!(
                "Invalid panel config {}: {}",
                self.config_path,
                problems.join("; ")
            );
        }

        tracing::info!(
            "Panel config ready: feed={}, announcements={}, {} menu page(s)",
            config.feed_url,
            config.announcements_url,
            config.pages.len()
        );
        Ok(config)
    }

    /// Save the configuration file.
    ///
    /// # Arguments
    /// * `config` - The PanelConfig to save
    pub fn save_config(&self, config: &PanelConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize panel config to YAML")?;

        fs::write(&self.config_path, yaml_string)
            .with_context(|| format!("Failed to write panel config: {}", self.config_path))?;

        tracing::info!("Saved panel config to {}", self.config_path);
        Ok(())
    }

    /// Write the default configuration if no file exists yet.
    ///
    /// # Returns
    /// `true` if a file was written
    pub fn ensure_default_config(&self) -> Result<bool> {
        if self.config_path.exists() {
            return Ok(false);
        }
        self.save_config(&PanelConfig::default())?;
        Ok(true)
    }

    /// Get the configuration file path.
    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}
