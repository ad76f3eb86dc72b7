//! Global Configuration Discovery Module
//!
//! Provides cross-platform discovery of the machine-wide Hookgate
//! configuration. Project configuration is layered on top of it.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, info, trace};

/// File name of the global configuration inside its root directory
pub const GLOBAL_CONFIG_FILE: &str = "config.yml";

/// Global configuration paths
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalPaths {
    /// Root directory for global config
    pub root: PathBuf,
    /// Global config file
    pub config_file: PathBuf,
}

impl GlobalPaths {
    /// Discover global configuration paths using platform conventions
    pub fn discover() -> Result<Option<Self>> {
        Self::discover_with_override(None)
    }

    /// Discover global configuration with optional CLI override
    ///
    /// Resolution order:
    /// 1. CLI override parameter (if provided) - must be an absolute path to
    ///    an existing file
    /// 2. `<config_dir>/hookgate/config.yml`
    /// 3. None if that file doesn't exist (graceful absence)
    pub fn discover_with_override(cli_override: Option<PathBuf>) -> Result<Option<Self>> {
        trace!("Discovering global configuration paths");

        if let Some(override_path) = cli_override {
            if !override_path.is_absolute() {
                return Err(anyhow::anyhow!(
                    "Global config path must be absolute (got: {})",
                    override_path.display()
                ));
            }

            let canonical_path = override_path.canonicalize().with_context(|| {
                format!(
                    "Global config file does not exist: {}",
                    override_path.display()
                )
            })?;

            if !canonical_path.is_file() {
                return Err(anyhow::anyhow!(
                    "Global config path must be a file: {}",
                    canonical_path.display()
                ));
            }

            debug!(
                "Using CLI --global-config override: {} (resolved to {})",
                override_path.display(),
                canonical_path.display()
            );

            let root = canonical_path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| canonical_path.clone());
            return Ok(Some(GlobalPaths {
                root,
                config_file: canonical_path,
            }));
        }

        let paths = Self::default_location()?;
        if !paths.config_file.exists() {
            debug!("No global configuration found at {:?}", paths.config_file);
            return Ok(None);
        }

        info!("Found global configuration at {:?}", paths.config_file);
        Ok(Some(paths))
    }

    /// Where the global configuration lives when no override is given
    pub fn default_location() -> Result<Self> {
        Ok(Self::from_root(Self::get_platform_config_dir()?.join("hookgate")))
    }

    fn from_root(root: PathBuf) -> Self {
        GlobalPaths {
            config_file: root.join(GLOBAL_CONFIG_FILE),
            root,
        }
    }

    /// Get the platform-specific config directory
    ///
    /// On Linux: ~/.config/
    /// On macOS: ~/Library/Application Support/
    /// On Windows: %APPDATA%\
    fn get_platform_config_dir() -> Result<PathBuf> {
        if let Some(dir) = dirs::config_dir() {
            return Ok(dir);
        }

        #[cfg(unix)]
        {
            if let Some(home) = dirs::home_dir() {
                return Ok(home.join(".config"));
            }
        }

        Err(anyhow::anyhow!(
            "Could not determine platform config directory"
        ))
    }

    /// Create the global directory and a default config file if missing
    pub fn initialize(&self, contents: &str) -> Result<bool> {
        info!("Initializing global configuration at {:?}", self.root);

        std::fs::create_dir_all(&self.root).context("Failed to create global config root")?;

        if self.config_file.exists() {
            return Ok(false);
        }
        std::fs::write(&self.config_file, contents)
            .context("Failed to create global config.yml")?;
        Ok(true)
    }
}
