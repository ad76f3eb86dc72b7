//! Engine configuration and path resolution.
//!
//! Configuration is optional YAML. The global file is read first and the
//! project file (`.claude/hookgate.yml`) is layered over it key by key, so a
//! project only has to spell out what it changes.

use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value as YamlValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use super::dispatcher::TimeoutPolicy;
use super::global_config::GlobalPaths;

/// Problems reading or parsing configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("global configuration: {0}")]
    Global(String),
}

/// Project path resolution following the .claude/ convention
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectPaths {
    /// Root project directory (contains .claude/)
    pub root: PathBuf,
    /// .claude/ directory
    pub claude_dir: PathBuf,
    /// Project config file (.claude/hookgate.yml)
    pub config_file: PathBuf,
    /// Claude Code settings file (.claude/settings.json)
    pub settings_file: PathBuf,
    /// Global config file, if one was discovered
    pub global_config: Option<PathBuf>,
}

impl ProjectPaths {
    /// Resolve project paths; global config discovery failures are logged
    /// and treated as absence unless an explicit override was given
    pub fn resolve(
        project_root: impl AsRef<Path>,
        global_override: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let root = project_root.as_ref().to_path_buf();
        let claude_dir = root.join(".claude");

        let explicit = global_override.is_some();
        let global = match GlobalPaths::discover_with_override(global_override) {
            Ok(found) => found,
            Err(e) if explicit => return Err(ConfigError::Global(format!("{e:#}"))),
            Err(e) => {
                debug!("Failed to discover global config: {}", e);
                None
            }
        };

        if let Some(global) = &global {
            info!("Global configuration discovered at {:?}", global.config_file);
        } else {
            debug!("No global configuration found - using project config only");
        }

        Ok(Self {
            config_file: claude_dir.join("hookgate.yml"),
            settings_file: claude_dir.join("settings.json"),
            global_config: global.map(|g| g.config_file),
            claude_dir,
            root,
        })
    }
}

/// Complete hookgate configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HookgateConfig {
    /// Dispatcher deadlines
    pub dispatch: DispatchConfig,

    /// Handler names left out of every registry
    pub disabled: Vec<String>,

    pub system_paths: SystemPathsConfig,

    pub lint: LintConfig,

    pub web_search: WebSearchConfig,

    pub git_stash: GitStashConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Per-handler overrides, keyed by handler name, layered over the
    /// built-in linter deadlines
    #[serde(default)]
    pub timeouts_ms: BTreeMap<String, u64>,
}

fn default_timeout_ms() -> u64 {
    5000
}

/// The linters shell out and routinely need longer than the default
fn default_handler_timeouts() -> BTreeMap<String, u64> {
    BTreeMap::from([
        ("validate-eslint-on-write".to_string(), 30000),
        ("ansible-lint".to_string(), 30000),
    ])
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            timeouts_ms: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemPathsConfig {
    #[serde(default = "default_blocked_prefixes")]
    pub blocked_prefixes: Vec<String>,
}

fn default_blocked_prefixes() -> Vec<String> {
    ["/etc/", "/var/", "/usr/", "/opt/", "/root/", "/home/"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for SystemPathsConfig {
    fn default() -> Self {
        Self {
            blocked_prefixes: default_blocked_prefixes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LintConfig {
    /// ESLint wrapper; the file path and flags are appended
    #[serde(default = "default_eslint_command")]
    pub eslint_command: String,

    /// Ansible lint script; the project-relative playbook path is appended
    #[serde(default = "default_ansible_lint_command")]
    pub ansible_lint_command: String,
}

fn default_eslint_command() -> String {
    "npx tsx scripts/eslint-wrapper.ts".to_string()
}

fn default_ansible_lint_command() -> String {
    "./scripts/lint".to_string()
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            eslint_command: default_eslint_command(),
            ansible_lint_command: default_ansible_lint_command(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebSearchConfig {
    /// Pin the current year; defaults to the system clock
    #[serde(default)]
    pub current_year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitStashConfig {
    #[serde(default = "default_escape_phrase")]
    pub escape_phrase: String,
}

fn default_escape_phrase() -> String {
    "I HAVE ABSOLUTELY CONFIRMED THAT STASH IS THE ONLY OPTION".to_string()
}

impl Default for GitStashConfig {
    fn default() -> Self {
        Self {
            escape_phrase: default_escape_phrase(),
        }
    }
}

/// Written by `hookgate init`
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Hookgate configuration
#
# Every key is optional. Values here override the global config.yml.

dispatch:
  # Deadline for a matched handler before it is treated as failed
  default_timeout_ms: 5000
  timeouts_ms:
    validate-eslint-on-write: 30000
    ansible-lint: 30000

# Handler names to leave out of the registry
disabled: []

system_paths:
  blocked_prefixes: ["/etc/", "/var/", "/usr/", "/opt/", "/root/", "/home/"]

lint:
  eslint_command: "npx tsx scripts/eslint-wrapper.ts"
  ansible_lint_command: "./scripts/lint"
"#;

impl HookgateConfig {
    /// Parse a single YAML document; an empty document is the default config
    pub fn from_yaml_str(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        let value = parse_yaml(contents, origin)?;
        from_value(value, origin)
    }

    /// Load the global file (if any) and the project file (if any), layered
    pub fn load(paths: &ProjectPaths) -> Result<Self, ConfigError> {
        let mut merged = YamlValue::Mapping(Default::default());

        for file in paths
            .global_config
            .iter()
            .chain(std::iter::once(&paths.config_file))
        {
            if !file.exists() {
                debug!("No configuration at {:?}", file);
                continue;
            }
            let contents = std::fs::read_to_string(file).map_err(|source| ConfigError::Read {
                path: file.clone(),
                source,
            })?;
            debug!("Layering configuration from {:?}", file);
            merge_yaml(&mut merged, parse_yaml(&contents, file)?);
        }

        from_value(merged, &paths.config_file)
    }

    /// Deadlines as the dispatcher consumes them
    pub fn timeout_policy(&self) -> TimeoutPolicy {
        default_handler_timeouts()
            .iter()
            .chain(&self.dispatch.timeouts_ms)
            .fold(
                TimeoutPolicy::new(Duration::from_millis(self.dispatch.default_timeout_ms)),
                |policy, (name, ms)| {
                    policy.with_override(name.clone(), Duration::from_millis(*ms))
                },
            )
    }
}

fn parse_yaml(contents: &str, origin: &Path) -> Result<YamlValue, ConfigError> {
    let value: YamlValue =
        serde_yaml_ng::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
    // An empty file parses as null
    Ok(if value.is_null() {
        YamlValue::Mapping(Default::default())
    } else {
        value
    })
}

fn from_value(value: YamlValue, origin: &Path) -> Result<HookgateConfig, ConfigError> {
    serde_yaml_ng::from_value(value).map_err(|source| ConfigError::Parse {
        path: origin.to_path_buf(),
        source,
    })
}

/// Recursive key-by-key merge; non-mapping values in `overlay` replace
fn merge_yaml(base: &mut YamlValue, overlay: YamlValue) {
    match (base, overlay) {
        (YamlValue::Mapping(base_map), YamlValue::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Configuration for engine initialization
/// Provides optional overrides for engine behavior via CLI flags
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Project root the configuration is read from
    pub project_dir: PathBuf,

    /// Override global config file
    /// If None, uses the platform default (~/.config/hookgate/config.yml)
    pub global_config: Option<PathBuf>,
}

impl EngineConfig {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            global_config: None,
        }
    }

    pub fn with_global_config(mut self, path: Option<PathBuf>) -> Self {
        self.global_config = path;
        self
    }

    pub fn paths(&self) -> Result<ProjectPaths, ConfigError> {
        ProjectPaths::resolve(&self.project_dir, self.global_config.clone())
    }

    /// Resolve paths and load the layered configuration
    pub fn load(&self) -> Result<HookgateConfig, ConfigError> {
        HookgateConfig::load(&self.paths()?)
    }
}
