use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Application configuration consumed by the extkit bootstrap layer.
///
/// Loaded in layers: defaults, then the YAML file, then `EXTKIT__*`
/// environment variables, then command line overrides.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub application: ApplicationConfig,
    /// Logging configuration (optional, console-only defaults if None).
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub scan: ScanConfig,
    /// Raw option values keyed by `Group.Name` (or the bare `Name`).
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub disable: DisableConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApplicationConfig {
    pub name: String,
    /// Base directory for relative log file paths; empty means the working directory.
    #[serde(default)]
    pub home_dir: String,
}

/// Logging configuration - maps target prefixes to their settings.
/// Key "default" applies to every target without its own section.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Section {
    pub console_level: String, // "info", "debug", "error", "off"
    #[serde(default)]
    pub file: String, // "logs/extkit.log"
    #[serde(default)]
    pub file_level: String,
    pub max_age_days: Option<u32>,
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// Module path prefixes, e.g. `app::extensions`.
    #[serde(default)]
    pub packages: Vec<String>,
}

/// Type names disabled from configuration, per item kind.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DisableConfig {
    #[serde(default)]
    pub installers: Vec<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub bundles: Vec<String>,
    #[serde(default)]
    pub host_bundles: Vec<String>,
    #[serde(default)]
    pub modules: Vec<String>,
}

impl DisableConfig {
    pub fn is_empty(&self) -> bool {
        self.installers.is_empty()
            && self.extensions.is_empty()
            && self.bundles.is_empty()
            && self.host_bundles.is_empty()
            && self.modules.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Yaml,
    Json,
}

impl std::str::FromStr for ReportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            other => anyhow::bail!("unknown report format '{other}'"),
        }
    }
}

/// Which reports to print after startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    #[serde(default = "enabled")]
    pub tree: bool,
    #[serde(default)]
    pub options: bool,
    #[serde(default = "enabled")]
    pub summary: bool,
    #[serde(default)]
    pub format: ReportFormat,
}

const fn enabled() -> bool {
    true
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            packages: Vec::new(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            tree: true,
            options: false,
            summary: true,
            format: ReportFormat::Text,
        }
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "extkit".to_string(),
            home_dir: String::new(),
        }
    }
}

/// Create a default logging configuration: console only, `info`.
pub fn default_logging_config() -> LoggingConfig {
    let mut logging = HashMap::new();
    logging.insert(
        "default".to_string(),
        Section {
            console_level: "info".to_string(),
            file: String::new(),
            file_level: "debug".to_string(),
            max_age_days: Some(7),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    );
    logging
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            application: ApplicationConfig::default(),
            logging: Some(default_logging_config()),
            scan: ScanConfig::default(),
            options: BTreeMap::new(),
            disable: DisableConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration with layered loading: defaults → YAML file → environment variables.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        // Logging stays None unless YAML/ENV provide it.
        let base = AppConfig {
            logging: None,
            ..AppConfig::default()
        };

        let figment = Figment::new()
            .merge(Serialized::defaults(base))
            .merge(Yaml::file(config_path.as_ref()))
            // Example: EXTKIT__SCAN__ENABLED=false maps to scan.enabled
            .merge(Env::prefixed("EXTKIT__").split("__"));

        figment
            .extract()
            .with_context(|| format!("Failed to load config from {}", config_path.as_ref().display()))
    }

    /// Load configuration from file or fall back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_layered(path),
            None => Ok(Self::default()),
        }
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }

    /// Directory that relative log file paths are resolved against.
    pub fn home_dir(&self) -> PathBuf {
        let raw = self.application.home_dir.trim();
        if raw.is_empty() {
            PathBuf::from(".")
        } else {
            PathBuf::from(raw)
        }
    }

    /// Apply overrides from command line arguments.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(name) = &args.application {
            self.application.name = name.clone();
        }
        if let Some(format) = args.format {
            self.report.format = format;
        }
        if !args.scan.is_empty() {
            self.scan.enabled = true;
            for package in &args.scan {
                if !self.scan.packages.contains(package) {
                    self.scan.packages.push(package.clone());
                }
            }
        }
        for (name, raw) in &args.options {
            self.options
                .insert(name.clone(), serde_json::Value::String(raw.clone()));
        }

        let logging = self.logging.get_or_insert_with(default_logging_config);
        if let Some(default_section) = logging.get_mut("default") {
            default_section.console_level = match args.verbose {
                0 => default_section.console_level.clone(),
                1 => "debug".to_string(),
                _ => "trace".to_string(),
            };
        }
    }
}

/// Command line arguments relevant to configuration.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub application: Option<String>,
    pub print_config: bool,
    pub verbose: u8,
    pub format: Option<ReportFormat>,
    pub scan: Vec<String>,
    /// `NAME=VALUE` pairs, already split.
    pub options: Vec<(String, String)>,
}

/// Splits a `NAME=VALUE` command line option.
pub fn parse_option_arg(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once('=')
        .with_context(|| format!("option '{raw}' must look like NAME=VALUE"))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("option '{raw}' has an empty name");
    }
    Ok((name.to_string(), value.trim().to_string()))
}
