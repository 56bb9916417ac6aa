use anyhow::{Context, Result};
use extkit::{ExtkitBuilder, ExtkitOptions, OptionStore, OptionsMapper};

use crate::config::{AppConfig, DisableConfig};

/// Maps the `options` section onto `store`, returning how many values were set.
///
/// Scalars are rendered as text, sequences are joined with `,` (the list
/// syntax understood by the option parsers). Unknown names fail.
pub fn apply_config_options(
    config: &AppConfig,
    store: &OptionStore,
    mapper: &mut OptionsMapper,
) -> Result<usize> {
    let mut count = 0;
    for (name, value) in &config.options {
        let raw = raw_value(name, value)?;
        mapper
            .map_str(store, name, &raw)
            .with_context(|| format!("config option '{name}'"))?;
        count += 1;
    }
    Ok(count)
}

fn raw_value(name: &str, value: &serde_json::Value) -> Result<String> {
    use serde_json::Value;

    Ok(match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| raw_value(name, item))
            .collect::<Result<Vec<_>>>()?
            .join(","),
        Value::Null | Value::Object(_) => {
            anyhow::bail!("config option '{name}' must be a scalar or a list")
        }
    })
}

/// Applies options, scan packages and disables from `config` to the root builder.
pub fn configure_builder(
    config: &AppConfig,
    builder: &mut ExtkitBuilder,
    mapper: &mut OptionsMapper,
) -> Result<()> {
    let mapped = apply_config_options(config, builder.options(), mapper)?;

    if !config.scan.enabled {
        builder.scan_packages(Vec::<String>::new())?;
    } else if !config.scan.packages.is_empty() {
        builder.scan_packages(config.scan.packages.iter().cloned())?;
    }

    apply_disables(&config.disable, builder);

    tracing::info!(
        application = %config.application.name,
        options = mapped,
        scan_packages = config.scan.packages.len(),
        scan_enabled = config.scan.enabled,
        "Configuration applied to builder"
    );
    Ok(())
}

fn apply_disables(disable: &DisableConfig, builder: &mut ExtkitBuilder) {
    for name in &disable.installers {
        builder.disable_installer(name.as_str());
    }
    for name in &disable.extensions {
        builder.disable_extension(name.as_str());
    }
    for name in &disable.bundles {
        builder.disable_bundle(name.as_str());
    }
    for name in &disable.host_bundles {
        builder.disable_host_bundle(name.as_str());
    }
    for name in &disable.modules {
        builder.disable_module(name.as_str());
    }
}

/// Scan packages the builder will hand to the scanner, without marking the option used.
pub fn configured_scan_packages(store: &OptionStore) -> Vec<String> {
    store
        .describe(ExtkitOptions::SCAN_PACKAGES.id())
        .ok()
        .and_then(|info| serde_json::from_value(info.value).ok())
        .unwrap_or_default()
}
