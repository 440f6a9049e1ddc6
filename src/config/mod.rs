mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    parse_config(&content).with_context(|| format!("Invalid config file: {:?}", path))
}

/// Parse and validate configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;
    validate_config(&config)?;
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./dracin.toml",
        "./config.toml",
        "~/.config/dracin/config.toml",
        "/etc/dracin/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.server.requests_per_minute == Some(0) {
        anyhow::bail!("server.requests_per_minute must be greater than 0 when set");
    }

    let governor = &config.governor;
    if governor.requests_per_minute == 0 {
        anyhow::bail!("governor.requests_per_minute must be greater than 0");
    }
    if governor.max_concurrent == 0 {
        anyhow::bail!("governor.max_concurrent must be greater than 0");
    }
    if governor.backoff_multiplier < 1.0 {
        anyhow::bail!("governor.backoff_multiplier must be at least 1.0");
    }
    if governor.initial_backoff_ms > governor.max_backoff_ms {
        tracing::warn!(
            "governor.initial_backoff_ms ({}) exceeds max_backoff_ms ({}); every backoff will be capped",
            governor.initial_backoff_ms,
            governor.max_backoff_ms
        );
    }

    let mut seen = HashSet::new();
    for provider in &config.providers {
        if provider.id.is_empty() {
            anyhow::bail!("Provider '{}' has an empty id", provider.name);
        }
        if !seen.insert(provider.id.as_str()) {
            anyhow::bail!("Duplicate provider id '{}'", provider.id);
        }
        if url::Url::parse(&provider.base_url).is_err() {
            anyhow::bail!(
                "Provider '{}' has an invalid base_url: {}",
                provider.id,
                provider.base_url
            );
        }
    }

    match config.provider(&config.default_provider) {
        None => anyhow::bail!(
            "default_provider '{}' is not in the provider table",
            config.default_provider
        ),
        Some(p) if !p.enabled => anyhow::bail!(
            "default_provider '{}' is disabled",
            config.default_provider
        ),
        Some(_) => {}
    }

    Ok(())
}
