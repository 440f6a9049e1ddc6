mod cli;

use dracin::{
    config::{self, Config},
    providers, server,
    store::{open_store, StoredConfig, SwitchTrigger},
};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // CLI flags win over the config file
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting dracin gateway");
    tracing::info!(
        "Default provider {}, {} providers configured",
        config.default_provider,
        config.providers.len()
    );
    match &config.store.path {
        Some(path) => tracing::info!("State file: {:?}", path),
        None => tracing::warn!("No store path configured, provider state is not persisted"),
    }

    server::start_server(config).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "dracin=trace,dracin_common=debug,tower_http=debug".to_string()
        } else {
            "dracin=info,dracin_common=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, config_path))
        }
        Commands::Check { provider, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(check_providers(config_path, provider.as_deref(), json))
        }
        Commands::Switch { provider, reason } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(switch_provider(config_path, &provider, &reason))
        }
        Commands::Providers { json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(list_providers(config_path, json))
        }
        Commands::Validate {
            config: validate_path,
        } => {
            validate_config(validate_path.as_deref().or(config_path))
        }
        Commands::Version => {
            println!("dracin {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn check_providers(
    config_path: Option<&Path>,
    only: Option<&str>,
    json: bool,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    let targets: Vec<_> = match only {
        Some(id) => match config.provider(id) {
            Some(p) => vec![p],
            None => anyhow::bail!("Unknown provider: {}", id),
        },
        None => config.enabled_providers(),
    };

    let client = reqwest::Client::new();
    let results = providers::probe_all(&client, targets).await;

    let store = open_store(config.store.path.as_deref());
    if let Err(e) = providers::record_probes(store.as_ref(), &results).await {
        tracing::warn!("Failed to record health results: {}", e);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    for result in &results {
        let mark = if result.healthy { "✓" } else { "✗" };
        println!(
            "{} {:<14} {:<18} {}ms",
            mark, result.provider_id, result.status, result.response_ms
        );
    }
    let healthy = results.iter().filter(|r| r.healthy).count();
    println!("\n{}/{} providers healthy", healthy, results.len());

    Ok(())
}

async fn switch_provider(
    config_path: Option<&Path>,
    provider_id: &str,
    reason: &str,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    match config.provider(provider_id) {
        None => anyhow::bail!("Unknown provider: {}", provider_id),
        Some(p) if !p.enabled => anyhow::bail!("Provider {} is disabled", provider_id),
        Some(_) => {}
    }
    let Some(path) = config.store.path.as_deref() else {
        anyhow::bail!("Switching requires [store] path to be configured");
    };

    let store = open_store(Some(path));
    let mut stored = StoredConfig::load(store.as_ref()).await?;
    let previous = stored
        .active_api_id
        .clone()
        .unwrap_or_else(|| config.default_provider.clone());
    if previous == provider_id {
        println!("{} is already the active provider", provider_id);
        return Ok(());
    }

    stored.switch_to(provider_id, &config.default_provider, reason, SwitchTrigger::Admin);
    stored.save(store.as_ref()).await?;

    tracing::info!(from = %previous, to = %provider_id, "Active provider switched");
    println!("✓ Switched active provider: {} -> {}", previous, provider_id);
    Ok(())
}

async fn list_providers(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let store = open_store(config.store.path.as_deref());
    let stored = StoredConfig::load(store.as_ref()).await.unwrap_or_else(|e| {
        tracing::warn!("Failed to read store: {}", e);
        StoredConfig::default()
    });
    let active = stored
        .active_api_id
        .clone()
        .unwrap_or_else(|| config.default_provider.clone());

    let mut providers: Vec<_> = config.providers.iter().collect();
    providers.sort_by_key(|p| p.priority);

    if json {
        println!("{}", serde_json::to_string_pretty(&providers)?);
        return Ok(());
    }

    for p in providers {
        let marker = if p.id == active { "*" } else { " " };
        let state = if p.enabled { "" } else { " (disabled)" };
        print!(
            "{} {:<14} {:<10} {:<6} {}{}",
            marker,
            p.id,
            p.name,
            p.query_format.to_string(),
            p.base_url,
            state
        );
        if let Some(stats) = stored.api_stats.get(&p.id) {
            print!(
                "  ok={} err={} avg={}ms",
                stats.success_count, stats.error_count, stats.avg_response_time
            );
        }
        println!();
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("✓ Configuration is valid");
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Default provider: {}", config.default_provider);
    println!(
        "  Providers: {} ({} enabled)",
        config.providers.len(),
        config.enabled_providers().len()
    );
    println!(
        "  Governor: {} req/min, {} concurrent, queue {}, {} retries",
        config.governor.requests_per_minute,
        config.governor.max_concurrent,
        config.governor.max_queue,
        config.governor.max_retries
    );
    Ok(())
}
