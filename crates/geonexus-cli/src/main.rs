use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use geonexus_lib::{AccessDecision, BackendKind, CallerIdentity, Gateway, GatewayConfig, QueryParams};

#[derive(Parser, Debug)]
#[command(author, version, about = "GeoNexus feature gateway utilities")]
struct Cli {
    /// JSON configuration file. Defaults to `$GEONEXUS_CONFIG`, then built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a feature query and print the resulting GeoJSON.
    Query {
        /// Backend to query: dts or postgis.
        #[arg(long, value_parser = parse_backend)]
        backend: BackendKind,
        /// Scene or table to query. DTS falls back to its default scene.
        #[arg(long)]
        resource: Option<String>,
        /// Bounding box as minX,minY,maxX,maxY.
        #[arg(long)]
        bbox: Option<String>,
        /// Attribute filter, e.g. "status = 'active'".
        #[arg(long = "where")]
        filter: Option<String>,
        #[arg(long)]
        limit: Option<String>,
        #[arg(long)]
        offset: Option<String>,
        /// Comma-separated property names to return.
        #[arg(long)]
        out_fields: Option<String>,
        /// User ID recorded in the audit log.
        #[arg(long)]
        user: Option<String>,
        /// Pretty-print the collection.
        #[arg(long)]
        pretty: bool,
    },
    /// Print the access decision for a resource without querying it.
    CheckAccess {
        #[arg(long, value_parser = parse_backend)]
        backend: BackendKind,
        resource: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    let gateway = build_gateway(cli.config.as_deref())?;

    match cli.command {
        Command::Query {
            backend,
            resource,
            bbox,
            filter,
            limit,
            offset,
            out_fields,
            user,
            pretty,
        } => {
            let mut params = QueryParams::new();
            let pairs = [
                ("bbox", bbox),
                ("where", filter),
                ("limit", limit),
                ("resultOffset", offset),
                ("outFields", out_fields),
            ];
            for (key, value) in pairs {
                if let Some(value) = value {
                    params.insert(key, value);
                }
            }
            let caller = CallerIdentity::new(user, None);
            handle_query(&gateway, backend, resource.as_deref(), &params, &caller, pretty).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::CheckAccess { backend, resource } => {
            handle_check_access(&gateway, backend, &resource)
        }
    }
}

fn build_gateway(config_path: Option<&Path>) -> Result<Gateway> {
    let config = match config_path {
        Some(path) => {
            let mut config = GatewayConfig::from_file(path)
                .with_context(|| format!("failed to read configuration from {}", path.display()))?;
            config.apply_overrides(|key| std::env::var(key).ok())?;
            config
        }
        None => GatewayConfig::load().context("failed to load configuration")?,
    };
    Gateway::from_config(config).context("failed to initialize gateway")
}

async fn handle_query(
    gateway: &Gateway,
    backend: BackendKind,
    resource: Option<&str>,
    params: &QueryParams,
    caller: &CallerIdentity,
    pretty: bool,
) -> Result<()> {
    let collection = gateway
        .query(backend, resource, params, caller)
        .await
        .with_context(|| format!("{} query failed", backend))?;

    let output = if pretty {
        serde_json::to_string_pretty(&collection)?
    } else {
        serde_json::to_string(&collection)?
    };
    println!("{}", output);
    Ok(())
}

fn handle_check_access(gateway: &Gateway, backend: BackendKind, resource: &str) -> Result<ExitCode> {
    let decision = gateway.policy(backend)?.evaluate(resource);
    match decision {
        AccessDecision::Allowed => {
            println!("allowed: {} on {}", resource, backend);
            Ok(ExitCode::SUCCESS)
        }
        AccessDecision::AllowedUnrestricted => {
            println!(
                "allowed: {} on {} (allow-list is empty, every resource is allowed)",
                resource, backend
            );
            Ok(ExitCode::SUCCESS)
        }
        AccessDecision::Denied => {
            println!("denied: {} on {}", resource, backend);
            Ok(ExitCode::from(2))
        }
    }
}

fn parse_backend(value: &str) -> std::result::Result<BackendKind, String> {
    value.parse()
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
