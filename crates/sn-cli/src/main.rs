//! snow-cmdb
//!
//! Command-line interface for ServiceNow CMDB operations.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;
use sn_cmdb::{CiManager, Relationship, DEFAULT_RELATIONSHIP_TYPE};
use sn_connectors::{Connector, ConnectorHealth, Record, TableApiClient, DEFAULT_QUERY_LIMIT};
use sn_observability::{init_logging_with_config, AuditLog, LoggingConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

mod config;

use config::AppConfig;

/// Config file looked up in the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "snow-cmdb.yaml";

#[derive(Parser)]
#[command(name = "snow-cmdb")]
#[command(author = "Snow CMDB Team")]
#[command(version)]
#[command(about = "Manage ServiceNow configuration items from the command line", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a configuration item
    Create {
        /// CI fields as a JSON object; must include name and ci_type
        data: String,
    },

    /// Read a configuration item
    Read {
        /// CI sys_id
        sys_id: String,
    },

    /// Update a configuration item
    Update {
        /// CI sys_id
        sys_id: String,

        /// CI fields as a JSON object; must include name and ci_type
        data: String,
    },

    /// Delete a configuration item
    Delete {
        /// CI sys_id
        sys_id: String,
    },

    /// Query configuration items with an encoded query
    Query {
        /// Encoded query, e.g. "ci_type=server^name=web01"
        #[arg(short, long, default_value = "")]
        filter: String,

        /// Maximum number of records
        #[arg(short, long, default_value_t = DEFAULT_QUERY_LIMIT)]
        limit: u32,

        /// Records to skip
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// List CIs that duplicate an earlier CI's name and type
    Dedupe,

    /// Record a dependency from PARENT to CHILD
    Relate {
        parent: String,
        child: String,

        /// Relationship type
        #[arg(short = 't', long = "type", default_value = DEFAULT_RELATIONSHIP_TYPE)]
        relationship_type: String,
    },

    /// List relationships whose parent is the given CI
    Relationships {
        parent: String,
    },

    /// Merge fields into an existing CI
    Enrich {
        /// CI sys_id
        sys_id: String,

        /// Fields to merge as a JSON object
        data: String,
    },

    /// Check connectivity and credentials
    Health,

    /// Show current configuration
    Config {
        /// Show secrets (redacted by default)
        #[arg(long)]
        show_secrets: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let (config, source) = load_config(cli.config.as_deref())?;

    let logging = if cli.verbose {
        LoggingConfig::development()
    } else {
        LoggingConfig::default().with_level_name(&config.logging.level)
    };
    init_logging_with_config(LoggingConfig {
        json_format: config.logging.json_format,
        ..logging
    });

    match &source {
        Some(path) => info!(path = %path.display(), "Loaded configuration"),
        None => info!("No config file found; using defaults and SN_* environment"),
    }

    let format = cli.format;
    if let Commands::Config { show_secrets } = cli.command {
        return cmd_config(&config, show_secrets, format);
    }

    let client = Arc::new(
        TableApiClient::new(config.to_connector_config()?)
            .context("Failed to create ServiceNow client")?,
    );

    if let Commands::Health = cli.command {
        return cmd_health(client.as_ref(), format).await;
    }

    let manager = CiManager::new(client, AuditLog::new(config.audit_capacity))
        .with_dedup_scan_limit(config.dedup_scan_limit);
    debug!(
        instance = %config.instance_url,
        auth_method = %config.auth_method,
        dedup_scan_limit = config.dedup_scan_limit,
        "CI manager ready"
    );

    match cli.command {
        Commands::Create { data } => {
            let result = manager.create(&parse_record(&data)?).await?;
            print_value(&result, format)
        }
        Commands::Read { sys_id } => print_value(&manager.read(&sys_id).await?, format),
        Commands::Update { sys_id, data } => {
            let result = manager.update(&sys_id, &parse_record(&data)?).await?;
            print_value(&result, format)
        }
        Commands::Delete { sys_id } => {
            manager.delete(&sys_id).await?;
            if format == OutputFormat::Json {
                print_value(&serde_json::json!({ "deleted": sys_id }), format)
            } else {
                println!("{} {}", "Deleted".green(), sys_id);
                Ok(())
            }
        }
        Commands::Query {
            filter,
            limit,
            offset,
        } => print_value(&manager.query(&filter, limit, offset).await?, format),
        Commands::Dedupe => cmd_dedupe(&manager, format).await,
        Commands::Relate {
            parent,
            child,
            relationship_type,
        } => {
            let result = manager
                .add_relationship(&parent, &child, &relationship_type)
                .await?;
            print_value(&result, format)
        }
        Commands::Relationships { parent } => {
            let relationships = manager.get_relationships(&parent).await?;
            print_relationships(&parent, &relationships, format)
        }
        Commands::Enrich { sys_id, data } => {
            let result = manager.enrich(&sys_id, &parse_record(&data)?).await?;
            print_value(&result, format)
        }
        Commands::Health | Commands::Config { .. } => Ok(()),
    }
}

/// Loads the explicit config file, or the default one if present, then applies
/// `SN_*` environment overrides. Also returns the file that was read.
fn load_config(path: Option<&Path>) -> Result<(AppConfig, Option<PathBuf>)> {
    let source = match path {
        Some(path) => Some(path.to_path_buf()),
        None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
    };
    let config = match &source {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    Ok((config.with_env_overrides(), source))
}

/// Parses a JSON object argument.
fn parse_record(data: &str) -> Result<Record> {
    match serde_json::from_str::<Value>(data).context("Payload is not valid JSON")? {
        Value::Object(record) => Ok(record),
        other => bail!("Payload must be a JSON object, got {}", other),
    }
}

fn print_value(value: &Value, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(value)?),
        OutputFormat::Text => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

fn cmd_config(config: &AppConfig, show_secrets: bool, format: OutputFormat) -> Result<()> {
    let display_config = if show_secrets {
        config.clone()
    } else {
        config.redact_secrets()
    };

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&display_config)?);
    } else {
        println!("{}", "Current Configuration".bold());
        println!("─────────────────────────");
        println!("Instance:      {}", display_config.instance_url);
        println!("Auth method:   {}", display_config.auth_method);
        println!("Timeout:       {}s", display_config.timeout_secs);
        println!("Verify TLS:    {}", display_config.verify_tls);
        println!("Dedup limit:   {}", display_config.dedup_scan_limit);
        match config.validate() {
            Ok(()) => println!("Status:        {}", "valid".green()),
            Err(e) => println!("Status:        {} ({})", "invalid".red(), e),
        }
    }
    Ok(())
}

async fn cmd_health(client: &TableApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health_check().await?;
    let (status, detail) = match &health {
        ConnectorHealth::Healthy => ("healthy", None),
        ConnectorHealth::Degraded(reason) => ("degraded", Some(reason.as_str())),
        ConnectorHealth::Unhealthy(reason) => ("unhealthy", Some(reason.as_str())),
    };

    if format == OutputFormat::Json {
        let body = serde_json::json!({
            "instance": client.http().base_url(),
            "status": status,
            "detail": detail,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        let label = match health {
            ConnectorHealth::Healthy => status.green(),
            ConnectorHealth::Degraded(_) => status.yellow(),
            ConnectorHealth::Unhealthy(_) => status.red(),
        };
        match detail {
            Some(detail) => println!("{}: {} ({})", client.http().base_url(), label, detail),
            None => println!("{}: {}", client.http().base_url(), label),
        }
    }

    if matches!(health, ConnectorHealth::Unhealthy(_)) {
        std::process::exit(2);
    }
    Ok(())
}

async fn cmd_dedupe(manager: &CiManager, format: OutputFormat) -> Result<()> {
    let duplicates = manager.deduplicate().await?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&duplicates)?);
        return Ok(());
    }

    println!("{}", "Duplicate CIs".bold());
    println!("─────────────");
    if duplicates.is_empty() {
        println!("No duplicates found");
    }
    for record in &duplicates {
        println!(
            "  {}  {} ({})",
            field(record, "sys_id").cyan(),
            field(record, "name"),
            field(record, "ci_type")
        );
    }
    Ok(())
}

fn print_relationships(
    parent: &str,
    relationships: &[Relationship],
    format: OutputFormat,
) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(relationships)?);
        return Ok(());
    }

    if relationships.is_empty() {
        println!("No relationships for {}", parent);
    }
    for rel in relationships {
        println!(
            "  {} --[{}]--> {}",
            rel.parent,
            rel.relationship_type.cyan(),
            rel.child
        );
    }
    Ok(())
}

fn field(record: &Record, key: &str) -> String {
    match record.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "-".to_string(),
        Some(other) => other.to_string(),
    }
}
