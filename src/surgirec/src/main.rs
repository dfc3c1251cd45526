//! SurgiRec: Surgical Treatment Recommender.
//!
//! Loads the pre-trained decision table once at startup, then either serves
//! recommendations over HTTP or answers a single intake from the command line.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use surgirec_api::rest::PolicyInfoResponse;
use surgirec_api::ApiServer;
use surgirec_core::config::AppConfig;
use surgirec_core::error::RecommenderError;
use surgirec_core::types::{Gender, PatientProfile};
use surgirec_policy::PolicyEngine;
use tracing::{error, info, warn};

/// Exit status for an intake whose discretized state the table does not cover.
const EXIT_INVALID_STATE: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "surgirec")]
#[command(about = "Surgical Treatment Recommender based on Q-learning (balanced data)")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "SURGIREC_CONFIG")]
    config: Option<String>,

    /// Policy table (.npy) path (overrides config)
    #[arg(long, global = true)]
    table: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve recommendations over HTTP
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// HTTP port (overrides config)
        #[arg(long, env = "SURGIREC__API__HTTP_PORT")]
        http_port: Option<u16>,

        /// Prometheus exporter port (overrides config)
        #[arg(long)]
        metrics_port: Option<u16>,

        /// Do not start the Prometheus exporter
        #[arg(long, default_value_t = false)]
        no_metrics: bool,
    },

    /// Recommend a treatment for one patient profile
    Recommend {
        #[command(flatten)]
        intake: IntakeArgs,

        /// Print the decision as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show the loaded policy table shape, actions and bin thresholds
    Inspect {
        /// Print as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

/// Patient intake. Defaults match the intake form's initial values.
#[derive(Args, Debug)]
struct IntakeArgs {
    /// female | male
    #[arg(long, default_value = "female")]
    gender: Gender,

    /// Age in years (1–100)
    #[arg(long, default_value_t = 25.0)]
    age: f64,

    /// Body mass index (10–60)
    #[arg(long, default_value_t = 22.0)]
    bmi: f64,

    /// White blood cell count (0–30)
    #[arg(long, default_value_t = 7.0)]
    wbc: f64,

    /// Serum sodium (120–160)
    #[arg(long, default_value_t = 138.0)]
    sodium: f64,

    /// Hemoglobin (5–20)
    #[arg(long, default_value_t = 13.5)]
    hemoglobin: f64,

    /// Serum potassium (2–6.5)
    #[arg(long, default_value_t = 4.2)]
    potassium: f64,
}

impl From<IntakeArgs> for PatientProfile {
    fn from(args: IntakeArgs) -> Self {
        Self {
            gender: args.gender,
            age: args.age,
            bmi: args.bmi,
            wbc: args.wbc,
            sodium: args.sodium,
            hemoglobin: args.hemoglobin,
            potassium: args.potassium,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr so command output on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "surgirec=info,tower_http=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    // Config errors are fatal; there is no fallback to defaults.
    let mut config = AppConfig::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("failed to load config file '{path}'"),
        None => "failed to load config from environment".to_string(),
    })?;

    if let Some(table) = cli.table {
        config.policy.table_path = table;
    }

    // The table is required for every command.
    let engine = match PolicyEngine::new(&config) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            error!(
                error = %e,
                path = %config.policy.table_path,
                "Failed to initialize policy engine"
            );
            return Err(e.context("policy table unavailable, cannot start"));
        }
    };

    match cli.command {
        Commands::Serve {
            host,
            http_port,
            metrics_port,
            no_metrics,
        } => {
            if let Some(host) = host {
                config.api.host = host;
            }
            if let Some(port) = http_port {
                config.api.http_port = port;
            }
            if let Some(port) = metrics_port {
                config.metrics.port = port;
            }
            if no_metrics {
                config.metrics.enabled = false;
            }
            serve(config, engine).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Recommend { intake, json } => recommend(&engine, intake.into(), json),
        Commands::Inspect { json } => {
            inspect(&engine, json)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn serve(config: AppConfig, engine: Arc<PolicyEngine>) -> anyhow::Result<()> {
    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        metrics_port = config.metrics.port,
        "Configuration loaded"
    );

    let api_server = ApiServer::new(config, engine);

    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("SurgiRec is ready to serve recommendations");

    // Blocks until shutdown
    api_server.start_http().await
}

fn recommend(
    engine: &PolicyEngine,
    profile: PatientProfile,
    json: bool,
) -> anyhow::Result<ExitCode> {
    match engine.recommend(&profile) {
        Ok(decision) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&decision)?);
            } else {
                println!("{decision}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(RecommenderError::Lookup(e)) => {
            warn!(error = %e, "Discretized state outside policy table");
            eprintln!(
                "Warning: invalid state {}. Please adjust input values.",
                e.state()
            );
            Ok(ExitCode::from(EXIT_INVALID_STATE))
        }
        Err(e) => Err(e.into()),
    }
}

fn inspect(engine: &PolicyEngine, json: bool) -> anyhow::Result<()> {
    let info = PolicyInfoResponse::new(engine);

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let shape: Vec<String> = info.shape.iter().map(|d| d.to_string()).collect();
    println!("Q-table shape: ({})", shape.join(", "));
    println!("Actions:       {}", info.actions.join(", "));
    println!("Bins per axis: {:?}", info.state_cardinalities);
    println!();
    println!("Thresholds:");
    for entry in &info.thresholds {
        println!("  {:<12} {:?}", entry.feature.name(), entry.thresholds);
    }
    Ok(())
}
