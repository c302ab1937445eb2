use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use audit_sampler::config::Config;
use audit_sampler::logging;
use audit_sampler::metrics;
use audit_sampler::pipeline::export::{exporter_for, OutputFormat};
use audit_sampler::pipeline::{Pipeline, PipelineResult};
use audit_sampler::server;

#[derive(Parser)]
#[command(name = "audit-sampler")]
#[command(about = "Priority-weighted audit sampling of coding event spreadsheets")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file (defaults to ./audit_sampler.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample one input file and write the export
    Run {
        /// Input spreadsheet (.xlsx or .csv)
        #[arg(long, short)]
        input: PathBuf,
        /// Output path (defaults to the configured output path)
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Output format (defaults to the configured format)
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
        /// Seed for the sampler; omit for a fresh random sample
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Serve the upload / display / download surface over HTTP
    Serve {
        /// Port to listen on (defaults to the configured port)
        #[arg(long, env = "AUDIT_SAMPLER_PORT")]
        port: Option<u16>,
    },
}

fn print_report(result: &PipelineResult) {
    println!("\n📊 Sampling results:");
    if let Some(seed) = result.seed {
        println!("   Seed: {}", seed);
    }
    println!("   Input rows: {}", result.filter.input_rows);
    println!(
        "   Excluded: {} (user profile {}, changed using {})",
        result.filter.excluded(),
        result.filter.excluded_by_user_profile,
        result.filter.excluded_by_changed_using
    );
    println!("   User profiles: {}", result.groups.len());
    println!("   Drawn: {}", result.sampled_rows);
    println!("   Duplicates removed: {}", result.dedup.removed_rows);
    println!("   Final sample: {}", result.final_sample.len());

    let short = result.short_groups();
    if !short.is_empty() {
        println!("\n⚠️  Below quota after deduplication:");
        for (profile, kept, quota) in short {
            println!("   - {profile}: {kept}/{quota}");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let pipeline = Pipeline::from_config(&config)?;

    match cli.command {
        Commands::Run {
            input,
            output,
            format,
            seed,
        } => {
            println!("🔄 Sampling {}...", input.display());
            let format = format.unwrap_or(config.output.format);
            let output = output.unwrap_or_else(|| config.output.path.clone());

            let result = match pipeline.run_path(&input, seed) {
                Ok(result) => result,
                Err(e) => {
                    error!("Run failed: {}", e);
                    return Err(e).with_context(|| format!("processing {}", input.display()));
                }
            };
            print_report(&result);

            let files = exporter_for(format)
                .write(&result.report(), &output)
                .with_context(|| format!("writing {}", output.display()))?;
            for file in &files {
                println!("💾 Saved {}", file.display());
            }
            info!(run_id = %result.run_id, files = files.len(), "export complete");
        }
        Commands::Serve { port } => {
            metrics::init_metrics();
            let port = port.unwrap_or(config.server.port);
            server::start_server(pipeline, port)
                .await
                .map_err(|e| anyhow::anyhow!("server error: {e}"))?;
        }
    }
    Ok(())
}
