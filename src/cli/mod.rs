//! Command-line interface: argument parsing and command dispatch.

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::assemble::{Assembler, MAX_COMPARE, WARM_DRUGS};
use crate::config::{Settings, StructuralMode};
use crate::render::{json, markdown};
use crate::server::AppState;

pub mod health;

#[derive(Parser, Debug)]
#[command(
    name = "repurpose",
    version,
    about = "Drug repurposing confidence scores from PubChem, ClinicalTrials.gov and MyChem"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Print JSON instead of Markdown
    #[arg(long, global = true)]
    pub json: bool,

    /// Bypass the in-process cache (every lookup hits the upstream)
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Structural similarity variant (overrides REPURPOSE_STRUCTURAL)
    #[arg(long, global = true, value_enum)]
    pub structural: Option<StructuralMode>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Full result record for one drug
    Search {
        name: String,
        /// Only the name, confidence and indication
        #[arg(long)]
        brief: bool,
        /// Append cache statistics
        #[arg(long)]
        stats: bool,
    },
    /// Side-by-side records for up to three drugs
    Compare {
        #[arg(required = true, num_args = 1..=MAX_COMPARE)]
        drugs: Vec<String>,
    },
    /// Confidence score with its similarity breakdown
    Score { name: String },
    /// Serve the JSON API
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// Pre-populate the cache for common drugs before binding
        #[arg(long)]
        warm: bool,
    },
    /// Check upstream connectivity and the reports directory
    Health {
        #[arg(long)]
        apis_only: bool,
    },
}

impl Cli {
    pub fn settings(&self) -> Settings {
        Settings::from_env()
            .with_no_cache(self.no_cache)
            .with_structural(self.structural)
    }
}

/// Runs the HTTP server until Ctrl-C.
pub async fn serve(settings: Settings, host: &str, port: u16, warm: bool) -> anyhow::Result<()> {
    let assembler = Arc::new(Assembler::from_settings(&settings)?);
    if warm {
        assembler.warm(&WARM_DRUGS).await;
    }
    crate::server::serve(
        AppState {
            assembler,
            reports_dir: settings.reports_dir,
        },
        host,
        port,
    )
    .await?;
    Ok(())
}

/// Runs a one-shot command and returns its rendered output.
pub async fn run(cli: Cli) -> anyhow::Result<String> {
    let settings = cli.settings();
    let json_output = cli.json;

    match cli.command {
        Commands::Search { name, brief, stats } => {
            let assembler = Assembler::from_settings(&settings)?;
            if brief {
                if name.trim().is_empty() {
                    anyhow::bail!(crate::error::RepurposeError::InvalidArgument(
                        "Drug name is required".into()
                    ));
                }
                let hits = assembler.search(&name).await;
                return Ok(if json_output {
                    json::to_pretty(&hits)?
                } else {
                    markdown::search_markdown(&name, &hits)?
                });
            }
            let record = assembler.record(&name).await?;
            if json_output {
                return Ok(json::to_pretty(&record)?);
            }
            let mut out = markdown::record_markdown(&record)?;
            if stats {
                let stats = assembler.stats();
                out.push_str(&format!(
                    "\nCache: {} entries, {} hits, {} misses\n",
                    stats.cache.entries, stats.cache.hits, stats.cache.misses
                ));
            }
            Ok(out)
        }
        Commands::Compare { drugs } => {
            let assembler = Assembler::from_settings(&settings)?;
            let records = assembler.compare(drugs.as_slice()).await?;
            if json_output {
                Ok(json::to_pretty(&records)?)
            } else {
                Ok(markdown::compare_markdown(&records)?)
            }
        }
        Commands::Score { name } => {
            let assembler = Assembler::from_settings(&settings)?;
            let (score, pair) = assembler.score(&name).await?;
            if json_output {
                Ok(json::to_pretty(&serde_json::json!({
                    "name": name.trim(),
                    "confidence": score,
                    "reference": assembler.reference(),
                    "similarity": pair,
                }))?)
            } else {
                Ok(markdown::score_markdown(
                    &name,
                    assembler.reference(),
                    score,
                    pair,
                )?)
            }
        }
        Commands::Health { apis_only } => {
            let report = health::check(&settings, apis_only).await?;
            if json_output {
                Ok(json::to_pretty(&report)?)
            } else {
                Ok(report.to_markdown())
            }
        }
        Commands::Serve { .. } => {
            anyhow::bail!("serve is handled by the binary entry point")
        }
    }
}
