// attest/src/main.rs

use clap::{Parser, Subcommand, ValueEnum};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

// Infrastructure (Config & Adapters)
use attest_core::infrastructure::adapters::duckdb::DuckDbDirectory;
use attest_core::infrastructure::config::project::load_project_config;
use attest_core::infrastructure::config::schema::SchemaAdapter;
use attest_core::infrastructure::dataset::load_csv_dataset;
use attest_core::infrastructure::store::FsSnapshotStore;

// Domain (Ports + Types)
use attest_core::domain::mapping::build_mapping_document;
use attest_core::domain::ports::SchemaSource;
use attest_core::domain::report::ReportKind;
use attest_core::domain::snapshot::SnapshotContent;

// Application (Use Cases)
use attest_core::application::resolution::{ResolutionOptions, ResolutionOutcome};
use attest_core::application::{
    freeze_snapshot, generate_all_reports, generate_report, resolve_lookups, run_validation,
};

#[derive(Parser)]
#[command(name = "attest")]
#[command(about = "Schema Validation & Lookup Resolution Engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 🚀 Runs the full pipeline (Match -> Validate -> Resolve -> Snapshot -> Reports)
    Run {
        /// Project directory
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        /// Input file (CSV) to validate
        #[arg(long, short)]
        input: PathBuf,

        /// Validate only: skip directory resolution even if configured
        #[arg(long, default_value = "false")]
        skip_resolve: bool,
    },

    /// 📑 Regenerates one report from a frozen snapshot
    Report {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        /// Snapshot hash the report must be built from
        #[arg(long)]
        snapshot_hash: String,

        #[arg(long, value_enum)]
        kind: ReportKindArg,
    },

    /// 🗺️  Generates the column mapping artifact for an input file
    Mapping {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        #[arg(long, short)]
        input: PathBuf,

        /// Output file (YAML); stdout when omitted
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// 📚 Lists the schema definitions known to this project
    Schemas {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReportKindArg {
    Summary,
    Mapping,
    Verify,
    Exceptions,
}

impl From<ReportKindArg> for ReportKind {
    fn from(arg: ReportKindArg) -> Self {
        match arg {
            ReportKindArg::Summary => ReportKind::Summary,
            ReportKindArg::Mapping => ReportKind::Mapping,
            ReportKindArg::Verify => ReportKind::Verify,
            ReportKindArg::Exceptions => ReportKind::Exceptions,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Setup Logging (Tracing)
    // RUST_LOG=debug attest run ... pour voir les détails
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        // --- USE CASE: FULL PIPELINE ---
        Commands::Run {
            project_dir,
            input,
            skip_resolve,
        } => {
            let start = std::time::Instant::now();

            // A. Load the Config (Infra)
            println!("⚙️  Loading configuration...");
            let config = load_project_config(&project_dir)?;
            println!("   Project: {} (v{})", config.name, config.version);

            // B. Load schemas and dataset
            // Here is where dependency injection happens: the schema source
            // is an adapter behind a domain port.
            let schema_source = SchemaAdapter;
            let schemas = schema_source.load(&project_dir.join(&config.schemas_path))?;
            let dataset = load_csv_dataset(&input)?;

            // C. Match + validate (Application Layer)
            let run = match run_validation(&schemas, &dataset, config.sample_rows) {
                Ok(run) => run,
                Err(e) => {
                    eprintln!("\n💥 VALIDATION ABORTED: {}", e);
                    std::process::exit(1);
                }
            };
            let stats = run.stats();
            println!(
                "   {} valid / {} invalid row(s) ({:.1}%)",
                stats.valid_rows, stats.invalid_rows, stats.success_rate
            );

            // D. Resolve against the tenant directory (if configured)
            let resolution = match (&config.directory, skip_resolve) {
                (Some(directory_config), false) => {
                    let directory = DuckDbDirectory::from_config(directory_config, &project_dir)?;
                    let options = ResolutionOptions {
                        max_in_flight: config.resolver.max_in_flight,
                        query_timeout: Duration::from_millis(config.resolver.query_timeout_ms),
                        retry_backoff: Duration::from_millis(config.resolver.retry_backoff_ms),
                    };
                    let schema = schemas
                        .get(&run.schema_id)
                        .ok_or_else(|| anyhow::anyhow!("Schema '{}' not found", run.schema_id))?;

                    resolve_lookups(
                        schema,
                        &dataset,
                        &run.rows,
                        &directory,
                        &options,
                        &HashSet::new(),
                    )
                    .await
                }
                _ => {
                    println!("🔗 Directory resolution skipped.");
                    ResolutionOutcome::default()
                }
            };

            // E. Freeze + reports (read the frozen copy only)
            let store = FsSnapshotStore::new(project_dir.join(&config.target_path));
            let content = SnapshotContent {
                schema_id: run.schema_id.clone(),
                document_type: run.document_type.clone(),
                match_score: run.match_score,
                mapping: run.mapping.clone(),
                dataset,
                rows: run.rows,
                attempts: resolution.attempts,
                exceptions: resolution.exceptions,
            };

            let result = freeze_snapshot(content, &store)
                .and_then(|snapshot| generate_all_reports(&snapshot.hash, &store));

            match result {
                Ok(artifacts) => {
                    for artifact in &artifacts {
                        println!(
                            "   📄 {} report -> {} ({})",
                            artifact.kind, artifact.report_id, artifact.snapshot_hash
                        );
                    }
                    println!("\n✨ SUCCESS! Pipeline finished in {:.2?}", start.elapsed());
                }
                Err(e) => {
                    eprintln!("\n💥 REPORTING FAILED: {}", e);
                    std::process::exit(1);
                }
            }
        }

        // --- USE CASE: REGENERATE ONE REPORT ---
        Commands::Report {
            project_dir,
            snapshot_hash,
            kind,
        } => {
            let config = load_project_config(&project_dir)?;
            let store = FsSnapshotStore::new(project_dir.join(&config.target_path));

            match generate_report(kind.into(), &snapshot_hash, &store) {
                Ok(artifact) => {
                    println!(
                        "📄 {} regenerated as {} from snapshot {}",
                        artifact.kind, artifact.report_id, artifact.snapshot_hash
                    );
                    println!("{}", serde_json::to_string_pretty(&artifact.body)?);
                }
                Err(e) => {
                    eprintln!("❌ Report generation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        // --- USE CASE: MAPPING ARTIFACT ---
        Commands::Mapping {
            project_dir,
            input,
            output,
        } => {
            let config = load_project_config(&project_dir)?;
            let schemas = SchemaAdapter.load(&project_dir.join(&config.schemas_path))?;
            let dataset = load_csv_dataset(&input)?;

            let run = run_validation(&schemas, &dataset, config.sample_rows)?;
            let schema = schemas
                .get(&run.schema_id)
                .ok_or_else(|| anyhow::anyhow!("Schema '{}' not found", run.schema_id))?;

            let document = build_mapping_document(schema, &run.mapping);
            let yaml = serde_yaml::to_string(&document)?;

            match output {
                Some(path) => {
                    std::fs::write(&path, &yaml)?;
                    println!("🗺️  Mapping written to {}", path.display());
                }
                None => print!("{}", yaml),
            }
        }

        // --- USE CASE: LIST SCHEMAS ---
        Commands::Schemas { project_dir } => {
            let config = load_project_config(&project_dir)?;
            let schemas = SchemaAdapter.load(&project_dir.join(&config.schemas_path))?;

            println!("📚 {} schema(s) loaded:", schemas.len());
            for schema in schemas.iter() {
                println!(
                    "   - {} ({}): {} field(s), threshold {:.0}%, lookup: {:?}",
                    schema.id,
                    schema.document_type,
                    schema.fields().len(),
                    schema.pass_threshold,
                    schema.lookup_keys()
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run_defaults() {
        let args = Cli::parse_from(["attest", "run", "--input", "data.csv"]);
        match args.command {
            Commands::Run {
                project_dir,
                input,
                skip_resolve,
            } => {
                assert_eq!(project_dir.to_string_lossy(), ".");
                assert_eq!(input.to_string_lossy(), "data.csv");
                assert!(!skip_resolve);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_parse_report_kind() {
        let args = Cli::parse_from([
            "attest",
            "report",
            "--snapshot-hash",
            "0123456789ab",
            "--kind",
            "exceptions",
        ]);
        match args.command {
            Commands::Report {
                snapshot_hash,
                kind,
                ..
            } => {
                assert_eq!(snapshot_hash, "0123456789ab");
                assert!(matches!(kind, ReportKindArg::Exceptions));
            }
            _ => panic!("Expected Report command"),
        }
    }

    #[test]
    fn test_cli_parse_mapping_output() {
        let args = Cli::parse_from([
            "attest", "mapping", "--input", "data.csv", "--output", "map.yaml",
        ]);
        match args.command {
            Commands::Mapping { output, .. } => {
                assert_eq!(output.unwrap().to_string_lossy(), "map.yaml");
            }
            _ => panic!("Expected Mapping command"),
        }
    }
}
