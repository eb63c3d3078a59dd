use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

use lumi_azure_importer::azure::{AzureDevOpsClient, TestManagementApi};
use lumi_azure_importer::importer;
use lumi_azure_importer::report::{self, json::write_json, TestReport};
use lumi_azure_importer::utils::ImporterConfig;

#[derive(Parser)]
#[command(name = "lumi-azure-importer")]
#[command(author = "NL Team")]
#[command(version = "0.1.0")]
#[command(about = "Import automated test reports into Azure DevOps test runs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a test run and import the reports of a directory into it
    Import {
        /// Directory containing the report files (*.json)
        reports: PathBuf,

        /// Importer configuration file (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Name of the created run (overrides the config file)
        #[arg(long)]
        run_name: Option<String>,

        /// Build the run belongs to (overrides the config file)
        #[arg(long)]
        build_id: Option<u32>,

        /// Include points of every configuration, not only executed ones
        #[arg(long = "override", default_value = "false")]
        override_configurations: bool,
    },

    /// Merge the reports of a directory by configuration, without any remote call
    Merge {
        /// Directory containing the report files (*.json)
        reports: PathBuf,

        /// Output file path (prints to stdout if not provided)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the test cases of the configured plan and suite
    Cases {
        /// Importer configuration file (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Only list test cases with this automation status
        #[arg(long)]
        automated_status: Option<String>,
    },

    /// Show which test points a run would be created with
    Points {
        /// Directory containing the report files (*.json)
        reports: PathBuf,

        /// Importer configuration file (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Include points of every configuration, not only executed ones
        #[arg(long = "override", default_value = "false")]
        override_configurations: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Import {
            reports,
            config,
            run_name,
            build_id,
            override_configurations,
        } => {
            let mut config = load_config(&config)?;
            if let Some(name) = run_name {
                config.run_name = name;
            }
            if build_id.is_some() {
                config.build_id = build_id;
            }
            if override_configurations {
                config.override_configurations = true;
            }
            config.validate().context("Invalid configuration options")?;

            let reports = std::fs::canonicalize(&reports)
                .with_context(|| format!("Report directory not found: {}", reports.display()))?;

            println!(
                "{} Importing reports from: {}",
                "▶".green().bold(),
                reports.display()
            );
            println!("  Project: {}", config.project.cyan());
            println!(
                "  Plan / Suite: {}",
                format!("{} / {}", config.plan_id, config.suite_id).cyan()
            );
            println!("  Run: {}", config.run_name.cyan());
            if let Some(build_id) = config.build_id {
                println!("  Build: {}", build_id.to_string().yellow());
            }
            if config.override_configurations {
                println!("  Configurations: {}", "All".yellow());
            }

            let client = AzureDevOpsClient::new(&config.organization_url, &config.pat)?;
            let (summary, path) = importer::import_report_files(&client, &reports, &config).await?;

            match summary.run_id {
                Some(run_id) => println!(
                    "\n{} Imported {} result(s) and {} screenshot(s) into run {}",
                    "✓".green().bold(),
                    summary.test_case_results.len(),
                    summary.attachments.len(),
                    run_id.to_string().cyan()
                ),
                None => println!("\n{} No valid report to import", "⚠".yellow().bold()),
            }
            println!("  Summary: {}", path.display().to_string().cyan());
        }

        Commands::Merge { reports, output } => {
            println!(
                "{} Merging reports from: {}",
                "📊".to_string().blue(),
                reports.display()
            );
            let merged = report::merge_reports(report::load_reports(&reports)?);

            match output {
                Some(path) => {
                    write_json(&merged, &path)?;
                    println!(
                        "{} Wrote {} merged report(s) to {}",
                        "✓".green().bold(),
                        merged.len(),
                        path.display()
                    );
                }
                None => println!("{}", serde_json::to_string_pretty(&merged)?),
            }
        }

        Commands::Cases {
            config,
            automated_status,
        } => {
            let config = load_config(&config)?;
            config.validate().context("Invalid configuration options")?;
            let client = AzureDevOpsClient::new(&config.organization_url, &config.pat)?;

            println!(
                "{} Listing test cases of plan {} suite {}...",
                "🔍".to_string().blue(),
                config.plan_id.to_string().cyan(),
                config.suite_id.to_string().cyan()
            );
            let ids = list_test_cases(&client, &config, automated_status.as_deref()).await?;
            for id in &ids {
                println!("  {}", id);
            }
            println!("{} {} test case(s)", "✓".green().bold(), ids.len());
        }

        Commands::Points {
            reports,
            config,
            override_configurations,
        } => {
            let mut config = load_config(&config)?;
            if override_configurations {
                config.override_configurations = true;
            }
            config.validate().context("Invalid configuration options")?;
            let client = AzureDevOpsClient::new(&config.organization_url, &config.pat)?;

            let reports = valid_reports(&reports)?;
            let selected = importer::points::select_run_points(&client, &config, &reports).await?;

            println!(
                "{} {} point(s) would be added to the run",
                "✓".green().bold(),
                selected.len()
            );
            for id in &selected {
                println!("  {}", id);
            }
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<ImporterConfig> {
    ImporterConfig::from_file(path)
        .with_context(|| format!("Failed to load config: {}", path.display()))
}

fn valid_reports(dir: &Path) -> anyhow::Result<Vec<TestReport>> {
    let reports = report::load_reports(dir)?
        .into_iter()
        .filter(|report| report.validate().is_ok())
        .collect();
    Ok(report::merge_reports(reports))
}

async fn list_test_cases(
    api: &dyn TestManagementApi,
    config: &ImporterConfig,
    automated_status: Option<&str>,
) -> anyhow::Result<Vec<String>> {
    let cases = api
        .fetch_test_cases(&config.project, config.plan_id, &[config.suite_id])
        .await?;
    Ok(match automated_status {
        Some(status) => importer::points::automated_test_case_ids(&cases, status),
        None => cases.iter().map(|case| case.id()).collect(),
    })
}
