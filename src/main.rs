//! Testrig CLI - classify test modules and run test pipelines

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use testrig::classifier::PlatformFilter;
use testrig::{
    BuildTarget, FixSuggestion, RunConfig, SettingsOverride, TestPlatform, TestRun, TestrigError,
};

#[derive(Parser)]
#[command(name = "testrig")]
#[command(about = "Testrig - test run orchestration across target platforms")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify the modules of a run file into edit-mode and play-mode tests
    Classify {
        /// Path to the run file
        file: PathBuf,

        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Validate a run file (parse and validate)
    Validate {
        /// Path to the run file
        file: PathBuf,
    },

    /// Run the test pipeline with the dry-run toolchain
    Run {
        /// Path to the run file
        file: PathBuf,

        /// Override target platform (android, ios, switch, ...)
        #[arg(short, long)]
        platform: Option<BuildTarget>,

        /// Override random order seed
        #[arg(long)]
        seed: Option<i32>,

        /// Override retry count
        #[arg(long)]
        retry: Option<u32>,

        /// Override repeat count
        #[arg(long)]
        repeat: Option<u32>,

        /// Print the event log as JSON when done
        #[arg(long)]
        events: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Classify { file, format } => classify_modules(&file, format),
        Commands::Validate { file } => validate_run(&file),
        Commands::Run {
            file,
            platform,
            seed,
            retry,
            repeat,
            events,
        } => {
            let overrides = SettingsOverride {
                platform,
                seed,
                retry,
                repeat,
            };
            run_tests(&file, overrides, events).await
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn classify_modules(file: &Path, format: Format) -> Result<(), TestrigError> {
    let config = RunConfig::load(file)?;
    let classification = config
        .classifier()
        .classify_with(&config.module_set(), config.flag_source().as_ref());

    match format {
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(&classification)?);
        }
        Format::Text => {
            for platform in TestPlatform::ALL {
                let names = classification.names(platform);
                println!("{} ({})", platform.to_string().cyan().bold(), names.len());
                for name in names {
                    println!("  {}", name);
                }
            }
            println!(
                "{} {} test modules",
                "→".cyan(),
                classification.select(PlatformFilter::ALL).len()
            );
        }
    }
    Ok(())
}

fn validate_run(file: &Path) -> Result<(), TestrigError> {
    let config = RunConfig::load(file)?;

    println!("{} Run file '{}' is valid", "✓".green(), file.display());
    println!("  Target: {}", config.settings.target_platform);
    println!("  Modules: {}", config.modules.len());
    println!(
        "  Catalog: {}",
        if config.catalog.is_some() { "yes" } else { "no" }
    );
    println!("  Output: {}", config.pipeline.output_dir.display());
    Ok(())
}

async fn run_tests(
    file: &Path,
    overrides: SettingsOverride,
    print_events: bool,
) -> Result<(), TestrigError> {
    let mut config = RunConfig::load(file)?;
    config.apply(overrides);

    println!(
        "{} Target: {} | modules: {}",
        "→".cyan(),
        config.settings.target_platform,
        config.modules.len()
    );

    let report = TestRun::new(config).execute().await;
    if print_events {
        println!("{}", serde_json::to_string_pretty(&report.events().to_json())?);
    }

    let ctx = report.into_result()?;
    if let Some(options) = &ctx.build_options {
        println!("{} Player: {}", "✓".green(), options.output_path.display());
    }
    if let Some(classification) = &ctx.classification {
        println!(
            "{} {} play mode, {} edit mode test modules",
            "✓".green(),
            classification.bucket(TestPlatform::PlayMode).len(),
            classification.bucket(TestPlatform::EditMode).len()
        );
    }
    Ok(())
}
