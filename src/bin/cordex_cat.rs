use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use cordex_catalog::app::App;
use cordex_catalog::catalog::CatalogBuilder;
use cordex_catalog::config::{ConfigLoader, ResolvedConfig, ScanTarget};
use cordex_catalog::error::CatalogError;
use cordex_catalog::output::{JsonOutput, OutputMode, TextOutput};
use cordex_catalog::translate::Translator;
use cordex_catalog::walker::FsWalker;

#[derive(Parser)]
#[command(name = "cordex-cat")]
#[command(about = "Catalog CORDEX climate-model output from its data reference syntax paths")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Build, inspect and summarize catalogs")]
    Catalog(CatalogArgs),
    #[command(about = "List registered DRS templates")]
    Projects,
}

#[derive(Args)]
struct CatalogArgs {
    #[command(subcommand)]
    command: CatalogCommand,
}

#[derive(Subcommand)]
enum CatalogCommand {
    #[command(about = "Scan DRS trees and write the catalog table")]
    Build(BuildArgs),
    #[command(about = "Parse a single path and show the extracted fields")]
    Parse(ParseArgs),
    #[command(about = "Summarize datasets and variables of an existing catalog")]
    Summary(SummaryArgs),
}

#[derive(Args)]
struct BuildArgs {
    #[arg(long, value_name = "PROJECT=ROOT")]
    target: Vec<String>,

    #[arg(long, requires = "root")]
    project: Option<String>,

    #[arg(long, requires = "project")]
    root: Option<Utf8PathBuf>,

    #[arg(long)]
    output: Option<Utf8PathBuf>,

    #[arg(long)]
    follow_links: bool,
}

#[derive(Args)]
struct ParseArgs {
    path: String,

    #[arg(long)]
    project: String,
}

#[derive(Args)]
struct SummaryArgs {
    catalog: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<CatalogError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CatalogError) -> u8 {
    match error {
        CatalogError::UnknownProject(_)
        | CatalogError::MissingConfig
        | CatalogError::ConfigRead(_)
        | CatalogError::ConfigParse(_)
        | CatalogError::InvalidTarget(_)
        | CatalogError::InvalidTemplate { .. }
        | CatalogError::InvalidPattern { .. }
        | CatalogError::InvalidMipEra(_) => 2,
        CatalogError::UnreadableRoot { .. } | CatalogError::Filesystem(_) => 3,
        CatalogError::CatalogFormat(_) => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    match cli.command {
        Commands::Catalog(args) => match args.command {
            CatalogCommand::Build(args) => run_build(args, cli.config.as_deref(), output_mode),
            CatalogCommand::Parse(args) => run_parse(args, cli.config.as_deref(), output_mode),
            CatalogCommand::Summary(args) => {
                run_summary(args, cli.config.as_deref(), output_mode)
            }
        },
        Commands::Projects => run_projects(cli.config.as_deref(), output_mode),
    }
}

fn build_app(config: &ResolvedConfig, walker: FsWalker) -> App<FsWalker> {
    let builder = CatalogBuilder::new(config.registry.clone(), Translator::default());
    App::new(builder, walker)
}

fn run_build(args: BuildArgs, config: Option<&str>, output_mode: OutputMode) -> miette::Result<()> {
    let BuildArgs {
        target,
        project,
        root,
        output,
        follow_links,
    } = args;

    let mut targets = target
        .iter()
        .map(|value| value.parse::<ScanTarget>())
        .collect::<Result<Vec<_>, _>>()?;
    if let (Some(project), Some(root)) = (project, root) {
        targets.push(ScanTarget::new(project, root));
    }

    let resolved = if targets.is_empty() {
        ConfigLoader::resolve(config)?
    } else {
        ConfigLoader::resolve_or_default(config)?
    };
    if targets.is_empty() {
        targets = resolved.targets.clone();
    }
    if targets.is_empty() {
        return Err(miette::Report::msg(
            "no scan targets (use --target PROJECT=ROOT or list projects in the config)",
        ));
    }
    let output = output.unwrap_or_else(|| resolved.output.clone());

    let walker = FsWalker { follow_links };
    let app = build_app(&resolved, walker);
    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.build_catalog(&targets, &output, &JsonOutput)?;
            JsonOutput::print_scan(&result).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let result = app.build_catalog(&targets, &output, &TextOutput)?;
            TextOutput::print_scan(&result, output.as_str()).into_diagnostic()?;
        }
    }
    Ok(())
}

fn run_parse(args: ParseArgs, config: Option<&str>, output_mode: OutputMode) -> miette::Result<()> {
    let resolved = ConfigLoader::resolve_or_default(config)?;
    let app = build_app(&resolved, FsWalker::new());
    let result = app.parse_path(&args.path, &args.project)?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_parse(&result).into_diagnostic(),
        OutputMode::Interactive => TextOutput::print_parse(&result).into_diagnostic(),
    }
}

fn run_summary(
    args: SummaryArgs,
    config: Option<&str>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let resolved = ConfigLoader::resolve_or_default(config)?;
    let catalog = args.catalog.unwrap_or_else(|| resolved.output.clone());
    let app = build_app(&resolved, FsWalker::new());
    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.summarize(&catalog, &JsonOutput)?;
            JsonOutput::print_summary(&result).into_diagnostic()
        }
        OutputMode::Interactive => {
            let result = app.summarize(&catalog, &TextOutput)?;
            TextOutput::print_summary(&result).into_diagnostic()
        }
    }
}

fn run_projects(config: Option<&str>, output_mode: OutputMode) -> miette::Result<()> {
    let resolved = ConfigLoader::resolve_or_default(config)?;
    let app = build_app(&resolved, FsWalker::new());
    let projects = app.projects();
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_projects(&projects).into_diagnostic(),
        OutputMode::Interactive => TextOutput::print_projects(&projects).into_diagnostic(),
    }
}
