use agency_catalog::batch::{load_agency_list, load_catalog};
use agency_catalog::lookup::{DEFAULT_CODE_COLUMN, DEFAULT_NAME_COLUMN};
use agency_catalog::{
    telemetry, AgencyTypeTable, AmbiguityPolicy, BatchRunner, CatalogConfig, CodeLookup,
    Normalizer, Registry, RuleEngine,
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "agency-catalog",
    about = "Count the distinct police agencies covered by a data catalog",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Count distinct agencies in a catalog and its multi-agency lists
    Count(CountArgs),
    /// Print the canonical form of each name
    Normalize {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Print the base name and agency type of each name
    Clean {
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct CountArgs {
    /// Source catalog CSV (State, Agency, AgencyFull, SourceName)
    #[arg(long)]
    catalog: PathBuf,

    /// Agency-name lists (State, Agency) from multi-agency datasets
    #[arg(long = "agencies")]
    agencies: Vec<PathBuf>,

    /// Agency-code lists (State, Agency) resolved through --lookup
    #[arg(long = "agency-codes")]
    agency_codes: Vec<PathBuf>,

    /// Code-to-name lookup CSV
    #[arg(long)]
    lookup: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_CODE_COLUMN)]
    code_column: String,

    #[arg(long, default_value = DEFAULT_NAME_COLUMN)]
    name_column: String,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON array of match rules (replaces the built-in rules)
    #[arg(long)]
    rules: Option<PathBuf>,

    /// What to do with names that cannot be resolved: fail, skip or flag
    #[arg(long, value_parser = parse_policy)]
    policy: Option<AmbiguityPolicy>,

    /// Write the full JSON report here
    #[arg(long)]
    report: Option<PathBuf>,
}

fn parse_policy(value: &str) -> Result<AmbiguityPolicy, String> {
    AmbiguityPolicy::parse(value).ok_or_else(|| format!("unknown policy {:?} (expected fail, skip or flag)", value))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Count(args) => run_count(args),
        Command::Normalize { names } => run_normalize(&names),
        Command::Clean { names } => run_clean(&names),
    }
}

fn init_logging(config: &CatalogConfig) -> Result<()> {
    telemetry::init(&config.log_level).context("Failed to initialize logging")
}

fn run_count(args: CountArgs) -> Result<()> {
    let mut config = CatalogConfig::load(args.config.as_deref())?;
    if let Some(policy) = args.policy {
        config.ambiguity_policy = policy;
    }
    init_logging(&config)?;

    let rules = match &args.rules {
        Some(path) => RuleEngine::from_file(path)?,
        None => RuleEngine::with_defaults(),
    };

    let registry = Registry::from_config(&config, rules);
    let mut runner = BatchRunner::new(registry, &config);

    if let Some(path) = &args.lookup {
        let lookup = CodeLookup::from_path(path, &args.code_column, &args.name_column)?;
        runner = runner.with_lookup(lookup);
    }

    let catalog = load_catalog(&args.catalog)?;
    runner.add_catalog(&catalog)?;

    for path in &args.agencies {
        let rows = load_agency_list(path)?;
        runner.add_agency_names(&rows, &source_name(path))?;
    }

    for path in &args.agency_codes {
        let rows = load_agency_list(path)?;
        runner.add_agency_codes(&rows, &source_name(path))?;
    }

    let report = runner.report();
    println!("{}", report.details());
    if !report.review.is_empty() {
        println!("⚠️  {} names need manual review", report.review.len());
    }
    if !report.errors.is_empty() {
        println!("⚠️  {} records could not be considered", report.errors.len());
    }
    println!("{}", report.summary());

    if let Some(path) = &args.report {
        report.write_json(path)?;
        println!("✓ Report written to {}", path.display());
    }

    Ok(())
}

fn run_normalize(names: &[String]) -> Result<()> {
    let config = CatalogConfig::load(None)?;
    init_logging(&config)?;
    let normalizer = Normalizer::new(&config.normalizer);

    for raw in names {
        match normalizer.normalize(raw) {
            Ok(canonical) => println!("{} -> {}", raw, canonical),
            Err(skip) => println!("{} -> skipped ({})", raw, skip.reason),
        }
    }

    Ok(())
}

fn run_clean(names: &[String]) -> Result<()> {
    let config = CatalogConfig::load(None)?;
    init_logging(&config)?;
    let normalizer = Normalizer::new(&config.normalizer);
    let types = AgencyTypeTable::default();

    for raw in names {
        println!("{}", describe(&normalizer, &types, raw));
    }

    Ok(())
}

/// Base name and type of the canonical form
fn describe(normalizer: &Normalizer, types: &AgencyTypeTable, raw: &str) -> String {
    let canonical = match normalizer.normalize(raw) {
        Ok(canonical) => canonical,
        Err(skip) => return format!("{} -> skipped ({})", raw, skip.reason),
    };

    let classified = types.classify(&canonical);
    match classified.kind {
        Some(kind) => format!("{} -> {} [{}]", raw, classified.base, kind.as_str()),
        None => format!("{} -> {} [unknown type]", raw, classified.base),
    }
}

fn source_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
