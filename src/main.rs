use anyhow::{Context, Result};
use clap::Parser;
use idveil::cli::{Cli, Command, OutputFormat};
use idveil::concealment::{Concealer, MetadataFilter, ProcessGuard, ProcessIdentity, StackFrame};
use idveil::config::{ConfigSnapshot, EngineConfig, SnapshotStore};
use idveil::identifier::IdentifierType;
use idveil::interception::{HookCatalog, HookTarget};
use idveil::resolver::{derive, DerivationSeed, Resolution, ResolutionContext, Resolver, ValueSource};
use rand::Rng;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn parse_type(key: &str) -> Result<IdentifierType> {
    Ok(key.parse::<IdentifierType>()?)
}

/// Read a file, or stdin when no path is given
fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input: {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn describe_source(source: &ValueSource) -> String {
    match source {
        ValueSource::Profile { profile_id } => format!("profile:{}", profile_id),
        ValueSource::Derived { profile_id, group } => format!("derived:{}/{}", profile_id, group),
        ValueSource::Fallback { reason } => format!("fallback:{:?}", reason),
    }
}

fn describe_target(target: &HookTarget) -> String {
    match target {
        HookTarget::Identity {
            identifier,
            projection,
            selector,
        } => {
            let mut out = format!("{} ({:?})", identifier, projection);
            if let Some(key) = selector {
                out.push_str(&format!(" when {:?}", key));
            }
            out
        }
        HookTarget::Concealment { surface } => format!("conceal:{}", surface),
    }
}

fn run_resolve(
    config: &Path,
    app: &str,
    types: &[String],
    salt: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    let snapshot = ConfigSnapshot::from_json_file(config)?;
    let context = match salt {
        Some(salt) => ResolutionContext::with_session_salt(salt),
        None => ResolutionContext::new(),
    };
    let resolver = Resolver::new(Arc::new(SnapshotStore::new(snapshot)), context);

    let types = if types.is_empty() {
        IdentifierType::ALL.to_vec()
    } else {
        types
            .iter()
            .map(|t| parse_type(t))
            .collect::<Result<Vec<_>>>()?
    };

    let resolved: Vec<(IdentifierType, Resolution)> = types
        .into_iter()
        .map(|ty| (ty, resolver.resolve(app, ty)))
        .collect();

    match format {
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = resolved
                .iter()
                .map(|(ty, r)| serde_json::json!({ "type": ty, "resolution": r }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Text => {
            for (ty, resolution) in &resolved {
                match resolution {
                    Resolution::Value { value, source } => {
                        println!("{}\t{}\t{}", ty, value, describe_source(source))
                    }
                    Resolution::PassThrough => println!("{}\t-\tpass-through", ty),
                }
            }
        }
    }
    Ok(())
}

fn run_generate(ty: &str, count: usize, seed: Option<u64>, format: OutputFormat) -> Result<()> {
    let ty = parse_type(ty)?;
    let base = seed.unwrap_or_else(|| rand::thread_rng().gen());
    let values: Vec<String> = (0..count as u64)
        .map(|i| derive::derive_value(&DerivationSeed::for_session("generate", base.wrapping_add(i)), ty))
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&values)?),
        OutputFormat::Text => {
            for value in &values {
                println!("{}", value);
            }
        }
    }
    Ok(())
}

fn run_validate(ty: &str, value: &str) -> Result<()> {
    let ty = parse_type(ty)?;
    if !derive::is_well_formed(ty, value) {
        anyhow::bail!("{:?} is not a well-formed {}", value, ty);
    }
    println!("valid {}", ty);
    Ok(())
}

fn run_catalog(file: Option<&Path>, format: OutputFormat) -> Result<()> {
    let catalog = match file {
        Some(path) => HookCatalog::from_toml(path)?,
        None => HookCatalog::default_catalog()?,
    };
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&catalog)?),
        OutputFormat::Text => {
            println!("catalog v{} ({} hooks)", catalog.version, catalog.len());
            for entry in &catalog.entries {
                println!("{}\t{}", entry.site, describe_target(&entry.target));
            }
        }
    }
    Ok(())
}

fn run_check_process(config: &EngineConfig, package: &str, process: Option<String>) -> Result<()> {
    let mut identity = ProcessIdentity::new(package);
    if let Some(process) = process {
        identity = identity.with_process(process);
    }
    ProcessGuard::new(config.self_package.as_str(), &config.protected_processes).check(&identity)?;
    println!("allowed: {}", package);
    Ok(())
}

fn run_conceal_stack(config: &EngineConfig, input: Option<&Path>) -> Result<()> {
    let concealer = Concealer::new(&config.concealment)?;
    let frames: Vec<StackFrame> = read_input(input)?
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(StackFrame::new)
        .collect();
    for frame in concealer.stack().filter(frames) {
        println!("{}", frame.symbol);
    }
    Ok(())
}

fn run_conceal_maps(config: &EngineConfig, input: Option<&Path>) -> Result<()> {
    let filter = MetadataFilter::new(&config.concealment);
    print!("{}", filter.filter_content(&read_input(input)?));
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    let engine_config = match &args.engine_config {
        Some(path) => EngineConfig::from_toml(path)?,
        None => EngineConfig::default(),
    };

    match args.command {
        Command::Resolve {
            config,
            app,
            types,
            salt,
        } => run_resolve(&config, &app, &types, salt, args.format),
        Command::Generate { ty, count, seed } => run_generate(&ty, count, seed, args.format),
        Command::Validate { ty, value } => run_validate(&ty, &value),
        Command::Catalog { file } => run_catalog(file.as_deref(), args.format),
        Command::CheckProcess { package, process } => {
            run_check_process(&engine_config, &package, process)
        }
        Command::ConcealStack { input } => run_conceal_stack(&engine_config, input.as_deref()),
        Command::ConcealMaps { input } => run_conceal_maps(&engine_config, input.as_deref()),
    }
}
