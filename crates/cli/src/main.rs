use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fedifinder_extract::{extract_handles, parse_domain, Handle};
use fedifinder_resolve::{
    group_by_domain, import_records, refresh_from, write_snapshot, CandidateDomain, ClientConfig,
    Resolver, ResolverConfig, DEFAULT_MAX_CONCURRENCY, DEFAULT_TIMEOUT,
};
use fedifinder_store::{
    InstanceStore, JsonInstanceStore, KnownInstances, MemoryInstanceStore,
    PERMANENT_FAILURE_STATUSES, TRANSIENT_FAILURE_STATUSES,
};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "fedifinder")]
#[command(about = "Find fediverse handles in text and resolve their instances", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract fediverse handles from free text
    Extract(ExtractArgs),

    /// Extract handles and resolve every mentioned domain
    Resolve(ResolveArgs),

    /// Check one domain, optionally forcing a fresh probe
    Check(CheckArgs),

    /// Write the known-instances snapshot of a store
    #[command(name = "export-snapshot")]
    ExportSnapshot(ExportSnapshotArgs),

    /// Evict failed and unresolved records from a store
    Cleanup(CleanupArgs),

    /// Seed a store from a published instance export
    Seed(SeedArgs),
}

#[derive(Args)]
struct ExtractArgs {
    /// Text to scan (reads stdin when omitted)
    #[arg(conflicts_with = "file")]
    text: Option<String>,

    /// Read the text from a file instead
    #[arg(long)]
    file: Option<PathBuf>,
}

#[derive(Args)]
struct ResolveArgs {
    /// Text arguments to scan (reads stdin when omitted)
    #[arg(conflicts_with = "file")]
    text: Vec<String>,

    /// Read the text from a file instead
    #[arg(long)]
    file: Option<PathBuf>,

    /// Persist results in this store file (in-memory when omitted)
    #[arg(long)]
    store: Option<PathBuf>,

    /// Known-instances snapshot consulted before any probing
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Maximum concurrent domain probes
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENCY)]
    concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,
}

#[derive(Args)]
struct CheckArgs {
    /// Domain to check (defaults to the handle's host)
    #[arg(required_unless_present = "handle")]
    domain: Option<String>,

    /// Known handle on that domain, used for webfinger correction
    #[arg(long)]
    handle: Option<String>,

    /// Probe again even when a record is cached
    #[arg(long)]
    force: bool,

    /// Persist the result in this store file (in-memory when omitted)
    #[arg(long)]
    store: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,
}

#[derive(Args)]
struct ExportSnapshotArgs {
    /// Store file to export from
    #[arg(long)]
    store: PathBuf,

    /// Snapshot destination path
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args)]
struct CleanupArgs {
    /// Store file to sweep
    #[arg(long)]
    store: PathBuf,
}

#[derive(Args)]
struct SeedArgs {
    /// Store file to seed
    #[arg(long)]
    store: PathBuf,

    /// URL of a published instance export (a JSON array of records)
    #[arg(long)]
    from: String,

    /// Re-probe every listed domain instead of importing rows verbatim
    #[arg(long)]
    fresh: bool,

    /// Maximum concurrent domain probes with --fresh
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENCY)]
    concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,
}

#[derive(Serialize)]
struct ExportSummary {
    written: usize,
    path: PathBuf,
}

#[derive(Serialize)]
struct SweepSummary {
    evicted_failed: usize,
    evicted_transient: usize,
    evicted_unresolved: usize,
}

#[derive(Serialize)]
struct SeedSummary {
    processed: usize,
    fresh: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Extract(args) => run_extract(args),
        Commands::Resolve(args) => run_resolve(args).await,
        Commands::Check(args) => run_check(args).await,
        Commands::ExportSnapshot(args) => run_export_snapshot(args).await,
        Commands::Cleanup(args) => run_cleanup(args).await,
        Commands::Seed(args) => run_seed(args).await,
    }
}

fn run_extract(args: ExtractArgs) -> Result<()> {
    let text = gather_text(args.text.into_iter().collect(), args.file.as_deref())?;
    let handles = extract_handles(&text);
    log::info!("Extracted {} handles", handles.len());
    println!("{}", serde_json::to_string_pretty(&handles)?);
    Ok(())
}

async fn run_resolve(args: ResolveArgs) -> Result<()> {
    let text = gather_text(args.text, args.file.as_deref())?;
    let handles = extract_handles(&text);
    if handles.is_empty() {
        log::warn!("No handles found in the input");
        return Ok(());
    }
    let batch = group_by_domain(handles);

    let store = open_store(args.store.as_deref()).await?;
    let config = ResolverConfig {
        max_concurrency: args.concurrency,
        client: client_config(args.timeout_secs),
        ..ResolverConfig::default()
    };
    let mut resolver = Resolver::new(store, config)?;
    if let Some(path) = &args.snapshot {
        let snapshot = KnownInstances::load(path)
            .await
            .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
        resolver = resolver.with_snapshot(snapshot);
    }

    let mut results = resolver.resolve_batch(batch);
    while let Some(record) = results.recv().await {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}

async fn run_check(args: CheckArgs) -> Result<()> {
    let handle = args.handle.as_deref().map(Handle::parse).transpose()?;
    let domain = match &args.domain {
        Some(domain) => parse_domain(domain)?,
        None => handle
            .as_ref()
            .map(|handle| handle.domain().to_owned())
            .context("A domain or a handle is required")?,
    };

    let store = open_store(args.store.as_deref()).await?;
    let config = ResolverConfig {
        client: client_config(args.timeout_secs),
        ..ResolverConfig::default()
    };
    let resolver = Resolver::new(store, config)?;

    let record = if args.force {
        resolver.force_refresh(&domain, handle.as_ref()).await?
    } else {
        let mut candidate = CandidateDomain::bare(&domain);
        candidate.handles.extend(handle);
        let mut results = resolver.resolve_batch(vec![candidate]);
        results
            .recv()
            .await
            .context("Resolution produced no record")?
    };
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn run_export_snapshot(args: ExportSnapshotArgs) -> Result<()> {
    let store = JsonInstanceStore::open(&args.store)
        .await
        .with_context(|| format!("Failed to open store {}", args.store.display()))?;
    let written = write_snapshot(&store, &args.out).await?;
    log::info!("Wrote {} known instances to {}", written, args.out.display());
    println!(
        "{}",
        serde_json::to_string_pretty(&ExportSummary {
            written,
            path: args.out,
        })?
    );
    Ok(())
}

async fn run_cleanup(args: CleanupArgs) -> Result<()> {
    let store = JsonInstanceStore::open(&args.store)
        .await
        .with_context(|| format!("Failed to open store {}", args.store.display()))?;
    let evicted_failed = store.evict_by_status(PERMANENT_FAILURE_STATUSES).await?;
    let evicted_transient = store.evict_by_status(TRANSIENT_FAILURE_STATUSES).await?;
    let evicted_unresolved = store.evict_unresolved().await?;
    log::info!(
        "Swept {} records from {}",
        evicted_failed + evicted_transient + evicted_unresolved,
        args.store.display()
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&SweepSummary {
            evicted_failed,
            evicted_transient,
            evicted_unresolved,
        })?
    );
    Ok(())
}

async fn run_seed(args: SeedArgs) -> Result<()> {
    let store = open_store(Some(&args.store)).await?;
    let client = client_config(args.timeout_secs);

    let processed = if args.fresh {
        let config = ResolverConfig {
            max_concurrency: args.concurrency,
            client,
            ..ResolverConfig::default()
        };
        let resolver = Resolver::new(store, config)?;
        refresh_from(&resolver, &args.from).await?
    } else {
        import_records(store.as_ref(), &args.from, &client).await?
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&SeedSummary {
            processed,
            fresh: args.fresh,
        })?
    );
    Ok(())
}

/// Inline text wins; `--file` next; an empty argument list falls back to
/// stdin so the binary composes in pipelines.
fn gather_text(text: Vec<String>, file: Option<&Path>) -> Result<String> {
    if let Some(path) = file {
        return fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()));
    }
    if !text.is_empty() {
        return Ok(text.join("\n"));
    }
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read stdin")?;
    Ok(buffer)
}

async fn open_store(path: Option<&Path>) -> Result<Arc<dyn InstanceStore>> {
    let store: Arc<dyn InstanceStore> = match path {
        Some(path) => Arc::new(
            JsonInstanceStore::open(path)
                .await
                .with_context(|| format!("Failed to open store {}", path.display()))?,
        ),
        None => Arc::new(MemoryInstanceStore::new()),
    };
    Ok(store)
}

fn client_config(timeout_secs: u64) -> ClientConfig {
    ClientConfig {
        timeout: Duration::from_secs(timeout_secs),
        ..ClientConfig::default()
    }
}
