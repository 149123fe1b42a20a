//! Neuroshare Glue CLI
//!
//! Inspect Neuroshare libraries and the data files they read.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use neuroshare_glue::{
    EntityInfo, FileInfo, GlueConfig, LibraryInfo, LibraryLease, NeuroshareApi, Registry,
};
use std::ffi::CString;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ns-glue")]
#[command(version)]
#[command(about = "Load and inspect Neuroshare libraries", long_about = None)]
struct Cli {
    /// Config file (default: neuroshare.toml in this or a parent directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show where a library name would be loaded from
    Resolve {
        /// Library name or path
        library: String,
    },

    /// Load a library and print what it reports about itself
    Info {
        /// Library name or path
        library: String,
    },

    /// Open a data file and list its entities
    Open {
        /// Library name or path
        library: String,

        /// Data file
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => GlueConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => GlueConfig::load_from_cwd().context("Failed to load neuroshare.toml")?,
    };
    let registry = Arc::new(
        config
            .build_registry()
            .context("Invalid registry configuration")?,
    );

    match cli.command {
        Commands::Resolve { library } => cmd_resolve(&registry, &library),
        Commands::Info { library } => cmd_info(&registry, &library),
        Commands::Open { library, file } => cmd_open(&registry, &library, &file),
    }
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("neuroshare_glue=debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("neuroshare_glue=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn cmd_resolve(registry: &Registry, library: &str) -> Result<()> {
    let (name, path) = registry.resolve(library);
    println!("name: {}", name);
    println!("path: {}", path.display());
    Ok(())
}

fn cmd_info(registry: &Arc<Registry>, library: &str) -> Result<()> {
    let lease = LibraryLease::acquire(registry, library)
        .with_context(|| format!("Failed to load {}", library))?;
    let lib = lease.api();

    let mut info = LibraryInfo::default();
    lib.get_library_info(&mut info)
        .into_result()
        .context("ns_GetLibraryInfo failed")?;

    println!("description: {}", info.description());
    println!("creator:     {}", info.creator());
    println!(
        "library:     {}.{:02}",
        info.lib_version_maj, info.lib_version_min
    );
    println!(
        "api:         {}.{:02}",
        info.api_version_maj, info.api_version_min
    );
    println!(
        "built:       {:04}-{:02}-{:02}",
        info.time_year, info.time_month, info.time_day
    );
    println!("max files:   {}", info.max_files);
    println!("flags:       {}", describe_flags(&info));

    let descs = info.file_descs();
    if !descs.is_empty() {
        println!("file types:");
        for desc in descs {
            println!("  *.{:<8} {}", desc.extension(), desc.description());
        }
    }

    lease.release().context("Failed to close library")?;
    Ok(())
}

fn describe_flags(info: &LibraryInfo) -> String {
    use neuroshare_glue::api::{
        LIBRARY_DEBUG, LIBRARY_MODIFIED, LIBRARY_MULTITHREADED, LIBRARY_PRERELEASE,
        LIBRARY_SPECIALBUILD,
    };

    let names: Vec<&str> = [
        (LIBRARY_DEBUG, "debug"),
        (LIBRARY_MODIFIED, "modified"),
        (LIBRARY_PRERELEASE, "pre-release"),
        (LIBRARY_SPECIALBUILD, "special build"),
        (LIBRARY_MULTITHREADED, "multithreaded"),
    ]
    .into_iter()
    .filter(|(flag, _)| info.has_flag(*flag))
    .map(|(_, name)| name)
    .collect();

    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

fn cmd_open(registry: &Arc<Registry>, library: &str, file: &PathBuf) -> Result<()> {
    let lease = LibraryLease::acquire(registry, library)
        .with_context(|| format!("Failed to load {}", library))?;
    let lib = lease.api();

    let Some(path) = file.to_str() else {
        bail!("File path is not valid UTF-8: {}", file.display());
    };
    let c_path = CString::new(path).context("File path contains a NUL byte")?;

    let mut file_id = 0u32;
    if let Err(e) = lib.open_file(&c_path, &mut file_id).into_result() {
        let detail = lib.last_error_message().unwrap_or_default();
        bail!("Failed to open {}: {} {}", file.display(), e, detail);
    }

    let listed = list_entities(&lib, file_id);
    let closed = lib.close_file(file_id).into_result();
    listed?;
    closed.context("ns_CloseFile failed")?;

    lease.release().context("Failed to close library")?;
    Ok(())
}

fn list_entities(lib: &impl NeuroshareApi, file_id: u32) -> Result<()> {
    let mut info = FileInfo::default();
    lib.get_file_info(file_id, &mut info)
        .into_result()
        .context("ns_GetFileInfo failed")?;

    println!("type:     {}", info.file_type());
    println!("app:      {}", info.app_name());
    println!(
        "recorded: {:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        info.time_year, info.time_month, info.time_day, info.time_hour, info.time_min, info.time_sec
    );
    println!("span:     {:.3} s", info.time_span);
    if !info.file_comment().is_empty() {
        println!("comment:  {}", info.file_comment());
    }
    println!("entities: {}", info.entity_count);

    for entity in 0..info.entity_count {
        let mut entity_info = EntityInfo::default();
        let result = lib.get_entity_info(file_id, entity, &mut entity_info);
        if !result.is_ok() {
            println!("  {:>4}  <{}>", entity, result);
            continue;
        }
        let kind = entity_info
            .kind()
            .map(|k| k.to_string())
            .unwrap_or_else(|| format!("type {}", entity_info.entity_type));
        println!(
            "  {:>4}  {:<32} {:<8} {} items",
            entity,
            entity_info.label(),
            kind,
            entity_info.item_count
        );
    }
    Ok(())
}
