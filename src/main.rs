use std::path::{Path, PathBuf};
use std::{env, io::IsTerminal};

use anyhow::bail;
use clap::{Args, CommandFactory, Parser, Subcommand};
use sprmin_batch::{
    ArtifactSink, ArtifactSource, BatchOptions, StdArtifactFs, default_config, load_config,
    run_batch,
};
use sprmin_core::{IndexOrder, MinifyOptions, OperandWidth, ParseOptions, RenderOptions};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "sprmin",
    version,
    about = "Deduplicating minifier for sprite mapping and DPLC tables",
    long_about = None,
    after_help = "Examples:\n  sprmin run --root art/sprites\n  sprmin minify map.asm \"Map - Sonic.asm\" --entry-size 3 --bytes --interleave\n  sprmin check plc.asm --entry-size 1"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Minify every configured artifact under a root directory.
    Run(RunArgs),
    /// Minify one source/target pair.
    Minify(MinifyArgs),
    /// Parse one artifact and print a summary.
    Check(CheckArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Batch config file in RON format. The built-in config is used when omitted.
    #[arg(short = 'c', long = "config", value_name = "CONFIG")]
    config: Option<PathBuf>,
    /// Directory that artifact paths are relative to.
    #[arg(long = "root", value_name = "DIR", default_value = ".")]
    root: PathBuf,
    /// Parse and minify without writing any target.
    #[arg(long = "dry-run")]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct MinifyArgs {
    /// Artifact holding the authoritative record contents.
    #[arg(value_name = "SOURCE")]
    source: PathBuf,
    /// Artifact whose offset tables are kept.
    #[arg(value_name = "TARGET")]
    target: PathBuf,
    /// Payload words per unit of a record's repetition count.
    #[arg(long = "entry-size", value_name = "N")]
    entry_size: usize,
    /// Emit record payloads as dc.b byte lines.
    #[arg(long = "bytes")]
    bytes: bool,
    /// Read parallel offset tables record-major.
    #[arg(long = "interleave")]
    interleave: bool,
    /// Output path; `-` prints to stdout. Defaults to overwriting TARGET.
    #[arg(short = 'o', long = "output", value_name = "OUT")]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Artifact to parse.
    #[arg(value_name = "FILE")]
    file: PathBuf,
    /// Payload words per unit of a record's repetition count.
    #[arg(long = "entry-size", value_name = "N")]
    entry_size: usize,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run(args)) => run_command(args),
        Some(Commands::Minify(args)) => minify_command(args),
        Some(Commands::Check(args)) => check_command(args),
        None => {
            print_banner();
            println!();
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn print_banner() {
    println!("sprmin, version {}.", env!("CARGO_PKG_VERSION"));
    println!("Merges identical sprite mapping and DPLC records.");
    println!("License: 0BSD - free to use, copy, modify, and distribute.");
}

fn run_command(args: RunArgs) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => default_config(),
    };
    tracing::debug!(
        "batch over {} entities and {} artifact kinds",
        config.entities.len(),
        config.kinds.len()
    );
    let fs = StdArtifactFs;
    let options = BatchOptions {
        dry_run: args.dry_run,
        render: render_options(),
    };
    let report = run_batch(&config, &args.root, &fs, &fs, options)?;

    let (verb, done) = if args.dry_run {
        ("checked", "checked")
    } else {
        ("wrote", "written")
    };
    for written in &report.written {
        println!(
            "{verb} {} ({} {}, {} distinct records)",
            written.path.display(),
            written.entity,
            written.kind,
            written.stats.distinct_records
        );
    }
    println!(
        "{} artifact(s) {done}, {} skipped",
        report.written.len(),
        report.skipped.len()
    );
    Ok(())
}

fn minify_command(args: MinifyArgs) -> anyhow::Result<()> {
    let entry_size = checked_entry_size(args.entry_size)?;
    let fs = StdArtifactFs;
    let source = fs.read(&args.source)?;
    let target = fs.read(&args.target)?;

    let options = MinifyOptions {
        entry_size,
        payload: if args.bytes {
            OperandWidth::Byte
        } else {
            OperandWidth::Word
        },
        order: if args.interleave {
            IndexOrder::Interleaved
        } else {
            IndexOrder::Sequential
        },
    };
    let output = sprmin_core::minify_sources(
        (&args.source.display().to_string(), &source),
        (&args.target.display().to_string(), &target),
        options,
        render_options(),
    )
    .map_err(|error| anyhow::anyhow!(error.rendered()))?;

    match args.output.as_deref() {
        Some(path) if path == Path::new("-") => print!("{}", output.text),
        Some(path) => fs.write(path, &output.text)?,
        None => fs.write(&args.target, &output.text)?,
    }
    Ok(())
}

fn check_command(args: CheckArgs) -> anyhow::Result<()> {
    let entry_size = checked_entry_size(args.entry_size)?;
    let text = StdArtifactFs.read(&args.file)?;
    let parsed = sprmin_core::parse_source_with_options(
        &args.file.display().to_string(),
        &text,
        ParseOptions::new(entry_size),
        render_options(),
    )
    .map_err(|error| anyhow::anyhow!(error.rendered()))?;

    let offsets = parsed.offset_table();
    println!("{}", args.file.display());
    println!("  tables:           {}", offsets.table_count());
    println!("  offset entries:   {}", offsets.len());
    println!("  distinct records: {}", parsed.record_count());
    println!("  labels:           {}", parsed.label_count());
    Ok(())
}

fn checked_entry_size(entry_size: usize) -> anyhow::Result<usize> {
    if entry_size == 0 {
        bail!("--entry-size must be at least 1");
    }
    Ok(entry_size)
}

fn render_options() -> RenderOptions {
    RenderOptions {
        color: stderr_supports_color(),
    }
}

fn stderr_supports_color() -> bool {
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }

    if let Some(force) = env::var_os("CLICOLOR_FORCE") {
        return force != "0";
    }

    if let Some(choice) = env::var_os("CLICOLOR")
        && choice == "0"
    {
        return false;
    }

    std::io::stderr().is_terminal()
}
