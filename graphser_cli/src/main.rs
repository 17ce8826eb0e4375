use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use graphser_codecs::{
    compression_by_id, compression_by_name, default_registry, PropertyBag, PropertySnapshot,
};
use graphser_core::config::DEFAULT_MAX_DEPTH;
use graphser_core::{Frame, PassConfig, ReadContext, WriteContext};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "graphser",
    about = "Store, load, and inspect property snapshots in graphser cache frames",
    version
)]
struct Cli {
    /// Deepest value nesting accepted while encoding or decoding
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode property files into a cache frame
    ///
    /// Each input becomes one scope named after its path. Naming the same
    /// path twice stores the bag once and references it from both scopes.
    Store {
        /// Destination frame file
        output: PathBuf,
        /// Property files to load
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Compression: none | zstd | lz4 | deflate
        #[arg(short, long, default_value = "zstd")]
        compression: String,
        /// Compression level (zstd 1–22, deflate 0–9)
        #[arg(long, default_value_t = 3)]
        level: i32,
    },
    /// Decode a cache frame and print every scope's properties
    Load {
        /// Frame file
        file: PathBuf,
    },
    /// Print frame header and pass statistics
    Inspect {
        /// Frame file
        file: PathBuf,
        /// Hex dump the decoded value stream
        #[arg(long)]
        dump: bool,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn hex_dump(bytes: &[u8], limit: usize) {
    let preview = &bytes[..bytes.len().min(limit)];
    for (i, chunk) in preview.chunks(16).enumerate() {
        print!("  {:04x}  ", i * 16);
        for b in chunk {
            print!("{:02x} ", b);
        }
        for _ in chunk.len()..16 {
            print!("   ");
        }
        print!("  |");
        for b in chunk {
            if b.is_ascii_graphic() || *b == b' ' {
                print!("{}", *b as char);
            } else {
                print!(".");
            }
        }
        println!("|");
    }
    if bytes.len() > limit {
        println!("  ... ({} bytes not shown)", bytes.len() - limit);
    }
}

/// Read a frame and decode its snapshot, returning the raw stream alongside.
fn load_snapshot(
    file: &Path,
    config: PassConfig,
) -> anyhow::Result<(Frame, Vec<u8>, PropertySnapshot, graphser_core::PassStats)> {
    let frame = Frame::read_file(file).with_context(|| format!("reading frame {:?}", file))?;
    let compression = compression_by_id(frame.header.compression_id)?;
    let raw = frame.open(compression.as_ref())?;

    let registry = default_registry()?;
    let mut ctx = ReadContext::from_slice(&raw, &registry).with_config(config);
    let snapshot = ctx
        .read_value_as::<PropertySnapshot>()
        .with_context(|| format!("decoding {:?}", file))?;
    let stats = ctx.finish()?;
    Ok((frame, raw, snapshot, stats))
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_store(
    output: PathBuf,
    inputs: Vec<PathBuf>,
    compression: &str,
    level: i32,
    config: PassConfig,
) -> anyhow::Result<()> {
    let compression = compression_by_name(compression, level)?;
    let registry = default_registry()?;

    let mut loaded: HashMap<PathBuf, Arc<PropertyBag>> = HashMap::new();
    let mut snapshot = PropertySnapshot::new();
    for input in inputs {
        let bag = match loaded.get(&input) {
            Some(bag) => Arc::clone(bag),
            None => {
                let text = std::fs::read_to_string(&input)
                    .with_context(|| format!("reading property file {:?}", input))?;
                let bag = Arc::new(PropertyBag::parse(&text));
                loaded.insert(input.clone(), Arc::clone(&bag));
                bag
            }
        };
        snapshot.push(input.display().to_string(), bag);
    }

    let t0 = Instant::now();
    let mut raw = Vec::new();
    let mut ctx = WriteContext::new(&mut raw, &registry).with_config(config);
    ctx.write_value(&snapshot)?;
    let stats = ctx.finish()?;

    let header = Frame::write_file(&output, &raw, compression.as_ref())
        .with_context(|| format!("writing frame {:?}", output))?;
    let elapsed = t0.elapsed();
    info!(scopes = snapshot.len(), bags = stats.identities, "snapshot stored");

    eprintln!("  compression : {}", compression.name());
    eprintln!("  scopes      : {}", snapshot.len());
    eprintln!("  shared bags : {}", stats.identities);
    eprintln!("  stream size : {}", human_bytes(header.raw_len));
    eprintln!("  stored size : {}", human_bytes(header.payload_len));
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_load(file: PathBuf, config: PassConfig) -> anyhow::Result<()> {
    let (_, _, snapshot, _) = load_snapshot(&file, config)?;
    for (scope, bag) in snapshot.scopes() {
        println!("[{}]", scope);
        for (name, value) in bag.properties() {
            println!("{}={}", name, value);
        }
        println!();
    }
    Ok(())
}

fn run_inspect(file: PathBuf, dump: bool, config: PassConfig) -> anyhow::Result<()> {
    let (frame, raw, snapshot, stats) = load_snapshot(&file, config)?;
    let compression = compression_by_id(frame.header.compression_id)?;
    let file_size = std::fs::metadata(&file)?.len();
    let header = &frame.header;

    println!("=== graphser frame: {:?} ===", file);
    println!();
    println!("  format version : {}", header.version);
    println!("  compression    : {} (id={})", compression.name(), header.compression_id);
    println!("  flags          : 0x{:08x}", header.flags);
    println!("  checksum       : {:016x}", header.checksum);
    println!("  stream size    : {}", human_bytes(header.raw_len));
    println!("  stored size    : {}", human_bytes(header.payload_len));
    println!("  file on disk   : {}", human_bytes(file_size));
    println!("  scopes         : {}", snapshot.len());
    println!("  shared objects : {}", stats.identities);
    println!("  tagged values  : {}", stats.values);

    if dump {
        println!();
        hex_dump(&raw, 512);
    }
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("graphser=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = PassConfig::default().with_max_depth(cli.max_depth);
    match cli.command {
        Commands::Store {
            output,
            inputs,
            compression,
            level,
        } => run_store(output, inputs, &compression, level, config),
        Commands::Load { file } => run_load(file, config),
        Commands::Inspect { file, dump } => run_inspect(file, dump, config),
    }
}
