//! wordvec Tool - CLI for inspecting and converting word2vec models
//!
//! # Commands
//!
//! - `info` - Show vocabulary size, layer size and segment layout
//! - `convert` - Re-encode a model in another format
//! - `lookup` - Print the vector of a word
//! - `nearest` - Print the words closest to a word
//!
//! Formats are inferred from the file extension (`.bin`, `.txt`/`.vec`,
//! `.wvc`) unless given explicitly.
//!
//! # Examples
//!
//! ## Convert a C word2vec binary model to the compact format
//! ```bash
//! wordvec-tool convert -i GoogleNews-vectors-negative300.bin -o news.wvc
//! ```
//!
//! ## Load a big-endian model and show its layout
//! ```bash
//! RUST_LOG=wordvec_core=debug wordvec-tool info -i model.bin --big-endian
//! ```

use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use wordvec_core::{Endianness, Format, LoadOptions, LogProgress, Model};

#[derive(Parser)]
#[command(name = "wordvec-tool")]
#[command(version, about = "CLI for inspecting and converting word2vec models")]
#[command(after_help = "Use 'wordvec-tool <command> --help' for more information.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that reads a model
#[derive(Args)]
struct InputArgs {
    /// Path to the model file
    #[arg(short, long)]
    input: PathBuf,

    /// Input format: binary, text or compact (default: from extension)
    #[arg(short = 'f', long, alias = "from")]
    format: Option<String>,

    /// Binary floats are big-endian
    #[arg(long, default_value = "false")]
    big_endian: bool,

    /// Capacity of each in-memory segment, in doubles
    #[arg(long)]
    max_segment_doubles: Option<usize>,

    /// JSON file with load options; flags above override it
    #[arg(long)]
    options: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show model info
    Info {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Convert a model to another format
    Convert {
        #[command(flatten)]
        input: InputArgs,

        /// Output path
        #[arg(short, long)]
        output: PathBuf,

        /// Output format: binary, text or compact (default: from extension)
        #[arg(short = 't', long)]
        to: Option<String>,
    },

    /// Print the vector for a word
    Lookup {
        #[command(flatten)]
        input: InputArgs,

        /// Word to look up
        word: String,
    },

    /// Print the nearest neighbours of a word
    Nearest {
        #[command(flatten)]
        input: InputArgs,

        /// Query word
        word: String,

        /// Number of neighbours (default: 10)
        #[arg(short = 'k', long, default_value = "10")]
        count: usize,
    },
}

fn resolve_format(explicit: Option<&str>, path: &Path) -> Result<Format> {
    match explicit {
        Some(name) => Ok(name.parse()?),
        None => Ok(Model::detect_format(path)?),
    }
}

fn load_options(args: &InputArgs) -> Result<LoadOptions> {
    let mut options = match &args.options {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read options file {:?}", path))?;
            serde_json::from_str::<LoadOptions>(&json)
                .with_context(|| format!("Invalid options file {:?}", path))?
        }
        None => LoadOptions::default(),
    };
    if args.big_endian {
        options = options.with_byte_order(Endianness::Big);
    }
    if let Some(max) = args.max_segment_doubles {
        options = options.with_max_segment_doubles(max);
    }
    options.validate()?;
    Ok(options)
}

fn load_model(args: &InputArgs) -> Result<Model> {
    let format = resolve_format(args.format.as_deref(), &args.input)?;
    let options = load_options(args)?;

    let start = Instant::now();
    let model = Model::load(&args.input, format, &options, &LogProgress::new())
        .with_context(|| format!("Failed to load {} model {:?}", format, args.input))?;
    info!(
        "Loaded {} vectors of dimension {} in {:.2}s",
        model.len(),
        model.layer_size(),
        start.elapsed().as_secs_f64()
    );
    Ok(model)
}

fn show_info(args: InputArgs) -> Result<()> {
    let model = load_model(&args)?;
    let store = model.store();
    let layout = store.layout();

    println!("Model: {:?}", args.input);
    println!("  Vocabulary size: {}", model.len());
    println!("  Layer size: {}", model.layer_size());
    println!("  Segments: {}", store.num_segments());
    println!("  Vectors per segment: {}", layout.vectors_per_segment());
    if let Some(last) = store.num_segments().checked_sub(1) {
        println!("  Vectors in last segment: {}", layout.segment_vectors(last));
    }
    println!(
        "  Memory: {:.2} MB",
        store.estimated_memory_bytes() as f64 / (1024.0 * 1024.0)
    );
    if let Some(first) = model.vocab().first() {
        println!("  First token: {:?}", first);
    }

    Ok(())
}

fn convert(args: InputArgs, output: PathBuf, to: Option<String>) -> Result<()> {
    let target = resolve_format(to.as_deref(), &output)?;
    let model = load_model(&args)?;

    let start = Instant::now();
    model
        .save(&output, target)
        .with_context(|| format!("Failed to write {} model {:?}", target, output))?;
    info!(
        "Wrote {} model to {:?} in {:.2}s",
        target,
        output,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn lookup(args: InputArgs, word: &str) -> Result<()> {
    let searcher = load_model(&args)?.for_search();
    let vector = searcher.raw_vector(word)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    write!(out, "{}", word)?;
    for v in vector {
        write!(out, " {}", v)?;
    }
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

fn nearest(args: InputArgs, word: &str, count: usize) -> Result<()> {
    let searcher = load_model(&args)?.for_search();
    let matches = searcher.nearest(word, count)?;

    for m in matches {
        println!("{:<30} {:.6}", m.word, m.similarity);
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wordvec_tool=info".parse()?)
                .add_directive("wordvec_core=info".parse()?),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info { input } => {
            show_info(input)?;
        }
        Commands::Convert { input, output, to } => {
            convert(input, output, to).context("Failed to convert model")?;
        }
        Commands::Lookup { input, word } => {
            lookup(input, &word)?;
        }
        Commands::Nearest { input, word, count } => {
            nearest(input, &word, count)?;
        }
    }

    Ok(())
}
