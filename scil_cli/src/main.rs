mod bin_file;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use scil::{CompressionContext, Datatype, UserHints};
use scil_core::hints::{DBL_IGNORE, FILL_NONE, INT_IGNORE};

use bin_file::{encode_array, encode_compressed, read_array, read_compressed};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "scil",
    about = "Scientific compression library: compress raw arrays within a tolerance, validate and inspect the result",
    version
)]
struct Cli {
    /// Log stage decisions and magic bytes (overrides RUST_LOG for scil)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Accuracy hints shared by the commands that build a context.
#[derive(Args, Clone)]
struct HintArgs {
    /// Element type of the array: float | double | int8 | int16 | int32 | int64
    #[arg(short = 't', long, default_value = "double", value_parser = parse_datatype)]
    datatype: Datatype,
    /// Tolerable absolute error
    #[arg(short, long)]
    absolute_tolerance: Option<f64>,
    /// Tolerable relative error in percent
    #[arg(short, long)]
    relative_tolerance: Option<f64>,
    /// Errors below this are judged absolutely instead of relatively
    #[arg(long)]
    relative_finest_abs: Option<f64>,
    /// Significant decimal digits to keep (-1 = finest)
    #[arg(long, allow_hyphen_values = true)]
    significant_digits: Option<i32>,
    /// Significant bits to keep (-1 = finest)
    #[arg(long, allow_hyphen_values = true)]
    significant_bits: Option<i32>,
    /// Values at or below this are kept exactly
    #[arg(long, allow_hyphen_values = true)]
    lossless_up_to: Option<f64>,
    /// Values at or above this are kept exactly
    #[arg(long, allow_hyphen_values = true)]
    lossless_from: Option<f64>,
    /// Missing-data marker that must survive bit-exact
    #[arg(long, allow_hyphen_values = true)]
    fill_value: Option<f64>,
    /// Comma separated chain, bypassing the chooser (e.g. "abstol,lz4")
    #[arg(short, long)]
    chain: Option<String>,
}

impl HintArgs {
    fn to_hints(&self) -> UserHints {
        let defaults = UserHints::default();
        UserHints {
            absolute_tolerance: self.absolute_tolerance.unwrap_or(DBL_IGNORE),
            relative_tolerance_percent: self.relative_tolerance.unwrap_or(DBL_IGNORE),
            relative_err_finest_abs_tolerance: self.relative_finest_abs.unwrap_or(DBL_IGNORE),
            significant_digits: self.significant_digits.unwrap_or(INT_IGNORE),
            significant_bits: self.significant_bits.unwrap_or(INT_IGNORE),
            lossless_data_range_up_to: self.lossless_up_to.unwrap_or(defaults.lossless_data_range_up_to),
            lossless_data_range_from: self.lossless_from.unwrap_or(defaults.lossless_data_range_from),
            fill_value: self.fill_value.unwrap_or(FILL_NONE),
            force_compression_methods: self.chain.clone(),
            ..defaults
        }
    }

    fn context(&self) -> anyhow::Result<CompressionContext> {
        let hints = self.to_hints();
        CompressionContext::new(self.datatype, &hints).context("creating compression context")
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a raw array file
    Compress {
        /// Array file: dims header followed by little-endian elements
        input: PathBuf,
        /// Destination compressed file
        output: PathBuf,
        #[command(flatten)]
        hints: HintArgs,
        /// Decompress again and check the tolerances before writing
        #[arg(long)]
        check: bool,
    },
    /// Decompress back into a raw array file
    Decompress {
        /// Compressed file
        input: PathBuf,
        /// Destination array file
        output: PathBuf,
    },
    /// Check a compressed file against its original under the given hints
    Validate {
        /// Original array file
        original: PathBuf,
        /// Compressed file
        compressed: PathBuf,
        #[command(flatten)]
        hints: HintArgs,
    },
    /// Print the chain and sizes of a compressed file
    Inspect {
        /// Compressed file
        file: PathBuf,
    },
    /// List the registered algorithms
    List,
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn parse_datatype(name: &str) -> Result<Datatype, String> {
    Datatype::from_name(&name.to_ascii_lowercase()).ok_or_else(|| {
        format!("unknown datatype '{name}'. Valid options: float, double, int8, int16, int32, int64")
    })
}

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

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("info,scil=debug,scil_codecs=debug,scil_core=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn print_report(report: &scil::ValidationReport) {
    let a = &report.accuracy;
    println!("  absolute error : {:e}", a.absolute_tolerance);
    println!("  relative error : {:.6}%", a.relative_tolerance_percent);
    println!("  finest abs err : {:e}", a.relative_err_finest_abs_tolerance);
    println!("  sig. bits      : {}", a.significant_bits);
    println!("  sig. digits    : {}", a.significant_digits);
    if report.lossless {
        println!("  mode           : lossless (byte identity)");
    }
    if report.passed() {
        println!("  result         : ok");
    } else {
        let fields: Vec<&str> = report.failures.iter().map(|f| f.name()).collect();
        println!("  result         : FAILED ({})", fields.join(", "));
    }
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_compress(input: PathBuf, output: PathBuf, hints: HintArgs, check: bool) -> anyhow::Result<()> {
    let array = read_array(&input, hints.datatype)?;
    let mut ctx = hints.context()?;

    let t0 = Instant::now();
    let stream = scil::compress(&mut ctx, &array.data, &array.dims)
        .with_context(|| format!("compressing {:?}", input))?;
    let elapsed = t0.elapsed();

    if check {
        let report = scil::validate(&ctx, &array.data, &array.dims, &stream)?;
        print_report(&report);
        if !report.passed() {
            anyhow::bail!("compressed data does not meet the requested tolerances");
        }
    }

    std::fs::write(&output, encode_compressed(hints.datatype, &array.dims, &stream))
        .with_context(|| format!("writing output file {:?}", output))?;

    let raw = array.data.len() as u64;
    let chain = ctx.chain().map(|c| c.to_string()).unwrap_or_else(|| "-".into());
    eprintln!("  chain       : {}", chain);
    eprintln!("  datatype    : {}", hints.datatype);
    eprintln!("  dims        : {}", array.dims);
    eprintln!("  raw size    : {}", human_bytes(raw));
    eprintln!("  compressed  : {}", human_bytes(stream.len() as u64));
    eprintln!("  ratio       : {:.2}x", raw as f64 / stream.len() as f64);
    eprintln!(
        "  throughput  : {}/s",
        human_bytes((raw as f64 / elapsed.as_secs_f64()) as u64)
    );
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_decompress(input: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let compressed = read_compressed(&input)?;

    let t0 = Instant::now();
    let data = scil::decompress(compressed.datatype, &compressed.dims, &compressed.stream)
        .with_context(|| format!("decompressing {:?}", input))?;
    let elapsed = t0.elapsed();

    std::fs::write(&output, encode_array(&compressed.dims, &data))
        .with_context(|| format!("writing output file {:?}", output))?;

    eprintln!("  datatype    : {}", compressed.datatype);
    eprintln!("  dims        : {}", compressed.dims);
    eprintln!("  raw size    : {}", human_bytes(data.len() as u64));
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_validate(original: PathBuf, compressed: PathBuf, hints: HintArgs) -> anyhow::Result<()> {
    let c = read_compressed(&compressed)?;
    if c.datatype != hints.datatype {
        tracing::info!(file = %c.datatype, flag = %hints.datatype, "using the datatype stored in the compressed file");
    }
    let hints = HintArgs { datatype: c.datatype, ..hints };
    let array = read_array(&original, c.datatype)?;
    if array.dims != c.dims {
        anyhow::bail!("original has dims {}, compressed file {}", array.dims, c.dims);
    }

    let ctx = hints.context()?;
    let report = scil::validate(&ctx, &array.data, &array.dims, &c.stream)?;
    println!("=== Validation: {:?} ===", compressed);
    print_report(&report);
    if !report.passed() {
        anyhow::bail!("validation failed");
    }
    Ok(())
}

fn run_inspect(file: PathBuf) -> anyhow::Result<()> {
    let c = read_compressed(&file)?;
    let info = scil::describe_stream(&c.stream).with_context(|| format!("reading stream of {:?}", file))?;
    let raw = c.dims.size_in_bytes(c.datatype) as u64;

    println!("=== SCIL File: {:?} ===", file);
    println!();
    println!("  datatype       : {}", c.datatype);
    println!("  dims           : {}", c.dims);
    println!("  stages         : {}", info.stage_count);
    match &info.chain {
        Some(chain) => {
            println!("  chain          : {}", chain);
            println!("  lossy          : {}", chain.is_lossy());
        }
        None => println!("  chain          : (empty input)"),
    }
    println!("  raw size       : {}", human_bytes(raw));
    println!("  compressed     : {}", human_bytes(info.compressed_len as u64));
    if info.compressed_len > 0 {
        println!("  ratio          : {:.2}x", raw as f64 / info.compressed_len as f64);
    }
    Ok(())
}

fn run_list() -> anyhow::Result<()> {
    let algorithms = scil_codecs::registry()?;
    println!("  {:>3}  {:<10}  {:<22}  {}", "id", "name", "stage", "lossy");
    println!("  {}", "-".repeat(46));
    for algo in algorithms {
        println!(
            "  {:>3}  {:<10}  {:<22}  {}",
            algo.id,
            algo.name,
            algo.stage().name(),
            if algo.is_lossy() { "yes" } else { "no" }
        );
    }
    println!();
    println!("  {} algorithms available", scil_codecs::available_count());
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.command {
        Commands::Compress {
            input,
            output,
            hints,
            check,
        } => run_compress(input, output, hints, check),
        Commands::Decompress { input, output } => run_decompress(input, output),
        Commands::Validate {
            original,
            compressed,
            hints,
        } => run_validate(original, compressed, hints),
        Commands::Inspect { file } => run_inspect(file),
        Commands::List => run_list(),
    }
}
