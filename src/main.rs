use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sensorsort::accel::cpu::CpuContext;
use sensorsort::accel::Backend;
use sensorsort::config::{ElementType, SensorSortConfig};
use sensorsort::input;
use sensorsort::report::RunReport;
use sensorsort::sort::profile::Resolution;
use sensorsort::sort::{NumericSequence, SortKey};

#[derive(Parser)]
#[command(
    name = "sensorsort",
    about = "Accelerator-backed bitonic sort and statistics for sensor readings",
    version,
    long_about = None
)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset (overrides logging.level)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit JSON log lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sort a dataset and report statistics
    Sort(SortArgs),

    /// List OpenCL platforms and devices
    Devices {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args)]
struct SortArgs {
    /// Input file, one reading per line (overrides input.path)
    input: Option<PathBuf>,

    /// Sort N synthetic readings instead of a file
    #[arg(long, value_name = "N", conflicts_with = "input")]
    synthetic: Option<usize>,

    /// Seed for --synthetic
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Lower bound of synthetic readings
    #[arg(long, default_value = "-10.0", allow_hyphen_values = true)]
    low: f64,

    /// Upper bound of synthetic readings
    #[arg(long, default_value = "35.0", allow_hyphen_values = true)]
    high: f64,

    /// Element type the readings are parsed as
    #[arg(long = "type", value_enum)]
    element_type: Option<ElementType>,

    /// Zero-based column holding the reading (default: last column)
    #[arg(long)]
    column: Option<usize>,

    /// Accelerator backend
    #[arg(long, value_enum)]
    backend: Option<Backend>,

    /// OpenCL platform index
    #[arg(long)]
    platform: Option<usize>,

    /// OpenCL device index
    #[arg(long)]
    device: Option<usize>,

    /// Local work-group size
    #[arg(long)]
    local_size: Option<usize>,

    /// Use the kernel's preferred work-group multiple
    #[arg(long)]
    use_preferred: bool,

    /// Collect per-launch profiling timestamps
    #[arg(long)]
    profile: bool,

    /// Unit for profiling output
    #[arg(long, value_enum)]
    resolution: Option<Resolution>,

    /// Do not log work-group sizing before every stage
    #[arg(long)]
    quiet_kernel: bool,

    /// JSON output for machine parsing
    #[arg(long)]
    json: bool,
}

impl SortArgs {
    fn apply(&self, cfg: &mut SensorSortConfig) {
        if let Some(path) = &self.input {
            cfg.input.path = Some(path.clone());
        }
        if let Some(t) = self.element_type {
            cfg.input.element_type = t;
        }
        if self.column.is_some() {
            cfg.input.column = self.column;
        }
        if let Some(b) = self.backend {
            cfg.device.backend = b;
        }
        if let Some(p) = self.platform {
            cfg.device.platform = p;
        }
        if let Some(d) = self.device {
            cfg.device.device = d;
        }
        if let Some(l) = self.local_size {
            cfg.sort.local_size = l;
        }
        if self.use_preferred {
            cfg.sort.use_preferred = true;
        }
        if self.profile {
            cfg.sort.profiling = true;
        }
        if let Some(r) = self.resolution {
            cfg.sort.resolution = r;
        }
        if self.quiet_kernel {
            cfg.sort.verbose_kernel = false;
        }
    }
}

fn init_tracing(cfg: &SensorSortConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cfg.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = SensorSortConfig::resolve(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        cfg.logging.level = level.clone();
    }
    if cli.log_json {
        cfg.logging.json = true;
    }
    if let Commands::Sort(args) = &cli.command {
        args.apply(&mut cfg);
    }
    init_tracing(&cfg);

    match cli.command {
        Commands::Sort(args) => {
            tracing::info!(
                element_type = ?cfg.input.element_type,
                backend = ?cfg.device.backend,
                "Running sort"
            );
            match cfg.input.element_type {
                ElementType::Int => sort_as::<i32>(&cfg, &args)?,
                ElementType::Uint => sort_as::<u32>(&cfg, &args)?,
                ElementType::Float => sort_as::<f32>(&cfg, &args)?,
            }
        }
        Commands::Devices { json } => list_devices(json)?,
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&cfg)?);
        }
    }

    Ok(())
}

fn sort_as<T: SortKey>(cfg: &SensorSortConfig, args: &SortArgs) -> Result<()> {
    let data: NumericSequence<T> = match (args.synthetic, &cfg.input.path) {
        (Some(count), _) => {
            if !args.low.is_finite()
                || !args.high.is_finite()
                || !(args.high - args.low).is_finite()
            {
                bail!(
                    "--low ({}) and --high ({}) must be finite with a finite range",
                    args.low,
                    args.high
                );
            }
            if args.low >= args.high {
                bail!("--low ({}) must be below --high ({})", args.low, args.high);
            }
            input::synthetic(count, args.seed, args.low, args.high)
        }
        (None, Some(path)) => input::load_file(path, cfg.input.field())?,
        (None, None) => {
            bail!("no input: pass a file, --synthetic N, or set input.path in the config")
        }
    };

    let report = match cfg.device.backend.resolve() {
        Backend::OpenCl => sort_on_opencl(cfg, &data)?,
        _ => sensorsort::run(&CpuContext::new(), &data, &cfg.sort)?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("\n=== SensorSort Report ===");
        print!("{}", report.format_text());
        println!("=========================\n");
    }
    Ok(())
}

#[cfg(feature = "opencl")]
fn sort_on_opencl<T: SortKey>(
    cfg: &SensorSortConfig,
    data: &NumericSequence<T>,
) -> Result<RunReport<T>> {
    let ctx = sensorsort::accel::opencl::OpenClContext::<T>::new(
        cfg.device.platform,
        cfg.device.device,
        cfg.sort.profiling,
    )?;
    Ok(sensorsort::run(&ctx, data, &cfg.sort)?)
}

#[cfg(not(feature = "opencl"))]
fn sort_on_opencl<T: SortKey>(
    _cfg: &SensorSortConfig,
    _data: &NumericSequence<T>,
) -> Result<RunReport<T>> {
    bail!("this build has no OpenCL support; rebuild with --features opencl or pass --backend cpu")
}

#[cfg(feature = "opencl")]
fn list_devices(json: bool) -> Result<()> {
    let devices = sensorsort::accel::opencl::probe_devices()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }
    if devices.is_empty() {
        println!("No OpenCL devices found.");
        return Ok(());
    }
    println!(
        "{:<4} | {:<24} | {:<4} | {:<32} | {:<8} | Global memory",
        "Plat", "Platform", "Dev", "Device", "Max WG"
    );
    println!("{:-<4}-|-{:-<24}-|-{:-<4}-|-{:-<32}-|-{:-<8}-|-{:-<13}", "", "", "", "", "", "");
    for d in devices {
        println!(
            "{:<4} | {:<24} | {:<4} | {:<32} | {:<8} | {} MiB",
            d.platform_index,
            d.platform,
            d.device_index,
            d.name,
            d.max_work_group_size,
            d.global_mem_size / (1024 * 1024)
        );
    }
    Ok(())
}

#[cfg(not(feature = "opencl"))]
fn list_devices(_json: bool) -> Result<()> {
    bail!("this build has no OpenCL support; rebuild with --features opencl")
}
