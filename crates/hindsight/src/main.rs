use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use hindsight_core::{capture, render_report, BackendKind, Symbolizer};
use hindsight_utils::{info, init_logging};

/// Stack-trace capture and symbolization for the current process.
#[derive(Parser, Debug)]
#[command(name = "hindsight")]
#[command(version)]
#[command(about = "Capture and symbolize the current call stack", long_about = None)]
struct Cli
{
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Capture this process's own call stack and print a symbolized report
    Capture
    {
        /// Maximum number of frames to capture
        #[arg(long, default_value_t = 32)]
        depth: usize,
        /// Resolution backend to use
        #[arg(long, value_enum, default_value_t = BackendArg::Auto)]
        backend: BackendArg,
        /// Print raw addresses instead of the symbolized report
        #[arg(long, default_value_t = false)]
        addresses: bool,
    },
    /// Show backend detection results and external tool settings
    Info,
}

/// `--backend` values; `auto` defers to capability detection.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum BackendArg
{
    Auto,
    InProcess,
    External,
}

impl BackendArg
{
    fn build(self) -> Symbolizer
    {
        match self {
            BackendArg::Auto => Symbolizer::new(),
            BackendArg::InProcess => Symbolizer::with_backend(BackendKind::InProcess),
            BackendArg::External => Symbolizer::with_backend(BackendKind::External),
        }
    }
}

fn main()
{
    // Initialize logging (reads from RUST_LOG env var)
    // Defaults to INFO level and Pretty format if not set
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    let cli = Cli::parse();

    if let Err(e) = run_command(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run_command(cli: Cli) -> Result<(), Box<dyn std::error::Error>>
{
    match cli.command {
        Commands::Capture {
            depth,
            backend,
            addresses,
        } => {
            info!("Capturing up to {} frames", depth);
            // A small non-inlined chain so the report has recognizable
            // frames of our own above the runtime's.
            let trace = outer_frame(depth);

            if addresses {
                for addr in trace.addresses() {
                    println!("{}", addr);
                }
            } else {
                let symbolizer = backend.build();
                print!("{}", render_report(&symbolizer, trace.addresses()));
            }
            Ok(())
        }
        Commands::Info => {
            let symbolizer = Symbolizer::new();
            let settings = symbolizer.tool_settings();

            println!("Hindsight Information:");
            println!("  Backend: {}", symbolizer.backend().as_str());
            println!("  Executable: {}", std::env::current_exe()?.display());
            println!("  External tool: {}", settings.command.display());
            println!("  Tool timeout: {}ms", settings.timeout.as_millis());
            Ok(())
        }
    }
}

#[inline(never)]
fn outer_frame(depth: usize) -> hindsight_core::CaptureBuffer
{
    inner_frame(depth)
}

#[inline(never)]
fn inner_frame(depth: usize) -> hindsight_core::CaptureBuffer
{
    capture(depth)
}
