//! Strobe CLI: plan and simulate a clock/reset generation core.
//!
//! Provides `strobe init` for writing a reference `strobe.toml`, `strobe plan`
//! for printing the derived clock tree, and `strobe sim` for running the
//! cycle-accurate model with optional VCD output.

#![warn(missing_docs)]

mod init;
mod pipeline;
mod plan;
mod sim;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Strobe: clock planning, reset sequencing and loopback simulation.
#[derive(Parser, Debug)]
#[command(name = "strobe", version, about = "Strobe clock/reset model")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a custom `strobe.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a reference `strobe.toml`.
    Init {
        /// Project name (creates a subdirectory). If omitted, initializes in
        /// the current directory.
        name: Option<String>,
    },
    /// Print the derived clock tree.
    Plan(PlanArgs),
    /// Simulate the design.
    Sim(SimArgs),
}

/// Arguments for the `strobe plan` subcommand.
#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `strobe sim` subcommand.
#[derive(Parser, Debug)]
pub struct SimArgs {
    /// Simulation time limit (e.g., "2us", "500ns").
    #[arg(long)]
    pub time: Option<String>,

    /// Output path for the VCD file.
    #[arg(short, long)]
    pub output: Option<String>,

    /// Disable waveform recording.
    #[arg(long)]
    pub no_waveform: bool,

    /// Model a PLL that never locks.
    #[arg(long)]
    pub never_lock: bool,

    /// Seed for random PHY stalls (overrides `sim.stall_seed`, defaults to 0).
    #[arg(long)]
    pub stall_seed: Option<u64>,

    /// Stall probability per cycle (overrides `sim.stall_probability`).
    #[arg(long)]
    pub stall_probability: Option<f64>,

    /// Payloads to loop back (overrides `sim.frames`).
    #[arg(long, value_delimiter = ',')]
    pub frames: Option<Vec<u64>>,

    /// Output format for the run summary.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => std::env::var("TERM").is_ok(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };
    init_logging(&global);

    let result = match cli.command {
        Command::Init { name } => init::run(name, &global),
        Command::Plan(ref args) => plan::run(args, &global),
        Command::Sim(ref args) => sim::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Default log level from `--quiet`/`--verbose`; `RUST_LOG` takes precedence.
fn default_log_level(global: &GlobalArgs) -> &'static str {
    if global.quiet {
        "error"
    } else if global.verbose {
        "debug"
    } else {
        "warn"
    }
}

fn init_logging(global: &GlobalArgs) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(global)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(global.color)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn global(quiet: bool, verbose: bool) -> GlobalArgs {
        GlobalArgs {
            quiet,
            verbose,
            color: false,
            config: None,
        }
    }

    #[test]
    fn parse_init_default() {
        let cli = Cli::parse_from(["strobe", "init"]);
        match cli.command {
            Command::Init { name } => assert!(name.is_none()),
            _ => panic!("expected Init command"),
        }
    }

    #[test]
    fn parse_init_with_name() {
        let cli = Cli::parse_from(["strobe", "init", "usb_loopback"]);
        match cli.command {
            Command::Init { name } => assert_eq!(name.as_deref(), Some("usb_loopback")),
            _ => panic!("expected Init command"),
        }
    }

    #[test]
    fn parse_plan_json() {
        let cli = Cli::parse_from(["strobe", "plan", "--format", "json"]);
        match cli.command {
            Command::Plan(args) => assert_eq!(args.format, ReportFormat::Json),
            _ => panic!("expected Plan command"),
        }
    }

    #[test]
    fn parse_sim_defaults() {
        let cli = Cli::parse_from(["strobe", "sim"]);
        match cli.command {
            Command::Sim(args) => {
                assert!(args.time.is_none());
                assert!(args.output.is_none());
                assert!(!args.no_waveform);
                assert!(!args.never_lock);
                assert!(args.frames.is_none());
                assert_eq!(args.format, ReportFormat::Text);
            }
            _ => panic!("expected Sim command"),
        }
    }

    #[test]
    fn parse_sim_with_options() {
        let cli = Cli::parse_from([
            "strobe",
            "sim",
            "--time",
            "2us",
            "--frames",
            "1,2,3",
            "--stall-seed",
            "7",
            "--stall-probability",
            "0.25",
            "--never-lock",
            "--no-waveform",
        ]);
        match cli.command {
            Command::Sim(args) => {
                assert_eq!(args.time.as_deref(), Some("2us"));
                assert_eq!(args.frames, Some(vec![1, 2, 3]));
                assert_eq!(args.stall_seed, Some(7));
                assert_eq!(args.stall_probability, Some(0.25));
                assert!(args.never_lock);
                assert!(args.no_waveform);
            }
            _ => panic!("expected Sim command"),
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from([
            "strobe",
            "--quiet",
            "--color",
            "never",
            "--config",
            "board/strobe.toml",
            "plan",
        ]);
        assert!(cli.quiet);
        assert_eq!(cli.color, ColorChoice::Never);
        assert_eq!(cli.config.as_deref(), Some("board/strobe.toml"));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["strobe", "sim", "--verbose"]);
        assert!(cli.verbose);
    }

    #[test]
    fn log_level_follows_flags() {
        assert_eq!(default_log_level(&global(true, false)), "error");
        assert_eq!(default_log_level(&global(false, true)), "debug");
        assert_eq!(default_log_level(&global(false, false)), "warn");
    }
}
