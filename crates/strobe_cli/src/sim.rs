//! `strobe sim`: run the cycle-accurate model.
//!
//! Loads the project, applies CLI overrides on top of the `[sim]` section,
//! simulates to the time limit and prints a summary. A VCD is written to
//! `out/<project>.vcd` unless disabled.

use std::path::{Path, PathBuf};

use serde::Serialize;
use strobe_config::SimSettings;
use strobe_sim::{LockBehavior, SimConfig, SimResult, StallPolicy};

use crate::pipeline::{load_project, parse_duration};
use crate::{GlobalArgs, ReportFormat, SimArgs};

/// Stall seed used when a stall probability is given without a seed.
const DEFAULT_STALL_SEED: u64 = 0;

/// Machine-readable run summary.
#[derive(Debug, Serialize)]
struct SimReport<'a> {
    design: &'a str,
    waveform: Option<&'a Path>,
    sent: &'a [u64],
    loopback_ok: bool,
    result: &'a SimResult,
}

/// Runs the `strobe sim` command.
///
/// Returns exit code 0 when the loopback returned an uncorrupted prefix of
/// the sent frames and no handshake violation was seen, 1 otherwise. A PLL
/// that never locks is reported but is not a failure.
pub fn run(args: &SimArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = load_project(global)?;
    let design = &project.design;

    let waveform_path = if args.no_waveform {
        None
    } else {
        Some(match &args.output {
            Some(p) => PathBuf::from(p),
            None => {
                let out_dir = project.root.join("out");
                std::fs::create_dir_all(&out_dir)?;
                out_dir.join(format!("{}.vcd", design.name))
            }
        })
    };

    let sim_config = build_sim_config(args, &project.config.sim, waveform_path.clone())?;
    if !global.quiet && args.format == ReportFormat::Text {
        eprintln!("   Simulating {}", design.name);
    }

    let result = strobe_sim::simulate(design, &sim_config)?;
    let loopback_ok = loopback_ok(&sim_config.frames, &result);

    match args.format {
        ReportFormat::Json => {
            let report = SimReport {
                design: &design.name,
                waveform: waveform_path.as_deref(),
                sent: &sim_config.frames,
                loopback_ok,
                result: &result,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        ReportFormat::Text => {
            print!("{}", render_result(&result));
            if !global.quiet {
                if let Some(path) = &waveform_path {
                    eprintln!("   Waveform: {}", path.display());
                }
            }
        }
    }

    if loopback_ok {
        Ok(0)
    } else {
        if !global.quiet {
            eprintln!("   FAILED: loopback data or handshake mismatch");
        }
        Ok(1)
    }
}

/// Merges CLI overrides with the project's `[sim]` defaults.
fn build_sim_config(
    args: &SimArgs,
    settings: &SimSettings,
    waveform_path: Option<PathBuf>,
) -> Result<SimConfig, Box<dyn std::error::Error>> {
    let time_limit = match args.time.as_deref().or(settings.time.as_deref()) {
        Some(t) => Some(parse_duration(t)?),
        None => None,
    };

    let probability = args
        .stall_probability
        .unwrap_or(settings.stall_probability);
    if !(0.0..=1.0).contains(&probability) {
        return Err(format!("stall probability must be within [0, 1], got {probability}").into());
    }
    let stall = if probability > 0.0 {
        let seed = args.stall_seed.or(settings.stall_seed).unwrap_or(DEFAULT_STALL_SEED);
        StallPolicy::random(seed, probability)
    } else {
        StallPolicy::None
    };

    let frames = match &args.frames {
        Some(frames) => frames.clone(),
        None => settings.frames.iter().map(|&f| u64::from(f)).collect(),
    };

    Ok(SimConfig {
        time_limit,
        waveform_path,
        lock: args.never_lock.then_some(LockBehavior::Never),
        stall,
        frames,
    })
}

/// Received payloads must be an in-order prefix of what was sent, with no
/// handshake violations.
fn loopback_ok(sent: &[u64], result: &SimResult) -> bool {
    match &result.bridge {
        None => true,
        Some(bridge) => {
            let mask = if bridge.width >= 64 {
                u64::MAX
            } else {
                (1u64 << bridge.width) - 1
            };
            bridge.handshake_violations == 0
                && bridge.received.len() <= sent.len()
                && bridge
                    .received
                    .iter()
                    .zip(sent)
                    .all(|(&got, &want)| got == want & mask)
        }
    }
}

fn render_result(result: &SimResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("finished at {}\n", result.final_time));
    match result.lock_time {
        Some(t) => out.push_str(&format!("pll        locked at {t}\n")),
        None => out.push_str("pll        never locked\n"),
    }
    for d in &result.domains {
        let state = match (d.resettable, d.in_reset, d.reset_released_at) {
            (false, _, _) => "no reset".to_string(),
            (true, true, _) => "in reset".to_string(),
            (true, false, Some(t)) => format!("released at {t}"),
            (true, false, None) => "released".to_string(),
        };
        out.push_str(&format!(
            "{:<12} {:>10} {:>8} edges  {state}\n",
            d.name,
            d.frequency.to_string(),
            d.edges
        ));
    }
    if let Some(cal) = &result.calibration {
        match cal.released_at {
            Some(t) => out.push_str(&format!("calibration released at {t} ({})\n", cal.domain)),
            None => out.push_str(&format!(
                "calibration held, countdown {} ({})\n",
                cal.countdown, cal.domain
            )),
        }
    }
    if let Some(b) = &result.bridge {
        out.push_str(&format!(
            "bridge     {} in, {} out, peak {} of {}, {} pending\n",
            b.stats.frames_in, b.stats.frames_out, b.stats.peak_occupancy, b.capacity, b.pending
        ));
        out.push_str(&format!("received   {:?}\n", b.received));
        if b.handshake_violations > 0 {
            out.push_str(&format!(
                "handshake  {} violation(s)\n",
                b.handshake_violations
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::init::template;
    use crate::{Cli, Command};

    fn sim_args(extra: &[&str]) -> SimArgs {
        let mut argv = vec!["strobe", "sim"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Sim(args) => args,
            _ => panic!("expected Sim command"),
        }
    }

    fn settings() -> SimSettings {
        strobe_config::load_config_from_str(&template("demo"))
            .unwrap()
            .sim
    }

    fn simulate(args: &SimArgs) -> (SimConfig, SimResult) {
        let config = strobe_config::load_config_from_str(&template("demo")).unwrap();
        let design = strobe_config::resolve_design(&config).unwrap();
        let sim_config = build_sim_config(args, &config.sim, None).unwrap();
        let result = strobe_sim::simulate(&design, &sim_config).unwrap();
        (sim_config, result)
    }

    #[test]
    fn settings_supply_defaults() {
        let config = build_sim_config(&sim_args(&[]), &settings(), None).unwrap();
        assert_eq!(config.time_limit, Some(2 * strobe_sim::time::FS_PER_US));
        assert_eq!(config.frames, vec![1, 2, 3]);
        assert_eq!(config.stall, StallPolicy::None);
        assert!(config.lock.is_none());
    }

    #[test]
    fn cli_overrides_settings() {
        let args = sim_args(&[
            "--time",
            "500ns",
            "--frames",
            "9,8",
            "--stall-seed",
            "5",
            "--stall-probability",
            "0.5",
            "--never-lock",
        ]);
        let config = build_sim_config(&args, &settings(), None).unwrap();
        assert_eq!(config.time_limit, Some(500 * strobe_sim::time::FS_PER_NS));
        assert_eq!(config.frames, vec![9, 8]);
        assert_eq!(config.stall, StallPolicy::random(5, 0.5));
        assert_eq!(config.lock, Some(LockBehavior::Never));
    }

    #[test]
    fn probability_without_seed_uses_default_seed() {
        let args = sim_args(&["--stall-probability", "0.5"]);
        let config = build_sim_config(&args, &settings(), None).unwrap();
        assert_eq!(config.stall, StallPolicy::random(DEFAULT_STALL_SEED, 0.5));
    }

    #[test]
    fn bad_probability_rejected() {
        let args = sim_args(&["--stall-probability", "2"]);
        assert!(build_sim_config(&args, &settings(), None).is_err());
    }

    #[test]
    fn loopback_report_passes() {
        let (config, result) = simulate(&sim_args(&[]));
        assert!(loopback_ok(&config.frames, &result));
        let text = render_result(&result);
        assert!(text.contains("locked at"));
        assert!(text.contains("calibration released"));
        assert!(text.contains("received   [1, 2, 3]"));
    }

    #[test]
    fn never_lock_is_not_a_failure() {
        let (config, result) = simulate(&sim_args(&["--never-lock"]));
        assert!(loopback_ok(&config.frames, &result));
        let text = render_result(&result);
        assert!(text.contains("never locked"));
        assert!(text.contains("in reset"));
        assert!(text.contains("calibration held, countdown 15"));
    }

    #[test]
    fn corrupted_loopback_detected() {
        let (_, result) = simulate(&sim_args(&[]));
        assert!(!loopback_ok(&[1, 2, 4], &result));
        assert!(!loopback_ok(&[1, 2], &result));
    }

    #[test]
    fn json_report_serializes() {
        let (config, result) = simulate(&sim_args(&[]));
        let report = SimReport {
            design: "demo",
            waveform: None,
            sent: &config.frames,
            loopback_ok: true,
            result: &result,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["result"]["locked"], true);
        assert_eq!(
            json["result"]["bridge"]["received"],
            serde_json::json!([1, 2, 3])
        );
    }
}
