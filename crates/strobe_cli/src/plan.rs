//! `strobe plan`: print the derived clock tree.

use std::fmt::Write as _;

use strobe_config::{ClockSource, ResetPolicy};
use strobe_sim::ClockPlan;

use crate::pipeline::load_project;
use crate::{GlobalArgs, PlanArgs, ReportFormat};

/// Runs the `strobe plan` command. Planning failures are returned as errors.
pub fn run(args: &PlanArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = load_project(global)?;
    let plan = strobe_sim::plan_design(&project.design)?;

    match args.format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        ReportFormat::Text => {
            if !global.quiet {
                eprintln!("   Planning {}", project.design.name);
            }
            print!("{}", render_plan(&plan));
        }
    }
    Ok(0)
}

/// Human-readable table of a plan.
pub(crate) fn render_plan(plan: &ClockPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "reference  {} on {}",
        plan.reference, plan.reference_port
    );
    let _ = writeln!(
        out,
        "pll        M={} D={} VCO={} (lock after {} reference cycles)",
        plan.mult, plan.divide, plan.vco, plan.lock_cycles
    );
    let _ = writeln!(
        out,
        "{:<12} {:>10} {:>7} {:>4} {:>7} {:>9}  reset",
        "domain", "frequency", "ratio", "O", "phase", "offset"
    );
    for d in &plan.domains {
        let divider = match (d.source, d.output_divide) {
            (ClockSource::Reference, _) => "ref".to_string(),
            (_, Some(o)) => o.to_string(),
            (_, None) => "-".to_string(),
        };
        let reset = if d.reserved {
            "reserved"
        } else {
            match d.reset_policy {
                ResetPolicy::Resettable => "sync",
                ResetPolicy::ResetLess => "none",
            }
        };
        let _ = writeln!(
            out,
            "{:<12} {:>10} {:>7} {:>4} {:>6.1}° {:>6} ps  {}",
            d.name,
            d.frequency.to_string(),
            format!("{}/{}", d.multiply, d.divide),
            divider,
            d.phase_deg,
            d.phase_offset_fs / 1_000,
            reset
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::template;

    fn plan() -> ClockPlan {
        let config = strobe_config::load_config_from_str(&template("demo")).unwrap();
        let design = strobe_config::resolve_design(&config).unwrap();
        strobe_sim::plan_design(&design).unwrap()
    }

    #[test]
    fn text_lists_every_domain() {
        let text = render_plan(&plan());
        assert!(text.contains("M=16 D=1"));
        for name in ["sys", "sys4x", "sys4x_dqs", "clk200", "aux", "clk100"] {
            assert!(text.lines().any(|l| l.starts_with(name)), "missing {name}");
        }
        assert!(text.contains("reserved"));
        assert!(text.contains("625 ps"));
    }

    #[test]
    fn json_exposes_plan_fields() {
        let json = serde_json::to_value(plan()).unwrap();
        assert_eq!(json["mult"], 16);
        assert_eq!(json["domains"].as_array().unwrap().len(), 6);
        assert_eq!(json["domains"][2]["phase_steps"], 8);
    }
}
