use std::process;

use sim_lib::config::SimConfig;
use sim_lib::error::SimulatorResult;
use sim_lib::flags::EvalArgs;
use sim_lib::memory::bus::ArbitrationPolicy;
use sim_lib::run_wrapper;

fn main() {
    let args = EvalArgs::from_env_or_exit();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = run_eval(args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Runs the same programs under each arbitration policy and compares CPI
fn run_eval(args: EvalArgs) -> SimulatorResult<()> {
    let base = run_wrapper::resolve_config(args.config.as_deref(), args.limit)?;
    let programs = args.programs();

    let mut writer = csv::Writer::from_path(&args.output)?;
    writer.write_record([
        "Policy",
        "Core",
        "Cycles",
        "Retired",
        "CPI",
        "Blocked polls",
        "Completed",
    ])?;

    for (name, policy) in [
        ("fifo", ArbitrationPolicy::Fifo),
        ("first-touch", ArbitrationPolicy::FirstTouch),
    ] {
        eprintln!("Running with {} arbitration", name);
        let config = SimConfig { arbitration: policy, ..base.clone() };

        match run_wrapper::run(config, &programs, false) {
            Ok((sim, summary)) => {
                if !summary.completed {
                    eprintln!(
                        "Warning: {} run stopped at the cycle limit of {} cycles",
                        name, summary.cycles
                    );
                }
                for core in sim.cores() {
                    let h = &core.history;
                    writer.write_record([
                        name,
                        &core.id.0.to_string(),
                        &h.cycle_count.to_string(),
                        &h.inst_count.to_string(),
                        &format!("{:.3}", h.cpi()),
                        &h.blocked_count.to_string(),
                        &core.is_complete().to_string(),
                    ])?;
                }
            }
            Err(e) => {
                eprintln!("Warning: Failed to run with {} arbitration: {}", name, e);
                writer.write_record([name, "Error", "Error", "Error", "Error", "Error", "Error"])?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}
