use std::process;

use sim_lib::error::SimulatorResult;
use sim_lib::flags::SimArgs;
use sim_lib::report;
use sim_lib::run_wrapper;
use sim_lib::simulator::Simulator;

fn main() {
    let args = SimArgs::from_env_or_exit();

    let filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    if let Err(e) = run_sim(args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run_sim(args: SimArgs) -> SimulatorResult<()> {
    let mut config = run_wrapper::resolve_config(args.config.as_deref(), args.limit)?;
    if let Some(policy) = args.arbitration {
        config.arbitration = policy;
    }

    let (sim, summary) =
        run_wrapper::run(config, &args.programs(), args.timeline.is_some())?;

    if !summary.completed {
        eprintln!("Stopped at the cycle limit of {} cycles", summary.cycles);
    }
    print_summary(&sim);
    if args.dump {
        print_dump(&sim);
    }

    if let Some(path) = &args.report {
        report::save_summary(path, sim.cores())?;
    }
    if let Some(path) = &args.timeline {
        report::save_timeline(path, sim.cores())?;
    }
    Ok(())
}

fn print_summary(sim: &Simulator) {
    for core in sim.cores() {
        let h = &core.history;
        println!(
            "{}: {} cycles, {} fetched, {} retired, CPI = {:.2}{}",
            core.id,
            h.cycle_count,
            h.fetch_count,
            h.inst_count,
            h.cpi(),
            if core.is_complete() { "" } else { " (unfinished)" }
        );
    }
}

fn print_dump(sim: &Simulator) {
    for core in sim.cores() {
        println!("{} registers (pc = {:#06x}):", core.id, core.pc);
        for (name, value) in core.regs.iter() {
            println!("  {:>4} = {:#010x} ({})", name, value, value as i32);
        }
    }
    for (name, range) in sim.dump_regions() {
        let words = sim.bus().memory().dump(range.start, range.end);
        println!("{} [{:#06x}..{:#06x}]: {:?}", name, range.start, range.end, words);
    }
}
