//! CSV reports of a finished run

use std::io;
use std::path::Path;

use crate::error::SimulatorResult;
use crate::pipelined::pipeline::Stage;
use crate::pipelined::Core;

/// One row per core with its counters and CPI
pub fn write_summary<W: io::Write>(
    writer: &mut csv::Writer<W>,
    cores: &[Core],
) -> SimulatorResult<()> {
    writer.write_record([
        "Core",
        "Cycles",
        "Fetched",
        "Retired",
        "CPI",
        "Flushed",
        "Fetch stalls",
        "Execute stalls",
        "Store stalls",
        "Blocked polls",
    ])?;
    for core in cores {
        let h = &core.history;
        writer.write_record([
            core.id.0.to_string(),
            h.cycle_count.to_string(),
            h.fetch_count.to_string(),
            h.inst_count.to_string(),
            format!("{:.3}", h.cpi()),
            h.flush_count.to_string(),
            h.fetch_stall_count.to_string(),
            h.execute_stall_count.to_string(),
            h.store_stall_count.to_string(),
            h.blocked_count.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// One row per retired instruction, in retirement order per core
pub fn write_timeline<W: io::Write>(
    writer: &mut csv::Writer<W>,
    cores: &[Core],
) -> SimulatorResult<()> {
    writer.write_record([
        "Core", "PC", "Raw", "Instruction", "Fetch", "Decode", "Execute", "Store", "Retired",
    ])?;
    for core in cores {
        for retired in &core.timeline {
            let mut record = vec![
                core.id.0.to_string(),
                format!("{:#06x}", retired.pc),
                format!("{:#010x}", retired.raw),
                retired.text.clone(),
            ];
            // Stages the instruction skipped are left blank
            record.extend(Stage::ALL.iter().map(|stage| {
                retired.cycle_entered[*stage as usize]
                    .map(|cycle| cycle.to_string())
                    .unwrap_or_default()
            }));
            record.push(retired.retired.to_string());
            writer.write_record(&record)?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn save_summary(path: &Path, cores: &[Core]) -> SimulatorResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    write_summary(&mut writer, cores)?;
    log::info!("Wrote summary to {}", path.display());
    Ok(())
}

pub fn save_timeline(path: &Path, cores: &[Core]) -> SimulatorResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    write_timeline(&mut writer, cores)?;
    log::info!("Wrote timeline to {}", path.display());
    Ok(())
}
