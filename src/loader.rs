//! Utility functions for preparing memory for execution

use std::ops::Range;
use std::path::Path;

use crate::config::FillRegion;
use crate::cpu::CoreId;
use crate::error::LoadError;
use crate::error::SimulatorResult;
use crate::memory::StorageInterface;

/// Splits a raw program image into little-endian 32-bit words.
/// A trailing partial word is dropped.
pub fn words_from_bytes(bytes: &[u8]) -> Vec<u32> {
    let chunks = bytes.chunks_exact(4);
    if !chunks.remainder().is_empty() {
        log::warn!(
            "Ignoring {} trailing bytes after the last full word",
            chunks.remainder().len()
        );
    }
    chunks
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Reads a headerless program file
pub fn read_program(path: &Path) -> SimulatorResult<Vec<u32>> {
    let bytes = std::fs::read(path)
        .map_err(|e| LoadError::FileReadError(path.to_path_buf(), e))?;
    Ok(words_from_bytes(&bytes))
}

/// Writes `words` to memory at `base` without latency.
/// Returns the address window the core may fetch from.
pub fn load_words(
    mem: &mut impl StorageInterface,
    core: CoreId,
    base: u32,
    words: &[u32],
    memory_size: usize,
) -> SimulatorResult<Range<u32>> {
    let size = words.len() * 4;
    if base as usize + size > memory_size {
        return Err(LoadError::DoesNotFit { base, size }.into());
    }

    let mut address = base;
    for word in words {
        mem.write32(core, address, *word, 0, true)?;
        address += 4;
    }
    log::info!(
        "{}: loaded {} instructions at {:#06x}..{:#06x}",
        core,
        words.len(),
        base,
        address
    );
    Ok(base..address)
}

/// Seeds a region with sequential words
pub fn fill(mem: &mut impl StorageInterface, region: &FillRegion) -> SimulatorResult<()> {
    let mut value = region.first;
    for address in (region.start..region.end).step_by(4) {
        mem.write32(CoreId(0), address, value, 0, true)?;
        value = value.wrapping_add(1);
    }
    log::debug!(
        "filled {:#06x}..{:#06x} starting from {}",
        region.start,
        region.end,
        region.first
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimulatorError;
    use crate::memory::bus::ArbitrationPolicy;
    use crate::memory::bus::Bus;
    use crate::memory::ram::Memory;

    fn bus() -> Bus {
        Bus::make(Memory::make(0x100, 2), ArbitrationPolicy::Fifo)
    }

    #[test]
    fn test_words_from_bytes() {
        let bytes = [0x13, 0x03, 0x20, 0x00, 0x93, 0x03, 0x30, 0x00, 0xff];
        assert_eq!(words_from_bytes(&bytes), vec![0x0020_0313, 0x0030_0393]);
        assert!(words_from_bytes(&[]).is_empty());
    }

    #[test]
    fn test_load_words() {
        let mut bus = bus();
        let window = load_words(&mut bus, CoreId(1), 0x20, &[1, 2, 3], 0x100).unwrap();
        assert_eq!(window, 0x20..0x2c);
        assert_eq!(bus.memory().dump(0x20, 0x2c), vec![1, 2, 3]);
        // Loading leaves no latency state behind
        assert!(bus.memory().delays(0x20).is_idle());
    }

    #[test]
    fn test_program_too_large() {
        let mut bus = bus();
        let err = load_words(&mut bus, CoreId(0), 0xf8, &[1, 2, 3], 0x100).unwrap_err();
        assert!(matches!(
            err,
            SimulatorError::LoadError(LoadError::DoesNotFit { base: 0xf8, size: 12 })
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = read_program(Path::new("/nonexistent/program.bin")).unwrap_err();
        assert!(matches!(err, SimulatorError::LoadError(LoadError::FileReadError(..))));
    }

    #[test]
    fn test_fill() {
        let mut bus = bus();
        fill(&mut bus, &FillRegion { start: 0x40, end: 0x50, first: 1 }).unwrap();
        assert_eq!(bus.memory().dump(0x40, 0x50), vec![1, 2, 3, 4]);
    }
}
