use std::path::PathBuf;

use crate::memory::bus::ArbitrationPolicy;

xflags::xflags! {
    /// Multicore pipelined RISC-V simulator.
    cmd SimArgs {
        /// Raw program image for core 0.
        required program: PathBuf

        /// Raw program image for core 1, loaded at the second configured base.
        optional second: PathBuf

        /// Stops the run after this many cycles; 0 runs until every core completes.
        /// Default: 25000
        optional -l, --limit cycles: u64

        /// TOML configuration file.
        optional -c, --config path: PathBuf

        /// Grant policy for contended addresses.
        /// fifo: blocked cores are served in arrival order (default)
        /// first-touch: whichever core polls first after release
        optional -a, --arbitration policy: ArbitrationPolicy

        /// Writes per-core counters to a CSV file.
        optional --report path: PathBuf

        /// Writes one CSV row per retired instruction.
        optional --timeline path: PathBuf

        /// Prints register files and memory arrays after the run.
        optional --dump

        /// Enables debug logging; RUST_LOG=trace shows every stage.
        optional -v, --verbose
    }
}

xflags::xflags! {
    /// Runs the same programs under each arbitration policy and writes a CSV comparison.
    cmd EvalArgs {
        /// CSV file to write.
        required output: PathBuf

        /// Raw program image for core 0.
        required program: PathBuf

        /// Raw program image for core 1.
        optional second: PathBuf

        /// Stops each run after this many cycles; 0 runs until every core completes.
        /// Default: 25000
        optional -l, --limit cycles: u64

        /// TOML configuration file; its arbitration setting is ignored.
        optional -c, --config path: PathBuf
    }
}

/// Cycle limit when neither the command line nor a config file sets one
pub const DEFAULT_CYCLE_LIMIT: u64 = 25000;

impl SimArgs {
    /// Program images in core order
    pub fn programs(&self) -> Vec<PathBuf> {
        std::iter::once(self.program.clone())
            .chain(self.second.clone())
            .collect()
    }
}

impl EvalArgs {
    /// Program images in core order
    pub fn programs(&self) -> Vec<PathBuf> {
        std::iter::once(self.program.clone())
            .chain(self.second.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    fn parse(args: &[&str]) -> Result<SimArgs, xflags::Error> {
        SimArgs::from_vec(args.iter().map(OsString::from).collect())
    }

    #[test]
    fn test_single_program() {
        let args = parse(&["prog.bin"]).unwrap();
        assert_eq!(args.programs(), vec![PathBuf::from("prog.bin")]);
        assert_eq!(args.limit, None);
        assert!(!args.dump);
    }

    #[test]
    fn test_all_flags() {
        let args = parse(&[
            "a.bin", "b.bin", "-l", "100", "-a", "first-touch", "--report", "r.csv", "--dump",
            "-v",
        ])
        .unwrap();
        assert_eq!(args.programs().len(), 2);
        assert_eq!(args.limit, Some(100));
        assert_eq!(args.arbitration, Some(ArbitrationPolicy::FirstTouch));
        assert_eq!(args.report, Some(PathBuf::from("r.csv")));
        assert!(args.dump && args.verbose);
    }

    #[test]
    fn test_eval_args() {
        let args = EvalArgs::from_vec(
            ["out.csv", "a.bin", "b.bin", "--limit", "500"]
                .iter()
                .map(OsString::from)
                .collect(),
        )
        .unwrap();
        assert_eq!(args.output, PathBuf::from("out.csv"));
        assert_eq!(args.programs(), vec![PathBuf::from("a.bin"), PathBuf::from("b.bin")]);
        assert_eq!(args.limit, Some(500));
        assert!(EvalArgs::from_vec(vec![OsString::from("out.csv")]).is_err());
    }

    #[test]
    fn test_bad_policy() {
        assert!(parse(&["a.bin", "-a", "lottery"]).is_err());
    }
}
