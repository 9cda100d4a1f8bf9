// Rivet - RISC-V Directed Test Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{RunSignals, SimContext, SimulatorBackend, TohostWrite};
use crate::toolchain::ProcessOutput;
use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

static FAILED_LINE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

const LIMIT_MARKERS: &[&str] = &["instruction limit", "max-instrs"];
const LOAD_FAILURE_MARKERS: &[&str] = &["could not open", "unable to load", "not a valid ELF"];

#[derive(Debug, Clone, Copy, Default)]
pub struct Spike;

/// `*** FAILED *** (tohost = N)` reports the test number; the written value
/// was `(N << 1) | 1`.
fn failed_write(text: &str) -> Option<u64> {
    let pattern = FAILED_LINE
        .get_or_init(|| Regex::new(r"\*\*\* FAILED \*\*\* \(tohost = (\d+)\)"))
        .as_ref()
        .ok()?;
    let code: u64 = pattern.captures(text)?.get(1)?.as_str().parse().ok()?;
    Some((code << 1) | 1)
}

/// Stores to `tohost` in a `--log-commits` trace, e.g.
/// `core   0: 3 0x80000040 (0x00b2b023) mem 0x80001000 0x1`.
fn commit_log_writes(text: &str, tohost: u64) -> Vec<TohostWrite> {
    text.lines()
        .filter_map(|line| {
            let rest = line.trim_start().strip_prefix("core")?;
            let (hart, rest) = rest.split_once(':')?;
            let hart = hart.trim().parse().ok()?;
            let fields: Vec<&str> = rest.split_whitespace().collect();
            let at = fields.iter().position(|f| *f == "mem")?;
            let address = parse_hex(fields.get(at + 1)?)?;
            let value = parse_hex(fields.get(at + 2)?)?;
            (address == tohost).then_some(TohostWrite { hart, value })
        })
        .collect()
}

fn parse_hex(text: &str) -> Option<u64> {
    u64::from_str_radix(text.strip_prefix("0x").unwrap_or(text), 16).ok()
}

impl SimulatorBackend for Spike {
    fn name(&self) -> &'static str {
        "spike"
    }

    fn env_var(&self) -> &'static str {
        "SPIKE_PATH"
    }

    fn arguments(&self, ctx: &SimContext<'_>) -> Vec<String> {
        let mut args = ctx.config.args.clone();
        args.push("-l".into());
        args.push("--log-commits".into());
        args.push(format!("--log={}", ctx.log.display()));
        args.push(format!("--isa={}", ctx.config.isa));
        if ctx.num_harts > 1 {
            args.push(format!("-p{}", ctx.num_harts));
        }
        args.push(format!("--max-instrs={}", ctx.limits.max_instructions));
        for dump in ctx.dumps {
            args.push(format!("--dump-memory={}", dump.render()));
        }
        args.push(ctx.elf.display().to_string());
        args
    }

    fn interpret(
        &self,
        output: &ProcessOutput,
        ctx: &SimContext<'_>,
        tohost: Option<u64>,
    ) -> RunSignals {
        let stderr = output.stderr();
        let mut signals = RunSignals {
            instruction_limit_hit: LIMIT_MARKERS.iter().any(|m| stderr.contains(m)),
            ..RunSignals::default()
        };
        if let Some(line) = stderr
            .lines()
            .find(|l| LOAD_FAILURE_MARKERS.iter().any(|m| l.contains(m)))
        {
            signals.unrunnable = Some(line.trim().to_string());
            return signals;
        }

        if let Some(tohost) = tohost {
            match std::fs::read_to_string(&ctx.log) {
                Ok(log) => signals.tohost_writes = commit_log_writes(&log, tohost),
                Err(e) => warn!("No spike commit log at {:?}: {}", ctx.log, e),
            }
        }
        if signals.tohost_writes.is_empty() {
            if let Some(value) = failed_write(&stderr) {
                signals.tohost_writes.push(TohostWrite { hart: 0, value });
            } else if output.success() && !signals.instruction_limit_hit {
                signals.tohost_writes.push(TohostWrite { hart: 0, value: 1 });
            }
        }
        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_line_decodes_written_value() {
        assert_eq!(failed_write("*** FAILED *** (tohost = 1)\n"), Some(3));
        assert_eq!(failed_write("*** FAILED *** (tohost = 28502)"), Some(0xdead));
        assert_eq!(failed_write("all good"), None);
    }

    #[test]
    fn test_commit_log_writes() {
        let log = "\
core   0: 3 0x0000000080000040 (0x00b2b023) mem 0x0000000080001000 0x0000000000000001
core   1: 3 0x0000000080000044 (0x0002b283) x5 0x0000000000000000 mem 0x0000000080001000
core   1: 3 0x0000000080000048 (0x00b2b023) mem 0x0000000080003000 0x000000000000aced
";
        let writes = commit_log_writes(log, 0x8000_1000);
        assert_eq!(writes, vec![TohostWrite { hart: 0, value: 1 }]);
    }
}
