// Rivet - RISC-V Directed Test Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{RunSignals, SimContext, SimulatorBackend, TohostWrite};
use crate::toolchain::ProcessOutput;
use tracing::warn;

const LIMIT_MARKER: &str = "Reached instruction limit";
const ILLEGAL_MARKER: &str = "consecutive illegal instructions";
const LOAD_FAILURE_MARKERS: &[&str] = &["Failed to load ELF", "No program file specified"];

#[derive(Debug, Clone, Copy, Default)]
pub struct Whisper;

/// Extracts memory writes to `tohost` from a whisper trace.
///
/// Trace lines start with `#`; field 1 is the hart, field 5 the record type
/// (`m` for memory), field 6 the address and field 7 the value in hex. When
/// the tohost address is unknown the last trace line is taken as the write.
pub fn parse_whisper_log(text: &str, tohost: Option<u64>) -> Vec<TohostWrite> {
    let records = text.lines().map(str::trim).filter(|l| l.starts_with('#'));
    let parse = |line: &str| -> Option<(u32, String, u64, u64)> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let hart = fields.get(1)?.parse().ok()?;
        let kind = fields.get(5)?.to_string();
        let address = u64::from_str_radix(fields.get(6)?, 16).ok()?;
        let value = u64::from_str_radix(fields.get(7)?, 16).ok()?;
        Some((hart, kind, address, value))
    };

    match tohost {
        Some(tohost) => records
            .filter_map(parse)
            .filter(|(_, kind, address, _)| kind == "m" && *address == tohost)
            .map(|(hart, _, _, value)| TohostWrite { hart, value })
            .collect(),
        None => records
            .last()
            .and_then(parse)
            .map(|(hart, _, _, value)| vec![TohostWrite { hart, value }])
            .unwrap_or_default(),
    }
}

impl SimulatorBackend for Whisper {
    fn name(&self) -> &'static str {
        "whisper"
    }

    fn env_var(&self) -> &'static str {
        "WHISPER_PATH"
    }

    fn arguments(&self, ctx: &SimContext<'_>) -> Vec<String> {
        let mut args = ctx.config.args.clone();
        if let Some(config_file) = &ctx.config.config_file {
            args.push("--configfile".into());
            args.push(config_file.display().to_string());
        }
        args.push("--traceptw".into());
        args.push("--memorysize".into());
        args.push(ctx.config.memory_size.clone());
        args.push(format!("--maxinst={}", ctx.limits.max_instructions));
        if ctx.num_harts > 1 {
            args.push(format!("--harts={}", ctx.num_harts));
        }
        for dump in ctx.dumps {
            args.push("--dumpmem".into());
            args.push(dump.render());
        }
        args.push(ctx.elf.display().to_string());
        args.push("--logfile".into());
        args.push(ctx.log.display().to_string());
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
            instruction_limit_hit: stderr.contains(LIMIT_MARKER),
            ..RunSignals::default()
        };

        if let Some(marker) = LOAD_FAILURE_MARKERS.iter().find(|m| stderr.contains(*m)) {
            let message = stderr
                .rsplit("Error:")
                .next()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or(*marker);
            signals.unrunnable = Some(message.to_string());
            return signals;
        }
        if let Some(line) = stderr.lines().find(|l| l.contains(ILLEGAL_MARKER)) {
            signals.illegal_instructions = Some(line.trim().to_string());
        }

        match std::fs::read_to_string(&ctx.log) {
            Ok(log) if log.trim().is_empty() => signals.empty_log = !output.success(),
            Ok(log) => signals.tohost_writes = parse_whisper_log(&log, tohost),
            Err(e) => warn!("No whisper log at {:?}: {}", ctx.log, e),
        }
        if signals.tohost_writes.is_empty() && output.success() && !signals.instruction_limit_hit {
            // whisper exits cleanly only after a passing tohost write
            signals.tohost_writes.push(TohostWrite { hart: 0, value: 1 });
        }
        signals
    }
}
