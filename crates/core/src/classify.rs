// Rivet - RISC-V Directed Test Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::error::{FailureKind, ToolchainError};
use crate::plan::TestPlan;
use crate::scheduling::{HartSet, Verdict};
use crate::simulator::RawRunResult;
use serde::Serialize;
use tracing::{info, warn};

/// Terminal classification of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Pass,
    Fail {
        kind: FailureKind,
        code: u64,
        raw_text: String,
    },
}

impl ExecutionOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, ExecutionOutcome::Pass)
    }

    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            ExecutionOutcome::Pass => None,
            ExecutionOutcome::Fail { kind, .. } => Some(*kind),
        }
    }

    pub fn fail_code(&self) -> Option<u64> {
        match self {
            ExecutionOutcome::Pass => None,
            ExecutionOutcome::Fail { code, .. } => Some(*code),
        }
    }

    /// `Fail` as an error, for callers that propagate with `?`.
    pub fn into_result(self, tool: &str) -> Result<(), ToolchainError> {
        match self {
            ExecutionOutcome::Pass => Ok(()),
            ExecutionOutcome::Fail {
                kind,
                code,
                raw_text,
            } => Err(ToolchainError::new(tool, kind, raw_text).with_fail_code(code)),
        }
    }
}

fn simulator_error(raw: &RawRunResult, kind: FailureKind, text: String) -> ToolchainError {
    ToolchainError::new(raw.backend.as_str(), kind, text)
        .with_command(raw.command.clone())
        .with_exit_code(raw.exit_code)
        .with_log(&raw.log_path)
}

/// Maps a raw run onto `Pass`/`Fail`, or a propagated simulator error when
/// no verdict was observed.
///
/// Only the configured pass value means pass; every other written value is
/// echoed back as the fail code.
pub fn classify(raw: &RawRunResult, plan: &TestPlan) -> Result<ExecutionOutcome, ToolchainError> {
    // a killed run may have left a partial log behind
    if raw.timed_out {
        return Err(simulator_error(raw, FailureKind::Timeout, raw.stderr.clone()));
    }
    if raw.instruction_limit_hit {
        return Ok(ExecutionOutcome::Fail {
            kind: FailureKind::MaxInstructionLimit,
            code: 0,
            raw_text: raw.stderr.clone(),
        });
    }
    if let Some(reason) = &raw.unrunnable {
        return Ok(ExecutionOutcome::Fail {
            kind: FailureKind::ElfFailure,
            code: 0,
            raw_text: reason.clone(),
        });
    }

    let mut harts = HartSet::new(plan.num_harts, plan.scheduling);
    for write in &raw.tohost_writes {
        if let Err(e) = harts.record(*write, plan.eot.pass) {
            warn!("Ignoring tohost write {:#x} from hart {}: {}", write.value, write.hart, e);
        }
    }

    match harts.aggregate() {
        Some(Verdict::Fail { hart, code }) => {
            info!(hart, "tohost fail code {:#x}", code);
            return Ok(ExecutionOutcome::Fail {
                kind: FailureKind::TohostFail,
                code,
                raw_text: format!("hart {} wrote {:#x} to tohost", hart, code),
            });
        }
        Some(Verdict::Pass) => {
            if !raw.missing_dumps.is_empty() {
                let missing: Vec<String> = raw
                    .missing_dumps
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect();
                return Err(simulator_error(
                    raw,
                    FailureKind::MissingOutput,
                    format!("memory dump not written: {}", missing.join(", ")),
                ));
            }
            return Ok(ExecutionOutcome::Pass);
        }
        None => {}
    }

    let (kind, text) = if raw.crashed() {
        (FailureKind::Segfault, raw.stderr.clone())
    } else if let Some(line) = &raw.illegal_instructions {
        (FailureKind::IllegalInstructions, line.clone())
    } else if raw.empty_log {
        (FailureKind::BadConfig, raw.stderr.clone())
    } else {
        let text = if raw.stderr.trim().is_empty() {
            format!("no tohost write observed\n{}", raw.stdout)
        } else {
            raw.stderr.clone()
        };
        (FailureKind::NonzeroExit, text)
    };
    Err(simulator_error(raw, kind, text))
}
