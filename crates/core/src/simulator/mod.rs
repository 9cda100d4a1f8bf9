// Rivet - RISC-V Directed Test Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Runs a built test under an external instruction-set simulator.
//!
//! Both backends sit behind [`SimulatorBackend`]: the driver owns process
//! spawning, timeouts and memory-dump validation, while each backend only
//! builds its argument list and reads its own diagnostics back into a
//! [`RunSignals`].

mod spike;
mod whisper;

pub use spike::Spike;
pub use whisper::{parse_whisper_log, Whisper};

use crate::error::{FailureKind, PipelineError, PipelineResult, ToolchainError};
use crate::toolchain::{command_line, find_executable, run_with_timeout, BuildArtifacts, ProcessOutput};
use rivet_config::{parse_int, Backend, SimulatorConfig};
use rivet_loader::ElfImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimLimits {
    pub max_instructions: u64,
    pub timeout: Duration,
}

impl SimLimits {
    pub fn from_config(config: &SimulatorConfig) -> Self {
        Self {
            max_instructions: config.max_instructions,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

/// A resolved `file:start:end` memory-dump request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DumpRequest {
    pub file: PathBuf,
    pub start: u64,
    pub end: u64,
}

fn resolve_address(term: &str, elf: &ElfImage) -> PipelineResult<u64> {
    let bad = |why: String| PipelineError::ConfigConflict(format!("dump address '{}': {}", term, why));
    let mut total: u64 = 0;
    for part in term.split('+') {
        let part = part.trim();
        let value = match part.strip_prefix('@') {
            Some(symbol) => elf
                .symbol(symbol)
                .ok_or_else(|| bad(format!("symbol '{}' not found in ELF", symbol)))?,
            None => parse_int(part).map_err(|e| bad(format!("{:#}", e)))?,
        };
        total = total
            .checked_add(value)
            .ok_or_else(|| bad("address overflows".to_string()))?;
    }
    Ok(total)
}

impl DumpRequest {
    /// Parses `file:start:end`, resolving `@symbol` and `+offset` terms.
    pub fn parse(text: &str, elf: &ElfImage, run_dir: &Path) -> PipelineResult<Self> {
        let parts: Vec<&str> = text.split(':').collect();
        let [file, start, end] = parts.as_slice() else {
            return Err(PipelineError::ConfigConflict(format!(
                "memory dump '{}' must be file:start:end",
                text
            )));
        };
        let start = resolve_address(start, elf)?;
        let end = resolve_address(end, elf)?;
        if end < start {
            return Err(PipelineError::ConfigConflict(format!(
                "memory dump '{}' ends before it starts",
                text
            )));
        }
        let file = Path::new(file);
        Ok(Self {
            file: if file.is_absolute() {
                file.to_path_buf()
            } else {
                run_dir.join(file)
            },
            start,
            end,
        })
    }

    pub fn render(&self) -> String {
        format!("{}:{:#x}:{:#x}", self.file.display(), self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TohostWrite {
    pub hart: u32,
    pub value: u64,
}

/// Everything a backend needs to build its command line.
#[derive(Debug, Clone)]
pub struct SimContext<'a> {
    pub elf: &'a Path,
    pub num_harts: u32,
    pub limits: SimLimits,
    pub log: PathBuf,
    pub dumps: &'a [DumpRequest],
    pub config: &'a SimulatorConfig,
}

/// What a backend read out of its own exit status and logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSignals {
    pub instruction_limit_hit: bool,
    /// The simulator could not load or start the binary.
    pub unrunnable: Option<String>,
    pub illegal_instructions: Option<String>,
    pub empty_log: bool,
    pub tohost_writes: Vec<TohostWrite>,
}

pub trait SimulatorBackend: Send + Sync {
    fn name(&self) -> &'static str;
    fn env_var(&self) -> &'static str;
    fn arguments(&self, ctx: &SimContext<'_>) -> Vec<String>;
    fn interpret(
        &self,
        output: &ProcessOutput,
        ctx: &SimContext<'_>,
        tohost: Option<u64>,
    ) -> RunSignals;
}

pub fn backend_for(backend: Backend) -> Box<dyn SimulatorBackend> {
    match backend {
        Backend::Whisper => Box::new(Whisper),
        Backend::Spike => Box::new(Spike),
    }
}

/// Uninterpreted outcome of one simulator run.
#[derive(Debug, Clone, Serialize)]
pub struct RawRunResult {
    pub backend: String,
    pub command: Vec<String>,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub timed_out: bool,
    pub instruction_limit_hit: bool,
    pub unrunnable: Option<String>,
    pub illegal_instructions: Option<String>,
    pub empty_log: bool,
    pub tohost_writes: Vec<TohostWrite>,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
    pub dumps: Vec<PathBuf>,
    pub missing_dumps: Vec<PathBuf>,
}

impl RawRunResult {
    pub fn crashed(&self) -> bool {
        self.signal == Some(11) || self.exit_code == Some(139)
    }
}

pub struct Simulator {
    backend: Box<dyn SimulatorBackend>,
    config: SimulatorConfig,
}

impl Simulator {
    pub fn from_config(config: &SimulatorConfig) -> Self {
        Self {
            backend: backend_for(config.backend),
            config: config.clone(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Runs `artifacts.elf`. Only spawn failures and bad dump requests are
    /// errors here; every other condition is reported in the result.
    pub fn run(
        &self,
        artifacts: &BuildArtifacts,
        num_harts: u32,
        tohost: Option<u64>,
        limits: SimLimits,
    ) -> PipelineResult<RawRunResult> {
        let name = self.backend.name();
        let executable = find_executable(self.config.path.as_deref(), self.backend.env_var(), name)
            .ok_or_else(|| {
                ToolchainError::new(
                    name,
                    FailureKind::BadConfig,
                    format!(
                        "{} not found: set simulator.path, {} or put it on PATH",
                        name,
                        self.backend.env_var()
                    ),
                )
            })?;

        let dumps = self
            .config
            .dumpmem
            .iter()
            .map(|req| DumpRequest::parse(req, &artifacts.elf_image, &artifacts.run_dir))
            .collect::<PipelineResult<Vec<_>>>()?;

        let stem = artifacts
            .elf
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "test".to_string());
        let run_dir = &artifacts.run_dir;
        let ctx = SimContext {
            elf: &artifacts.elf,
            num_harts,
            limits,
            log: run_dir.join(format!("{}_{}.log", stem, name)),
            dumps: &dumps,
            config: &self.config,
        };
        let args = self.backend.arguments(&ctx);
        let command = command_line(&executable, &args);
        info!("Running {} on {:?}", name, artifacts.elf);
        debug!("{}", command.join(" "));

        let output = run_with_timeout(
            &executable,
            &args,
            run_dir,
            run_dir.join(format!("{}_{}.stdout", stem, name)),
            run_dir.join(format!("{}_{}.stderr", stem, name)),
            limits.timeout,
        )
        .map_err(|e| {
            ToolchainError::new(name, FailureKind::BadConfig, e.to_string()).with_command(command.clone())
        })?;

        let signals = self.backend.interpret(&output, &ctx, tohost);
        let (present, missing): (Vec<PathBuf>, Vec<PathBuf>) = dumps
            .iter()
            .map(|d| d.file.clone())
            .partition(|f| f.is_file());

        debug!(
            exit = ?output.exit_code(),
            writes = signals.tohost_writes.len(),
            limit = signals.instruction_limit_hit,
            "{} finished",
            name
        );
        Ok(RawRunResult {
            backend: name.to_string(),
            command,
            exit_code: output.exit_code(),
            signal: output.signal(),
            timed_out: output.timed_out,
            instruction_limit_hit: signals.instruction_limit_hit,
            unrunnable: signals.unrunnable,
            illegal_instructions: signals.illegal_instructions,
            empty_log: signals.empty_log,
            tohost_writes: signals.tohost_writes,
            stdout: output.stdout(),
            stderr: output.stderr(),
            log_path: ctx.log.clone(),
            dumps: present,
            missing_dumps: missing,
        })
    }
}
