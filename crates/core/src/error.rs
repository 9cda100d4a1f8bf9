// Rivet - RISC-V Directed Test Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Failure taxonomy shared by the build chain, the simulators and the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// The build chain failed or produced an unusable executable.
    ElfFailure,
    /// The simulator rejected its own configuration.
    BadConfig,
    /// The test wrote something other than the pass value to tohost.
    TohostFail,
    MaxInstructionLimit,
    IllegalInstructions,
    Segfault,
    NonzeroExit,
    Timeout,
    /// A requested output (memory dump) was not produced.
    MissingOutput,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ElfFailure => "ELF_FAILURE",
            FailureKind::BadConfig => "BAD_CONFIG",
            FailureKind::TohostFail => "TOHOST_FAIL",
            FailureKind::MaxInstructionLimit => "MAX_INSTRUCTION_LIMIT",
            FailureKind::IllegalInstructions => "ILLEGAL_INSTRUCTIONS",
            FailureKind::Segfault => "SEGFAULT",
            FailureKind::NonzeroExit => "NONZERO_EXIT",
            FailureKind::Timeout => "TIMEOUT",
            FailureKind::MissingOutput => "MISSING_OUTPUT",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure from an external tool, carrying its raw diagnostics unmodified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", self.describe())]
pub struct ToolchainError {
    pub tool: String,
    pub command: Vec<String>,
    pub kind: FailureKind,
    pub exit_code: Option<i32>,
    /// Meaningful for TOHOST_FAIL; zero otherwise.
    pub fail_code: u64,
    pub log_path: Option<PathBuf>,
    pub raw_text: String,
}

impl ToolchainError {
    pub fn new(tool: impl Into<String>, kind: FailureKind, raw_text: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            command: Vec::new(),
            kind,
            exit_code: None,
            fail_code: 0,
            log_path: None,
            raw_text: raw_text.into(),
        }
    }

    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }

    pub fn with_exit_code(mut self, exit_code: Option<i32>) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn with_fail_code(mut self, fail_code: u64) -> Self {
        self.fail_code = fail_code;
        self
    }

    pub fn with_log(mut self, log_path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(log_path.into());
        self
    }

    fn describe(&self) -> String {
        let mut msg = match self.kind {
            FailureKind::ElfFailure => format!("{} ELF failure", self.tool),
            FailureKind::BadConfig => format!("{} bad configuration", self.tool),
            FailureKind::TohostFail => {
                format!("{} write to tohost failure: {:#x}", self.tool, self.fail_code)
            }
            FailureKind::MaxInstructionLimit => format!("{} max instruction limit", self.tool),
            FailureKind::IllegalInstructions => {
                format!("{} too many consecutive illegal instructions", self.tool)
            }
            FailureKind::Segfault => format!("{} segmentation fault", self.tool),
            FailureKind::NonzeroExit => match self.exit_code {
                Some(code) => format!("{} exited with code {}", self.tool, code),
                None => format!("{} terminated abnormally", self.tool),
            },
            FailureKind::Timeout => format!("{} timed out", self.tool),
            FailureKind::MissingOutput => format!("{} missing expected output", self.tool),
        };
        if let Some(log) = &self.log_path {
            msg.push_str(&format!(" (log: {})", log.display()));
        }
        let raw = self.raw_text.trim();
        if !raw.is_empty() {
            msg.push_str(": ");
            msg.push_str(raw);
        }
        msg
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Contradictory knobs; raised before anything is spawned.
    #[error("configuration conflict: {0}")]
    ConfigConflict(String),
    /// Memory constraints that cannot be satisfied.
    #[error("layout conflict: {0}")]
    LayoutConflict(String),
    #[error("template error: {0}")]
    Template(String),
    #[error(transparent)]
    Toolchain(#[from] ToolchainError),
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors caused by the inputs rather than the external tools.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            PipelineError::ConfigConflict(_)
                | PipelineError::LayoutConflict(_)
                | PipelineError::Template(_)
        )
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
