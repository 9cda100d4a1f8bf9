// Rivet - RISC-V Directed Test Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod classify;
pub mod equates;
pub mod error;
pub mod generator;
pub mod layout;
pub mod pipeline;
pub mod plan;
pub mod resolve;
pub mod scheduling;
pub mod simulator;
pub mod toolchain;

pub use classify::{classify, ExecutionOutcome};
pub use equates::EquateTable;
pub use error::{FailureKind, PipelineError, PipelineResult, ToolchainError};
pub use generator::{generate, GeneratedImage};
pub use layout::MemoryLayout;
pub use pipeline::{Pipeline, Prepared, RunReport, TestTemplate};
pub use plan::{Seed, TestPlan};
pub use resolve::{resolve, SeedSweep};
pub use simulator::{RawRunResult, SimLimits, Simulator};
pub use toolchain::{BuildArtifacts, Toolchain};
