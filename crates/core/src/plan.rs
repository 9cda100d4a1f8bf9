// Rivet - RISC-V Directed Test Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Fully resolved test configuration.

use rivet_config::{
    CsrInit, DelegTarget, GPagingMode, PagingMode, PrivMode, SchedulingMode, TestEnv,
};
use serde::Serialize;

pub type Seed = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Ram,
    Io,
}

/// A declared physical memory window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Region {
    pub name: String,
    pub kind: RegionKind,
    pub base: u64,
    pub size: u64,
    pub secure: bool,
}

impl Region {
    /// Inclusive last address. Sizes are validated non-zero and in range.
    pub fn last(&self) -> u64 {
        self.base.saturating_add(self.size.saturating_sub(1))
    }

    pub fn contains_range(&self, start: u64, size: u64) -> bool {
        match size.checked_sub(1).and_then(|span| start.checked_add(span)) {
            Some(last) => start >= self.base && last <= self.last(),
            None => false,
        }
    }

    pub fn intersects(&self, other: &Region) -> bool {
        self.base <= other.last() && other.base <= self.last()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PagePolicy {
    /// Large allocations use 2 MiB megapages.
    Mixed,
    All4k,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    MultiFile,
    SingleFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EotValues {
    pub pass: u64,
    pub fail: u64,
}

/// Values written to the delegation and environment CSRs by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Delegation {
    pub medeleg: u64,
    pub mideleg: u64,
    pub hedeleg: Option<u64>,
    pub hideleg: Option<u64>,
    pub menvcfg: Option<u64>,
    pub henvcfg: Option<u64>,
    pub senvcfg: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SectionSpec {
    pub name: String,
    pub size: u64,
    pub shared: bool,
}

/// Every axis holds exactly one concrete value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestPlan {
    pub seed: Seed,
    pub test_name: String,
    pub priv_mode: PrivMode,
    pub deleg_target: DelegTarget,
    pub env: TestEnv,
    pub paging_mode: PagingMode,
    pub g_paging_mode: GPagingMode,
    pub secure: bool,
    pub num_harts: u32,
    pub scheduling: SchedulingMode,
    pub csr_init: Vec<CsrInit>,
    pub delegation: Delegation,
    pub eot: EotValues,
    pub tohost: Option<u64>,
    pub ram: Vec<Region>,
    pub io: Vec<Region>,
    pub page_policy: PagePolicy,
    pub render_mode: RenderMode,
    pub wysiwyg: bool,
    pub reserve_partial_memory: bool,
    pub interrupts_enabled: bool,
    pub user_interrupt_table: bool,
    pub setup_pmp: bool,
    pub repeat_times: u32,
    pub max_random_csr_reads: u32,
    pub section_order: Vec<String>,
    pub extra_sections: Vec<SectionSpec>,
    /// Caller defines, applied over the generated equates.
    pub equate_defines: Vec<(String, u64)>,
    pub layout_seed: u64,
    pub generator_seed: u64,
}

impl TestPlan {
    pub fn is_multi_hart(&self) -> bool {
        self.num_harts > 1
    }

    pub fn is_virtualized(&self) -> bool {
        self.env == TestEnv::Virtualized
    }

    pub fn paging_enabled(&self) -> bool {
        self.paging_mode != PagingMode::Disable
    }

    pub fn g_paging_enabled(&self) -> bool {
        self.is_virtualized() && self.g_paging_mode != GPagingMode::Disable
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.ram.iter().chain(self.io.iter())
    }
}

/// Encodings used in the equates summary and in CSR values.
pub fn priv_encoding(mode: PrivMode) -> u64 {
    match mode {
        PrivMode::Machine => 3,
        PrivMode::Super => 1,
        PrivMode::User => 0,
    }
}

pub fn satp_mode(mode: PagingMode) -> u64 {
    match mode {
        PagingMode::Disable => 0,
        PagingMode::Sv39 => 8,
        PagingMode::Sv48 => 9,
        PagingMode::Sv57 => 10,
    }
}

pub fn hgatp_mode(mode: GPagingMode) -> u64 {
    match mode {
        GPagingMode::Disable => 0,
        GPagingMode::Sv39x4 => 8,
        GPagingMode::Sv48x4 => 9,
        GPagingMode::Sv57x4 => 10,
    }
}

pub fn paging_levels(mode: PagingMode) -> u32 {
    match mode {
        PagingMode::Disable => 0,
        PagingMode::Sv39 => 3,
        PagingMode::Sv48 => 4,
        PagingMode::Sv57 => 5,
    }
}

pub fn g_paging_levels(mode: GPagingMode) -> u32 {
    match mode {
        GPagingMode::Disable => 0,
        GPagingMode::Sv39x4 => 3,
        GPagingMode::Sv48x4 => 4,
        GPagingMode::Sv57x4 => 5,
    }
}

pub fn scheduling_encoding(mode: SchedulingMode) -> u64 {
    match mode {
        SchedulingMode::Parallel => 0,
        SchedulingMode::Simultaneous => 1,
        SchedulingMode::RoundRobin => 2,
    }
}
