// Rivet - RISC-V Directed Test Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Physical placement of every section the generated test needs.
//!
//! Sections are carved out of the plan's RAM regions page-aligned, in a
//! default or caller-specified order, with a seeded gap in front of each.
//! The resulting [`MemoryLayout`] is the single source of addresses for both
//! the linker script and the generated assembly.

use crate::equates::EquateTable;
use crate::error::{PipelineError, PipelineResult};
use crate::plan::{g_paging_levels, paging_levels, PagePolicy, Region, TestPlan};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

pub const PAGE_SIZE: u64 = 0x1000;
pub const MEGAPAGE_SIZE: u64 = 0x20_0000;

const MAX_GAP_PAGES: u64 = 16;
const RUNTIME_TEXT_SIZE: u64 = 0x8000;
const CODE_SIZE: u64 = 0x4_0000;
const DATA_SIZE: u64 = 0x1_0000;
const SHARED_SIZE: u64 = 0x1000;
const STACK_SIZE: u64 = 0x4000;
const HTIF_SIZE: u64 = 0x1000;
/// G-stage root tables span four pages and must be 16 KiB aligned.
const G_ROOT_PAGES: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Runtime,
    Code,
    Data,
    OsData,
    Shared,
    Stack,
    PageTables,
    GPageTables,
    User,
    Htif,
}

impl SectionKind {
    /// Sections that hold test or runtime state and follow the secure window.
    fn follows_secure_mode(&self) -> bool {
        matches!(
            self,
            SectionKind::Runtime
                | SectionKind::Code
                | SectionKind::Data
                | SectionKind::OsData
                | SectionKind::Shared
                | SectionKind::Stack
                | SectionKind::User
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sharing {
    /// Visible to every hart.
    Shared,
    /// Owned by one hart.
    PerHart(u32),
    /// Caller section that no two harts are expected to touch.
    Exclusive,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Allocation {
    pub name: String,
    pub kind: SectionKind,
    pub region: String,
    pub base: u64,
    pub size: u64,
    /// Leaf page size used when the section is mapped.
    pub page_size: u64,
    pub sharing: Sharing,
}

impl Allocation {
    pub fn last(&self) -> u64 {
        self.base.saturating_add(self.size.saturating_sub(1))
    }

    pub fn overlaps(&self, base: u64, size: u64) -> bool {
        let last = base.saturating_add(size.saturating_sub(1));
        self.base <= last && base <= self.last()
    }

    /// Upper-case stem used for equates, e.g. `OS_STACK_0`.
    pub fn symbol(&self) -> String {
        self.name.to_ascii_uppercase()
    }
}

/// RAM withheld from allocation by the partial-memory knob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ReservedRange {
    pub region: String,
    pub base: u64,
    pub size: u64,
}

impl ReservedRange {
    fn last(&self) -> u64 {
        self.base.saturating_add(self.size.saturating_sub(1))
    }

    fn overlaps(&self, base: u64, size: u64) -> bool {
        let last = base.saturating_add(size.saturating_sub(1));
        self.base <= last && base <= self.last()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryLayout {
    /// In placement order.
    pub allocations: Vec<Allocation>,
    pub reserved: Vec<ReservedRange>,
    pub regions: Vec<Region>,
}

impl MemoryLayout {
    pub fn get(&self, name: &str) -> Option<&Allocation> {
        self.allocations.iter().find(|a| a.name == name)
    }

    pub fn require(&self, name: &str) -> PipelineResult<&Allocation> {
        self.get(name).ok_or_else(|| {
            PipelineError::LayoutConflict(format!("layout has no '{}' section", name))
        })
    }

    pub fn tohost_base(&self) -> Option<u64> {
        self.get("io_htif").map(|a| a.base)
    }

    pub fn stack(&self, hart: u32) -> Option<&Allocation> {
        self.allocations
            .iter()
            .find(|a| a.kind == SectionKind::Stack && a.sharing == Sharing::PerHart(hart))
    }

    /// `<NAME>_BASE` and `<NAME>_SIZE` per allocation, in allocation order.
    pub fn address_equates(&self) -> EquateTable {
        let mut table = EquateTable::new();
        for alloc in &self.allocations {
            let symbol = alloc.symbol();
            table.insert_hex(format!("{}_BASE", symbol), alloc.base);
            table.insert_hex(format!("{}_SIZE", symbol), alloc.size);
        }
        table
    }

    pub fn linker_script(&self) -> String {
        let mut out = String::from("OUTPUT_ARCH( \"riscv\" )\nENTRY(_start)\n\nSECTIONS\n{\n");
        for alloc in &self.allocations {
            out.push_str(&format!(
                "\t. = {:#x};\n\t.{name} : {{ *(.{name}) }}\n\n",
                alloc.base,
                name = alloc.name
            ));
        }
        out.push_str("}\n");
        out
    }
}

#[derive(Debug, Clone)]
struct Request {
    name: String,
    kind: SectionKind,
    size: u64,
    page_size: u64,
    align: u64,
    sharing: Sharing,
    pinned: Option<u64>,
}

fn align_up(value: u64, align: u64) -> Option<u64> {
    let mask = align - 1;
    value.checked_add(mask).map(|v| v & !mask)
}

fn page_size_for(policy: PagePolicy, size: u64) -> u64 {
    match policy {
        PagePolicy::Mixed if size >= MEGAPAGE_SIZE => MEGAPAGE_SIZE,
        _ => PAGE_SIZE,
    }
}

impl Request {
    fn new(
        policy: PagePolicy,
        name: impl Into<String>,
        kind: SectionKind,
        size: u64,
        sharing: Sharing,
    ) -> PipelineResult<Self> {
        let name = name.into();
        let page_size = page_size_for(policy, size);
        let size = align_up(size, page_size).ok_or_else(|| {
            PipelineError::LayoutConflict(format!("section '{}' size {:#x} overflows", name, size))
        })?;
        Ok(Self {
            name,
            kind,
            size,
            page_size,
            align: page_size,
            sharing,
            pinned: None,
        })
    }
}

/// Upper bound on page-table pages for an identity map of `requests`.
fn table_pages(levels: u32, root_pages: u64, requests: &[Request]) -> u64 {
    let mut pages = root_pages;
    for request in requests {
        let leaf_level = if request.page_size == MEGAPAGE_SIZE { 1 } else { 0 };
        for level in leaf_level..levels.saturating_sub(1) {
            let span = PAGE_SIZE << (9 * (level + 1));
            pages += request.size / span + 2;
        }
    }
    pages
}

fn os_data_size(num_harts: u32) -> u64 {
    // four shared words plus three per-hart arrays
    let bytes = 4 * 8 + 3 * 8 * u64::from(num_harts);
    align_up(bytes, PAGE_SIZE).unwrap_or(PAGE_SIZE)
}

fn build_requests(plan: &TestPlan) -> PipelineResult<Vec<Request>> {
    let policy = plan.page_policy;
    let mut requests = vec![
        Request::new(policy, "text", SectionKind::Runtime, RUNTIME_TEXT_SIZE, Sharing::Shared)?,
        Request::new(policy, "code", SectionKind::Code, CODE_SIZE, Sharing::Shared)?,
        Request::new(policy, "data", SectionKind::Data, DATA_SIZE, Sharing::Shared)?,
        Request::new(
            policy,
            "os_data",
            SectionKind::OsData,
            os_data_size(plan.num_harts),
            Sharing::Shared,
        )?,
        Request::new(policy, "shared", SectionKind::Shared, SHARED_SIZE, Sharing::Shared)?,
    ];
    for hart in 0..plan.num_harts {
        requests.push(Request::new(
            policy,
            format!("os_stack_{}", hart),
            SectionKind::Stack,
            STACK_SIZE,
            Sharing::PerHart(hart),
        )?);
    }

    let mut trailing = Vec::new();
    for section in &plan.extra_sections {
        trailing.push(Request::new(
            policy,
            section.name.clone(),
            SectionKind::User,
            section.size,
            if section.shared {
                Sharing::Shared
            } else {
                Sharing::Exclusive
            },
        )?);
    }
    let mut htif = Request::new(policy, "io_htif", SectionKind::Htif, HTIF_SIZE, Sharing::Shared)?;
    htif.pinned = plan.tohost;
    trailing.push(htif);

    let mut mapped: Vec<Request> = requests.iter().chain(trailing.iter()).cloned().collect();
    if plan.paging_enabled() {
        let pages = table_pages(paging_levels(plan.paging_mode), 1, &mapped);
        let tables = Request::new(
            PagePolicy::All4k,
            "pagetables",
            SectionKind::PageTables,
            pages * PAGE_SIZE,
            Sharing::Shared,
        )?;
        mapped.push(tables.clone());
        requests.push(tables);
    }
    if plan.g_paging_enabled() {
        let pages = table_pages(g_paging_levels(plan.g_paging_mode), G_ROOT_PAGES, &mapped);
        let mut tables = Request::new(
            PagePolicy::All4k,
            "g_pagetables",
            SectionKind::GPageTables,
            pages * PAGE_SIZE,
            Sharing::Shared,
        )?;
        tables.align = G_ROOT_PAGES * PAGE_SIZE;
        requests.push(tables);
    }
    requests.extend(trailing);

    if plan.section_order.is_empty() {
        return Ok(requests);
    }
    let mut ordered = Vec::with_capacity(requests.len());
    for name in &plan.section_order {
        let position = requests
            .iter()
            .position(|r| &r.name == name)
            .ok_or_else(|| {
                PipelineError::LayoutConflict(format!(
                    "section_order names unknown section '{}'",
                    name
                ))
            })?;
        ordered.push(requests.remove(position));
    }
    ordered.extend(requests);
    Ok(ordered)
}

fn check_secure_windows(plan: &TestPlan) -> PipelineResult<()> {
    if !plan.secure {
        return Ok(());
    }
    for ram in plan.ram.iter().filter(|r| r.secure) {
        for io in plan.io.iter().filter(|r| !r.secure) {
            if ram.intersects(io) {
                return Err(PipelineError::LayoutConflict(format!(
                    "secure region '{}' [{:#x}..={:#x}] intersects non-secure IO window '{}' [{:#x}..={:#x}]",
                    ram.name,
                    ram.base,
                    ram.last(),
                    io.name,
                    io.base,
                    io.last()
                )));
            }
        }
    }
    Ok(())
}

fn withheld_ranges(plan: &TestPlan) -> Vec<ReservedRange> {
    if !plan.reserve_partial_memory {
        return Vec::new();
    }
    plan.ram
        .iter()
        .filter_map(|region| {
            let size = (region.size / 4) & !(PAGE_SIZE - 1);
            if size == 0 {
                return None;
            }
            Some(ReservedRange {
                region: region.name.clone(),
                base: region.last() - (size - 1),
                size,
            })
        })
        .collect()
}

/// RAM regions in preference order for a section kind.
fn candidate_regions(plan: &TestPlan, kind: SectionKind) -> Vec<usize> {
    let secure_only = plan.secure && kind.follows_secure_mode();
    let (secure, plain): (Vec<usize>, Vec<usize>) =
        (0..plan.ram.len()).partition(|&i| plan.ram[i].secure);
    if secure_only {
        secure
    } else {
        plain.into_iter().chain(secure).collect()
    }
}

fn collides(base: u64, size: u64, placed: &[Allocation], reserved: &[ReservedRange]) -> Option<u64> {
    placed
        .iter()
        .filter(|a| a.overlaps(base, size))
        .map(|a| a.last())
        .chain(
            reserved
                .iter()
                .filter(|r| r.overlaps(base, size))
                .map(|r| r.last()),
        )
        .max()
}

fn fit(
    region: &Region,
    cursor: u64,
    gap: u64,
    request: &Request,
    placed: &[Allocation],
    reserved: &[ReservedRange],
) -> Option<u64> {
    let mut candidate = align_up(cursor.checked_add(gap)?, request.align)?;
    loop {
        if !region.contains_range(candidate, request.size) {
            return None;
        }
        match collides(candidate, request.size, placed, reserved) {
            None => return Some(candidate),
            Some(last) => candidate = align_up(last.checked_add(1)?, request.align)?,
        }
    }
}

fn place_pinned(
    plan: &TestPlan,
    request: &Request,
    address: u64,
    placed: &[Allocation],
    reserved: &[ReservedRange],
) -> PipelineResult<Allocation> {
    let region = plan
        .regions()
        .find(|r| r.contains_range(address, request.size))
        .ok_or_else(|| {
            PipelineError::LayoutConflict(format!(
                "section '{}' pinned at {:#x} does not fit inside any declared RAM or IO region",
                request.name, address
            ))
        })?;
    if collides(address, request.size, placed, reserved).is_some() {
        return Err(PipelineError::LayoutConflict(format!(
            "section '{}' pinned at {:#x} overlaps another allocation or reserved memory",
            request.name, address
        )));
    }
    Ok(Allocation {
        name: request.name.clone(),
        kind: request.kind,
        region: region.name.clone(),
        base: address,
        size: request.size,
        page_size: PAGE_SIZE,
        sharing: request.sharing,
    })
}

/// Assigns a physical range to every section the plan needs.
pub fn plan(plan: &TestPlan) -> PipelineResult<MemoryLayout> {
    check_secure_windows(plan)?;
    let reserved = withheld_ranges(plan);
    let requests = build_requests(plan)?;
    let mut rng = StdRng::seed_from_u64(plan.layout_seed);

    let mut placed: Vec<Allocation> = Vec::with_capacity(requests.len());
    for request in &requests {
        if let Some(address) = request.pinned {
            let alloc = place_pinned(plan, request, address, &placed, &reserved)?;
            placed.push(alloc);
        }
    }

    let mut cursors: Vec<u64> = plan.ram.iter().map(|r| r.base).collect();
    for request in requests.iter().filter(|r| r.pinned.is_none()) {
        let gap = rng.gen_range(0..=MAX_GAP_PAGES) * PAGE_SIZE;
        let mut chosen = None;
        for idx in candidate_regions(plan, request.kind) {
            let region = &plan.ram[idx];
            if let Some(base) = fit(region, cursors[idx], gap, request, &placed, &reserved) {
                chosen = Some((idx, base));
                break;
            }
        }
        let (idx, base) = chosen.ok_or_else(|| {
            PipelineError::LayoutConflict(format!(
                "no room for section '{}' ({:#x} bytes){}",
                request.name,
                request.size,
                if plan.secure && request.kind.follows_secure_mode() {
                    " in secure RAM"
                } else {
                    ""
                }
            ))
        })?;
        cursors[idx] = base.saturating_add(request.size);
        debug!(
            "Placed .{} at {:#x} ({:#x} bytes) in {}",
            request.name, base, request.size, plan.ram[idx].name
        );
        placed.push(Allocation {
            name: request.name.clone(),
            kind: request.kind,
            region: plan.ram[idx].name.clone(),
            base,
            size: request.size,
            page_size: request.page_size,
            sharing: request.sharing,
        });
    }

    info!(
        "Memory layout: {} sections, {} reserved ranges",
        placed.len(),
        reserved.len()
    );
    Ok(MemoryLayout {
        allocations: placed,
        reserved,
        regions: plan.regions().cloned().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::RegionKind;
    use crate::resolve::resolve;
    use rivet_config::{
        Choice, IntValue, PagingMode, PrivMode, RawConfig, RegionConfig, SecureMode, SizeValue,
    };

    fn plan_for(cfg: &RawConfig, seed: u64) -> TestPlan {
        resolve(cfg, seed).unwrap()
    }

    fn small_ram_config() -> RawConfig {
        let mut cfg = RawConfig::default();
        cfg.memory.ram = vec![RegionConfig {
            name: "dram0".into(),
            address: IntValue(0x8000_0000),
            size: SizeValue(0x40_0000),
            secure: false,
        }];
        cfg
    }

    fn assert_disjoint(layout: &MemoryLayout) {
        for (i, a) in layout.allocations.iter().enumerate() {
            for b in &layout.allocations[i + 1..] {
                assert!(!a.overlaps(b.base, b.size), "{} overlaps {}", a.name, b.name);
            }
            for r in &layout.reserved {
                assert!(!r.overlaps(a.base, a.size), "{} overlaps reserved", a.name);
            }
        }
    }

    #[test]
    fn test_default_layout_is_page_aligned_and_disjoint() {
        let cfg = RawConfig::default();
        for seed in 0..16 {
            let layout = plan(&plan_for(&cfg, seed)).unwrap();
            assert_disjoint(&layout);
            for alloc in &layout.allocations {
                assert_eq!(alloc.base % PAGE_SIZE, 0, "{}", alloc.name);
                assert_eq!(alloc.size % alloc.page_size, 0, "{}", alloc.name);
            }
        }
    }

    #[test]
    fn test_same_seed_same_layout() {
        let cfg = RawConfig::default();
        let a = plan(&plan_for(&cfg, 9)).unwrap();
        let b = plan(&plan_for(&cfg, 9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_one_stack_per_hart_is_private() {
        let mut cfg = RawConfig::default();
        cfg.mp.num_harts = 3;
        let layout = plan(&plan_for(&cfg, 1)).unwrap();
        for hart in 0..3 {
            let stack = layout.stack(hart).unwrap();
            assert_eq!(stack.sharing, Sharing::PerHart(hart));
        }
        assert!(layout.stack(3).is_none());
        assert_eq!(layout.get("shared").unwrap().sharing, Sharing::Shared);
        assert_eq!(layout.get("os_data").unwrap().sharing, Sharing::Shared);
    }

    #[test]
    fn test_page_tables_only_with_paging() {
        let mut cfg = RawConfig::default();
        cfg.env.priv_mode = Choice::Fixed(PrivMode::Super);
        cfg.env.paging_mode = Choice::Fixed(PagingMode::Disable);
        let layout = plan(&plan_for(&cfg, 0)).unwrap();
        assert!(layout.get("pagetables").is_none());

        cfg.env.paging_mode = Choice::Fixed(PagingMode::Sv39);
        let layout = plan(&plan_for(&cfg, 0)).unwrap();
        let tables = layout.get("pagetables").unwrap();
        assert!(tables.size >= 3 * PAGE_SIZE);
    }

    #[test]
    fn test_mixed_policy_uses_megapages_for_large_sections() {
        let mut cfg = RawConfig::default();
        cfg.generation.sections = vec![rivet_config::SectionRequest {
            name: "bigbuf".into(),
            size: SizeValue(0x30_0000),
            shared: true,
        }];
        let layout = plan(&plan_for(&cfg, 2)).unwrap();
        let big = layout.get("bigbuf").unwrap();
        assert_eq!(big.page_size, MEGAPAGE_SIZE);
        assert_eq!(big.base % MEGAPAGE_SIZE, 0);
        assert_eq!(big.size, 0x40_0000);

        cfg.generation.all_4kb_pages = true;
        let layout = plan(&plan_for(&cfg, 2)).unwrap();
        let big = layout.get("bigbuf").unwrap();
        assert_eq!(big.page_size, PAGE_SIZE);
        assert_eq!(big.size, 0x30_0000);
    }

    #[test]
    fn test_reserve_partial_memory_withholds_top_quarter() {
        let mut cfg = small_ram_config();
        cfg.generation.reserve_partial_phys_memory = true;
        let layout = plan(&plan_for(&cfg, 4)).unwrap();
        assert_eq!(layout.reserved.len(), 1);
        assert_eq!(layout.reserved[0].base, 0x8030_0000);
        assert_eq!(layout.reserved[0].size, 0x10_0000);
        assert_disjoint(&layout);
        for alloc in &layout.allocations {
            assert!(alloc.last() < 0x8030_0000, "{}", alloc.name);
        }
    }

    #[test]
    fn test_exhausted_region_is_layout_conflict() {
        let mut cfg = small_ram_config();
        cfg.memory.ram[0].size = SizeValue(0x2_0000);
        let err = plan(&plan_for(&cfg, 0)).unwrap_err();
        assert!(matches!(err, PipelineError::LayoutConflict(_)));
    }

    #[test]
    fn test_pinned_tohost_lands_in_io() {
        let mut cfg = RawConfig::default();
        cfg.eot.tohost = Some(IntValue(0x7000_0000));
        let layout = plan(&plan_for(&cfg, 0)).unwrap();
        let htif = layout.get("io_htif").unwrap();
        assert_eq!(htif.base, 0x7000_0000);
        assert_eq!(htif.region, "io0");
        assert_eq!(layout.tohost_base(), Some(0x7000_0000));
    }

    #[test]
    fn test_pinned_tohost_at_top_page() {
        let mut cfg = RawConfig::default();
        cfg.memory.io.push(RegionConfig {
            name: "io_top".into(),
            address: IntValue(0xffff_ffff_ffff_0000),
            size: SizeValue(0x1_0000),
            secure: false,
        });
        cfg.eot.tohost = Some(IntValue(0xffff_ffff_ffff_f000));
        let layout = plan(&plan_for(&cfg, 0)).unwrap();
        let htif = layout.get("io_htif").unwrap();
        assert_eq!(htif.last(), u64::MAX);
        assert_disjoint(&layout);
    }

    #[test]
    fn test_pinned_tohost_outside_regions_conflicts() {
        let mut cfg = small_ram_config();
        cfg.memory.io.clear();
        cfg.eot.tohost = Some(IntValue(0x1000));
        let err = plan(&plan_for(&cfg, 0)).unwrap_err();
        assert!(err.to_string().contains("does not fit"));
    }

    #[test]
    fn test_secure_sections_use_secure_ram() {
        let mut cfg = small_ram_config();
        cfg.memory.ram.push(RegionConfig {
            name: "secure_dram".into(),
            address: IntValue(0x1_0000_0000),
            size: SizeValue(0x1000_0000),
            secure: false,
        });
        cfg.env.secure_mode = Choice::Fixed(SecureMode::On);
        let layout = plan(&plan_for(&cfg, 3)).unwrap();
        for name in ["text", "code", "data", "os_stack_0"] {
            assert_eq!(layout.get(name).unwrap().region, "secure_dram", "{}", name);
        }
        assert_eq!(layout.get("io_htif").unwrap().region, "dram0");
    }

    #[test]
    fn test_secure_region_touching_plain_io_conflicts() {
        let mut cfg = RawConfig::default();
        cfg.memory.ram.push(RegionConfig {
            name: "secure_dram".into(),
            address: IntValue(0x4000_0000),
            size: SizeValue(0x1000_0000),
            secure: true,
        });
        cfg.env.secure_mode = Choice::Fixed(SecureMode::On);
        let err = plan(&plan_for(&cfg, 0)).unwrap_err();
        assert!(matches!(err, PipelineError::LayoutConflict(_)));
        assert!(err.to_string().contains("io0"));
    }

    #[test]
    fn test_section_order_is_honored() {
        let mut cfg = RawConfig::default();
        cfg.generation.section_order = vec!["data".into(), "code".into()];
        let layout = plan(&plan_for(&cfg, 0)).unwrap();
        assert_eq!(layout.allocations[0].name, "data");
        assert_eq!(layout.allocations[1].name, "code");

        cfg.generation.section_order = vec!["nope".into()];
        assert!(plan(&plan_for(&cfg, 0)).is_err());
    }

    #[test]
    fn test_linker_script_lines() {
        let layout = plan(&plan_for(&RawConfig::default(), 0)).unwrap();
        let script = layout.linker_script();
        assert!(script.starts_with("OUTPUT_ARCH( \"riscv\" )\nENTRY(_start)"));
        let boundaries: Vec<_> = script
            .lines()
            .filter(|l| l.trim_start().starts_with(". = "))
            .collect();
        assert_eq!(boundaries.len(), layout.allocations.len());
        for (line, alloc) in boundaries.iter().zip(&layout.allocations) {
            assert_eq!(line.trim(), format!(". = {:#x};", alloc.base));
            assert!(layout
                .regions
                .iter()
                .any(|r| r.contains_range(alloc.base, alloc.size)));
        }
        assert!(layout.regions.iter().any(|r| r.kind == RegionKind::Io));
    }

    #[test]
    fn test_address_equates_follow_allocation_order() {
        let layout = plan(&plan_for(&RawConfig::default(), 5)).unwrap();
        let table = layout.address_equates();
        let first = table.iter().next().unwrap();
        assert_eq!(first.name, format!("{}_BASE", layout.allocations[0].symbol()));
        assert_eq!(table.get("CODE_BASE"), Some(layout.get("code").unwrap().base));
        assert_eq!(table.len(), layout.allocations.len() * 2);
    }
}
