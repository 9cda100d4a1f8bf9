// Rivet - RISC-V Directed Test Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Identity-mapped translation tables for first-stage and G-stage paging.

use crate::error::{PipelineError, PipelineResult};
use crate::layout::{Allocation, MemoryLayout, SectionKind, MEGAPAGE_SIZE, PAGE_SIZE};
use crate::plan::{g_paging_levels, hgatp_mode, paging_levels, satp_mode, TestPlan};
use bitflags::bitflags;
use rivet_config::PrivMode;
use std::collections::BTreeMap;
use tracing::debug;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PteFlags: u64 {
        const V = 1 << 0;
        const R = 1 << 1;
        const W = 1 << 2;
        const X = 1 << 3;
        const U = 1 << 4;
        const G = 1 << 5;
        const A = 1 << 6;
        const D = 1 << 7;
    }
}

const PTE_PPN_SHIFT: u32 = 10;
const ENTRY_BYTES: u64 = 8;
const INDEX_BITS: u32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    First,
    /// Root table is four pages wide with two extra index bits.
    Guest,
}

/// Allocates table pages out of one layout section and records entries.
struct TableBuilder {
    section: &'static str,
    stage: Stage,
    levels: u32,
    base: u64,
    last: u64,
    next: u64,
    entries: BTreeMap<u64, u64>,
}

fn leaf(pte: u64) -> bool {
    pte & (PteFlags::R | PteFlags::W | PteFlags::X).bits() != 0
}

fn pointer(pte: u64) -> u64 {
    (pte >> PTE_PPN_SHIFT) << 12
}

impl TableBuilder {
    fn new(section: &'static str, stage: Stage, levels: u32, alloc: &Allocation) -> Self {
        let root_pages = match stage {
            Stage::First => 1,
            Stage::Guest => 4,
        };
        Self {
            section,
            stage,
            levels,
            base: alloc.base,
            last: alloc.last(),
            next: alloc.base.saturating_add(root_pages * PAGE_SIZE),
            entries: BTreeMap::new(),
        }
    }

    fn root(&self) -> u64 {
        self.base
    }

    fn address_bits(&self) -> u32 {
        let bits = 12 + INDEX_BITS * self.levels;
        match self.stage {
            Stage::First => bits - 1,
            Stage::Guest => bits + 2,
        }
    }

    fn index(&self, va: u64, level: u32) -> u64 {
        let mask = if self.stage == Stage::Guest && level == self.levels - 1 {
            0x7ff
        } else {
            0x1ff
        };
        (va >> (12 + INDEX_BITS * level)) & mask
    }

    fn new_table(&mut self) -> PipelineResult<u64> {
        let fits = self
            .next
            .checked_add(PAGE_SIZE - 1)
            .is_some_and(|end| end <= self.last);
        if !fits {
            return Err(PipelineError::LayoutConflict(format!(
                "page-table section '{}' ran out of space",
                self.section
            )));
        }
        let table = self.next;
        self.next = self.next.saturating_add(PAGE_SIZE);
        Ok(table)
    }

    fn map(&mut self, address: u64, leaf_level: u32, flags: PteFlags) -> PipelineResult<()> {
        if address >> self.address_bits() != 0 {
            return Err(PipelineError::LayoutConflict(format!(
                "address {:#x} cannot be identity-mapped with {} levels",
                address, self.levels
            )));
        }
        let mut table = self.root();
        let mut level = self.levels - 1;
        while level > leaf_level {
            let slot = table + self.index(address, level) * ENTRY_BYTES;
            table = match self.entries.get(&slot).copied() {
                Some(pte) if leaf(pte) => {
                    return Err(PipelineError::LayoutConflict(format!(
                        "mapping {:#x} collides with a superpage in '{}'",
                        address, self.section
                    )))
                }
                Some(pte) => pointer(pte),
                None => {
                    let child = self.new_table()?;
                    self.entries
                        .insert(slot, ((child >> 12) << PTE_PPN_SHIFT) | PteFlags::V.bits());
                    child
                }
            };
            level -= 1;
        }
        let slot = table + self.index(address, level) * ENTRY_BYTES;
        let pte = ((address >> 12) << PTE_PPN_SHIFT)
            | (flags | PteFlags::V | PteFlags::A | PteFlags::D).bits();
        self.entries.insert(slot, pte);
        Ok(())
    }

    fn map_allocation(&mut self, alloc: &Allocation, flags: PteFlags) -> PipelineResult<()> {
        let (step, leaf_level) = if alloc.page_size == MEGAPAGE_SIZE {
            (MEGAPAGE_SIZE, 1)
        } else {
            (PAGE_SIZE, 0)
        };
        if alloc.size == 0 {
            return Ok(());
        }
        let last = alloc.last();
        let mut address = alloc.base;
        loop {
            self.map(address, leaf_level, flags)?;
            match address.checked_add(step) {
                Some(next) if next <= last => address = next,
                _ => return Ok(()),
            }
        }
    }

    fn render(&self, out: &mut String) {
        out.push_str(&format!(".section .{}, \"aw\"\n", self.section));
        out.push_str(&format!("{}__root:\n", self.section));
        for (slot, pte) in &self.entries {
            out.push_str(&format!(
                "\t.org {:#x}\n\t.dword {:#x}\n",
                slot - self.base,
                pte
            ));
        }
        out.push_str(&format!("\t.org {:#x}\n", self.next - self.base));
    }
}

fn first_stage_flags(kind: SectionKind, priv_mode: PrivMode) -> PteFlags {
    let user = if priv_mode == PrivMode::User {
        PteFlags::U
    } else {
        PteFlags::empty()
    };
    match kind {
        SectionKind::Runtime => PteFlags::R | PteFlags::X,
        SectionKind::Code => PteFlags::R | PteFlags::W | PteFlags::X | user,
        SectionKind::Data | SectionKind::Shared | SectionKind::Stack | SectionKind::User => {
            PteFlags::R | PteFlags::W | user
        }
        SectionKind::OsData
        | SectionKind::PageTables
        | SectionKind::GPageTables
        | SectionKind::Htif => PteFlags::R | PteFlags::W,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageTables {
    pub satp: Option<u64>,
    pub hgatp: Option<u64>,
    pub asm: String,
}

/// Builds identity maps for every allocation the plan's paging modes need.
pub fn build(plan: &TestPlan, layout: &MemoryLayout) -> PipelineResult<PageTables> {
    let mut tables = PageTables::default();

    if plan.paging_enabled() {
        let alloc = layout.require("pagetables")?;
        let mut builder = TableBuilder::new(
            "pagetables",
            Stage::First,
            paging_levels(plan.paging_mode),
            alloc,
        );
        for mapped in layout
            .allocations
            .iter()
            .filter(|a| a.kind != SectionKind::GPageTables)
        {
            builder.map_allocation(mapped, first_stage_flags(mapped.kind, plan.priv_mode))?;
        }
        debug!(
            "First-stage tables: {} entries, {} pages",
            builder.entries.len(),
            (builder.next - builder.base) / PAGE_SIZE
        );
        tables.satp = Some((satp_mode(plan.paging_mode) << 60) | (builder.root() >> 12));
        builder.render(&mut tables.asm);
    }

    if plan.g_paging_enabled() {
        let alloc = layout.require("g_pagetables")?;
        let mut builder = TableBuilder::new(
            "g_pagetables",
            Stage::Guest,
            g_paging_levels(plan.g_paging_mode),
            alloc,
        );
        let flags = PteFlags::R | PteFlags::W | PteFlags::X | PteFlags::U;
        for mapped in layout
            .allocations
            .iter()
            .filter(|a| a.kind != SectionKind::GPageTables)
        {
            builder.map_allocation(mapped, flags)?;
        }
        tables.hgatp = Some((hgatp_mode(plan.g_paging_mode) << 60) | (builder.root() >> 12));
        builder.render(&mut tables.asm);
    }

    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{self, Sharing};
    use crate::resolve::resolve;
    use rivet_config::{Choice, IntValue, PagingMode, RawConfig, RegionConfig, SizeValue};

    fn alloc(name: &str, kind: SectionKind, base: u64, size: u64, page_size: u64) -> Allocation {
        Allocation {
            name: name.into(),
            kind,
            region: "dram0".into(),
            base,
            size,
            page_size,
            sharing: Sharing::Shared,
        }
    }

    #[test]
    fn test_sv39_identity_walk() {
        let tables = alloc("pagetables", SectionKind::PageTables, 0x8010_0000, 0x10_000, PAGE_SIZE);
        let mut builder = TableBuilder::new("pagetables", Stage::First, 3, &tables);
        builder.map(0x8000_0000, 0, PteFlags::R | PteFlags::X).unwrap();

        // root[2] -> level1 table, level1[0] -> level0 table, level0[0] -> leaf
        let root_slot = 0x8010_0000 + 2 * 8;
        let l1 = pointer(builder.entries[&root_slot]);
        assert_eq!(l1, 0x8010_1000);
        let l0 = pointer(builder.entries[&l1]);
        assert_eq!(l0, 0x8010_2000);
        let pte = builder.entries[&l0];
        assert_eq!(pointer(pte), 0x8000_0000);
        assert_eq!(pte & 0xff, (PteFlags::V | PteFlags::R | PteFlags::X | PteFlags::A | PteFlags::D).bits());
    }

    #[test]
    fn test_megapage_leaf_at_level_one() {
        let tables = alloc("pagetables", SectionKind::PageTables, 0x8010_0000, 0x10_000, PAGE_SIZE);
        let mut builder = TableBuilder::new("pagetables", Stage::First, 3, &tables);
        let big = alloc("buf", SectionKind::User, 0x8040_0000, 0x40_0000, MEGAPAGE_SIZE);
        builder.map_allocation(&big, PteFlags::R | PteFlags::W).unwrap();
        // one pointer in the root plus two megapage leaves
        assert_eq!(builder.entries.len(), 3);
        assert_eq!(builder.next, 0x8010_2000);
    }

    #[test]
    fn test_out_of_range_address_is_rejected() {
        let tables = alloc("pagetables", SectionKind::PageTables, 0x8010_0000, 0x10_000, PAGE_SIZE);
        let mut builder = TableBuilder::new("pagetables", Stage::First, 3, &tables);
        let err = builder.map(1 << 40, 0, PteFlags::R).unwrap_err();
        assert!(matches!(err, PipelineError::LayoutConflict(_)));
    }

    #[test]
    fn test_top_of_address_space_is_layout_conflict() {
        let tables = alloc("pagetables", SectionKind::PageTables, 0x8010_0000, 0x10_000, PAGE_SIZE);
        let mut builder = TableBuilder::new("pagetables", Stage::First, 5, &tables);
        let htif = alloc("io_htif", SectionKind::Htif, 0xffff_ffff_ffff_f000, 0x1000, PAGE_SIZE);
        let err = builder.map_allocation(&htif, PteFlags::R | PteFlags::W).unwrap_err();
        assert!(matches!(err, PipelineError::LayoutConflict(_)));
    }

    #[test]
    fn test_htif_pinned_at_top_page_cannot_be_mapped() {
        let mut cfg = RawConfig::default();
        cfg.env.priv_mode = Choice::Fixed(PrivMode::Super);
        cfg.env.paging_mode = Choice::Fixed(PagingMode::Sv39);
        cfg.memory.io.push(RegionConfig {
            name: "io_top".into(),
            address: IntValue(0xffff_ffff_ffff_0000),
            size: SizeValue(0x1_0000),
            secure: false,
        });
        cfg.eot.tohost = Some(IntValue(0xffff_ffff_ffff_f000));
        let plan = resolve(&cfg, 3).unwrap();
        let layout = layout::plan(&plan).unwrap();
        let err = build(&plan, &layout).unwrap_err();
        assert!(matches!(err, PipelineError::LayoutConflict(_)));
    }

    #[test]
    fn test_table_section_at_top_page_runs_out_cleanly() {
        let tables = alloc("pagetables", SectionKind::PageTables, 0xffff_ffff_ffff_f000, 0x1000, PAGE_SIZE);
        let mut builder = TableBuilder::new("pagetables", Stage::First, 3, &tables);
        let err = builder.new_table().unwrap_err();
        assert!(err.to_string().contains("ran out of space"));
    }

    #[test]
    fn test_guest_root_uses_wide_index() {
        let tables = alloc("g_pagetables", SectionKind::GPageTables, 0x8020_0000, 0x10_000, PAGE_SIZE);
        let mut builder = TableBuilder::new("g_pagetables", Stage::Guest, 3, &tables);
        // Sv39x4 accepts 41-bit guest addresses
        builder.map(1 << 40, 0, PteFlags::R | PteFlags::U).unwrap();
        let root_slot = 0x8020_0000 + (1u64 << 10) * 8;
        assert!(builder.entries.contains_key(&root_slot));
        assert_eq!(builder.next, 0x8020_4000 + 2 * PAGE_SIZE);
    }

    #[test]
    fn test_table_exhaustion_is_layout_conflict() {
        let tables = alloc("pagetables", SectionKind::PageTables, 0x8010_0000, 0x2000, PAGE_SIZE);
        let mut builder = TableBuilder::new("pagetables", Stage::First, 3, &tables);
        let err = builder.map(0x8000_0000, 0, PteFlags::R).unwrap_err();
        assert!(err.to_string().contains("ran out of space"));
    }

    #[test]
    fn test_render_orders_entries() {
        let tables = alloc("pagetables", SectionKind::PageTables, 0x8010_0000, 0x10_000, PAGE_SIZE);
        let mut builder = TableBuilder::new("pagetables", Stage::First, 3, &tables);
        builder.map(0x8000_1000, 0, PteFlags::R).unwrap();
        builder.map(0x8000_0000, 0, PteFlags::R).unwrap();
        let mut asm = String::new();
        builder.render(&mut asm);
        assert!(asm.starts_with(".section .pagetables, \"aw\"\n"));
        let orgs: Vec<u64> = asm
            .lines()
            .filter_map(|l| l.trim().strip_prefix(".org 0x"))
            .map(|v| u64::from_str_radix(v, 16).unwrap())
            .collect();
        assert!(orgs.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*orgs.last().unwrap(), 0x3000);
    }
}
