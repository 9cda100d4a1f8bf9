// Rivet - RISC-V Directed Test Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Renders a resolved plan and its layout into assembly sources.
//!
//! The runtime is split into modules (macros, loader, trap handler,
//! scheduler, end-of-test, page tables). In multi-file mode each module and
//! the equates land in their own include file; in single-file mode they are
//! inlined into the test source and nothing is included.

mod eot;
mod loader;
pub mod pagetables;
mod scheduler;
mod trap;

use crate::equates::EquateTable;
use crate::error::{PipelineError, PipelineResult};
use crate::layout::MemoryLayout;
use crate::plan::{
    hgatp_mode, priv_encoding, satp_mode, scheduling_encoding, RenderMode, TestPlan,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rivet_config::{csr_name, DelegTarget, TestEnv};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// The assembly source handed to the compiler.
    Source,
    /// Pulled in by `.include`.
    Include,
    LinkerScript,
    /// Persisted equate table that the source does not include.
    Equates,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedFile {
    pub name: String,
    pub kind: ArtifactKind,
    pub contents: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub test_name: String,
    pub render_mode: RenderMode,
    pub files: Vec<GeneratedFile>,
    pub equates: EquateTable,
}

impl GeneratedImage {
    fn find(&self, kind: ArtifactKind) -> Option<&GeneratedFile> {
        self.files.iter().find(|f| f.kind == kind)
    }

    pub fn source(&self) -> Option<&GeneratedFile> {
        self.find(ArtifactKind::Source)
    }

    pub fn linker_script(&self) -> Option<&GeneratedFile> {
        self.find(ArtifactKind::LinkerScript)
    }

    /// The persisted equates: an include in multi-file mode, a plain
    /// artifact otherwise.
    pub fn equates_file(&self) -> Option<&GeneratedFile> {
        let name = self.equates_name();
        self.files.iter().find(|f| f.name == name)
    }

    fn equates_name(&self) -> String {
        match self.render_mode {
            RenderMode::MultiFile => format!("{}_equates.inc", self.test_name),
            RenderMode::SingleFile => format!("{}_equates.txt", self.test_name),
        }
    }

    pub fn include_files(&self) -> impl Iterator<Item = &GeneratedFile> {
        self.files.iter().filter(|f| f.kind == ArtifactKind::Include)
    }

    /// Writes every file into `dir`, returning the paths in file order.
    pub fn write_to(&self, dir: &Path) -> PipelineResult<Vec<PathBuf>> {
        std::fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;
        let mut paths = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let path = dir.join(&file.name);
            std::fs::write(&path, &file.contents).map_err(|e| PipelineError::io(&path, e))?;
            paths.push(path);
        }
        debug!("Wrote {} generated files to {:?}", paths.len(), dir);
        Ok(paths)
    }
}

/// Operand text for a CSR instruction. Hypervisor and VS CSRs are written
/// numerically so the default march does not need the H extension.
pub(crate) fn csr_operand(address: u16) -> String {
    let hypervisor = (0x200..=0x2ff).contains(&address) || (0x600..=0x6ff).contains(&address);
    match csr_name(address) {
        Some(name) if !hypervisor => name.to_string(),
        _ => format!("{:#x}", address),
    }
}

/// Exception cause codes published as equates.
const EXCEPTION_CAUSES: &[(&str, u64)] = &[
    ("ECAUSE_INSTR_ADDR_MISALIGNED", 0),
    ("ECAUSE_INSTR_ACCESS_FAULT", 1),
    ("ECAUSE_ILLEGAL_INSTRUCTION", 2),
    ("ECAUSE_BREAKPOINT", 3),
    ("ECAUSE_LOAD_ADDR_MISALIGNED", 4),
    ("ECAUSE_LOAD_ACCESS_FAULT", 5),
    ("ECAUSE_STORE_ADDR_MISALIGNED", 6),
    ("ECAUSE_STORE_ACCESS_FAULT", 7),
    ("ECAUSE_ECALL_U", 8),
    ("ECAUSE_ECALL_S", 9),
    ("ECAUSE_ECALL_VS", 10),
    ("ECAUSE_ECALL_M", 11),
    ("ECAUSE_INSTR_PAGE_FAULT", 12),
    ("ECAUSE_LOAD_PAGE_FAULT", 13),
    ("ECAUSE_STORE_PAGE_FAULT", 15),
    ("ECAUSE_INSTR_GUEST_PAGE_FAULT", 20),
    ("ECAUSE_LOAD_GUEST_PAGE_FAULT", 21),
    ("ECAUSE_VIRTUAL_INSTRUCTION", 22),
    ("ECAUSE_STORE_GUEST_PAGE_FAULT", 23),
];

fn build_equates(
    plan: &TestPlan,
    layout: &MemoryLayout,
    tables: &pagetables::PageTables,
) -> EquateTable {
    let mut equates = EquateTable::new();
    equates.insert_dec("PRIV_MODE", priv_encoding(plan.priv_mode));
    equates.insert_dec("PAGING_MODE", satp_mode(plan.paging_mode));
    equates.insert_dec("PAGING_G_MODE", hgatp_mode(plan.g_paging_mode));
    equates.insert_dec("ENV", u64::from(plan.env == TestEnv::Virtualized));
    equates.insert_dec("SECURE_MODE", u64::from(plan.secure));
    equates.insert_dec("NUM_HARTS", u64::from(plan.num_harts));
    equates.insert_dec("MP_MODE", scheduling_encoding(plan.scheduling));
    equates.insert_dec("MP_ACTIVE", u64::from(plan.is_multi_hart()));
    equates.insert_dec(
        "OS_DELEG_EXCP_TO_SUPER",
        u64::from(plan.deleg_target == DelegTarget::Super),
    );
    equates.insert_dec(
        "OS_DELEG_EXCP_TO_MACHINE",
        u64::from(plan.deleg_target == DelegTarget::Machine),
    );
    equates.insert_dec("REPEAT_TIMES", u64::from(plan.repeat_times));
    equates.insert_dec("XLEN", 64);
    for (name, cause) in EXCEPTION_CAUSES {
        equates.insert_dec(*name, *cause);
    }
    equates.insert_hex("EOT_PASS_VALUE", plan.eot.pass);
    equates.insert_hex("EOT_FAIL_VALUE", plan.eot.fail);
    if let Some(satp) = tables.satp {
        equates.insert_hex("SATP_VALUE", satp);
    }
    if let Some(hgatp) = tables.hgatp {
        equates.insert_hex("HGATP_VALUE", hgatp);
    }
    equates.extend(&layout.address_equates());
    equates.apply_overrides(&plan.equate_defines);
    equates
}

fn macros(plan: &TestPlan) -> String {
    if plan.wysiwyg {
        return ".macro end_test_pass\n\tla t0, eot__passed\n\tjr t0\n.endm\n\n\
                .macro end_test_fail\n\tla t0, eot__failed\n\tjr t0\n.endm\n"
            .to_string();
    }
    ".macro end_test_pass\n\tli gp, 1\n\tecall\n.endm\n\n\
     .macro end_test_fail\n\tli gp, 0\n\tecall\n.endm\n"
        .to_string()
}

fn test_body(template: &str) -> String {
    let mut out = String::from(".section .code, \"ax\"\n.global test_entry\n.align 2\ntest_entry:\n");
    out.push_str(template);
    if !template.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("\n.section .code, \"ax\"\ntest__fall_through:\n\tend_test_pass\n");
    out
}

/// Renders `plan` against `layout`; every address comes from the layout.
pub fn generate(
    plan: &TestPlan,
    layout: &MemoryLayout,
    template: &str,
) -> PipelineResult<GeneratedImage> {
    if !plan.wysiwyg && !template.contains(".section .code") {
        return Err(PipelineError::Template(format!(
            "template for '{}' has no `.section .code` directive",
            plan.test_name
        )));
    }

    let tables = pagetables::build(plan, layout)?;
    let equates = build_equates(plan, layout, &tables);
    let mut rng = StdRng::seed_from_u64(plan.generator_seed);

    let mut modules: Vec<(&str, String)> = vec![("macros", macros(plan))];
    modules.push(("loader", loader::render(plan)));
    if !plan.wysiwyg {
        modules.push(("trap_handler", trap::render(plan)));
        modules.push(("scheduler", scheduler::render(plan, &mut rng)));
    }
    let mut eot = eot::render(plan);
    eot.push('\n');
    eot.push_str(&eot::render_data(plan));
    modules.push(("eot", eot));
    if !tables.asm.is_empty() {
        modules.push(("pagetables", tables.asm.clone()));
    }

    let name = &plan.test_name;
    let mut files = Vec::with_capacity(modules.len() + 3);
    let mut source = format!("# {} (seed {})\n\n", name, plan.seed);
    match plan.render_mode {
        RenderMode::MultiFile => {
            let equates_file = format!("{}_equates.inc", name);
            source.push_str(&format!(".include \"{}\"\n", equates_file));
            files.push(GeneratedFile {
                name: equates_file,
                kind: ArtifactKind::Include,
                contents: equates.render(),
            });
            for (module, contents) in modules {
                let include = format!("{}_{}.inc", name, module);
                source.push_str(&format!(".include \"{}\"\n", include));
                files.push(GeneratedFile {
                    name: include,
                    kind: ArtifactKind::Include,
                    contents,
                });
            }
            source.push('\n');
        }
        RenderMode::SingleFile => {
            source.push_str("## equates ##\n");
            source.push_str(&equates.render());
            for (module, contents) in modules {
                source.push_str(&format!("\n## {} ##\n", module));
                source.push_str(&contents);
            }
            source.push_str("\n## test ##\n");
            files.push(GeneratedFile {
                name: format!("{}_equates.txt", name),
                kind: ArtifactKind::Equates,
                contents: equates.render(),
            });
        }
    }
    source.push_str(&test_body(template));

    files.push(GeneratedFile {
        name: format!("{}.s", name),
        kind: ArtifactKind::Source,
        contents: source,
    });
    files.push(GeneratedFile {
        name: format!("{}.ld", name),
        kind: ArtifactKind::LinkerScript,
        contents: layout.linker_script(),
    });

    info!(
        "Generated {} ({} files, {} equates, {:?})",
        name,
        files.len(),
        equates.len(),
        plan.render_mode
    );
    Ok(GeneratedImage {
        test_name: name.clone(),
        render_mode: plan.render_mode,
        files,
        equates,
    })
}
