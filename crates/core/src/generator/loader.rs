// Rivet - RISC-V Directed Test Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::csr_operand;
use crate::plan::TestPlan;
use rivet_config::{DelegTarget, PrivMode};

const MSTATUS_MIE: u64 = 1 << 3;
/// MSIE, MTIE and MEIE.
const MACHINE_INTERRUPTS: u64 = 0x888;
/// SSIE, STIE and SEIE.
const SUPER_INTERRUPTS: u64 = 0x222;
/// R, W, X with NAPOT matching.
const PMP_ALL_ACCESS: u64 = 0x1f;
const VSATP: u16 = 0x280;
const VSTVEC: u16 = 0x205;
const VSSCRATCH: u16 = 0x240;
const HGATP: u16 = 0x680;
/// `hfence.gvma zero, zero`, emitted raw since the default march has no H.
const HFENCE_GVMA: u32 = 0x6200_0073;

fn write_csr(out: &mut String, csr: u16, value: u64) {
    out.push_str(&format!("\tli t0, {:#x}\n\tcsrw {}, t0\n", value, csr_operand(csr)));
}

/// Boot code: every hart enters at `_start` in machine mode.
pub(super) fn render(plan: &TestPlan) -> String {
    let mut out = String::new();
    out.push_str(".section .text, \"ax\"\n.global _start\n.option norvc\n\n_start:\n");
    for reg in 1..32 {
        out.push_str(&format!("\tli x{}, 0\n", reg));
    }
    out.push_str("\tla t0, eot__failed\n\tcsrw mtvec, t0\n");

    out.push_str("\tcsrr tp, mhartid\n\tli t0, NUM_HARTS\n");
    out.push_str("\tbgeu tp, t0, eot__halt\n");
    for hart in 0..plan.num_harts {
        out.push_str(&format!("\tli t0, {}\n\tbeq tp, t0, loader__hart{}\n", hart, hart));
    }
    out.push_str("\tj eot__halt\n\n");
    for hart in 0..plan.num_harts {
        out.push_str(&format!(
            "loader__hart{hart}:\n\tli sp, OS_STACK_{hart}_BASE + OS_STACK_{hart}_SIZE\n\tj loader__initialize_runtime\n\n"
        ));
    }

    out.push_str("loader__initialize_runtime:\n");
    if !plan.wysiwyg {
        trap_vectors(plan, &mut out);
        delegation(plan, &mut out);
    }
    if plan.setup_pmp || plan.priv_mode != PrivMode::Machine {
        out.push_str("loader__setup_pmp:\n\tli t0, -1\n\tcsrw pmpaddr0, t0\n");
        write_csr(&mut out, 0x3a0, PMP_ALL_ACCESS);
    }
    csr_init(plan, &mut out);
    if plan.interrupts_enabled {
        out.push_str("loader__enable_interrupts:\n");
        let mut mask = MACHINE_INTERRUPTS;
        if plan.deleg_target == DelegTarget::Super {
            mask |= SUPER_INTERRUPTS;
        }
        out.push_str(&format!("\tli t0, {:#x}\n\tcsrs mie, t0\n", mask));
        out.push_str(&format!("\tcsrsi mstatus, {:#x}\n", MSTATUS_MIE));
    }
    paging(plan, &mut out);

    out.push_str("\nloader__done:\n");
    if plan.wysiwyg {
        out.push_str("\tla t0, test_entry\n\tjr t0\n");
    } else {
        out.push_str("\tj scheduler__entry\n");
    }
    out
}

fn trap_vectors(plan: &TestPlan, out: &mut String) {
    out.push_str("loader__trap_vectors:\n");
    if plan.user_interrupt_table {
        out.push_str("\tla t0, user_interrupt_table\n\tori t0, t0, 1\n");
    } else if plan.interrupts_enabled {
        out.push_str("\tla t0, trap__machine_vector\n\tori t0, t0, 1\n");
    } else {
        out.push_str("\tla t0, trap__machine\n");
    }
    out.push_str("\tcsrw mtvec, t0\n");

    if plan.deleg_target == DelegTarget::Super {
        if plan.interrupts_enabled {
            out.push_str("\tla t0, trap__super_vector\n\tori t0, t0, 1\n");
        } else {
            out.push_str("\tla t0, trap__super\n");
        }
        out.push_str("\tcsrw stvec, t0\n\tcsrw sscratch, tp\n");
        if plan.is_virtualized() {
            out.push_str(&format!(
                "\tcsrw {}, t0\n\tcsrw {}, tp\n",
                csr_operand(VSTVEC),
                csr_operand(VSSCRATCH)
            ));
        }
    }
}

fn delegation(plan: &TestPlan, out: &mut String) {
    let deleg = &plan.delegation;
    out.push_str("loader__delegation:\n");
    write_csr(out, 0x302, deleg.medeleg);
    write_csr(out, 0x303, deleg.mideleg);
    let optional = [
        (0x602, deleg.hedeleg),
        (0x603, deleg.hideleg),
        (0x30a, deleg.menvcfg),
        (0x60a, deleg.henvcfg),
        (0x10a, deleg.senvcfg),
    ];
    for (csr, value) in optional {
        if let Some(value) = value {
            write_csr(out, csr, value);
        }
    }
}

fn csr_init(plan: &TestPlan, out: &mut String) {
    if plan.csr_init.is_empty() {
        return;
    }
    out.push_str("loader__csr_init:\n");
    for init in &plan.csr_init {
        let csr = csr_operand(init.address);
        match init.mask {
            None => write_csr(out, init.address, init.value),
            Some(mask) => out.push_str(&format!(
                "\tli t1, {:#x}\n\tcsrc {csr}, t1\n\tli t0, {:#x}\n\tcsrs {csr}, t0\n",
                mask,
                init.value & mask
            )),
        }
    }
}

fn paging(plan: &TestPlan, out: &mut String) {
    if plan.g_paging_enabled() {
        out.push_str("loader__enable_g_paging:\n");
        out.push_str(&format!(
            "\tli t0, HGATP_VALUE\n\tcsrw {}, t0\n\t.word {:#x}\n",
            csr_operand(HGATP),
            HFENCE_GVMA
        ));
    }
    if plan.paging_enabled() {
        out.push_str("loader__enable_paging:\n\tli t0, SATP_VALUE\n");
        if plan.is_virtualized() {
            out.push_str(&format!("\tcsrw {}, t0\n", csr_operand(VSATP)));
        } else {
            out.push_str("\tcsrw satp, t0\n");
        }
        out.push_str("\tsfence.vma\n");
    }
}
