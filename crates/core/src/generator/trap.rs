// Rivet - RISC-V Directed Test Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::plan::TestPlan;
use rivet_config::DelegTarget;

/// Entries in the vectored interrupt table.
const VECTOR_ENTRIES: u32 = 16;

#[derive(Clone, Copy)]
struct Level {
    name: &'static str,
    prefix: char,
    ret: &'static str,
}

const MACHINE: Level = Level {
    name: "machine",
    prefix: 'm',
    ret: "mret",
};

const SUPER: Level = Level {
    name: "super",
    prefix: 's',
    ret: "sret",
};

/// Handlers for every privilege level exceptions are routed to.
///
/// An environment call with `gp == 1` ends one pass of the test body; any
/// other exception or interrupt fails the test.
pub(super) fn render(plan: &TestPlan) -> String {
    let mut out = String::from(".section .text, \"ax\"\n");
    let mut levels = vec![MACHINE];
    if plan.deleg_target == DelegTarget::Super {
        levels.push(SUPER);
    }
    for level in levels {
        if plan.interrupts_enabled {
            vector_table(level, &mut out);
        }
        handler(plan, level, &mut out);
    }
    out
}

fn vector_table(level: Level, out: &mut String) {
    out.push_str(&format!("\n.align 6\ntrap__{}_vector:\n", level.name));
    for _ in 0..VECTOR_ENTRIES {
        out.push_str(&format!("\tj trap__{}\n", level.name));
    }
}

fn handler(plan: &TestPlan, level: Level, out: &mut String) {
    let name = level.name;
    let p = level.prefix;
    out.push_str(&format!("\n.align 2\ntrap__{name}:\n"));
    // hart index lives in tp; restore it in case the test body clobbered it
    if p == 'm' {
        out.push_str("\tcsrr tp, mhartid\n");
    } else {
        out.push_str("\tcsrr tp, sscratch\n");
    }
    out.push_str(&format!(
        "\tcsrr t0, {p}cause\n\
         \tbltz t0, trap__{name}_fail\n\
         \tli t1, ECAUSE_ECALL_U\n\
         \tbltu t0, t1, trap__{name}_fail\n\
         \tli t1, ECAUSE_ECALL_M\n\
         \tbgtu t0, t1, trap__{name}_fail\n\
         \tli t1, 1\n\
         \tbne gp, t1, trap__{name}_fail\n"
    ));

    if plan.repeat_times > 1 {
        out.push_str(&format!(
            "\tla t0, repeat_counter\n\
             \tslli t1, tp, 3\n\
             \tadd t0, t0, t1\n\
             \tld t1, 0(t0)\n\
             \taddi t1, t1, 1\n\
             \tsd t1, 0(t0)\n\
             \tli t2, REPEAT_TIMES\n\
             \tbgeu t1, t2, trap__{name}_done\n\
             \tla t0, test_entry\n\
             \tcsrw {p}epc, t0\n\
             \t{ret}\n",
            ret = level.ret
        ));
    }

    out.push_str(&format!(
        "trap__{name}_done:\n\
         \tla t0, eot__passed\n\
         \tjr t0\n\
         trap__{name}_fail:\n\
         \tslli t1, tp, 3\n\
         \tla t0, check_excp_cause\n\
         \tadd t0, t0, t1\n\
         \tcsrr t2, {p}cause\n\
         \tsd t2, 0(t0)\n\
         \tla t0, check_excp_pc\n\
         \tadd t0, t0, t1\n\
         \tcsrr t2, {p}epc\n\
         \tsd t2, 0(t0)\n\
         \tla t0, eot__failed\n\
         \tjr t0\n"
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve;
    use rivet_config::{Choice, PrivMode, RawConfig};

    #[test]
    fn test_machine_only_handler() {
        let mut cfg = RawConfig::default();
        cfg.env.priv_mode = Choice::Fixed(PrivMode::Machine);
        let plan = resolve(&cfg, 0).unwrap();
        let asm = render(&plan);
        assert!(asm.contains("trap__machine:"));
        assert!(!asm.contains("trap__super:"));
        assert!(!asm.contains("repeat_counter"));
        assert!(!asm.contains("_vector:"));
    }

    #[test]
    fn test_super_handler_and_repeat() {
        let mut cfg = RawConfig::default();
        cfg.env.priv_mode = Choice::Fixed(PrivMode::Super);
        cfg.env.deleg_excp_to = Choice::Fixed(DelegTarget::Super);
        cfg.generation.repeat_times = 3;
        cfg.generation.interrupts_enabled = true;
        let plan = resolve(&cfg, 0).unwrap();
        let asm = render(&plan);
        assert!(asm.contains("trap__super:\n\tcsrr tp, sscratch"));
        assert!(asm.contains("csrw sepc, t0\n\tsret"));
        assert!(asm.contains("trap__super_vector:"));
        assert_eq!(asm.matches("\tj trap__machine\n").count(), VECTOR_ENTRIES as usize);
    }
}
