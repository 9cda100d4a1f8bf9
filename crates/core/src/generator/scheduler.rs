// Rivet - RISC-V Directed Test Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::plan::{priv_encoding, TestPlan};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rivet_config::{PrivMode, SchedulingMode};

const MSTATUS_MPP_MASK: u64 = 0x1800;
const MSTATUS_MPP_SHIFT: u32 = 11;
const MSTATUS_MPV_BIT: u32 = 39;

/// Machine-mode CSRs that are safe to read at any point before dispatch.
const READABLE_CSRS: &[&str] = &[
    "mstatus", "misa", "mie", "mip", "mtvec", "mscratch", "mepc", "mcause", "mtval", "mhartid",
    "mvendorid", "marchid", "mimpid", "mcycle", "minstret",
];

/// Hart activation and the privilege drop into `test_entry`.
pub(super) fn render(plan: &TestPlan, rng: &mut StdRng) -> String {
    let mut out = String::from(".section .text, \"ax\"\n\nscheduler__entry:\n");

    if plan.is_multi_hart() {
        match plan.scheduling {
            SchedulingMode::Parallel => {
                for hart in 0..plan.num_harts {
                    out.push_str(&format!(
                        "\tli t0, {hart}\n\tbeq tp, t0, scheduler__hart{hart}\n"
                    ));
                }
                out.push_str("\tj eot__halt\n");
                for hart in 0..plan.num_harts {
                    out.push_str(&format!(
                        "scheduler__hart{hart}:\n\tj scheduler__dispatch\n"
                    ));
                }
            }
            SchedulingMode::Simultaneous => out.push_str(
                "\tla t0, scheduler__barrier\n\
                 \tli t1, 1\n\
                 \tamoadd.d zero, t1, (t0)\n\
                 \tli t2, NUM_HARTS\n\
                 scheduler__barrier_wait:\n\
                 \tld t1, 0(t0)\n\
                 \tbltu t1, t2, scheduler__barrier_wait\n\
                 \tfence r, rw\n",
            ),
            SchedulingMode::RoundRobin => out.push_str(
                "\tla t0, scheduler__token\n\
                 scheduler__wait_token:\n\
                 \tld t1, 0(t0)\n\
                 \tbne t1, tp, scheduler__wait_token\n\
                 \tfence r, rw\n",
            ),
        }
    }

    out.push_str("\nscheduler__dispatch:\n");
    let reads = rng.gen_range(0..=plan.max_random_csr_reads);
    for _ in 0..reads {
        let csr = READABLE_CSRS[rng.gen_range(0..READABLE_CSRS.len())];
        out.push_str(&format!("\tcsrr t0, {}\n", csr));
    }

    out.push_str("\tla t0, test_entry\n");
    if plan.priv_mode == PrivMode::Machine {
        out.push_str("\tjr t0\n");
        return out;
    }
    out.push_str(&format!(
        "\tcsrw mepc, t0\n\tli t0, {:#x}\n\tcsrc mstatus, t0\n",
        MSTATUS_MPP_MASK
    ));
    let mpp = priv_encoding(plan.priv_mode) << MSTATUS_MPP_SHIFT;
    if mpp != 0 {
        out.push_str(&format!("\tli t0, {:#x}\n\tcsrs mstatus, t0\n", mpp));
    }
    if plan.is_virtualized() {
        out.push_str(&format!(
            "\tli t0, 1\n\tslli t0, t0, {}\n\tcsrs mstatus, t0\n",
            MSTATUS_MPV_BIT
        ));
    }
    out.push_str("\tmret\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve;
    use rivet_config::{Choice, RawConfig, TestEnv};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_parallel_emits_entry_per_hart() {
        let mut cfg = RawConfig::default();
        cfg.mp.num_harts = 3;
        cfg.mp.mp_mode = Choice::Fixed(SchedulingMode::Parallel);
        let plan = resolve(&cfg, 0).unwrap();
        let asm = render(&plan, &mut rng());
        for hart in 0..3 {
            assert!(asm.contains(&format!("scheduler__hart{}:", hart)));
        }
    }

    #[test]
    fn test_simultaneous_emits_barrier() {
        let mut cfg = RawConfig::default();
        cfg.mp.num_harts = 2;
        cfg.mp.mp_mode = Choice::Fixed(SchedulingMode::Simultaneous);
        let plan = resolve(&cfg, 0).unwrap();
        let asm = render(&plan, &mut rng());
        assert!(asm.contains("scheduler__barrier_wait:"));
        assert!(!asm.contains("scheduler__hart0"));
    }

    #[test]
    fn test_single_hart_goes_straight_to_dispatch() {
        let mut cfg = RawConfig::default();
        cfg.mp.mp_mode = Choice::Fixed(SchedulingMode::RoundRobin);
        let plan = resolve(&cfg, 0).unwrap();
        let asm = render(&plan, &mut rng());
        assert!(!asm.contains("scheduler__wait_token"));
    }

    #[test]
    fn test_virtualized_sets_mpv() {
        let mut cfg = RawConfig::default();
        cfg.env.env = Choice::Fixed(TestEnv::Virtualized);
        cfg.env.priv_mode = Choice::Fixed(PrivMode::Super);
        let plan = resolve(&cfg, 0).unwrap();
        let asm = render(&plan, &mut rng());
        assert!(asm.contains("slli t0, t0, 39"));
        assert!(asm.contains("li t0, 0x800\n\tcsrs mstatus, t0"));
        assert!(asm.ends_with("\tmret\n"));
    }

    #[test]
    fn test_random_reads_are_bounded() {
        let mut cfg = RawConfig::default();
        cfg.generation.max_random_csr_reads = 2;
        let plan = resolve(&cfg, 0).unwrap();
        for seed in 0..8 {
            let asm = render(&plan, &mut StdRng::seed_from_u64(seed));
            assert!(asm.matches("\tcsrr t0, ").count() <= 2);
        }
    }
}
