// Rivet - RISC-V Directed Test Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! End-of-test protocol: exactly one hart writes the verdict to `tohost`.

use crate::plan::TestPlan;
use rivet_config::SchedulingMode;

pub(super) fn render(plan: &TestPlan) -> String {
    let mut out = String::from(".section .text, \"ax\"\n\n");
    out.push_str("eot__passed:\n\tli gp, 1\n\tj eot__end_test\n\n");
    out.push_str("eot__failed:\n\tli gp, 0\n\n");
    out.push_str("eot__end_test:\n");

    if plan.is_multi_hart() {
        if plan.scheduling == SchedulingMode::RoundRobin {
            // hand the token to the next hart
            out.push_str(
                "\tfence rw, rw\n\
                 \tla t0, scheduler__token\n\
                 \taddi t1, tp, 1\n\
                 \tsd t1, 0(t0)\n",
            );
        }
        out.push_str(
            "\tla t0, num_harts_ended\n\
             \tli t1, 1\n\
             \tamoadd.d t2, t1, (t0)\n\
             \tbeqz gp, eot__write_tohost\n\
             \tli t1, NUM_HARTS - 1\n\
             \tbne t2, t1, eot__halt\n\
             eot__write_tohost:\n\
             \tla t0, tohost_mutex\n\
             \tli t1, 1\n\
             \tamoswap.d.aq t2, t1, (t0)\n\
             \tbnez t2, eot__halt\n",
        );
    }

    out.push_str(
        "\tli t1, EOT_FAIL_VALUE\n\
         \tbeqz gp, 1f\n\
         \tli t1, EOT_PASS_VALUE\n\
         1:\n\
         \tfence iorw, iorw\n\
         \tla t0, tohost\n\
         \tsd t1, 0(t0)\n\n\
         eot__halt:\n\
         \twfi\n\
         \tj eot__halt\n\n",
    );

    out.push_str(
        ".section .io_htif, \"aw\"\n\
         .align 3\n\
         .global tohost\n\
         tohost: .dword 0\n\
         .global fromhost\n\
         fromhost: .dword 0\n",
    );
    out
}

/// Shared runtime variables in `.os_data` and primitives backing in `.shared`.
pub(super) fn render_data(plan: &TestPlan) -> String {
    let per_hart = u64::from(plan.num_harts) * 8;
    let mut out = String::from(".section .os_data, \"aw\"\n.align 3\n");
    for word in [
        "tohost_mutex",
        "num_harts_ended",
        "scheduler__barrier",
        "scheduler__token",
    ] {
        out.push_str(&format!("{}: .dword 0\n", word));
    }
    for array in ["repeat_counter", "check_excp_cause", "check_excp_pc"] {
        out.push_str(&format!("{}: .zero {}\n", array, per_hart));
    }

    out.push_str(
        "\n.section .shared, \"aw\"\n\
         .align 3\n\
         .global shared_semaphore\n\
         shared_semaphore: .dword 0\n\
         .global shared_lrsc_word\n\
         shared_lrsc_word: .dword 0\n",
    );

    for hart in 0..plan.num_harts {
        out.push_str(&format!(
            "\n.section .os_stack_{hart}, \"aw\"\n\t.zero OS_STACK_{hart}_SIZE\n"
        ));
    }
    out
}
