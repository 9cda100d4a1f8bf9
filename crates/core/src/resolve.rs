// Rivet - RISC-V Directed Test Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Turns a [`RawConfig`] and a seed into a contradiction-free [`TestPlan`].
//!
//! Every axis consumes exactly one draw from the seeded stream, in a fixed
//! order, whether the caller pinned it or not. Pinning one knob therefore
//! never shifts the random value another axis sees.

use crate::error::{PipelineError, PipelineResult};
use crate::plan::{
    Delegation, EotValues, PagePolicy, Region, RegionKind, RenderMode, SectionSpec, Seed,
    TestPlan,
};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rivet_config::{
    is_identifier, parse_define, Choice, CsrInit, DelegTarget, GPagingMode, PagingMode, PrivMode, RawConfig,
    RegionConfig, SchedulingMode, SecureMode, TestEnv,
};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Percentage of random draws that enable secure mode.
const SECURE_PERCENT: u64 = 20;

/// Section names owned by the runtime; caller sections may not reuse them.
pub const RESERVED_SECTIONS: &[&str] = &[
    "text",
    "code",
    "data",
    "os_data",
    "shared",
    "pagetables",
    "g_pagetables",
    "io_htif",
];

struct AxisDraws {
    secure: u64,
    priv_mode: u64,
    env: u64,
    paging: u64,
    g_paging: u64,
    deleg: u64,
    scheduling: u64,
    layout: u64,
    generator: u64,
}

impl AxisDraws {
    fn new(seed: Seed) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let secure = rng.next_u64();
        let priv_mode = rng.next_u64();
        let env = rng.next_u64();
        let paging = rng.next_u64();
        let g_paging = rng.next_u64();
        let deleg = rng.next_u64();
        let scheduling = rng.next_u64();
        let layout = rng.next_u64();
        let generator = rng.next_u64();
        Self {
            secure,
            priv_mode,
            env,
            paging,
            g_paging,
            deleg,
            scheduling,
            layout,
            generator,
        }
    }
}

fn choose<T: Copy + PartialEq + fmt::Display>(
    axis: &str,
    choice: &Choice<T>,
    allowed: &[T],
    draw: u64,
) -> PipelineResult<T> {
    match choice {
        Choice::Fixed(value) if allowed.contains(value) => Ok(*value),
        Choice::Fixed(value) => Err(PipelineError::ConfigConflict(format!(
            "{}={} conflicts with the other knobs (allowed: {})",
            axis,
            value,
            join(allowed)
        ))),
        Choice::Random if allowed.is_empty() => Err(PipelineError::ConfigConflict(format!(
            "no value of {} satisfies the other knobs",
            axis
        ))),
        Choice::Random => Ok(allowed[(draw % allowed.len() as u64) as usize]),
    }
}

fn join<T: fmt::Display>(values: &[T]) -> String {
    if values.is_empty() {
        return "none".to_string();
    }
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn regions(configs: &[RegionConfig], kind: RegionKind) -> PipelineResult<Vec<Region>> {
    configs
        .iter()
        .map(|cfg| {
            if cfg.size.get() == 0 || cfg.last_address().is_none() {
                return Err(PipelineError::ConfigConflict(format!(
                    "memory region '{}' must have a non-zero size within the 64-bit address space",
                    cfg.name
                )));
            }
            Ok(Region {
                name: cfg.name.clone(),
                kind,
                base: cfg.address.get(),
                size: cfg.size.get(),
                secure: cfg.is_secure(),
            })
        })
        .collect()
}

fn conflict(err: impl fmt::Display) -> PipelineError {
    PipelineError::ConfigConflict(err.to_string())
}

fn test_name(raw: &RawConfig) -> String {
    if let Some(name) = raw.inputs.name.as_deref().filter(|n| !n.trim().is_empty()) {
        return name.trim().to_string();
    }
    raw.inputs
        .template
        .as_deref()
        .and_then(|t| Path::new(t).file_stem())
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| "test".to_string())
}

/// Pure function of its inputs: identical config and seed give identical plans.
pub fn resolve(raw: &RawConfig, seed: Seed) -> PipelineResult<TestPlan> {
    let draws = AxisDraws::new(seed);
    let knobs = &raw.env;
    let generation = &raw.generation;

    if raw.mp.num_harts == 0 {
        return Err(conflict("num_harts must be at least 1"));
    }
    if generation.repeat_times == 0 {
        return Err(conflict("repeat_times must be at least 1"));
    }
    if generation.wysiwyg && generation.repeat_times > 1 {
        return Err(conflict(
            "repeat_times > 1 needs the trap handler, which wysiwyg mode omits",
        ));
    }

    let ram = regions(&raw.memory.ram, RegionKind::Ram)?;
    let io = regions(&raw.memory.io, RegionKind::Io)?;
    if ram.is_empty() {
        return Err(conflict("at least one RAM region is required"));
    }
    let has_secure_ram = ram.iter().any(|r| r.secure);

    let secure = match knobs.secure_mode {
        Choice::Fixed(SecureMode::On) if !has_secure_ram => {
            return Err(conflict(
                "secure_mode=on requires a RAM region marked secure",
            ))
        }
        Choice::Fixed(mode) => mode == SecureMode::On,
        Choice::Random => has_secure_ram && draws.secure % 100 < SECURE_PERCENT,
    };

    let g_paging_pinned_on = matches!(knobs.paging_g_mode, Choice::Fixed(m) if m != GPagingMode::Disable);
    let paging_pinned_on = matches!(knobs.paging_mode, Choice::Fixed(m) if m != PagingMode::Disable);

    let priv_allowed: Vec<PrivMode> = PrivMode::ALL
        .iter()
        .copied()
        .filter(|mode| match mode {
            PrivMode::Machine => {
                knobs.env != Choice::Fixed(TestEnv::Virtualized)
                    && knobs.deleg_excp_to != Choice::Fixed(DelegTarget::Super)
                    && !g_paging_pinned_on
                    && (knobs.enable_machine_paging || !paging_pinned_on)
            }
            _ => !generation.wysiwyg,
        })
        .collect();
    let priv_mode = choose("priv_mode", &knobs.priv_mode, &priv_allowed, draws.priv_mode)?;

    let env_allowed: Vec<TestEnv> = TestEnv::ALL
        .iter()
        .copied()
        .filter(|env| match env {
            TestEnv::BareMetal => !g_paging_pinned_on,
            TestEnv::Virtualized => {
                priv_mode != PrivMode::Machine
                    && knobs.deleg_excp_to != Choice::Fixed(DelegTarget::Machine)
            }
        })
        .collect();
    let env = choose("env", &knobs.env, &env_allowed, draws.env)?;

    let paging_allowed: Vec<PagingMode> =
        if priv_mode == PrivMode::Machine && !knobs.enable_machine_paging {
            vec![PagingMode::Disable]
        } else {
            PagingMode::ALL.to_vec()
        };
    let paging_mode = choose("paging_mode", &knobs.paging_mode, &paging_allowed, draws.paging)?;

    let g_paging_allowed: Vec<GPagingMode> = if env == TestEnv::Virtualized {
        GPagingMode::ALL.to_vec()
    } else {
        vec![GPagingMode::Disable]
    };
    let g_paging_mode = choose(
        "paging_g_mode",
        &knobs.paging_g_mode,
        &g_paging_allowed,
        draws.g_paging,
    )?;

    let deleg_allowed: Vec<DelegTarget> = if priv_mode == PrivMode::Machine {
        vec![DelegTarget::Machine]
    } else if env == TestEnv::Virtualized {
        vec![DelegTarget::Super]
    } else {
        DelegTarget::ALL.to_vec()
    };
    let deleg_target = choose(
        "deleg_excp_to",
        &knobs.deleg_excp_to,
        &deleg_allowed,
        draws.deleg,
    )?;

    // wysiwyg drops the scheduler, so every hart enters the test at once
    let scheduling_allowed: &[SchedulingMode] = if generation.wysiwyg && raw.mp.num_harts > 1 {
        &[SchedulingMode::Parallel]
    } else {
        SchedulingMode::ALL
    };
    let scheduling = choose(
        "mp_mode",
        &raw.mp.mp_mode,
        scheduling_allowed,
        draws.scheduling,
    )?;

    let csr_init = raw
        .csr
        .init
        .iter()
        .map(|entry| CsrInit::parse(entry))
        .chain(raw.csr.init_mask.iter().map(|entry| CsrInit::parse_masked(entry)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| conflict(format!("{:#}", e)))?;

    let equate_defines = raw
        .test_equates
        .iter()
        .map(|define| parse_define(define))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| conflict(format!("{:#}", e)))?;

    let mut extra_sections = Vec::with_capacity(generation.sections.len());
    for request in &generation.sections {
        if !is_identifier(&request.name) {
            return Err(conflict(format!(
                "section name '{}' must be a valid assembler identifier",
                request.name
            )));
        }
        if RESERVED_SECTIONS.contains(&request.name.as_str())
            || request.name.starts_with("os_stack_")
        {
            return Err(conflict(format!(
                "section name '{}' is reserved for the runtime",
                request.name
            )));
        }
        if extra_sections
            .iter()
            .any(|s: &SectionSpec| s.name == request.name)
        {
            return Err(conflict(format!("section '{}' declared twice", request.name)));
        }
        if request.size.get() == 0 {
            return Err(conflict(format!("section '{}' has zero size", request.name)));
        }
        extra_sections.push(SectionSpec {
            name: request.name.clone(),
            size: request.size.get(),
            shared: request.shared,
        });
    }

    let tohost = raw.eot.tohost.map(|v| v.get());
    if let Some(addr) = tohost {
        if addr % 8 != 0 {
            return Err(conflict(format!(
                "tohost address {:#x} must be 8-byte aligned",
                addr
            )));
        }
    }

    let delegation = Delegation {
        medeleg: raw.csr.medeleg.map(|v| v.get()).unwrap_or(match deleg_target {
            DelegTarget::Super => u64::MAX,
            DelegTarget::Machine => 0,
        }),
        mideleg: raw.csr.mideleg.map(|v| v.get()).unwrap_or(match deleg_target {
            // SEI, STI and SSI
            DelegTarget::Super => (1 << 9) | (1 << 5) | (1 << 1),
            DelegTarget::Machine => 0,
        }),
        hedeleg: raw.csr.hedeleg.map(|v| v.get()),
        hideleg: raw.csr.hideleg.map(|v| v.get()),
        menvcfg: raw.csr.menvcfg.map(|v| v.get()),
        henvcfg: raw.csr.henvcfg.map(|v| v.get()),
        senvcfg: raw.csr.senvcfg.map(|v| v.get()),
    };

    let plan = TestPlan {
        seed,
        test_name: test_name(raw),
        priv_mode,
        deleg_target,
        env,
        paging_mode,
        g_paging_mode,
        secure,
        num_harts: raw.mp.num_harts,
        scheduling,
        csr_init,
        delegation,
        eot: EotValues {
            pass: raw.eot.pass_value.get(),
            fail: raw.eot.fail_value.get(),
        },
        tohost,
        ram,
        io,
        page_policy: if generation.all_4kb_pages {
            PagePolicy::All4k
        } else {
            PagePolicy::Mixed
        },
        render_mode: if generation.single_assembly_file || generation.wysiwyg {
            RenderMode::SingleFile
        } else {
            RenderMode::MultiFile
        },
        wysiwyg: generation.wysiwyg,
        reserve_partial_memory: generation.reserve_partial_phys_memory,
        interrupts_enabled: generation.interrupts_enabled,
        user_interrupt_table: generation.user_interrupt_table,
        setup_pmp: generation.setup_pmp || secure,
        repeat_times: generation.repeat_times,
        max_random_csr_reads: if generation.no_random_csr_reads {
            0
        } else {
            generation.max_random_csr_reads
        },
        section_order: generation.section_order.clone(),
        extra_sections,
        equate_defines,
        layout_seed: draws.layout,
        generator_seed: draws.generator,
    };

    debug!(
        seed,
        priv_mode = %plan.priv_mode,
        env = %plan.env,
        paging = %plan.paging_mode,
        deleg = %plan.deleg_target,
        secure = plan.secure,
        harts = plan.num_harts,
        "Resolved test plan"
    );
    Ok(plan)
}

/// Lazy, restartable sequence of `(seed, plan)` pairs for `count`
/// consecutive seeds from `start`. Seeds wrap at `u64::MAX`.
#[derive(Debug, Clone)]
pub struct SeedSweep<'a> {
    config: &'a RawConfig,
    start: Seed,
    count: u64,
    done: u64,
}

impl<'a> SeedSweep<'a> {
    pub fn new(config: &'a RawConfig, start: Seed, count: u64) -> Self {
        Self {
            config,
            start,
            count,
            done: 0,
        }
    }

    /// Seeds `0..iterations`.
    pub fn iterations(config: &'a RawConfig, iterations: u64) -> Self {
        Self::new(config, 0, iterations)
    }

    pub fn restart(&self) -> Self {
        Self::new(self.config, self.start, self.count)
    }
}

impl Iterator for SeedSweep<'_> {
    type Item = (Seed, PipelineResult<TestPlan>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done >= self.count {
            return None;
        }
        let seed = self.start.wrapping_add(self.done);
        self.done += 1;
        Some((seed, resolve(self.config, seed)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = usize::try_from(self.count - self.done).unwrap_or(usize::MAX);
        (left, Some(left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_config::{IntValue, SectionRequest, SizeValue};

    fn config() -> RawConfig {
        RawConfig::default()
    }

    fn secure_config() -> RawConfig {
        let mut cfg = config();
        cfg.memory.ram.push(RegionConfig {
            name: "secure_dram".into(),
            address: IntValue(0x1_0000_0000),
            size: SizeValue(0x1000_0000),
            secure: false,
        });
        cfg
    }

    #[test]
    fn test_same_seed_same_plan() {
        let cfg = config();
        for seed in 0..32 {
            assert_eq!(resolve(&cfg, seed).unwrap(), resolve(&cfg, seed).unwrap());
        }
    }

    #[test]
    fn test_fixed_axes_are_respected() {
        let mut cfg = config();
        cfg.env.priv_mode = Choice::Fixed(PrivMode::User);
        cfg.env.paging_mode = Choice::Fixed(PagingMode::Sv48);
        cfg.env.deleg_excp_to = Choice::Fixed(DelegTarget::Super);
        for seed in 0..32 {
            let plan = resolve(&cfg, seed).unwrap();
            assert_eq!(plan.priv_mode, PrivMode::User);
            assert_eq!(plan.paging_mode, PagingMode::Sv48);
            assert_eq!(plan.deleg_target, DelegTarget::Super);
        }
    }

    #[test]
    fn test_pinning_one_axis_does_not_shift_another() {
        let mut random_mp = config();
        random_mp.env.priv_mode = Choice::Fixed(PrivMode::Super);
        random_mp.mp.mp_mode = Choice::Random;
        let mut pinned_mp = random_mp.clone();
        pinned_mp.mp.mp_mode = Choice::Fixed(SchedulingMode::Parallel);
        pinned_mp.env.secure_mode = Choice::Fixed(SecureMode::Off);

        for seed in 0..64 {
            let a = resolve(&random_mp, seed).unwrap();
            let b = resolve(&pinned_mp, seed).unwrap();
            assert_eq!(a.paging_mode, b.paging_mode, "seed {}", seed);
            assert_eq!(a.deleg_target, b.deleg_target, "seed {}", seed);
            assert_eq!(a.layout_seed, b.layout_seed);
            assert_eq!(a.generator_seed, b.generator_seed);
        }
    }

    #[test]
    fn test_random_axes_vary_across_seeds() {
        let cfg = config();
        let plans: Vec<_> = (0..64).map(|s| resolve(&cfg, s).unwrap()).collect();
        assert!(plans.iter().any(|p| p.priv_mode == PrivMode::Machine));
        assert!(plans.iter().any(|p| p.priv_mode != PrivMode::Machine));
    }

    #[test]
    fn test_wysiwyg_forces_machine_mode() {
        let mut cfg = config();
        cfg.generation.wysiwyg = true;
        for seed in 0..16 {
            let plan = resolve(&cfg, seed).unwrap();
            assert_eq!(plan.priv_mode, PrivMode::Machine);
            assert_eq!(plan.paging_mode, PagingMode::Disable);
            assert_eq!(plan.deleg_target, DelegTarget::Machine);
            assert_eq!(plan.render_mode, RenderMode::SingleFile);
        }
    }

    #[test]
    fn test_wysiwyg_with_pinned_super_conflicts() {
        let mut cfg = config();
        cfg.generation.wysiwyg = true;
        cfg.env.priv_mode = Choice::Fixed(PrivMode::Super);
        let err = resolve(&cfg, 0).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigConflict(_)));
        assert!(err.to_string().contains("priv_mode=super"));
    }

    #[test]
    fn test_wysiwyg_multi_hart_runs_parallel() {
        let mut cfg = config();
        cfg.generation.wysiwyg = true;
        cfg.mp.num_harts = 2;
        cfg.mp.mp_mode = Choice::Random;
        for seed in 0..16 {
            assert_eq!(resolve(&cfg, seed).unwrap().scheduling, SchedulingMode::Parallel);
        }

        cfg.mp.mp_mode = Choice::Fixed(SchedulingMode::RoundRobin);
        let err = resolve(&cfg, 0).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigConflict(_)));
        assert!(err.to_string().contains("mp_mode"));

        cfg.mp.num_harts = 1;
        assert!(resolve(&cfg, 0).is_ok());
    }

    #[test]
    fn test_machine_mode_disables_random_paging() {
        let mut cfg = config();
        cfg.env.priv_mode = Choice::Fixed(PrivMode::Machine);
        for seed in 0..16 {
            let plan = resolve(&cfg, seed).unwrap();
            assert_eq!(plan.paging_mode, PagingMode::Disable);
            assert_eq!(plan.deleg_target, DelegTarget::Machine);
        }
    }

    #[test]
    fn test_machine_mode_with_pinned_paging_conflicts() {
        let mut cfg = config();
        cfg.env.priv_mode = Choice::Fixed(PrivMode::Machine);
        cfg.env.paging_mode = Choice::Fixed(PagingMode::Sv39);
        assert!(matches!(
            resolve(&cfg, 0),
            Err(PipelineError::ConfigConflict(_))
        ));

        cfg.env.enable_machine_paging = true;
        assert_eq!(resolve(&cfg, 0).unwrap().paging_mode, PagingMode::Sv39);
    }

    #[test]
    fn test_pinned_paging_steers_random_priv_away_from_machine() {
        let mut cfg = config();
        cfg.env.paging_mode = Choice::Fixed(PagingMode::Sv57);
        for seed in 0..32 {
            let plan = resolve(&cfg, seed).unwrap();
            assert_ne!(plan.priv_mode, PrivMode::Machine);
        }
    }

    #[test]
    fn test_virtualized_forces_super_delegation() {
        let mut cfg = config();
        cfg.env.env = Choice::Fixed(TestEnv::Virtualized);
        for seed in 0..16 {
            let plan = resolve(&cfg, seed).unwrap();
            assert_eq!(plan.deleg_target, DelegTarget::Super);
            assert_ne!(plan.priv_mode, PrivMode::Machine);
        }

        cfg.env.deleg_excp_to = Choice::Fixed(DelegTarget::Machine);
        assert!(matches!(
            resolve(&cfg, 0),
            Err(PipelineError::ConfigConflict(_))
        ));
    }

    #[test]
    fn test_bare_metal_never_gets_g_stage_paging() {
        let mut cfg = config();
        cfg.env.paging_g_mode = Choice::Random;
        for seed in 0..16 {
            let plan = resolve(&cfg, seed).unwrap();
            assert_eq!(plan.g_paging_mode, GPagingMode::Disable);
        }
    }

    #[test]
    fn test_secure_on_without_secure_ram_conflicts() {
        let mut cfg = config();
        cfg.env.secure_mode = Choice::Fixed(SecureMode::On);
        let err = resolve(&cfg, 0).unwrap_err();
        assert!(err.to_string().contains("secure"));
    }

    #[test]
    fn test_random_secure_without_secure_ram_stays_off() {
        let mut cfg = config();
        cfg.env.secure_mode = Choice::Random;
        assert!((0..64).all(|s| !resolve(&cfg, s).unwrap().secure));
    }

    #[test]
    fn test_random_secure_mixes_on_and_off() {
        let mut cfg = secure_config();
        cfg.env.secure_mode = Choice::Random;
        let plans: Vec<_> = (0..200).map(|s| resolve(&cfg, s).unwrap()).collect();
        assert!(plans.iter().any(|p| p.secure));
        assert!(plans.iter().any(|p| !p.secure));
        assert!(plans.iter().filter(|p| p.secure).all(|p| p.setup_pmp));
    }

    #[test]
    fn test_delegation_defaults_follow_target() {
        let mut cfg = config();
        cfg.env.priv_mode = Choice::Fixed(PrivMode::User);
        cfg.env.deleg_excp_to = Choice::Fixed(DelegTarget::Super);
        let plan = resolve(&cfg, 0).unwrap();
        assert_eq!(plan.delegation.medeleg, u64::MAX);
        assert_eq!(plan.delegation.mideleg, 0x222);

        cfg.env.deleg_excp_to = Choice::Fixed(DelegTarget::Machine);
        cfg.csr.mideleg = Some(IntValue(0x20));
        let plan = resolve(&cfg, 0).unwrap();
        assert_eq!(plan.delegation.medeleg, 0);
        assert_eq!(plan.delegation.mideleg, 0x20);
    }

    #[test]
    fn test_defines_and_csr_init_are_parsed() {
        let mut cfg = config();
        cfg.test_equates = vec!["LOOP_COUNT=0x10".into()];
        cfg.csr.init = vec!["mscratch=5".into()];
        cfg.csr.init_mask = vec!["mstatus=0x8=0x8".into()];
        let plan = resolve(&cfg, 0).unwrap();
        assert_eq!(plan.equate_defines, vec![("LOOP_COUNT".to_string(), 0x10)]);
        assert_eq!(plan.csr_init.len(), 2);
        assert_eq!(plan.csr_init[1].mask, Some(0x8));

        cfg.test_equates = vec!["broken".into()];
        assert!(matches!(
            resolve(&cfg, 0),
            Err(PipelineError::ConfigConflict(_))
        ));
    }

    #[test]
    fn test_reserved_section_name_conflicts() {
        let mut cfg = config();
        cfg.generation.sections = vec![SectionRequest {
            name: "os_stack_3".into(),
            size: SizeValue(0x1000),
            shared: true,
        }];
        assert!(matches!(
            resolve(&cfg, 0),
            Err(PipelineError::ConfigConflict(_))
        ));
    }

    #[test]
    fn test_unaligned_tohost_conflicts() {
        let mut cfg = config();
        cfg.eot.tohost = Some(IntValue(0x7000_0004));
        assert!(matches!(
            resolve(&cfg, 0),
            Err(PipelineError::ConfigConflict(_))
        ));
    }

    #[test]
    fn test_test_name_from_template_stem() {
        let mut cfg = config();
        cfg.inputs.template = Some("tests/fail_test.S".into());
        assert_eq!(resolve(&cfg, 0).unwrap().test_name, "fail_test");
        cfg.inputs.name = Some("renamed".into());
        assert_eq!(resolve(&cfg, 0).unwrap().test_name, "renamed");
    }

    #[test]
    fn test_section_name_must_be_identifier() {
        let mut cfg = config();
        cfg.generation.sections.push(SectionRequest {
            name: "my-sec".into(),
            size: SizeValue(0x1000),
            shared: false,
        });
        let err = resolve(&cfg, 0).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigConflict(_)));
        assert!(err.to_string().contains("my-sec"));
    }

    #[test]
    fn test_seed_sweep_is_lazy_and_restartable() {
        let cfg = config();
        let sweep = SeedSweep::iterations(&cfg, 5);
        let first: Vec<_> = sweep
            .clone()
            .map(|(seed, plan)| (seed, plan.unwrap()))
            .collect();
        assert_eq!(first.len(), 5);
        assert_eq!(first[0].0, 0);
        assert_eq!(first[4].0, 4);

        let mut partial = SeedSweep::new(&cfg, 10, 3);
        partial.next();
        let again: Vec<_> = partial.restart().map(|(seed, _)| seed).collect();
        assert_eq!(again, vec![10, 11, 12]);

        let wrapped: Vec<_> = SeedSweep::new(&cfg, u64::MAX, 2).map(|(seed, _)| seed).collect();
        assert_eq!(wrapped, vec![u64::MAX, 0]);
    }
}
