// Rivet - RISC-V Directed Test Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! One invocation: resolve, lay out, generate, build, simulate, classify.

use crate::classify::{classify, ExecutionOutcome};
use crate::error::{PipelineError, PipelineResult};
use crate::generator::{generate, GeneratedImage};
use crate::layout::{self, MemoryLayout};
use crate::plan::{Seed, TestPlan};
use crate::resolve::{resolve, SeedSweep};
use crate::simulator::{RawRunResult, SimLimits, Simulator};
use crate::toolchain::{BuildArtifacts, Toolchain};
use rivet_config::RawConfig;
use std::path::Path;
use tracing::{info, info_span, warn};

/// The caller's base assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestTemplate {
    pub name: String,
    pub source: String,
}

impl TestTemplate {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    pub fn from_file(path: &Path) -> PipelineResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "test".to_string());
        Ok(Self { name, source })
    }
}

/// Everything produced before any subprocess runs.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub plan: TestPlan,
    pub layout: MemoryLayout,
    pub image: GeneratedImage,
}

#[derive(Debug)]
pub struct RunReport {
    pub seed: Seed,
    pub plan: TestPlan,
    pub layout: MemoryLayout,
    pub artifacts: BuildArtifacts,
    pub raw: RawRunResult,
    pub outcome: ExecutionOutcome,
}

pub struct Pipeline {
    config: RawConfig,
    template: TestTemplate,
    toolchain: Toolchain,
    simulator: Simulator,
}

impl Pipeline {
    pub fn new(config: RawConfig, template: TestTemplate) -> Self {
        let toolchain = Toolchain::from_config(&config.toolchain);
        let simulator = Simulator::from_config(&config.simulator);
        Self {
            config,
            template,
            toolchain,
            simulator,
        }
    }

    pub fn config(&self) -> &RawConfig {
        &self.config
    }

    /// Resolved plans for `count` consecutive seeds from `start`.
    pub fn sweep(&self, start: Seed, count: u64) -> SeedSweep<'_> {
        SeedSweep::new(&self.config, start, count)
    }

    /// Resolution, layout and generation. Pure: identical seeds give
    /// identical results.
    pub fn prepare(&self, seed: Seed) -> PipelineResult<Prepared> {
        self.prepare_plan(resolve(&self.config, seed)?)
    }

    /// Layout and generation for an already resolved plan.
    pub fn prepare_plan(&self, mut plan: TestPlan) -> PipelineResult<Prepared> {
        if self.config.inputs.name.is_none() {
            plan.test_name = self.template.name.clone();
        }
        let layout = layout::plan(&plan)?;
        let image = generate(&plan, &layout, &self.template.source)?;
        Ok(Prepared {
            plan,
            layout,
            image,
        })
    }

    /// Generates and builds without simulating.
    pub fn generate(&self, seed: Seed, run_dir: &Path) -> PipelineResult<(Prepared, BuildArtifacts)> {
        self.generate_plan(resolve(&self.config, seed)?, run_dir)
    }

    pub fn generate_plan(
        &self,
        plan: TestPlan,
        run_dir: &Path,
    ) -> PipelineResult<(Prepared, BuildArtifacts)> {
        let prepared = self.prepare_plan(plan)?;
        let seed = prepared.plan.seed;
        let span = info_span!("build", seed, test = %prepared.plan.test_name);
        let _enter = span.enter();
        let artifacts = self.toolchain.build(&prepared.image, run_dir)?;
        Ok((prepared, artifacts))
    }

    /// Runs the whole chain. A failing test is an `Ok` report whose outcome is
    /// `Fail`; configuration, build and simulator errors are `Err`.
    pub fn run(&self, seed: Seed, run_dir: &Path) -> PipelineResult<RunReport> {
        self.run_plan(resolve(&self.config, seed)?, run_dir)
    }

    pub fn run_plan(&self, plan: TestPlan, run_dir: &Path) -> PipelineResult<RunReport> {
        let (prepared, artifacts) = self.generate_plan(plan, run_dir)?;
        let Prepared { plan, layout, .. } = prepared;
        let seed = plan.seed;
        let span = info_span!("run", seed, test = %plan.test_name);
        let _enter = span.enter();

        let tohost = artifacts.tohost.or_else(|| layout.tohost_base());
        if let (Some(symbol), Some(pinned)) = (artifacts.tohost, plan.tohost) {
            if symbol != pinned {
                warn!("tohost symbol at {:#x} but {:#x} was requested", symbol, pinned);
            }
        }
        let limits = SimLimits::from_config(&self.config.simulator);
        let raw = self.simulator.run(&artifacts, plan.num_harts, tohost, limits)?;
        let outcome = classify(&raw, &plan)?;
        match &outcome {
            ExecutionOutcome::Pass => info!("PASS"),
            ExecutionOutcome::Fail { kind, code, .. } => info!("FAIL {} ({:#x})", kind, code),
        }
        Ok(RunReport {
            seed,
            plan,
            layout,
            artifacts,
            raw,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = ".section .code, \"ax\"\n\tnop\n\tend_test_pass\n";

    #[test]
    fn test_prepare_is_deterministic() {
        let pipeline = Pipeline::new(RawConfig::default(), TestTemplate::new("base", TEMPLATE));
        let a = pipeline.prepare(42).unwrap();
        let b = pipeline.prepare(42).unwrap();
        assert_eq!(a.image, b.image);
        assert_eq!(a.layout, b.layout);
        assert_eq!(a.plan.test_name, "base");
    }

    #[test]
    fn test_config_name_wins_over_template() {
        let mut cfg = RawConfig::default();
        cfg.inputs.name = Some("named".into());
        let pipeline = Pipeline::new(cfg, TestTemplate::new("base", TEMPLATE));
        let prepared = pipeline.prepare(0).unwrap();
        assert_eq!(prepared.image.test_name, "named");
        assert!(prepared.image.source().is_some_and(|f| f.name == "named.s"));
    }

    #[test]
    fn test_template_without_code_section_is_rejected() {
        let pipeline = Pipeline::new(RawConfig::default(), TestTemplate::new("base", "nop\n"));
        let err = pipeline.prepare(0).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_sweep_matches_single_seed_preparation() {
        let pipeline = Pipeline::new(RawConfig::default(), TestTemplate::new("base", TEMPLATE));
        let seeds: Vec<_> = pipeline
            .sweep(40, 3)
            .map(|(seed, plan)| {
                let prepared = pipeline.prepare_plan(plan.unwrap()).unwrap();
                assert_eq!(prepared.image, pipeline.prepare(seed).unwrap().image);
                seed
            })
            .collect();
        assert_eq!(seeds, vec![40, 41, 42]);
    }

    #[test]
    fn test_template_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("csr_test.S");
        std::fs::write(&path, TEMPLATE).unwrap();
        let template = TestTemplate::from_file(&path).unwrap();
        assert_eq!(template.name, "csr_test");
        assert!(TestTemplate::from_file(&dir.path().join("missing.S")).is_err());
    }
}
