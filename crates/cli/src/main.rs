// Rivet - RISC-V Directed Test Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rivet_config::{parse_int, Backend, IntValue, RawConfig};
use rivet_core::{
    ExecutionOutcome, Pipeline, PipelineError, RunReport, Seed, TestPlan, TestTemplate,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

const EXIT_PASS: u8 = 0;
const EXIT_TEST_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

const RESULT_SCHEMA_VERSION: &str = "1.0";

fn parse_u64(s: &str) -> Result<u64, String> {
    parse_int(s).map_err(|e| format!("{:#}", e))
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Rivet: self-checking RISC-V test generator", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve, lay out and render a test; optionally compile it.
    Generate(GenerateArgs),
    /// Generate, build, simulate and classify one or more seeds.
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Path to the test configuration (YAML)
    #[arg(short, long)]
    config: PathBuf,

    /// Base assembly template (overrides inputs.template)
    #[arg(long)]
    template: Option<PathBuf>,

    /// Seed for every random choice (random when omitted)
    #[arg(short, long)]
    seed: Option<Seed>,

    /// Directory for generated and built artifacts
    #[arg(long, default_value = "rivet_run")]
    run_dir: PathBuf,

    /// Number of consecutive seeds to process, each in `seed_<n>/`
    #[arg(long, default_value = "1")]
    iterations: u64,

    /// Simulator backend
    #[arg(long)]
    iss: Option<Backend>,

    /// Physical address of the tohost word
    #[arg(long, value_parser = parse_u64)]
    tohost: Option<u64>,

    #[arg(long, value_parser = parse_u64)]
    eot_pass_value: Option<u64>,

    #[arg(long, value_parser = parse_u64)]
    eot_fail_value: Option<u64>,

    /// Simulator instruction limit
    #[arg(long)]
    max_instructions: Option<u64>,

    #[arg(long)]
    num_harts: Option<u32>,

    /// Inline every runtime module into one source
    #[arg(long)]
    single_assembly_file: bool,

    /// Emit the template verbatim behind a minimal loader
    #[arg(long)]
    wysiwyg: bool,

    /// Extra `NAME=VALUE` equate (repeatable)
    #[arg(long = "test-equate")]
    test_equates: Vec<String>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Also compile the generated sources
    #[arg(long)]
    build: bool,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Serialize)]
struct PlanSummary {
    priv_mode: String,
    deleg_excp_to: String,
    env: String,
    paging_mode: String,
    paging_g_mode: String,
    secure: bool,
    num_harts: u32,
    mp_mode: String,
    eot_pass_value: u64,
    eot_fail_value: u64,
}

impl From<&TestPlan> for PlanSummary {
    fn from(plan: &TestPlan) -> Self {
        Self {
            priv_mode: plan.priv_mode.to_string(),
            deleg_excp_to: plan.deleg_target.to_string(),
            env: plan.env.to_string(),
            paging_mode: plan.paging_mode.to_string(),
            paging_g_mode: plan.g_paging_mode.to_string(),
            secure: plan.secure,
            num_harts: plan.num_harts,
            mp_mode: plan.scheduling.to_string(),
            eot_pass_value: plan.eot.pass,
            eot_fail_value: plan.eot.fail,
        }
    }
}

#[derive(Debug, Default, Serialize)]
struct ArtifactPaths {
    #[serde(skip_serializing_if = "Option::is_none")]
    elf: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    equates: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    linker_script: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disassembly: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    simulator_log: Option<PathBuf>,
    sources: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct RunResult {
    result_schema_version: String,
    seed: Seed,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fail_code: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan: Option<PlanSummary>,
    artifacts: ArtifactPaths,
    #[serde(skip_serializing_if = "Option::is_none")]
    elf_sha256: Option<String>,
}

impl RunResult {
    fn new(seed: Seed, status: &str) -> Self {
        Self {
            result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
            seed,
            status: status.to_string(),
            kind: None,
            fail_code: None,
            message: None,
            backend: None,
            plan: None,
            artifacts: ArtifactPaths::default(),
            elf_sha256: None,
        }
    }

    fn from_report(report: &RunReport) -> Self {
        let status = if report.outcome.is_pass() { "pass" } else { "fail" };
        let mut result = Self::new(report.seed, status);
        if let ExecutionOutcome::Fail {
            kind,
            code,
            raw_text,
        } = &report.outcome
        {
            result.kind = Some(kind.to_string());
            result.fail_code = Some(*code);
            result.message = Some(raw_text.clone());
        }
        result.backend = Some(report.raw.backend.clone());
        result.plan = Some(PlanSummary::from(&report.plan));
        let artifacts = &report.artifacts;
        result.artifacts = ArtifactPaths {
            elf: Some(artifacts.elf.clone()),
            equates: Some(artifacts.equates.clone()),
            linker_script: Some(artifacts.linker_script.clone()),
            disassembly: Some(artifacts.disassembly.clone()),
            simulator_log: Some(report.raw.log_path.clone()),
            sources: artifacts.sources.clone(),
        };
        result.elf_sha256 = sha256_file(&artifacts.elf);
        result
    }

    fn from_error(seed: Seed, err: &PipelineError) -> Self {
        let status = if err.is_config_error() { "config_error" } else { "error" };
        let mut result = Self::new(seed, status);
        if let PipelineError::Toolchain(e) = err {
            result.kind = Some(e.kind.to_string());
            result.fail_code = Some(e.fail_code);
            result.backend = Some(e.tool.clone());
        }
        result.message = Some(err.to_string());
        result
    }
}

fn sha256_file(path: &Path) -> Option<String> {
    match std::fs::read(path) {
        Ok(bytes) => {
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            Some(format!("{:x}", hasher.finalize()))
        }
        Err(e) => {
            error!("Failed to hash {:?}: {}", path, e);
            None
        }
    }
}

fn write_result(run_dir: &Path, result: &RunResult) {
    if let Err(e) = std::fs::create_dir_all(run_dir) {
        error!("Failed to create run directory {:?}: {}", run_dir, e);
        return;
    }
    let result_path = run_dir.join("result.json");
    match std::fs::File::create(&result_path) {
        Ok(f) => {
            if let Err(e) = serde_json::to_writer_pretty(f, result) {
                error!("Failed to write result.json: {}", e);
            }
        }
        Err(e) => error!("Failed to create result.json: {}", e),
    }
}

fn exit_code_for(err: &PipelineError) -> u8 {
    if err.is_config_error() {
        EXIT_CONFIG_ERROR
    } else {
        EXIT_RUNTIME_ERROR
    }
}

/// Loads the config, applies flag overrides and locates the template.
fn load_inputs(args: &CommonArgs) -> Result<(RawConfig, TestTemplate)> {
    let mut config = RawConfig::from_file(&args.config)?;

    if let Some(backend) = args.iss {
        config.simulator.backend = backend;
    }
    if let Some(tohost) = args.tohost {
        config.eot.tohost = Some(IntValue(tohost));
    }
    if let Some(pass) = args.eot_pass_value {
        config.eot.pass_value = IntValue(pass);
    }
    if let Some(fail) = args.eot_fail_value {
        config.eot.fail_value = IntValue(fail);
    }
    if let Some(limit) = args.max_instructions {
        config.simulator.max_instructions = limit;
    }
    if let Some(harts) = args.num_harts {
        config.mp.num_harts = harts;
    }
    config.generation.single_assembly_file |= args.single_assembly_file;
    config.generation.wysiwyg |= args.wysiwyg;
    config.test_equates.extend(args.test_equates.iter().cloned());
    config.validate().context("Invalid command-line overrides")?;

    let template_path = match (&args.template, &config.inputs.template) {
        (Some(path), _) => path.clone(),
        (None, Some(relative)) => args
            .config
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(relative),
        (None, None) => bail!("No template: pass --template or set inputs.template"),
    };
    let template = TestTemplate::from_file(&template_path)
        .with_context(|| format!("Failed to load template {:?}", template_path))?;
    Ok((config, template))
}

/// First seed and number of consecutive seeds to process.
fn seed_range(args: &CommonArgs) -> (Seed, u64) {
    (args.seed.unwrap_or_else(rand::random), args.iterations.max(1))
}

/// A single seed writes straight into the run directory.
fn seed_dir(args: &CommonArgs, seed: Seed) -> PathBuf {
    if args.iterations <= 1 {
        args.run_dir.clone()
    } else {
        args.run_dir.join(format!("seed_{}", seed))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    match cli.command {
        Commands::Generate(args) => run_generate(args),
        Commands::Run(args) => run_tests(args),
    }
}

fn run_generate(args: GenerateArgs) -> ExitCode {
    let (config, template) = match load_inputs(&args.common) {
        Ok(inputs) => inputs,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    let pipeline = Pipeline::new(config, template);

    let mut worst = EXIT_PASS;
    let (first, count) = seed_range(&args.common);
    for (seed, plan) in pipeline.sweep(first, count) {
        let run_dir = seed_dir(&args.common, seed);
        let outcome = plan.and_then(|plan| {
            if args.build {
                pipeline
                    .generate_plan(plan, &run_dir)
                    .map(|(_, artifacts)| artifacts.sources)
            } else {
                pipeline
                    .prepare_plan(plan)
                    .and_then(|prepared| prepared.image.write_to(&run_dir))
            }
        });
        match outcome {
            Ok(files) => {
                info!("seed {}: wrote {} files to {:?}", seed, files.len(), run_dir);
                for file in files {
                    println!("{}", file.display());
                }
            }
            Err(e) => {
                error!("seed {}: {}", seed, e);
                worst = worst.max(exit_code_for(&e));
            }
        }
    }
    ExitCode::from(worst)
}

fn run_tests(args: RunArgs) -> ExitCode {
    let (config, template) = match load_inputs(&args.common) {
        Ok(inputs) => inputs,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    let pipeline = Pipeline::new(config, template);

    let mut worst = EXIT_PASS;
    let mut passed = 0u64;
    let (first, total) = seed_range(&args.common);
    for (seed, plan) in pipeline.sweep(first, total) {
        let run_dir = seed_dir(&args.common, seed);
        let (result, code) = match plan.and_then(|plan| pipeline.run_plan(plan, &run_dir)) {
            Ok(report) => {
                let code = if report.outcome.is_pass() {
                    passed += 1;
                    EXIT_PASS
                } else {
                    EXIT_TEST_FAIL
                };
                (RunResult::from_report(&report), code)
            }
            Err(e) => {
                error!("seed {}: {}", seed, e);
                (RunResult::from_error(seed, &e), exit_code_for(&e))
            }
        };
        println!("seed {}: {}", seed, result.status);
        write_result(&run_dir, &result);
        worst = worst.max(code);
    }
    info!("{}/{} seeds passed", passed, total);
    ExitCode::from(worst)
}
