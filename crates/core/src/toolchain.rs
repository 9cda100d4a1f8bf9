// Rivet - RISC-V Directed Test Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Assemble, link and disassemble generated images with an external GCC chain.

use crate::error::{FailureKind, PipelineError, PipelineResult, ToolchainError};
use crate::generator::GeneratedImage;
use rivet_config::ToolchainConfig;
use rivet_loader::ElfImage;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const COMPILER_ENV: &str = "RV_GCC";
pub const DISASSEMBLER_ENV: &str = "RV_OBJDUMP";
const DEFAULT_COMPILER: &str = "riscv64-unknown-elf-gcc";
const DEFAULT_DISASSEMBLER: &str = "riscv64-unknown-elf-objdump";
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Explicit path, then the environment variable, then a `PATH` search.
pub fn find_executable(explicit: Option<&Path>, env_var: &str, default_name: &str) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(env_var).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(path));
    }
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(default_name))
            .find(|candidate| candidate.is_file())
    })
}

/// Result of one finished (or killed) subprocess.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: Option<ExitStatus>,
    pub timed_out: bool,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
}

impl ProcessOutput {
    pub fn exit_code(&self) -> Option<i32> {
        self.status.and_then(|s| s.code())
    }

    pub fn success(&self) -> bool {
        !self.timed_out && self.status.map(|s| s.success()).unwrap_or(false)
    }

    #[cfg(unix)]
    pub fn signal(&self) -> Option<i32> {
        use std::os::unix::process::ExitStatusExt;
        self.status.and_then(|s| s.signal())
    }

    #[cfg(not(unix))]
    pub fn signal(&self) -> Option<i32> {
        None
    }

    pub fn stdout(&self) -> String {
        read_lossy(&self.stdout_path)
    }

    pub fn stderr(&self) -> String {
        read_lossy(&self.stderr_path)
    }

    /// Stderr, or stdout when the tool reported nothing on stderr.
    pub fn diagnostics(&self) -> String {
        let stderr = self.stderr();
        if stderr.trim().is_empty() {
            self.stdout()
        } else {
            stderr
        }
    }
}

fn read_lossy(path: &Path) -> String {
    std::fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Spawns `program`, redirecting output into files, and kills it after `timeout`.
pub fn run_with_timeout(
    program: &Path,
    args: &[String],
    cwd: &Path,
    stdout_path: PathBuf,
    stderr_path: PathBuf,
    timeout: Duration,
) -> std::io::Result<ProcessOutput> {
    let stdout = File::create(&stdout_path)?;
    let stderr = File::create(&stderr_path)?;
    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .spawn()?;
    let start = Instant::now();

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(ProcessOutput {
                status: Some(status),
                timed_out: false,
                stdout_path,
                stderr_path,
            });
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let status = child.wait().ok();
            warn!("{:?} timed out after {:?}", program, timeout);
            return Ok(ProcessOutput {
                status,
                timed_out: true,
                stdout_path,
                stderr_path,
            });
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

pub(crate) fn command_line(program: &Path, args: &[String]) -> Vec<String> {
    std::iter::once(program.display().to_string())
        .chain(args.iter().cloned())
        .collect()
}

/// Files a successful build leaves in the run directory.
#[derive(Debug, Clone)]
pub struct BuildArtifacts {
    pub run_dir: PathBuf,
    pub elf: PathBuf,
    pub equates: PathBuf,
    pub linker_script: PathBuf,
    pub disassembly: PathBuf,
    pub sources: Vec<PathBuf>,
    /// Address of the `tohost` symbol when the ELF carries one.
    pub tohost: Option<u64>,
    pub elf_image: ElfImage,
}

#[derive(Debug, Clone)]
pub struct Toolchain {
    compiler: Option<PathBuf>,
    disassembler: Option<PathBuf>,
    march: String,
    mabi: String,
    extra_opts: Vec<String>,
    timeout: Duration,
}

impl Toolchain {
    pub fn from_config(config: &ToolchainConfig) -> Self {
        Self {
            compiler: config.compiler.clone(),
            disassembler: config.disassembler.clone(),
            march: config.march.clone(),
            mabi: config.mabi.clone(),
            extra_opts: config.compiler_opts.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    fn elf_failure(tool: &str, raw: impl Into<String>) -> ToolchainError {
        ToolchainError::new(tool, FailureKind::ElfFailure, raw)
    }

    /// Compiles the image into `<run_dir>/<test>`. Never retries.
    pub fn build(&self, image: &GeneratedImage, run_dir: &Path) -> PipelineResult<BuildArtifacts> {
        let sources = image.write_to(run_dir)?;
        let name = &image.test_name;
        let source = run_dir.join(
            &image
                .source()
                .ok_or_else(|| PipelineError::Template("image has no assembly source".into()))?
                .name,
        );
        let linker_script = run_dir.join(
            &image
                .linker_script()
                .ok_or_else(|| PipelineError::Template("image has no linker script".into()))?
                .name,
        );
        let equates = run_dir.join(
            &image
                .equates_file()
                .ok_or_else(|| PipelineError::Template("image has no equates file".into()))?
                .name,
        );
        let elf = run_dir.join(name);

        let compiler = find_executable(self.compiler.as_deref(), COMPILER_ENV, DEFAULT_COMPILER)
            .ok_or_else(|| {
                Self::elf_failure(
                    "compiler",
                    format!(
                        "no compiler found: set toolchain.compiler, {} or put {} on PATH",
                        COMPILER_ENV, DEFAULT_COMPILER
                    ),
                )
            })?;

        let mut args: Vec<String> = vec![
            "-static".into(),
            "-mcmodel=medany".into(),
            "-fvisibility=hidden".into(),
            "-nostdlib".into(),
            "-nostartfiles".into(),
            format!("-march={}", self.march),
            format!("-mabi={}", self.mabi),
            "-I".into(),
            run_dir.display().to_string(),
            "-T".into(),
            linker_script.display().to_string(),
            "-o".into(),
            elf.display().to_string(),
            source.display().to_string(),
        ];
        args.extend(self.extra_opts.iter().cloned());

        info!("Compiling {}", name);
        let command = command_line(&compiler, &args);
        debug!("{}", command.join(" "));
        let output = run_with_timeout(
            &compiler,
            &args,
            run_dir,
            run_dir.join(format!("{}_compile.stdout", name)),
            run_dir.join(format!("{}_compile.stderr", name)),
            self.timeout,
        )
        .map_err(|e| Self::elf_failure("compiler", e.to_string()).with_command(command.clone()))?;

        if output.timed_out {
            let raw = format!(
                "compiler timed out after {:?}\n{}",
                self.timeout,
                output.diagnostics()
            );
            return Err(Self::elf_failure("compiler", raw)
                .with_command(command)
                .with_log(&output.stderr_path)
                .into());
        }
        if !output.success() {
            return Err(Self::elf_failure("compiler", output.diagnostics())
                .with_command(command)
                .with_exit_code(output.exit_code())
                .with_log(&output.stderr_path)
                .into());
        }
        if !elf.is_file() {
            return Err(Self::elf_failure(
                "compiler",
                format!("compiler exited cleanly but {:?} was not produced", elf),
            )
            .with_command(command)
            .into());
        }

        let elf_image = rivet_loader::inspect_elf(&elf)
            .map_err(|e| Self::elf_failure("loader", format!("{:#}", e)).with_command(command))?;
        let tohost = elf_image.symbol("tohost");
        if tohost.is_none() {
            warn!("{:?} has no tohost symbol; falling back to the layout address", elf);
        }

        let disassembly = self.disassemble(&elf, run_dir, name)?;

        Ok(BuildArtifacts {
            run_dir: run_dir.to_path_buf(),
            elf,
            equates,
            linker_script,
            disassembly,
            sources,
            tohost,
            elf_image,
        })
    }

    fn disassemble(&self, elf: &Path, run_dir: &Path, name: &str) -> PipelineResult<PathBuf> {
        let objdump = find_executable(
            self.disassembler.as_deref(),
            DISASSEMBLER_ENV,
            DEFAULT_DISASSEMBLER,
        )
        .ok_or_else(|| {
            Self::elf_failure(
                "objdump",
                format!(
                    "no disassembler found: set toolchain.disassembler, {} or put {} on PATH",
                    DISASSEMBLER_ENV, DEFAULT_DISASSEMBLER
                ),
            )
        })?;
        let args = vec!["-D".to_string(), elf.display().to_string()];
        let command = command_line(&objdump, &args);
        let dis = run_dir.join(format!("{}.dis", name));
        let output = run_with_timeout(
            &objdump,
            &args,
            run_dir,
            dis.clone(),
            run_dir.join(format!("{}_objdump.stderr", name)),
            self.timeout,
        )
        .map_err(|e| Self::elf_failure("objdump", e.to_string()).with_command(command.clone()))?;
        if output.timed_out {
            let raw = format!("objdump timed out after {:?}\n{}", self.timeout, output.stderr());
            return Err(Self::elf_failure("objdump", raw).with_command(command).into());
        }
        if !output.success() {
            return Err(Self::elf_failure("objdump", output.stderr())
                .with_command(command)
                .with_exit_code(output.exit_code())
                .into());
        }
        Ok(dis)
    }
}
