// Rivet - RISC-V Directed Test Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{bail, Context, Result};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const SCHEMA_VERSION: &str = "1.0";

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

fn default_true() -> bool {
    true
}

/// Declares a knob enum with a canonical lower-case spelling plus aliases.
/// The spelling is used for YAML, CLI flags and the equates summary.
macro_rules! knob_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $canon:literal $(| $alias:literal)*),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $canon),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let lowered = s.trim().to_ascii_lowercase();
                match lowered.as_str() {
                    $($canon $(| $alias)* => Ok($name::$variant),)+
                    other => Err(format!(
                        "unknown {} '{}', expected one of: {}",
                        stringify!($name),
                        other,
                        [$($canon),+].join(", ")
                    )),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(de::Error::custom)
            }
        }
    };
}

knob_enum! {
    /// Privilege level the test body executes in.
    PrivMode { Machine => "machine" | "m", Super => "super" | "s" | "supervisor", User => "user" | "u" }
}

knob_enum! {
    /// Privilege level exceptions are delegated to.
    DelegTarget { Machine => "machine" | "m", Super => "super" | "s" | "supervisor" }
}

knob_enum! {
    TestEnv { BareMetal => "bare_metal" | "bare", Virtualized => "virtualized" }
}

knob_enum! {
    /// First-stage address translation.
    PagingMode { Disable => "disable" | "disabled" | "bare", Sv39 => "sv39", Sv48 => "sv48", Sv57 => "sv57" }
}

knob_enum! {
    /// G-stage address translation for virtualized tests.
    GPagingMode { Disable => "disable" | "disabled" | "bare", Sv39x4 => "sv39x4" | "sv39", Sv48x4 => "sv48x4" | "sv48", Sv57x4 => "sv57x4" | "sv57" }
}

knob_enum! {
    SecureMode { On => "on" | "true" | "enable", Off => "off" | "false" | "disable" }
}

knob_enum! {
    /// How harts are activated when more than one is present.
    SchedulingMode { Parallel => "parallel", Simultaneous => "simultaneous", RoundRobin => "round_robin" | "round-robin" }
}

knob_enum! {
    /// External instruction-set simulator used to execute the built test.
    Backend { Whisper => "whisper", Spike => "spike" }
}

/// A knob that is either pinned by the caller or left to the seeded resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Choice<T> {
    Fixed(T),
    Random,
}

impl<T> Choice<T> {
    pub fn fixed(&self) -> Option<&T> {
        match self {
            Choice::Fixed(v) => Some(v),
            Choice::Random => None,
        }
    }

    pub fn is_random(&self) -> bool {
        matches!(self, Choice::Random)
    }
}

impl<T: FromStr> FromStr for Choice<T>
where
    T::Err: fmt::Display,
{
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" | "any" => Ok(Choice::Random),
            _ => s.parse::<T>().map(Choice::Fixed).map_err(|e| e.to_string()),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Choice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choice::Fixed(v) => v.fmt(f),
            Choice::Random => f.write_str("random"),
        }
    }
}

impl<T: fmt::Display> Serialize for Choice<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de, T: FromStr> Deserialize<'de> for Choice<T>
where
    T::Err: fmt::Display,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Parses `0x`/`0b` prefixed or decimal integers, allowing `_` separators.
pub fn parse_int(text: &str) -> Result<u64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != '_').collect();
    let parsed = if let Some(hex) = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16)
    } else if let Some(bin) = cleaned
        .strip_prefix("0b")
        .or_else(|| cleaned.strip_prefix("0B"))
    {
        u64::from_str_radix(bin, 2)
    } else {
        cleaned.parse::<u64>()
    };
    parsed.with_context(|| format!("Invalid integer '{}'", text))
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}

/// Integer knob accepting YAML integers or strings such as `"0x8000_0000"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IntValue(pub u64);

impl IntValue {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl Serialize for IntValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:#x}", self.0))
    }
}

impl<'de> Deserialize<'de> for IntValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer
            .deserialize_any(NumberVisitor { allow_sizes: false })
            .map(IntValue)
    }
}

/// Byte count accepting integers, hex strings or human sizes (`"64 KiB"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SizeValue(pub u64);

impl SizeValue {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl Serialize for SizeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:#x}", self.0))
    }
}

impl<'de> Deserialize<'de> for SizeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer
            .deserialize_any(NumberVisitor { allow_sizes: true })
            .map(SizeValue)
    }
}

struct NumberVisitor {
    allow_sizes: bool,
}

impl<'de> Visitor<'de> for NumberVisitor {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.allow_sizes {
            f.write_str("an unsigned integer, hex string or size such as \"64 KiB\"")
        } else {
            f.write_str("an unsigned integer or hex string")
        }
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<u64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<u64, E> {
        u64::try_from(v).map_err(|_| E::custom(format!("negative value {} not allowed", v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<u64, E> {
        match parse_int(v) {
            Ok(n) => Ok(n),
            Err(int_err) if self.allow_sizes => {
                parse_size(v).map_err(|e| E::custom(format!("{:#}; {:#}", int_err, e)))
            }
            Err(e) => Err(E::custom(format!("{:#}", e))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestInputs {
    /// Base assembly template, relative to the config file.
    #[serde(default)]
    pub template: Option<String>,
    /// Test name; defaults to the template file stem.
    #[serde(default)]
    pub name: Option<String>,
}

fn default_priv_mode() -> Choice<PrivMode> {
    Choice::Random
}

fn default_deleg() -> Choice<DelegTarget> {
    Choice::Random
}

fn default_env() -> Choice<TestEnv> {
    Choice::Fixed(TestEnv::BareMetal)
}

fn default_paging() -> Choice<PagingMode> {
    Choice::Random
}

fn default_g_paging() -> Choice<GPagingMode> {
    Choice::Fixed(GPagingMode::Disable)
}

fn default_secure() -> Choice<SecureMode> {
    Choice::Fixed(SecureMode::Off)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvKnobs {
    #[serde(default = "default_priv_mode")]
    pub priv_mode: Choice<PrivMode>,
    #[serde(default = "default_deleg")]
    pub deleg_excp_to: Choice<DelegTarget>,
    #[serde(default = "default_env")]
    pub env: Choice<TestEnv>,
    #[serde(default = "default_paging")]
    pub paging_mode: Choice<PagingMode>,
    #[serde(default = "default_g_paging")]
    pub paging_g_mode: Choice<GPagingMode>,
    #[serde(default = "default_secure")]
    pub secure_mode: Choice<SecureMode>,
    /// Keep translation enabled for machine-mode tests.
    #[serde(default)]
    pub enable_machine_paging: bool,
}

impl Default for EnvKnobs {
    fn default() -> Self {
        Self {
            priv_mode: default_priv_mode(),
            deleg_excp_to: default_deleg(),
            env: default_env(),
            paging_mode: default_paging(),
            paging_g_mode: default_g_paging(),
            secure_mode: default_secure(),
            enable_machine_paging: false,
        }
    }
}

fn default_num_harts() -> u32 {
    1
}

fn default_mp_mode() -> Choice<SchedulingMode> {
    Choice::Fixed(SchedulingMode::Parallel)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MpKnobs {
    #[serde(default = "default_num_harts")]
    pub num_harts: u32,
    #[serde(default = "default_mp_mode")]
    pub mp_mode: Choice<SchedulingMode>,
}

impl Default for MpKnobs {
    fn default() -> Self {
        Self {
            num_harts: default_num_harts(),
            mp_mode: default_mp_mode(),
        }
    }
}

/// Extra named section requested by the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionRequest {
    pub name: String,
    pub size: SizeValue,
    /// Visible to every hart rather than private to one.
    #[serde(default = "default_true")]
    pub shared: bool,
}

fn default_repeat_times() -> u32 {
    1
}

fn default_max_random_csr_reads() -> u32 {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationKnobs {
    #[serde(default)]
    pub wysiwyg: bool,
    #[serde(default)]
    pub single_assembly_file: bool,
    #[serde(default)]
    pub all_4kb_pages: bool,
    #[serde(default)]
    pub reserve_partial_phys_memory: bool,
    #[serde(default)]
    pub interrupts_enabled: bool,
    #[serde(default)]
    pub user_interrupt_table: bool,
    #[serde(default)]
    pub setup_pmp: bool,
    #[serde(default = "default_repeat_times")]
    pub repeat_times: u32,
    #[serde(default = "default_max_random_csr_reads")]
    pub max_random_csr_reads: u32,
    #[serde(default)]
    pub no_random_csr_reads: bool,
    #[serde(default)]
    pub section_order: Vec<String>,
    #[serde(default)]
    pub sections: Vec<SectionRequest>,
}

impl Default for GenerationKnobs {
    fn default() -> Self {
        Self {
            wysiwyg: false,
            single_assembly_file: false,
            all_4kb_pages: false,
            reserve_partial_phys_memory: false,
            interrupts_enabled: false,
            user_interrupt_table: false,
            setup_pmp: false,
            repeat_times: default_repeat_times(),
            max_random_csr_reads: default_max_random_csr_reads(),
            no_random_csr_reads: false,
            section_order: Vec::new(),
            sections: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CsrKnobs {
    /// `name=value` entries.
    #[serde(default)]
    pub init: Vec<String>,
    /// `name=mask=value` entries; only masked bits are written.
    #[serde(default)]
    pub init_mask: Vec<String>,
    #[serde(default)]
    pub medeleg: Option<IntValue>,
    #[serde(default)]
    pub mideleg: Option<IntValue>,
    #[serde(default)]
    pub hedeleg: Option<IntValue>,
    #[serde(default)]
    pub hideleg: Option<IntValue>,
    #[serde(default)]
    pub menvcfg: Option<IntValue>,
    #[serde(default)]
    pub henvcfg: Option<IntValue>,
    #[serde(default)]
    pub senvcfg: Option<IntValue>,
}

fn default_pass_value() -> IntValue {
    IntValue(0x1)
}

fn default_fail_value() -> IntValue {
    IntValue(0x3)
}

/// End-of-test protocol values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EotConfig {
    #[serde(default = "default_pass_value")]
    pub pass_value: IntValue,
    #[serde(default = "default_fail_value")]
    pub fail_value: IntValue,
    /// Pins the tohost word at this physical address.
    #[serde(default)]
    pub tohost: Option<IntValue>,
}

impl Default for EotConfig {
    fn default() -> Self {
        Self {
            pass_value: default_pass_value(),
            fail_value: default_fail_value(),
            tohost: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionConfig {
    pub name: String,
    pub address: IntValue,
    pub size: SizeValue,
    #[serde(default)]
    pub secure: bool,
}

impl RegionConfig {
    pub fn is_secure(&self) -> bool {
        self.secure || self.name.starts_with("secure")
    }

    /// Inclusive last address, `None` when the range wraps the address space.
    pub fn last_address(&self) -> Option<u64> {
        self.size
            .get()
            .checked_sub(1)
            .and_then(|span| self.address.get().checked_add(span))
    }
}

pub const DEFAULT_RAM_BASE: u64 = 0x8000_0000;
pub const DEFAULT_RAM_SIZE: u64 = 1 << 56;
pub const DEFAULT_IO_BASE: u64 = 0x0;
pub const DEFAULT_IO_SIZE: u64 = 0x8000_0000;

fn default_ram() -> Vec<RegionConfig> {
    vec![RegionConfig {
        name: "dram0".to_string(),
        address: IntValue(DEFAULT_RAM_BASE),
        size: SizeValue(DEFAULT_RAM_SIZE),
        secure: false,
    }]
}

fn default_io() -> Vec<RegionConfig> {
    vec![RegionConfig {
        name: "io0".to_string(),
        address: IntValue(DEFAULT_IO_BASE),
        size: SizeValue(DEFAULT_IO_SIZE),
        secure: false,
    }]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryMapConfig {
    #[serde(default = "default_ram")]
    pub ram: Vec<RegionConfig>,
    #[serde(default = "default_io")]
    pub io: Vec<RegionConfig>,
}

impl Default for MemoryMapConfig {
    fn default() -> Self {
        Self {
            ram: default_ram(),
            io: default_io(),
        }
    }
}

fn default_march() -> String {
    "rv64imafdcv_zfh_zba_zbb_zbc_zbs_zifencei_zicsr".to_string()
}

fn default_mabi() -> String {
    "lp64d".to_string()
}

fn default_build_timeout_ms() -> u64 {
    90_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolchainConfig {
    /// Falls back to `RV_GCC`, then `riscv64-unknown-elf-gcc` on `PATH`.
    #[serde(default)]
    pub compiler: Option<PathBuf>,
    /// Falls back to `RV_OBJDUMP`, then `riscv64-unknown-elf-objdump` on `PATH`.
    #[serde(default)]
    pub disassembler: Option<PathBuf>,
    #[serde(default = "default_march")]
    pub march: String,
    #[serde(default = "default_mabi")]
    pub mabi: String,
    #[serde(default)]
    pub compiler_opts: Vec<String>,
    #[serde(default = "default_build_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            compiler: None,
            disassembler: None,
            march: default_march(),
            mabi: default_mabi(),
            compiler_opts: Vec::new(),
            timeout_ms: default_build_timeout_ms(),
        }
    }
}

fn default_backend() -> Backend {
    Backend::Whisper
}

fn default_isa() -> String {
    "rv64imafdcvh_zicsr_zifencei".to_string()
}

fn default_max_instructions() -> u64 {
    2_000_000
}

fn default_memory_size() -> String {
    "0x10000000000000000".to_string()
}

fn default_sim_timeout_ms() -> u64 {
    60_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulatorConfig {
    #[serde(default = "default_backend")]
    pub backend: Backend,
    /// Falls back to `WHISPER_PATH` / `SPIKE_PATH`, then the backend name on `PATH`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Whisper JSON configuration file.
    #[serde(default)]
    pub config_file: Option<PathBuf>,
    #[serde(default = "default_isa")]
    pub isa: String,
    #[serde(default = "default_max_instructions")]
    pub max_instructions: u64,
    /// Passed through to the backend verbatim.
    #[serde(default = "default_memory_size")]
    pub memory_size: String,
    /// `file:start:end` memory-dump requests; addresses may use `@symbol+offset`.
    #[serde(default)]
    pub dumpmem: Vec<String>,
    #[serde(default = "default_sim_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
            args: Vec::new(),
            config_file: None,
            isa: default_isa(),
            max_instructions: default_max_instructions(),
            memory_size: default_memory_size(),
            dumpmem: Vec::new(),
            timeout_ms: default_sim_timeout_ms(),
        }
    }
}

/// The unresolved knob set as supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub inputs: TestInputs,
    #[serde(default)]
    pub env: EnvKnobs,
    #[serde(default)]
    pub mp: MpKnobs,
    #[serde(default)]
    pub generation: GenerationKnobs,
    #[serde(default)]
    pub csr: CsrKnobs,
    #[serde(default)]
    pub eot: EotConfig,
    #[serde(default)]
    pub memory: MemoryMapConfig,
    /// `NAME=VALUE` defines merged over the generated equates.
    #[serde(default)]
    pub test_equates: Vec<String>,
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            inputs: TestInputs::default(),
            env: EnvKnobs::default(),
            mp: MpKnobs::default(),
            generation: GenerationKnobs::default(),
            csr: CsrKnobs::default(),
            eot: EotConfig::default(),
            memory: MemoryMapConfig::default(),
            test_equates: Vec::new(),
            toolchain: ToolchainConfig::default(),
            simulator: SimulatorConfig::default(),
        }
    }
}

impl RawConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config at {:?}", path.as_ref()))?;
        Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config {:?}", path.as_ref()))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: RawConfig = serde_yaml::from_str(yaml)
            .context("Failed to parse config YAML (expected schema_version: \"1.0\")")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            bail!(
                "Unsupported schema_version '{}', expected '{}'",
                self.schema_version,
                SCHEMA_VERSION
            );
        }
        if self.mp.num_harts == 0 {
            bail!("mp.num_harts must be at least 1");
        }
        if self.generation.repeat_times == 0 {
            bail!("generation.repeat_times must be at least 1");
        }
        if self.memory.ram.is_empty() {
            bail!("memory.ram must declare at least one region");
        }
        for region in self.memory.ram.iter().chain(self.memory.io.iter()) {
            if region.size.get() == 0 {
                bail!("memory region '{}' has zero size", region.name);
            }
            if region.last_address().is_none() {
                bail!(
                    "memory region '{}' at {:#x} with size {:#x} overflows 64-bit address space",
                    region.name,
                    region.address.get(),
                    region.size.get()
                );
            }
        }
        let mut seen = std::collections::HashSet::new();
        for section in &self.generation.sections {
            if !is_identifier(&section.name) {
                bail!("section name '{}' is not a valid identifier", section.name);
            }
            if section.size.get() == 0 {
                bail!("section '{}' has zero size", section.name);
            }
            if !seen.insert(section.name.as_str()) {
                bail!("section '{}' declared twice", section.name);
            }
        }
        for define in &self.test_equates {
            parse_define(define)?;
        }
        for entry in &self.csr.init {
            CsrInit::parse(entry)?;
        }
        for entry in &self.csr.init_mask {
            CsrInit::parse_masked(entry)?;
        }
        if self.simulator.max_instructions == 0 {
            bail!("simulator.max_instructions must be greater than zero");
        }
        Ok(())
    }
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parses a caller define of the form `NAME=VALUE`.
pub fn parse_define(text: &str) -> Result<(String, u64)> {
    let (name, value) = text
        .split_once('=')
        .with_context(|| format!("Define '{}' must be NAME=VALUE", text))?;
    let name = name.trim();
    if !is_identifier(name) {
        bail!("Define name '{}' is not a valid identifier", name);
    }
    Ok((name.to_string(), parse_int(value)?))
}

/// Machine-mode and supervisor CSRs that may be initialized by name.
const CSR_NAMES: &[(&str, u16)] = &[
    ("fflags", 0x001),
    ("frm", 0x002),
    ("fcsr", 0x003),
    ("sstatus", 0x100),
    ("sie", 0x104),
    ("stvec", 0x105),
    ("scounteren", 0x106),
    ("senvcfg", 0x10a),
    ("sscratch", 0x140),
    ("sepc", 0x141),
    ("scause", 0x142),
    ("stval", 0x143),
    ("sip", 0x144),
    ("satp", 0x180),
    ("vsstatus", 0x200),
    ("vsie", 0x204),
    ("vstvec", 0x205),
    ("vsscratch", 0x240),
    ("vsepc", 0x241),
    ("vscause", 0x242),
    ("vstval", 0x243),
    ("vsip", 0x244),
    ("vsatp", 0x280),
    ("mstatus", 0x300),
    ("misa", 0x301),
    ("medeleg", 0x302),
    ("mideleg", 0x303),
    ("mie", 0x304),
    ("mtvec", 0x305),
    ("mcounteren", 0x306),
    ("menvcfg", 0x30a),
    ("mscratch", 0x340),
    ("mepc", 0x341),
    ("mcause", 0x342),
    ("mtval", 0x343),
    ("mip", 0x344),
    ("pmpcfg0", 0x3a0),
    ("pmpaddr0", 0x3b0),
    ("hstatus", 0x600),
    ("hedeleg", 0x602),
    ("hideleg", 0x603),
    ("hie", 0x604),
    ("hcounteren", 0x606),
    ("henvcfg", 0x60a),
    ("htval", 0x643),
    ("hip", 0x644),
    ("hgatp", 0x680),
    ("mcycle", 0xb00),
    ("minstret", 0xb02),
    ("cycle", 0xc00),
    ("time", 0xc01),
    ("instret", 0xc02),
    ("mhartid", 0xf14),
];

pub fn csr_address(name: &str) -> Option<u16> {
    let lowered = name.trim().to_ascii_lowercase();
    CSR_NAMES
        .iter()
        .find(|(n, _)| *n == lowered)
        .map(|(_, addr)| *addr)
}

pub fn csr_name(address: u16) -> Option<&'static str> {
    CSR_NAMES
        .iter()
        .find(|(_, a)| *a == address)
        .map(|(n, _)| *n)
}

/// One CSR initial-state entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CsrInit {
    pub address: u16,
    pub value: u64,
    /// When set only these bits of the CSR are replaced.
    pub mask: Option<u64>,
}

impl CsrInit {
    /// Parses `name=value`.
    pub fn parse(text: &str) -> Result<Self> {
        let (csr, value) = text
            .split_once('=')
            .with_context(|| format!("CSR init '{}' must be name=value", text))?;
        Ok(Self {
            address: parse_csr(csr)?,
            value: parse_int(value)?,
            mask: None,
        })
    }

    /// Parses `name=mask=value`.
    pub fn parse_masked(text: &str) -> Result<Self> {
        let mut parts = text.splitn(3, '=');
        let (Some(csr), Some(mask), Some(value)) = (parts.next(), parts.next(), parts.next())
        else {
            bail!("CSR init mask '{}' must be name=mask=value", text);
        };
        Ok(Self {
            address: parse_csr(csr)?,
            value: parse_int(value)?,
            mask: Some(parse_int(mask)?),
        })
    }
}

fn parse_csr(text: &str) -> Result<u16> {
    if let Some(address) = csr_address(text) {
        return Ok(address);
    }
    let numeric = parse_int(text).with_context(|| format!("Unknown CSR '{}'", text.trim()))?;
    if numeric > 0xfff {
        bail!("CSR address {:#x} out of range", numeric);
    }
    Ok(numeric as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = RawConfig::from_yaml("schema_version: \"1.0\"\n").unwrap();
        assert_eq!(config.mp.num_harts, 1);
        assert_eq!(config.eot.pass_value.get(), 0x1);
        assert_eq!(config.eot.fail_value.get(), 0x3);
        assert_eq!(config.env.priv_mode, Choice::Random);
        assert_eq!(config.env.secure_mode, Choice::Fixed(SecureMode::Off));
        assert_eq!(config.memory.ram[0].address.get(), DEFAULT_RAM_BASE);
        assert_eq!(config.simulator.backend, Backend::Whisper);
    }

    #[test]
    fn test_choice_parsing() {
        let yaml = r#"
schema_version: "1.0"
env:
  priv_mode: super
  paging_mode: any
  secure_mode: "on"
  deleg_excp_to: random
mp:
  num_harts: 4
  mp_mode: round_robin
"#;
        let config = RawConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.env.priv_mode, Choice::Fixed(PrivMode::Super));
        assert_eq!(config.env.paging_mode, Choice::Random);
        assert_eq!(config.env.secure_mode, Choice::Fixed(SecureMode::On));
        assert_eq!(config.env.deleg_excp_to, Choice::Random);
        assert_eq!(config.mp.mp_mode, Choice::Fixed(SchedulingMode::RoundRobin));
    }

    #[test]
    fn test_unknown_knob_value_rejected() {
        let yaml = "schema_version: \"1.0\"\nenv:\n  paging_mode: sv32\n";
        let err = RawConfig::from_yaml(yaml).unwrap_err();
        assert!(format!("{:#}", err).contains("unknown PagingMode"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = "schema_version: \"1.0\"\nbogus: 1\n";
        assert!(RawConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_invalid_version() {
        let err = RawConfig::from_yaml("schema_version: \"2.0\"\n").unwrap_err();
        assert!(err.to_string().contains("Unsupported schema_version"));
    }

    #[test]
    fn test_memory_map_values() {
        let yaml = r#"
schema_version: "1.0"
memory:
  ram:
    - { name: dram0, address: 0x8000_0000, size: "0x1000_0000" }
    - { name: secure_dram, address: "0x9000_0000", size: "16 MiB" }
  io:
    - { name: uart, address: 0x1000_0000, size: 4096 }
eot:
  tohost: "0x1000_0000"
  pass_value: 0xACED
"#;
        let config = RawConfig::from_yaml(yaml).unwrap();
        let ram = &config.memory.ram;
        assert_eq!(ram[0].address.get(), 0x8000_0000);
        assert_eq!(ram[0].size.get(), 0x1000_0000);
        assert!(!ram[0].is_secure());
        assert!(ram[1].is_secure());
        assert_eq!(ram[1].size.get(), 16 * 1024 * 1024);
        assert_eq!(config.memory.io[0].size.get(), 4096);
        assert_eq!(config.eot.tohost, Some(IntValue(0x1000_0000)));
        assert_eq!(config.eot.pass_value.get(), 0xACED);
    }

    #[test]
    fn test_region_overflow_rejected() {
        let yaml = r#"
schema_version: "1.0"
memory:
  ram:
    - { name: dram0, address: 0xffff_ffff_ffff_f000, size: 0x2000 }
"#;
        let err = RawConfig::from_yaml(yaml).unwrap_err();
        assert!(format!("{:#}", err).contains("overflows"));
    }

    #[test]
    fn test_zero_harts_rejected() {
        let yaml = "schema_version: \"1.0\"\nmp:\n  num_harts: 0\n";
        assert!(RawConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_parse_int_forms() {
        assert_eq!(parse_int("0x10").unwrap(), 16);
        assert_eq!(parse_int("0X8000_0000").unwrap(), 0x8000_0000);
        assert_eq!(parse_int("0b101").unwrap(), 5);
        assert_eq!(parse_int(" 42 ").unwrap(), 42);
        assert!(parse_int("zz").is_err());
    }

    #[test]
    fn test_parse_define() {
        assert_eq!(
            parse_define("MY_VALUE=0x20").unwrap(),
            ("MY_VALUE".to_string(), 0x20)
        );
        assert!(parse_define("1BAD=3").is_err());
        assert!(parse_define("NOVALUE").is_err());
    }

    #[test]
    fn test_csr_init_parsing() {
        let plain = CsrInit::parse("mstatus=0x8").unwrap();
        assert_eq!(plain.address, 0x300);
        assert_eq!(plain.value, 0x8);
        assert_eq!(plain.mask, None);

        let masked = CsrInit::parse_masked("mscratch=0xff=0x12").unwrap();
        assert_eq!(masked.address, 0x340);
        assert_eq!(masked.mask, Some(0xff));
        assert_eq!(masked.value, 0x12);

        let numeric = CsrInit::parse("0x7c0=1").unwrap();
        assert_eq!(numeric.address, 0x7c0);

        assert!(CsrInit::parse("notacsr=1").is_err());
        assert!(CsrInit::parse("0x1000=1").is_err());
        assert!(CsrInit::parse_masked("mstatus=1").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "schema_version: \"1.0\"").unwrap();
        writeln!(file, "inputs:\n  template: base.S").unwrap();
        let config = RawConfig::from_file(file.path()).unwrap();
        assert_eq!(config.inputs.template.as_deref(), Some("base.S"));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = RawConfig::from_file("/nonexistent/rivet.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}
