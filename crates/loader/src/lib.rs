// Rivet - RISC-V Directed Test Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{anyhow, bail, Context, Result};
use goblin::elf::program_header::PT_LOAD;
use goblin::elf::Elf;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSegment {
    pub paddr: u64,
    pub vaddr: u64,
    pub file_size: u64,
    pub mem_size: u64,
}

/// What the pipeline needs to know about a linked test executable.
#[derive(Debug, Clone)]
pub struct ElfImage {
    pub entry: u64,
    pub segments: Vec<LoadSegment>,
    symbols: BTreeMap<String, u64>,
}

impl ElfImage {
    pub fn symbol(&self, name: &str) -> Option<u64> {
        self.symbols.get(name).copied()
    }

    pub fn symbols(&self) -> impl Iterator<Item = (&str, u64)> {
        self.symbols.iter().map(|(name, addr)| (name.as_str(), *addr))
    }
}

pub fn inspect_elf(path: &Path) -> Result<ElfImage> {
    let buffer = fs::read(path).with_context(|| format!("Failed to read ELF file: {:?}", path))?;
    inspect_elf_bytes(&buffer)
}

/// Parses a RISC-V executable, rejecting other machines and truncated segments.
pub fn inspect_elf_bytes(buffer: &[u8]) -> Result<ElfImage> {
    let elf = Elf::parse(buffer).context("Failed to parse ELF binary")?;

    if elf.header.e_machine != goblin::elf::header::EM_RISCV {
        bail!(
            "ELF machine type {} is not RISC-V",
            elf.header.e_machine
        );
    }

    if elf.header.e_type != goblin::elf::header::ET_EXEC {
        bail!(
            "ELF type {} is not a statically linked executable",
            goblin::elf::header::et_to_str(elf.header.e_type)
        );
    }

    info!("ELF Entry Point: {:#x}", elf.entry);

    let mut segments = Vec::new();
    for ph in &elf.program_headers {
        if ph.p_type != PT_LOAD || ph.p_memsz == 0 {
            continue;
        }
        let end = ph
            .p_offset
            .checked_add(ph.p_filesz)
            .ok_or_else(|| anyhow!("Segment size overflows in ELF file"))?;
        if end > buffer.len() as u64 {
            return Err(anyhow!("Segment out of bounds in ELF file"));
        }
        debug!(
            "Found Loadable Segment: Addr={:#x}, Size={} bytes, Offset={:#x}",
            ph.p_paddr, ph.p_filesz, ph.p_offset
        );
        segments.push(LoadSegment {
            paddr: ph.p_paddr,
            vaddr: ph.p_vaddr,
            file_size: ph.p_filesz,
            mem_size: ph.p_memsz,
        });
    }

    if segments.is_empty() {
        warn!("No loadable segments found in ELF file");
    }

    let mut symbols = BTreeMap::new();
    for sym in elf.syms.iter() {
        if let Some(name) = elf.strtab.get_at(sym.st_name) {
            if !name.is_empty() {
                symbols.insert(name.to_string(), sym.st_value);
            }
        }
    }
    debug!("Collected {} symbols", symbols.len());

    Ok(ElfImage {
        entry: elf.entry,
        segments,
        symbols,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EM_RISCV: u16 = 243;

    fn elf_header(machine: u16, with_segment: bool) -> Vec<u8> {
        let mut bytes = vec![0x7f, b'E', b'L', b'F', 2, 1, 1, 0];
        bytes.resize(16, 0);
        bytes.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        bytes.extend_from_slice(&machine.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&0x8000_0000u64.to_le_bytes());
        let phoff: u64 = if with_segment { 64 } else { 0 };
        bytes.extend_from_slice(&phoff.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes()); // e_shoff
        bytes.extend_from_slice(&0u32.to_le_bytes()); // e_flags
        bytes.extend_from_slice(&64u16.to_le_bytes());
        bytes.extend_from_slice(&56u16.to_le_bytes());
        bytes.extend_from_slice(&(with_segment as u16).to_le_bytes());
        bytes.extend_from_slice(&64u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        if with_segment {
            bytes.extend_from_slice(&1u32.to_le_bytes()); // PT_LOAD
            bytes.extend_from_slice(&5u32.to_le_bytes()); // R+X
            bytes.extend_from_slice(&0u64.to_le_bytes());
            bytes.extend_from_slice(&0x8000_0000u64.to_le_bytes());
            bytes.extend_from_slice(&0x8000_0000u64.to_le_bytes());
            bytes.extend_from_slice(&120u64.to_le_bytes());
            bytes.extend_from_slice(&0x1000u64.to_le_bytes());
            bytes.extend_from_slice(&0x1000u64.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_riscv_header_accepted() {
        let image = inspect_elf_bytes(&elf_header(EM_RISCV, true)).unwrap();
        assert_eq!(image.entry, 0x8000_0000);
        assert_eq!(image.segments.len(), 1);
        assert_eq!(image.segments[0].paddr, 0x8000_0000);
        assert_eq!(image.segments[0].mem_size, 0x1000);
        assert_eq!(image.symbol("tohost"), None);
    }

    #[test]
    fn test_header_without_segments_is_accepted() {
        let image = inspect_elf_bytes(&elf_header(EM_RISCV, false)).unwrap();
        assert!(image.segments.is_empty());
    }

    #[test]
    fn test_other_machine_rejected() {
        let err = inspect_elf_bytes(&elf_header(40, false)).unwrap_err();
        assert!(err.to_string().contains("not RISC-V"));
    }

    #[test]
    fn test_relocatable_object_rejected() {
        let mut bytes = elf_header(EM_RISCV, false);
        bytes[16..18].copy_from_slice(&1u16.to_le_bytes()); // ET_REL
        let err = inspect_elf_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("not a statically linked executable"));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(inspect_elf_bytes(b"not an elf at all").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = inspect_elf(Path::new("/nonexistent/test.elf")).unwrap_err();
        assert!(err.to_string().contains("Failed to read ELF file"));
    }
}
