// Rivet - RISC-V Directed Test Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Named integer constants emitted as `.equ NAME, VALUE` directives.

use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

static EQUATE_LINE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Radix {
    Decimal,
    Hex,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Equate {
    pub name: String,
    pub value: u64,
    pub radix: Radix,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EquateParseError {
    #[error("malformed equate on line {line}: {text}")]
    Malformed { line: usize, text: String },
    #[error("equate value out of range on line {line}: {text}")]
    OutOfRange { line: usize, text: String },
    #[error("invalid equate pattern: {0}")]
    Pattern(String),
}

/// Name-unique table that remembers insertion order for rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EquateTable {
    entries: Vec<Equate>,
    index: HashMap<String, usize>,
}

impl EquateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `name`, returning the previous value.
    /// A replaced entry keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, value: u64, radix: Radix) -> Option<u64> {
        let name = name.into();
        if let Some(&slot) = self.index.get(&name) {
            let entry = &mut self.entries[slot];
            let previous = entry.value;
            entry.value = value;
            entry.radix = radix;
            return Some(previous);
        }
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push(Equate { name, value, radix });
        None
    }

    pub fn insert_hex(&mut self, name: impl Into<String>, value: u64) -> Option<u64> {
        self.insert(name, value, Radix::Hex)
    }

    pub fn insert_dec(&mut self, name: impl Into<String>, value: u64) -> Option<u64> {
        self.insert(name, value, Radix::Decimal)
    }

    /// Appends every entry of `other`; later values win on collision.
    pub fn extend(&mut self, other: &EquateTable) {
        for equate in other.iter() {
            self.insert(equate.name.clone(), equate.value, equate.radix);
        }
    }

    /// Applies caller defines over the current contents.
    pub fn apply_overrides(&mut self, defines: &[(String, u64)]) {
        for (name, value) in defines {
            if let Some(previous) = self.insert_hex(name.clone(), *value) {
                tracing::debug!(
                    "Caller define {} overrides generated value {:#x} with {:#x}",
                    name,
                    previous,
                    value
                );
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.index.get(name).map(|&slot| self.entries[slot].value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Equate> {
        self.entries.iter()
    }

    pub fn to_map(&self) -> BTreeMap<String, u64> {
        self.entries
            .iter()
            .map(|e| (e.name.clone(), e.value))
            .collect()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for equate in &self.entries {
            match equate.radix {
                Radix::Decimal => {
                    out.push_str(&format!(".equ {}, {}\n", equate.name, equate.value))
                }
                Radix::Hex => out.push_str(&format!(".equ {}, {:#x}\n", equate.name, equate.value)),
            }
        }
        out
    }

    /// Parses `.equ` lines, ignoring comments and other directives.
    pub fn parse(text: &str) -> Result<Self, EquateParseError> {
        let pattern = EQUATE_LINE
            .get_or_init(|| Regex::new(r"^\.equ\s+([a-zA-Z_0-9]+)\s*,\s*([0-9xa-f]+)\s*$"))
            .as_ref()
            .map_err(|e| EquateParseError::Pattern(e.to_string()))?;

        let mut table = EquateTable::new();
        for (number, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if !line.starts_with(".equ") {
                continue;
            }
            let caps = pattern
                .captures(line)
                .ok_or_else(|| EquateParseError::Malformed {
                    line: number + 1,
                    text: line.to_string(),
                })?;
            let name = &caps[1];
            let value_text = &caps[2];
            let (value, radix) = match value_text.strip_prefix("0x") {
                Some(hex) => (u64::from_str_radix(hex, 16), Radix::Hex),
                None => (value_text.parse::<u64>(), Radix::Decimal),
            };
            let value = value.map_err(|_| EquateParseError::OutOfRange {
                line: number + 1,
                text: line.to_string(),
            })?;
            table.insert(name, value, radix);
        }
        Ok(table)
    }
}
