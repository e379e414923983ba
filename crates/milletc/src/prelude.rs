//! The standard-library prelude.
//!
//! A descriptor file of `declare function` externs (`printf`, `malloc`,
//! `free`, …) processed through the normal externs pass before any user
//! module, so every module sees the same C surface. The built-in
//! descriptor is embedded in the binary; `CompileOptions::prelude` can
//! point at a replacement on disk.

use crate::parser::{self, ParsedModule};
use anyhow::{Context, Result};

pub const DEFAULT_PRELUDE: &str = include_str!("prelude.ts");

/// Parses the prelude descriptor: `path` overrides the embedded one.
pub fn load(path: Option<&str>) -> Result<ParsedModule> {
    match path {
        Some(p) => {
            let source = std::fs::read_to_string(p)
                .with_context(|| format!("prelude not found: '{}'", p))?;
            parser::parse_millet_module(&source, Some(p))
        }
        None => parser::parse_millet_module(DEFAULT_PRELUDE, None),
    }
}
