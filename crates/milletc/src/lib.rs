//! millet compiler library.
//!
//! Translates a strict, statically typed subset of TypeScript into an
//! LLVM textual IR module. The pipeline is a single pass over the
//! resolver's leaves-first module order, with one [`codegen::Walker`]
//! per module bound to the shared [`codegen::Compilation`] registries:
//!
//! 1. resolve the import graph from the entry file (cycles rejected),
//! 2. load the prelude's extern declarations,
//! 3. walk each module: records, externs, then function bodies,
//! 4. serialize the emitter's buffers into one IR text module.
//!
//! The CLI driver (`mill`) handles file output, the native backend and
//! process spawning; this crate returns the IR as a `String`.

pub mod codegen;
pub mod diagnostics;
pub mod emit;
pub mod parser;
pub mod prelude;
pub mod resolver;
pub mod scope;
pub mod structs;
pub mod types;

use anyhow::Result;
use std::path::Path;

pub const DEFAULT_TARGET_TRIPLE: &str = "arm64-apple-macosx";

/// Compiler configuration, separate from CLI argument parsing.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Path to the entry source file.
    pub entry: String,
    /// Target triple written into the module header.
    pub target_triple: Option<String>,
    /// Optional replacement for the built-in prelude descriptor.
    pub prelude: Option<String>,
}

impl CompileOptions {
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            target_triple: None,
            prelude: None,
        }
    }
}

/// Compiles the entry module and everything it imports into one IR text
/// module.
pub fn compile(options: &CompileOptions) -> Result<String> {
    let entry = Path::new(&options.entry);
    let modules = resolver::ModuleResolver::new().resolve(entry)?;

    let module_id = resolver::module_name_of(entry);
    let triple = options
        .target_triple
        .as_deref()
        .unwrap_or(DEFAULT_TARGET_TRIPLE);
    let mut comp = codegen::Compilation::new(&module_id, triple);

    let prelude_mod = prelude::load(options.prelude.as_deref())?;
    codegen::Walker::new(&mut comp, "prelude", &prelude_mod.parsed, &[]).register_externs()?;

    for module in &modules {
        codegen::Walker::new(&mut comp, &module.name, &module.parsed.parsed, &module.imports)
            .run()?;
    }

    Ok(comp.emitter.get_output())
}

/// Compiles a single in-memory module (no imports), mainly for tests and
/// tooling. The module is named `main`.
pub fn compile_source(source: &str) -> Result<String> {
    let parsed = parser::parse_millet_module(source, None)?;
    let mut comp = codegen::Compilation::new("main", DEFAULT_TARGET_TRIPLE);
    let prelude_mod = prelude::load(None)?;
    codegen::Walker::new(&mut comp, "prelude", &prelude_mod.parsed, &[]).register_externs()?;
    codegen::Walker::new(&mut comp, "main", &parsed.parsed, &[]).run()?;
    Ok(comp.emitter.get_output())
}
