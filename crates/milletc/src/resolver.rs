//! Module discovery and compilation ordering.
//!
//! Starting from the entry file, the resolver loads the transitive
//! closure of relative imports (`./x`, `../x`), records each module's
//! import bindings and export set, and yields modules in depth-first
//! post-order so every module is walked after its dependencies. Bare
//! specifiers are treated as external and ignored. A module re-entered
//! while still on the visiting stack is an import cycle and fails the
//! compilation.

use crate::parser::{self, ParsedModule};
use anyhow::{Context, Result};
use deno_ast::swc::ast;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// One named import: `import { exported as local } from "./module"`.
#[derive(Debug, Clone)]
pub struct ImportBinding {
    pub local: String,
    pub exported: String,
    /// Short name of the source module, used for mangled lookups.
    pub module_name: String,
    pub module_path: PathBuf,
}

/// A loaded module awaiting the walk.
pub struct ModuleUnit {
    pub path: PathBuf,
    /// Basename without extension, sanitized to IR-identifier characters.
    pub name: String,
    pub parsed: ParsedModule,
    pub imports: Vec<ImportBinding>,
    pub exports: HashSet<String>,
    pub deps: Vec<String>,
}

#[derive(Default)]
pub struct ModuleResolver {
    resolved: HashSet<PathBuf>,
    visiting: HashSet<PathBuf>,
    order: Vec<ModuleUnit>,
}

impl ModuleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `entry` and everything it transitively imports, returning
    /// modules leaves-first.
    pub fn resolve(mut self, entry: &Path) -> Result<Vec<ModuleUnit>> {
        let entry_abs = resolve_source_path(entry)
            .with_context(|| format!("module not found: '{}'", entry.display()))?;
        self.visit(&entry_abs)?;
        self.validate()?;
        Ok(self.order)
    }

    fn visit(&mut self, path: &Path) -> Result<()> {
        if self.resolved.contains(path) {
            return Ok(());
        }
        if !self.visiting.insert(path.to_path_buf()) {
            anyhow::bail!(
                "circular dependency detected involving module '{}'",
                module_name_of(path)
            );
        }

        let source = std::fs::read_to_string(path)
            .with_context(|| format!("module not found: '{}'", path.display()))?;
        let parsed = parser::parse_millet_module(&source, path.to_str())?;
        let (imports, exports) = extract_bindings(&parsed, path)?;

        let mut deps = Vec::new();
        for binding in &imports {
            if !deps.contains(&binding.module_name) {
                deps.push(binding.module_name.clone());
            }
        }
        let dep_paths: Vec<PathBuf> = {
            let mut seen = HashSet::new();
            imports
                .iter()
                .filter(|b| seen.insert(b.module_path.clone()))
                .map(|b| b.module_path.clone())
                .collect()
        };
        for dep in &dep_paths {
            self.visit(dep)?;
        }

        self.visiting.remove(path);
        self.resolved.insert(path.to_path_buf());
        self.order.push(ModuleUnit {
            path: path.to_path_buf(),
            name: module_name_of(path),
            parsed,
            imports,
            exports,
            deps,
        });
        Ok(())
    }

    // Post-resolution checks that need the whole graph: import bindings
    // must name real exports, and no two files may share a short module
    // name (their functions would mangle identically).
    fn validate(&self) -> Result<()> {
        let mut names: HashMap<&str, &Path> = HashMap::new();
        for unit in &self.order {
            if let Some(prev) = names.insert(unit.name.as_str(), unit.path.as_path()) {
                anyhow::bail!(
                    "two modules share the name '{}': '{}' and '{}'",
                    unit.name,
                    prev.display(),
                    unit.path.display()
                );
            }
        }
        let by_path: HashMap<&Path, &ModuleUnit> = self
            .order
            .iter()
            .map(|u| (u.path.as_path(), u))
            .collect();
        for unit in &self.order {
            for binding in &unit.imports {
                let source = by_path
                    .get(binding.module_path.as_path())
                    .ok_or_else(|| {
                        anyhow::anyhow!("imported module '{}' was not loaded", binding.module_name)
                    })?;
                if !source.exports.contains(&binding.exported) {
                    anyhow::bail!(
                        "module '{}' has no export named '{}' (imported by '{}')",
                        binding.module_name,
                        binding.exported,
                        unit.name
                    );
                }
            }
        }
        Ok(())
    }
}

fn extract_bindings(
    parsed: &ParsedModule,
    path: &Path,
) -> Result<(Vec<ImportBinding>, HashSet<String>)> {
    let mut imports = Vec::new();
    let mut exports = HashSet::new();
    for item in parsed.parsed.program_ref().body() {
        let deno_ast::ModuleItemRef::ModuleDecl(decl) = item else {
            continue;
        };
        match decl {
            ast::ModuleDecl::Import(import_decl) => {
                let specifier = import_decl.src.value.to_string();
                if !specifier.starts_with("./") && !specifier.starts_with("../") {
                    continue; // external specifier
                }
                let base = path.parent().unwrap_or_else(|| Path::new("."));
                let target = resolve_source_path(&base.join(&specifier)).with_context(|| {
                    format!(
                        "module not found: '{}' imported from '{}'",
                        specifier,
                        path.display()
                    )
                })?;
                for binding in &import_decl.specifiers {
                    match binding {
                        ast::ImportSpecifier::Named(named) => {
                            let local = named.local.sym.to_string();
                            let exported = match &named.imported {
                                Some(ast::ModuleExportName::Ident(id)) => id.sym.to_string(),
                                Some(ast::ModuleExportName::Str(s)) => s.value.to_string(),
                                None => local.clone(),
                            };
                            imports.push(ImportBinding {
                                local,
                                exported,
                                module_name: module_name_of(&target),
                                module_path: target.clone(),
                            });
                        }
                        _ => anyhow::bail!(
                            "only named imports are supported (module '{}')",
                            module_name_of(path)
                        ),
                    }
                }
            }
            ast::ModuleDecl::ExportDecl(export_decl) => match &export_decl.decl {
                ast::Decl::Fn(f) => {
                    exports.insert(f.ident.sym.to_string());
                }
                ast::Decl::TsInterface(i) => {
                    exports.insert(i.id.sym.to_string());
                }
                _ => {}
            },
            ast::ModuleDecl::ExportNamed(named) => {
                if named.src.is_some() {
                    anyhow::bail!("re-exports are not supported");
                }
                for specifier in &named.specifiers {
                    let ast::ExportSpecifier::Named(n) = specifier else {
                        anyhow::bail!("unsupported export specifier");
                    };
                    if n.exported.is_some() {
                        anyhow::bail!("export aliases are not supported");
                    }
                    if let ast::ModuleExportName::Ident(id) = &n.orig {
                        exports.insert(id.sym.to_string());
                    }
                }
            }
            _ => {}
        }
    }
    Ok((imports, exports))
}

// Appends the source extension when the path has none, then
// canonicalizes. Fails when the file does not exist.
fn resolve_source_path(path: &Path) -> Result<PathBuf> {
    let candidate = if path.extension().is_none() {
        path.with_extension("ts")
    } else {
        path.to_path_buf()
    };
    Ok(std::fs::canonicalize(&candidate)?)
}

/// Basename without extension, mapped onto IR-identifier characters.
pub fn module_name_of(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("module");
    let mut name: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_names_are_ir_safe() {
        assert_eq!(module_name_of(Path::new("/a/b/math.ts")), "math");
        assert_eq!(module_name_of(Path::new("/a/b/my-lib.ts")), "my_lib");
        assert_eq!(module_name_of(Path::new("/a/1st.ts")), "_1st");
    }
}
