//! Record layouts and the generic-template table.
//!
//! The [`StructRegistry`] is the single source of truth for record
//! shapes: field order, indices, byte offsets and the total size used by
//! `sizeof`. Layout is deliberately unpadded; the emitted IR delegates
//! real layout to the backend and the sums only feed `sizeof`.
//!
//! Generic record declarations are not layouts yet: they are stored in
//! the [`GenericTable`] as templates and instantiated by the type mapper
//! the first time a concrete `Name<Args>` appears in a type position.

use crate::types::Ty;
use anyhow::Result;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct FieldLayout {
    pub name: String,
    /// Surface spelling, e.g. `number` or `Point`.
    pub surface: String,
    /// IR type, e.g. `i32` or `%Point*`.
    pub ir_type: String,
    pub index: usize,
    pub offset: usize,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub struct RecordLayout {
    pub name: String,
    pub fields: Vec<FieldLayout>,
    pub total_size: usize,
    /// `%Name*`
    pub ptr_type: String,
    /// `{ i32, %Point* }`
    pub body_type: String,
}

#[derive(Debug, Default)]
pub struct StructRegistry {
    records: HashMap<String, RecordLayout>,
    /// Registration order, for deterministic topological emission.
    order: Vec<String>,
}

impl StructRegistry {
    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Registers a record layout. Fields arrive as
    /// `(name, surface type, ir type)` in declaration order.
    pub fn register(&mut self, name: &str, fields: Vec<(String, String, String)>) -> Result<()> {
        if self.records.contains_key(name) {
            anyhow::bail!("record '{}' is already defined", name);
        }
        let mut seen = HashSet::new();
        let mut laid_out = Vec::with_capacity(fields.len());
        let mut offset = 0usize;
        for (index, (fname, surface, ir_type)) in fields.into_iter().enumerate() {
            if !seen.insert(fname.clone()) {
                anyhow::bail!("record '{}' declares field '{}' twice", name, fname);
            }
            let size = field_size(&ir_type);
            laid_out.push(FieldLayout {
                name: fname,
                surface,
                ir_type,
                index,
                offset,
                size,
            });
            offset += size;
        }
        let body = if laid_out.is_empty() {
            "{ }".to_string()
        } else {
            let tys: Vec<&str> = laid_out.iter().map(|f| f.ir_type.as_str()).collect();
            format!("{{ {} }}", tys.join(", "))
        };
        self.records.insert(
            name.to_string(),
            RecordLayout {
                name: name.to_string(),
                fields: laid_out,
                total_size: offset,
                ptr_type: format!("%{}*", name),
                body_type: body,
            },
        );
        self.order.push(name.to_string());
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&RecordLayout> {
        self.records
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("unknown record type '{}'", name))
    }

    pub fn lookup_field(&self, record: &str, field: &str) -> Result<&FieldLayout> {
        let layout = self.lookup(record)?;
        layout
            .fields
            .iter()
            .find(|f| f.name == field)
            .ok_or_else(|| anyhow::anyhow!("record '{}' has no field '{}'", record, field))
    }

    /// Byte size of an IR type as used by `sizeof`. Pointers are 8 bytes;
    /// a bare record name resolves to that record's total size.
    pub fn type_size(&self, ir: &str) -> Result<usize> {
        if ir.ends_with('*') {
            return Ok(8);
        }
        Ok(match ir {
            "i1" | "i8" => 1,
            "i16" => 2,
            "i32" | "float" => 4,
            "i64" | "double" => 8,
            "void" => 0,
            _ if ir.starts_with('%') => self.lookup(&ir[1..])?.total_size,
            _ => anyhow::bail!("cannot size IR type '{}'", ir),
        })
    }

    /// Records ordered so that every record appears after the records its
    /// fields reference. A revisit during traversal is a reference cycle
    /// and fails the compilation.
    pub fn topo_order(&self) -> Result<Vec<&RecordLayout>> {
        let mut done: HashSet<&str> = HashSet::new();
        let mut visiting: HashSet<&str> = HashSet::new();
        let mut out = Vec::with_capacity(self.order.len());
        for name in &self.order {
            self.visit(name, &mut done, &mut visiting, &mut out)?;
        }
        Ok(out)
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        done: &mut HashSet<&'a str>,
        visiting: &mut HashSet<&'a str>,
        out: &mut Vec<&'a RecordLayout>,
    ) -> Result<()> {
        if done.contains(name) {
            return Ok(());
        }
        if !visiting.insert(name) {
            anyhow::bail!("record dependency cycle involving '{}'", name);
        }
        let layout = self.lookup(name)?;
        for field in &layout.fields {
            if let Some(dep) = referenced_record(&field.ir_type)
                && self.records.contains_key(dep)
            {
                self.visit(dep, done, visiting, out)?;
            }
        }
        visiting.remove(name);
        done.insert(name);
        out.push(layout);
        Ok(())
    }
}

// All fields that reference a record do so by pointer, but the pointee
// still has to be defined earlier in the module text.
fn referenced_record(ir: &str) -> Option<&str> {
    let stripped = ir.trim_end_matches('*');
    stripped.strip_prefix('%')
}

// Per-field sizes for the unpadded layout sum.
fn field_size(ir: &str) -> usize {
    if ir.ends_with('*') {
        return 8;
    }
    match ir {
        "i1" | "i8" => 1,
        "i16" => 2,
        "i32" | "float" => 4,
        _ => 8,
    }
}

/// An uninstantiated generic record: type-parameter names plus fields
/// whose surface types may reference those parameters.
#[derive(Debug, Clone)]
pub struct GenericTemplate {
    pub params: Vec<String>,
    pub fields: Vec<(String, Ty)>,
}

#[derive(Debug, Default)]
pub struct GenericTable {
    templates: HashMap<String, GenericTemplate>,
}

impl GenericTable {
    pub fn define(&mut self, name: &str, params: Vec<String>, fields: Vec<(String, Ty)>) -> Result<()> {
        if self.templates.contains_key(name) {
            anyhow::bail!("generic record '{}' is already defined", name);
        }
        self.templates
            .insert(name.to_string(), GenericTemplate { params, fields });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&GenericTemplate> {
        self.templates.get(name)
    }
}
