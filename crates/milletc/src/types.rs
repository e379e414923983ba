//! Surface types and their mapping onto IR types.
//!
//! The surface language has a closed set of leaf types plus array,
//! record and generic-record references. [`Ty`] is the parsed form;
//! [`ir_type`] resolves it to IR text, monomorphizing generic records on
//! first sight. Mangled names for instantiations are stable within a
//! compilation: `Box<number>` is always `Box_i32`.

use crate::structs::{GenericTable, StructRegistry};
use anyhow::Result;
use deno_ast::swc::ast;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ty {
    I32,
    I64,
    F32,
    F64,
    Bool,
    Str,
    Void,
    Array(Box<Ty>),
    Record(String),
    Generic(String, Vec<Ty>),
}

impl Ty {
    /// Maps a swc type annotation to a surface type.
    pub fn from_ts(ty: &ast::TsType) -> Result<Ty> {
        match ty {
            ast::TsType::TsKeywordType(keyword) => match keyword.kind {
                ast::TsKeywordTypeKind::TsNumberKeyword => Ok(Ty::I32),
                ast::TsKeywordTypeKind::TsBooleanKeyword => Ok(Ty::Bool),
                ast::TsKeywordTypeKind::TsStringKeyword => Ok(Ty::Str),
                ast::TsKeywordTypeKind::TsVoidKeyword => Ok(Ty::Void),
                _ => anyhow::bail!("unsupported keyword type"),
            },
            ast::TsType::TsTypeRef(type_ref) => {
                let name = type_ref
                    .type_name
                    .as_ident()
                    .map(|id| id.sym.to_string())
                    .ok_or_else(|| anyhow::anyhow!("unsupported qualified type name"))?;
                if let Some(inst) = &type_ref.type_params {
                    let mut args = Vec::with_capacity(inst.params.len());
                    for p in &inst.params {
                        args.push(Ty::from_ts(p)?);
                    }
                    return Ok(Ty::Generic(name, args));
                }
                Ok(match name.as_str() {
                    "i32" => Ty::I32,
                    "i64" => Ty::I64,
                    "f32" => Ty::F32,
                    "f64" => Ty::F64,
                    _ => Ty::Record(name),
                })
            }
            ast::TsType::TsArrayType(arr) => {
                Ok(Ty::Array(Box::new(Ty::from_ts(&arr.elem_type)?)))
            }
            _ => anyhow::bail!("unsupported type annotation"),
        }
    }

    /// Mangled spelling used inside instantiated record names. Leaves use
    /// their IR spelling, so `Pair<i32, f64>` becomes `Pair_i32_double`.
    pub fn mangle(&self) -> String {
        match self {
            Ty::I32 => "i32".to_string(),
            Ty::I64 => "i64".to_string(),
            Ty::F32 => "float".to_string(),
            Ty::F64 => "double".to_string(),
            Ty::Bool => "i1".to_string(),
            Ty::Str => "str".to_string(),
            Ty::Void => "void".to_string(),
            Ty::Array(elem) => format!("{}_arr", elem.mangle()),
            Ty::Record(name) => name.clone(),
            Ty::Generic(name, args) => {
                let mut out = name.clone();
                for a in args {
                    out.push('_');
                    out.push_str(&a.mangle());
                }
                out
            }
        }
    }

    /// Replaces type-parameter references per `map`, recursively.
    pub fn substituted(&self, map: &HashMap<&str, &Ty>) -> Ty {
        match self {
            Ty::Record(name) => match map.get(name.as_str()) {
                Some(arg) => (*arg).clone(),
                None => self.clone(),
            },
            Ty::Array(elem) => Ty::Array(Box::new(elem.substituted(map))),
            Ty::Generic(name, args) => Ty::Generic(
                name.clone(),
                args.iter().map(|a| a.substituted(map)).collect(),
            ),
            _ => self.clone(),
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::I32 => write!(f, "number"),
            Ty::I64 => write!(f, "i64"),
            Ty::F32 => write!(f, "f32"),
            Ty::F64 => write!(f, "f64"),
            Ty::Bool => write!(f, "boolean"),
            Ty::Str => write!(f, "string"),
            Ty::Void => write!(f, "void"),
            Ty::Array(elem) => write!(f, "{}[]", elem),
            Ty::Record(name) => write!(f, "{}", name),
            Ty::Generic(name, args) => {
                write!(f, "{}<", name)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ">")
            }
        }
    }
}

/// Resolves a surface type to IR text, instantiating generic records as
/// a side effect. Records always map to a pointer.
pub fn ir_type(ty: &Ty, generics: &GenericTable, structs: &mut StructRegistry) -> Result<String> {
    Ok(match ty {
        Ty::I32 => "i32".to_string(),
        Ty::I64 => "i64".to_string(),
        Ty::F32 => "float".to_string(),
        Ty::F64 => "double".to_string(),
        Ty::Bool => "i1".to_string(),
        Ty::Str => "i8*".to_string(),
        Ty::Void => "void".to_string(),
        Ty::Array(elem) => format!("{}*", ir_type(elem, generics, structs)?),
        Ty::Record(name) => format!("%{}*", name),
        Ty::Generic(name, args) => {
            let mangled = instantiate(name, args, generics, structs)?;
            format!("%{}*", mangled)
        }
    })
}

/// Registers the monomorphized layout for `name<args>` if it is not
/// already known, and returns the mangled record name. Argument types are
/// resolved before the enclosing instantiation, so nested instantiations
/// land in the registry in dependency order.
pub fn instantiate(
    name: &str,
    args: &[Ty],
    generics: &GenericTable,
    structs: &mut StructRegistry,
) -> Result<String> {
    let mangled = Ty::Generic(name.to_string(), args.to_vec()).mangle();
    if structs.contains(&mangled) {
        return Ok(mangled);
    }
    let template = generics
        .get(name)
        .ok_or_else(|| anyhow::anyhow!("unknown generic record '{}'", name))?;
    if template.params.len() != args.len() {
        anyhow::bail!(
            "expected {} type arguments for record '{}', got {}",
            template.params.len(),
            name,
            args.len()
        );
    }
    let map: HashMap<&str, &Ty> = template
        .params
        .iter()
        .map(|p| p.as_str())
        .zip(args.iter())
        .collect();
    let mut fields = Vec::with_capacity(template.fields.len());
    for (fname, fty) in &template.fields {
        let concrete = fty.substituted(&map);
        let ir = ir_type(&concrete, generics, structs)?;
        fields.push((fname.clone(), concrete.to_string(), ir));
    }
    structs.register(&mangled, fields)?;
    Ok(mangled)
}

pub fn is_float_type(ir: &str) -> bool {
    ir == "float" || ir == "double"
}

/// Maps an arithmetic operator to the IR instruction for `ir`. Integer
/// division and remainder are signed.
pub fn binary_op(op: ast::BinaryOp, ir: &str) -> Result<&'static str> {
    let float = is_float_type(ir);
    Ok(match op {
        ast::BinaryOp::Add => {
            if float {
                "fadd"
            } else {
                "add"
            }
        }
        ast::BinaryOp::Sub => {
            if float {
                "fsub"
            } else {
                "sub"
            }
        }
        ast::BinaryOp::Mul => {
            if float {
                "fmul"
            } else {
                "mul"
            }
        }
        ast::BinaryOp::Div => {
            if float {
                "fdiv"
            } else {
                "sdiv"
            }
        }
        ast::BinaryOp::Mod => {
            if float {
                "frem"
            } else {
                "srem"
            }
        }
        _ => anyhow::bail!("unsupported binary operator"),
    })
}

/// Maps a comparison operator to an `(instruction, predicate)` pair.
/// Strict and loose equality are treated as equivalent; float compares
/// use the ordered predicates.
pub fn compare_op(op: ast::BinaryOp, ir: &str) -> Result<(&'static str, &'static str)> {
    let float = is_float_type(ir);
    let instr = if float { "fcmp" } else { "icmp" };
    let pred = match op {
        ast::BinaryOp::Lt => {
            if float {
                "olt"
            } else {
                "slt"
            }
        }
        ast::BinaryOp::Gt => {
            if float {
                "ogt"
            } else {
                "sgt"
            }
        }
        ast::BinaryOp::LtEq => {
            if float {
                "ole"
            } else {
                "sle"
            }
        }
        ast::BinaryOp::GtEq => {
            if float {
                "oge"
            } else {
                "sge"
            }
        }
        ast::BinaryOp::EqEq | ast::BinaryOp::EqEqEq => {
            if float {
                "oeq"
            } else {
                "eq"
            }
        }
        ast::BinaryOp::NotEq | ast::BinaryOp::NotEqEq => {
            if float {
                "one"
            } else {
                "ne"
            }
        }
        _ => anyhow::bail!("unsupported comparison operator"),
    };
    Ok((instr, pred))
}
