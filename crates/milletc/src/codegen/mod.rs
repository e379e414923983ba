//! AST lowering.
//!
//! A [`Walker`] is constructed per module and bound to the shared
//! [`Compilation`] handle that owns the emitter and the extern, function
//! and struct registries. Lowering runs three ordered passes over the
//! module's top level:
//!
//! 1. records — interface declarations become struct layouts (generic
//!    interfaces become templates awaiting instantiation),
//! 2. externs — bodyless `declare function`s become C signatures,
//! 3. bodies — function signatures are registered, then every body is
//!    lowered to IR.
//!
//! Statement lowering lives in `stmt`, expression lowering in `expr`.

use crate::emit::Emitter;
use crate::resolver::ImportBinding;
use crate::scope::SymbolTable;
use crate::structs::{GenericTable, StructRegistry};
use crate::types::{self, Ty};
use anyhow::Result;
use deno_ast::ParsedSource;
use deno_ast::swc::ast;
use std::collections::HashMap;

pub mod expr;
pub mod stmt;

/// A C function declared without a body.
#[derive(Debug, Clone)]
pub struct ExternFn {
    pub name: String,
    pub ret: String,
    pub params: Vec<ParamInfo>,
    pub variadic: bool,
}

#[derive(Debug, Default)]
pub struct ExternTable {
    map: HashMap<String, ExternFn>,
}

impl ExternTable {
    /// First declaration wins; redeclaring an extern is harmless.
    pub fn insert(&mut self, f: ExternFn) {
        self.map.entry(f.name.clone()).or_insert(f);
    }

    pub fn get(&self, name: &str) -> Option<&ExternFn> {
        self.map.get(name)
    }
}

#[derive(Debug, Clone)]
pub struct ParamInfo {
    pub name: String,
    pub ir: String,
}

/// A user function under its mangled public name.
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub mangled: String,
    pub ret: String,
    pub params: Vec<ParamInfo>,
}

#[derive(Debug, Default)]
pub struct FunctionTable {
    by_mangled: HashMap<String, FunctionInfo>,
    /// record name -> method name -> mangled function name
    methods: HashMap<String, HashMap<String, String>>,
}

impl FunctionTable {
    pub fn insert(&mut self, info: FunctionInfo) -> Result<()> {
        if self.by_mangled.contains_key(&info.mangled) {
            anyhow::bail!("function '{}' is defined twice", info.mangled);
        }
        self.by_mangled.insert(info.mangled.clone(), info);
        Ok(())
    }

    pub fn get(&self, mangled: &str) -> Option<&FunctionInfo> {
        self.by_mangled.get(mangled)
    }

    pub fn insert_method(&mut self, record: &str, method: &str, mangled: &str) {
        self.methods
            .entry(record.to_string())
            .or_default()
            .insert(method.to_string(), mangled.to_string());
    }

    pub fn method(&self, record: &str, method: &str) -> Option<&str> {
        self.methods
            .get(record)
            .and_then(|m| m.get(method))
            .map(|s| s.as_str())
    }
}

/// Shared state for one compiler run: the IR buffer plus every registry
/// the walkers mutate. Created once and threaded through all modules.
pub struct Compilation {
    pub emitter: Emitter,
    pub structs: StructRegistry,
    pub generics: GenericTable,
    pub externs: ExternTable,
    pub functions: FunctionTable,
}

impl Compilation {
    pub fn new(module_id: &str, target_triple: &str) -> Self {
        Self {
            emitter: Emitter::new(module_id, target_triple),
            structs: StructRegistry::default(),
            generics: GenericTable::default(),
            externs: ExternTable::default(),
            functions: FunctionTable::default(),
        }
    }

    /// Resolves a surface type to IR, monomorphizing generics on demand.
    pub fn ir_type(&mut self, ty: &Ty) -> Result<String> {
        types::ir_type(ty, &self.generics, &mut self.structs)
    }

    /// Hands every registered record to the emitter in dependency order.
    /// The emitter skips names it has already seen, so flushing after
    /// each pass is safe and late generic instantiations still land in
    /// the output.
    pub fn flush_struct_types(&mut self) -> Result<()> {
        let Compilation {
            structs, emitter, ..
        } = self;
        for layout in structs.topo_order()? {
            emitter.add_struct_type(&layout.name, &layout.body_type);
        }
        Ok(())
    }
}

/// A lowered expression: the operand text (register or literal) plus its
/// IR type. Conditions coerce on the type, never on the spelling.
#[derive(Debug, Clone)]
pub struct IrValue {
    pub text: String,
    pub ty: String,
}

impl IrValue {
    pub fn new(text: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ty: ty.into(),
        }
    }
}

/// Branch targets for `break`/`continue` inside the innermost loop.
#[derive(Debug, Clone)]
pub struct LoopContext {
    pub break_label: String,
    pub continue_label: String,
}

/// Lowers one module against the shared registries.
pub struct Walker<'a> {
    pub(crate) comp: &'a mut Compilation,
    pub(crate) module_name: String,
    parsed: &'a ParsedSource,
    imports: HashMap<String, ImportBinding>,
    pub(crate) scopes: SymbolTable,
    /// Local function name -> mangled name, for in-module calls.
    pub(crate) local_functions: HashMap<String, String>,
    pub(crate) loop_stack: Vec<LoopContext>,
    /// IR return type of the function currently being lowered.
    pub(crate) current_ret: String,
}

impl<'a> Walker<'a> {
    pub fn new(
        comp: &'a mut Compilation,
        module_name: &str,
        parsed: &'a ParsedSource,
        imports: &[ImportBinding],
    ) -> Self {
        Self {
            comp,
            module_name: module_name.to_string(),
            parsed,
            imports: imports
                .iter()
                .map(|b| (b.local.clone(), b.clone()))
                .collect(),
            scopes: SymbolTable::new(),
            local_functions: HashMap::new(),
            loop_stack: Vec::new(),
            current_ret: "void".to_string(),
        }
    }

    /// Runs the three passes for this module.
    pub fn run(&mut self) -> Result<()> {
        self.check_supported()?;
        self.register_records()?;
        self.comp.flush_struct_types()?;
        self.register_externs()?;
        self.lower_bodies()?;
        // generic records instantiated inside bodies
        self.comp.flush_struct_types()?;
        Ok(())
    }

    pub(crate) fn import_binding(&self, local: &str) -> Option<&ImportBinding> {
        self.imports.get(local)
    }

    // Everything at the top level must be a function or an interface.
    fn check_supported(&self) -> Result<()> {
        for decl in module_decls(self.parsed) {
            match decl {
                ast::Decl::Fn(_) | ast::Decl::TsInterface(_) => {}
                ast::Decl::Var(_) => {
                    anyhow::bail!("module-level variables are not supported")
                }
                ast::Decl::Class(c) => anyhow::bail!(
                    "class '{}' is not supported; use an interface and `this`-taking functions",
                    c.ident.sym
                ),
                _ => anyhow::bail!("unsupported top-level declaration"),
            }
        }
        Ok(())
    }

    // -- pass 1: records ---------------------------------------------------

    fn register_records(&mut self) -> Result<()> {
        let parsed = self.parsed;
        for decl in module_decls(parsed) {
            let ast::Decl::TsInterface(iface) = decl else {
                continue;
            };
            let name = iface.id.sym.to_string();
            if !iface.extends.is_empty() {
                anyhow::bail!("record '{}' uses inheritance, which is not supported", name);
            }
            let fields = interface_fields(iface)?;
            if let Some(tp) = &iface.type_params {
                let params: Vec<String> =
                    tp.params.iter().map(|p| p.name.sym.to_string()).collect();
                self.comp.generics.define(&name, params, fields)?;
                continue;
            }
            let mut resolved = Vec::with_capacity(fields.len());
            for (fname, fty) in fields {
                let ir = self.comp.ir_type(&fty)?;
                resolved.push((fname, fty.to_string(), ir));
            }
            self.comp.structs.register(&name, resolved)?;
        }
        Ok(())
    }

    // -- pass 2: externs ---------------------------------------------------

    /// Registers every bodyless function declaration. Public because the
    /// prelude descriptor runs through this pass alone.
    pub fn register_externs(&mut self) -> Result<()> {
        let parsed = self.parsed;
        for decl in module_decls(parsed) {
            let ast::Decl::Fn(f) = decl else { continue };
            if f.function.body.is_some() {
                continue;
            }
            let name = f.ident.sym.to_string();
            let mut params = Vec::new();
            let mut variadic = false;
            for param in &f.function.params {
                match &param.pat {
                    ast::Pat::Ident(binding) => {
                        let ty = annotated_ty(&binding.type_ann)?.unwrap_or(Ty::I32);
                        params.push(ParamInfo {
                            name: binding.id.sym.to_string(),
                            ir: self.comp.ir_type(&ty)?,
                        });
                    }
                    // a trailing rest parameter marks the signature variadic
                    ast::Pat::Rest(_) => variadic = true,
                    _ => anyhow::bail!("unsupported parameter pattern in extern '{}'", name),
                }
            }
            let ret = match &f.function.return_type {
                Some(ann) => self.comp.ir_type(&Ty::from_ts(&ann.type_ann)?)?,
                None => anyhow::bail!("extern function '{}' requires a return type", name),
            };
            let param_irs: Vec<String> = params.iter().map(|p| p.ir.clone()).collect();
            self.comp
                .emitter
                .add_extern_function(&name, &ret, &param_irs, variadic);
            self.comp.externs.insert(ExternFn {
                name,
                ret,
                params,
                variadic,
            });
        }
        Ok(())
    }

    // -- pass 3: bodies ----------------------------------------------------

    fn lower_bodies(&mut self) -> Result<()> {
        let parsed = self.parsed;
        // signatures first so forward references and mutual recursion
        // inside one module resolve
        for decl in module_decls(parsed) {
            let ast::Decl::Fn(f) = decl else { continue };
            if f.function.body.is_none() {
                continue;
            }
            let (local, record, info) = self.signature_of(f)?;
            self.local_functions
                .insert(local.clone(), info.mangled.clone());
            if let Some(record) = record {
                self.comp
                    .functions
                    .insert_method(&record, &local, &info.mangled);
            }
            self.comp.functions.insert(info)?;
        }
        for decl in module_decls(parsed) {
            let ast::Decl::Fn(f) = decl else { continue };
            if f.function.body.is_some() {
                self.lower_function(f)?;
            }
        }
        Ok(())
    }

    /// Computes the mangled name and IR signature of a function. A first
    /// parameter named `this` makes the function a method of its record.
    fn signature_of(&mut self, f: &ast::FnDecl) -> Result<(String, Option<String>, FunctionInfo)> {
        let local = f.ident.sym.to_string();
        if f.function.is_async || f.function.is_generator {
            anyhow::bail!("function '{}': async and generator functions are not supported", local);
        }
        let mut params = Vec::new();
        let mut record = None;
        for (i, param) in f.function.params.iter().enumerate() {
            let ast::Pat::Ident(binding) = &param.pat else {
                anyhow::bail!("unsupported parameter pattern in function '{}'", local);
            };
            let pname = binding.id.sym.to_string();
            let ty = annotated_ty(&binding.type_ann)?.unwrap_or(Ty::I32);
            if i == 0 && pname == "this" {
                let Ty::Record(rec) = &ty else {
                    anyhow::bail!("`this` parameter of '{}' must name a record type", local);
                };
                record = Some(rec.clone());
            }
            params.push(ParamInfo {
                name: pname,
                ir: self.comp.ir_type(&ty)?,
            });
        }
        let ret = match &f.function.return_type {
            Some(ann) => self.comp.ir_type(&Ty::from_ts(&ann.type_ann)?)?,
            // return-type fallback: a value-returning body means i32
            None => {
                let returns_value = f
                    .function
                    .body
                    .as_ref()
                    .is_some_and(|b| body_returns_value(&b.stmts));
                if returns_value { "i32".into() } else { "void".into() }
            }
        };
        let mangled = if local == "main" {
            "main".to_string()
        } else if let Some(rec) = &record {
            format!("{}_{}", rec, local)
        } else {
            format!("{}_{}", self.module_name, local)
        };
        Ok((
            local,
            record,
            FunctionInfo {
                mangled,
                ret,
                params,
            },
        ))
    }

    fn lower_function(&mut self, f: &ast::FnDecl) -> Result<()> {
        let local = f.ident.sym.to_string();
        let mangled = self.local_functions[&local].clone();
        let info = self
            .comp
            .functions
            .get(&mangled)
            .cloned()
            .expect("signature registered before lowering");

        self.scopes.reset();
        self.loop_stack.clear();
        self.current_ret = info.ret.clone();

        let sig: Vec<(String, String)> = info
            .params
            .iter()
            .map(|p| (p.ir.clone(), format!("%{}.param", p.name)))
            .collect();
        self.comp.emitter.begin_function(&info.mangled, &info.ret, &sig);
        self.comp.emitter.label("entry");
        // every parameter gets a stack slot; the incoming value is
        // stored into it so the body can address parameters uniformly
        for p in &info.params {
            let slot = self.scopes.declare(&p.name, &p.ir);
            self.comp.emitter.alloca(&slot.register, &p.ir);
            self.comp
                .emitter
                .store(&p.ir, &format!("%{}.param", p.name), &slot.register);
        }

        if let Some(body) = &f.function.body {
            self.lower_stmts(&body.stmts)?;
        }

        if !self.comp.emitter.block_terminated {
            if info.ret == "void" {
                self.comp.emitter.ret(None);
            } else {
                self.comp.emitter.unreachable();
            }
        }
        self.comp.emitter.end_function();
        Ok(())
    }
}

// Top-level declarations, whether exported or not.
fn module_decls(parsed: &ParsedSource) -> Vec<&ast::Decl> {
    let mut out = Vec::new();
    for item in parsed.program_ref().body() {
        match item {
            deno_ast::ModuleItemRef::Stmt(ast::Stmt::Decl(d)) => out.push(d),
            deno_ast::ModuleItemRef::ModuleDecl(ast::ModuleDecl::ExportDecl(e)) => {
                out.push(&e.decl)
            }
            _ => {}
        }
    }
    out
}

fn interface_fields(iface: &ast::TsInterfaceDecl) -> Result<Vec<(String, Ty)>> {
    let mut fields = Vec::new();
    for member in &iface.body.body {
        let ast::TsTypeElement::TsPropertySignature(prop) = member else {
            anyhow::bail!(
                "record '{}' has an unsupported member; only typed fields are allowed",
                iface.id.sym
            );
        };
        let ast::Expr::Ident(key) = &*prop.key else {
            anyhow::bail!("record '{}' has a non-identifier field key", iface.id.sym);
        };
        if prop.optional {
            anyhow::bail!(
                "record '{}': optional field '{}' is not supported",
                iface.id.sym,
                key.sym
            );
        }
        let ann = prop.type_ann.as_ref().ok_or_else(|| {
            anyhow::anyhow!("record '{}': field '{}' needs a type", iface.id.sym, key.sym)
        })?;
        fields.push((key.sym.to_string(), Ty::from_ts(&ann.type_ann)?));
    }
    Ok(fields)
}

fn annotated_ty(ann: &Option<Box<ast::TsTypeAnn>>) -> Result<Option<Ty>> {
    match ann {
        Some(ann) => Ok(Some(Ty::from_ts(&ann.type_ann)?)),
        None => Ok(None),
    }
}

// Conservative scan used by the return-type fallback.
fn body_returns_value(stmts: &[ast::Stmt]) -> bool {
    stmts.iter().any(stmt_returns_value)
}

fn stmt_returns_value(stmt: &ast::Stmt) -> bool {
    match stmt {
        ast::Stmt::Return(r) => r.arg.is_some(),
        ast::Stmt::Block(b) => body_returns_value(&b.stmts),
        ast::Stmt::If(i) => {
            stmt_returns_value(&i.cons) || i.alt.as_deref().is_some_and(stmt_returns_value)
        }
        ast::Stmt::While(w) => stmt_returns_value(&w.body),
        ast::Stmt::For(f) => stmt_returns_value(&f.body),
        _ => false,
    }
}
