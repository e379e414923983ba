//! Expression lowering.
//!
//! Every expression lowers to an [`IrValue`] carrying its operand text
//! and IR type. L-values go through `field_address`/`element_address`,
//! which return a pointer plus the pointee type; reads load through that
//! pointer, writes store through it. Calls resolve an identifier callee
//! against the import map, then the module's own functions, then the
//! extern table; `obj.m(args)` is uniform-call syntax for the statically
//! resolved `Record_m(obj, args)`.

use super::{ExternFn, FunctionInfo, IrValue, Walker, stmt::needs_heap_cast};
use crate::types::{self, Ty};
use anyhow::Result;
use deno_ast::swc::ast;

impl<'a> Walker<'a> {
    pub(crate) fn lower_expr(&mut self, e: &ast::Expr) -> Result<IrValue> {
        self.lower_expr_expecting(e, None)
    }

    /// Lowers `e`. `expected` is a typing hint consumed by numeric
    /// literals so `f64`/`i64` contexts materialize constants of the
    /// right width; it never coerces register values.
    pub(crate) fn lower_expr_expecting(
        &mut self,
        e: &ast::Expr,
        expected: Option<&str>,
    ) -> Result<IrValue> {
        match e {
            ast::Expr::Lit(lit) => self.lower_lit(lit, expected),
            ast::Expr::Ident(id) => self.load_variable(&id.sym),
            ast::Expr::This(_) => self.load_variable("this"),
            ast::Expr::Paren(p) => self.lower_expr_expecting(&p.expr, expected),
            ast::Expr::Unary(u) => self.lower_unary(u),
            ast::Expr::Bin(b) => self.lower_binary(b),
            ast::Expr::Assign(a) => self.lower_assign(a),
            ast::Expr::Member(m) => self.lower_member_read(m),
            ast::Expr::Call(c) => self.lower_call(c),
            _ => anyhow::bail!("unsupported expression kind"),
        }
    }

    /// Produces the `i1` for a branch condition. Comparison results pass
    /// through; any other value is tested against zero.
    pub(crate) fn lower_condition(&mut self, e: &ast::Expr) -> Result<String> {
        let value = self.lower_expr(e)?;
        if value.ty == "i1" {
            return Ok(value.text);
        }
        let t = self.scopes.fresh_temp();
        if types::is_float_type(&value.ty) {
            self.comp
                .emitter
                .compare(&t, "fcmp", "one", &value.ty, &value.text, "0.0");
        } else {
            self.comp
                .emitter
                .compare(&t, "icmp", "ne", &value.ty, &value.text, "0");
        }
        Ok(t)
    }

    fn lower_lit(&mut self, lit: &ast::Lit, expected: Option<&str>) -> Result<IrValue> {
        match lit {
            ast::Lit::Num(n) => Ok(number_value(n.value, expected)),
            ast::Lit::Str(s) => {
                let text = s.value.to_string();
                let (global, len) = self.comp.emitter.add_string_constant(&text);
                let t = self.scopes.fresh_temp();
                self.comp.emitter.gep_string(&t, len, &global);
                Ok(IrValue::new(t, "i8*"))
            }
            ast::Lit::Bool(b) => Ok(IrValue::new(if b.value { "1" } else { "0" }, "i1")),
            _ => anyhow::bail!("unsupported literal"),
        }
    }

    fn load_variable(&mut self, name: &str) -> Result<IrValue> {
        let slot = self
            .scopes
            .lookup(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unresolved identifier '{}'", name))?;
        let t = self.scopes.fresh_temp();
        self.comp.emitter.load(&t, &slot.ir_type, &slot.register);
        Ok(IrValue::new(t, slot.ir_type))
    }

    fn lower_unary(&mut self, u: &ast::UnaryExpr) -> Result<IrValue> {
        match u.op {
            ast::UnaryOp::Minus => {
                let value = self.lower_expr(&u.arg)?;
                let t = self.scopes.fresh_temp();
                if types::is_float_type(&value.ty) {
                    self.comp.emitter.fneg(&t, &value.ty, &value.text);
                } else {
                    self.comp
                        .emitter
                        .binary(&t, "sub", &value.ty, "0", &value.text);
                }
                Ok(IrValue::new(t, value.ty))
            }
            ast::UnaryOp::Bang => {
                let value = self.lower_expr(&u.arg)?;
                let t = self.scopes.fresh_temp();
                self.comp
                    .emitter
                    .compare(&t, "icmp", "eq", &value.ty, &value.text, "0");
                Ok(IrValue::new(t, "i1"))
            }
            _ => anyhow::bail!("unsupported unary operator"),
        }
    }

    fn lower_binary(&mut self, b: &ast::BinExpr) -> Result<IrValue> {
        use ast::BinaryOp::*;
        match b.op {
            Add | Sub | Mul | Div | Mod => {
                let lhs = self.lower_expr(&b.left)?;
                let rhs = self.lower_expr_expecting(&b.right, Some(&lhs.ty))?;
                let instr = types::binary_op(b.op, &lhs.ty)?;
                let t = self.scopes.fresh_temp();
                self.comp
                    .emitter
                    .binary(&t, instr, &lhs.ty, &lhs.text, &rhs.text);
                Ok(IrValue::new(t, lhs.ty))
            }
            Lt | LtEq | Gt | GtEq | EqEq | EqEqEq | NotEq | NotEqEq => {
                let lhs = self.lower_expr(&b.left)?;
                let rhs = self.lower_expr_expecting(&b.right, Some(&lhs.ty))?;
                let (instr, pred) = types::compare_op(b.op, &lhs.ty)?;
                let t = self.scopes.fresh_temp();
                self.comp
                    .emitter
                    .compare(&t, instr, pred, &lhs.ty, &lhs.text, &rhs.text);
                Ok(IrValue::new(t, "i1"))
            }
            _ => anyhow::bail!("unsupported binary operator"),
        }
    }

    fn lower_assign(&mut self, a: &ast::AssignExpr) -> Result<IrValue> {
        if !matches!(a.op, ast::AssignOp::Assign) {
            anyhow::bail!("compound assignment is not supported");
        }
        let ast::AssignTarget::Simple(simple) = &a.left else {
            anyhow::bail!("assignment target must be a variable, array element, or property path");
        };
        match simple {
            ast::SimpleAssignTarget::Ident(binding) => {
                let name = binding.id.sym.to_string();
                let slot = self
                    .scopes
                    .lookup(&name)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("unresolved identifier '{}'", name))?;
                let mut value = self.lower_expr_expecting(&a.right, Some(&slot.ir_type))?;
                if needs_heap_cast(&slot.ir_type, &value.ty) {
                    let cast = self.scopes.fresh_temp();
                    self.comp
                        .emitter
                        .bitcast(&cast, "i8*", &value.text, &slot.ir_type);
                    value = IrValue::new(cast, slot.ir_type.clone());
                }
                self.comp
                    .emitter
                    .store(&slot.ir_type, &value.text, &slot.register);
                Ok(value)
            }
            ast::SimpleAssignTarget::Member(m) => match &m.prop {
                ast::MemberProp::Computed(c) => {
                    let (addr, elem_ty) = self.element_address(m, c)?;
                    let value = self.lower_expr_expecting(&a.right, Some(&elem_ty))?;
                    self.comp.emitter.store(&elem_ty, &value.text, &addr);
                    Ok(value)
                }
                ast::MemberProp::Ident(_) => {
                    let (addr, field_ty) = self.field_address(m)?;
                    let mut value = self.lower_expr_expecting(&a.right, Some(&field_ty))?;
                    if needs_heap_cast(&field_ty, &value.ty) {
                        let cast = self.scopes.fresh_temp();
                        self.comp
                            .emitter
                            .bitcast(&cast, "i8*", &value.text, &field_ty);
                        value = IrValue::new(cast, field_ty.clone());
                    }
                    self.comp.emitter.store(&field_ty, &value.text, &addr);
                    Ok(value)
                }
                _ => anyhow::bail!(
                    "assignment target must be a variable, array element, or property path"
                ),
            },
            _ => anyhow::bail!(
                "assignment target must be a variable, array element, or property path"
            ),
        }
    }

    fn lower_member_read(&mut self, m: &ast::MemberExpr) -> Result<IrValue> {
        match &m.prop {
            ast::MemberProp::Computed(c) => {
                let (addr, elem_ty) = self.element_address(m, c)?;
                let t = self.scopes.fresh_temp();
                self.comp.emitter.load(&t, &elem_ty, &addr);
                Ok(IrValue::new(t, elem_ty))
            }
            ast::MemberProp::Ident(_) => {
                let (addr, field_ty) = self.field_address(m)?;
                let t = self.scopes.fresh_temp();
                self.comp.emitter.load(&t, &field_ty, &addr);
                Ok(IrValue::new(t, field_ty))
            }
            _ => anyhow::bail!("unsupported member access"),
        }
    }

    /// L-value of `obj.field`: lowers the parent to a record pointer,
    /// then indexes into its layout. Returns the field pointer and the
    /// field's IR type. Nested paths recurse naturally because reading
    /// the parent member loads the inner record pointer.
    fn field_address(&mut self, m: &ast::MemberExpr) -> Result<(String, String)> {
        let ast::MemberProp::Ident(prop) = &m.prop else {
            anyhow::bail!("unsupported member access");
        };
        let field = prop.sym.to_string();
        let parent = self.lower_expr(&m.obj)?;
        let record = record_name(&parent.ty)
            .ok_or_else(|| anyhow::anyhow!("property access on a non-record value"))?;
        let layout = self.comp.structs.lookup_field(&record, &field)?;
        let (index, field_ty) = (layout.index, layout.ir_type.clone());
        let t = self.scopes.fresh_temp();
        self.comp.emitter.gep_struct(&t, &record, &parent.text, index);
        Ok((t, field_ty))
    }

    /// L-value of `arr[i]`: the base pointer comes from the lowered
    /// array expression, the element type from stripping one `*`.
    fn element_address(
        &mut self,
        m: &ast::MemberExpr,
        c: &ast::ComputedPropName,
    ) -> Result<(String, String)> {
        let base = self.lower_expr(&m.obj)?;
        if !base.ty.ends_with('*') || base.ty.starts_with('%') {
            anyhow::bail!("indexing a non-array value of type '{}'", base.ty);
        }
        let elem_ty = base.ty[..base.ty.len() - 1].to_string();
        let index = self.lower_expr(&c.expr)?;
        let t = self.scopes.fresh_temp();
        self.comp
            .emitter
            .gep_element(&t, &elem_ty, &base.text, &index.text);
        Ok((t, elem_ty))
    }

    // -- calls -------------------------------------------------------------

    fn lower_call(&mut self, c: &ast::CallExpr) -> Result<IrValue> {
        let ast::Callee::Expr(callee) = &c.callee else {
            anyhow::bail!("unsupported call target");
        };
        match &**callee {
            ast::Expr::Ident(id) => {
                let name = id.sym.to_string();
                if name == "sizeof" {
                    return self.lower_sizeof(c);
                }
                self.lower_direct_call(&name, c)
            }
            ast::Expr::Member(m) => self.lower_method_call(m, c),
            _ => anyhow::bail!("unsupported call target"),
        }
    }

    // `sizeof<T>()` folds to the record's total byte size.
    fn lower_sizeof(&mut self, c: &ast::CallExpr) -> Result<IrValue> {
        let type_args = c
            .type_args
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("sizeof requires a type argument, e.g. sizeof<Point>()"))?;
        let first = type_args
            .params
            .first()
            .ok_or_else(|| anyhow::anyhow!("sizeof requires a type argument"))?;
        let ty = Ty::from_ts(first)?;
        if !matches!(ty, Ty::Record(_) | Ty::Generic(..)) {
            anyhow::bail!("sizeof expects a record type, got '{}'", ty);
        }
        let ir = self.comp.ir_type(&ty)?;
        let record = record_name(&ir).expect("record types map to %Name*");
        let total = self
            .comp
            .structs
            .lookup(&record)
            .map_err(|_| anyhow::anyhow!("sizeof of unregistered type '{}'", record))?
            .total_size;
        Ok(IrValue::new(total.to_string(), "i32"))
    }

    // Identifier callees resolve against imports, then module-local
    // functions, then externs. Anything else is a hard error.
    fn lower_direct_call(&mut self, name: &str, c: &ast::CallExpr) -> Result<IrValue> {
        if let Some(binding) = self.import_binding(name).cloned() {
            let mangled = format!("{}_{}", binding.module_name, binding.exported);
            let info = self.comp.functions.get(&mangled).cloned().ok_or_else(|| {
                anyhow::anyhow!("imported name '{}' does not resolve to a function", name)
            })?;
            return self.emit_user_call(&info, &c.args, None);
        }
        if let Some(mangled) = self.local_functions.get(name).cloned() {
            let info = self
                .comp
                .functions
                .get(&mangled)
                .cloned()
                .expect("local function registered");
            return self.emit_user_call(&info, &c.args, None);
        }
        if let Some(ext) = self.comp.externs.get(name).cloned() {
            return self.emit_extern_call(&ext, &c.args);
        }
        anyhow::bail!("unknown function '{}'", name)
    }

    // Uniform call: `obj.m(args)` dispatches statically through the
    // per-record method table with the receiver as first argument.
    fn lower_method_call(&mut self, m: &ast::MemberExpr, c: &ast::CallExpr) -> Result<IrValue> {
        let ast::MemberProp::Ident(prop) = &m.prop else {
            anyhow::bail!("unsupported call target");
        };
        let method = prop.sym.to_string();
        let receiver = self.lower_expr(&m.obj)?;
        let record = record_name(&receiver.ty)
            .ok_or_else(|| anyhow::anyhow!("method call on a non-record value"))?;
        let mangled = self
            .comp
            .functions
            .method(&record, &method)
            .map(str::to_string)
            .ok_or_else(|| {
                anyhow::anyhow!("unknown method '{}' on record '{}'", method, record)
            })?;
        let info = self
            .comp
            .functions
            .get(&mangled)
            .cloned()
            .expect("method registered in function table");
        self.emit_user_call(&info, &c.args, Some(receiver))
    }

    fn emit_user_call(
        &mut self,
        info: &FunctionInfo,
        args: &[ast::ExprOrSpread],
        receiver: Option<IrValue>,
    ) -> Result<IrValue> {
        let implicit = usize::from(receiver.is_some());
        if args.len() + implicit != info.params.len() {
            anyhow::bail!(
                "function '{}' expects {} arguments, got {}",
                info.mangled,
                info.params.len() - implicit,
                args.len()
            );
        }
        let mut lowered = Vec::with_capacity(info.params.len());
        if let Some(receiver) = receiver {
            lowered.push((info.params[0].ir.clone(), receiver.text));
        }
        for (i, arg) in args.iter().enumerate() {
            if arg.spread.is_some() {
                anyhow::bail!("spread arguments are not supported");
            }
            let expected = info.params[i + implicit].ir.clone();
            let value = self.lower_expr_expecting(&arg.expr, Some(&expected))?;
            lowered.push((expected, value.text));
        }
        let dest = if info.ret == "void" {
            None
        } else {
            Some(self.scopes.fresh_temp())
        };
        self.comp
            .emitter
            .call(dest.as_deref(), &info.ret, &info.mangled, &lowered);
        Ok(match dest {
            Some(t) => IrValue::new(t, info.ret.clone()),
            None => IrValue::new("", "void"),
        })
    }

    fn emit_extern_call(&mut self, ext: &ExternFn, args: &[ast::ExprOrSpread]) -> Result<IrValue> {
        if args.len() < ext.params.len() || (!ext.variadic && args.len() > ext.params.len()) {
            anyhow::bail!(
                "extern '{}' expects {} arguments, got {}",
                ext.name,
                ext.params.len(),
                args.len()
            );
        }
        let mut lowered = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            if arg.spread.is_some() {
                anyhow::bail!("spread arguments are not supported");
            }
            // past the declared arity only variadic tails remain: they
            // default to i32, or i8* for string literals
            let expected = match ext.params.get(i) {
                Some(p) => p.ir.clone(),
                None if matches!(&*arg.expr, ast::Expr::Lit(ast::Lit::Str(_))) => "i8*".into(),
                None => "i32".into(),
            };
            let value = self.lower_expr_expecting(&arg.expr, Some(&expected))?;
            lowered.push((expected, value.text));
        }
        let dest = if ext.ret == "void" {
            None
        } else {
            Some(self.scopes.fresh_temp())
        };
        if ext.variadic {
            let fixed: Vec<String> = ext.params.iter().map(|p| p.ir.clone()).collect();
            self.comp
                .emitter
                .call_variadic(dest.as_deref(), &ext.ret, &fixed, &ext.name, &lowered);
        } else {
            self.comp
                .emitter
                .call(dest.as_deref(), &ext.ret, &ext.name, &lowered);
        }
        Ok(match dest {
            Some(t) => IrValue::new(t, ext.ret.clone()),
            None => IrValue::new("", "void"),
        })
    }
}

// "%Rect*" -> "Rect"
fn record_name(ir: &str) -> Option<String> {
    ir.strip_prefix('%')
        .and_then(|s| s.strip_suffix('*'))
        .map(str::to_string)
}

fn number_value(v: f64, expected: Option<&str>) -> IrValue {
    match expected {
        Some(ty @ ("double" | "float")) => IrValue::new(float_text(v), ty),
        Some("i64") => IrValue::new(format!("{}", v as i64), "i64"),
        _ => IrValue::new(format!("{}", v as i64), "i32"),
    }
}

fn float_text(v: f64) -> String {
    if v.fract() == 0.0 && v.is_finite() && v.abs() < 1e15 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}
