//! Statement lowering.
//!
//! Control flow keeps the classic alloca/branch shape: `if` and loops
//! allocate their labels up front, branch on an `i1` condition, and every
//! structured statement leaves the emitter positioned in its end block.
//! Loops push a [`LoopContext`](super::LoopContext) so `break` and
//! `continue` know their targets; a `for` loop routes `continue` through
//! a dedicated step block so the incrementer still runs.

use super::{IrValue, LoopContext, Walker};
use anyhow::Result;
use deno_ast::swc::ast;

impl<'a> Walker<'a> {
    pub(crate) fn lower_stmts(&mut self, stmts: &[ast::Stmt]) -> Result<()> {
        for stmt in stmts {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    pub(crate) fn lower_stmt(&mut self, stmt: &ast::Stmt) -> Result<()> {
        match stmt {
            ast::Stmt::Return(r) => self.lower_return(r),
            ast::Stmt::Decl(ast::Decl::Var(v)) => self.lower_var_decl(v),
            ast::Stmt::Expr(e) => {
                self.lower_expr(&e.expr)?;
                Ok(())
            }
            ast::Stmt::If(i) => self.lower_if(i),
            ast::Stmt::While(w) => self.lower_while(w),
            ast::Stmt::For(f) => self.lower_for(f),
            ast::Stmt::Block(b) => {
                self.scopes.push_scope();
                let result = self.lower_stmts(&b.stmts);
                self.scopes.pop_scope();
                result
            }
            ast::Stmt::Break(b) => {
                if b.label.is_some() {
                    anyhow::bail!("labeled break is not supported");
                }
                let ctx = self
                    .loop_stack
                    .last()
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("`break` outside of a loop"))?;
                self.comp.emitter.branch(&ctx.break_label);
                Ok(())
            }
            ast::Stmt::Continue(c) => {
                if c.label.is_some() {
                    anyhow::bail!("labeled continue is not supported");
                }
                let ctx = self
                    .loop_stack
                    .last()
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("`continue` outside of a loop"))?;
                self.comp.emitter.branch(&ctx.continue_label);
                Ok(())
            }
            ast::Stmt::Empty(_) => Ok(()),
            ast::Stmt::Decl(ast::Decl::Fn(_)) => {
                anyhow::bail!("nested function declarations are not supported")
            }
            _ => anyhow::bail!("unsupported statement kind"),
        }
    }

    // `return expr` uses the enclosing function's IR return type, not a
    // fixed one, so pointer- and float-returning functions come out
    // correct.
    fn lower_return(&mut self, r: &ast::ReturnStmt) -> Result<()> {
        match &r.arg {
            Some(expr) => {
                let ret = self.current_ret.clone();
                if ret == "void" {
                    self.lower_expr(expr)?;
                    self.comp.emitter.ret(None);
                } else {
                    let value = self.lower_expr_expecting(expr, Some(&ret))?;
                    self.comp.emitter.ret(Some((&ret, &value.text)));
                }
            }
            None => self.comp.emitter.ret(None),
        }
        Ok(())
    }

    pub(crate) fn lower_var_decl(&mut self, v: &ast::VarDecl) -> Result<()> {
        for d in &v.decls {
            let ast::Pat::Ident(binding) = &d.name else {
                anyhow::bail!("unsupported binding pattern; declare one variable at a time");
            };
            let name = binding.id.sym.to_string();
            let annotated = match &binding.type_ann {
                Some(ann) => {
                    let ty = crate::types::Ty::from_ts(&ann.type_ann)?;
                    Some(self.comp.ir_type(&ty)?)
                }
                None => None,
            };
            let mut value: Option<IrValue> = match &d.init {
                Some(init) => Some(self.lower_expr_expecting(init, annotated.as_deref())?),
                None => None,
            };
            let slot_ty = match (&annotated, &value) {
                (Some(ty), _) => ty.clone(),
                (None, Some(v)) => v.ty.clone(),
                (None, None) => {
                    anyhow::bail!("variable '{}' needs a type annotation or an initializer", name)
                }
            };
            // heap allocations come back as i8*; cast to the declared
            // record or array pointer before the slot store
            if let Some(v) = &value
                && needs_heap_cast(&slot_ty, &v.ty)
            {
                let cast = self.scopes.fresh_temp();
                self.comp.emitter.bitcast(&cast, "i8*", &v.text, &slot_ty);
                value = Some(IrValue::new(cast, slot_ty.clone()));
            }
            let slot = self.scopes.declare(&name, &slot_ty);
            self.comp.emitter.alloca(&slot.register, &slot_ty);
            if let Some(v) = value {
                self.comp.emitter.store(&slot_ty, &v.text, &slot.register);
            }
        }
        Ok(())
    }

    fn lower_if(&mut self, i: &ast::IfStmt) -> Result<()> {
        let cond = self.lower_condition(&i.test)?;
        let then_label = self.scopes.fresh_label("if.then");
        let else_label = if i.alt.is_some() {
            Some(self.scopes.fresh_label("if.else"))
        } else {
            None
        };
        let end_label = self.scopes.fresh_label("if.end");

        // with no else branch, false falls through to the end label
        let false_target = else_label.as_deref().unwrap_or(&end_label);
        self.comp.emitter.cond_branch(&cond, &then_label, false_target);

        self.comp.emitter.label(&then_label);
        self.lower_stmt(&i.cons)?;
        if !self.comp.emitter.block_terminated {
            self.comp.emitter.branch(&end_label);
        }

        if let Some(alt) = &i.alt {
            self.comp.emitter.label(else_label.as_deref().unwrap());
            self.lower_stmt(alt)?;
            if !self.comp.emitter.block_terminated {
                self.comp.emitter.branch(&end_label);
            }
        }

        self.comp.emitter.label(&end_label);
        Ok(())
    }

    fn lower_while(&mut self, w: &ast::WhileStmt) -> Result<()> {
        let cond_label = self.scopes.fresh_label("while.cond");
        let body_label = self.scopes.fresh_label("while.body");
        let end_label = self.scopes.fresh_label("while.end");

        self.comp.emitter.branch(&cond_label);
        self.comp.emitter.label(&cond_label);
        let cond = self.lower_condition(&w.test)?;
        self.comp.emitter.cond_branch(&cond, &body_label, &end_label);

        self.comp.emitter.label(&body_label);
        self.loop_stack.push(LoopContext {
            break_label: end_label.clone(),
            continue_label: cond_label.clone(),
        });
        let result = self.lower_stmt(&w.body);
        self.loop_stack.pop();
        result?;
        if !self.comp.emitter.block_terminated {
            self.comp.emitter.branch(&cond_label);
        }

        self.comp.emitter.label(&end_label);
        Ok(())
    }

    fn lower_for(&mut self, f: &ast::ForStmt) -> Result<()> {
        // the initializer's declarations are scoped to the loop
        self.scopes.push_scope();
        if let Some(init) = &f.init {
            match init {
                ast::VarDeclOrExpr::VarDecl(v) => self.lower_var_decl(v)?,
                ast::VarDeclOrExpr::Expr(e) => {
                    self.lower_expr(e)?;
                }
            }
        }

        let cond_label = self.scopes.fresh_label("for.cond");
        let body_label = self.scopes.fresh_label("for.body");
        let step_label = self.scopes.fresh_label("for.step");
        let end_label = self.scopes.fresh_label("for.end");

        self.comp.emitter.branch(&cond_label);
        self.comp.emitter.label(&cond_label);
        match &f.test {
            Some(test) => {
                let cond = self.lower_condition(test)?;
                self.comp.emitter.cond_branch(&cond, &body_label, &end_label);
            }
            // no condition: unconditional branch into the body
            None => self.comp.emitter.branch(&body_label),
        }

        self.comp.emitter.label(&body_label);
        self.loop_stack.push(LoopContext {
            break_label: end_label.clone(),
            continue_label: step_label.clone(),
        });
        let result = self.lower_stmt(&f.body);
        self.loop_stack.pop();
        result?;
        if !self.comp.emitter.block_terminated {
            self.comp.emitter.branch(&step_label);
        }

        self.comp.emitter.label(&step_label);
        if let Some(update) = &f.update {
            self.lower_expr(update)?;
        }
        self.comp.emitter.branch(&cond_label);

        self.comp.emitter.label(&end_label);
        self.scopes.pop_scope();
        Ok(())
    }
}

pub(crate) fn needs_heap_cast(slot_ty: &str, value_ty: &str) -> bool {
    slot_ty.ends_with('*') && slot_ty != "i8*" && value_ty == "i8*"
}
