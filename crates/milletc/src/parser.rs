//! Parser front-end.
//!
//! millet does not lex or parse source itself: it wraps `deno_ast` (the
//! swc TypeScript parser) and hands the rest of the pipeline a
//! [`ParsedModule`] holding both the AST and the original source text for
//! span-based diagnostics. The wrapper enforces a small set of
//! project-specific constraints on top of parsing:
//!
//! - a maximum source size (default 10 MB, `MILLET_MAX_SOURCE_BYTES`
//!   overrides it) so a malformed input cannot exhaust memory,
//! - UTF-8 BOM stripping, which `deno_ast` requires,
//! - rejection of the legacy `var` keyword in favor of `let`/`const`.

use crate::diagnostics;
use anyhow::Result;
use deno_ast::swc::ast;
use deno_ast::{MediaType, ParseParams, ParsedSource, parse_module};
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

/// Maximum source file size in bytes. Override with MILLET_MAX_SOURCE_BYTES.
static MAX_SOURCE_SIZE: AtomicUsize = AtomicUsize::new(10 * 1024 * 1024);

fn max_source_size() -> usize {
    if let Ok(val) = std::env::var("MILLET_MAX_SOURCE_BYTES")
        && let Ok(limit) = val.parse::<usize>()
    {
        MAX_SOURCE_SIZE.store(limit, Ordering::Relaxed);
    }
    MAX_SOURCE_SIZE.load(Ordering::Relaxed)
}

/// A parsed source module plus the text it was parsed from.
#[derive(Debug)]
pub struct ParsedModule {
    pub parsed: ParsedSource,
    pub source: String,
}

/// Parse a millet source string and run the project-specific checks.
///
/// `file_path`, when given, is used to build a `file://` specifier so
/// spans in diagnostics point at the real file.
pub fn parse_millet_module(source_code: &str, file_path: Option<&str>) -> Result<ParsedModule> {
    let max_size = max_source_size();
    if source_code.len() > max_size {
        anyhow::bail!(
            "source file too large: {} bytes (limit: {} bytes); set MILLET_MAX_SOURCE_BYTES to raise it",
            source_code.len(),
            max_size
        );
    }

    let source = source_code.strip_prefix('\u{FEFF}').unwrap_or(source_code);

    let specifier = match file_path {
        Some(p) => match std::fs::canonicalize(p) {
            Ok(abs) => Url::from_file_path(&abs)
                .map_err(|()| anyhow::anyhow!("failed to convert path to file URL: {}", p))?,
            Err(_) => Url::from_file_path(p).unwrap_or(Url::parse("file:///module.ts")?),
        },
        None => Url::parse("file:///module.ts")?,
    };

    let params = ParseParams {
        specifier,
        text: source.into(),
        media_type: MediaType::TypeScript,
        capture_tokens: false,
        scope_analysis: false,
        maybe_syntax: None,
    };
    let parsed = parse_module(params)?;

    reject_var_decls(&parsed, file_path, source)?;

    Ok(ParsedModule {
        parsed,
        source: source.to_string(),
    })
}

// `var` has function-scoped hoisting semantics the lowering does not
// model; only block-scoped `let`/`const` are accepted.
fn reject_var_decls(parsed: &ParsedSource, file_path: Option<&str>, source: &str) -> Result<()> {
    fn check_stmt(stmt: &ast::Stmt, file_path: Option<&str>, source: &str) -> Result<()> {
        match stmt {
            ast::Stmt::Decl(ast::Decl::Var(v)) => {
                if matches!(v.kind, ast::VarDeclKind::Var) {
                    return diagnostics::report_error_span_and_bail(
                        file_path,
                        source,
                        v.span.lo.0 as usize,
                        "the `var` keyword is not allowed; use `let` instead",
                        Some("millet requires block-scoped declarations: `let` or `const`"),
                    );
                }
            }
            ast::Stmt::Decl(ast::Decl::Fn(f)) => {
                if let Some(body) = &f.function.body {
                    for s in &body.stmts {
                        check_stmt(s, file_path, source)?;
                    }
                }
            }
            ast::Stmt::Block(b) => {
                for s in &b.stmts {
                    check_stmt(s, file_path, source)?;
                }
            }
            ast::Stmt::If(i) => {
                check_stmt(&i.cons, file_path, source)?;
                if let Some(alt) = &i.alt {
                    check_stmt(alt, file_path, source)?;
                }
            }
            ast::Stmt::While(w) => check_stmt(&w.body, file_path, source)?,
            ast::Stmt::For(f) => {
                if let Some(ast::VarDeclOrExpr::VarDecl(v)) = &f.init
                    && matches!(v.kind, ast::VarDeclKind::Var)
                {
                    return diagnostics::report_error_span_and_bail(
                        file_path,
                        source,
                        v.span.lo.0 as usize,
                        "the `var` keyword is not allowed; use `let` instead",
                        None,
                    );
                }
                check_stmt(&f.body, file_path, source)?;
            }
            _ => {}
        }
        Ok(())
    }

    for item in parsed.program_ref().body() {
        match item {
            deno_ast::ModuleItemRef::Stmt(stmt) => check_stmt(stmt, file_path, source)?,
            deno_ast::ModuleItemRef::ModuleDecl(ast::ModuleDecl::ExportDecl(decl)) => {
                if let ast::Decl::Fn(f) = &decl.decl
                    && let Some(body) = &f.function.body
                {
                    for s in &body.stmts {
                        check_stmt(s, file_path, source)?;
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}
