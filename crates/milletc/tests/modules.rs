// Module resolution, compilation order and cross-module mangling.

use anyhow::Result;
use milletc::resolver::ModuleResolver;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_module(dir: &Path, name: &str, source: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, source).expect("write module");
    path
}

fn compile_entry(entry: &Path) -> Result<String> {
    milletc::compile(&milletc::CompileOptions::new(entry.to_string_lossy()))
}

#[test]
fn cross_module_calls_use_mangled_names() -> Result<()> {
    let dir = TempDir::new()?;
    write_module(
        dir.path(),
        "math.ts",
        r#"
            export function add(a: number, b: number): number {
                return a + b;
            }
            export function multiply(a: number, b: number): number {
                return a * b;
            }
            export function square(x: number): number {
                return multiply(x, x);
            }
        "#,
    );
    let main = write_module(
        dir.path(),
        "main.ts",
        r#"
            import { add, square } from "./math";
            export function main(): number {
                return add(10, 20) + square(3);
            }
        "#,
    );

    let ir = compile_entry(&main)?;
    assert!(ir.contains("define i32 @math_add(i32 %a.param, i32 %b.param)"));
    assert!(ir.contains("define i32 @math_multiply"));
    assert!(ir.contains("define i32 @math_square"));
    assert!(ir.contains("call i32 @math_add(i32 10, i32 20)"));
    // in-module call inside square also goes through the mangled name
    assert!(ir.contains("call i32 @math_multiply"));
    // dependencies are walked before their importers
    assert!(ir.find("define i32 @math_add").unwrap() < ir.find("define i32 @main()").unwrap());
    Ok(())
}

#[test]
fn import_alias_resolves_to_the_exported_name() -> Result<()> {
    let dir = TempDir::new()?;
    write_module(
        dir.path(),
        "math.ts",
        "export function add(a: number, b: number): number { return a + b; }",
    );
    let main = write_module(
        dir.path(),
        "main.ts",
        r#"
            import { add as plus } from "./math";
            export function main(): number {
                return plus(1, 2);
            }
        "#,
    );
    let ir = compile_entry(&main)?;
    assert!(ir.contains("call i32 @math_add(i32 1, i32 2)"));
    Ok(())
}

#[test]
fn resolver_emits_dependencies_first() -> Result<()> {
    let dir = TempDir::new()?;
    write_module(
        dir.path(),
        "leaf.ts",
        "export function one(): number { return 1; }",
    );
    write_module(
        dir.path(),
        "mid.ts",
        r#"
            import { one } from "./leaf";
            export function two(): number {
                return one() + 1;
            }
        "#,
    );
    let main = write_module(
        dir.path(),
        "main.ts",
        r#"
            import { two } from "./mid";
            export function main(): number {
                return two();
            }
        "#,
    );

    let modules = ModuleResolver::new().resolve(&main)?;
    let names: Vec<&str> = modules.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["leaf", "mid", "main"]);
    for (i, module) in modules.iter().enumerate() {
        for dep in &module.deps {
            let dep_at = names.iter().position(|n| n == dep).expect("dep resolved");
            assert!(dep_at < i, "dependency '{}' must precede '{}'", dep, module.name);
        }
    }
    Ok(())
}

#[test]
fn import_cycle_is_rejected() -> Result<()> {
    let _guard = milletc::diagnostics::suppress();
    let dir = TempDir::new()?;
    write_module(
        dir.path(),
        "a.ts",
        r#"
            import { b } from "./b";
            export function a(): number {
                return b();
            }
        "#,
    );
    write_module(
        dir.path(),
        "b.ts",
        r#"
            import { a } from "./a";
            export function b(): number {
                return a();
            }
        "#,
    );
    let err = compile_entry(&dir.path().join("a.ts")).unwrap_err();
    assert!(err.to_string().contains("circular dependency"));
    Ok(())
}

#[test]
fn missing_module_is_rejected() -> Result<()> {
    let _guard = milletc::diagnostics::suppress();
    let dir = TempDir::new()?;
    let main = write_module(
        dir.path(),
        "main.ts",
        r#"
            import { gone } from "./missing";
            export function main(): number {
                return gone();
            }
        "#,
    );
    let err = compile_entry(&main).unwrap_err();
    assert!(format!("{:#}", err).contains("module not found"));
    Ok(())
}

#[test]
fn importing_a_name_that_is_not_exported_fails() -> Result<()> {
    let _guard = milletc::diagnostics::suppress();
    let dir = TempDir::new()?;
    write_module(
        dir.path(),
        "math.ts",
        "export function add(a: number, b: number): number { return a + b; }",
    );
    let main = write_module(
        dir.path(),
        "main.ts",
        r#"
            import { subtract } from "./math";
            export function main(): number {
                return subtract(3, 1);
            }
        "#,
    );
    let err = compile_entry(&main).unwrap_err();
    assert!(err.to_string().contains("no export named 'subtract'"));
    Ok(())
}

#[test]
fn bare_specifiers_are_ignored() -> Result<()> {
    let dir = TempDir::new()?;
    let main = write_module(
        dir.path(),
        "main.ts",
        r#"
            import { readFile } from "fs";
            export function main(): number {
                return 0;
            }
        "#,
    );
    let ir = compile_entry(&main)?;
    assert!(ir.contains("define i32 @main()"));
    Ok(())
}

#[test]
fn records_imported_across_modules_keep_one_layout() -> Result<()> {
    let dir = TempDir::new()?;
    write_module(
        dir.path(),
        "geometry.ts",
        r#"
            export interface Point {
                x: number;
                y: number;
            }
            export function originDistance(this: Point): number {
                return this.x * this.x + this.y * this.y;
            }
        "#,
    );
    let main = write_module(
        dir.path(),
        "main.ts",
        r#"
            import { Point } from "./geometry";
            export function main(): number {
                let p: Point = malloc(sizeof<Point>());
                p.x = 3;
                p.y = 4;
                return p.originDistance();
            }
        "#,
    );
    let ir = compile_entry(&main)?;
    assert_eq!(ir.matches("%Point = type { i32, i32 }").count(), 1);
    assert!(ir.contains("define i32 @Point_originDistance(%Point* %this.param)"));
    assert!(ir.contains("call i32 @Point_originDistance(%Point*"));
    Ok(())
}

#[test]
fn export_lists_contribute_to_the_export_set() -> Result<()> {
    let dir = TempDir::new()?;
    write_module(
        dir.path(),
        "util.ts",
        r#"
            function helper(x: number): number {
                return x + 1;
            }
            export { helper };
        "#,
    );
    let main = write_module(
        dir.path(),
        "main.ts",
        r#"
            import { helper } from "./util";
            export function main(): number {
                return helper(41);
            }
        "#,
    );
    let ir = compile_entry(&main)?;
    assert!(ir.contains("call i32 @util_helper(i32 41)"));
    Ok(())
}
