// String constants, the prelude externs and call resolution.

use crate::common::gen_ir_for_source;

#[test]
fn repeated_string_literal_interns_to_one_global() {
    let src = r#"
        export function main(): number {
            printf("hello\n");
            printf("hello\n");
            return 0;
        }
    "#;
    let ir = gen_ir_for_source(src).expect("generate IR");

    assert_eq!(ir.matches("@.str.0 = private unnamed_addr constant").count(), 1);
    assert!(!ir.contains("@.str.1"), "identical literals must share a global");
    // decoded bytes plus the NUL
    assert!(ir.contains("[7 x i8] c\"hello\\0A\\00\""));
    assert_eq!(ir.matches("getelementptr inbounds [7 x i8]").count(), 2);
}

#[test]
fn variadic_extern_calls_use_the_variadic_signature() {
    let src = r#"
        export function main(): number {
            let x: number = 42;
            printf("x=%d\n", x);
            return 0;
        }
    "#;
    let ir = gen_ir_for_source(src).expect("generate IR");
    assert!(ir.contains("declare i32 @printf(i8*, ...)"));
    assert!(ir.contains("call i32 (i8*, ...) @printf(i8*"));
    assert!(ir.contains(", i32 %"), "trailing variadic arguments default to i32");
}

#[test]
fn extern_declarations_are_not_duplicated_across_modules() {
    let src = r#"
        declare function printf(format: string, ...rest: number[]): number;
        export function main(): number {
            printf("once\n");
            return 0;
        }
    "#;
    let ir = gen_ir_for_source(src).expect("generate IR");
    assert_eq!(ir.matches("declare i32 @printf").count(), 1);
}

#[test]
fn user_extern_declaration_registers_a_c_signature() {
    let src = r#"
        declare function getchar(): number;
        export function main(): number {
            return getchar();
        }
    "#;
    let ir = gen_ir_for_source(src).expect("generate IR");
    assert!(ir.contains("declare i32 @getchar()"));
    assert!(ir.contains("call i32 @getchar()"));
}

#[test]
fn string_argument_to_non_variadic_extern_stays_i8ptr() {
    let src = r#"
        export function main(): number {
            puts("done");
            return 0;
        }
    "#;
    let ir = gen_ir_for_source(src).expect("generate IR");
    assert!(ir.contains("call i32 @puts(i8*"));
    assert!(ir.contains("[5 x i8] c\"done\\00\""));
}

#[test]
fn unknown_function_is_a_hard_error() {
    let _guard = milletc::diagnostics::suppress();
    let src = r#"
        export function main(): number {
            return mystery(1);
        }
    "#;
    let err = gen_ir_for_source(src).unwrap_err();
    assert!(err.to_string().contains("unknown function 'mystery'"));
}

#[test]
fn unresolved_identifier_is_a_hard_error() {
    let _guard = milletc::diagnostics::suppress();
    let src = r#"
        export function main(): number {
            return ghost;
        }
    "#;
    let err = gen_ir_for_source(src).unwrap_err();
    assert!(err.to_string().contains("unresolved identifier 'ghost'"));
}

#[test]
fn module_header_carries_the_target_triple() {
    let ir = gen_ir_for_source("export function main(): number { return 0; }")
        .expect("generate IR");
    assert!(ir.starts_with("; ModuleID = 'main'"));
    assert!(ir.contains("target triple = \"arm64-apple-macosx\""));
}
