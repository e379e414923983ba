// Generic record monomorphization.

use crate::common::gen_ir_for_source;

#[test]
fn nested_instantiations_emit_exactly_two_structs() {
    let src = r#"
        interface Box<T> {
            value: T;
        }
        export function main(): number {
            let a: Box<number> = malloc(sizeof<Box<number>>());
            let b: Box<Box<number>> = malloc(sizeof<Box<Box<number>>>());
            a.value = 7;
            b.value = a;
            return a.value;
        }
    "#;
    let ir = gen_ir_for_source(src).expect("generate IR");

    assert_eq!(ir.matches("%Box_i32 = type { i32 }").count(), 1);
    assert_eq!(
        ir.matches("%Box_Box_i32 = type { %Box_i32* }").count(),
        1,
        "the outer box holds a pointer to the inner instantiation"
    );
    // the argument instantiation is defined before its dependent
    let inner = ir.find("%Box_i32 = type").unwrap();
    let outer = ir.find("%Box_Box_i32 = type").unwrap();
    assert!(inner < outer);

    assert!(ir.contains("call i8* @malloc(i32 4)"), "sizeof<Box<number>> is 4");
    assert!(ir.contains("call i8* @malloc(i32 8)"), "sizeof<Box<Box<number>>> is 8");
}

#[test]
fn repeated_instantiation_reuses_one_layout() {
    let src = r#"
        interface Box<T> {
            value: T;
        }
        export function first(): number {
            let a: Box<number> = malloc(sizeof<Box<number>>());
            a.value = 1;
            return a.value;
        }
        export function main(): number {
            let b: Box<number> = malloc(sizeof<Box<number>>());
            b.value = 2;
            return b.value + first();
        }
    "#;
    let ir = gen_ir_for_source(src).expect("generate IR");
    assert_eq!(
        ir.matches("%Box_i32 = type").count(),
        1,
        "the same Name<Args> must map to one struct"
    );
}

#[test]
fn two_argument_instantiation_mangles_with_ir_names() {
    let src = r#"
        interface Pair<A, B> {
            first: A;
            second: B;
        }
        export function main(): number {
            let p: Pair<i32, f64> = malloc(sizeof<Pair<i32, f64>>());
            p.first = 1;
            return p.first;
        }
    "#;
    let ir = gen_ir_for_source(src).expect("generate IR");
    assert!(ir.contains("%Pair_i32_double = type { i32, double }"));
    // 4 + 8, unpadded
    assert!(ir.contains("call i8* @malloc(i32 12)"));
}

#[test]
fn generic_arity_mismatch_is_an_error() {
    let _guard = milletc::diagnostics::suppress();
    let src = r#"
        interface Box<T> {
            value: T;
        }
        export function main(): number {
            let a: Box<number, number> = malloc(8);
            return 0;
        }
    "#;
    let err = gen_ir_for_source(src).unwrap_err();
    assert!(err.to_string().contains("type arguments"));
}
