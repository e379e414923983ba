// Loops, branches and boolean coercion.

use crate::common::gen_ir_for_source;

#[test]
fn iterative_fibonacci_lowers_through_while() {
    let src = r#"
        export function main(): number {
            let a: number = 0;
            let b: number = 1;
            let i: number = 0;
            while (i < 10) {
                let t: number = a + b;
                a = b;
                b = t;
                i = i + 1;
            }
            return b;
        }
    "#;
    let ir = gen_ir_for_source(src).expect("generate IR");

    assert!(ir.contains("while.cond0:"), "missing loop condition block");
    assert!(ir.contains("while.body1:"), "missing loop body block");
    assert!(ir.contains("while.end2:"), "missing loop exit block");
    assert!(ir.contains("icmp slt i32"), "loop condition should be a signed compare");
    assert!(ir.contains("ret i32"), "main should return its i32");
}

#[test]
fn heap_array_sum_uses_bitcast_and_element_geps() {
    let src = r#"
        export function main(): number {
            let arr: number[] = malloc(20);
            arr[0] = 10;
            arr[1] = 20;
            arr[2] = 30;
            arr[3] = 40;
            arr[4] = 50;
            let sum: number = 0;
            for (let i: number = 0; i < 5; i = i + 1) {
                sum = sum + arr[i];
            }
            return sum;
        }
    "#;
    let ir = gen_ir_for_source(src).expect("generate IR");

    assert!(ir.contains("call i8* @malloc(i32 20)"));
    assert!(ir.contains("bitcast i8* "), "malloc result should cast to the array type");
    assert!(ir.contains(" to i32*"));
    assert!(ir.contains("getelementptr i32, i32*"), "element access should gep the base");
    assert!(ir.contains("for.cond0:"));
    assert!(ir.contains("br label %for.cond0"), "the step block loops back to the condition");
}

#[test]
fn integer_condition_compares_against_zero() {
    let src = r#"
        export function main(): number {
            let x: number = 5;
            if (x) {
                return 1;
            }
            return 0;
        }
    "#;
    let ir = gen_ir_for_source(src).expect("generate IR");
    assert!(ir.contains("icmp ne i32"), "non-i1 condition should coerce via icmp ne");
}

#[test]
fn comparison_condition_is_not_coerced_twice() {
    let src = r#"
        export function main(): number {
            let i: number = 0;
            if (i < 3) {
                return 1;
            }
            return 0;
        }
    "#;
    let ir = gen_ir_for_source(src).expect("generate IR");
    assert!(ir.contains("icmp slt i32"));
    assert!(!ir.contains("icmp ne i1"), "i1 values must feed the branch directly");
}

#[test]
fn for_without_condition_branches_unconditionally_into_body() {
    let src = r#"
        export function main(): number {
            for (;;) {
                return 1;
            }
        }
    "#;
    let ir = gen_ir_for_source(src).expect("generate IR");
    assert!(
        ir.contains("for.cond0:\n  br label %for.body1"),
        "a condition-less for is an infinite loop"
    );
}

#[test]
fn break_and_continue_target_loop_blocks() {
    let src = r#"
        export function main(): number {
            let sum: number = 0;
            for (let i: number = 0; i < 10; i = i + 1) {
                if (i == 3) {
                    continue;
                }
                if (i > 6) {
                    break;
                }
                sum = sum + i;
            }
            return sum;
        }
    "#;
    let ir = gen_ir_for_source(src).expect("generate IR");
    assert!(ir.contains("br label %for.step2"), "continue should run the incrementer");
    assert!(ir.contains("br label %for.end3"), "break should leave the loop");
}

#[test]
fn if_without_else_branches_to_end_on_false() {
    let src = r#"
        export function main(): number {
            let x: number = 1;
            if (x > 0) {
                x = 2;
            }
            return x;
        }
    "#;
    let ir = gen_ir_for_source(src).expect("generate IR");
    assert!(ir.contains("label %if.then0, label %if.end1"));
}

#[test]
fn unary_operators_lower_to_sub_and_icmp() {
    let src = r#"
        export function main(): number {
            let x: number = 5;
            let neg: number = -x;
            let flag: boolean = !x;
            if (flag) {
                return neg;
            }
            return x;
        }
    "#;
    let ir = gen_ir_for_source(src).expect("generate IR");
    assert!(ir.contains("sub i32 0,"), "prefix minus is sub from zero");
    assert!(ir.contains("icmp eq i32"), "prefix bang compares against zero");
}

#[test]
fn float_arithmetic_selects_fp_instructions() {
    let src = r#"
        export function main(): number {
            let x: f64 = 1.5;
            let y: f64 = x * 2.0;
            if (y > 2.5) {
                return 1;
            }
            return 0;
        }
    "#;
    let ir = gen_ir_for_source(src).expect("generate IR");
    assert!(ir.contains("alloca double"));
    assert!(ir.contains("fmul double"));
    assert!(ir.contains("fcmp ogt double"));
}

#[test]
fn every_function_block_ends_terminated() {
    let src = r#"
        export function noisy(): void {
            printf("hi\n");
        }
        export function main(): number {
            noisy();
            return 0;
        }
    "#;
    let ir = gen_ir_for_source(src).expect("generate IR");
    // void function without an explicit return still terminates
    assert!(ir.contains("ret void\n}"));
}
