// Record layouts, property paths, method dispatch and sizeof.

use crate::common::gen_ir_for_source;

#[test]
fn nested_property_write_and_read() {
    let src = r#"
        interface Point {
            x: number;
            y: number;
        }
        interface Line {
            start: Point;
            end: Point;
        }
        export function main(): number {
            let line: Line = malloc(sizeof<Line>());
            line.start = malloc(sizeof<Point>());
            line.end = malloc(sizeof<Point>());
            line.start.x = 10;
            line.start.y = 20;
            printf("x=%d, y=%d\n", line.start.x, line.start.y);
            return 0;
        }
    "#;
    let ir = gen_ir_for_source(src).expect("generate IR");

    assert!(ir.contains("%Point = type { i32, i32 }"));
    assert!(ir.contains("%Line = type { %Point*, %Point* }"));
    // referenced records are emitted before their dependents
    let point_at = ir.find("%Point = type").unwrap();
    let line_at = ir.find("%Line = type").unwrap();
    assert!(point_at < line_at);

    assert!(ir.contains("getelementptr %Line, %Line*"));
    assert!(ir.contains("getelementptr %Point, %Point*"));
    // Line is two pointers, Point two i32s
    assert!(ir.contains("call i8* @malloc(i32 16)"));
    assert!(ir.contains("call i8* @malloc(i32 8)"));
    assert!(ir.contains(" to %Point*"), "field stores from malloc get a bitcast");
}

#[test]
fn methods_mangle_with_record_prefix_and_take_the_receiver() {
    let src = r#"
        interface Rect {
            width: number;
            height: number;
        }
        function area(this: Rect): number {
            return this.width * this.height;
        }
        function scale(this: Rect, f) {
            this.width = this.width * f;
            this.height = this.height * f;
        }
        export function main(): number {
            let r: Rect = malloc(sizeof<Rect>());
            r.width = 10;
            r.height = 20;
            r.scale(2);
            return r.area();
        }
    "#;
    let ir = gen_ir_for_source(src).expect("generate IR");

    assert!(ir.contains("define i32 @Rect_area(%Rect* %this.param)"));
    assert!(ir.contains("define void @Rect_scale(%Rect* %this.param, i32 %f.param)"));
    assert!(ir.contains("call void @Rect_scale(%Rect*"));
    assert!(ir.contains("call i32 @Rect_area(%Rect*"));
}

#[test]
fn record_declaration_from_malloc_gets_bitcast() {
    let src = r#"
        interface Point {
            x: number;
            y: number;
        }
        export function main(): number {
            let p: Point = malloc(sizeof<Point>());
            p.x = 3;
            return p.x;
        }
    "#;
    let ir = gen_ir_for_source(src).expect("generate IR");
    assert!(ir.contains("bitcast i8* "));
    assert!(ir.contains(" to %Point*"));
    assert!(ir.contains("call i8* @malloc(i32 8)"), "sizeof<Point> folds to 8");
}

#[test]
fn sizeof_sums_field_sizes_from_the_table() {
    let src = r#"
        interface Mixed {
            a: boolean;
            b: number;
            c: f64;
            d: string;
        }
        export function main(): number {
            return sizeof<Mixed>();
        }
    "#;
    let ir = gen_ir_for_source(src).expect("generate IR");
    // 1 + 4 + 8 + 8, unpadded
    assert!(ir.contains("ret i32 21"));
}

#[test]
fn empty_record_has_size_zero() {
    let src = r#"
        interface Empty {
        }
        export function main(): number {
            return sizeof<Empty>();
        }
    "#;
    let ir = gen_ir_for_source(src).expect("generate IR");
    assert!(ir.contains("%Empty = type { }"));
    assert!(ir.contains("ret i32 0"));
}

#[test]
fn pointer_returning_function_uses_its_declared_type() {
    let src = r#"
        interface Point {
            x: number;
            y: number;
        }
        export function makePoint(): Point {
            let p: Point = malloc(sizeof<Point>());
            return p;
        }
        export function main(): number {
            let p: Point = makePoint();
            p.x = 4;
            return p.x;
        }
    "#;
    let ir = gen_ir_for_source(src).expect("generate IR");
    assert!(ir.contains("define %Point* @main_makePoint()"));
    assert!(ir.contains("ret %Point*"), "return must use the function's IR type, not i32");
    assert!(ir.contains("call %Point* @main_makePoint()"));
}

#[test]
fn optional_fields_are_rejected() {
    let _guard = milletc::diagnostics::suppress();
    let src = r#"
        interface Point {
            x?: number;
        }
        export function main(): number {
            return 0;
        }
    "#;
    let err = gen_ir_for_source(src).unwrap_err();
    assert!(err.to_string().contains("optional field"));
}

#[test]
fn sizeof_of_unregistered_type_is_an_error() {
    let _guard = milletc::diagnostics::suppress();
    let src = r#"
        export function main(): number {
            return sizeof<Mystery>();
        }
    "#;
    let err = gen_ir_for_source(src).unwrap_err();
    assert!(err.to_string().contains("unregistered type"));
}

#[test]
fn unknown_method_is_an_error() {
    let _guard = milletc::diagnostics::suppress();
    let src = r#"
        interface Rect {
            width: number;
            height: number;
        }
        export function main(): number {
            let r: Rect = malloc(sizeof<Rect>());
            return r.area();
        }
    "#;
    let err = gen_ir_for_source(src).unwrap_err();
    assert!(err.to_string().contains("unknown method 'area'"));
}

#[test]
fn compound_assignment_is_rejected() {
    let _guard = milletc::diagnostics::suppress();
    let src = r#"
        export function main(): number {
            let x: number = 1;
            x += 1;
            return x;
        }
    "#;
    let err = gen_ir_for_source(src).unwrap_err();
    assert!(err.to_string().contains("compound assignment"));
}
