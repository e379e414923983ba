// Wrapper for the codegen test suites.

mod common;

#[path = "codegen/arithmetic_and_control.rs"]
mod arithmetic_and_control;
#[path = "codegen/generics_ir.rs"]
mod generics_ir;
#[path = "codegen/records_and_methods.rs"]
mod records_and_methods;
#[path = "codegen/strings_and_externs.rs"]
mod strings_and_externs;
