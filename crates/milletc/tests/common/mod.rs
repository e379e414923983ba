use anyhow::Result;

/// Compiles a single in-memory module (named `main`) to IR text.
#[allow(dead_code)]
pub fn gen_ir_for_source(src: &str) -> Result<String> {
    milletc::compile_source(src)
}
