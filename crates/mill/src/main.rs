//! Command-line driver for the millet compiler.
//!
//! The heavy lifting lives in the `milletc` library; this binary parses
//! arguments, writes the IR module to disk, and (unless `--emit-llvm`)
//! shells out to a C/LLVM toolchain to produce a native executable.
//! Exit codes: 0 on success, 1 on any failure, including a non-zero exit
//! of the compiled program under `--run`.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::process::Command;

#[derive(Parser)]
#[command(name = "mill", about = "millet: AOT-compile a TypeScript subset to native code", version)]
struct Cli {
    /// Input source file
    input: String,

    /// Emit the LLVM IR module only, skipping the native backend
    #[arg(long = "emit-llvm")]
    emit_llvm: bool,

    /// Run the produced executable after linking
    #[arg(long)]
    run: bool,

    /// Output path (the IR file with --emit-llvm, the executable otherwise)
    #[arg(short = 'o', long = "out")]
    out: Option<String>,

    /// Target triple written into the IR module
    #[arg(long = "target-triple")]
    target_triple: Option<String>,

    /// Replacement for the built-in prelude descriptor
    #[arg(long)]
    prelude: Option<String>,

    /// Suppress progress output
    #[arg(long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();
    match drive(&cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            std::process::exit(1);
        }
    }
}

fn drive(cli: &Cli) -> Result<i32> {
    if !cli.quiet {
        println!("{} {}", "Compiling".green().bold(), cli.input);
    }

    let mut options = milletc::CompileOptions::new(cli.input.clone());
    options.target_triple = cli.target_triple.clone();
    options.prelude = cli.prelude.clone();
    let ir = milletc::compile(&options)?;

    let input_stem = PathBuf::from(&cli.input)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());

    if cli.emit_llvm {
        let out = cli
            .out
            .clone()
            .unwrap_or_else(|| format!("{}.ll", input_stem));
        std::fs::write(&out, &ir).with_context(|| format!("failed to write '{}'", out))?;
        if !cli.quiet {
            println!("{} {}", "Finished".green().bold(), out);
        }
        return Ok(0);
    }

    let exe = cli.out.clone().unwrap_or_else(|| input_stem.clone());
    let ll_path = format!("{}.ll", exe);
    std::fs::write(&ll_path, &ir).with_context(|| format!("failed to write '{}'", ll_path))?;

    // any clang-compatible driver can assemble and link the module
    let cc = std::env::var("MILLET_CC").unwrap_or_else(|_| "clang".to_string());
    let status = Command::new(&cc)
        .arg(&ll_path)
        .arg("-o")
        .arg(&exe)
        .status()
        .with_context(|| format!("failed to spawn '{}'", cc))?;
    if !status.success() {
        anyhow::bail!("backend '{}' failed on '{}'", cc, ll_path);
    }
    if !cli.quiet {
        println!("{} {}", "Finished".green().bold(), exe);
    }

    if cli.run {
        let exe_path = if exe.contains(std::path::MAIN_SEPARATOR) {
            PathBuf::from(&exe)
        } else {
            PathBuf::from(".").join(&exe)
        };
        let status = Command::new(&exe_path)
            .status()
            .with_context(|| format!("failed to run '{}'", exe_path.display()))?;
        if !status.success() {
            return Ok(1);
        }
    }
    Ok(0)
}
