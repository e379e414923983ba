//! Buffered assembly of the output IR module.
//!
//! The emitter never performs I/O: every operation appends to one of the
//! module's logical segments (header, struct types, extern declarations,
//! string constants, function bodies) and [`Emitter::get_output`]
//! concatenates them in declaration-before-use order. Instructions are
//! indented two spaces; labels sit at column zero. The emitter also
//! tracks whether the current basic block already ended in a terminator
//! so the walker can keep every block properly terminated.

use std::collections::{HashMap, HashSet};

pub struct Emitter {
    module_id: String,
    target_triple: String,
    struct_types: String,
    struct_seen: HashSet<String>,
    externs: String,
    extern_seen: HashSet<String>,
    string_globals: String,
    /// Literal value -> (global name, decoded byte length incl. NUL).
    interned: HashMap<String, (String, usize)>,
    next_str_id: u32,
    functions: String,
    current: String,
    /// True when the last instruction in the current block was a
    /// terminator (`ret`, `br`, `unreachable`).
    pub block_terminated: bool,
}

impl Emitter {
    pub fn new(module_id: &str, target_triple: &str) -> Self {
        Self {
            module_id: module_id.to_string(),
            target_triple: target_triple.to_string(),
            struct_types: String::new(),
            struct_seen: HashSet::new(),
            externs: String::new(),
            extern_seen: HashSet::new(),
            string_globals: String::new(),
            interned: HashMap::new(),
            next_str_id: 0,
            functions: String::new(),
            current: String::new(),
            block_terminated: false,
        }
    }

    /// Records `%Name = type { … }` for emission. Repeated names are
    /// ignored so the registry can be flushed more than once.
    pub fn add_struct_type(&mut self, name: &str, body: &str) {
        if !self.struct_seen.insert(name.to_string()) {
            return;
        }
        self.struct_types
            .push_str(&format!("%{} = type {}\n", name, body));
    }

    pub fn has_struct_type(&self, name: &str) -> bool {
        self.struct_seen.contains(name)
    }

    /// Deduplicated `declare` line; a variadic signature gains `, ...`.
    pub fn add_extern_function(&mut self, name: &str, ret: &str, params: &[String], variadic: bool) {
        if !self.extern_seen.insert(name.to_string()) {
            return;
        }
        let mut sig = params.join(", ");
        if variadic {
            if sig.is_empty() {
                sig.push_str("...");
            } else {
                sig.push_str(", ...");
            }
        }
        self.externs
            .push_str(&format!("declare {} @{}({})\n", ret, name, sig));
    }

    /// Interns a string literal and returns `(global name, byte length)`.
    /// The length counts the decoded bytes plus the trailing NUL.
    pub fn add_string_constant(&mut self, value: &str) -> (String, usize) {
        if let Some(entry) = self.interned.get(value) {
            return entry.clone();
        }
        let global = format!("@.str.{}", self.next_str_id);
        self.next_str_id += 1;
        let len = value.len() + 1;
        self.string_globals.push_str(&format!(
            "{} = private unnamed_addr constant [{} x i8] c\"{}\\00\"\n",
            global,
            len,
            escape_bytes(value)
        ));
        self.interned
            .insert(value.to_string(), (global.clone(), len));
        (global, len)
    }

    /// Opens a `define` with parameters given as `(ir type, register)`.
    pub fn begin_function(&mut self, name: &str, ret: &str, params: &[(String, String)]) {
        self.current.clear();
        let sig: Vec<String> = params
            .iter()
            .map(|(ir, reg)| format!("{} {}", ir, reg))
            .collect();
        self.current
            .push_str(&format!("define {} @{}({}) {{\n", ret, name, sig.join(", ")));
        self.block_terminated = false;
    }

    pub fn end_function(&mut self) {
        self.current.push_str("}\n");
        self.functions.push_str(&self.current);
        self.functions.push('\n');
        self.current.clear();
    }

    pub fn label(&mut self, name: &str) {
        self.current.push_str(&format!("{}:\n", name));
        self.block_terminated = false;
    }

    fn inst(&mut self, line: String) {
        self.current.push_str("  ");
        self.current.push_str(&line);
        self.current.push('\n');
    }

    pub fn branch(&mut self, target: &str) {
        self.inst(format!("br label %{}", target));
        self.block_terminated = true;
    }

    pub fn cond_branch(&mut self, cond: &str, then_label: &str, else_label: &str) {
        self.inst(format!(
            "br i1 {}, label %{}, label %{}",
            cond, then_label, else_label
        ));
        self.block_terminated = true;
    }

    pub fn alloca(&mut self, dest: &str, ty: &str) {
        self.inst(format!("{} = alloca {}", dest, ty));
    }

    pub fn store(&mut self, ty: &str, value: &str, ptr: &str) {
        self.inst(format!("store {} {}, {}* {}", ty, value, ty, ptr));
    }

    pub fn load(&mut self, dest: &str, ty: &str, ptr: &str) {
        self.inst(format!("{} = load {}, {}* {}", dest, ty, ty, ptr));
    }

    pub fn bitcast(&mut self, dest: &str, from: &str, value: &str, to: &str) {
        self.inst(format!("{} = bitcast {} {} to {}", dest, from, value, to));
    }

    /// Field address inside a record: index pair `0, idx`.
    pub fn gep_struct(&mut self, dest: &str, record: &str, ptr: &str, index: usize) {
        self.inst(format!(
            "{} = getelementptr %{}, %{}* {}, i32 0, i32 {}",
            dest, record, record, ptr, index
        ));
    }

    /// Element address in a heap array.
    pub fn gep_element(&mut self, dest: &str, elem_ty: &str, base: &str, index: &str) {
        self.inst(format!(
            "{} = getelementptr {}, {}* {}, i32 {}",
            dest, elem_ty, elem_ty, base, index
        ));
    }

    /// Decays a string global to its first byte.
    pub fn gep_string(&mut self, dest: &str, len: usize, global: &str) {
        self.inst(format!(
            "{} = getelementptr inbounds [{} x i8], [{} x i8]* {}, i32 0, i32 0",
            dest, len, len, global
        ));
    }

    /// Direct call; `dest` is None for void calls. Arguments are
    /// `(ir type, operand)` pairs.
    pub fn call(&mut self, dest: Option<&str>, ret: &str, callee: &str, args: &[(String, String)]) {
        let rendered: Vec<String> = args
            .iter()
            .map(|(ty, v)| format!("{} {}", ty, v))
            .collect();
        let call = format!("call {} @{}({})", ret, callee, rendered.join(", "));
        match dest {
            Some(d) => self.inst(format!("{} = {}", d, call)),
            None => self.inst(call),
        }
    }

    /// Call through a variadic signature, e.g. `call i32 (i8*, ...) @printf(…)`.
    pub fn call_variadic(
        &mut self,
        dest: Option<&str>,
        ret: &str,
        fixed_params: &[String],
        callee: &str,
        args: &[(String, String)],
    ) {
        let mut sig = fixed_params.join(", ");
        if sig.is_empty() {
            sig.push_str("...");
        } else {
            sig.push_str(", ...");
        }
        let rendered: Vec<String> = args
            .iter()
            .map(|(ty, v)| format!("{} {}", ty, v))
            .collect();
        let call = format!(
            "call {} ({}) @{}({})",
            ret,
            sig,
            callee,
            rendered.join(", ")
        );
        match dest {
            Some(d) => self.inst(format!("{} = {}", d, call)),
            None => self.inst(call),
        }
    }

    pub fn binary(&mut self, dest: &str, instr: &str, ty: &str, lhs: &str, rhs: &str) {
        self.inst(format!("{} = {} {} {}, {}", dest, instr, ty, lhs, rhs));
    }

    pub fn compare(&mut self, dest: &str, instr: &str, pred: &str, ty: &str, lhs: &str, rhs: &str) {
        self.inst(format!(
            "{} = {} {} {} {}, {}",
            dest, instr, pred, ty, lhs, rhs
        ));
    }

    pub fn fneg(&mut self, dest: &str, ty: &str, value: &str) {
        self.inst(format!("{} = fneg {} {}", dest, ty, value));
    }

    pub fn ret(&mut self, value: Option<(&str, &str)>) {
        match value {
            Some((ty, v)) => self.inst(format!("ret {} {}", ty, v)),
            None => self.inst("ret void".to_string()),
        }
        self.block_terminated = true;
    }

    pub fn unreachable(&mut self) {
        self.inst("unreachable".to_string());
        self.block_terminated = true;
    }

    /// Serializes the module: header, struct types, externs, string
    /// constants, then function bodies.
    pub fn get_output(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("; ModuleID = '{}'\n", self.module_id));
        out.push_str(&format!("target triple = \"{}\"\n\n", self.target_triple));
        for segment in [&self.struct_types, &self.externs, &self.string_globals] {
            if !segment.is_empty() {
                out.push_str(segment);
                out.push('\n');
            }
        }
        out.push_str(&self.functions);
        out
    }
}

// Escape for `c"…"` constants: printable ASCII passes through, every
// other byte (and the quote/backslash) becomes \HH.
fn escape_bytes(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        match b {
            0x20..=0x7E if b != b'"' && b != b'\\' => out.push(b as char),
            _ => out.push_str(&format!("\\{:02X}", b)),
        }
    }
    out
}
