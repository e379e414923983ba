//! Per-function variable environment and unique-name supply.

use std::collections::{HashMap, HashSet};

/// A stack slot holding one surface variable.
#[derive(Debug, Clone)]
pub struct VarSlot {
    pub name: String,
    /// The alloca register, `%name` (suffixed on shadowing collisions).
    pub register: String,
    /// IR type of the slot's pointee.
    pub ir_type: String,
    /// Always true under the stack-allocation convention.
    pub is_ptr: bool,
}

/// Scope stack plus the temp/label counters, all reset per function.
#[derive(Debug, Default)]
pub struct SymbolTable {
    scopes: Vec<HashMap<String, VarSlot>>,
    used_registers: HashSet<String>,
    temp_counter: u32,
    label_counter: u32,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
            used_registers: HashSet::new(),
            temp_counter: 0,
            label_counter: 0,
        }
    }

    /// Drops all state, leaving a single empty scope. Called on function
    /// entry so registers and labels restart at zero.
    pub fn reset(&mut self) {
        self.scopes.clear();
        self.scopes.push(HashMap::new());
        self.used_registers.clear();
        self.temp_counter = 0;
        self.label_counter = 0;
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Declares `name` in the innermost scope, shadowing any outer
    /// binding. A register is derived from the surface name; when the
    /// plain `%name` was already handed out in this function a numeric
    /// suffix keeps the IR register unique.
    pub fn declare(&mut self, name: &str, ir_type: &str) -> VarSlot {
        let mut register = format!("%{}", name);
        let mut n = 0u32;
        while self.used_registers.contains(&register) {
            n += 1;
            register = format!("%{}.{}", name, n);
        }
        self.used_registers.insert(register.clone());
        let slot = VarSlot {
            name: name.to_string(),
            register,
            ir_type: ir_type.to_string(),
            is_ptr: true,
        };
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), slot.clone());
        }
        slot
    }

    /// Innermost-outward lookup.
    pub fn lookup(&self, name: &str) -> Option<&VarSlot> {
        for scope in self.scopes.iter().rev() {
            if let Some(slot) = scope.get(name) {
                return Some(slot);
            }
        }
        None
    }

    /// Next temporary register: `%t0`, `%t1`, …
    pub fn fresh_temp(&mut self) -> String {
        let t = format!("%t{}", self.temp_counter);
        self.temp_counter += 1;
        t
    }

    /// Next label for a caller-chosen prefix: `if.then0`, `while.cond4`, …
    pub fn fresh_label(&mut self, prefix: &str) -> String {
        let l = format!("{}{}", prefix, self.label_counter);
        self.label_counter += 1;
        l
    }
}
