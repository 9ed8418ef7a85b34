//! Template functions
//!
//! The language builtins plus the helpers report templates use for dates,
//! units and money.

pub mod builtin;
pub mod date;
pub mod printf;
pub mod report;

use std::collections::HashMap;
use std::sync::OnceLock;

use serde_json::Value;

use crate::error::{ExprError, ExprResult};

/// Function implementation signature
pub type FunctionImpl = fn(&[Value]) -> ExprResult<Value>;

/// Function definition
pub struct FunctionDef {
    /// Name as written in templates (case-sensitive)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
}

impl FunctionDef {
    fn expected(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => max.to_string(),
            Some(max) => format!("{} to {}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        }
    }
}

/// Function registry
pub struct FunctionRegistry {
    functions: HashMap<&'static str, FunctionDef>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    /// Create a registry with all builtins and report helpers
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };

        registry.register_builtin_functions();
        registry.register_report_functions();

        registry
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name, def);
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }

    fn register_builtin_functions(&mut self) {
        self.register(FunctionDef {
            name: "and",
            min_args: 1,
            max_args: None,
            implementation: builtin::fn_and,
        });
        self.register(FunctionDef {
            name: "or",
            min_args: 1,
            max_args: None,
            implementation: builtin::fn_or,
        });
        self.register(FunctionDef {
            name: "not",
            min_args: 1,
            max_args: Some(1),
            implementation: builtin::fn_not,
        });
        self.register(FunctionDef {
            name: "len",
            min_args: 1,
            max_args: Some(1),
            implementation: builtin::fn_len,
        });
        self.register(FunctionDef {
            name: "index",
            min_args: 1,
            max_args: None,
            implementation: builtin::fn_index,
        });

        // Comparisons
        self.register(FunctionDef {
            name: "eq",
            min_args: 2,
            max_args: None,
            implementation: builtin::fn_eq,
        });
        self.register(FunctionDef {
            name: "ne",
            min_args: 2,
            max_args: Some(2),
            implementation: builtin::fn_ne,
        });
        self.register(FunctionDef {
            name: "lt",
            min_args: 2,
            max_args: Some(2),
            implementation: builtin::fn_lt,
        });
        self.register(FunctionDef {
            name: "le",
            min_args: 2,
            max_args: Some(2),
            implementation: builtin::fn_le,
        });
        self.register(FunctionDef {
            name: "gt",
            min_args: 2,
            max_args: Some(2),
            implementation: builtin::fn_gt,
        });
        self.register(FunctionDef {
            name: "ge",
            min_args: 2,
            max_args: Some(2),
            implementation: builtin::fn_ge,
        });

        // Printing
        self.register(FunctionDef {
            name: "print",
            min_args: 0,
            max_args: None,
            implementation: builtin::fn_print,
        });
        self.register(FunctionDef {
            name: "printf",
            min_args: 1,
            max_args: None,
            implementation: builtin::fn_printf,
        });
    }

    fn register_report_functions(&mut self) {
        self.register(FunctionDef {
            name: "fdate",
            min_args: 2,
            max_args: Some(2),
            implementation: date::fn_fdate,
        });
        self.register(FunctionDef {
            name: "nfmt",
            min_args: 2,
            max_args: Some(2),
            implementation: report::fn_nfmt,
        });
        self.register(FunctionDef {
            name: "toMeters",
            min_args: 1,
            max_args: Some(1),
            implementation: report::fn_to_meters,
        });
        self.register(FunctionDef {
            name: "toTonnes",
            min_args: 1,
            max_args: Some(1),
            implementation: report::fn_to_tonnes,
        });
        self.register(FunctionDef {
            name: "toKMeters",
            min_args: 1,
            max_args: Some(1),
            implementation: report::fn_to_kmeters,
        });
        self.register(FunctionDef {
            name: "toRubles",
            min_args: 1,
            max_args: Some(1),
            implementation: report::fn_to_rubles,
        });
    }
}

/// Global function registry (lazily initialized)
static FUNCTION_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

pub fn registry() -> &'static FunctionRegistry {
    FUNCTION_REGISTRY.get_or_init(FunctionRegistry::new)
}

/// Call a registered function after checking its argument count
pub(crate) fn call(name: &str, args: &[Value]) -> ExprResult<Value> {
    let def = registry()
        .get(name)
        .ok_or_else(|| ExprError::UnknownFunction(name.to_string()))?;

    let too_few = args.len() < def.min_args;
    let too_many = def.max_args.map_or(false, |max| args.len() > max);
    if too_few || too_many {
        return Err(ExprError::ArgumentCount {
            function: def.name.to_string(),
            expected: def.expected(),
            actual: args.len(),
        });
    }

    (def.implementation)(args)
}
