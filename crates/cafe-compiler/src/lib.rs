//! Cafe Compiler - Python callables to JVM methods
//!
//! This crate lowers discovered Python callables (functions, instance
//! methods, constructors and the program entry point) into JVM methods with
//! a uniform calling convention: every method takes a positional argument
//! array and a keyword table, and unpacks them into named locals on entry.

pub mod batch;
pub mod callable;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod params;
pub mod prologue;
pub mod scope;
pub mod slots;

pub use batch::{transpile_class, transpile_module, BatchReport, CallableFailure};
pub use callable::{Callable, CallableKind, CONSTRUCTOR_SOURCE_NAME, ENTRY_POINT_SOURCE_NAME};
pub use config::{ConfigError, TargetConfig};
pub use descriptor::{method_descriptor, ReturnShape};
pub use error::{CompileError, CompileResult};
pub use params::{classify, Annotation, CodeMetadata, ConstValue, Parameter, ParameterKind, ParameterList};
pub use prologue::Prologue;
pub use scope::{Block, ClassScope, ModuleScope, Scope};
pub use slots::{LocalSlotTable, SlotAllocator, SlotRole};

// Re-export bytecode types for convenience
pub use cafe_bytecode::{CodeUnit, Instruction, MethodRecord, MethodRef};

/// Main transpiler entry point
#[derive(Debug, Clone, Default)]
pub struct Transpiler {
    config: TargetConfig,
}

impl Transpiler {
    pub fn new(config: TargetConfig) -> Self {
        Self { config }
    }

    /// Build a transpiler from a TOML target description
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(TargetConfig::from_toml_str(content)?))
    }

    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    /// Transpile every callable of a module
    pub fn transpile(&self, module: ModuleScope) -> BatchReport {
        transpile_module(module, &self.config)
    }

    /// Finalize a single callable
    pub fn finalize(&self, callable: Callable, scope: &dyn Scope) -> CompileResult<MethodRecord> {
        callable.finalize(scope, &self.config)
    }
}
