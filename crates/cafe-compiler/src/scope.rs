//! Owning scopes and body blocks
//!
//! Modules own their functions and classes; classes own their methods. While
//! a batch runs, scopes are only read.

use crate::callable::Callable;
use cafe_bytecode::{Instruction, MethodRef};

/// Read-only view of the scope that owns a callable
pub trait Scope: Sync {
    /// Owning module name
    fn module_name(&self) -> &str;

    /// Owning class name, `None` for module-level callables
    fn class_name(&self) -> Option<&str> {
        None
    }

    /// Superclass internal name, used for implicit initializer calls
    fn superclass(&self) -> Option<&str> {
        None
    }

    /// Fully qualified name of a member of this scope
    fn qualify(&self, name: &str) -> String {
        match self.class_name() {
            Some(class) => format!("{}.{}.{}", self.module_name(), class, name),
            None => format!("{}.{}", self.module_name(), name),
        }
    }
}

/// Already-lowered body of a callable
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    instructions: Vec<Instruction>,
}

impl Block {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push(&mut self, instr: Instruction) {
        self.instructions.push(instr);
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn calls(&self, method: &MethodRef) -> bool {
        self.instructions.iter().any(|instr| instr.invokes(method))
    }

    /// Lower the block, ending it with the implicit `return None` when the
    /// body does not return on its own
    pub fn transpile(self) -> Vec<Instruction> {
        let mut code = self.instructions;
        if !code.last().is_some_and(Instruction::is_terminator) {
            code.push(Instruction::PushNull);
            code.push(Instruction::ReturnValue);
        }
        code
    }
}

impl From<Vec<Instruction>> for Block {
    fn from(instructions: Vec<Instruction>) -> Self {
        Self::new(instructions)
    }
}

/// A module: owns module-level functions, the entry point, and classes
#[derive(Debug, Default)]
pub struct ModuleScope {
    name: String,
    callables: Vec<Callable>,
    classes: Vec<ClassScope>,
}

impl ModuleScope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            callables: Vec::new(),
            classes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_callable(&mut self, callable: Callable) {
        self.callables.push(callable);
    }

    /// Declare a class in this module
    pub fn add_class(
        &mut self,
        name: impl Into<String>,
        superclass: Option<String>,
    ) -> &mut ClassScope {
        let class = ClassScope::new(self.name.clone(), name, superclass);
        self.classes.push(class);
        let last = self.classes.len() - 1;
        &mut self.classes[last]
    }

    pub fn callables(&self) -> &[Callable] {
        &self.callables
    }

    pub fn classes(&self) -> &[ClassScope] {
        &self.classes
    }

    pub(crate) fn take_callables(&mut self) -> Vec<Callable> {
        std::mem::take(&mut self.callables)
    }

    pub(crate) fn classes_mut(&mut self) -> &mut [ClassScope] {
        &mut self.classes
    }
}

impl Scope for ModuleScope {
    fn module_name(&self) -> &str {
        &self.name
    }
}

/// A class: owns its methods and constructor
#[derive(Debug)]
pub struct ClassScope {
    module: String,
    name: String,
    superclass: Option<String>,
    callables: Vec<Callable>,
}

impl ClassScope {
    pub fn new(module: impl Into<String>, name: impl Into<String>, superclass: Option<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            superclass,
            callables: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_callable(&mut self, callable: Callable) -> &mut Self {
        self.callables.push(callable);
        self
    }

    pub fn callables(&self) -> &[Callable] {
        &self.callables
    }

    pub(crate) fn take_callables(&mut self) -> Vec<Callable> {
        std::mem::take(&mut self.callables)
    }
}

impl Scope for ClassScope {
    fn module_name(&self) -> &str {
        &self.module
    }

    fn class_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn superclass(&self) -> Option<&str> {
        self.superclass.as_deref()
    }
}
