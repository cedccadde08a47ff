//! Callable definitions and their variants
//!
//! A [`Callable`] is created once when the source callable is discovered and
//! consumed by [`Callable::finalize`], which allocates its locals, wraps its
//! body in the prologue and produces the exported [`MethodRecord`].

use crate::config::TargetConfig;
use crate::descriptor::{effective_return_shape, method_descriptor, ReturnShape};
use crate::error::{CompileError, CompileResult};
use crate::params::{Annotation, Parameter, ParameterList};
use crate::prologue::Prologue;
use crate::scope::{Block, Scope};
use crate::slots::{LocalSlotTable, SlotAllocator};
use cafe_bytecode::{verify_code, MethodRecord, MethodRef};
use tracing::debug;

/// Source name of constructors
pub const CONSTRUCTOR_SOURCE_NAME: &str = "__init__";
/// Source name of the program entry point
pub const ENTRY_POINT_SOURCE_NAME: &str = "__main__";

/// The four callable shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallableKind {
    Function,
    InstanceMethod,
    Constructor,
    EntryPoint,
}

impl CallableKind {
    /// Whether the first declared parameter is the receiver
    pub fn has_receiver(self) -> bool {
        matches!(self, Self::InstanceMethod | Self::Constructor)
    }

    pub fn is_constructor(self) -> bool {
        self == Self::Constructor
    }

    pub fn is_instance_method(self) -> bool {
        self == Self::InstanceMethod
    }

    /// Whether the method returns no value whatever the annotation says
    pub fn forces_void(self) -> bool {
        matches!(self, Self::Constructor | Self::EntryPoint)
    }

    /// Runtime class wrapping callables of this shape
    pub fn callable_marker(self, config: &TargetConfig) -> &str {
        match self {
            Self::Function | Self::EntryPoint => &config.function_marker,
            Self::InstanceMethod => &config.instance_method_marker,
            Self::Constructor => &config.constructor_marker,
        }
    }
}

/// A callable awaiting finalization
#[derive(Debug, Clone)]
pub struct Callable {
    name: String,
    kind: CallableKind,
    declared: ParameterList,
    visible: ParameterList,
    returns: Option<Annotation>,
    is_static: bool,
    body: Block,
}

impl Callable {
    /// A module-level function
    pub fn function(
        name: impl Into<String>,
        params: ParameterList,
        returns: Option<Annotation>,
        body: Block,
    ) -> Self {
        Self {
            name: name.into(),
            kind: CallableKind::Function,
            visible: params.clone(),
            declared: params,
            returns,
            is_static: true,
            body,
        }
    }

    /// A method bound to an instance; `params` still includes the receiver
    pub fn instance_method(
        name: impl Into<String>,
        params: ParameterList,
        returns: Option<Annotation>,
        body: Block,
    ) -> CompileResult<Self> {
        Self::with_receiver(name.into(), CallableKind::InstanceMethod, params, returns, body)
    }

    /// A class constructor; `params` still includes the receiver
    pub fn constructor(params: ParameterList, body: Block) -> CompileResult<Self> {
        Self::with_receiver(
            CONSTRUCTOR_SOURCE_NAME.to_string(),
            CallableKind::Constructor,
            params,
            Some(Annotation::NoValue),
            body,
        )
    }

    /// The program entry point, taking the process argument vector
    pub fn entry_point(body: Block) -> Self {
        let params = ParameterList::single(Parameter::positional("args").annotated(Annotation::Argv));
        Self {
            name: ENTRY_POINT_SOURCE_NAME.to_string(),
            kind: CallableKind::EntryPoint,
            visible: params.clone(),
            declared: params,
            returns: Some(Annotation::NoValue),
            is_static: true,
            body,
        }
    }

    fn with_receiver(
        name: String,
        kind: CallableKind,
        params: ParameterList,
        returns: Option<Annotation>,
        body: Block,
    ) -> CompileResult<Self> {
        let visible = params
            .without_receiver()
            .ok_or_else(|| CompileError::MissingReceiverParameter { name: name.clone() })?;
        Ok(Self {
            name,
            kind,
            declared: params,
            visible,
            returns,
            is_static: false,
            body,
        })
    }

    /// Override the static flag of functions and instance methods.
    ///
    /// Constructors are never static and the entry point always is; the
    /// override is ignored for both.
    pub fn with_static(mut self, is_static: bool) -> Self {
        match self.kind {
            CallableKind::Function | CallableKind::InstanceMethod => self.is_static = is_static,
            CallableKind::Constructor | CallableKind::EntryPoint => {}
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CallableKind {
        self.kind
    }

    /// Parameters as exposed to callers, receiver included
    pub fn declared_parameters(&self) -> &ParameterList {
        &self.declared
    }

    /// Parameters that get their own local slot, receiver stripped
    pub fn parameters(&self) -> &ParameterList {
        &self.visible
    }

    pub fn returns(&self) -> Option<&Annotation> {
        self.returns.as_ref()
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn body(&self) -> &Block {
        &self.body
    }

    pub fn is_constructor(&self) -> bool {
        self.kind.is_constructor()
    }

    pub fn is_instance_method(&self) -> bool {
        self.kind.is_instance_method()
    }

    pub fn callable_marker<'c>(&self, config: &'c TargetConfig) -> &'c str {
        self.kind.callable_marker(config)
    }

    /// Method name on the target platform
    pub fn target_name<'c>(&'c self, config: &'c TargetConfig) -> &'c str {
        match self.kind {
            CallableKind::Function | CallableKind::InstanceMethod => &self.name,
            CallableKind::Constructor => &config.constructor_name,
            CallableKind::EntryPoint => &config.entry_point_name,
        }
    }

    pub fn return_shape(&self) -> ReturnShape {
        effective_return_shape(self.kind, self.returns.as_ref())
    }

    pub fn descriptor(&self, config: &TargetConfig) -> String {
        method_descriptor(self.kind, self.returns.as_ref(), config)
    }

    pub fn qualified_name(&self, scope: &dyn Scope) -> String {
        scope.qualify(&self.name)
    }

    /// Local slot layout of this callable
    pub fn allocate_slots(&self) -> CompileResult<LocalSlotTable> {
        SlotAllocator::allocate(self.kind.has_receiver(), &self.visible)
    }

    /// Superclass initializer a constructor must call
    fn superclass_initializer(
        &self,
        scope: &dyn Scope,
        config: &TargetConfig,
    ) -> CompileResult<Option<MethodRef>> {
        if !self.kind.is_constructor() {
            return Ok(None);
        }
        let superclass = scope
            .superclass()
            .ok_or_else(|| CompileError::UnresolvedSuperclass {
                class: scope
                    .class_name()
                    .map(|class| format!("{}.{}", scope.module_name(), class))
                    .unwrap_or_else(|| scope.module_name().to_string()),
            })?;
        Ok(Some(MethodRef::new(
            superclass,
            config.constructor_name.as_str(),
            config.initializer_descriptor.as_str(),
        )))
    }

    /// Allocate locals, inject the prologue and export the method record
    #[tracing::instrument(level = "debug", skip_all, fields(callable = %self.name, kind = ?self.kind))]
    pub fn finalize(self, scope: &dyn Scope, config: &TargetConfig) -> CompileResult<MethodRecord> {
        let slots = self.allocate_slots()?;
        let super_init = self.superclass_initializer(scope, config)?;
        let descriptor = self.descriptor(config);
        let name = self.target_name(config).to_string();
        let shape = self.return_shape();

        let code = Prologue::new(self.kind, &slots, &self.visible).generate(
            self.body,
            shape,
            super_init.as_ref(),
        )?;
        verify_code(&code)?;

        debug!(
            target_name = %name,
            %descriptor,
            locals = code.max_locals,
            instructions = code.len(),
            "finalized callable"
        );

        Ok(MethodRecord {
            name,
            descriptor,
            is_static: self.is_static,
            code,
        })
    }
}
