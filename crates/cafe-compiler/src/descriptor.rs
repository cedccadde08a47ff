//! Method descriptors
//!
//! Every callable shares one calling convention: it takes the positional
//! argument array and the keyword table, and returns either nothing or one
//! boxed object. Parameter types never reach the descriptor.

use crate::callable::CallableKind;
use crate::config::TargetConfig;
use crate::params::Annotation;

/// What a method hands back to its caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    NoValue,
    Boxed,
}

impl ReturnShape {
    /// Descriptor return token
    pub fn token(self, config: &TargetConfig) -> String {
        match self {
            Self::NoValue => "V".to_string(),
            Self::Boxed => config.object_descriptor(),
        }
    }
}

/// Shape declared by a return annotation; only an explicit `None` means no value
pub fn return_shape(annotation: Option<&Annotation>) -> ReturnShape {
    match annotation {
        Some(Annotation::NoValue) => ReturnShape::NoValue,
        _ => ReturnShape::Boxed,
    }
}

/// Effective shape for a callable, after variant forcing
pub fn effective_return_shape(kind: CallableKind, returns: Option<&Annotation>) -> ReturnShape {
    if kind.forces_void() {
        ReturnShape::NoValue
    } else {
        return_shape(returns)
    }
}

/// Build the method descriptor for a callable
pub fn method_descriptor(
    kind: CallableKind,
    returns: Option<&Annotation>,
    config: &TargetConfig,
) -> String {
    let shape = effective_return_shape(kind, returns);
    match kind {
        CallableKind::EntryPoint => format!("({}){}", config.argv_descriptor, shape.token(config)),
        _ => format!(
            "([{}L{};){}",
            config.object_descriptor(),
            config.kwargs_class,
            shape.token(config)
        ),
    }
}
