//! Compilation errors

use cafe_bytecode::VerifyError;
use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("Malformed signature: {reason}")]
    MalformedSignature { reason: String },

    #[error("Method {name} has no receiver parameter")]
    MissingReceiverParameter { name: String },

    #[error("Cannot resolve superclass initializer for class {class}")]
    UnresolvedSuperclass { class: String },

    #[error("Too many local variables (max 65535)")]
    TooManyLocals,

    #[error("Bytecode verification failed: {0}")]
    Verification(#[from] VerifyError),

    #[error("Internal compiler error: {message}")]
    InternalError { message: String },
}

impl CompileError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedSignature {
            reason: reason.into(),
        }
    }
}
