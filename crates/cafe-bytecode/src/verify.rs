//! Structural code verification
//!
//! These checks catch malformed code units before they reach the class
//! file writer. Operand stack typing is not checked here.

use crate::instr::CodeUnit;

/// Code verification errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VerifyError {
    /// Method has no instructions
    #[error("Method has no code")]
    EmptyCode,

    /// Invalid local variable reference
    #[error("Invalid local variable reference: index {index} (max {max}) at instruction {position}")]
    InvalidLocalRef {
        /// Referenced slot
        index: u16,
        /// Frame size
        max: u16,
        /// Instruction position
        position: usize,
    },

    /// Execution falls off end
    #[error("Execution falls off end of method at instruction {0}")]
    FallOffEnd(usize),
}

/// Verify a single code unit
pub fn verify_code(code: &CodeUnit) -> Result<(), VerifyError> {
    let last = code.instructions.last().ok_or(VerifyError::EmptyCode)?;

    for (position, instr) in code.instructions.iter().enumerate() {
        if let Some(index) = instr.local_slot() {
            if index >= code.max_locals {
                return Err(VerifyError::InvalidLocalRef {
                    index,
                    max: code.max_locals,
                    position,
                });
            }
        }
    }

    if !last.is_terminator() {
        return Err(VerifyError::FallOffEnd(code.instructions.len() - 1));
    }

    Ok(())
}
