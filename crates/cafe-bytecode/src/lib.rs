//! Cafe Bytecode Definitions
//!
//! This crate provides the abstract instruction set, method records and the
//! JVM byte encoder used by the cafe compiler.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod encoder;
pub mod instr;
pub mod opcode;
pub mod verify;

pub use encoder::{
    decode_code, encode_code, BytecodeReader, BytecodeWriter, ConstantSink, DecodeError,
    DecodedOp, EncodeError, SymbolTable,
};
pub use instr::{CodeUnit, Instruction, MethodRecord, MethodRef};
pub use opcode::Opcode;
pub use verify::{verify_code, VerifyError};
