//! Bytecode encoding and decoding utilities
//!
//! Turns a [`CodeUnit`] into the JVM `Code` attribute byte stream and reads
//! such streams back into opcodes for listings and tests.

use crate::instr::{CodeUnit, Instruction, MethodRef};
use crate::opcode::Opcode;
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Errors that can occur during bytecode encoding
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// Int constant needs a constant pool entry
    #[error("Int constant {0} out of sipush range")]
    IntOutOfRange(i32),
}

/// Errors that can occur during bytecode decoding
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Unexpected end of bytecode stream
    #[error("Unexpected end of bytecode at offset {0}")]
    UnexpectedEnd(usize),

    /// Invalid opcode
    #[error("Invalid opcode {0:#x} at offset {1}")]
    InvalidOpcode(u8, usize),
}

/// Resolves method references to constant pool indices
pub trait ConstantSink {
    /// Get (or create) the pool index of a `Methodref` entry
    fn method_ref(&mut self, method: &MethodRef) -> u16;
}

/// Interning constant sink.
///
/// Indices start at 1, matching the JVM constant pool numbering. Building the
/// real pool entries is left to the class file writer.
#[derive(Debug, Default)]
pub struct SymbolTable {
    methods: Vec<MethodRef>,
    index: FxHashMap<MethodRef, u16>,
}

impl SymbolTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Interned method references, in index order
    pub fn methods(&self) -> &[MethodRef] {
        &self.methods
    }

    /// Look up a previously interned reference
    pub fn get(&self, method: &MethodRef) -> Option<u16> {
        self.index.get(method).copied()
    }
}

impl ConstantSink for SymbolTable {
    fn method_ref(&mut self, method: &MethodRef) -> u16 {
        if let Some(&index) = self.index.get(method) {
            return index;
        }
        self.methods.push(method.clone());
        let index = self.methods.len() as u16;
        self.index.insert(method.clone(), index);
        index
    }
}

/// Bytecode writer for encoding instructions
///
/// Provides methods for emitting opcodes and their operands into a binary buffer.
/// Multi-byte operands are big-endian, as the JVM requires.
#[derive(Debug, Default)]
pub struct BytecodeWriter {
    buffer: Vec<u8>,
}

impl BytecodeWriter {
    /// Create a new bytecode writer
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Get the current bytecode buffer
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the writer and return the bytecode buffer
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get the current offset (length of bytecode)
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    // ===== Basic Emission =====

    /// Emit a raw byte
    pub fn emit_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Emit a 16-bit unsigned integer (big-endian)
    pub fn emit_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    /// Emit an opcode without operands
    pub fn emit_opcode(&mut self, opcode: Opcode) {
        self.emit_u8(opcode.to_u8());
    }

    // ===== Locals =====

    /// Emit ALOAD, using the short form for slots 0-3
    pub fn emit_aload(&mut self, slot: u16) -> Result<(), EncodeError> {
        const SHORT: [Opcode; 4] = [Opcode::Aload0, Opcode::Aload1, Opcode::Aload2, Opcode::Aload3];
        self.emit_local(Opcode::Aload, &SHORT, slot)
    }

    /// Emit ASTORE, using the short form for slots 0-3
    pub fn emit_astore(&mut self, slot: u16) -> Result<(), EncodeError> {
        const SHORT: [Opcode; 4] = [
            Opcode::Astore0,
            Opcode::Astore1,
            Opcode::Astore2,
            Opcode::Astore3,
        ];
        self.emit_local(Opcode::Astore, &SHORT, slot)
    }

    fn emit_local(&mut self, long: Opcode, short: &[Opcode; 4], slot: u16) -> Result<(), EncodeError> {
        match slot {
            0..=3 => self.emit_opcode(short[slot as usize]),
            4..=255 => {
                self.emit_opcode(long);
                self.emit_u8(slot as u8);
            }
            _ => {
                self.emit_opcode(Opcode::Wide);
                self.emit_opcode(long);
                self.emit_u16(slot);
            }
        }
        Ok(())
    }

    // ===== Constants =====

    /// Emit the smallest instruction pushing `value`
    pub fn emit_int(&mut self, value: i32) -> Result<(), EncodeError> {
        match value {
            -1 => self.emit_opcode(Opcode::IconstM1),
            0 => self.emit_opcode(Opcode::Iconst0),
            1 => self.emit_opcode(Opcode::Iconst1),
            2 => self.emit_opcode(Opcode::Iconst2),
            3 => self.emit_opcode(Opcode::Iconst3),
            4 => self.emit_opcode(Opcode::Iconst4),
            5 => self.emit_opcode(Opcode::Iconst5),
            v if i8::try_from(v).is_ok() => {
                self.emit_opcode(Opcode::Bipush);
                self.emit_u8(v as i8 as u8);
            }
            v if i16::try_from(v).is_ok() => {
                self.emit_opcode(Opcode::Sipush);
                self.emit_u16(v as i16 as u16);
            }
            v => return Err(EncodeError::IntOutOfRange(v)),
        }
        Ok(())
    }

    // ===== Calls =====

    /// Emit an invoke instruction against a constant pool index
    pub fn emit_invoke(&mut self, opcode: Opcode, index: u16) {
        self.emit_opcode(opcode);
        self.emit_u16(index);
    }

    /// Emit one abstract instruction
    pub fn emit_instruction(
        &mut self,
        instr: &Instruction,
        constants: &mut impl ConstantSink,
    ) -> Result<(), EncodeError> {
        match instr {
            Instruction::LoadLocal(slot) => self.emit_aload(*slot)?,
            Instruction::StoreLocal(slot) => self.emit_astore(*slot)?,
            Instruction::PushInt(value) => self.emit_int(*value)?,
            Instruction::PushNull => self.emit_opcode(Opcode::AconstNull),
            Instruction::ArrayLoad => self.emit_opcode(Opcode::Aaload),
            Instruction::Pop => self.emit_opcode(Opcode::Pop),
            Instruction::InvokeSpecial(method) => {
                let index = constants.method_ref(method);
                self.emit_invoke(Opcode::Invokespecial, index);
            }
            Instruction::InvokeStatic(method) => {
                let index = constants.method_ref(method);
                self.emit_invoke(Opcode::Invokestatic, index);
            }
            Instruction::InvokeVirtual(method) => {
                let index = constants.method_ref(method);
                self.emit_invoke(Opcode::Invokevirtual, index);
            }
            Instruction::ReturnValue => self.emit_opcode(Opcode::Areturn),
            Instruction::ReturnVoid => self.emit_opcode(Opcode::Return),
            Instruction::Nop => self.emit_opcode(Opcode::Nop),
        }
        Ok(())
    }
}

/// Encode a code unit to JVM bytecode
pub fn encode_code(
    code: &CodeUnit,
    constants: &mut impl ConstantSink,
) -> Result<Vec<u8>, EncodeError> {
    let mut writer = BytecodeWriter::new();
    for instr in &code.instructions {
        writer.emit_instruction(instr, constants)?;
    }
    Ok(writer.into_bytes())
}

/// A decoded instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedOp {
    /// Byte offset of the opcode
    pub offset: usize,
    /// The opcode
    pub opcode: Opcode,
    /// Raw operand, if the opcode has one
    pub operand: Option<u16>,
    /// Whether the opcode was read behind a `wide` prefix
    pub wide: bool,
}

/// Bytecode reader for decoding instructions
pub struct BytecodeReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BytecodeReader<'a> {
    /// Create a new reader
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Current read position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Check if there is more data to read
    pub fn has_more(&self) -> bool {
        self.position < self.data.len()
    }

    /// Read a byte
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let byte = *self
            .data
            .get(self.position)
            .ok_or(DecodeError::UnexpectedEnd(self.position))?;
        self.position += 1;
        Ok(byte)
    }

    /// Read a big-endian u16
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let hi = self.read_u8()?;
        let lo = self.read_u8()?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    /// Read the next opcode and its operand
    pub fn read_op(&mut self) -> Result<DecodedOp, DecodeError> {
        let offset = self.position;
        let byte = self.read_u8()?;
        let opcode = Opcode::from_u8(byte).ok_or(DecodeError::InvalidOpcode(byte, offset))?;
        if opcode == Opcode::Wide {
            let at = self.position;
            let byte = self.read_u8()?;
            let opcode = match Opcode::from_u8(byte) {
                Some(op @ (Opcode::Aload | Opcode::Astore)) => op,
                _ => return Err(DecodeError::InvalidOpcode(byte, at)),
            };
            return Ok(DecodedOp {
                offset,
                opcode,
                operand: Some(self.read_u16()?),
                wide: true,
            });
        }
        let operand = match opcode.operand_size() {
            0 => None,
            1 => Some(self.read_u8()? as u16),
            _ => Some(self.read_u16()?),
        };
        Ok(DecodedOp {
            offset,
            opcode,
            operand,
            wide: false,
        })
    }
}

/// Decode a full bytecode stream
pub fn decode_code(data: &[u8]) -> Result<Vec<DecodedOp>, DecodeError> {
    let mut reader = BytecodeReader::new(data);
    let mut ops = Vec::new();
    while reader.has_more() {
        ops.push(reader.read_op()?);
    }
    Ok(ops)
}
