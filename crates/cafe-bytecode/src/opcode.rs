//! JVM opcodes emitted by the cafe toolchain
//!
//! Only the part of the JVM instruction set that callable prologues and
//! implicit returns need is modelled. Discriminants are the real JVM values.

/// Bytecode opcode enumeration
///
/// Opcodes are organized into categories:
/// - 0x00-0x11: Constants
/// - 0x19-0x32: Loads
/// - 0x3A-0x4E: Stores
/// - 0x57: Stack manipulation
/// - 0xB0-0xB1: Returns
/// - 0xB6-0xB8: Method invocation
/// - 0xC4: Wide operand prefix
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ===== Constants (0x00-0x11) =====
    /// No operation
    Nop = 0x00,
    /// Push null reference
    AconstNull = 0x01,
    /// Push int -1
    IconstM1 = 0x02,
    /// Push int 0
    Iconst0 = 0x03,
    /// Push int 1
    Iconst1 = 0x04,
    /// Push int 2
    Iconst2 = 0x05,
    /// Push int 3
    Iconst3 = 0x06,
    /// Push int 4
    Iconst4 = 0x07,
    /// Push int 5
    Iconst5 = 0x08,
    /// Push sign-extended byte (operand: i8)
    Bipush = 0x10,
    /// Push sign-extended short (operand: i16)
    Sipush = 0x11,

    // ===== Loads (0x19-0x32) =====
    /// Load reference from local (operand: u8 index)
    Aload = 0x19,
    /// Load reference from local 0
    Aload0 = 0x2A,
    /// Load reference from local 1
    Aload1 = 0x2B,
    /// Load reference from local 2
    Aload2 = 0x2C,
    /// Load reference from local 3
    Aload3 = 0x2D,
    /// Load reference from array: pop index, pop arrayref, push element
    Aaload = 0x32,

    // ===== Stores (0x3A-0x4E) =====
    /// Store reference into local (operand: u8 index)
    Astore = 0x3A,
    /// Store reference into local 0
    Astore0 = 0x4B,
    /// Store reference into local 1
    Astore1 = 0x4C,
    /// Store reference into local 2
    Astore2 = 0x4D,
    /// Store reference into local 3
    Astore3 = 0x4E,

    // ===== Stack (0x57) =====
    /// Pop top value from stack
    Pop = 0x57,

    // ===== Returns (0xB0-0xB1) =====
    /// Return reference from method
    Areturn = 0xB0,
    /// Return void from method
    Return = 0xB1,

    // ===== Invocation (0xB6-0xB8) =====
    /// Invoke instance method (operand: u16 constant pool index)
    Invokevirtual = 0xB6,
    /// Invoke constructor, private or superclass method (operand: u16 constant pool index)
    Invokespecial = 0xB7,
    /// Invoke static method (operand: u16 constant pool index)
    Invokestatic = 0xB8,

    // ===== Prefix (0xC4) =====
    /// Widen the next `aload`/`astore` to a u16 local index
    Wide = 0xC4,
}

impl Opcode {
    /// Convert a byte to an opcode
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Nop),
            0x01 => Some(Self::AconstNull),
            0x02 => Some(Self::IconstM1),
            0x03 => Some(Self::Iconst0),
            0x04 => Some(Self::Iconst1),
            0x05 => Some(Self::Iconst2),
            0x06 => Some(Self::Iconst3),
            0x07 => Some(Self::Iconst4),
            0x08 => Some(Self::Iconst5),
            0x10 => Some(Self::Bipush),
            0x11 => Some(Self::Sipush),

            0x19 => Some(Self::Aload),
            0x2A => Some(Self::Aload0),
            0x2B => Some(Self::Aload1),
            0x2C => Some(Self::Aload2),
            0x2D => Some(Self::Aload3),
            0x32 => Some(Self::Aaload),

            0x3A => Some(Self::Astore),
            0x4B => Some(Self::Astore0),
            0x4C => Some(Self::Astore1),
            0x4D => Some(Self::Astore2),
            0x4E => Some(Self::Astore3),

            0x57 => Some(Self::Pop),

            0xB0 => Some(Self::Areturn),
            0xB1 => Some(Self::Return),

            0xB6 => Some(Self::Invokevirtual),
            0xB7 => Some(Self::Invokespecial),
            0xB8 => Some(Self::Invokestatic),

            0xC4 => Some(Self::Wide),

            _ => None,
        }
    }

    /// Convert opcode to byte
    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Number of operand bytes following the opcode.
    ///
    /// An opcode behind a `wide` prefix takes two bytes instead of one.
    pub fn operand_size(self) -> usize {
        match self {
            Self::Bipush | Self::Aload | Self::Astore => 1,
            Self::Sipush | Self::Invokevirtual | Self::Invokespecial | Self::Invokestatic => 2,
            _ => 0,
        }
    }

    /// Check if this opcode ends the method's control flow
    pub fn is_terminator(self) -> bool {
        matches!(self, Self::Areturn | Self::Return)
    }

    /// Get the mnemonic used in listings
    pub fn name(self) -> &'static str {
        match self {
            Self::Nop => "nop",
            Self::AconstNull => "aconst_null",
            Self::IconstM1 => "iconst_m1",
            Self::Iconst0 => "iconst_0",
            Self::Iconst1 => "iconst_1",
            Self::Iconst2 => "iconst_2",
            Self::Iconst3 => "iconst_3",
            Self::Iconst4 => "iconst_4",
            Self::Iconst5 => "iconst_5",
            Self::Bipush => "bipush",
            Self::Sipush => "sipush",
            Self::Aload => "aload",
            Self::Aload0 => "aload_0",
            Self::Aload1 => "aload_1",
            Self::Aload2 => "aload_2",
            Self::Aload3 => "aload_3",
            Self::Aaload => "aaload",
            Self::Astore => "astore",
            Self::Astore0 => "astore_0",
            Self::Astore1 => "astore_1",
            Self::Astore2 => "astore_2",
            Self::Astore3 => "astore_3",
            Self::Pop => "pop",
            Self::Areturn => "areturn",
            Self::Return => "return",
            Self::Invokevirtual => "invokevirtual",
            Self::Invokespecial => "invokespecial",
            Self::Invokestatic => "invokestatic",
            Self::Wide => "wide",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_round_trip_through_byte() {
        for byte in 0..=u8::MAX {
            if let Some(opcode) = Opcode::from_u8(byte) {
                assert_eq!(opcode.to_u8(), byte, "{} decoded from wrong byte", opcode.name());
            }
        }
    }

    #[test]
    fn test_jvm_values() {
        assert_eq!(Opcode::Aload0 as u8, 0x2A);
        assert_eq!(Opcode::Aaload as u8, 0x32);
        assert_eq!(Opcode::Invokespecial as u8, 0xB7);
        assert_eq!(Opcode::Return as u8, 0xB1);
    }

    #[test]
    fn test_invalid_opcode() {
        assert_eq!(Opcode::from_u8(0xFF), None);
        assert_eq!(Opcode::from_u8(0x12), None);
    }

    #[test]
    fn test_operand_sizes() {
        assert_eq!(Opcode::Aload.operand_size(), 1);
        assert_eq!(Opcode::Aload0.operand_size(), 0);
        assert_eq!(Opcode::Sipush.operand_size(), 2);
        assert_eq!(Opcode::Invokespecial.operand_size(), 2);
        assert_eq!(Opcode::Wide.operand_size(), 0);
    }

    #[test]
    fn test_terminators() {
        assert!(Opcode::Return.is_terminator());
        assert!(Opcode::Areturn.is_terminator());
        assert!(!Opcode::Invokespecial.is_terminator());
    }
}
