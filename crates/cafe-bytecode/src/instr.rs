//! Abstract instructions, code units and exported method records

use serde::{Deserialize, Serialize};

/// Reference to a method on some class, resolved through the constant pool at encode time
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    /// Internal class name (e.g. `org/python/types/Object`)
    pub class: String,
    /// Method name
    pub name: String,
    /// Method descriptor (e.g. `()V`)
    pub descriptor: String,
}

impl MethodRef {
    /// Create a new method reference
    pub fn new(
        class: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            class: class.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }

    /// Operand stack words consumed by the declared arguments (receiver excluded)
    pub fn argument_words(&self) -> usize {
        descriptor_words(&self.descriptor).0
    }

    /// Operand stack words produced by the return value
    pub fn return_words(&self) -> usize {
        descriptor_words(&self.descriptor).1
    }
}

/// Count argument and return words of a method descriptor.
///
/// `long` and `double` take two words. Malformed input is counted on a
/// best-effort basis; descriptors are produced by this toolchain.
fn descriptor_words(descriptor: &str) -> (usize, usize) {
    let bytes = descriptor.as_bytes();
    let mut i = match bytes.iter().position(|&b| b == b'(') {
        Some(open) => open + 1,
        None => return (0, 0),
    };

    let mut args = 0;
    while i < bytes.len() && bytes[i] != b')' {
        let mut is_array = false;
        while i < bytes.len() && bytes[i] == b'[' {
            is_array = true;
            i += 1;
        }
        match bytes.get(i) {
            Some(b'L') => {
                while i < bytes.len() && bytes[i] != b';' {
                    i += 1;
                }
                args += 1;
            }
            Some(b'J') | Some(b'D') if !is_array => args += 2,
            Some(_) => args += 1,
            None => break,
        }
        i += 1;
    }

    let ret = match bytes.get(i + 1) {
        Some(b'V') | None => 0,
        Some(b'J') | Some(b'D') => 2,
        Some(_) => 1,
    };
    (args, ret)
}

/// A single abstract operation.
///
/// The encoder picks the concrete JVM form (short or wide) for each of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Push the reference stored in a local slot
    LoadLocal(u16),
    /// Pop a reference into a local slot
    StoreLocal(u16),
    /// Push an int constant
    PushInt(i32),
    /// Push the null reference
    PushNull,
    /// Pop index and array, push the element
    ArrayLoad,
    /// Discard the top of stack
    Pop,
    /// Non-virtual call on the receiver (constructors, superclass methods)
    InvokeSpecial(MethodRef),
    /// Static call
    InvokeStatic(MethodRef),
    /// Virtual call on the receiver
    InvokeVirtual(MethodRef),
    /// Return the reference on top of stack
    ReturnValue,
    /// Return without a value
    ReturnVoid,
    /// No operation
    Nop,
}

impl Instruction {
    /// Check if this instruction ends control flow
    pub fn is_terminator(&self) -> bool {
        matches!(self, Self::ReturnValue | Self::ReturnVoid)
    }

    /// Local slot read or written by this instruction, if any
    pub fn local_slot(&self) -> Option<u16> {
        match self {
            Self::LoadLocal(slot) | Self::StoreLocal(slot) => Some(*slot),
            _ => None,
        }
    }

    /// `(pops, pushes)` in operand stack words
    pub fn stack_effect(&self) -> (usize, usize) {
        match self {
            Self::LoadLocal(_) | Self::PushInt(_) | Self::PushNull => (0, 1),
            Self::StoreLocal(_) | Self::Pop | Self::ReturnValue => (1, 0),
            Self::ArrayLoad => (2, 1),
            Self::InvokeSpecial(method) | Self::InvokeVirtual(method) => {
                (method.argument_words() + 1, method.return_words())
            }
            Self::InvokeStatic(method) => (method.argument_words(), method.return_words()),
            Self::ReturnVoid | Self::Nop => (0, 0),
        }
    }

    /// Check if this instruction calls exactly the given method
    pub fn invokes(&self, target: &MethodRef) -> bool {
        match self {
            Self::InvokeSpecial(method)
            | Self::InvokeStatic(method)
            | Self::InvokeVirtual(method) => method == target,
            _ => false,
        }
    }
}

/// The code of one method: its instructions plus the size of its local frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeUnit {
    /// Number of local variable slots
    pub max_locals: u16,
    /// Instruction sequence
    pub instructions: Vec<Instruction>,
}

impl CodeUnit {
    /// Create a new code unit
    pub fn new(max_locals: u16, instructions: Vec<Instruction>) -> Self {
        Self {
            max_locals,
            instructions,
        }
    }

    /// Number of instructions
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Check if the unit has no instructions
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Peak operand stack depth of a straight-line instruction sequence
    pub fn max_stack(&self) -> u16 {
        let mut depth = 0usize;
        let mut peak = 0usize;
        for instr in &self.instructions {
            let (pops, pushes) = instr.stack_effect();
            depth = depth.saturating_sub(pops) + pushes;
            peak = peak.max(depth);
        }
        u16::try_from(peak).unwrap_or(u16::MAX)
    }
}

/// An exported method, ready for the class file writer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRecord {
    /// Target method name (`<init>`, `main`, or the declared name)
    pub name: String,
    /// Method descriptor
    pub descriptor: String,
    /// Whether the method is static
    pub is_static: bool,
    /// Method code
    pub code: CodeUnit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_words() {
        assert_eq!(descriptor_words("()V"), (0, 0));
        assert_eq!(
            descriptor_words("([Lorg/python/Object;Ljava/util/Hashtable;)Lorg/python/Object;"),
            (2, 1)
        );
        assert_eq!(descriptor_words("(JI[D)D"), (4, 2));
        assert_eq!(descriptor_words("([Ljava/lang/String;)V"), (1, 0));
    }

    #[test]
    fn test_invoke_stack_effect() {
        let init = MethodRef::new("java/lang/Object", "<init>", "()V");
        assert_eq!(Instruction::InvokeSpecial(init.clone()).stack_effect(), (1, 0));
        assert_eq!(Instruction::InvokeStatic(init).stack_effect(), (0, 0));
    }

    #[test]
    fn test_max_stack_of_unpack_sequence() {
        let code = CodeUnit::new(
            3,
            vec![
                Instruction::LoadLocal(0),
                Instruction::PushInt(0),
                Instruction::ArrayLoad,
                Instruction::StoreLocal(2),
                Instruction::PushNull,
                Instruction::ReturnValue,
            ],
        );
        assert_eq!(code.max_stack(), 2);
    }

    #[test]
    fn test_empty_code_unit() {
        let code = CodeUnit::default();
        assert!(code.is_empty());
        assert_eq!(code.max_stack(), 0);
    }

    #[test]
    fn test_invokes() {
        let init = MethodRef::new("Base", "<init>", "()V");
        let other = MethodRef::new("Other", "<init>", "()V");
        assert!(Instruction::InvokeSpecial(init.clone()).invokes(&init));
        assert!(!Instruction::InvokeSpecial(other).invokes(&init));
        assert!(!Instruction::Pop.invokes(&init));
    }

    #[test]
    fn test_method_record_serializes() {
        let record = MethodRecord {
            name: "main".to_string(),
            descriptor: "([Ljava/lang/String;)V".to_string(),
            is_static: true,
            code: CodeUnit::new(1, vec![Instruction::ReturnVoid]),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: MethodRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
