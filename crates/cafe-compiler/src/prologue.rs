//! Prologue generation
//!
//! The prologue moves caller-supplied arguments out of the positional array
//! into named locals, injects the superclass initializer call for
//! constructors, and shapes the method's returns to match its descriptor.
//!
//! Parameters are always read by position. The keyword table and parameter
//! defaults are not consulted while unpacking.

use crate::callable::CallableKind;
use crate::descriptor::ReturnShape;
use crate::error::{CompileError, CompileResult};
use crate::params::ParameterList;
use crate::scope::Block;
use crate::slots::LocalSlotTable;
use cafe_bytecode::{CodeUnit, Instruction, MethodRef};
use tracing::{debug, trace};

/// Emits the instruction prefix of one callable
pub struct Prologue<'a> {
    kind: CallableKind,
    slots: &'a LocalSlotTable,
    params: &'a ParameterList,
}

impl<'a> Prologue<'a> {
    pub fn new(kind: CallableKind, slots: &'a LocalSlotTable, params: &'a ParameterList) -> Self {
        Self {
            kind,
            slots,
            params,
        }
    }

    /// Argument unpacking plus, for constructors, the superclass initializer call
    pub fn unpack(&self, super_init: Option<&MethodRef>) -> CompileResult<Vec<Instruction>> {
        let mut setup = Vec::with_capacity(4 * (self.params.len() + 1) + 2);

        // The entry point's argument vector arrives directly in its first slot.
        if self.kind == CallableKind::EntryPoint {
            return Ok(setup);
        }

        let args = self
            .slots
            .positional_args()
            .ok_or_else(|| missing_slot("positional argument container"))?;

        if self.kind.has_receiver() {
            let receiver = self.slots.receiver().ok_or_else(|| missing_slot("receiver"))?;
            trace!(slot = receiver, "unpacking receiver");
            push_unpack(&mut setup, args, 0, receiver);
        }

        for (position, param) in self.params.iter().enumerate() {
            let slot = self
                .slots
                .named(&param.name)
                .ok_or_else(|| missing_slot(&param.name))?;
            let index = i32::try_from(position).map_err(|_| CompileError::TooManyLocals)?;
            trace!(name = %param.name, index, slot, "unpacking parameter");
            push_unpack(&mut setup, args, index, slot);
        }

        if self.kind.is_constructor() {
            let init = super_init.ok_or_else(|| CompileError::InternalError {
                message: "constructor prologue requires a superclass initializer".to_string(),
            })?;
            let receiver = self.slots.receiver().ok_or_else(|| missing_slot("receiver"))?;
            setup.push(Instruction::LoadLocal(receiver));
            setup.push(Instruction::InvokeSpecial(init.clone()));
        }

        Ok(setup)
    }

    /// Full method code: prologue, then the body, with returns shaped
    pub fn generate(
        &self,
        body: Block,
        shape: ReturnShape,
        super_init: Option<&MethodRef>,
    ) -> CompileResult<CodeUnit> {
        if let Some(init) = super_init {
            // TODO: skip the injection once an explicit superclass call in the
            // body is known to be the first use of the receiver.
            if body.calls(init) {
                debug!(
                    class = %init.class,
                    "body already calls the superclass initializer; injecting anyway"
                );
            }
        }
        if body.is_empty() {
            trace!(kind = ?self.kind, "empty body");
        }

        let mut code = self.unpack(super_init)?;
        code.extend(body.transpile());

        Ok(CodeUnit::new(self.slots.max_locals(), shape_returns(code, shape)))
    }
}

/// `args[index]` into `slot`
fn push_unpack(setup: &mut Vec<Instruction>, args: u16, index: i32, slot: u16) {
    setup.extend([
        Instruction::LoadLocal(args),
        Instruction::PushInt(index),
        Instruction::ArrayLoad,
        Instruction::StoreLocal(slot),
    ]);
}

fn missing_slot(what: &str) -> CompileError {
    CompileError::InternalError {
        message: format!("no local slot allocated for {what}"),
    }
}

/// Rewrite every return so it matches the method's return shape.
///
/// In a void method `return None` becomes a plain void return and any other
/// value return drops its value first. In a boxed method a void return
/// hands back `None`.
fn shape_returns(code: Vec<Instruction>, shape: ReturnShape) -> Vec<Instruction> {
    let mut shaped = Vec::with_capacity(code.len() + 1);
    let mut iter = code.into_iter().peekable();

    while let Some(instr) = iter.next() {
        match (shape, instr) {
            (ReturnShape::NoValue, Instruction::PushNull)
                if iter.peek() == Some(&Instruction::ReturnValue) =>
            {
                iter.next();
                shaped.push(Instruction::ReturnVoid);
            }
            (ReturnShape::NoValue, Instruction::ReturnValue) => {
                shaped.push(Instruction::Pop);
                shaped.push(Instruction::ReturnVoid);
            }
            (ReturnShape::Boxed, Instruction::ReturnVoid) => {
                shaped.push(Instruction::PushNull);
                shaped.push(Instruction::ReturnValue);
            }
            (_, instr) => shaped.push(instr),
        }
    }

    shaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Parameter;
    use crate::slots::SlotAllocator;

    fn params(names: &[&str]) -> ParameterList {
        ParameterList::new(names.iter().map(|n| Parameter::positional(*n)).collect()).unwrap()
    }

    fn unpack(args: u16, index: i32, slot: u16) -> Vec<Instruction> {
        vec![
            Instruction::LoadLocal(args),
            Instruction::PushInt(index),
            Instruction::ArrayLoad,
            Instruction::StoreLocal(slot),
        ]
    }

    #[test]
    fn test_function_unpack() {
        let list = params(&["a", "b"]);
        let slots = SlotAllocator::allocate(false, &list).unwrap();
        let setup = Prologue::new(CallableKind::Function, &slots, &list)
            .unpack(None)
            .unwrap();

        let mut expected = unpack(0, 0, 2);
        expected.extend(unpack(0, 1, 3));
        assert_eq!(setup, expected);
    }

    #[test]
    fn test_method_unpacks_receiver_first() {
        let list = params(&["x"]);
        let slots = SlotAllocator::allocate(true, &list).unwrap();
        let setup = Prologue::new(CallableKind::InstanceMethod, &slots, &list)
            .unpack(None)
            .unwrap();

        // parameter indices start at 0 regardless of the receiver
        let mut expected = unpack(1, 0, 0);
        expected.extend(unpack(1, 0, 3));
        assert_eq!(setup, expected);
    }

    #[test]
    fn test_constructor_injects_superclass_call() {
        let list = params(&[]);
        let slots = SlotAllocator::allocate(true, &list).unwrap();
        let init = MethodRef::new("Base", "<init>", "()V");
        let code = Prologue::new(CallableKind::Constructor, &slots, &list)
            .generate(Block::empty(), ReturnShape::NoValue, Some(&init))
            .unwrap();

        let mut expected = unpack(1, 0, 0);
        expected.push(Instruction::LoadLocal(0));
        expected.push(Instruction::InvokeSpecial(init));
        expected.push(Instruction::ReturnVoid);
        assert_eq!(code.instructions, expected);
        assert_eq!(code.max_locals, 3);
    }

    #[test]
    fn test_constructor_without_initializer_is_internal_error() {
        let list = params(&[]);
        let slots = SlotAllocator::allocate(true, &list).unwrap();
        let result = Prologue::new(CallableKind::Constructor, &slots, &list).unpack(None);
        assert!(matches!(result, Err(CompileError::InternalError { .. })));
    }

    #[test]
    fn test_entry_point_has_no_unpack() {
        let list = ParameterList::new(vec![Parameter::positional("args")]).unwrap();
        let slots = SlotAllocator::allocate(false, &list).unwrap();
        let code = Prologue::new(CallableKind::EntryPoint, &slots, &list)
            .generate(Block::empty(), ReturnShape::NoValue, None)
            .unwrap();
        assert_eq!(code.instructions, vec![Instruction::ReturnVoid]);
    }

    #[test]
    fn test_void_shaping() {
        let code = shape_returns(
            vec![
                Instruction::LoadLocal(2),
                Instruction::ReturnValue,
                Instruction::PushNull,
                Instruction::ReturnValue,
            ],
            ReturnShape::NoValue,
        );
        assert_eq!(
            code,
            vec![
                Instruction::LoadLocal(2),
                Instruction::Pop,
                Instruction::ReturnVoid,
                Instruction::ReturnVoid,
            ]
        );
    }

    #[test]
    fn test_boxed_shaping() {
        let code = shape_returns(vec![Instruction::ReturnVoid], ReturnShape::Boxed);
        assert_eq!(code, vec![Instruction::PushNull, Instruction::ReturnValue]);

        let untouched = vec![Instruction::PushNull, Instruction::ReturnValue];
        assert_eq!(shape_returns(untouched.clone(), ReturnShape::Boxed), untouched);
    }
}
