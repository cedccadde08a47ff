//! Integration tests for callable lowering

use cafe_bytecode::{decode_code, encode_code, Opcode, SymbolTable};
use cafe_compiler::{
    classify, Block, Callable, ClassScope, CodeMetadata, CompileError, Instruction, ModuleScope,
    Parameter, ParameterList, SlotAllocator, TargetConfig, Transpiler,
};

fn positional(names: &[&str]) -> ParameterList {
    ParameterList::new(names.iter().map(|n| Parameter::positional(*n)).collect()).unwrap()
}

fn point_class() -> ClassScope {
    ClassScope::new("geometry", "Point", Some("org/python/types/Object".to_string()))
}

/// Count `load args; push i; aaload; store slot` sequences
fn unpack_sequences(code: &[Instruction]) -> usize {
    code.windows(4)
        .filter(|w| {
            matches!(
                w,
                [
                    Instruction::LoadLocal(_),
                    Instruction::PushInt(_),
                    Instruction::ArrayLoad,
                    Instruction::StoreLocal(_)
                ]
            )
        })
        .count()
}

fn invoke_specials(code: &[Instruction]) -> usize {
    code.iter()
        .filter(|instr| matches!(instr, Instruction::InvokeSpecial(_)))
        .count()
}

#[test]
fn test_slot_table_sizes() {
    for p in 0..5 {
        let names: Vec<String> = (0..p).map(|i| format!("p{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let list = positional(&refs);

        assert_eq!(SlotAllocator::allocate(true, &list).unwrap().len(), p + 3);
        assert_eq!(SlotAllocator::allocate(false, &list).unwrap().len(), p + 2);
    }
}

#[test]
fn test_unpack_sequence_counts() {
    let class = point_class();
    let config = TargetConfig::default();

    let method = Callable::instance_method("move", positional(&["self", "dx", "dy"]), None, Block::empty())
        .unwrap()
        .finalize(&class, &config)
        .unwrap();
    assert_eq!(unpack_sequences(&method.code.instructions), 3);

    let module = ModuleScope::new("geometry");
    let function = Callable::function("hypot", positional(&["a", "b", "c"]), None, Block::empty())
        .finalize(&module, &config)
        .unwrap();
    assert_eq!(unpack_sequences(&function.code.instructions), 3);
    assert_eq!(function.code.max_locals, 5);
}

#[test]
fn test_constructor_has_single_initializer_call() {
    let class = point_class();
    let config = TargetConfig::default();

    let plain = Callable::constructor(positional(&["self", "x"]), Block::empty())
        .unwrap()
        .finalize(&class, &config)
        .unwrap();
    assert_eq!(plain.name, "<init>");
    assert_eq!(plain.descriptor, "([Lorg/python/Object;Ljava/util/Hashtable;)V");
    assert!(!plain.is_static);
    assert_eq!(invoke_specials(&plain.code.instructions), 1);

    // the injected call is unconditional, even when the body calls it too
    let init = cafe_compiler::MethodRef::new("org/python/types/Object", "<init>", "()V");
    let body = Block::new(vec![
        Instruction::LoadLocal(0),
        Instruction::InvokeSpecial(init),
    ]);
    let explicit = Callable::constructor(positional(&["self"]), body)
        .unwrap()
        .finalize(&class, &config)
        .unwrap();
    assert_eq!(invoke_specials(&explicit.code.instructions), 2);
    assert_eq!(explicit.code.instructions.last(), Some(&Instruction::ReturnVoid));
}

#[test]
fn test_entry_point_export() {
    let module = ModuleScope::new("app");
    let body = Block::new(vec![Instruction::PushInt(7), Instruction::ReturnValue]);
    let record = Callable::entry_point(body)
        .finalize(&module, &TargetConfig::default())
        .unwrap();

    assert_eq!(record.name, "main");
    assert_eq!(record.descriptor, "([Ljava/lang/String;)V");
    assert!(record.is_static);
    assert_eq!(
        record.code.instructions,
        vec![Instruction::PushInt(7), Instruction::Pop, Instruction::ReturnVoid]
    );
}

#[test]
fn test_zero_parameter_instance_method() {
    let class = point_class();
    let callable = Callable::instance_method("reset", positional(&["self"]), None, Block::empty()).unwrap();
    assert_eq!(callable.allocate_slots().unwrap().len(), 3);

    let record = callable.finalize(&class, &TargetConfig::default()).unwrap();
    assert_eq!(record.code.max_locals, 3);
    assert_eq!(
        record.code.instructions,
        vec![
            Instruction::LoadLocal(1),
            Instruction::PushInt(0),
            Instruction::ArrayLoad,
            Instruction::StoreLocal(0),
            Instruction::PushNull,
            Instruction::ReturnValue,
        ]
    );
}

#[test]
fn test_classified_signature_lowers() {
    let metadata = CodeMetadata::from_json(
        r#"{
            "arg_count": 2,
            "kwonly_arg_count": 1,
            "var_names": ["self", "radius", "unit", "tmp"],
            "annotations": {"return": "no_value"}
        }"#,
    )
    .unwrap();
    let params = classify(&metadata).unwrap();
    assert_eq!(params.len(), 3);

    let class = point_class();
    let record = Transpiler::default()
        .finalize(
            Callable::instance_method(
                "scale",
                params,
                metadata.return_annotation().cloned(),
                Block::empty(),
            )
            .unwrap(),
            &class,
        )
        .unwrap();
    assert_eq!(record.code.max_locals, 5);
    assert_eq!(unpack_sequences(&record.code.instructions), 3);
    assert_eq!(record.descriptor, "([Lorg/python/Object;Ljava/util/Hashtable;)V");
    assert_eq!(record.code.instructions.last(), Some(&Instruction::ReturnVoid));
}

#[test]
fn test_wide_frame_encodes() {
    let names: Vec<String> = (0..300).map(|i| format!("p{i}")).collect();
    let params = classify(&CodeMetadata::new(300, 0, names)).unwrap();

    let module = ModuleScope::new("m");
    let record = Callable::function("many", params, None, Block::empty())
        .finalize(&module, &TargetConfig::default())
        .unwrap();
    assert_eq!(record.code.max_locals, 302);

    let bytes = encode_code(&record.code, &mut SymbolTable::new()).unwrap();
    let ops = decode_code(&bytes).unwrap();
    let last_store = ops
        .iter()
        .filter(|op| op.opcode == Opcode::Astore)
        .last()
        .unwrap();
    assert!(last_store.wide);
    assert_eq!(last_store.operand, Some(301));
}

#[test]
fn test_custom_target_names() {
    let transpiler = Transpiler::from_toml_str(
        r#"
        object_class = "rt/Value"
        kwargs_class = "rt/Kwargs"
        "#,
    )
    .unwrap();
    let module = ModuleScope::new("m");
    let record = transpiler
        .finalize(Callable::function("f", ParameterList::empty(), None, Block::empty()), &module)
        .unwrap();
    assert_eq!(record.descriptor, "([Lrt/Value;Lrt/Kwargs;)Lrt/Value;");
}

#[test]
fn test_constructor_outside_class_fails() {
    let module = ModuleScope::new("loose");
    let err = Callable::constructor(positional(&["self"]), Block::empty())
        .unwrap()
        .finalize(&module, &TargetConfig::default())
        .unwrap_err();
    assert_eq!(
        err,
        CompileError::UnresolvedSuperclass {
            class: "loose".to_string()
        }
    );
}
