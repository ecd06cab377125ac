//! End-to-end scenarios through the public API: evaluation, static checking,
//! and the typecheck policy that joins them.

use able::ast::build::*;
use able::diagnostics::error_codes::runtime;
use able::interpreter::format_value;
use able::prelude::*;
use pretty_assertions::assert_eq;

fn int_value(value: &Value) -> i128 {
    match value.concrete() {
        Value::Integer { value, .. } => *value,
        other => panic!("expected integer, got {:?}", other),
    }
}

fn run(stmts: &[Stmt]) -> Result<Value, RuntimeError> {
    let mut interp = Interpreter::new();
    let mut last = Value::Nil;
    for stmt in stmts {
        last = interp.evaluate(stmt)?;
    }
    Ok(last)
}

#[test]
fn while_loop_counts_to_three() {
    let value = run(&[
        declare(bind("i"), int(0)),
        while_loop(
            binary(BinaryOp::Lt, ident("i"), int(3)),
            vec![assign(bind("i"), binary(BinaryOp::Add, ident("i"), int(1)))],
        ),
        expr(ident("i")),
    ])
    .unwrap();
    assert_eq!(int_value(&value), 3);
}

#[test]
fn array_destructuring_with_rest() {
    let mut interp = Interpreter::new();
    interp
        .evaluate(&declare(
            array_pattern(vec![bind("a"), bind("b")], rest("rest")),
            array(vec![int(1), int(2), int(3)]),
        ))
        .unwrap();
    let bound = interp
        .evaluate_expression(&array(vec![ident("a"), ident("b"), ident("rest")]))
        .unwrap();
    assert_eq!(format_value(&bound), "[1, 2, [3]]");

    interp
        .evaluate(&declare(
            array_pattern(vec![bind("c"), bind("d")], rest("none")),
            array(vec![int(1), int(2)]),
        ))
        .unwrap();
    let none = interp.evaluate_expression(&ident("none")).unwrap();
    assert_eq!(format_value(&none), "[]");
}

#[test]
fn shift_range_for_literal_and_compound_shift() {
    let err = Interpreter::new()
        .evaluate_expression(&binary(BinaryOp::Shl, int(1), int(32)))
        .unwrap_err();
    assert_eq!(err.code, runtime::UNCAUGHT_RAISE);
    assert!(err.message.contains("shift out of range"), "{}", err.message);

    let value = run(&[
        declare(bind("x"), int(1)),
        compound(BinaryOp::Shl, "x", int(3)),
        expr(ident("x")),
    ])
    .unwrap();
    assert_eq!(int_value(&value), 8);
}

#[test]
fn nullable_union_alias_warns_once() {
    let alias = type_alias("MaybeInt", union(vec![nullable(ty("i32")), ty("i32")]));
    let report = TypeChecker::new().check_module(&module(None, vec![], vec![Stmt::TypeAlias(alias)]));
    assert_eq!(report.diagnostics.len(), 1);
    let diagnostic = &report.diagnostics.diagnostics()[0];
    assert_eq!(diagnostic.severity, Severity::Warning);
    assert!(diagnostic.message.contains("redundant union member i32"));
}

#[test]
fn rethrow_reaches_outer_rescue() {
    let inner = rescue(
        block_expr(vec![raise(string("oops"))]),
        vec![clause(wildcard(), None, block_expr(vec![rethrow()]))],
    );
    let outer = rescue(inner, vec![clause(wildcard(), None, string("handled"))]);
    let value = Interpreter::new().evaluate_expression(&outer).unwrap();
    assert!(matches!(value, Value::String(ref s) if s == "handled"));
}

#[test]
fn extern_without_host_body_fails() {
    let err = run(&[Stmt::Extern(extern_fn("ruby", signature("shout", vec![], None), ""))]).unwrap_err();
    assert!(err.message.contains("must provide a host body"), "{}", err.message);
}

#[test]
fn struct_patterns_bind_by_name_and_position() {
    let mut interp = Interpreter::new();
    interp
        .evaluate(&Stmt::Struct(struct_def("Size", vec![("w", ty("i32")), ("h", ty("i32"))])))
        .unwrap();
    interp
        .evaluate(&Stmt::Struct(positional_struct_def("Pair", vec![ty("i32"), ty("i32")])))
        .unwrap();
    interp
        .evaluate(&declare(
            struct_pattern(Some("Size"), vec![("h", bind("height")), ("w", bind("width"))]),
            struct_literal("Size", vec![("w", int(3)), ("h", int(4))]),
        ))
        .unwrap();
    interp
        .evaluate(&declare(
            positional_pattern(Some("Pair"), vec![bind("left"), bind("right")]),
            struct_positional("Pair", vec![int(5), int(6)]),
        ))
        .unwrap();
    let bound = interp
        .evaluate_expression(&array(vec![
            ident("width"),
            ident("height"),
            ident("left"),
            ident("right"),
        ]))
        .unwrap();
    assert_eq!(format_value(&bound), "[3, 4, 5, 6]");
}

#[test]
fn method_call_falls_back_to_free_function() {
    let value = run(&[
        Stmt::Function(function(
            "add",
            vec![param("a", None), param("b", None)],
            None,
            vec![expr(binary(BinaryOp::Add, ident("a"), ident("b")))],
        )),
        expr(method_call(int(40), "add", vec![int(2)])),
    ])
    .unwrap();
    assert_eq!(int_value(&value), 42);
}

fn thing_package(name: &str) -> Module {
    module(
        Some(name),
        vec![],
        vec![
            Stmt::Struct(struct_def("Thing", vec![("id", ty("i32"))])),
            Stmt::Function(function(
                "make",
                vec![],
                Some(ty("Thing")),
                vec![expr(struct_literal("Thing", vec![("id", int(1))]))],
            )),
        ],
    )
}

#[test]
fn same_type_name_in_two_packages_checks_cleanly() {
    let mut session = TypecheckerSession::new();
    for _ in 0..2 {
        for package in ["left", "right"] {
            let report = session.check_module(&thing_package(package));
            assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
        }
    }
    let root = module(
        None,
        vec![import("left"), import("right").select("Thing", None)],
        vec![
            expr(method_call(ident("left"), "make", vec![])),
            expr(struct_literal("Thing", vec![("id", int(2))])),
        ],
    );
    assert!(session.check_module(&root).diagnostics.is_empty());
}

fn duplicate_module() -> Module {
    module(
        None,
        vec![],
        vec![
            Stmt::Function(function("answer", vec![], None, vec![expr(int(1))])),
            Stmt::Function(function("answer", vec![], None, vec![expr(int(42))])),
            expr(call_fn("answer", vec![])),
        ],
    )
}

fn interpreter_with_mode(mode: &str) -> Interpreter {
    let config = InterpreterConfig::from_toml_str(&format!("[typecheck]\nmode = \"{}\"\n", mode)).unwrap();
    Interpreter::with_config(config)
}

#[test]
fn strict_mode_refuses_modules_with_errors() {
    let mut interp = interpreter_with_mode("strict");
    let mut session = TypecheckerSession::new();
    let err = interp.run_checked_module(&duplicate_module(), &mut session).unwrap_err();
    assert_eq!(err.code, runtime::TYPECHECK_FAILED);
    assert!(err.message.contains("duplicate declaration 'answer'"), "{}", err.message);
}

#[test]
fn warn_and_off_modes_still_evaluate() {
    for mode in ["warn", "off"] {
        let mut interp = interpreter_with_mode(mode);
        let mut session = TypecheckerSession::new();
        let value = interp.run_checked_module(&duplicate_module(), &mut session).unwrap();
        assert_eq!(int_value(&value), 42, "mode {}", mode);
    }
}

#[test]
fn strict_mode_allows_warnings() {
    let mut interp = interpreter_with_mode("strict");
    let mut session = TypecheckerSession::new();
    let module = module(
        None,
        vec![],
        vec![
            Stmt::TypeAlias(type_alias("MaybeInt", union(vec![nullable(ty("i32")), ty("i32")]))),
            expr(int(5)),
        ],
    );
    let value = interp.run_checked_module(&module, &mut session).unwrap();
    assert_eq!(int_value(&value), 5);
}

#[test]
fn checked_packages_feed_later_modules() {
    let mut interp = interpreter_with_mode("strict");
    let mut session = TypecheckerSession::new();
    interp.run_checked_module(&thing_package("left"), &mut session).unwrap();
    let root = module(
        None,
        vec![import("left").select("make", None)],
        vec![
            declare(bind("t"), call_fn("make", vec![])),
            expr(member(ident("t"), "id")),
        ],
    );
    let value = interp.run_checked_module(&root, &mut session).unwrap();
    assert_eq!(int_value(&value), 1);

    let listed: Vec<&str> = interp.packages().names().map(String::as_str).collect();
    assert_eq!(listed, vec!["left"]);
}
