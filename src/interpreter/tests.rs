use super::*;
use crate::ast::build::*;
use crate::config::{InterpreterConfig, SchedulerConfig};
use crate::diagnostics::error_codes::runtime as codes;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn eval_all(interp: &mut Interpreter, stmts: &[Stmt]) -> Result<Value, RuntimeError> {
    let mut last = Value::Nil;
    for stmt in stmts {
        last = interp.evaluate(stmt)?;
    }
    Ok(last)
}

fn run(stmts: Vec<Stmt>) -> Result<Value, RuntimeError> {
    eval_all(&mut Interpreter::new(), &stmts)
}

fn int_of_value(value: &Value) -> i128 {
    match value.concrete() {
        Value::Integer { value, .. } => *value,
        other => panic!("expected integer, got {:?}", other),
    }
}

fn string_of_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => panic!("expected string, got {:?}", other),
    }
}

fn point_def() -> Stmt {
    Stmt::Struct(struct_def("Point", vec![("x", ty("i32")), ("y", ty("i32"))]))
}

fn point(x: i128, y: i128) -> Expr {
    struct_literal("Point", vec![("x", int(x)), ("y", int(y))])
}

fn self_param() -> Parameter {
    param("self", None)
}

fn message_of(binding: &str) -> Expr {
    member(ident(binding), "message")
}

// Numerics

#[test]
fn test_integer_literal_defaults_to_i32() {
    let value = Interpreter::new().evaluate_expression(&int(5)).unwrap();
    assert!(matches!(
        value,
        Value::Integer {
            kind: IntegerKind::I32,
            value: 5
        }
    ));
}

#[test]
fn test_literal_out_of_range_raises_overflow() {
    let err = Interpreter::new()
        .evaluate_expression(&int_of(300, IntegerKind::U8))
        .unwrap_err();
    assert_eq!(err.code, codes::UNCAUGHT_RAISE);
    assert!(err.message.contains("overflow"), "{}", err.message);
}

#[test]
fn test_mixed_kinds_promote() {
    let mut interp = Interpreter::new();
    let wider = interp
        .evaluate_expression(&binary(
            BinaryOp::Add,
            int_of(1, IntegerKind::I8),
            int_of(2, IntegerKind::I64),
        ))
        .unwrap();
    assert!(matches!(wider, Value::Integer { kind: IntegerKind::I64, value: 3 }));

    let mixed = interp
        .evaluate_expression(&binary(
            BinaryOp::Add,
            int_of(1, IntegerKind::U8),
            int_of(2, IntegerKind::I8),
        ))
        .unwrap();
    assert!(matches!(mixed, Value::Integer { kind: IntegerKind::I16, value: 3 }));
}

#[test]
fn test_division_produces_float() {
    let value = Interpreter::new()
        .evaluate_expression(&binary(BinaryOp::Div, int(7), int(2)))
        .unwrap();
    assert!(matches!(value, Value::Float { value, .. } if value == 3.5));
}

#[test]
fn test_euclidean_division_and_remainder() {
    let mut interp = Interpreter::new();
    let quotient = interp
        .evaluate_expression(&binary(BinaryOp::IntDiv, int(-7), int(2)))
        .unwrap();
    let remainder = interp
        .evaluate_expression(&binary(BinaryOp::Mod, int(-7), int(2)))
        .unwrap();
    assert_eq!(int_of_value(&quotient), -4);
    assert_eq!(int_of_value(&remainder), 1);
}

#[test]
fn test_division_by_zero_is_rescuable() {
    let expr = rescue(
        binary(BinaryOp::IntDiv, int(1), int(0)),
        vec![clause(
            struct_pattern(Some(DIVISION_BY_ZERO), vec![]),
            None,
            string("caught"),
        )],
    );
    let value = Interpreter::new().evaluate_expression(&expr).unwrap();
    assert_eq!(string_of_value(&value), "caught");
}

#[test]
fn test_overflow_carries_operation() {
    let expr = rescue(
        binary(BinaryOp::Add, int(i32::MAX as i128), int(1)),
        vec![clause(
            struct_pattern(Some(OVERFLOW), vec![("operation", bind("op"))]),
            None,
            ident("op"),
        )],
    );
    let value = Interpreter::new().evaluate_expression(&expr).unwrap();
    assert_eq!(string_of_value(&value), "+");
}

#[test]
fn test_shift_out_of_range_carries_count() {
    let expr = rescue(
        binary(BinaryOp::Shl, int(1), int(32)),
        vec![clause(
            struct_pattern(Some(SHIFT_OUT_OF_RANGE), vec![("shift", bind("n"))]),
            None,
            ident("n"),
        )],
    );
    let value = Interpreter::new().evaluate_expression(&expr).unwrap();
    assert!(matches!(value, Value::Integer { kind: IntegerKind::I64, value: 32 }));
}

#[test]
fn test_standard_error_uses_registered_definition() {
    let mut interp = Interpreter::new();
    interp
        .evaluate(&Stmt::Struct(struct_def(DIVISION_BY_ZERO, vec![])))
        .unwrap();
    let expr = rescue(
        binary(BinaryOp::Mod, int(5), int(0)),
        vec![clause(
            typed(bind("e"), ty(DIVISION_BY_ZERO)),
            None,
            message_of("e"),
        )],
    );
    let value = interp.evaluate_expression(&expr).unwrap();
    assert_eq!(string_of_value(&value), "division by zero");
}

proptest! {
    #[test]
    fn test_shift_count_range(count in -70i128..70) {
        let mut interp = Interpreter::new();
        let result = interp.evaluate_expression(&binary(BinaryOp::Shl, int(1), int(count)));
        if (0..32).contains(&count) {
            prop_assert!(result.is_ok());
        } else {
            let err = result.unwrap_err();
            prop_assert!(err.message.contains("shift out of range"), "{}", err.message);
        }
    }

    #[test]
    fn test_compound_shift_count_range(count in -70i128..70) {
        let mut interp = Interpreter::new();
        interp.evaluate(&declare(bind("x"), int(1))).unwrap();
        let result = interp.evaluate(&compound(BinaryOp::Shr, "x", int(count)));
        if (0..32).contains(&count) {
            prop_assert!(result.is_ok());
        } else {
            let err = result.unwrap_err();
            prop_assert!(err.message.contains("shift out of range"), "{}", err.message);
        }
    }
}

#[test]
fn test_string_concat_and_compare() {
    let mut interp = Interpreter::new();
    let joined = interp
        .evaluate_expression(&binary(BinaryOp::Add, string("ab"), string("cd")))
        .unwrap();
    assert_eq!(string_of_value(&joined), "abcd");
    let less = interp
        .evaluate_expression(&binary(BinaryOp::Lt, string("a"), string("b")))
        .unwrap();
    assert!(matches!(less, Value::Bool(true)));
}

#[test]
fn test_logical_operators_require_bool() {
    let err = Interpreter::new()
        .evaluate_expression(&binary(BinaryOp::And, int(1), boolean(true)))
        .unwrap_err();
    assert_eq!(err.code, codes::TYPE_MISMATCH);
}

#[test]
fn test_logical_operators_short_circuit() {
    let value = Interpreter::new()
        .evaluate_expression(&binary(BinaryOp::Or, boolean(true), ident("never_bound")))
        .unwrap();
    assert!(matches!(value, Value::Bool(true)));
}

// Control flow

#[test]
fn test_while_loop_break_value() {
    let value = run(vec![
        declare(bind("i"), int(0)),
        while_loop(
            boolean(true),
            vec![
                compound(BinaryOp::Add, "i", int(1)),
                expr(if_else(
                    binary(BinaryOp::Ge, ident("i"), int(3)),
                    vec![brk(None, Some(ident("i")))],
                    None,
                )),
            ],
        ),
    ])
    .unwrap();
    assert_eq!(int_of_value(&value), 3);
}

#[test]
fn test_for_loop_over_inclusive_range() {
    let value = run(vec![
        declare(bind("total"), int(0)),
        for_loop(
            bind("n"),
            range(int(1), int(4), true),
            vec![compound(BinaryOp::Add, "total", ident("n"))],
        ),
        expr(ident("total")),
    ])
    .unwrap();
    assert_eq!(int_of_value(&value), 10);
}

#[test]
fn test_for_loop_destructures_items() {
    let value = run(vec![
        declare(bind("total"), int(0)),
        for_loop(
            array_pattern(vec![bind("a"), bind("b")], None),
            array(vec![array(vec![int(1), int(2)]), array(vec![int(3), int(4)])]),
            vec![compound(
                BinaryOp::Add,
                "total",
                binary(BinaryOp::Mul, ident("a"), ident("b")),
            )],
        ),
        expr(ident("total")),
    ])
    .unwrap();
    assert_eq!(int_of_value(&value), 14);
}

#[test]
fn test_continue_skips_iteration() {
    let value = run(vec![
        declare(bind("total"), int(0)),
        for_loop(
            bind("n"),
            range(int(1), int(5), false),
            vec![
                expr(if_else(
                    binary(BinaryOp::Eq, ident("n"), int(2)),
                    vec![cont(None)],
                    None,
                )),
                compound(BinaryOp::Add, "total", ident("n")),
            ],
        ),
        expr(ident("total")),
    ])
    .unwrap();
    assert_eq!(int_of_value(&value), 8);
}

#[test]
fn test_if_chain_picks_first_truthy_branch() {
    let expr = if_chain(
        boolean(false),
        vec![expr(int(1))],
        vec![(nil(), vec![expr(int(2))]), (int(0), vec![expr(int(3))])],
        Some(vec![expr(int(4))]),
    );
    let value = Interpreter::new().evaluate_expression(&expr).unwrap();
    assert_eq!(int_of_value(&value), 3);
}

#[test]
fn test_if_without_else_is_nil() {
    let value = Interpreter::new()
        .evaluate_expression(&if_else(boolean(false), vec![expr(int(1))], None))
        .unwrap();
    assert!(matches!(value, Value::Nil));
}

#[test]
fn test_breakpoint_exits_with_value() {
    let value = Interpreter::new()
        .evaluate_expression(&breakpoint(
            "exit",
            vec![
                expr(int(1)),
                brk(Some("exit"), Some(int(42))),
                expr(int(2)),
            ],
        ))
        .unwrap();
    assert_eq!(int_of_value(&value), 42);
}

#[test]
fn test_unknown_break_label_fails() {
    let err = run(vec![brk(Some("nowhere"), None)]).unwrap_err();
    assert_eq!(err.code, codes::INVALID_CONTROL_FLOW);
    assert!(err.message.contains("nowhere"));
}

#[test]
fn test_match_with_guard() {
    let expr = match_expr(
        int(5),
        vec![
            clause(
                bind("x"),
                Some(binary(BinaryOp::Gt, ident("x"), int(10))),
                string("big"),
            ),
            clause(bind("x"), None, string("small")),
        ],
    );
    let value = Interpreter::new().evaluate_expression(&expr).unwrap();
    assert_eq!(string_of_value(&value), "small");
}

#[test]
fn test_non_exhaustive_match_raises() {
    let expr = match_expr(int(5), vec![clause(literal(int(1)), None, nil())]);
    let err = Interpreter::new().evaluate_expression(&expr).unwrap_err();
    assert_eq!(err.code, codes::UNCAUGHT_RAISE);
    assert!(err.message.contains("Non-exhaustive"));
}

// Functions and closures

#[test]
fn test_closure_captures_environment() {
    let value = run(vec![
        Stmt::Function(function(
            "make_adder",
            vec![param("n", None)],
            None,
            vec![expr(lambda(
                vec![param("x", None)],
                binary(BinaryOp::Add, ident("n"), ident("x")),
            ))],
        )),
        declare(bind("add2"), call_fn("make_adder", vec![int(2)])),
        expr(call_fn("add2", vec![int(3)])),
    ])
    .unwrap();
    assert_eq!(int_of_value(&value), 5);
}

#[test]
fn test_return_unwinds_nested_blocks() {
    let value = run(vec![
        Stmt::Function(function(
            "first_big",
            vec![param("items", None)],
            None,
            vec![
                for_loop(
                    bind("n"),
                    ident("items"),
                    vec![expr(if_else(
                        binary(BinaryOp::Gt, ident("n"), int(10)),
                        vec![ret(Some(ident("n")))],
                        None,
                    ))],
                ),
                ret(Some(int(-1))),
            ],
        )),
        expr(call_fn(
            "first_big",
            vec![array(vec![int(3), int(30), int(300)])],
        )),
    ])
    .unwrap();
    assert_eq!(int_of_value(&value), 30);
}

#[test]
fn test_arity_mismatch_is_hard_error() {
    let err = run(vec![
        Stmt::Function(function("one", vec![param("a", None)], None, vec![])),
        expr(rescue(
            call_fn("one", vec![]),
            vec![clause(wildcard(), None, nil())],
        )),
    ])
    .unwrap_err();
    assert_eq!(err.code, codes::ARITY_MISMATCH);
}

#[test]
fn test_typed_parameter_retags_integer() {
    let value = run(vec![
        Stmt::Function(function(
            "id",
            vec![param("b", Some(ty("u8")))],
            None,
            vec![expr(ident("b"))],
        )),
        expr(call_fn("id", vec![int(200)])),
    ])
    .unwrap();
    assert!(matches!(value, Value::Integer { kind: IntegerKind::U8, value: 200 }));
}

// Patterns and assignment

#[test]
fn test_array_rest_binding() {
    let mut interp = Interpreter::new();
    interp
        .evaluate(&declare(
            array_pattern(vec![bind("first")], rest("tail")),
            array(vec![int(1), int(2), int(3)]),
        ))
        .unwrap();
    let tail = interp.evaluate_expression(&ident("tail")).unwrap();
    assert_eq!(format_value(&tail), "[2, 3]");

    interp
        .evaluate(&declare(
            array_pattern(vec![bind("only")], rest("empty")),
            array(vec![int(1)]),
        ))
        .unwrap();
    let empty = interp.evaluate_expression(&ident("empty")).unwrap();
    assert_eq!(format_value(&empty), "[]");
}

#[test]
fn test_array_pattern_too_short_fails() {
    let err = run(vec![declare(
        array_pattern(vec![bind("a"), bind("b")], None),
        array(vec![int(1)]),
    )])
    .unwrap_err();
    assert_eq!(err.code, codes::PATTERN_MISMATCH);
}

#[test]
fn test_struct_named_binding_ignores_order() {
    let value = run(vec![
        point_def(),
        declare(
            struct_pattern(Some("Point"), vec![("y", bind("b")), ("x", bind("a"))]),
            struct_literal("Point", vec![("y", int(2)), ("x", int(1))]),
        ),
        expr(binary(BinaryOp::Sub, ident("a"), ident("b"))),
    ])
    .unwrap();
    assert_eq!(int_of_value(&value), -1);
}

#[test]
fn test_positional_struct_binding() {
    let value = run(vec![
        Stmt::Struct(positional_struct_def("Pair", vec![ty("i32"), ty("String")])),
        declare(
            positional_pattern(Some("Pair"), vec![bind("n"), bind("s")]),
            struct_positional("Pair", vec![int(1), string("one")]),
        ),
        expr(ident("s")),
    ])
    .unwrap();
    assert_eq!(string_of_value(&value), "one");
}

#[test]
fn test_struct_literal_field_errors() {
    let missing = run(vec![point_def(), expr(struct_literal("Point", vec![("x", int(1))]))])
        .unwrap_err();
    assert_eq!(missing.code, codes::UNKNOWN_FIELD);
    assert!(missing.message.contains("missing field 'y'"));

    let unknown = run(vec![
        point_def(),
        expr(struct_literal(
            "Point",
            vec![("x", int(1)), ("y", int(2)), ("z", int(3))],
        )),
    ])
    .unwrap_err();
    assert_eq!(unknown.code, codes::UNKNOWN_FIELD);
}

#[test]
fn test_struct_literal_widens_integer_fields() {
    let value = run(vec![
        Stmt::Struct(struct_def("Byte", vec![("v", ty("u8"))])),
        expr(member(struct_literal("Byte", vec![("v", int(5))]), "v")),
    ])
    .unwrap();
    assert!(matches!(value, Value::Integer { kind: IntegerKind::U8, value: 5 }));
}

#[test]
fn test_typed_pattern_range_check() {
    let err = run(vec![declare(typed(bind("b"), ty("u8")), int(300))]).unwrap_err();
    assert_eq!(err.code, codes::PATTERN_MISMATCH);
}

#[test]
fn test_member_and_index_assignment() {
    let mut interp = Interpreter::new();
    eval_all(
        &mut interp,
        &[
            point_def(),
            Stmt::Struct(struct_def("Bag", vec![("items", generic("Array", vec![ty("i32")]))])),
            declare(bind("p"), point(1, 2)),
            assign_member(ident("p"), "x", None, int(10)),
            assign_member(ident("p"), "x", Some(BinaryOp::Add), int(5)),
            declare(bind("arr"), array(vec![int(1), int(2), int(3)])),
            assign_index(ident("arr"), int(1), None, int(9)),
            declare(
                bind("bag"),
                struct_literal("Bag", vec![("items", array(vec![int(1), int(2)]))]),
            ),
            assign_index(member(ident("bag"), "items"), int(0), Some(BinaryOp::Add), int(4)),
        ],
    )
    .unwrap();
    let p = interp.evaluate_expression(&ident("p")).unwrap();
    assert_eq!(format_value(&p), "Point { x: 15, y: 2 }");
    let arr = interp.evaluate_expression(&ident("arr")).unwrap();
    assert_eq!(format_value(&arr), "[1, 9, 3]");
    let bag = interp.evaluate_expression(&ident("bag")).unwrap();
    assert_eq!(format_value(&bag), "Bag { items: [5, 2] }");
}

#[test]
fn test_index_out_of_bounds_is_rescuable() {
    let expr = rescue(
        index(array(vec![int(1)]), int(5)),
        vec![clause(bind("e"), None, message_of("e"))],
    );
    let value = Interpreter::new().evaluate_expression(&expr).unwrap();
    assert_eq!(string_of_value(&value), "index 5 out of bounds for length 1");
}

#[test]
fn test_assignment_rebinds_enclosing_scope() {
    let value = run(vec![
        declare(bind("x"), int(1)),
        expr(block_expr(vec![assign(bind("x"), int(2))])),
        expr(ident("x")),
    ])
    .unwrap();
    assert_eq!(int_of_value(&value), 2);
}

// Raise, rescue, rethrow

#[test]
fn test_raise_wraps_plain_values() {
    let mut interp = Interpreter::new();
    let message = interp
        .evaluate_expression(&rescue(
            block_expr(vec![raise(string("boom"))]),
            vec![clause(bind("e"), None, message_of("e"))],
        ))
        .unwrap();
    assert_eq!(string_of_value(&message), "boom");
    let payload = interp
        .evaluate_expression(&rescue(
            block_expr(vec![raise(int(7))]),
            vec![clause(bind("e"), None, member(ident("e"), "value"))],
        ))
        .unwrap();
    assert_eq!(int_of_value(&payload), 7);
}

#[test]
fn test_rescue_does_not_catch_hard_errors() {
    let err = Interpreter::new()
        .evaluate_expression(&rescue(
            ident("nope"),
            vec![clause(wildcard(), None, int(0))],
        ))
        .unwrap_err();
    assert_eq!(err.code, codes::UNDEFINED_IDENTIFIER);
    assert_eq!(err.message, "Undefined variable 'nope'");
}

#[test]
fn test_unmatched_rescue_propagates() {
    let err = Interpreter::new()
        .evaluate_expression(&rescue(
            block_expr(vec![raise(string("boom"))]),
            vec![clause(literal(int(1)), None, int(0))],
        ))
        .unwrap_err();
    assert_eq!(err.code, codes::UNCAUGHT_RAISE);
    assert_eq!(err.message, "boom");
}

#[test]
fn test_rethrow_reraises_current_error() {
    let inner = rescue(
        block_expr(vec![raise(string("inner"))]),
        vec![clause(wildcard(), None, block_expr(vec![rethrow()]))],
    );
    let outer = rescue(inner, vec![clause(bind("e"), None, message_of("e"))]);
    let value = Interpreter::new().evaluate_expression(&outer).unwrap();
    assert_eq!(string_of_value(&value), "inner");
}

#[test]
fn test_rethrow_outside_rescue_fails() {
    let err = run(vec![rethrow()]).unwrap_err();
    assert_eq!(err.code, codes::INVALID_CONTROL_FLOW);
    assert_eq!(err.message, "rethrow outside rescue");
}

// Methods, interfaces, UFCS

fn display_for_point() -> Vec<Stmt> {
    vec![
        point_def(),
        Stmt::Interface(interface(
            "Display",
            vec![signature("to_string", vec![self_param()], Some(ty("String")))],
        )),
        Stmt::Implementation(implementation(
            "Display",
            ty("Point"),
            vec![function(
                "to_string",
                vec![self_param()],
                Some(ty("String")),
                vec![expr(interpolate(vec![
                    string("P("),
                    member(ident("self"), "x"),
                    string(")"),
                ]))],
            )],
        )),
    ]
}

#[test]
fn test_interpolation_dispatches_to_display() {
    let mut stmts = display_for_point();
    stmts.push(expr(interpolate(vec![string("at "), point(1, 2)])));
    let value = run(stmts).unwrap();
    assert_eq!(string_of_value(&value), "at P(1)");
}

#[test]
fn test_interpolation_without_display_uses_builtin_format() {
    let value = run(vec![
        point_def(),
        expr(interpolate(vec![string("at "), point(1, 2), string(" "), float(2.0)])),
    ])
    .unwrap();
    insta::assert_snapshot!(string_of_value(&value), @"at Point { x: 1, y: 2 } 2.0");
}

#[test]
fn test_interface_typed_binding_wraps_value() {
    let mut stmts = display_for_point();
    stmts.push(declare(typed(bind("d"), ty("Display")), point(3, 4)));
    stmts.push(expr(ident("d")));
    let value = run(stmts).unwrap();
    assert!(matches!(value, Value::Interface { .. }));
    assert_eq!(format_value(&value), "Point { x: 3, y: 4 }");
}

#[test]
fn test_inherent_and_static_methods() {
    let mut interp = Interpreter::new();
    eval_all(
        &mut interp,
        &[
            point_def(),
            Stmt::Methods(methods(
                ty("Point"),
                vec![
                    function(
                        "sum",
                        vec![self_param()],
                        None,
                        vec![expr(binary(
                            BinaryOp::Add,
                            member(ident("self"), "x"),
                            member(ident("self"), "y"),
                        ))],
                    ),
                    function("origin", vec![], None, vec![expr(point(0, 0))]),
                ],
            )),
        ],
    )
    .unwrap();
    let sum = interp
        .evaluate_expression(&method_call(point(1, 2), "sum", vec![]))
        .unwrap();
    assert_eq!(int_of_value(&sum), 3);
    let origin = interp
        .evaluate_expression(&member(method_call(ident("Point"), "origin", vec![]), "x"))
        .unwrap();
    assert_eq!(int_of_value(&origin), 0);
}

#[test]
fn test_interface_default_method() {
    let value = run(vec![
        point_def(),
        Stmt::Interface(interface(
            "Greeter",
            vec![
                signature("name", vec![self_param()], Some(ty("String"))),
                signature("greet", vec![self_param()], Some(ty("String"))).with_default(vec![
                    expr(binary(
                        BinaryOp::Add,
                        string("hello "),
                        method_call(ident("self"), "name", vec![]),
                    )),
                ]),
            ],
        )),
        Stmt::Implementation(implementation(
            "Greeter",
            ty("Point"),
            vec![function("name", vec![self_param()], None, vec![expr(string("p"))])],
        )),
        expr(method_call(point(1, 2), "greet", vec![])),
    ])
    .unwrap();
    assert_eq!(string_of_value(&value), "hello p");
}

#[test]
fn test_ufcs_binds_free_function() {
    let value = run(vec![
        Stmt::Function(function(
            "double",
            vec![param("n", None)],
            None,
            vec![expr(binary(BinaryOp::Mul, ident("n"), int(2)))],
        )),
        expr(method_call(int(4), "double", vec![])),
    ])
    .unwrap();
    assert_eq!(int_of_value(&value), 8);
}

#[test]
fn test_missing_method_and_free_function() {
    let err = run(vec![expr(method_call(int(4), "nothing", vec![]))]).unwrap_err();
    assert_eq!(err.code, codes::NO_METHOD);
    assert!(err.message.contains("no matching free function"), "{}", err.message);
}

#[test]
fn test_try_ufcs_never_raises() {
    let interp = Interpreter::new();
    let globals = interp.globals().clone();
    assert!(interp.try_ufcs(&globals, "missing", &Value::int(1)).is_none());
    assert!(interp.try_ufcs(&globals, "print", &Value::int(1)).is_some());
}

#[test]
fn test_builtin_size() {
    let value = Interpreter::new()
        .evaluate_expression(&method_call(array(vec![int(1), int(2), int(3)]), "size", vec![]))
        .unwrap();
    assert_eq!(int_of_value(&value), 3);
}

#[test]
fn test_union_target_registers_each_variant() {
    let value = run(vec![
        point_def(),
        Stmt::Struct(struct_def("Line", vec![])),
        Stmt::Union(union_def("Shape", vec![ty("Point"), ty("Line")])),
        Stmt::Methods(methods(
            ty("Shape"),
            vec![function("kind", vec![self_param()], None, vec![expr(string("shape"))])],
        )),
        expr(method_call(struct_literal("Line", vec![]), "kind", vec![])),
    ])
    .unwrap();
    assert_eq!(string_of_value(&value), "shape");
}

// Packages

fn geo_module() -> Module {
    module(
        Some("geo"),
        vec![],
        vec![
            Stmt::Struct(struct_def("Thing", vec![])),
            Stmt::Methods(methods(
                ty("Thing"),
                vec![
                    function("tag", vec![self_param()], None, vec![expr(string("geo"))]),
                    function("hidden", vec![self_param()], None, vec![]).private(),
                ],
            )),
            Stmt::Function(function(
                "make",
                vec![],
                None,
                vec![expr(struct_literal("Thing", vec![]))],
            )),
            Stmt::Function(function("area", vec![], None, vec![expr(int(12))])),
            Stmt::Function(function("secret", vec![], None, vec![expr(int(0))]).private()),
        ],
    )
    .with_origin("/src/geo", false)
}

fn root(imports: Vec<ImportStatement>, body: Vec<Stmt>) -> Module {
    module(None, imports, body)
}

#[test]
fn test_import_binds_package_object() {
    let mut interp = Interpreter::new();
    interp.evaluate_module(&geo_module()).unwrap();
    let value = interp
        .evaluate_module(&root(
            vec![import("geo")],
            vec![expr(method_call(ident("geo"), "area", vec![]))],
        ))
        .unwrap();
    assert_eq!(int_of_value(&value), 12);
    assert_eq!(interp.packages().len(), 1);
}

#[test]
fn test_import_selectors_and_aliases() {
    let mut interp = Interpreter::new();
    interp.evaluate_module(&geo_module()).unwrap();
    let value = interp
        .evaluate_module(&root(
            vec![import("geo").select("area", Some("size_of"))],
            vec![expr(call_fn("size_of", vec![]))],
        ))
        .unwrap();
    assert_eq!(int_of_value(&value), 12);
}

#[test]
fn test_private_symbols_are_not_importable() {
    let mut interp = Interpreter::new();
    interp.evaluate_module(&geo_module()).unwrap();
    let err = interp
        .evaluate_module(&root(vec![import("geo").select("secret", None)], vec![]))
        .unwrap_err();
    assert_eq!(err.code, codes::IMPORT_FAILURE);
    assert!(err.message.contains("private"), "{}", err.message);

    let err = interp
        .evaluate_module(&root(
            vec![import("geo").all()],
            vec![expr(call_fn("secret", vec![]))],
        ))
        .unwrap_err();
    assert_eq!(err.code, codes::UNDEFINED_IDENTIFIER);
}

#[test]
fn test_private_method_not_callable_from_outside() {
    let mut interp = Interpreter::new();
    interp.evaluate_module(&geo_module()).unwrap();
    let err = interp
        .evaluate_module(&root(
            vec![import("geo")],
            vec![expr(method_call(
                method_call(ident("geo"), "make", vec![]),
                "hidden",
                vec![],
            ))],
        ))
        .unwrap_err();
    assert_eq!(err.code, codes::NO_METHOD);
    assert!(err.message.contains("private"));
}

#[test]
fn test_same_named_types_in_distinct_packages() {
    let other = module(
        Some("shapes"),
        vec![],
        vec![
            Stmt::Struct(struct_def("Thing", vec![])),
            Stmt::Methods(methods(
                ty("Thing"),
                vec![function("tag", vec![self_param()], None, vec![expr(string("shapes"))])],
            )),
            Stmt::Function(function(
                "make",
                vec![],
                None,
                vec![expr(struct_literal("Thing", vec![]))],
            )),
        ],
    );
    let mut interp = Interpreter::new();
    interp.evaluate_module(&geo_module()).unwrap();
    interp.evaluate_module(&other).unwrap();
    let tags = interp
        .evaluate_module(&root(
            vec![import("geo"), import("shapes")],
            vec![expr(array(vec![
                method_call(method_call(ident("geo"), "make", vec![]), "tag", vec![]),
                method_call(method_call(ident("shapes"), "make", vec![]), "tag", vec![]),
            ]))],
        ))
        .unwrap();
    assert_eq!(format_value(&tags), "[geo, shapes]");
}

#[test]
fn test_package_origin_collision() {
    let mut interp = Interpreter::new();
    interp.evaluate_module(&geo_module()).unwrap();
    let clash = module(Some("geo"), vec![], vec![]).with_origin("/elsewhere/geo", false);
    let err = interp.evaluate_module(&clash).unwrap_err();
    assert_eq!(err.code, codes::PACKAGE_COLLISION);
}

#[test]
fn test_dynimport_resolves_at_use() {
    let mut interp = Interpreter::new();
    interp.evaluate_module(&geo_module()).unwrap();
    interp.evaluate(&Stmt::DynImport(import("geo"))).unwrap();
    interp
        .evaluate(&Stmt::DynImport(import("geo").select("area", None)))
        .unwrap();
    assert!(matches!(
        interp.globals().lookup("area"),
        Some(Value::DynRef { .. })
    ));

    // Defined after the dynimport, still visible through it
    interp
        .evaluate_module(
            &module(
                Some("geo"),
                vec![],
                vec![Stmt::Function(function("late", vec![], None, vec![expr(int(99))]))],
            )
            .with_origin("/src/geo", false),
        )
        .unwrap();
    let late = interp
        .evaluate_expression(&method_call(ident("geo"), "late", vec![]))
        .unwrap();
    assert_eq!(int_of_value(&late), 99);
    let area = interp.evaluate_expression(&call_fn("area", vec![])).unwrap();
    assert_eq!(int_of_value(&area), 12);
}

#[test]
fn test_dynimport_wildcard_skips_private() {
    let mut interp = Interpreter::new();
    interp.evaluate_module(&geo_module()).unwrap();
    interp
        .evaluate(&Stmt::DynImport(import("geo").all()))
        .unwrap();
    assert!(interp.globals().lookup("area").is_some());
    assert!(interp.globals().lookup("secret").is_none());
}

// Scheduler

#[test]
fn test_spawn_and_flush() {
    let mut interp = Interpreter::new();
    for n in 0..3 {
        interp.evaluate(&expr(spawn(int(n)))).unwrap();
    }
    assert_eq!(interp.pending_tasks(), 3);
    assert_eq!(interp.flush(Some(2)), 2);
    assert_eq!(interp.pending_tasks(), 1);
    assert_eq!(interp.flush(None), 1);
    assert_eq!(interp.pending_tasks(), 0);
}

#[test]
fn test_top_level_await_drives_scheduler() {
    let value = Interpreter::new()
        .evaluate_expression(&await_(spawn(binary(BinaryOp::Add, int(2), int(3)))))
        .unwrap();
    assert_eq!(int_of_value(&value), 5);
}

#[test]
fn test_suspended_task_resumes_at_await() {
    let mut interp = Interpreter::new();
    eval_all(
        &mut interp,
        &[
            declare(bind("gate"), nil()),
            declare(
                bind("t"),
                spawn(block_expr(vec![
                    expr(call_fn("print", vec![string("a1")])),
                    declare(bind("v"), await_(ident("gate"))),
                    expr(call_fn("print", vec![string("a2")])),
                    expr(binary(BinaryOp::Add, ident("v"), int(1))),
                ])),
            ),
            assign(
                bind("gate"),
                spawn(block_expr(vec![
                    expr(call_fn("print", vec![string("b")])),
                    expr(int(2)),
                ])),
            ),
        ],
    )
    .unwrap();

    assert_eq!(interp.flush(None), 2);
    assert_eq!(interp.pending_tasks(), 1);
    interp.flush(None);
    assert_eq!(interp.pending_tasks(), 0);
    assert_eq!(interp.output(), ["a1", "b", "a2"]);
    let result = interp.evaluate_expression(&await_(ident("t"))).unwrap();
    assert_eq!(int_of_value(&result), 3);
}

#[test]
fn test_suspended_for_loop_does_not_repeat_iterations() {
    let mut interp = Interpreter::new();
    interp
        .evaluate(&expr(spawn(block_expr(vec![for_loop(
            bind("n"),
            array(vec![int(1), int(2)]),
            vec![
                expr(call_fn("print", vec![ident("n")])),
                expr(await_(spawn(ident("n")))),
            ],
        )]))))
        .unwrap();
    interp.drain().unwrap();
    assert_eq!(interp.output(), ["1", "2"]);
}

#[test]
fn test_failed_task_raises_at_await() {
    let value = Interpreter::new()
        .evaluate_expression(&rescue(
            await_(spawn(block_expr(vec![raise(string("bad"))]))),
            vec![clause(bind("e"), None, message_of("e"))],
        ))
        .unwrap();
    assert_eq!(string_of_value(&value), "bad");
}

#[test]
fn test_drain_stops_at_tick_budget() {
    let config = InterpreterConfig {
        scheduler: SchedulerConfig {
            max_steps: 1024,
            tick_budget: 10,
        },
        ..InterpreterConfig::default()
    };
    let mut interp = Interpreter::with_config(config);
    interp
        .evaluate(&expr(spawn(block_expr(vec![while_loop(
            boolean(true),
            vec![expr(await_(spawn(int(1))))],
        )]))))
        .unwrap();
    let err = interp.drain().unwrap_err();
    assert_eq!(err.code, codes::SCHEDULER);
}

#[test]
fn test_evaluate_as_task() {
    let mut interp = Interpreter::new();
    let future = interp.evaluate_as_task(&int(7));
    assert_eq!(interp.pending_tasks(), 1);
    interp.drain().unwrap();
    match future {
        Value::Future(handle) => assert!(matches!(
            handle.state(),
            FutureState::Resolved(Value::Integer { value: 7, .. })
        )),
        other => panic!("expected future, got {:?}", other),
    }
}

// Externs

fn host_add_decl() -> Stmt {
    Stmt::Extern(extern_fn(
        "go",
        signature("host_add", vec![param("a", None), param("b", None)], None),
        "return a + b",
    ))
}

#[test]
fn test_extern_without_host_raises_on_call() {
    let mut interp = Interpreter::new();
    interp.evaluate(&host_add_decl()).unwrap();
    let err = interp
        .evaluate_expression(&call_fn("host_add", vec![int(1), int(2)]))
        .unwrap_err();
    assert!(err.message.contains("no host implementation"), "{}", err.message);

    interp.register_host_function("go", "host_add", |interp, args| {
        interp.apply_binary(BinaryOp::Add, &args[0], &args[1])
    });
    let value = interp
        .evaluate_expression(&call_fn("host_add", vec![int(1), int(2)]))
        .unwrap();
    assert_eq!(int_of_value(&value), 3);
}

#[test]
fn test_extern_empty_body_requires_kernel_intrinsic() {
    let err = run(vec![Stmt::Extern(extern_fn(
        "go",
        signature("foo", vec![], None),
        "",
    ))])
    .unwrap_err();
    assert_eq!(err.message, "extern function foo for go must provide a host body");

    let value = run(vec![
        Stmt::Extern(extern_fn(
            "go",
            signature("__able_string_length", vec![param("s", None)], None),
            "",
        )),
        expr(call_fn("__able_string_length", vec![string("héllo")])),
    ])
    .unwrap();
    assert_eq!(int_of_value(&value), 5);
}

#[test]
fn test_extern_is_noop_when_already_bound() {
    let value = run(vec![
        Stmt::Function(function("foo", vec![], None, vec![expr(int(1))])),
        Stmt::Extern(extern_fn("go", signature("foo", vec![], None), "")),
        expr(call_fn("foo", vec![])),
    ])
    .unwrap();
    assert_eq!(int_of_value(&value), 1);
}

// Fixtures

#[test]
fn test_fixture_result_shapes() {
    let value = run(vec![point_def(), expr(point(1, 2))]).unwrap();
    assert_eq!(
        value.to_fixture_result().to_json(),
        serde_json::json!({
            "kind": "struct_instance",
            "value": {
                "type": "Point",
                "fields": {
                    "x": {"kind": "i32", "value": 1},
                    "y": {"kind": "i32", "value": 2}
                }
            }
        })
    );
    assert_eq!(
        Value::Nil.to_fixture_result().to_json(),
        serde_json::json!({"kind": "nil"})
    );
}

#[test]
fn test_fixture_manifest_expectations() {
    let manifest = fixture::FixtureManifest::from_json(
        r#"{
            "description": "adds",
            "entry": "main.able",
            "expect": {"result": {"kind": "i32", "value": 3}, "stdout": ["hi"]}
        }"#,
    )
    .unwrap();
    let expect = manifest.expect.unwrap();
    assert!(expect
        .mismatches(&Ok(Value::int(3)), &["hi".to_string()])
        .is_empty());
    let problems = expect.mismatches(&Ok(Value::int(4)), &[]);
    assert_eq!(problems.len(), 2);
}

// Package-scoped resolution

#[test]
fn test_private_method_callable_from_own_package_method() {
    let geo = module(
        Some("geo"),
        vec![],
        vec![
            Stmt::Struct(struct_def("Pt", vec![("x", ty("i32"))])),
            Stmt::Methods(methods(
                ty("Pt"),
                vec![
                    function(
                        "get",
                        vec![self_param()],
                        None,
                        vec![expr(method_call(ident("self"), "helper", vec![]))],
                    ),
                    function(
                        "helper",
                        vec![self_param()],
                        None,
                        vec![expr(member(ident("self"), "x"))],
                    )
                    .private(),
                ],
            )),
            Stmt::Function(function(
                "make",
                vec![],
                None,
                vec![expr(struct_literal("Pt", vec![("x", int(4))]))],
            )),
        ],
    );
    let mut interp = Interpreter::new();
    interp.evaluate_module(&geo).unwrap();
    let value = interp
        .evaluate_module(&root(
            vec![import("geo")],
            vec![expr(method_call(
                method_call(ident("geo"), "make", vec![]),
                "get",
                vec![],
            ))],
        ))
        .unwrap();
    assert_eq!(int_of_value(&value), 4);

    let err = interp
        .evaluate_module(&root(
            vec![import("geo")],
            vec![expr(method_call(
                method_call(ident("geo"), "make", vec![]),
                "helper",
                vec![],
            ))],
        ))
        .unwrap_err();
    assert_eq!(err.code, codes::NO_METHOD);
}

#[test]
fn test_nested_definitions_are_not_exported() {
    let nested = module(
        Some("inner"),
        vec![],
        vec![
            expr(if_else(
                boolean(true),
                vec![Stmt::Function(function("helper", vec![], None, vec![expr(int(1))]))],
                None,
            )),
            Stmt::Function(function("top", vec![], None, vec![expr(int(2))])),
        ],
    );
    let mut interp = Interpreter::new();
    interp.evaluate_module(&nested).unwrap();
    let entry = interp.packages().get("inner").unwrap();
    assert!(entry.symbols.contains_key("top"));
    assert!(!entry.symbols.contains_key("helper"));
}

#[test]
fn test_ambiguous_method_falls_back_to_free_function() {
    let sig = || signature("name", vec![self_param()], None);
    let value = run(vec![
        Stmt::Struct(struct_def("Thing", vec![])),
        Stmt::Interface(interface("A", vec![sig()])),
        Stmt::Interface(interface("B", vec![sig()])),
        Stmt::Implementation(implementation(
            "A",
            ty("Thing"),
            vec![function("name", vec![self_param()], None, vec![expr(string("a"))])],
        )),
        Stmt::Implementation(implementation(
            "B",
            ty("Thing"),
            vec![function("name", vec![self_param()], None, vec![expr(string("b"))])],
        )),
        Stmt::Function(function(
            "name",
            vec![param("t", None)],
            None,
            vec![expr(string("free"))],
        )),
        expr(method_call(struct_literal("Thing", vec![]), "name", vec![])),
    ])
    .unwrap();
    assert_eq!(string_of_value(&value), "free");
}

#[test]
fn test_same_alias_name_in_distinct_packages() {
    let package = |name: &str, target: &str| {
        module(
            Some(name),
            vec![],
            vec![
                Stmt::TypeAlias(type_alias("Id", ty(target))),
                Stmt::Function(function(
                    "is_id",
                    vec![param("v", None)],
                    None,
                    vec![expr(match_expr(
                        ident("v"),
                        vec![
                            clause(typed(wildcard(), ty("Id")), None, boolean(true)),
                            clause(wildcard(), None, boolean(false)),
                        ],
                    ))],
                )),
            ],
        )
    };
    let mut interp = Interpreter::new();
    interp.evaluate_module(&package("nums", "i32")).unwrap();
    interp.evaluate_module(&package("words", "String")).unwrap();
    let value = interp
        .evaluate_module(&root(
            vec![import("nums"), import("words")],
            vec![expr(array(vec![
                method_call(ident("nums"), "is_id", vec![int(1)]),
                method_call(ident("words"), "is_id", vec![int(1)]),
                method_call(ident("words"), "is_id", vec![string("x")]),
            ]))],
        ))
        .unwrap();
    assert_eq!(format_value(&value), "[true, false, true]");
}

// Resumption

#[test]
fn test_resumed_task_keeps_finished_operands() {
    let mut interp = Interpreter::new();
    eval_all(
        &mut interp,
        &[
            Stmt::Function(function(
                "bump",
                vec![],
                None,
                vec![
                    expr(call_fn("print", vec![string("bump")])),
                    expr(int(1)),
                ],
            )),
            declare(bind("gate"), nil()),
            declare(
                bind("t"),
                spawn(binary(
                    BinaryOp::Add,
                    call_fn("bump", vec![]),
                    await_(ident("gate")),
                )),
            ),
            assign(bind("gate"), spawn(int(2))),
        ],
    )
    .unwrap();
    interp.drain().unwrap();
    let result = interp.evaluate_expression(&await_(ident("t"))).unwrap();
    assert_eq!(int_of_value(&result), 3);
    assert_eq!(interp.output(), ["bump"]);
}

#[test]
fn test_resumed_call_keeps_evaluated_arguments() {
    let mut interp = Interpreter::new();
    eval_all(
        &mut interp,
        &[
            Stmt::Function(function(
                "pair",
                vec![param("a", None), param("b", None)],
                None,
                vec![expr(array(vec![ident("a"), ident("b")]))],
            )),
            declare(bind("gate"), nil()),
            declare(
                bind("t"),
                spawn(call_fn(
                    "pair",
                    vec![
                        block_expr(vec![
                            expr(call_fn("print", vec![string("first")])),
                            expr(int(1)),
                        ]),
                        await_(ident("gate")),
                    ],
                )),
            ),
            assign(bind("gate"), spawn(int(2))),
        ],
    )
    .unwrap();
    interp.drain().unwrap();
    let result = interp.evaluate_expression(&await_(ident("t"))).unwrap();
    assert_eq!(format_value(&result), "[1, 2]");
    assert_eq!(interp.output(), ["first"]);
}

// Future status and process helpers

fn status_name(value: &Value) -> String {
    match value {
        Value::Struct(instance) => instance.def.name().to_string(),
        other => panic!("expected status struct, got {:?}", other),
    }
}

#[test]
fn test_future_status_transitions() {
    let mut interp = Interpreter::new();
    interp
        .evaluate(&declare(bind("f"), spawn(int(5))))
        .unwrap();
    let status = interp
        .evaluate_expression(&method_call(ident("f"), "status", vec![]))
        .unwrap();
    assert_eq!(status_name(&status), "Pending");
    let ready = interp
        .evaluate_expression(&method_call(ident("f"), "is_ready", vec![]))
        .unwrap();
    assert!(matches!(ready, Value::Bool(false)));

    interp.drain().unwrap();
    let status = interp
        .evaluate_expression(&method_call(ident("f"), "status", vec![]))
        .unwrap();
    assert_eq!(status_name(&status), "Resolved");
    let value = interp
        .evaluate_expression(&method_call(ident("f"), "value", vec![]))
        .unwrap();
    assert_eq!(int_of_value(&value), 5);
}

#[test]
fn test_failed_future_status_carries_proc_error() {
    let mut interp = Interpreter::new();
    interp
        .evaluate(&declare(
            bind("f"),
            spawn(block_expr(vec![raise(string("boom"))])),
        ))
        .unwrap();
    interp.drain().unwrap();
    let status = interp
        .evaluate_expression(&method_call(ident("f"), "status", vec![]))
        .unwrap();
    assert_eq!(status_name(&status), "Failed");
    let details = interp
        .evaluate_expression(&member(
            member(method_call(ident("f"), "status", vec![]), "error"),
            "details",
        ))
        .unwrap();
    assert_eq!(string_of_value(&details), "boom");

    let value = interp
        .evaluate_expression(&method_call(ident("f"), "value", vec![]))
        .unwrap();
    assert!(matches!(value, Value::Error(_)), "{:?}", value);
}

#[test]
fn test_value_on_pending_future_drives_it_at_top_level() {
    let value = Interpreter::new()
        .evaluate_expression(&method_call(spawn(int(9)), "value", vec![]))
        .unwrap();
    assert_eq!(int_of_value(&value), 9);
}

#[test]
fn test_proc_yield_interleaves_tasks() {
    let mut interp = Interpreter::new();
    let task = |tag: &str| {
        expr(spawn(block_expr(vec![
            expr(call_fn("print", vec![string(format!("{}1", tag))])),
            expr(call_fn("proc_yield", vec![])),
            expr(call_fn("print", vec![string(format!("{}2", tag))])),
        ])))
    };
    eval_all(&mut interp, &[task("a"), task("b")]).unwrap();
    let pending = interp
        .evaluate_expression(&call_fn("proc_pending_tasks", vec![]))
        .unwrap();
    assert_eq!(int_of_value(&pending), 2);
    interp.drain().unwrap();
    assert_eq!(interp.output(), ["a1", "b1", "a2", "b2"]);
}

#[test]
fn test_proc_yield_outside_task_is_an_error() {
    assert!(run(vec![expr(call_fn("proc_yield", vec![]))]).is_err());
}

// Ranges

#[test]
fn test_large_range_iterates_lazily() {
    let value = run(vec![
        declare(bind("seen"), int(0)),
        for_loop(
            bind("i"),
            range(int(0), int(2_000_000_000), false),
            vec![
                assign(bind("seen"), ident("i")),
                expr(if_else(
                    binary(BinaryOp::Eq, ident("i"), int(3)),
                    vec![brk(None, None)],
                    None,
                )),
            ],
        ),
        expr(ident("seen")),
    ])
    .unwrap();
    assert_eq!(int_of_value(&value), 3);
}

#[test]
fn test_range_index_size_and_format() {
    let mut interp = Interpreter::new();
    interp
        .evaluate(&declare(bind("r"), range(int(2), int(5), true)))
        .unwrap();
    let third = interp
        .evaluate_expression(&index(ident("r"), int(2)))
        .unwrap();
    assert_eq!(int_of_value(&third), 4);
    let size = interp
        .evaluate_expression(&method_call(ident("r"), "size", vec![]))
        .unwrap();
    assert_eq!(int_of_value(&size), 4);
    let value = interp.evaluate_expression(&ident("r")).unwrap();
    assert_eq!(format_value(&value), "2..5");
    let exclusive = interp
        .evaluate_expression(&range(int(2), int(5), false))
        .unwrap();
    assert_eq!(format_value(&exclusive), "2...5");
}

#[test]
fn test_resumed_interpolation_keeps_earlier_parts() {
    let mut interp = Interpreter::new();
    eval_all(
        &mut interp,
        &[
            declare(bind("gate"), nil()),
            declare(
                bind("t"),
                spawn(interpolate(vec![
                    block_expr(vec![
                        expr(call_fn("print", vec![string("left")])),
                        expr(string("a")),
                    ]),
                    await_(ident("gate")),
                ])),
            ),
            assign(bind("gate"), spawn(string("b"))),
        ],
    )
    .unwrap();
    interp.drain().unwrap();
    let result = interp.evaluate_expression(&await_(ident("t"))).unwrap();
    assert_eq!(string_of_value(&result), "ab");
    assert_eq!(interp.output(), ["left"]);
}
