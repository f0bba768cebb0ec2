//! End-to-end tests: build modules from hand-written units and run them on
//! the reference interpreter in `common`.

mod common;

use common::{AT, Fixture, Machine, build, build_err, build_with, export, func, run_checked};
use sable::core::ast::{BinaryOp, ForDirection, UnaryOp};
use sable::{
    ArithmeticFolder, CompilationError, CompilerOptions, Diagnostics, ErrorKind, FunctionFlags, HostTable, LogSink,
    ModuleBuilder, NoHost, RecursionPolicy, Span,
};

// =============================================================================
// Basic programs
// =============================================================================

#[test]
fn test_constant_sum() {
    let fx = Fixture::new();
    let b = fx.builder();
    let sum = b.binary(b.number(1, AT), BinaryOp::Add, b.number(2, AT), AT);
    let unit = b.unit(vec![export(&b, "main", &[], vec![b.ret(Some(sum), AT)])], AT);

    let module = build(&[unit]);
    let main = module.function("main").unwrap();
    assert_eq!(main.arg_count, 0);
    assert_eq!(main.local_count, 0);
    assert_eq!(run_checked(&module, "main", &[]), 3);
}

#[test]
fn test_clamp_at_zero() {
    let fx = Fixture::new();
    let b = fx.builder();
    let positive = b.binary(b.name("x", AT), BinaryOp::Gt, b.number(0, AT), AT);
    let body = vec![b.cond(
        vec![
            b.clause(positive, vec![b.ret(Some(b.name("x", AT)), AT)], AT),
            b.else_clause(vec![b.ret(Some(b.number(0, AT)), AT)], AT),
        ],
        AT,
    )];
    let unit = b.unit(vec![func(&b, "f", &["x"], body)], AT);

    let module = build(&[unit]);
    assert_eq!(module.function("f").unwrap().arg_count, 1);
    assert_eq!(run_checked(&module, "f", &[5]), 5);
    assert_eq!(run_checked(&module, "f", &[-3]), 0);
}

#[test]
fn test_arithmetic_and_unary_operators() {
    let fx = Fixture::new();
    let b = fx.builder();
    let x = || b.name("x", AT);
    // (x * 3 - 4) mod 5 + (-x) + ~0
    let expr = b.binary(
        b.binary(
            b.binary(
                b.binary(b.binary(x(), BinaryOp::Mul, b.number(3, AT), AT), BinaryOp::Sub, b.number(4, AT), AT),
                BinaryOp::Mod,
                b.number(5, AT),
                AT,
            ),
            BinaryOp::Add,
            b.unary(UnaryOp::Neg, x(), AT),
            AT,
        ),
        BinaryOp::Add,
        b.unary(UnaryOp::BitNot, b.number(0, AT), AT),
        AT,
    );
    let unit = b.unit(vec![func(&b, "calc", &["x"], vec![b.ret(Some(expr), AT)])], AT);

    let module = build(&[unit]);
    // x = 7: (21 - 4) mod 5 = 2; 2 - 7 - 1 = -6
    assert_eq!(run_checked(&module, "calc", &[7]), -6);
}

// =============================================================================
// Short-circuit evaluation
// =============================================================================

#[test]
fn test_and_skips_right_operand() {
    let fx = Fixture::new();
    let b = fx.builder();
    let bump = vec![
        b.assign(
            b.name("hits", AT),
            b.binary(b.name("hits", AT), BinaryOp::Add, b.number(1, AT), AT),
            AT,
        ),
        b.ret(Some(b.number(1, AT)), AT),
    ];
    let test = b.binary(
        b.binary(b.name("x", AT), BinaryOp::Gt, b.number(0, AT), AT),
        BinaryOp::And,
        b.call_named("bump", vec![], AT),
        AT,
    );
    let unit = b.unit(
        vec![
            b.data_decl("hits", false, None, Some(b.number(0, AT)), AT),
            func(&b, "bump", &[], bump),
            func(&b, "check", &["x"], vec![b.ret(Some(test), AT)]),
        ],
        AT,
    );
    let module = build(&[unit]);

    let mut machine = Machine::new(&module);
    assert_eq!(machine.call("check", &[0]), Ok(0));
    assert_eq!(machine.data, vec![0]);
    assert_eq!(machine.call("check", &[4]), Ok(1));
    assert_eq!(machine.data, vec![1]);
}

#[test]
fn test_or_and_not_in_conditions() {
    let fx = Fixture::new();
    let b = fx.builder();
    let x = || b.name("x", AT);
    // not (x < 0 or x > 9)
    let in_range = b.unary(
        UnaryOp::Not,
        b.binary(
            b.binary(x(), BinaryOp::Lt, b.number(0, AT), AT),
            BinaryOp::Or,
            b.binary(x(), BinaryOp::Gt, b.number(9, AT), AT),
            AT,
        ),
        AT,
    );
    let body = vec![b.cond(
        vec![
            b.clause(in_range, vec![b.ret(Some(b.number(1, AT)), AT)], AT),
            b.else_clause(vec![b.ret(Some(b.number(2, AT)), AT)], AT),
        ],
        AT,
    )];
    let unit = b.unit(vec![func(&b, "digit", &["x"], body)], AT);

    let module = build(&[unit]);
    assert_eq!(run_checked(&module, "digit", &[5]), 1);
    assert_eq!(run_checked(&module, "digit", &[-1]), 2);
    assert_eq!(run_checked(&module, "digit", &[10]), 2);
    assert!(!module.disassemble().contains("NOT"));
}

#[test]
fn test_chained_comparison_is_rejected() {
    let fx = Fixture::new();
    let b = fx.builder();
    let chained = b.binary(
        b.binary(b.name("a", AT), BinaryOp::Lt, b.name("b", AT), AT),
        BinaryOp::Lt,
        b.name("c", AT),
        AT,
    );
    let unit = b.unit(vec![func(&b, "f", &["a", "b", "c"], vec![b.ret(Some(chained), AT)])], AT);

    let (err, diagnostics) = build_err(&[unit], CompilerOptions::default());
    assert!(matches!(err, CompilationError::ChainedComparison { .. }));
    assert_eq!(err.kind(), ErrorKind::Semantics);
    assert_eq!(diagnostics.error_count(), 1);
}

// =============================================================================
// Control flow
// =============================================================================

#[test]
fn test_dense_and_sparse_case() {
    let fx = Fixture::new();
    let b = fx.builder();
    let n = |v| b.number(v, AT);
    let dense = b.case(
        b.name("k", AT),
        vec![
            b.case_clause(vec![n(1)], vec![n(10)], AT),
            b.case_clause(vec![n(2), n(3)], vec![n(20)], AT),
            b.case_clause(vec![n(4)], vec![n(40)], AT),
        ],
        Some(vec![n(-1)]),
        AT,
    );
    let sparse = b.case(
        b.name("k", AT),
        vec![
            b.case_clause(vec![n(1)], vec![n(10)], AT),
            b.case_clause(vec![n(100)], vec![n(20)], AT),
            b.case_clause(vec![n(10000)], vec![n(30)], AT),
        ],
        None,
        AT,
    );
    let unit = b.unit(
        vec![
            func(&b, "dense", &["k"], vec![b.ret(Some(dense), AT)]),
            func(&b, "sparse", &["k"], vec![b.ret(Some(sparse), AT)]),
        ],
        AT,
    );
    let module = build(&[unit]);

    let listing = module.disassemble();
    assert!(listing.contains("JUMP_TABLE"));
    assert!(listing.contains("JUMP_LOOKUP"));

    let dense: Vec<i32> = (0..6).map(|k| run_checked(&module, "dense", &[k])).collect();
    assert_eq!(dense, vec![-1, 10, 20, 20, 40, -1]);
    assert_eq!(run_checked(&module, "sparse", &[100]), 20);
    assert_eq!(run_checked(&module, "sparse", &[10000]), 30);
    assert_eq!(run_checked(&module, "sparse", &[7]), 0);
}

#[test]
fn test_for_loop_sums_inclusive_range() {
    let fx = Fixture::new();
    let b = fx.builder();
    let total = || b.name("total", AT);
    let add = b.assign(total(), b.binary(total(), BinaryOp::Add, b.name("i", AT), AT), AT);
    let body = vec![b.let_block(
        vec![b.binding("total", Some(b.number(0, AT)), AT)],
        vec![
            b.for_loop("i", b.number(1, AT), b.name("n", AT), ForDirection::Up, None, vec![add], AT),
            b.ret(Some(total()), AT),
        ],
        AT,
    )];
    let unit = b.unit(vec![func(&b, "sum", &["n"], body)], AT);

    let module = build(&[unit]);
    assert_eq!(run_checked(&module, "sum", &[10]), 55);
    assert_eq!(run_checked(&module, "sum", &[0]), 0);
}

#[test]
fn test_countdown_with_step() {
    let fx = Fixture::new();
    let b = fx.builder();
    let count = || b.name("count", AT);
    let bump = b.assign(count(), b.binary(count(), BinaryOp::Add, b.number(1, AT), AT), AT);
    let body = vec![b.let_block(
        vec![b.binding("count", None, AT)],
        vec![
            b.for_loop(
                "i",
                b.number(10, AT),
                b.number(1, AT),
                ForDirection::Down,
                Some(b.number(3, AT)),
                vec![bump],
                AT,
            ),
            b.ret(Some(count()), AT),
        ],
        AT,
    )];
    let unit = b.unit(vec![func(&b, "steps", &[], body)], AT);

    let module = build(&[unit]);
    // 10, 7, 4, 1
    assert_eq!(run_checked(&module, "steps", &[]), 4);
}

#[test]
fn test_for_loop_bound_that_wraps_is_reported() {
    let fx = Fixture::new();
    let b = fx.builder();
    let spin = b.for_loop(
        "i",
        b.number(0, AT),
        b.number(i64::from(i32::MAX), AT),
        ForDirection::Up,
        None,
        vec![],
        AT,
    );
    let unit = b.unit(vec![func(&b, "spin", &[], vec![spin])], AT);

    let mut diagnostics = Diagnostics::new();
    sable::compile(&[unit], &NoHost, CompilerOptions::default(), &mut diagnostics).unwrap();
    assert_eq!(diagnostics.warning_count(), 1);
    assert!(!diagnostics.has_errors());
}

#[test]
fn test_loop_break_and_while() {
    let fx = Fixture::new();
    let b = fx.builder();
    let i = || b.name("i", AT);
    let inc = b.assign(i(), b.binary(i(), BinaryOp::Add, b.number(1, AT), AT), AT);
    let stop = b.cond(
        vec![b.clause(
            b.binary(i(), BinaryOp::Ge, b.name("limit", AT), AT),
            vec![b.break_expr(AT)],
            AT,
        )],
        AT,
    );
    let first = vec![b.let_block(
        vec![b.binding("i", None, AT)],
        vec![b.loop_expr(vec![stop, inc], AT), b.ret(Some(i()), AT)],
        AT,
    )];

    let n = || b.name("n", AT);
    let halve = b.assign(n(), b.binary(n(), BinaryOp::Div, b.number(2, AT), AT), AT);
    let steps = || b.name("steps", AT);
    let count = b.assign(steps(), b.binary(steps(), BinaryOp::Add, b.number(1, AT), AT), AT);
    let second = vec![b.let_block(
        vec![b.binding("steps", None, AT)],
        vec![
            b.while_loop(b.binary(n(), BinaryOp::Gt, b.number(1, AT), AT), vec![halve, count], AT),
            b.ret(Some(steps()), AT),
        ],
        AT,
    )];

    let unit = b.unit(
        vec![func(&b, "upto", &["limit"], first), func(&b, "log2", &["n"], second)],
        AT,
    );
    let module = build(&[unit]);
    assert_eq!(run_checked(&module, "upto", &[6]), 6);
    assert_eq!(run_checked(&module, "log2", &[64]), 6);
    assert_eq!(run_checked(&module, "log2", &[1]), 0);
}

#[test]
fn test_sibling_scopes_share_slots() {
    let fx = Fixture::new();
    let b = fx.builder();
    let siblings = vec![
        b.let_block(vec![b.binding("a", Some(b.number(1, AT)), AT)], vec![b.name("a", AT)], AT),
        b.let_block(vec![b.binding("c", Some(b.number(2, AT)), AT)], vec![b.ret(Some(b.name("c", AT)), AT)], AT),
    ];
    let nested = vec![b.let_block(
        vec![b.binding("a", Some(b.number(1, AT)), AT)],
        vec![b.let_block(
            vec![b.binding("c", Some(b.number(2, AT)), AT)],
            vec![b.ret(Some(b.binary(b.name("a", AT), BinaryOp::Add, b.name("c", AT), AT)), AT)],
            AT,
        )],
        AT,
    )];
    let unit = b.unit(vec![func(&b, "siblings", &[], siblings), func(&b, "nested", &[], nested)], AT);

    let module = build(&[unit]);
    assert_eq!(module.function("siblings").unwrap().local_count, 1);
    assert_eq!(module.function("nested").unwrap().local_count, 2);
    assert_eq!(run_checked(&module, "siblings", &[]), 2);
    assert_eq!(run_checked(&module, "nested", &[]), 3);
}

// =============================================================================
// Data
// =============================================================================

#[test]
fn test_array_reads_and_writes() {
    let fx = Fixture::new();
    let b = fx.builder();
    let table = b.init_list(vec![b.number(4, AT), b.number(5, AT), b.number(6, AT)], AT);
    let element = || b.index(b.name("table", AT), b.name("i", AT), AT);
    let body = vec![
        b.assign(
            element(),
            b.binary(element(), BinaryOp::Mul, b.number(10, AT), AT),
            AT,
        ),
        b.ret(Some(element()), AT),
    ];
    let unit = b.unit(
        vec![
            b.data_decl("table", false, Some(b.number(3, AT)), Some(table), AT),
            func(&b, "scale", &["i"], body),
        ],
        AT,
    );
    let module = build(&[unit]);
    assert_eq!(module.data, vec![4, 5, 6]);

    let mut machine = Machine::new(&module);
    assert_eq!(machine.call("scale", &[1]), Ok(50));
    assert_eq!(machine.data, vec![4, 50, 6]);
}

// =============================================================================
// Calls and analysis
// =============================================================================

#[test]
fn test_longest_path_usage() {
    let fx = Fixture::new();
    let b = fx.builder();
    let unit = b.unit(
        vec![
            func(&b, "leaf", &["x"], vec![b.ret(Some(b.binary(b.name("x", AT), BinaryOp::Add, b.number(1, AT), AT)), AT)]),
            func(&b, "mid", &["x"], vec![b.ret(Some(b.call_named("leaf", vec![b.name("x", AT)], AT)), AT)]),
            export(
                &b,
                "top",
                &[],
                vec![b.ret(
                    Some(b.binary(
                        b.call_named("mid", vec![b.number(1, AT)], AT),
                        BinaryOp::Add,
                        b.call_named("leaf", vec![b.number(2, AT)], AT),
                        AT,
                    )),
                    AT,
                )],
            ),
        ],
        AT,
    );
    let module = build(&[unit]);

    let frame = |name: &str| {
        let f = module.function(name).unwrap();
        2 + f.local_count as u32 + f.max_eval_depth
    };
    let usage = |name: &str| module.function(name).unwrap().stack_usage.unwrap();
    assert_eq!(usage("leaf"), frame("leaf"));
    assert_eq!(usage("mid"), frame("mid") + usage("leaf"));
    assert_eq!(usage("top"), frame("top") + usage("mid"));
    assert_eq!(module.function("top").unwrap().call_depth, Some(3));
    assert_eq!(module.stats.exported.functions, 1);
    assert_eq!(module.stats.exported.max_stack_usage, Some(usage("top")));
    assert_eq!(run_checked(&module, "top", &[]), 5);
}

#[test]
fn test_recursion_is_flagged() {
    let fx = Fixture::new();
    let b = fx.builder();
    let n = || b.name("n", AT);
    let body = vec![b.cond(
        vec![
            b.clause(b.binary(n(), BinaryOp::Le, b.number(1, AT), AT), vec![b.ret(Some(b.number(1, AT)), AT)], AT),
            b.else_clause(
                vec![b.ret(
                    Some(b.binary(
                        n(),
                        BinaryOp::Mul,
                        b.call_named("fact", vec![b.binary(n(), BinaryOp::Sub, b.number(1, AT), AT)], AT),
                        AT,
                    )),
                    AT,
                )],
                AT,
            ),
        ],
        AT,
    )];
    let unit = b.unit(vec![func(&b, "fact", &["n"], body)], AT);

    let mut diagnostics = Diagnostics::new();
    let module = sable::compile(&[unit], &NoHost, CompilerOptions::default(), &mut diagnostics).unwrap();
    let fact = module.function("fact").unwrap();
    assert!(fact.flags.contains(FunctionFlags::RECURSIVE));
    assert!(!fact.flags.contains(FunctionFlags::DEPTH_KNOWN));
    assert_eq!(fact.stack_usage, None);
    assert_eq!(diagnostics.warnings().count(), 1);
    assert_eq!(Machine::new(&module).call("fact", &[5]), Ok(120));

    let (err, diagnostics) = build_err(&[unit], CompilerOptions::default().with_recursion(RecursionPolicy::Reject));
    assert!(matches!(err, CompilationError::RecursionRejected { ref name, .. } if name == "fact"));
    assert!(diagnostics.has_errors());
    assert_eq!(diagnostics.warning_count(), 0);
}

#[test]
fn test_log_sink_receives_warnings() {
    let fx = Fixture::new();
    let b = fx.builder();
    let unit = b.unit(vec![func(&b, "spin", &[], vec![b.call_named("spin", vec![], AT)])], AT);

    let mut sink = LogSink;
    let module = sable::compile(&[unit], &NoHost, CompilerOptions::default(), &mut sink).unwrap();
    assert!(module.function("spin").unwrap().flags.contains(FunctionFlags::RECURSIVE));
    assert_eq!(module.stats.all.max_call_depth, None);
}

#[test]
fn test_stack_limit() {
    let fx = Fixture::new();
    let b = fx.builder();
    let unit = b.unit(
        vec![
            func(&b, "leaf", &[], vec![b.ret(Some(b.number(1, AT)), AT)]),
            func(&b, "main", &[], vec![b.ret(Some(b.call_named("leaf", vec![], AT)), AT)]),
        ],
        AT,
    );

    let module = build_with(&[unit], &NoHost, CompilerOptions::default().with_max_stack_usage(6));
    assert_eq!(module.function("main").unwrap().stack_usage, Some(6));

    let (err, _) = build_err(&[unit], CompilerOptions::default().with_max_stack_usage(5));
    assert!(matches!(
        err,
        CompilationError::StackLimitExceeded { ref name, limit: 5, .. } if name == "main"
    ));
}

#[test]
fn test_forward_declared_callee() {
    let fx = Fixture::new();
    let b = fx.builder();
    let unit = b.unit(
        vec![
            b.proc_decl(b.ident("twice", AT), vec![b.param("n", AT)], None, false, AT),
            func(&b, "main", &[], vec![b.ret(Some(b.call_named("twice", vec![b.number(4, AT)], AT)), AT)]),
            func(&b, "twice", &["n"], vec![b.ret(Some(b.binary(b.name("n", AT), BinaryOp::Mul, b.number(2, AT), AT)), AT)]),
        ],
        AT,
    );
    let module = build(&[unit]);
    assert!(module.function("main").unwrap().address < module.function("twice").unwrap().address);
    assert_eq!(run_checked(&module, "main", &[]), 8);
}

#[test]
fn test_lambda_called_through_a_value() {
    let fx = Fixture::new();
    let b = fx.builder();
    let double = b.lambda(
        vec![b.param("y", AT)],
        vec![b.ret(Some(b.binary(b.name("y", AT), BinaryOp::Mul, b.number(2, AT), AT)), AT)],
        AT,
    );
    let unit = b.unit(
        vec![
            func(&b, "apply", &["f", "x"], vec![b.ret(Some(b.call(b.name("f", AT), vec![b.name("x", AT)], AT)), AT)]),
            func(&b, "main", &[], vec![b.ret(Some(b.call_named("apply", vec![double, b.number(21, AT)], AT)), AT)]),
        ],
        AT,
    );

    let mut diagnostics = Diagnostics::new();
    let module = sable::compile(&[unit], &NoHost, CompilerOptions::default(), &mut diagnostics).unwrap();
    assert!(module.stats.calls_indirectly);
    let lambda = module.function("lambda#0").unwrap();
    assert!(lambda.flags.contains(FunctionFlags::LAMBDA));
    assert!(module.exports.get("lambda#0").is_none());
    assert!(module.function("apply").unwrap().flags.contains(FunctionFlags::CALLS_INDIRECTLY));
    assert_eq!(module.function("main").unwrap().stack_usage, None);
    assert_eq!(diagnostics.warning_count(), 1);
    assert_eq!(Machine::new(&module).call("main", &[]), Ok(42));
}

#[test]
fn test_native_host_function() {
    let fx = Fixture::new();
    let b = fx.builder();
    let host = HostTable::new().with_native("twice", 1, Some(1));
    let unit = b.unit(
        vec![func(&b, "main", &[], vec![b.ret(Some(b.call_named("twice", vec![b.number(21, AT)], AT)), AT)])],
        AT,
    );

    let module = build_with(&[unit], &host, CompilerOptions::default());
    let main = module.function("main").unwrap();
    assert_eq!(main.call_depth, Some(1));
    assert_eq!(main.stack_usage, Some(3));

    let mut machine = Machine::new(&module).native(1, |args| args[0] * 2);
    assert_eq!(machine.call("main", &[]), Ok(42));
    assert!(machine.peak() <= 3);
}

// =============================================================================
// Host globals
// =============================================================================

#[test]
fn test_host_global_store_leaves_module_data_alone() {
    let fx = Fixture::new();
    let b = fx.builder();
    let host = HostTable::new().with_global("ticks", 0);
    let store = b.assign(b.name("ticks", AT), b.number(99, AT), AT);
    let unit = b.unit(
        vec![
            b.data_decl("seed", false, None, Some(b.number(7, AT)), AT),
            func(&b, "main", &[], vec![store, b.ret(Some(b.name("seed", AT)), AT)]),
        ],
        AT,
    );

    let module = build_with(&[unit], &host, CompilerOptions::default());
    assert_eq!(module.data, vec![0, 7]);
    assert_eq!(module.global("seed").map(|g| g.global.offset), Some(1));
    assert!(module.global("ticks").is_none());

    let mut machine = Machine::new(&module);
    assert_eq!(machine.call("main", &[]), Ok(7));
    assert_eq!(machine.data, vec![99, 7]);
}

#[test]
fn test_host_global_load() {
    let fx = Fixture::new();
    let b = fx.builder();
    let host = HostTable::new().with_global("ticks", 1);
    let next = b.binary(b.name("ticks", AT), BinaryOp::Add, b.number(1, AT), AT);
    let unit = b.unit(vec![func(&b, "next", &[], vec![b.ret(Some(next), AT)])], AT);

    let module = build_with(&[unit], &host, CompilerOptions::default());
    assert_eq!(module.data.len(), 2);

    let mut machine = Machine::new(&module);
    machine.data[1] = 41;
    assert_eq!(machine.call("next", &[]), Ok(42));
}

#[test]
fn test_host_global_outside_data_segment() {
    let fx = Fixture::new();
    let b = fx.builder();
    let host = HostTable::new().with_global("far", 65_536);
    let unit = b.unit(vec![func(&b, "main", &[], vec![b.ret(Some(b.name("far", Span::new(2, 9))), AT)])], AT);

    let mut diagnostics = Diagnostics::new();
    let err = sable::compile(&[unit], &host, CompilerOptions::default(), &mut diagnostics).unwrap_err();
    assert!(matches!(err, CompilationError::ValueOutOfRange { value: 65_537, .. }));
    assert_eq!(err.span(), Span::new(2, 9));
    assert!(diagnostics.has_errors());
}

#[test]
fn test_host_range_growing_over_module_globals() {
    let fx = Fixture::new();
    let b = fx.builder();
    let first = b.unit(vec![b.data_decl("seed", false, None, None, AT)], AT);
    let second = b.unit(vec![func(&b, "main", &[], vec![b.ret(Some(b.name("ticks", AT)), AT)])], AT);
    let host = HostTable::new().with_global("ticks", 0);

    let mut diagnostics = Diagnostics::new();
    let mut builder = ModuleBuilder::new(CompilerOptions::default());
    builder.compile_unit(&first, &NoHost, &ArithmeticFolder, &mut diagnostics).unwrap();
    let err = builder
        .compile_unit(&second, &host, &ArithmeticFolder, &mut diagnostics)
        .unwrap_err();
    assert!(matches!(err, CompilationError::GlobalOverlap { host_end: 1, module_base: 0, .. }));
    assert_eq!(diagnostics.error_count(), 1);
}

// =============================================================================
// Modules
// =============================================================================

#[test]
fn test_units_share_one_module() {
    let fx = Fixture::new();
    let b = fx.builder();
    let first = b.unit(
        vec![
            b.data_decl("base", false, None, Some(b.number(5, AT)), AT),
            func(&b, "scale", &["x"], vec![b.ret(Some(b.binary(b.name("x", AT), BinaryOp::Mul, b.name("base", AT), AT)), AT)]),
        ],
        AT,
    );
    let second = b.unit(
        vec![
            b.data_decl("offset", false, None, Some(b.number(2, AT)), AT),
            export(
                &b,
                "main",
                &[],
                vec![b.ret(
                    Some(b.binary(b.call_named("scale", vec![b.number(3, AT)], AT), BinaryOp::Add, b.name("offset", AT), AT)),
                    AT,
                )],
            ),
        ],
        AT,
    );

    let mut diagnostics = Diagnostics::new();
    let mut builder = ModuleBuilder::new(CompilerOptions::default());
    let ids: Vec<_> = [first, second]
        .iter()
        .map(|unit| builder.compile_unit(unit, &NoHost, &ArithmeticFolder, &mut diagnostics).unwrap())
        .collect();
    assert_eq!(ids[1].index(), 1);
    let module = builder.finish(&mut diagnostics).unwrap();

    assert!(diagnostics.is_empty());
    assert_eq!(module.data, vec![5, 2]);
    assert_eq!(module.stats.units, 2);
    assert_eq!(run_checked(&module, "main", &[]), 17);
}

#[test]
fn test_exports_link_as_external_calls() {
    let fx = Fixture::new();
    let b = fx.builder();
    let library = b.unit(vec![export(&b, "seven", &[], vec![b.ret(Some(b.number(7, AT)), AT)])], AT);
    let library = build(&[library]);

    let app = b.unit(
        vec![export(&b, "main", &[], vec![b.ret(Some(b.call_named("seven", vec![], AT)), AT)])],
        AT,
    );
    let app = build_with(&[app], &library.exports, CompilerOptions::default());
    assert!(app.disassemble().contains("CALL_EXTERNAL"));

    let seven = library.function("seven").unwrap().stack_usage.unwrap();
    let main = app.function("main").unwrap();
    assert_eq!(main.stack_usage, Some(2 + main.max_eval_depth + seven));
    assert_eq!(main.call_depth, Some(2));
}
