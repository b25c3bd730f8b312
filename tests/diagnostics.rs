mod common;

use common::{quiet_config, run, try_run, try_run_with};
use indoc::indoc;
use rubiee::{
    backend::ExecutionError, config::Config, diagnostics::DiagnosticKind, driver::DriverError,
};

#[test]
fn undefined_functions_do_not_stop_sibling_expressions() {
    let run = run(indoc! {"
        puts(1)
        missing(2)
        puts(3)
    "});

    assert_eq!(run.output, "1\n3\n");
    assert_eq!(run.diagnostic_kinds(), vec![DiagnosticKind::UndefinedFunction]);
    assert_eq!(
        run.summary.diagnostics[0].message,
        "function `missing` is undefined"
    );
}

#[test]
fn undefined_variables_poison_the_enclosing_call() {
    let run = run(indoc! {"
        puts(1, nope)
        puts(2)
    "});

    assert_eq!(run.output, "2\n");
    assert_eq!(run.diagnostic_kinds(), vec![DiagnosticKind::UndefinedVariable]);
}

#[test]
fn argument_count_mismatches_are_reported() {
    let run = run(indoc! {"
        def f(a) a end
        puts(f(1, 2))
        puts(f(3))
    "});

    assert_eq!(run.output, "3\n");
    assert_eq!(
        run.diagnostic_kinds(),
        vec![DiagnosticKind::ArgumentCountMismatch]
    );
}

#[test]
fn functions_cannot_see_top_level_variables() {
    let run = run(indoc! {"
        x = 1
        def f(a) x end
        puts(x)
        f(1)
    "});

    assert_eq!(run.output, "1\n");
    assert_eq!(
        run.diagnostic_kinds(),
        vec![
            DiagnosticKind::UndefinedVariable,
            DiagnosticKind::MalformedFunctionBody,
            DiagnosticKind::UndefinedFunction,
        ]
    );
}

#[test]
fn functions_ending_in_a_loop_are_discarded() {
    let run = run(indoc! {"
        def count(n) for i = 0; i < n; i = i + 1 do puts(i) end end
        count(3)
    "});

    assert_eq!(run.output, "");
    assert_eq!(
        run.diagnostic_kinds(),
        vec![
            DiagnosticKind::MalformedFunctionBody,
            DiagnosticKind::UndefinedFunction,
        ]
    );
    assert!(!run.summary.ir.contains("@count"));
}

#[test]
fn calling_a_discarded_function_fails_only_when_executed() {
    let error = try_run(indoc! {"
        extern f(a)
        if 0 then f(1) end
        def f(a) b end
        puts(1)
    "})
    .map(|run| run.output);

    assert_eq!(error.unwrap(), "1\n");

    let error = try_run(indoc! {"
        extern f(a)
        f(1)
        def f(a) b end
    "})
    .err()
    .expect("calling a function without a body should fail");

    assert!(matches!(
        error,
        DriverError::Execution(ExecutionError::UnresolvedExternal { ref name }) if name == "f"
    ));
}

#[test]
fn redefinitions_and_reserved_names_are_rejected() {
    let run = run(indoc! {"
        def f(a) a end
        def f(a) a + 1 end
        def main() 0 end
        def puts(a) a end
        puts(f(1))
    "});

    assert_eq!(run.output, "1\n");
    assert_eq!(
        run.diagnostic_kinds(),
        vec![
            DiagnosticKind::FunctionRedefinition,
            DiagnosticKind::ReservedName,
            DiagnosticKind::ReservedName,
        ]
    );
}

#[test]
fn parse_errors_carry_a_location() {
    let error = try_run("def f(").err().expect("source should not parse");

    assert!(matches!(error, DriverError::Parse { .. }));
    assert_eq!(
        error.to_string(),
        "<memory>:1:7: expected identifier but reached end of file"
    );
}

#[test]
fn runaway_recursion_hits_the_call_depth_limit() {
    let config = Config {
        max_call_depth: 50,
        ..quiet_config()
    };

    let error = try_run_with("def f(n) f(n + 1) end\nf(0)", &config)
        .err()
        .expect("recursion should be cut off");

    assert!(matches!(
        error,
        DriverError::Execution(ExecutionError::CallDepthExceeded { limit: 50 })
    ));
}

#[test]
fn if_with_an_absent_arm_still_completes_its_branches() {
    let top_level = run(indoc! {"
        x = if 1 then nope else 2 end
        puts(7)
    "});

    assert_eq!(top_level.output, "7\n");
    assert_eq!(
        top_level.diagnostic_kinds(),
        vec![DiagnosticKind::UndefinedVariable]
    );

    let in_function = run(indoc! {"
        def f(a) if a then nope else 1 end end
        puts(8)
    "});

    assert_eq!(in_function.output, "8\n");
    assert_eq!(
        in_function.diagnostic_kinds(),
        vec![
            DiagnosticKind::UndefinedVariable,
            DiagnosticKind::MalformedFunctionBody,
        ]
    );
}

#[test]
fn for_with_an_absent_condition_skips_the_body() {
    let run = run(indoc! {"
        for i = 0; nope; i = i + 1 do puts(i) end
        puts(i)
    "});

    assert_eq!(run.output, "0\n");
    assert_eq!(run.diagnostic_kinds(), vec![DiagnosticKind::UndefinedVariable]);
}

#[test]
fn duplicate_parameters_reject_the_function() {
    let run = run(indoc! {"
        def f(a, a) a end
        f(1, 2)
        puts(3)
    "});

    assert_eq!(run.output, "3\n");
    assert_eq!(
        run.diagnostic_kinds(),
        vec![
            DiagnosticKind::DuplicateParameter,
            DiagnosticKind::UndefinedFunction,
        ]
    );
}
