mod common;

use common::run;
use indoc::indoc;

// ── Values and variables ─────────────────────────────────────────────────

#[test]
fn integer_literals_print_nothing_and_change_nothing() {
    let run = run(indoc! {"
        x = 5
        42;
        -7
        puts(x)
    "});

    assert_eq!(run.output, "5\n");
    assert!(run.summary.diagnostics.is_empty());
}

#[test]
fn reads_see_the_latest_write() {
    let run = run(indoc! {"
        x = 1
        x = x + 41
        puts(x)
        x = x * 2
        puts(x)
    "});

    assert_eq!(run.output, "42\n84\n");
}

#[test]
fn assignment_yields_the_stored_value() {
    let run = run(indoc! {"
        x = y = 7
        puts(x, y, z = 3)
        puts(z)
    "});

    assert_eq!(run.output, "7 7 3\n3\n");
}

#[test]
fn unwritten_variables_read_as_zero() {
    let run = run(indoc! {"
        if 0 then x = 5 end
        puts(x)
    "});

    assert_eq!(run.output, "0\n");
}

#[test]
fn arithmetic_wraps_and_comparisons_widen() {
    let run = run(indoc! {"
        puts(2147483647 + 1, -3 * 4, 10 - 20)
        puts(3 > 2, 2 > 3, 2 <= 2, 1 == 2, 4 >= 5)
        puts((1 < 2) + (3 < 4))
    "});

    assert_eq!(run.output, "-2147483648 -12 -10\n1 0 1 0 0\n2\n");
}

// ── Conditionals ─────────────────────────────────────────────────────────

#[test]
fn constant_true_condition_selects_the_then_arm() {
    let run = run(indoc! {"
        x = if 1 then 10 else puts(99) 20 end
        puts(x)
    "});

    assert_eq!(run.output, "10\n");
}

#[test]
fn constant_false_condition_selects_the_else_arm() {
    let run = run(indoc! {"
        x = if 1 < 0 then puts(99) 10 else 20 end
        puts(x)
    "});

    assert_eq!(run.output, "20\n");
}

#[test]
fn empty_arms_evaluate_to_zero() {
    let run = run(indoc! {"
        puts(if 0 then 1 end, if 1 else 2 end)
    "});

    assert_eq!(run.output, "0 0\n");
}

// ── Loops ────────────────────────────────────────────────────────────────

#[test]
fn for_loop_runs_body_once_per_iteration() {
    let run = run(indoc! {"
        for x = 0; x < 3; x = x + 1 do puts(1, x) end
        puts(x)
    "});

    assert_eq!(run.output, "1 0\n1 1\n1 2\n3\n");
}

#[test]
fn for_loop_with_false_condition_skips_the_body() {
    let run = run(indoc! {"
        for i = 5; i < 3; i = i + 1 do puts(i) end
        puts(i)
    "});

    assert_eq!(run.output, "5\n");
}

#[test]
fn integer_loop_conditions_test_for_non_zero() {
    let run = run(indoc! {"
        n = 3
        for i = 0; n; n = n - 1 do puts(n) end
    "});

    assert_eq!(run.output, "3\n2\n1\n");
}

#[test]
fn nested_control_flow_merges_from_the_actual_exit_blocks() {
    let run = run(indoc! {"
        for i = 0; i < 4; i = i + 1 do
            x = if i > 1 then
                for j = 0; j < i; j = j + 1 do puts(i, j) end
                i
            else
                if i == 0 then 100 else 200 end
            end
            puts(x)
        end
    "});

    assert_eq!(
        run.output,
        indoc! {"
            100
            200
            2 0
            2 1
            2
            3 0
            3 1
            3 2
            3
        "}
    );
    assert!(run.summary.diagnostics.is_empty());
}

// ── Functions ────────────────────────────────────────────────────────────

#[test]
fn function_doubles_its_argument() {
    let run = run(indoc! {"
        def f(a) a * 2 end
        puts(f(5))
    "});

    assert_eq!(run.output, "10\n");
}

#[test]
fn recursive_functions() {
    let run = run(indoc! {"
        def fib(n)
            if n < 2 then n else fib(n - 1) + fib(n - 2) end
        end

        puts(fib(10))
    "});

    assert_eq!(run.output, "55\n");
}

#[test]
fn prototypes_allow_calls_before_definitions() {
    let run = run(indoc! {"
        extern is_even(n)

        def is_odd(n) if n == 0 then 0 else is_even(n - 1) end end
        def is_even(n) if n == 0 then 1 else is_odd(n - 1) end end

        puts(is_even(10), is_odd(7))
    "});

    assert_eq!(run.output, "1 1\n");
}

#[test]
fn function_variables_are_local() {
    let run = run(indoc! {"
        a = 1
        def f(a) a = a + 100 end
        puts(f(5), a)
    "});

    assert_eq!(run.output, "105 1\n");
}

#[test]
fn top_level_expressions_run_in_program_order() {
    let run = run(indoc! {"
        puts(1)
        def f() 2 end
        puts(f())
        x = 3; puts(x)
    "});

    assert_eq!(run.output, "1\n2\n3\n");
}
