//! End-to-end tests driving the full scan → parse → resolve → execute
//! pipeline, capturing `print` output in a buffer.

use prolang::error::Result;
use prolang::interpreter::Interpreter;
use prolang::parser::Parser;
use prolang::resolver::Resolver;
use prolang::scanner::Scanner;
use prolang::token::Token;

fn run(source: &str) -> (String, Result<()>) {
    let tokens: Vec<Token> = Scanner::new(source.as_bytes())
        .filter_map(Result::ok)
        .collect();

    let statements = Parser::new(tokens).parse();

    let mut interpreter = Interpreter::new(Vec::new());
    {
        let mut resolver = Resolver::new(&mut interpreter);
        resolver.resolve(&statements);
    }

    let result = interpreter.interpret(&statements);
    let output = String::from_utf8(interpreter.into_output()).expect("print output is UTF-8");

    (output, result)
}

fn run_output(source: &str) -> String {
    let (output, result) = run(source);
    assert!(result.is_ok(), "unexpected runtime error: {:?}", result);
    output
}

fn run_error(source: &str) -> String {
    let (_, result) = run(source);
    result.expect_err("expected a runtime error").to_string()
}

#[test]
fn closures_share_their_defining_environment() {
    let output = run_output(
        "func makeCounter() { let i = 0; func count() { i = i + 1; print i; } return count; }\n\
         let c = makeCounter(); c(); c();",
    );

    assert_eq!(output, "1\n2\n");
}

#[test]
fn counters_from_separate_calls_are_independent() {
    let output = run_output(
        "func makeCounter() { let i = 0; func count() { i = i + 1; print i; } return count; }\n\
         let a = makeCounter(); let b = makeCounter(); a(); a(); b();",
    );

    assert_eq!(output, "1\n2\n1\n");
}

#[test]
fn lexical_capture_survives_later_shadowing() {
    let output = run_output(
        "let a = \"global\";\n\
         { func showA() { print a; } showA(); let a = \"block\"; showA(); }",
    );

    assert_eq!(output, "global\nglobal\n");
}

#[test]
fn super_dispatches_to_the_parent_method() {
    let output = run_output(
        "class A { greet() { print \"A\"; } }\n\
         class B extends A { greet() { super.greet(); print \"B\"; } }\n\
         B().greet();",
    );

    assert_eq!(output, "A\nB\n");
}

#[test]
fn initializer_stores_state_on_this() {
    let output = run_output("class P { init(x) { this.x = x; } } let p = P(7); print p.x;");

    assert_eq!(output, "7\n");
}

#[test]
fn for_loop_counts_up() {
    let output = run_output("for (let i = 0; i < 3; i = i + 1) print i;");

    assert_eq!(output, "0\n1\n2\n");
}

#[test]
fn while_loop_runs_until_condition_fails() {
    let output = run_output("let i = 3; while (i > 0) { print i; i = i - 1; }");

    assert_eq!(output, "3\n2\n1\n");
}

#[test]
fn arity_mismatch_is_a_runtime_error() {
    let err = run_error("func f(a) { return a; } f(1, 2);");

    assert_eq!(err, "Expected 1 arguments but got 2 [line 1]");
}

#[test]
fn subtracting_from_a_string_is_a_runtime_error() {
    let err = run_error("\"a\" - 1;");

    assert_eq!(err, "Operand must be a number. [line 1]");
}

#[test]
fn adding_mixed_operand_types_is_a_runtime_error() {
    let err = run_error("1 + \"a\";");

    assert_eq!(err, "Operands must be two numbers or two strings [line 1]");
}

#[test]
fn division_by_zero_yields_infinity() {
    let output = run_output("print 1 / 0;");

    assert_eq!(output, "inf\n");
}

#[test]
fn string_concatenation() {
    let output = run_output("print \"foo\" + \"bar\";");

    assert_eq!(output, "foobar\n");
}

#[test]
fn arithmetic_precedence() {
    let output = run_output("print 1 + 2 * 3; print (1 + 2) * 3;");

    assert_eq!(output, "7\n9\n");
}

#[test]
fn comparisons_yield_booleans() {
    let output = run_output("print 1 < 2; print 2 <= 1; print nil == nil; print nil == 0;");

    assert_eq!(output, "true\nfalse\ntrue\nfalse\n");
}

#[test]
fn zero_and_empty_string_are_truthy() {
    let output = run_output(
        "if (0) print \"zero\"; if (\"\") print \"empty\"; if (nil) print \"nil\"; else print \"skipped\";",
    );

    assert_eq!(output, "zero\nempty\nskipped\n");
}

#[test]
fn logical_operators_return_operand_values() {
    let output = run_output("print \"a\" or \"b\"; print nil or \"b\"; print nil and \"b\";");

    assert_eq!(output, "a\nb\nnil\n");
}

#[test]
fn logical_operators_short_circuit() {
    let output = run_output(
        "func boom() { print \"boom\"; return true; }\n\
         false and boom(); true or boom(); print \"done\";",
    );

    assert_eq!(output, "done\n");
}

#[test]
fn recursion_works() {
    let output = run_output(
        "func fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(10);",
    );

    assert_eq!(output, "55\n");
}

#[test]
fn undefined_variable_is_a_runtime_error() {
    let err = run_error("print missing;");

    assert_eq!(err, "Undefined Variable 'missing'. [line 1]");
}

#[test]
fn calling_a_non_callable_is_a_runtime_error() {
    let err = run_error("\"str\"();");

    assert_eq!(err, "Object str is not callable [line 1]");
}

#[test]
fn fields_are_created_on_first_assignment() {
    let output = run_output("class Box {} let b = Box(); b.value = 42; print b.value;");

    assert_eq!(output, "42\n");
}

#[test]
fn undefined_property_names_the_class() {
    let err = run_error("class Box {} print Box().missing;");

    assert_eq!(err, "Undefined property 'missing' on object of 'Box' [line 1]");
}

#[test]
fn property_access_on_a_number_is_a_runtime_error() {
    let err = run_error("let x = 1; print x.field;");

    assert_eq!(err, "Only instances have properties. [line 1]");
}

#[test]
fn methods_extracted_from_an_instance_stay_bound() {
    let output = run_output(
        "class Greeter { init(name) { this.name = name; } greet() { print this.name; } }\n\
         let m = Greeter(\"bound\").greet; m();",
    );

    assert_eq!(output, "bound\n");
}

#[test]
fn methods_are_inherited_through_the_superclass_chain() {
    let output = run_output(
        "class A { hello() { print \"hi\"; } } class B extends A {} class C extends B {}\n\
         C().hello();",
    );

    assert_eq!(output, "hi\n");
}

#[test]
fn fields_shadow_methods() {
    let output = run_output(
        "class A { m() { print \"method\"; } }\n\
         let a = A(); a.m = 7; print a.m;",
    );

    assert_eq!(output, "7\n");
}

#[test]
fn early_bare_return_in_initializer_yields_this() {
    let output = run_output(
        "class P { init(x) { this.x = x; if (x > 0) return; this.x = 0 - x; } }\n\
         print P(5).x; print P(0 - 3).x;",
    );

    assert_eq!(output, "5\n3\n");
}

#[test]
fn class_arity_follows_the_inherited_initializer() {
    let output = run_output(
        "class A { init(x) { this.x = x; } } class B extends A {}\n\
         print B(9).x;",
    );

    assert_eq!(output, "9\n");
}

#[test]
fn extending_a_non_class_is_a_runtime_error() {
    let err = run_error("let A = 1; class B extends A {}");

    assert_eq!(err, "Superclass must be a class. [line 1]");
}

#[test]
fn superclass_type_error_reports_the_superclass_token_line() {
    // the class name sits on line 2, the superclass token on line 3
    let err = run_error("let A = 1;\nclass B\nextends A {}");

    assert_eq!(err, "Superclass must be a class. [line 3]");
}

#[test]
fn instances_may_hold_themselves_in_a_field() {
    let output = run_output("class C {} let c = C(); c.me = c; print c.me.me;");

    assert_eq!(output, "<instance of C>\n");
}

#[test]
fn values_stringify_by_kind() {
    let output = run_output(
        "class C {} func f() {} print C; print f; print C(); print nil; print true; print 2.5;",
    );

    assert_eq!(
        output,
        "<class C>\n<func f>\n<instance of C>\nnil\ntrue\n2.5\n"
    );
}

#[test]
fn clock_returns_a_positive_number() {
    let output = run_output("print clock() > 0;");

    assert_eq!(output, "true\n");
}

#[test]
fn runtime_errors_abort_the_remaining_statements() {
    let (output, result) = run("print 1; missing; print 2;");

    assert!(result.is_err());
    assert_eq!(output, "1\n");
}

#[test]
fn resolving_twice_changes_nothing() {
    let tokens: Vec<Token> = Scanner::new(
        "func makeCounter() { let i = 0; func count() { i = i + 1; print i; } return count; }\n\
         let c = makeCounter(); c(); c();"
            .as_bytes(),
    )
    .filter_map(Result::ok)
    .collect();

    let statements = Parser::new(tokens).parse();

    let mut interpreter = Interpreter::new(Vec::new());
    {
        let mut resolver = Resolver::new(&mut interpreter);
        resolver.resolve(&statements);
    }
    {
        let mut resolver = Resolver::new(&mut interpreter);
        resolver.resolve(&statements);
    }

    interpreter.interpret(&statements).unwrap();
    let output = String::from_utf8(interpreter.into_output()).unwrap();

    assert_eq!(output, "1\n2\n");
}

#[test]
fn same_source_produces_the_same_output() {
    let source = "for (let i = 0; i < 5; i = i + 1) { if (i and i / 2 == 1) print i * i; else print i; }";

    assert_eq!(run_output(source), run_output(source));
}
