//! Round-trip tests for every static rule: a minimal program per rule,
//! checked against the exact diagnostic it must produce.

use silt::error::SiltError;
use silt::expr::NodeIds;
use silt::interpreter::Interpreter;
use silt::parser::Parser;
use silt::resolver::Resolver;
use silt::scanner::Scanner;
use silt::token::Token;

fn resolve_errors(source: &str) -> Vec<String> {
    let tokens: Vec<Token> = Scanner::new(source.as_bytes().to_vec())
        .filter_map(Result::ok)
        .collect();

    let mut parser = Parser::new(tokens, NodeIds::new());
    let statements = parser.parse();

    let (_, parse_errors) = parser.finish();
    assert!(
        parse_errors.is_empty(),
        "test program failed to parse: {:?}",
        parse_errors
    );

    let mut interpreter = Interpreter::new();
    let mut resolver = Resolver::new(&mut interpreter);

    match resolver.resolve(&statements) {
        Ok(()) => Vec::new(),
        Err(errors) => errors.iter().map(SiltError::to_string).collect(),
    }
}

fn assert_clean(source: &str) {
    let errors = resolve_errors(source);
    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
}

#[test]
fn reading_a_local_in_its_own_initializer() {
    assert_eq!(
        resolve_errors("{ var a = a; }"),
        vec!["[line 1] Error at 'a': Can't read local variable in its own initializer."]
    );
}

#[test]
fn self_reference_is_accepted_at_global_scope() {
    // Globals are not tracked; `var a = a;` only fails at runtime.
    assert_clean("var a = a;");
}

#[test]
fn redeclaration_in_the_same_scope() {
    let errors = resolve_errors("{ var a = 1; print a; var a = 2; print a; }");
    assert_eq!(
        errors,
        vec!["[line 1] Error at 'a': Already a variable with that name in this scope."]
    );
}

#[test]
fn shadowing_an_outer_scope_is_allowed() {
    assert_clean("{ var a = 1; print a; { var a = 2; print a; } }");
}

#[test]
fn unused_local_variable() {
    assert_eq!(
        resolve_errors("{ var a = 1; }"),
        vec!["[line 1] Error at 'a': Unused local variable 'a'."]
    );
}

#[test]
fn unused_parameter() {
    assert_eq!(
        resolve_errors("fun f(x) { return 1; }\nf(2);"),
        vec!["[line 1] Error at 'x': Unused local variable 'x'."]
    );
}

#[test]
fn assignment_counts_as_use() {
    assert_clean("{ var a = 1; a = 2; }");
}

#[test]
fn return_outside_any_function() {
    assert_eq!(
        resolve_errors("return 1;"),
        vec!["[line 1] Error at 'return': Can't return from top-level code."]
    );
}

#[test]
fn returning_a_value_from_an_initializer() {
    assert_eq!(
        resolve_errors("class C { init() { return 1; } }\nC();"),
        vec!["[line 1] Error at 'return': Can't return a value from an initializer."]
    );
}

#[test]
fn bare_return_in_an_initializer_is_allowed() {
    assert_clean("class C { init() { return; } }\nC();");
}

#[test]
fn returning_a_value_from_a_static_initializer() {
    assert_eq!(
        resolve_errors("class C { class init() { return 1; } }\nC();"),
        vec!["[line 1] Error at 'return': Can't return a value from an initializer."]
    );
}

#[test]
fn break_outside_a_loop() {
    assert_eq!(
        resolve_errors("break;"),
        vec!["[line 1] Error at 'break': Illegal continue statement."]
    );
}

#[test]
fn continue_outside_a_loop() {
    assert_eq!(
        resolve_errors("continue;"),
        vec!["[line 1] Error at 'continue': Illegal continue statement."]
    );
}

#[test]
fn break_inside_a_function_inside_a_loop_is_still_illegal() {
    // Loop context does not cross function boundaries.
    assert_eq!(
        resolve_errors("while (true) { fun f() { break; } f(); }"),
        vec!["[line 1] Error at 'break': Illegal continue statement."]
    );
}

#[test]
fn break_and_continue_inside_loops_are_accepted() {
    assert_clean("while (true) { break; }");
    assert_clean("for (var i = 0; i < 3; i = i + 1) { continue; }");
}

#[test]
fn this_outside_a_class() {
    assert_eq!(
        resolve_errors("print this;"),
        vec!["[line 1] Error at 'this': Can't use 'this' outside of a class."]
    );
}

#[test]
fn this_inside_a_function_outside_a_class() {
    assert_eq!(
        resolve_errors("fun f() { return this; }\nf();"),
        vec!["[line 1] Error at 'this': Can't use 'this' outside of a class."]
    );
}

#[test]
fn super_outside_a_derived_class() {
    assert_eq!(
        resolve_errors("print super.x;"),
        vec!["[line 1] Error at 'super': Can't use 'super' outside of a derived class."]
    );
}

#[test]
fn super_in_an_underived_class() {
    assert_eq!(
        resolve_errors("class C { m() { return super.m; } }\nC();"),
        vec!["[line 1] Error at 'super': Can't use 'super' outside of a derived class."]
    );
}

#[test]
fn super_property_before_super_call_in_initializer() {
    let source = "\
class A { init() {} }
class B < A {
  init() {
    print super.x;
    super();
  }
}
B();";
    assert_eq!(
        resolve_errors(source),
        vec![
            "[line 4] Error at 'super': Can't access property on superclass until 'super' has been called."
        ]
    );
}

#[test]
fn super_property_after_super_call_is_accepted() {
    let source = "\
class A {
  init() {}
  m() {}
}
class B < A {
  init() {
    super();
    super.m();
  }
}
B();";
    assert_clean(source);
}

#[test]
fn super_call_outside_an_initializer() {
    let source = "\
class A { init() {} }
class B < A {
  init() { super(); }
  m() { super(); }
}
B();";
    assert_eq!(
        resolve_errors(source),
        vec!["[line 4] Error at 'super': Can't call 'super' outside of class initializer."]
    );
}

#[test]
fn super_call_inside_a_static_initializer() {
    let source = "\
class A { init() {} }
class B < A {
  init() { super(); }
  class init() { super(); }
}
B();";
    assert_eq!(
        resolve_errors(source),
        vec!["[line 4] Error at 'super': Can't call 'super' outside of class initializer."]
    );
}

#[test]
fn super_call_inside_a_nested_function_is_rejected() {
    let source = "\
class A { init() {} }
class B < A {
  init() {
    fun chain() { super(); }
    chain();
    super();
  }
}
B();";
    assert_eq!(
        resolve_errors(source),
        vec!["[line 4] Error at 'super': Can't call 'super' outside of class initializer."]
    );
}

#[test]
fn super_called_more_than_once() {
    let source = "\
class A { init() {} }
class B < A {
  init() {
    super();
    super();
  }
}
B();";
    assert_eq!(
        resolve_errors(source),
        vec![
            "[line 5] Error at 'super': Can't call 'super' more than once inside class initializer."
        ]
    );
}

#[test]
fn derived_initializer_without_super_call() {
    let source = "\
class A { init() {} }
class B < A {
  init() { this.x = 1; }
}
B();";
    assert_eq!(
        resolve_errors(source),
        vec![
            "[line 3] Error at 'init': Superclass was not initialized inside subclass initializer."
        ]
    );
}

#[test]
fn derived_class_without_any_initializer_is_accepted() {
    assert_clean("class A {}\nclass B < A {}\nB();");
}

#[test]
fn class_inheriting_from_itself() {
    assert_eq!(
        resolve_errors("class Ouro < Ouro {}"),
        vec!["[line 1] Error at 'Ouro': A class can't inherit from itself."]
    );
}

#[test]
fn duplicate_method_and_getter_name() {
    assert_eq!(
        resolve_errors("class C { size() { return 1; } size { return 2; } }\nC();"),
        vec!["[line 1] Error at 'size': Duplicate method and getter name."]
    );
}

#[test]
fn duplicate_static_method_and_static_getter_name() {
    assert_eq!(
        resolve_errors("class C { class size() { return 1; } class size { return 2; } }\nC();"),
        vec!["[line 1] Error at 'size': Duplicate method and getter name."]
    );
}

#[test]
fn instance_and_static_tables_are_checked_independently() {
    // Same name as an instance method and a static getter is fine.
    assert_clean("class C { size() { return 1; } class size { return 2; } }\nC();");
}

#[test]
fn static_initializer_with_parameters() {
    assert_eq!(
        resolve_errors("class C { class init(x) { print x; } }\nC();"),
        vec!["[line 1] Error at 'init': Class static initializer can't have parameters."]
    );
}

#[test]
fn multiple_errors_are_all_reported() {
    let errors = resolve_errors("break;\nreturn 1;\nprint this;");
    assert_eq!(errors.len(), 3);
    assert!(errors[0].contains("Illegal continue statement."));
    assert!(errors[1].contains("Can't return from top-level code."));
    assert!(errors[2].contains("Can't use 'this' outside of a class."));
}

#[test]
fn closure_counts_as_use_of_the_captured_variable() {
    let source = "\
{
  var count = 0;
  fun bump() { count = count + 1; }
  bump();
}";
    assert_clean(source);
}
