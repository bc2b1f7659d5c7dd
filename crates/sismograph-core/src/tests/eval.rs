use crate::*;

use indexmap::IndexSet;
use std::collections::HashMap;

fn ctx() -> EvalContext {
    EvalContext::new().with_fixed_time(Some(42.0))
}

fn guard(ctx: &mut EvalContext, code: &str) -> Result<bool> {
    ctx.evaluate_guard(code, &IndexSet::new(), &HashMap::new())
}

fn action(ctx: &mut EvalContext, code: &str) -> Result<Vec<String>> {
    ctx.execute_action(code, &IndexSet::new(), &HashMap::new())
}

#[test]
fn guards_evaluate_arithmetic_and_comparisons() {
    let mut ctx = ctx();
    ctx.set_variable("count", Value::Int(3));

    assert!(guard(&mut ctx, "count >= 2").unwrap());
    assert!(!guard(&mut ctx, "count * 2 < 5").unwrap());
    assert!(guard(&mut ctx, "count % 2 == 1").unwrap());
    assert!(guard(&mut ctx, "count == 3 and not False").unwrap());
    assert!(guard(&mut ctx, "count == 0 or count == 3").unwrap());
    assert!(guard(&mut ctx, "count == 3 && True || False").unwrap());
    assert!(guard(&mut ctx, "'ab' + 'c' == 'abc'").unwrap());
    // Int/float comparisons are numeric.
    assert!(guard(&mut ctx, "count == 3.0").unwrap());
}

#[test]
fn time_binding_uses_the_fixed_override() {
    let mut ctx = ctx();
    assert!(guard(&mut ctx, "time > 40").unwrap());
    assert!(!guard(&mut ctx, "time > 43").unwrap());
}

#[test]
fn strict_guard_failure_names_the_offending_code() {
    let mut ctx = ctx();
    let err = guard(&mut ctx, "missing > 1").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("undefined name `missing`"), "{message}");
    assert!(message.contains("missing > 1"), "{message}");
}

#[test]
fn permissive_guard_failure_evaluates_to_false() {
    let mut ctx = ctx();
    ctx.set_mode(EvalMode::Permissive);
    assert!(!guard(&mut ctx, "missing > 1").unwrap());
    assert!(!guard(&mut ctx, "1 / 0 > 1").unwrap());
    // A guard that does not fail keeps its value.
    assert!(guard(&mut ctx, "2 > 1").unwrap());
}

#[test]
fn permissive_parse_errors_still_propagate_for_actions() {
    let mut ctx = ctx();
    ctx.set_mode(EvalMode::Permissive);
    assert!(action(&mut ctx, "x = = 1").is_err());
}

#[test]
fn actions_assign_and_update_variables() {
    let mut ctx = ctx();
    action(&mut ctx, "x = 2\ny = x * 3 + 1").unwrap();
    assert_eq!(ctx.variable("x"), Some(&Value::Int(2)));
    assert_eq!(ctx.variable("y"), Some(&Value::Int(7)));

    action(&mut ctx, "x = x + 1; label = 'v' + '1'").unwrap();
    assert_eq!(ctx.variable("x"), Some(&Value::Int(3)));
    assert_eq!(ctx.variable("label"), Some(&Value::Str("v1".to_string())));
}

#[test]
fn strict_action_rejects_undefined_names() {
    let mut ctx = ctx();
    let err = action(&mut ctx, "x = missing + 1").unwrap_err();
    assert!(matches!(err, Error::Evaluation { .. }));
}

#[test]
fn permissive_action_absorbs_undefined_names() {
    let mut ctx = ctx();
    ctx.set_mode(EvalMode::Permissive);
    ctx.set_variable("count", Value::Int(1));

    // Calls and attribute chains on an undefined name are silent no-ops,
    // including assignment through an attribute path.
    action(&mut ctx, "ghost.method(1).field = 2").unwrap();
    action(&mut ctx, "ghost(count).other").unwrap();
    // Defined variables keep working alongside the absorbed ones.
    action(&mut ctx, "count = count + missing\ncount2 = count").unwrap();

    assert_eq!(ctx.variable("count"), Some(&Value::Absorb));
    assert_eq!(ctx.variable("count2"), Some(&Value::Absorb));
    assert!(ctx.variable("ghost").is_none());
}

#[test]
fn mode_switch_is_idempotent_and_reversible() {
    let mut ctx = ctx();
    ctx.set_mode(EvalMode::Permissive);
    ctx.set_mode(EvalMode::Permissive);
    assert!(!guard(&mut ctx, "missing").unwrap());

    ctx.set_mode(EvalMode::Strict);
    assert!(guard(&mut ctx, "missing").is_err());
}

#[test]
fn setdefault_only_initializes_once() {
    let mut ctx = ctx();
    action(&mut ctx, "setdefault('n', 5)").unwrap();
    assert_eq!(ctx.variable("n"), Some(&Value::Int(5)));
    action(&mut ctx, "n = 9\nsetdefault('n', 5)").unwrap();
    assert_eq!(ctx.variable("n"), Some(&Value::Int(9)));
}

#[test]
fn send_and_notify_collect_event_names() {
    let mut ctx = ctx();
    let sent = action(&mut ctx, "send('tick')\nnotify('tock')").unwrap();
    assert_eq!(sent, ["tick", "tock"]);
}

#[test]
fn active_checks_the_configuration() {
    let mut ctx = ctx();
    let configuration: IndexSet<String> = ["root", "on"].iter().map(|s| s.to_string()).collect();
    assert!(
        ctx.evaluate_guard("active('on')", &configuration, &HashMap::new())
            .unwrap()
    );
    assert!(
        !ctx.evaluate_guard("active('off')", &configuration, &HashMap::new())
            .unwrap()
    );
}

#[test]
fn user_variables_shadow_builtins() {
    let mut ctx = ctx();
    ctx.set_variable("active", Value::Bool(true));
    assert!(guard(&mut ctx, "active").unwrap());
    // Shadowed builtins are no longer callable.
    assert!(guard(&mut ctx, "active('on')").is_err());
}

#[test]
fn integer_overflow_is_an_error_not_a_wrap() {
    let mut ctx = ctx();
    let err = guard(&mut ctx, "9223372036854775807 + 1 > 0").unwrap_err();
    assert!(err.to_string().contains("integer overflow"), "{err}");

    assert!(action(&mut ctx, "x = 9223372036854775807 * 2").is_err());
    assert!(action(&mut ctx, "x = 0 - 9223372036854775807 - 2").is_err());
    assert!(action(&mut ctx, "x = -(0 - 9223372036854775807 - 1)").is_err());
}

#[test]
fn permissive_guard_degrades_integer_overflow_to_false() {
    let mut ctx = ctx();
    ctx.set_mode(EvalMode::Permissive);
    assert!(!guard(&mut ctx, "9223372036854775807 + 1 > 0").unwrap());
}

#[test]
fn builtins_resolve_as_bare_names() {
    let mut ctx = ctx();
    // A builtin can be stored and called through a variable.
    let sent = action(&mut ctx, "callback = send\ncallback('ping')").unwrap();
    assert_eq!(sent, ["ping"]);
    // Bare references are defined (and truthy) even in strict mode.
    assert!(guard(&mut ctx, "notify").unwrap());
}

#[test]
fn division_is_float_and_rejects_zero() {
    let mut ctx = ctx();
    action(&mut ctx, "half = 7 / 2").unwrap();
    assert_eq!(ctx.variable("half"), Some(&Value::Float(3.5)));
    assert!(action(&mut ctx, "boom = 1 / 0").is_err());
    assert!(action(&mut ctx, "boom = 1 % 0").is_err());
}

#[test]
fn transients_take_precedence_over_variables() {
    let mut ctx = ctx();
    ctx.set_variable("event", Value::Str("stale".to_string()));
    let mut transients = HashMap::new();
    transients.insert("event".to_string(), Value::Str("fresh".to_string()));
    assert!(
        ctx.evaluate_guard("event == 'fresh'", &IndexSet::new(), &transients)
            .unwrap()
    );
}
