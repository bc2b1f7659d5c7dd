//! Evaluation of guard expressions and action statements.
//!
//! Two modes are supported, selected by configuration rather than by
//! swapping implementations at runtime:
//!
//! - [`EvalMode::Strict`] propagates every failure as
//!   [`crate::Error::Evaluation`], naming the offending code and the cause.
//! - [`EvalMode::Permissive`] resolves undefined names to the absorbing
//!   [`Value::Absorb`] sentinel in actions, and degrades a failing guard to
//!   `false`. This keeps an interactive demo alive before all context
//!   variables are wired up, at the cost of silently discarding the effect.
//!
//! Toggling the mode is idempotent and fully reversible: switching back to
//! strict restores the original semantics exactly.

use crate::expr::{self, AssignTarget, BinaryOp, Expr, Stmt, UnaryOp};
use crate::{Error, Result};
use indexmap::IndexSet;
use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvalMode {
    #[default]
    Strict,
    Permissive,
}

/// The evaluator's value domain.
///
/// `Absorb` is the distinguished sentinel every operation treats as
/// absorbing: attribute lookup, calls with any arguments, and attribute-path
/// assignment targets all yield `Absorb` (or a silent no-op) instead of
/// failing.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// One of the base exposed bindings, referenced but not yet called.
    Builtin(&'static str),
    Absorb,
}

impl Value {
    pub fn truthy(&self) -> bool {
        match self {
            Value::Unit | Value::Absorb => false,
            Value::Bool(b) => *b,
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Builtin(_) => true,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Builtin(_) => "builtin",
            Value::Absorb => "absorb",
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EvalError {
    #[error("invalid expression: {0}")]
    Parse(#[from] expr::ParseError),

    #[error("undefined name `{name}`")]
    UndefinedName { name: String },

    #[error("type mismatch: {message}")]
    TypeMismatch { message: String },

    #[error("`{name}` is not callable")]
    NotCallable { name: String },

    #[error("value of type {type_name} has no attribute `{name}`")]
    NoAttribute {
        type_name: &'static str,
        name: String,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow")]
    IntegerOverflow,

    #[error("{builtin}: {message}")]
    BadArguments {
        builtin: &'static str,
        message: String,
    },
}

/// The statechart evaluation context: the persistent variable map plus the
/// base exposed bindings (`time`, `active`, `send`, `notify`, `setdefault`).
///
/// Owned by the session for its whole lifetime; discarded on reset.
#[derive(Debug)]
pub struct EvalContext {
    variables: HashMap<String, Value>,
    mode: EvalMode,
    started: Instant,
    fixed_time: Option<f64>,
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new()
    }
}

impl EvalContext {
    pub fn new() -> Self {
        Self {
            variables: HashMap::new(),
            mode: EvalMode::Strict,
            started: Instant::now(),
            fixed_time: None,
        }
    }

    /// Overrides the `time` binding with a fixed value.
    ///
    /// This exists primarily to make tests deterministic. By default `time`
    /// is the number of seconds since the context was created.
    pub fn with_fixed_time(mut self, seconds: Option<f64>) -> Self {
        self.fixed_time = seconds;
        self
    }

    pub fn mode(&self) -> EvalMode {
        self.mode
    }

    /// Selects the evaluation mode. Idempotent; switching back to
    /// [`EvalMode::Strict`] fully restores strict semantics.
    pub fn set_mode(&mut self, mode: EvalMode) {
        self.mode = mode;
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    fn time_value(&self) -> Value {
        let seconds = self
            .fixed_time
            .unwrap_or_else(|| self.started.elapsed().as_secs_f64());
        Value::Float(seconds)
    }

    /// Evaluates guard code to a boolean.
    ///
    /// Strict mode propagates any failure; permissive mode evaluates a
    /// failing guard to `false`.
    pub fn evaluate_guard(
        &mut self,
        code: &str,
        configuration: &IndexSet<String>,
        transients: &HashMap<String, Value>,
    ) -> Result<bool> {
        let mode = self.mode;
        let mut sent = Vec::new();
        let result = expr::parse_expression(code)
            .map_err(EvalError::from)
            .and_then(|parsed| {
                let mut scope = Scope {
                    ctx: self,
                    configuration,
                    transients,
                    sent: &mut sent,
                };
                scope.eval_expr(&parsed)
            });
        match result {
            Ok(value) => Ok(value.truthy()),
            Err(err) if mode == EvalMode::Permissive => {
                tracing::debug!(code, %err, "guard failed; permissive mode evaluates to false");
                Ok(false)
            }
            Err(err) => Err(Error::evaluation(code, err)),
        }
    }

    /// Executes action code and returns the names of events sent via the
    /// `send`/`notify` bindings.
    ///
    /// In permissive mode an undefined name resolves to [`Value::Absorb`],
    /// so chained accesses, calls, and assignments on it become no-ops;
    /// every other failure propagates in both modes.
    pub fn execute_action(
        &mut self,
        code: &str,
        configuration: &IndexSet<String>,
        transients: &HashMap<String, Value>,
    ) -> Result<Vec<String>> {
        let stmts =
            expr::parse_statements(code).map_err(|e| Error::evaluation(code, e.into()))?;
        let mut sent = Vec::new();
        for stmt in &stmts {
            let mut scope = Scope {
                ctx: self,
                configuration,
                transients,
                sent: &mut sent,
            };
            scope
                .exec_stmt(stmt)
                .map_err(|e| Error::evaluation(code, e))?;
        }
        Ok(sent)
    }
}

const BUILTINS: &[&str] = &["active", "send", "notify", "setdefault"];

struct Scope<'a> {
    ctx: &'a mut EvalContext,
    configuration: &'a IndexSet<String>,
    transients: &'a HashMap<String, Value>,
    sent: &'a mut Vec<String>,
}

impl Scope<'_> {
    fn exec_stmt(&mut self, stmt: &Stmt) -> std::result::Result<(), EvalError> {
        match stmt {
            Stmt::Expr(e) => {
                self.eval_expr(e)?;
                Ok(())
            }
            Stmt::Assign(AssignTarget::Name(name), e) => {
                let value = self.eval_expr(e)?;
                self.ctx.variables.insert(name.clone(), value);
                Ok(())
            }
            Stmt::Assign(AssignTarget::Attr(base, name), e) => {
                let value = self.eval_expr(e)?;
                let base = self.eval_expr(base)?;
                match base {
                    // Attribute assignment on the sentinel absorbs the effect.
                    Value::Absorb => {
                        let _ = value;
                        Ok(())
                    }
                    other => Err(EvalError::NoAttribute {
                        type_name: other.type_name(),
                        name: name.clone(),
                    }),
                }
            }
        }
    }

    fn eval_expr(&mut self, expr: &Expr) -> std::result::Result<Value, EvalError> {
        match expr {
            Expr::Int(v) => Ok(Value::Int(*v)),
            Expr::Float(v) => Ok(Value::Float(*v)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::None => Ok(Value::Unit),
            Expr::Name(name) => self.resolve_name(name),
            Expr::Attr(base, name) => match self.eval_expr(base)? {
                Value::Absorb => Ok(Value::Absorb),
                other => Err(EvalError::NoAttribute {
                    type_name: other.type_name(),
                    name: name.clone(),
                }),
            },
            Expr::Call(callee, args) => self.eval_call(callee, args),
            Expr::Unary(op, operand) => {
                let value = self.eval_expr(operand)?;
                self.eval_unary(*op, value)
            }
            Expr::Binary(BinaryOp::And, lhs, rhs) => {
                if !self.eval_expr(lhs)?.truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.eval_expr(rhs)?.truthy()))
            }
            Expr::Binary(BinaryOp::Or, lhs, rhs) => {
                if self.eval_expr(lhs)?.truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.eval_expr(rhs)?.truthy()))
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval_expr(lhs)?;
                let rhs = self.eval_expr(rhs)?;
                self.eval_binary(*op, lhs, rhs)
            }
        }
    }

    /// Transients first, then the persistent context, then the base exposed
    /// bindings (`time` plus the callable builtins); permissive mode falls
    /// back to the absorbing sentinel where strict mode fails with an
    /// undefined-name error.
    fn resolve_name(&mut self, name: &str) -> std::result::Result<Value, EvalError> {
        if let Some(value) = self.transients.get(name) {
            return Ok(value.clone());
        }
        if let Some(value) = self.ctx.variables.get(name) {
            return Ok(value.clone());
        }
        if name == "time" {
            return Ok(self.ctx.time_value());
        }
        if let Some(builtin) = BUILTINS.iter().copied().find(|b| *b == name) {
            return Ok(Value::Builtin(builtin));
        }
        match self.ctx.mode {
            EvalMode::Permissive => Ok(Value::Absorb),
            EvalMode::Strict => Err(EvalError::UndefinedName {
                name: name.to_string(),
            }),
        }
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
    ) -> std::result::Result<Value, EvalError> {
        let callee = self.eval_expr(callee)?;
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_expr(arg)?);
        }
        match callee {
            Value::Builtin(name) => self.call_builtin(name, values),
            Value::Absorb => Ok(Value::Absorb),
            other => Err(EvalError::NotCallable {
                name: other.type_name().to_string(),
            }),
        }
    }

    fn call_builtin(
        &mut self,
        builtin: &str,
        mut args: Vec<Value>,
    ) -> std::result::Result<Value, EvalError> {
        // A sentinel argument absorbs the whole call instead of failing it.
        if args.iter().any(|a| *a == Value::Absorb) {
            return Ok(Value::Absorb);
        }
        match builtin {
            "active" => match args.as_slice() {
                [Value::Str(name)] => Ok(Value::Bool(self.configuration.contains(name))),
                _ => Err(EvalError::BadArguments {
                    builtin: "active",
                    message: "expected a single state name".to_string(),
                }),
            },
            "send" | "notify" => match args.as_slice() {
                [Value::Str(name)] => {
                    self.sent.push(name.clone());
                    Ok(Value::Unit)
                }
                _ => Err(EvalError::BadArguments {
                    builtin: "send",
                    message: "expected a single event name".to_string(),
                }),
            },
            "setdefault" => {
                if args.len() != 2 {
                    return Err(EvalError::BadArguments {
                        builtin: "setdefault",
                        message: "expected a name and a default value".to_string(),
                    });
                }
                let default = args.pop().unwrap_or(Value::Unit);
                let Some(Value::Str(name)) = args.pop() else {
                    return Err(EvalError::BadArguments {
                        builtin: "setdefault",
                        message: "first argument must be a variable name".to_string(),
                    });
                };
                Ok(self
                    .ctx
                    .variables
                    .entry(name)
                    .or_insert(default)
                    .clone())
            }
            _ => Err(EvalError::NotCallable {
                name: builtin.to_string(),
            }),
        }
    }

    fn eval_unary(&self, op: UnaryOp, value: Value) -> std::result::Result<Value, EvalError> {
        if value == Value::Absorb {
            return Ok(Value::Absorb);
        }
        match op {
            UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
            UnaryOp::Neg => match value {
                Value::Int(v) => v
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or(EvalError::IntegerOverflow),
                Value::Float(v) => Ok(Value::Float(-v)),
                other => Err(EvalError::TypeMismatch {
                    message: format!("cannot negate a {}", other.type_name()),
                }),
            },
        }
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
    ) -> std::result::Result<Value, EvalError> {
        if lhs == Value::Absorb || rhs == Value::Absorb {
            return Ok(Value::Absorb);
        }
        match op {
            BinaryOp::Eq => Ok(Value::Bool(values_equal(&lhs, &rhs))),
            BinaryOp::Ne => Ok(Value::Bool(!values_equal(&lhs, &rhs))),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ordering = compare(&lhs, &rhs).ok_or_else(|| EvalError::TypeMismatch {
                    message: format!(
                        "cannot compare {} with {}",
                        lhs.type_name(),
                        rhs.type_name()
                    ),
                })?;
                let result = match op {
                    BinaryOp::Lt => ordering.is_lt(),
                    BinaryOp::Le => ordering.is_le(),
                    BinaryOp::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                };
                Ok(Value::Bool(result))
            }
            BinaryOp::Add => match (&lhs, &rhs) {
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
                (Value::Int(a), Value::Int(b)) => a
                    .checked_add(*b)
                    .map(Value::Int)
                    .ok_or(EvalError::IntegerOverflow),
                _ => self.numeric(op, &lhs, &rhs),
            },
            BinaryOp::Sub | BinaryOp::Mul => match (&lhs, &rhs) {
                (Value::Int(a), Value::Int(b)) => {
                    let result = if op == BinaryOp::Sub {
                        a.checked_sub(*b)
                    } else {
                        a.checked_mul(*b)
                    };
                    result.map(Value::Int).ok_or(EvalError::IntegerOverflow)
                }
                _ => self.numeric(op, &lhs, &rhs),
            },
            BinaryOp::Div => {
                let (a, b) = self.numeric_pair(&lhs, &rhs)?;
                if b == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                Ok(Value::Float(a / b))
            }
            BinaryOp::Mod => match (&lhs, &rhs) {
                (Value::Int(_), Value::Int(0)) => Err(EvalError::DivisionByZero),
                (Value::Int(a), Value::Int(b)) => a
                    .checked_rem_euclid(*b)
                    .map(Value::Int)
                    .ok_or(EvalError::IntegerOverflow),
                _ => {
                    let (a, b) = self.numeric_pair(&lhs, &rhs)?;
                    if b == 0.0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    Ok(Value::Float(a.rem_euclid(b)))
                }
            },
            BinaryOp::And | BinaryOp::Or => unreachable!("short-circuited in eval_expr"),
        }
    }

    fn numeric(
        &self,
        op: BinaryOp,
        lhs: &Value,
        rhs: &Value,
    ) -> std::result::Result<Value, EvalError> {
        let (a, b) = self.numeric_pair(lhs, rhs)?;
        let result = match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            _ => unreachable!("non-arithmetic operator"),
        };
        Ok(Value::Float(result))
    }

    fn numeric_pair(
        &self,
        lhs: &Value,
        rhs: &Value,
    ) -> std::result::Result<(f64, f64), EvalError> {
        match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(EvalError::TypeMismatch {
                message: format!(
                    "expected numbers, found {} and {}",
                    lhs.type_name(),
                    rhs.type_name()
                ),
            }),
        }
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => lhs == rhs,
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Option<std::cmp::Ordering> {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => {
            let (a, b) = (lhs.as_f64()?, rhs.as_f64()?);
            a.partial_cmp(&b)
        }
    }
}
