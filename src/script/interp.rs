//! Tree-walking evaluator for checked policy programs.

use std::fmt;

use crate::error::RuntimeFault;
use crate::hardware::HardwareTree;
use crate::policy::EvaluationResult;

use super::parser::{BinaryOp, Builtin, Expr, ExprKind, Program, Stmt, UnaryOp};
use super::window::SmoothingWindow;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Text(String),
    Outcome(EvaluationResult),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Bool(_) => "bool",
            Self::Text(_) => "text",
            Self::Outcome(_) => "outcome",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(s) => f.write_str(s),
            Self::Outcome(r) => write!(f, "{}({})", r.control_mode, r.target_percent),
        }
    }
}

fn fault_at(expr: &Expr, message: impl fmt::Display) -> RuntimeFault {
    RuntimeFault::new(format!("line {}: {message}", expr.line))
}

/// Run `program` against `snapshot`.
pub fn run(
    program: &Program,
    snapshot: &HardwareTree,
    windows: &mut [SmoothingWindow],
) -> Result<EvaluationResult, RuntimeFault> {
    let mut interp = Interpreter {
        snapshot,
        windows,
        scopes: vec![Vec::new()],
    };
    interp
        .block(&program.body)?
        .ok_or_else(|| RuntimeFault::new("policy finished without returning a result"))
}

struct Interpreter<'a> {
    snapshot: &'a HardwareTree,
    windows: &'a mut [SmoothingWindow],
    scopes: Vec<Vec<(String, Value)>>,
}

impl Interpreter<'_> {
    /// Execute statements until one returns.
    fn block(&mut self, stmts: &[Stmt]) -> Result<Option<EvaluationResult>, RuntimeFault> {
        for stmt in stmts {
            match stmt {
                Stmt::Let { name, value } => {
                    let v = self.eval(value)?;
                    if let Some(scope) = self.scopes.last_mut() {
                        scope.push((name.clone(), v));
                    }
                }
                Stmt::Return(expr) => {
                    return match self.eval(expr)? {
                        Value::Outcome(result) => Ok(Some(result)),
                        other => Err(fault_at(
                            expr,
                            format!(
                                "policy must return software(), default() or undefined(), not a {}",
                                other.type_name()
                            ),
                        )),
                    };
                }
                Stmt::If { cond, then, otherwise } => {
                    let branch = if self.truthy(cond)? { then } else { otherwise };
                    self.scopes.push(Vec::new());
                    let result = self.block(branch);
                    self.scopes.pop();
                    if let Some(outcome) = result? {
                        return Ok(Some(outcome));
                    }
                }
            }
        }
        Ok(None)
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    fn truthy(&mut self, expr: &Expr) -> Result<bool, RuntimeFault> {
        match self.eval(expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(fault_at(expr, format!("expected bool, got {}", other.type_name()))),
        }
    }

    fn number(&mut self, expr: &Expr) -> Result<f64, RuntimeFault> {
        match self.eval(expr)? {
            Value::Number(n) => Ok(n),
            other => Err(fault_at(expr, format!("expected number, got {}", other.type_name()))),
        }
    }

    fn text(&mut self, expr: &Expr) -> Result<String, RuntimeFault> {
        match self.eval(expr)? {
            Value::Outcome(_) => Err(fault_at(expr, "expected text, got outcome")),
            other => Ok(other.to_string()),
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, RuntimeFault> {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::Text(s) => Ok(Value::Text(s.clone())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Var(name) => self
                .lookup(name)
                .cloned()
                .ok_or_else(|| fault_at(expr, format!("unknown variable '{name}'"))),
            ExprKind::Unary(UnaryOp::Neg, operand) => Ok(Value::Number(-self.number(operand)?)),
            ExprKind::Unary(UnaryOp::Not, operand) => Ok(Value::Bool(!self.truthy(operand)?)),
            ExprKind::Binary(op, lhs, rhs) => self.binary(expr, *op, lhs, rhs),
            ExprKind::Call(builtin, args) => self.call(expr, *builtin, args),
            ExprKind::Smooth { value, slot, .. } => {
                let sample = self.number(value)?;
                let window = self
                    .windows
                    .get_mut(*slot)
                    .ok_or_else(|| fault_at(expr, "smoothing window missing"))?;
                Ok(Value::Number(window.push(sample)))
            }
        }
    }

    fn binary(&mut self, expr: &Expr, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value, RuntimeFault> {
        match op {
            BinaryOp::And => return Ok(Value::Bool(self.truthy(lhs)? && self.truthy(rhs)?)),
            BinaryOp::Or => return Ok(Value::Bool(self.truthy(lhs)? || self.truthy(rhs)?)),
            _ => {}
        }

        let a = self.eval(lhs)?;
        let b = self.eval(rhs)?;
        match (op, a, b) {
            (BinaryOp::Add, Value::Number(x), Value::Number(y)) => Ok(Value::Number(x + y)),
            (BinaryOp::Add, a @ (Value::Text(_) | Value::Number(_)), b @ (Value::Text(_) | Value::Number(_))) => {
                Ok(Value::Text(format!("{a}{b}")))
            }
            (BinaryOp::Sub, Value::Number(x), Value::Number(y)) => Ok(Value::Number(x - y)),
            (BinaryOp::Mul, Value::Number(x), Value::Number(y)) => Ok(Value::Number(x * y)),
            (BinaryOp::Div | BinaryOp::Rem, Value::Number(_), Value::Number(y)) if y == 0.0 => {
                Err(fault_at(expr, "division by zero"))
            }
            (BinaryOp::Div, Value::Number(x), Value::Number(y)) => Ok(Value::Number(x / y)),
            (BinaryOp::Rem, Value::Number(x), Value::Number(y)) => Ok(Value::Number(x % y)),
            (BinaryOp::Lt, Value::Number(x), Value::Number(y)) => Ok(Value::Bool(x < y)),
            (BinaryOp::Le, Value::Number(x), Value::Number(y)) => Ok(Value::Bool(x <= y)),
            (BinaryOp::Gt, Value::Number(x), Value::Number(y)) => Ok(Value::Bool(x > y)),
            (BinaryOp::Ge, Value::Number(x), Value::Number(y)) => Ok(Value::Bool(x >= y)),
            (BinaryOp::Eq | BinaryOp::Ne, a, b) if a.type_name() == b.type_name() && !matches!(a, Value::Outcome(_)) => {
                let equal = a == b;
                Ok(Value::Bool(if op == BinaryOp::Eq { equal } else { !equal }))
            }
            (op, a, b) => Err(fault_at(
                expr,
                format!(
                    "cannot apply {op:?} to {} and {}",
                    a.type_name(),
                    b.type_name()
                ),
            )),
        }
    }

    fn call(&mut self, expr: &Expr, builtin: Builtin, args: &[Expr]) -> Result<Value, RuntimeFault> {
        let reason = |this: &mut Self, idx: usize| -> Result<String, RuntimeFault> {
            args.get(idx).map_or_else(|| Ok(String::new()), |e| this.text(e))
        };

        match builtin {
            Builtin::Software => {
                let percent = self.number(&args[0])?;
                let reason = reason(self, 1)?;
                Ok(Value::Outcome(EvaluationResult::software(percent as f32, reason)))
            }
            Builtin::Default => Ok(Value::Outcome(EvaluationResult::hardware_default(reason(self, 0)?))),
            Builtin::Undefined => Ok(Value::Outcome(EvaluationResult::undefined(reason(self, 0)?))),
            Builtin::Sensor => {
                let id = self.text(&args[0])?;
                self.sensor_value(&id)
                    .map(Value::Number)
                    .map_err(|msg| fault_at(expr, msg))
            }
            Builtin::SensorOr => {
                let id = self.text(&args[0])?;
                let fallback = self.number(&args[1])?;
                Ok(Value::Number(self.sensor_value(&id).unwrap_or(fallback)))
            }
            Builtin::Min | Builtin::Max => {
                let mut acc = self.number(&args[0])?;
                for arg in &args[1..] {
                    let n = self.number(arg)?;
                    acc = if builtin == Builtin::Min { acc.min(n) } else { acc.max(n) };
                }
                Ok(Value::Number(acc))
            }
            Builtin::Clamp => {
                let x = self.number(&args[0])?;
                let lo = self.number(&args[1])?;
                let hi = self.number(&args[2])?;
                if lo > hi || lo.is_nan() || hi.is_nan() {
                    return Err(fault_at(expr, format!("clamp bounds {lo}..{hi} are invalid")));
                }
                Ok(Value::Number(x.clamp(lo, hi)))
            }
            Builtin::Abs => Ok(Value::Number(self.number(&args[0])?.abs())),
            Builtin::Round => {
                let x = self.number(&args[0])?;
                let digits = match args.get(1) {
                    Some(e) => self.number(e)?,
                    None => 0.0,
                };
                if digits.fract() != 0.0 || !(0.0..=6.0).contains(&digits) {
                    return Err(fault_at(expr, "round digits must be an integer between 0 and 6"));
                }
                let factor = 10f64.powi(digits as i32);
                Ok(Value::Number((x * factor).round() / factor))
            }
            Builtin::Curve => {
                let x = self.number(&args[0])?;
                let mut points = Vec::with_capacity(args.len() / 2);
                for pair in args[1..].chunks(2) {
                    points.push((self.number(&pair[0])?, self.number(&pair[1])?));
                }
                curve(x, &points)
                    .map(Value::Number)
                    .map_err(|msg| fault_at(expr, msg))
            }
        }
    }

    fn sensor_value(&self, identifier: &str) -> Result<f64, String> {
        let sensor = self
            .snapshot
            .find_sensor(identifier)
            .ok_or_else(|| format!("sensor '{identifier}' not found"))?;
        sensor
            .value
            .map(f64::from)
            .ok_or_else(|| format!("sensor '{identifier}' has no reading"))
    }
}

/// Piecewise-linear interpolation through `points`, held flat beyond the ends.
pub fn curve(x: f64, points: &[(f64, f64)]) -> Result<f64, String> {
    if points.windows(2).any(|w| w[1].0 <= w[0].0) {
        return Err("curve points must have strictly increasing x".to_owned());
    }
    let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
        return Err("curve needs at least one point".to_owned());
    };
    if x <= first.0 {
        return Ok(first.1);
    }
    if x >= last.0 {
        return Ok(last.1);
    }
    for w in points.windows(2) {
        let ((x0, y0), (x1, y1)) = (w[0], w[1]);
        if x <= x1 {
            return Ok(y0 + (x - x0) * (y1 - y0) / (x1 - x0));
        }
    }
    Ok(last.1)
}
