use std::cmp::Ordering;

use splice::expr::{BinaryOp, Evaluation, Expr, Relation, UnaryOp as ExprUnary};
use splice::format::FormatSpec;
use splice::number::Number;
use splice::units::UnitSystem;

use crate::error::EvalError;
use crate::script::ast::{Ast, AstKind, BinOp, CmpOp, Stmt, UnaryOp};
use crate::script::builtins::{self, Args};
use crate::script::namespace::Namespace;
use crate::script::value::Value;

/// Nesting limit for expression evaluation.
const MAX_DEPTH: usize = 256;

pub(crate) struct Interpreter<'a> {
    pub units: &'a dyn UnitSystem,
    pub ns: &'a mut Namespace,
    depth: usize,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(units: &'a dyn UnitSystem, ns: &'a mut Namespace) -> Self {
        Interpreter { units, ns, depth: 0 }
    }

    /// Run statements in order; the value is that of a trailing expression statement.
    pub(crate) fn run(&mut self, stmts: &[Stmt]) -> Result<Value, EvalError> {
        let mut last = Value::None;
        for stmt in stmts {
            last = match stmt {
                Stmt::Expr(ast) => self.eval(ast)?,
                Stmt::Assign {
                    target,
                    value,
                    span,
                } => {
                    let value = self.eval(value).map_err(|e| e.at(span.clone()))?;
                    tracing::trace!(name = %target, "assign");
                    self.ns.set(target.clone(), value);
                    Value::None
                }
            };
        }
        Ok(last)
    }

    pub(crate) fn eval(&mut self, ast: &Ast) -> Result<Value, EvalError> {
        if self.depth >= MAX_DEPTH {
            return Err(EvalError::raised("maximum nesting depth exceeded").at(ast.span.clone()));
        }
        self.depth += 1;
        let result = self.eval_kind(ast);
        self.depth -= 1;
        result.map_err(|e| e.at(ast.span.clone()))
    }

    fn eval_kind(&mut self, ast: &Ast) -> Result<Value, EvalError> {
        match &ast.kind {
            AstKind::None => Ok(Value::None),
            AstKind::Bool(b) => Ok(Value::Bool(*b)),
            AstKind::Number(n) => Ok(Value::Number(*n)),
            AstKind::Str(s) => Ok(Value::Str(s.clone())),
            AstKind::Name(name) => self.lookup(name),
            AstKind::List(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::List(values))
            }
            AstKind::Unary { op, operand } => {
                let value = self.eval(operand)?;
                self.unary(*op, value)
            }
            AstKind::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.binary(*op, left, right)
            }
            AstKind::Compare { first, rest } => {
                let mut left = self.eval(first)?;
                let mut result = Value::Bool(true);
                for (i, (op, operand)) in rest.iter().enumerate() {
                    let right = self.eval(operand)?;
                    result = self
                        .compare(*op, &left, &right)
                        .map_err(|e| e.at(first.span.start..operand.span.end))?;
                    if i + 1 < rest.len() && !result.truthy() {
                        return Ok(result);
                    }
                    left = right;
                }
                Ok(result)
            }
            AstKind::And(left, right) => {
                let left = self.eval(left)?;
                if !left.truthy() {
                    return Ok(left);
                }
                self.eval(right)
            }
            AstKind::Or(left, right) => {
                let left = self.eval(left)?;
                if left.truthy() {
                    return Ok(left);
                }
                self.eval(right)
            }
            AstKind::Call { callee, args } => {
                let callee = self.eval(callee)?;
                let mut evaluated = Args::default();
                for arg in args {
                    let value = self.eval(&arg.value)?;
                    match &arg.name {
                        Some(name) => evaluated.keywords.push((name.clone(), value)),
                        None => evaluated.positional.push(value),
                    }
                }
                self.call(callee, evaluated)
            }
            AstKind::Index { base, index } => {
                let base = self.eval(base)?;
                let index = self.eval(index)?;
                self.index(base, index)
            }
            AstKind::Attr { base, name } => {
                let base = self.eval(base)?;
                attribute(&base, name)
            }
        }
    }

    fn lookup(&self, name: &str) -> Result<Value, EvalError> {
        if let Some(value) = self.ns.get(name) {
            return Ok(value.clone());
        }
        match builtins::lookup(name) {
            Some(builtin) => Ok(Value::Builtin(builtin)),
            None => Err(EvalError::raised(format!("name '{name}' is not defined"))),
        }
    }

    pub(crate) fn call(&mut self, callee: Value, args: Args) -> Result<Value, EvalError> {
        match callee {
            Value::Builtin(name) => builtins::call(self, name, args),
            Value::Expr(expr) => self.call_quantity(&expr, args),
            other => Err(EvalError::raised(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    /// `a(spec, unit=...)`: the quantity's value as a formatted quantity node.
    fn call_quantity(&mut self, expr: &Expr, args: Args) -> Result<Value, EvalError> {
        args.check("quantity call", &["format", "unit"], 1)?;
        let Some(quantity) = expr.as_quantity() else {
            return Err(EvalError::raised("'Expr' object is not callable"));
        };
        let mut quantity = quantity.clone();
        if let Some(unit) = args.get_str(1, "unit")? {
            let unit = self.units.resolve(&unit)?;
            quantity = match quantity.unit {
                Some(_) => quantity.converted(&unit, self.units)?,
                None => quantity.with_unit(Some(unit)),
            };
        }
        if let Some(spec) = args.get_str(0, "format")? {
            quantity = quantity.with_format(Some(FormatSpec::parse(&spec)?));
        }
        Ok(Value::Expr(Expr::quantity(quantity)))
    }

    // ------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------

    fn unary(&self, op: UnaryOp, value: Value) -> Result<Value, EvalError> {
        match (op, value) {
            (UnaryOp::Not, value) => Ok(Value::Bool(!value.truthy())),
            (UnaryOp::Minus, Value::Expr(e)) => {
                Ok(Value::Expr(Expr::unary(ExprUnary::Minus, e, self.units)?))
            }
            (UnaryOp::Plus, Value::Expr(e)) => {
                Ok(Value::Expr(Expr::unary(ExprUnary::Plus, e, self.units)?))
            }
            (op, value) => match value.as_number() {
                Some(n) if op == UnaryOp::Minus => Ok(Value::Number(n.neg())),
                Some(n) => Ok(Value::Number(n)),
                None => Err(EvalError::raised(format!(
                    "bad operand type for unary {}: '{}'",
                    if op == UnaryOp::Minus { "-" } else { "+" },
                    value.type_name()
                ))),
            },
        }
    }

    pub(crate) fn binary(&self, op: BinOp, left: Value, right: Value) -> Result<Value, EvalError> {
        let involves_expr = matches!(left, Value::Expr(_)) || matches!(right, Value::Expr(_));

        if op == BinOp::Concat {
            return self.concat(&left, &right);
        }
        if involves_expr {
            return self.expr_binary(op, &left, &right);
        }

        match (op, &left, &right) {
            (BinOp::Add, Value::Str(a), Value::Str(b)) => return Ok(Value::Str(format!("{a}{b}"))),
            (BinOp::Add, Value::List(a), Value::List(b)) => {
                return Ok(Value::List(a.iter().chain(b).cloned().collect()));
            }
            (BinOp::Mul, Value::Str(s), Value::Number(Number::Int(n)))
            | (BinOp::Mul, Value::Number(Number::Int(n)), Value::Str(s)) => {
                return Ok(Value::Str(s.repeat((*n).max(0) as usize)));
            }
            _ => {}
        }

        let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
            return Err(unsupported(op, &left, &right));
        };
        let result = match op {
            BinOp::Add => a.add(b),
            BinOp::Sub => a.sub(b),
            BinOp::Mul => a.mul(b),
            BinOp::Div => a.div(b).ok_or_else(|| EvalError::raised("division by zero"))?,
            BinOp::FloorDiv => a
                .floor_div(b)
                .ok_or_else(|| EvalError::raised("integer division or modulo by zero"))?,
            BinOp::Mod => a
                .rem(b)
                .ok_or_else(|| EvalError::raised("integer division or modulo by zero"))?,
            BinOp::Pow => {
                if a.is_zero() && b.is_negative() {
                    return Err(EvalError::raised("0.0 cannot be raised to a negative power"));
                }
                a.pow(b)
            }
            BinOp::MatMul | BinOp::Concat => return Err(unsupported(op, &left, &right)),
        };
        Ok(Value::Number(result))
    }

    fn expr_binary(&self, op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
        let expr_op = match op {
            BinOp::Add => BinaryOp::Add,
            BinOp::Sub => BinaryOp::Sub,
            BinOp::Mul => BinaryOp::Mul,
            BinOp::MatMul => BinaryOp::Times,
            BinOp::Div => BinaryOp::Div,
            BinOp::FloorDiv => BinaryOp::FloorDiv,
            BinOp::Pow => BinaryOp::Pow,
            BinOp::Mod | BinOp::Concat => return Err(unsupported(op, left, right)),
        };
        let (Some(l), Some(r)) = (left.as_operand(), right.as_operand()) else {
            return Err(unsupported(op, left, right));
        };
        let expr = Expr::binary(expr_op, l.into_expr(), r.into_expr(), self.units)?;
        Ok(Value::Expr(expr))
    }

    fn concat(&self, left: &Value, right: &Value) -> Result<Value, EvalError> {
        match (left, right) {
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a && *b)),
            (Value::Number(Number::Int(a)), Value::Number(Number::Int(b))) => {
                Ok(Value::Number(Number::Int(a & b)))
            }
            (Value::Expr(_), _) | (_, Value::Expr(_)) => {
                let (Some(l), Some(r)) = (left.as_operand(), right.as_operand()) else {
                    return Err(unsupported(BinOp::Concat, left, right));
                };
                Ok(Value::Str(Expr::concat(&l, &r, self.ns.format_settings())?))
            }
            _ => Err(unsupported(BinOp::Concat, left, right)),
        }
    }

    fn compare(&self, op: CmpOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
        if matches!(left, Value::Expr(_)) || matches!(right, Value::Expr(_)) {
            let relation = match op {
                CmpOp::Eq => Relation::Eq,
                CmpOp::Ne => Relation::Ne,
                CmpOp::Lt => Relation::Lt,
                CmpOp::Le => Relation::Le,
                CmpOp::Gt => Relation::Gt,
                CmpOp::Ge => Relation::Ge,
            };
            let (Some(l), Some(r)) = (left.as_operand(), right.as_operand()) else {
                return Err(EvalError::raised(format!(
                    "cannot relate '{}' and '{}'",
                    left.type_name(),
                    right.type_name()
                )));
            };
            let expr = Expr::relation_from_host(l, relation, r, self.units)?;
            return Ok(Value::Expr(expr));
        }

        let ordering = match (left, right) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => match (left.as_number(), right.as_number()) {
                (Some(a), Some(b)) => a.as_f64().partial_cmp(&b.as_f64()),
                _ => None,
            },
        };

        let result = match op {
            CmpOp::Eq => match ordering {
                Some(o) => o == Ordering::Equal,
                None => left == right,
            },
            CmpOp::Ne => match ordering {
                Some(o) => o != Ordering::Equal,
                None => left != right,
            },
            _ => {
                let Some(ordering) = ordering else {
                    return Err(EvalError::raised(format!(
                        "'{}' not supported between instances of '{}' and '{}'",
                        cmp_symbol(op),
                        left.type_name(),
                        right.type_name()
                    )));
                };
                match op {
                    CmpOp::Lt => ordering == Ordering::Less,
                    CmpOp::Le => ordering != Ordering::Greater,
                    CmpOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }
            }
        };
        Ok(Value::Bool(result))
    }

    fn index(&self, base: Value, index: Value) -> Result<Value, EvalError> {
        match (&base, &index) {
            (Value::Expr(e), Value::List(items)) => {
                let children = items
                    .iter()
                    .map(|item| {
                        item.as_operand().map(|op| op.into_expr()).ok_or_else(|| {
                            EvalError::raised(format!("cannot subscript with '{}'", item.type_name()))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Expr(Expr::index(e.clone(), Expr::sequence(children))))
            }
            (Value::Expr(e), _) => {
                let Some(subscript) = index.as_operand() else {
                    return Err(EvalError::raised(format!(
                        "cannot subscript with '{}'",
                        index.type_name()
                    )));
                };
                Ok(Value::Expr(Expr::index(e.clone(), subscript.into_expr())))
            }
            (Value::List(items), Value::Number(Number::Int(i))) => {
                let i = normalize_index(*i, items.len())?;
                Ok(items[i].clone())
            }
            (Value::Str(s), Value::Number(Number::Int(i))) => {
                let chars: Vec<char> = s.chars().collect();
                let i = normalize_index(*i, chars.len())?;
                Ok(Value::Str(chars[i].to_string()))
            }
            _ => Err(EvalError::raised(format!(
                "'{}' object is not subscriptable with '{}'",
                base.type_name(),
                index.type_name()
            ))),
        }
    }
}

fn attribute(base: &Value, name: &str) -> Result<Value, EvalError> {
    if let Value::Expr(e) = base {
        match name {
            "value" => {
                return Ok(match e.value() {
                    Some(Evaluation::Measure(m)) => Value::Number(m.magnitude),
                    Some(Evaluation::Truth(b)) => Value::Bool(*b),
                    None => Value::None,
                });
            }
            "unit" => {
                return Ok(match e.value().and_then(|v| v.as_measure()) {
                    Some(m) => m
                        .unit
                        .as_ref()
                        .map_or(Value::None, |u| Value::Str(u.to_string())),
                    None => Value::None,
                });
            }
            "name" => return Ok(e.name().map_or(Value::None, |n| Value::Str(n.to_string()))),
            _ => {}
        }
    }
    Err(EvalError::raised(format!(
        "'{}' object has no attribute '{name}'",
        base.type_name()
    )))
}

fn normalize_index(i: i64, len: usize) -> Result<usize, EvalError> {
    let resolved = if i < 0 { i + len as i64 } else { i };
    if resolved < 0 || resolved >= len as i64 {
        return Err(EvalError::raised("index out of range"));
    }
    Ok(resolved as usize)
}

fn unsupported(op: BinOp, left: &Value, right: &Value) -> EvalError {
    EvalError::raised(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        binop_symbol(op),
        left.type_name(),
        right.type_name()
    ))
}

fn binop_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::MatMul => "@",
        BinOp::Div => "/",
        BinOp::FloorDiv => "//",
        BinOp::Mod => "%",
        BinOp::Pow => "**",
        BinOp::Concat => "&",
    }
}

fn cmp_symbol(op: CmpOp) -> &'static str {
    match op {
        CmpOp::Eq => "==",
        CmpOp::Ne => "!=",
        CmpOp::Lt => "<",
        CmpOp::Le => "<=",
        CmpOp::Gt => ">",
        CmpOp::Ge => ">=",
    }
}
