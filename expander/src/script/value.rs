use std::fmt;

use splice::document::Node;
use splice::expr::{Evaluation, Expr, Operand};
use splice::format::FormatSettings;
use splice::number::Number;

use crate::error::EvalError;
use crate::evaluator::HostValue;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Number(Number),
    Str(String),
    List(Vec<Value>),
    Expr(Expr),
    Node(Node),
    Builtin(&'static str),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Number(Number::Int(_)) => "int",
            Value::Number(Number::Float(_)) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Expr(_) => "Expr",
            Value::Node(_) => "Node",
            Value::Builtin(_) => "builtin_function",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Number(n) => !n.is_zero(),
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            // Relations built from expressions are objects, so always true.
            Value::Expr(_) | Value::Node(_) | Value::Builtin(_) => true,
        }
    }

    /// Numbers and booleans as arithmetic operands.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(Number::Int(i64::from(*b))),
            _ => None,
        }
    }

    /// Lift into an expression operand, when this value can take part in one.
    pub fn as_operand(&self) -> Option<Operand> {
        match self {
            Value::Expr(e) => Some(Operand::Expr(e.clone())),
            Value::Number(n) => Some(Operand::Number(*n)),
            Value::Bool(b) => Some(Operand::Number(Number::Int(i64::from(*b)))),
            Value::Str(s) => Some(Operand::Text(s.clone())),
            _ => None,
        }
    }

    /// `str()` with expression nodes rendered through `settings`.
    pub fn to_text(&self, settings: &FormatSettings) -> Result<String, EvalError> {
        Ok(match self {
            Value::Expr(e) => e.render(settings, None)?,
            Value::Number(n) => settings.plain(*n),
            other => other.to_string(),
        })
    }

    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => {
                let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
                let mut out = String::new();
                out.push(quote);
                for c in s.chars() {
                    match c {
                        '\\' => out.push_str("\\\\"),
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        c if c == quote => {
                            out.push('\\');
                            out.push(c);
                        }
                        c => out.push(c),
                    }
                }
                out.push(quote);
                out
            }
            Value::Expr(e) => format!("<Expr {}>", expr_label(e)),
            other => other.to_string(),
        }
    }

    pub fn from_host(value: HostValue) -> Value {
        match value {
            HostValue::None => Value::None,
            HostValue::Bool(b) => Value::Bool(b),
            HostValue::Number(n) => Value::Number(n),
            HostValue::Text(s) => Value::Str(s),
            HostValue::Expr(e) => Value::Expr(e),
            HostValue::Node(n) => Value::Node(n),
        }
    }

    pub fn into_host(self) -> HostValue {
        match self {
            Value::None => HostValue::None,
            Value::Bool(b) => HostValue::Bool(b),
            Value::Number(n) => HostValue::Number(n),
            Value::Str(s) => HostValue::Text(s),
            Value::Expr(e) => HostValue::Expr(e),
            Value::Node(n) => HostValue::Node(n),
            other @ (Value::List(_) | Value::Builtin(_)) => HostValue::Text(other.to_string()),
        }
    }
}

fn expr_label(expr: &Expr) -> String {
    match expr.value() {
        Some(Evaluation::Measure(m)) => match &m.unit {
            Some(unit) => format!("{} {}", m.magnitude, unit),
            None => m.magnitude.to_string(),
        },
        Some(Evaluation::Truth(true)) => "True".to_string(),
        Some(Evaluation::Truth(false)) => "False".to_string(),
        None => "?".to_string(),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item.repr())?;
                }
                write!(f, "]")
            }
            Value::Expr(e) => write!(f, "<Expr {}>", expr_label(e)),
            Value::Node(n) => write!(f, "{n}"),
            Value::Builtin(name) => write!(f, "<built-in function {name}>"),
        }
    }
}
