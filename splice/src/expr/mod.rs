//! Typeset expression trees.
//!
//! Nodes are immutable and cheap to clone. Every node renders to LaTeX math
//! independently of evaluation; evaluation is attempted once, when the node is
//! built, and cached alongside it.

mod eval;
mod render;

use std::rc::Rc;

use crate::format::{FormatError, FormatSettings, FormatSpec};
use crate::number::Number;
use crate::units::{Unit, UnitError, UnitSystem};

// ---------------------------------------------------------------------------
// Precedence levels (higher binds tighter)
// ---------------------------------------------------------------------------

pub const PREC_RELATION: u8 = 1; // = \neq < \leq > \geq
pub const PREC_CONCAT: u8 = 2; // &
pub const PREC_ADDITIVE: u8 = 3; // + -
pub const PREC_DIVISION: u8 = 4; // \frac \dfrac
pub const PREC_MULTIPLICATIVE: u8 = 5; // implicit, \times
pub const PREC_UNARY: u8 = 6; // unary + -
pub const PREC_POWER: u8 = 7; // ^
pub const PREC_ATOM: u8 = 8; // groupings, subscripts, leaves

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A number with an optional unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Measure {
    pub magnitude: Number,
    pub unit: Option<Unit>,
}

/// The propagated value of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Measure(Measure),
    Truth(bool),
}

impl Evaluation {
    pub fn as_measure(&self) -> Option<&Measure> {
        match self {
            Evaluation::Measure(m) => Some(m),
            Evaluation::Truth(_) => None,
        }
    }
}

/// A numeric value with optional unit and stored format specifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Quantity {
    pub value: Option<Number>,
    pub unit: Option<Unit>,
    pub format: Option<FormatSpec>,
}

impl Quantity {
    pub fn new(value: Option<Number>) -> Self {
        Quantity {
            value,
            ..Quantity::default()
        }
    }

    pub fn with_unit(mut self, unit: Option<Unit>) -> Self {
        self.unit = unit.filter(|u| !u.is_empty());
        self
    }

    pub fn with_format(mut self, format: Option<FormatSpec>) -> Self {
        self.format = format;
        self
    }

    pub fn measure(&self) -> Option<Measure> {
        self.value.map(|magnitude| Measure {
            magnitude,
            unit: self.unit.clone(),
        })
    }

    /// The same quantity expressed in `unit`.
    pub fn converted(&self, unit: &Unit, units: &dyn UnitSystem) -> Result<Quantity, UnitError> {
        let from = self.unit.clone().unwrap_or_default();
        let value = match self.value {
            Some(v) if &from == unit => Some(v),
            Some(v) => Some(Number::Float(units.convert(v.as_f64(), &from, unit)?)),
            None => None,
        };
        Ok(Quantity {
            value,
            unit: Some(unit.clone()).filter(|u| !u.is_empty()),
            format: self.format.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Node variants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Number(Number),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnaryOp {
    Plus,
    Minus,
    /// `\sqrt{x}` or `\sqrt[n]{x}`.
    Sqrt { root: Option<u32> },
    /// `\sin\left(x\right)`, optionally raised: `\sin^{2}\left(x\right)`.
    Function { name: String, power: Option<Number> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Relation {
    pub fn symbol(self) -> &'static str {
        match self {
            Relation::Eq => "=",
            Relation::Ne => "\\neq",
            Relation::Lt => "<",
            Relation::Le => "\\leq",
            Relation::Gt => ">",
            Relation::Ge => "\\geq",
        }
    }

    /// The relation that holds with the operands swapped.
    pub fn mirrored(self) -> Relation {
        match self {
            Relation::Lt => Relation::Gt,
            Relation::Le => Relation::Ge,
            Relation::Gt => Relation::Lt,
            Relation::Ge => Relation::Le,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    /// Implicit multiplication (juxtaposition).
    Mul,
    /// Explicit `\times`.
    Times,
    /// `\frac`
    Div,
    /// `\dfrac`
    FloorDiv,
    Pow,
    Relation(Relation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Paren,
    Bracket,
    Brace,
    Angle,
    /// Comma-separated with no delimiters.
    Sequence,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal {
        value: LiteralValue,
        format: Option<FormatSpec>,
    },
    Quantity(Quantity),
    /// Renders its name; its value comes from the wrapped quantity.
    Variable {
        name: String,
        quantity: Quantity,
    },
    Unary {
        op: UnaryOp,
        operand: Expr,
    },
    Binary {
        op: BinaryOp,
        left: Expr,
        right: Expr,
    },
    Grouping {
        kind: GroupKind,
        children: Vec<Expr>,
        scale: bool,
    },
    Index {
        base: Expr,
        subscript: Expr,
    },
    /// `{base}^{sup}_{sub}`; a missing base renders as an empty group.
    Scripts {
        base: Option<Expr>,
        sup: Option<Expr>,
        sub: Option<Expr>,
    },
    /// A control sequence with arguments: `\hat{x}`, `\mathrm{d}`, `\sqrt[3]{x}`.
    Command {
        name: String,
        args: Vec<CommandArg>,
    },
    /// `\begin{name}...\end{name}`
    Environment {
        name: String,
        args: Vec<CommandArg>,
        body: Vec<Expr>,
    },
}

/// One argument of a [`ExprKind::Command`], in braces or, when optional, brackets.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandArg {
    pub optional: bool,
    pub content: Expr,
}

impl CommandArg {
    pub fn required(content: Expr) -> Self {
        CommandArg {
            optional: false,
            content,
        }
    }

    pub fn optional(content: Expr) -> Self {
        CommandArg {
            optional: true,
            content,
        }
    }
}

/// An immutable expression node with its cached value.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    kind: Rc<ExprKind>,
    value: Option<Evaluation>,
}

/// A host-side operand: either a node or a bare value that gets lifted into a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Expr(Expr),
    Number(Number),
    Text(String),
}

impl From<Expr> for Operand {
    fn from(expr: Expr) -> Self {
        Operand::Expr(expr)
    }
}

impl Operand {
    pub fn into_expr(self) -> Expr {
        match self {
            Operand::Expr(e) => e,
            Operand::Number(n) => Expr::number(n),
            Operand::Text(t) => Expr::symbol(t),
        }
    }

    fn text(&self, settings: &FormatSettings) -> Result<String, FormatError> {
        match self {
            Operand::Expr(e) => e.render(settings, None),
            Operand::Number(n) => Ok(settings.plain(*n)),
            Operand::Text(t) => Ok(t.clone()),
        }
    }
}

impl Expr {
    fn new(kind: ExprKind, value: Option<Evaluation>) -> Self {
        Expr {
            kind: Rc::new(kind),
            value,
        }
    }

    pub fn literal(value: LiteralValue, format: Option<FormatSpec>) -> Self {
        let evaluation = match &value {
            LiteralValue::Number(n) => Some(Evaluation::Measure(Measure {
                magnitude: *n,
                unit: None,
            })),
            LiteralValue::Text(_) => None,
        };
        Expr::new(ExprKind::Literal { value, format }, evaluation)
    }

    pub fn number(n: Number) -> Self {
        Expr::literal(LiteralValue::Number(n), None)
    }

    /// A literal that renders verbatim, e.g. `x` or `\alpha`.
    pub fn symbol(text: impl Into<String>) -> Self {
        Expr::literal(LiteralValue::Text(text.into()), None)
    }

    pub fn quantity(quantity: Quantity) -> Self {
        let value = quantity.measure().map(Evaluation::Measure);
        Expr::new(ExprKind::Quantity(quantity), value)
    }

    pub fn variable(name: impl Into<String>, quantity: Quantity) -> Self {
        let value = quantity.measure().map(Evaluation::Measure);
        Expr::new(
            ExprKind::Variable {
                name: name.into(),
                quantity,
            },
            value,
        )
    }

    pub fn unary(op: UnaryOp, operand: Expr, units: &dyn UnitSystem) -> Result<Self, UnitError> {
        let value = eval::unary(&op, operand.value(), units)?;
        Ok(Expr::new(ExprKind::Unary { op, operand }, value))
    }

    pub fn binary(
        op: BinaryOp,
        left: Expr,
        right: Expr,
        units: &dyn UnitSystem,
    ) -> Result<Self, UnitError> {
        let value = eval::binary(op, left.value(), right.value(), units)?;
        Ok(Expr::new(ExprKind::Binary { op, left, right }, value))
    }

    /// Build a relation the way the host's comparison protocol delivers it:
    /// when only the right operand is a node, the sides arrive swapped.
    pub fn relation_from_host(
        left: Operand,
        relation: Relation,
        right: Operand,
        units: &dyn UnitSystem,
    ) -> Result<Self, UnitError> {
        match (left, right) {
            (left @ Operand::Expr(_), right) => Expr::binary(
                BinaryOp::Relation(relation),
                left.into_expr(),
                right.into_expr(),
                units,
            ),
            (left, right) => Expr::binary(
                BinaryOp::Relation(relation.mirrored()),
                right.into_expr(),
                left.into_expr(),
                units,
            ),
        }
    }

    /// `&` concatenation: both sides rendered and joined by a space.
    /// The result is plain text, not a node.
    pub fn concat(
        left: &Operand,
        right: &Operand,
        settings: &FormatSettings,
    ) -> Result<String, FormatError> {
        Ok(format!("{} {}", left.text(settings)?, right.text(settings)?))
    }

    pub fn grouping(kind: GroupKind, children: Vec<Expr>, scale: bool) -> Self {
        let value = match children.as_slice() {
            [only] => only.value.clone(),
            _ => None,
        };
        Expr::new(
            ExprKind::Grouping {
                kind,
                children,
                scale,
            },
            value,
        )
    }

    pub fn index(base: Expr, subscript: Expr) -> Self {
        let value = base.value.clone();
        Expr::new(ExprKind::Index { base, subscript }, value)
    }

    /// Comma-separated children with no delimiters.
    pub fn sequence(children: Vec<Expr>) -> Self {
        Expr::grouping(GroupKind::Sequence, children, false)
    }

    pub fn scripts(base: Option<Expr>, sup: Option<Expr>, sub: Option<Expr>) -> Self {
        Expr::new(ExprKind::Scripts { base, sup, sub }, None)
    }

    pub fn command(name: impl Into<String>, args: Vec<CommandArg>) -> Self {
        Expr::new(
            ExprKind::Command {
                name: name.into(),
                args,
            },
            None,
        )
    }

    pub fn environment(name: impl Into<String>, args: Vec<CommandArg>, body: Vec<Expr>) -> Self {
        Expr::new(
            ExprKind::Environment {
                name: name.into(),
                args,
                body,
            },
            None,
        )
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn value(&self) -> Option<&Evaluation> {
        self.value.as_ref()
    }

    /// The quantity behind a `Quantity` or `Variable` node.
    pub fn as_quantity(&self) -> Option<&Quantity> {
        match self.kind() {
            ExprKind::Quantity(q) | ExprKind::Variable { quantity: q, .. } => Some(q),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self.kind() {
            ExprKind::Variable { name, .. } => Some(name),
            _ => None,
        }
    }

    /// A copy of this quantity or variable with a different unit and the same
    /// magnitude. `None` for other node kinds.
    pub fn with_unit(&self, unit: Option<Unit>) -> Option<Expr> {
        match self.kind() {
            ExprKind::Quantity(q) => Some(Expr::quantity(q.clone().with_unit(unit))),
            ExprKind::Variable { name, quantity } => Some(Expr::variable(
                name.clone(),
                quantity.clone().with_unit(unit),
            )),
            _ => None,
        }
    }
}
