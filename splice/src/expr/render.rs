use crate::format::{FormatError, FormatSettings, FormatSpec, format_number};

use super::{
    BinaryOp, CommandArg, Expr, ExprKind, GroupKind, LiteralValue, PREC_ADDITIVE, PREC_ATOM, PREC_DIVISION,
    PREC_MULTIPLICATIVE, PREC_POWER, PREC_RELATION, PREC_UNARY, Quantity, UnaryOp,
};

struct Renderer<'a> {
    settings: &'a FormatSettings,
    /// Applied to quantity leaves only.
    spec: Option<&'a FormatSpec>,
}

impl Expr {
    /// Typeset this node as LaTeX math. `spec` overrides the format of every
    /// quantity leaf; literal numbers keep their own.
    pub fn render(
        &self,
        settings: &FormatSettings,
        spec: Option<&FormatSpec>,
    ) -> Result<String, FormatError> {
        Renderer { settings, spec }.node(self)
    }

    /// How tightly the rendered form of this node binds.
    pub fn precedence(&self) -> u8 {
        match self.kind() {
            ExprKind::Literal {
                value: LiteralValue::Number(n),
                ..
            } if n.is_negative() => PREC_UNARY,
            ExprKind::Literal { .. } | ExprKind::Variable { .. } => PREC_ATOM,
            ExprKind::Quantity(q) => match q.value {
                Some(v) if v.is_negative() => PREC_UNARY,
                Some(_) if q.unit.is_some() => PREC_MULTIPLICATIVE,
                _ => PREC_ATOM,
            },
            ExprKind::Unary { op, .. } => match op {
                UnaryOp::Plus | UnaryOp::Minus => PREC_UNARY,
                UnaryOp::Sqrt { .. } | UnaryOp::Function { .. } => PREC_ATOM,
            },
            ExprKind::Binary { op, .. } => match op {
                BinaryOp::Add | BinaryOp::Sub => PREC_ADDITIVE,
                BinaryOp::Mul | BinaryOp::Times => PREC_MULTIPLICATIVE,
                BinaryOp::Div | BinaryOp::FloorDiv => PREC_DIVISION,
                BinaryOp::Pow => PREC_POWER,
                BinaryOp::Relation(_) => PREC_RELATION,
            },
            ExprKind::Grouping { .. }
            | ExprKind::Index { .. }
            | ExprKind::Scripts { .. }
            | ExprKind::Command { .. }
            | ExprKind::Environment { .. } => PREC_ATOM,
        }
    }
}

impl Renderer<'_> {
    /// Render `expr`, wrapping it when it binds looser than `required`.
    fn at(&self, expr: &Expr, required: u8) -> Result<String, FormatError> {
        let text = self.node(expr)?;
        Ok(if expr.precedence() < required {
            wrap(&text)
        } else {
            text
        })
    }

    /// Like [`Renderer::at`], but also wraps text that starts with a sign.
    fn operand(&self, expr: &Expr, required: u8) -> Result<String, FormatError> {
        let text = self.at(expr, required)?;
        Ok(if text.starts_with(['+', '-']) {
            wrap(&text)
        } else {
            text
        })
    }

    fn node(&self, expr: &Expr) -> Result<String, FormatError> {
        match expr.kind() {
            ExprKind::Literal { value, format } => match value {
                LiteralValue::Number(n) => match format {
                    Some(spec) if !spec.is_empty() => format_number(*n, spec),
                    _ => Ok(self.settings.plain(*n)),
                },
                LiteralValue::Text(t) => Ok(t.clone()),
            },
            ExprKind::Quantity(q) => self.quantity(q),
            ExprKind::Variable { name, .. } => Ok(name.clone()),
            ExprKind::Unary { op, operand } => self.unary(op, operand),
            ExprKind::Binary { op, left, right } => self.binary(*op, left, right),
            ExprKind::Grouping {
                kind,
                children,
                scale,
            } => self.grouping(*kind, children, *scale),
            ExprKind::Index { base, subscript } => Ok(format!(
                "{{{}}}_{{{}}}",
                self.at(base, PREC_ATOM)?,
                self.at(subscript, 0)?
            )),
            ExprKind::Scripts { base, sup, sub } => {
                let mut out = match base {
                    Some(base) => format!("{{{}}}", self.at(base, PREC_ATOM)?),
                    None => "{}".to_string(),
                };
                if let Some(sup) = sup {
                    out.push_str(&format!("^{{{}}}", self.at(sup, 0)?));
                }
                if let Some(sub) = sub {
                    out.push_str(&format!("_{{{}}}", self.at(sub, 0)?));
                }
                Ok(out)
            }
            ExprKind::Command { name, args } => {
                let mut out = format!("\\{}", name);
                self.arguments(&mut out, args)?;
                Ok(out)
            }
            ExprKind::Environment { name, args, body } => {
                let mut out = format!("\\begin{{{}}}", name);
                self.arguments(&mut out, args)?;
                for child in body {
                    out.push_str(&self.at(child, 0)?);
                }
                out.push_str(&format!("\\end{{{}}}", name));
                Ok(out)
            }
        }
    }

    fn arguments(&self, out: &mut String, args: &[CommandArg]) -> Result<(), FormatError> {
        for arg in args {
            let inner = self.at(&arg.content, 0)?;
            if arg.optional {
                out.push_str(&format!("[{}]", inner));
            } else {
                out.push_str(&format!("{{{}}}", inner));
            }
        }
        Ok(())
    }

    fn quantity(&self, q: &Quantity) -> Result<String, FormatError> {
        let number = match q.value {
            Some(v) => self.settings.format_value(v, self.spec, q.format.as_ref())?,
            None => String::new(),
        };
        let unit = q.unit.as_ref().map(|u| u.to_latex()).unwrap_or_default();
        Ok(match (number.is_empty(), unit.is_empty()) {
            (_, true) => number,
            (true, false) => unit,
            (false, false) => format!("{}\\,{}", number, unit),
        })
    }

    fn unary(&self, op: &UnaryOp, operand: &Expr) -> Result<String, FormatError> {
        match op {
            UnaryOp::Plus => Ok(format!("+{}", self.operand(operand, PREC_UNARY + 1)?)),
            UnaryOp::Minus => Ok(format!("-{}", self.operand(operand, PREC_UNARY + 1)?)),
            UnaryOp::Sqrt { root } => {
                let inner = self.at(operand, 0)?;
                Ok(match root {
                    Some(n) => format!("\\sqrt[{}]{{{}}}", n, inner),
                    None => format!("\\sqrt{{{}}}", inner),
                })
            }
            UnaryOp::Function { name, power } => {
                let mut out = format!("\\{}", name);
                if let Some(p) = power {
                    out.push_str(&format!("^{{{}}}", self.settings.plain(*p)));
                }
                out.push_str(&wrap(&self.at(operand, 0)?));
                Ok(out)
            }
        }
    }

    fn binary(&self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<String, FormatError> {
        match op {
            BinaryOp::Add => Ok(join(
                &self.at(left, PREC_ADDITIVE)?,
                "+",
                &self.operand(right, PREC_ADDITIVE)?,
            )),
            BinaryOp::Sub => Ok(join(
                &self.at(left, PREC_ADDITIVE)?,
                "-",
                &self.operand(right, PREC_ADDITIVE + 1)?,
            )),
            BinaryOp::Mul => {
                let l = self.at(left, PREC_MULTIPLICATIVE)?;
                let r = self.operand(right, PREC_MULTIPLICATIVE)?;
                let digits_meet = l.ends_with(|c: char| c.is_ascii_digit())
                    && r.starts_with(|c: char| c.is_ascii_digit() || c == '.');
                Ok(if digits_meet {
                    join(&l, "\\cdot", &r)
                } else {
                    let mut out = l;
                    push_token(&mut out, &r);
                    out
                })
            }
            BinaryOp::Times => Ok(join(
                &self.at(left, PREC_MULTIPLICATIVE)?,
                "\\times",
                &self.operand(right, PREC_MULTIPLICATIVE)?,
            )),
            BinaryOp::Div | BinaryOp::FloorDiv => {
                let command = if op == BinaryOp::Div { "frac" } else { "dfrac" };
                Ok(format!(
                    "\\{}{{{}}}{{{}}}",
                    command,
                    self.at(left, 0)?,
                    self.at(right, 0)?
                ))
            }
            BinaryOp::Pow => {
                let base = match left.kind() {
                    ExprKind::Index { .. } => self.node(left)?,
                    _ => format!("{{{}}}", self.at(left, PREC_ATOM)?),
                };
                Ok(format!("{}^{{{}}}", base, self.at(right, 0)?))
            }
            BinaryOp::Relation(relation) => Ok(join(
                &self.at(left, PREC_RELATION)?,
                relation.symbol(),
                &self.at(right, PREC_RELATION)?,
            )),
        }
    }

    fn grouping(&self, kind: GroupKind, children: &[Expr], scale: bool) -> Result<String, FormatError> {
        let mut inner = String::new();
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                inner.push_str(", ");
            }
            inner.push_str(&self.at(child, 0)?);
        }
        let (open, close) = match kind {
            GroupKind::Paren => ("(", ")"),
            GroupKind::Bracket => ("[", "]"),
            GroupKind::Brace => ("\\lbrace", "\\rbrace"),
            GroupKind::Angle => ("\\langle", "\\rangle"),
            GroupKind::Sequence => return Ok(inner),
        };
        let (open, close) = if scale {
            (format!("\\left{}", open), format!("\\right{}", close))
        } else {
            (open.to_string(), close.to_string())
        };
        Ok(join(&open, &inner, &close))
    }
}

fn wrap(text: &str) -> String {
    format!("\\left({}\\right)", text)
}

fn join(left: &str, op: &str, right: &str) -> String {
    let mut out = left.to_string();
    push_token(&mut out, op);
    push_token(&mut out, right);
    out
}

/// Append `next`, separating it with a space when `out` ends in a control
/// word and `next` starts with a letter.
fn push_token(out: &mut String, next: &str) {
    if ends_with_control_word(out) && next.starts_with(|c: char| c.is_ascii_alphabetic()) {
        out.push(' ');
    }
    out.push_str(next);
}

fn ends_with_control_word(text: &str) -> bool {
    let stem = text.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    stem.len() < text.len() && stem.ends_with('\\')
}
