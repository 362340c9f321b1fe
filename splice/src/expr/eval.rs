use crate::number::Number;
use crate::units::{CombineOp, Unit, UnitError, UnitSystem};

use super::{BinaryOp, Evaluation, Measure, Relation, UnaryOp};

const RELATIVE_TOLERANCE: f64 = 1e-12;

fn unit_of(m: &Measure) -> Unit {
    m.unit.clone().unwrap_or_default()
}

fn measure(magnitude: Number, unit: Unit) -> Option<Evaluation> {
    Some(Evaluation::Measure(Measure {
        magnitude,
        unit: Some(unit).filter(|u| !u.is_empty()),
    }))
}

/// Magnitude of a dimensionless measure in plain numbers (`deg` is scaled to radians).
fn dimensionless_value(m: &Measure) -> Option<f64> {
    match &m.unit {
        None => Some(m.magnitude.as_f64()),
        Some(u) if u.is_dimensionless() => Some(m.magnitude.as_f64() * u.scale()),
        Some(_) => None,
    }
}

pub(super) fn unary(
    op: &UnaryOp,
    operand: Option<&Evaluation>,
    units: &dyn UnitSystem,
) -> Result<Option<Evaluation>, UnitError> {
    let Some(Evaluation::Measure(m)) = operand else {
        return Ok(None);
    };
    match op {
        UnaryOp::Plus => Ok(Some(Evaluation::Measure(m.clone()))),
        UnaryOp::Minus => Ok(measure(m.magnitude.neg(), unit_of(m))),
        UnaryOp::Sqrt { root } => {
            let n = f64::from(root.unwrap_or(2));
            if m.magnitude.is_negative() || n == 0.0 {
                return Ok(None);
            }
            let unit = units.power(&unit_of(m), 1.0 / n)?;
            Ok(measure(Number::Float(m.magnitude.as_f64().powf(1.0 / n)), unit))
        }
        UnaryOp::Function { name, power } => {
            let Some(x) = dimensionless_value(m) else {
                return Ok(None);
            };
            let Some(y) = apply_function(name, x) else {
                return Ok(None);
            };
            let y = match power {
                Some(p) => y.powf(p.as_f64()),
                None => y,
            };
            Ok(measure(Number::Float(y), Unit::dimensionless()))
        }
    }
}

fn apply_function(name: &str, x: f64) -> Option<f64> {
    Some(match name {
        "sin" => x.sin(),
        "cos" => x.cos(),
        "tan" => x.tan(),
        "csc" => 1.0 / x.sin(),
        "sec" => 1.0 / x.cos(),
        "cot" => 1.0 / x.tan(),
        "sinh" => x.sinh(),
        "cosh" => x.cosh(),
        "tanh" => x.tanh(),
        "coth" => 1.0 / x.tanh(),
        "arcsin" => x.asin(),
        "arccos" => x.acos(),
        "arctan" => x.atan(),
        "exp" => x.exp(),
        "ln" | "log" => x.ln(),
        "lg" => x.log10(),
        _ => return None,
    })
}

pub(super) fn binary(
    op: BinaryOp,
    left: Option<&Evaluation>,
    right: Option<&Evaluation>,
    units: &dyn UnitSystem,
) -> Result<Option<Evaluation>, UnitError> {
    let (Some(Evaluation::Measure(a)), Some(Evaluation::Measure(b))) = (left, right) else {
        return Ok(None);
    };
    let (ua, ub) = (unit_of(a), unit_of(b));

    match op {
        BinaryOp::Add | BinaryOp::Sub => {
            let unit = units.combine(CombineOp::Sum, &ua, &ub)?;
            let rhs = if ua == ub {
                b.magnitude
            } else {
                Number::Float(units.convert(b.magnitude.as_f64(), &ub, &ua)?)
            };
            let magnitude = if op == BinaryOp::Add {
                a.magnitude.add(rhs)
            } else {
                a.magnitude.sub(rhs)
            };
            Ok(measure(magnitude, unit))
        }
        BinaryOp::Mul | BinaryOp::Times => {
            let unit = units.combine(CombineOp::Product, &ua, &ub)?;
            Ok(measure(a.magnitude.mul(b.magnitude), unit))
        }
        BinaryOp::Div | BinaryOp::FloorDiv => {
            let unit = units.combine(CombineOp::Quotient, &ua, &ub)?;
            Ok(a.magnitude
                .div(b.magnitude)
                .and_then(|magnitude| measure(magnitude, unit)))
        }
        BinaryOp::Pow => {
            let exponent = match &b.unit {
                None => b.magnitude,
                Some(u) if u.is_dimensionless() => Number::Float(b.magnitude.as_f64() * u.scale()),
                Some(u) => return Err(UnitError::DimensionedExponent(u.to_string())),
            };
            let unit = units.power(&ua, exponent.as_f64())?;
            Ok(measure(a.magnitude.pow(exponent), unit))
        }
        BinaryOp::Relation(relation) => {
            if !ua.is_compatible(&ub) {
                return Err(UnitError::Incompatible {
                    action: "compare",
                    left: ua.to_string(),
                    right: ub.to_string(),
                });
            }
            let x = a.magnitude.as_f64();
            let y = if ua == ub {
                b.magnitude.as_f64()
            } else {
                units.convert(b.magnitude.as_f64(), &ub, &ua)?
            };
            Ok(Some(Evaluation::Truth(compare(relation, x, y))))
        }
    }
}

fn approx_eq(x: f64, y: f64) -> bool {
    x == y || (x - y).abs() <= RELATIVE_TOLERANCE * x.abs().max(y.abs())
}

fn compare(relation: Relation, x: f64, y: f64) -> bool {
    match relation {
        Relation::Eq => approx_eq(x, y),
        Relation::Ne => !approx_eq(x, y),
        Relation::Lt => x < y,
        Relation::Le => x <= y || approx_eq(x, y),
        Relation::Gt => x > y,
        Relation::Ge => x >= y || approx_eq(x, y),
    }
}
