mod registry;

use std::fmt;

use thiserror::Error;

use crate::number::float_repr;

pub use registry::SiRegistry;

/// Exponents over the seven SI base dimensions: length, mass, time, current,
/// temperature, amount, luminous intensity.
pub type Dimension = [f64; 7];

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    #[error("unknown unit `{0}`")]
    Unknown(String),
    #[error("cannot parse unit descriptor `{descriptor}`: {reason}")]
    Malformed { descriptor: String, reason: String },
    #[error("incompatible units: cannot {action} `{left}` and `{right}`")]
    Incompatible {
        action: &'static str,
        left: String,
        right: String,
    },
    #[error("exponent must be dimensionless, got `{0}`")]
    DimensionedExponent(String),
}

/// How two unit-bearing operands are being combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineOp {
    Sum,
    Product,
    Quotient,
}

/// One factor of a unit, e.g. `s^-1`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitTerm {
    pub symbol: String,
    pub latex: String,
    pub exponent: f64,
    /// Size of one of this unit in coherent SI units.
    pub scale: f64,
    pub dimension: Dimension,
}

/// An ordered product of unit terms. The empty product is dimensionless.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Unit {
    terms: Vec<UnitTerm>,
}

impl Unit {
    pub fn dimensionless() -> Self {
        Unit::default()
    }

    pub fn from_terms(terms: Vec<UnitTerm>) -> Self {
        let mut unit = Unit::default();
        for term in terms {
            unit.push(term);
        }
        unit
    }

    pub fn terms(&self) -> &[UnitTerm] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Multiply in a term, merging it with an existing term of the same symbol.
    fn push(&mut self, term: UnitTerm) {
        if let Some(existing) = self.terms.iter_mut().find(|t| t.symbol == term.symbol) {
            existing.exponent += term.exponent;
        } else {
            self.terms.push(term);
        }
        self.terms.retain(|t| t.exponent.abs() > EPSILON);
    }

    pub fn dimension(&self) -> Dimension {
        let mut dim = [0.0; 7];
        for term in &self.terms {
            for (d, t) in dim.iter_mut().zip(term.dimension.iter()) {
                *d += t * term.exponent;
            }
        }
        dim
    }

    pub fn scale(&self) -> f64 {
        self.terms
            .iter()
            .map(|t| t.scale.powf(t.exponent))
            .product()
    }

    pub fn is_dimensionless(&self) -> bool {
        self.dimension().iter().all(|d| d.abs() < EPSILON)
    }

    pub fn is_compatible(&self, other: &Unit) -> bool {
        self.dimension()
            .iter()
            .zip(other.dimension().iter())
            .all(|(a, b)| (a - b).abs() < EPSILON)
    }

    pub fn product(&self, other: &Unit) -> Unit {
        let mut unit = self.clone();
        for term in &other.terms {
            unit.push(term.clone());
        }
        unit
    }

    pub fn powf(&self, exponent: f64) -> Unit {
        let terms = self
            .terms
            .iter()
            .map(|t| UnitTerm {
                exponent: t.exponent * exponent,
                ..t.clone()
            })
            .collect();
        Unit::from_terms(terms)
    }

    /// Typeset form, e.g. `\mathrm{m}\,\mathrm{s}^{-1}`.
    pub fn to_latex(&self) -> String {
        self.terms
            .iter()
            .map(|t| {
                if (t.exponent - 1.0).abs() < EPSILON {
                    t.latex.clone()
                } else {
                    format!("{}^{{{}}}", t.latex, exponent_text(t.exponent))
                }
            })
            .collect::<Vec<_>>()
            .join("\\,")
    }
}

fn exponent_text(exponent: f64) -> String {
    if (exponent - exponent.round()).abs() < EPSILON {
        format!("{}", exponent.round() as i64)
    } else {
        float_repr(exponent)
    }
}

/// Descriptor form, e.g. `m*s^-1`. Round-trips through [`SiRegistry::resolve`].
impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, "*")?;
            }
            write!(f, "{}", term.symbol)?;
            if (term.exponent - 1.0).abs() >= EPSILON {
                write!(f, "^{}", exponent_text(term.exponent))?;
            }
        }
        Ok(())
    }
}

/// The unit-conversion service consulted by expression evaluation.
pub trait UnitSystem {
    /// Turn a descriptor such as `"cm"` or `"kg*m/s^2"` into a unit.
    fn resolve(&self, descriptor: &str) -> Result<Unit, UnitError>;

    /// Unit of `left OP right`. Sums keep the left unit and require compatibility.
    fn combine(&self, op: CombineOp, left: &Unit, right: &Unit) -> Result<Unit, UnitError> {
        match op {
            CombineOp::Sum if left.is_compatible(right) => Ok(left.clone()),
            CombineOp::Sum => Err(UnitError::Incompatible {
                action: "add",
                left: left.to_string(),
                right: right.to_string(),
            }),
            CombineOp::Product => Ok(left.product(right)),
            CombineOp::Quotient => Ok(left.product(&right.powf(-1.0))),
        }
    }

    fn power(&self, unit: &Unit, exponent: f64) -> Result<Unit, UnitError> {
        Ok(unit.powf(exponent))
    }

    /// Express `value` (in `from`) in `to`.
    fn convert(&self, value: f64, from: &Unit, to: &Unit) -> Result<f64, UnitError> {
        if !from.is_compatible(to) {
            return Err(UnitError::Incompatible {
                action: "convert between",
                left: from.to_string(),
                right: to.to_string(),
            });
        }
        Ok(value * from.scale() / to.scale())
    }
}
