use super::{Dimension, Unit, UnitError, UnitSystem, UnitTerm};

const L: Dimension = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
const M: Dimension = [0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
const T: Dimension = [0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
const I: Dimension = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
const THETA: Dimension = [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0];
const N: Dimension = [0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0];
const J: Dimension = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0];
const NONE: Dimension = [0.0; 7];

const fn dim(l: f64, m: f64, t: f64, i: f64) -> Dimension {
    [l, m, t, i, 0.0, 0.0, 0.0]
}

struct UnitDef {
    names: &'static [&'static str],
    latex: &'static str,
    scale: f64,
    dimension: Dimension,
    prefixable: bool,
}

const fn unit(
    names: &'static [&'static str],
    latex: &'static str,
    scale: f64,
    dimension: Dimension,
    prefixable: bool,
) -> UnitDef {
    UnitDef {
        names,
        latex,
        scale,
        dimension,
        prefixable,
    }
}

// The first name is the canonical symbol.
const UNITS: &[UnitDef] = &[
    // SI base
    unit(&["m", "meter", "metre"], "\\mathrm{m}", 1.0, L, true),
    unit(&["g", "gram"], "\\mathrm{g}", 1e-3, M, true),
    unit(&["s", "second", "sec"], "\\mathrm{s}", 1.0, T, true),
    unit(&["A", "ampere", "amp"], "\\mathrm{A}", 1.0, I, true),
    unit(&["K", "kelvin"], "\\mathrm{K}", 1.0, THETA, true),
    unit(&["mol", "mole"], "\\mathrm{mol}", 1.0, N, true),
    unit(&["cd", "candela"], "\\mathrm{cd}", 1.0, J, true),
    // SI derived
    unit(&["Hz", "hertz"], "\\mathrm{Hz}", 1.0, dim(0.0, 0.0, -1.0, 0.0), true),
    unit(&["N", "newton"], "\\mathrm{N}", 1.0, dim(1.0, 1.0, -2.0, 0.0), true),
    unit(&["Pa", "pascal"], "\\mathrm{Pa}", 1.0, dim(-1.0, 1.0, -2.0, 0.0), true),
    unit(&["J", "joule"], "\\mathrm{J}", 1.0, dim(2.0, 1.0, -2.0, 0.0), true),
    unit(&["W", "watt"], "\\mathrm{W}", 1.0, dim(2.0, 1.0, -3.0, 0.0), true),
    unit(&["C", "coulomb"], "\\mathrm{C}", 1.0, dim(0.0, 0.0, 1.0, 1.0), true),
    unit(&["V", "volt"], "\\mathrm{V}", 1.0, dim(2.0, 1.0, -3.0, -1.0), true),
    unit(&["F", "farad"], "\\mathrm{F}", 1.0, dim(-2.0, -1.0, 4.0, 2.0), true),
    unit(&["ohm", "Ω"], "\\Omega", 1.0, dim(2.0, 1.0, -3.0, -2.0), true),
    unit(&["S", "siemens"], "\\mathrm{S}", 1.0, dim(-2.0, -1.0, 3.0, 2.0), true),
    unit(&["Wb", "weber"], "\\mathrm{Wb}", 1.0, dim(2.0, 1.0, -2.0, -1.0), true),
    unit(&["T", "tesla"], "\\mathrm{T}", 1.0, dim(0.0, 1.0, -2.0, -1.0), true),
    unit(&["H", "henry"], "\\mathrm{H}", 1.0, dim(2.0, 1.0, -2.0, -2.0), true),
    unit(&["L", "l", "liter", "litre"], "\\mathrm{L}", 1e-3, dim(3.0, 0.0, 0.0, 0.0), true),
    unit(&["eV", "electronvolt"], "\\mathrm{eV}", 1.602_176_634e-19, dim(2.0, 1.0, -2.0, 0.0), true),
    unit(&["bar"], "\\mathrm{bar}", 1e5, dim(-1.0, 1.0, -2.0, 0.0), true),
    // Non-SI
    unit(&["min", "minute"], "\\mathrm{min}", 60.0, T, false),
    unit(&["h", "hr", "hour"], "\\mathrm{h}", 3600.0, T, false),
    unit(&["day"], "\\mathrm{d}", 86400.0, T, false),
    unit(&["in", "inch"], "\\mathrm{in}", 0.0254, L, false),
    unit(&["ft", "foot", "feet"], "\\mathrm{ft}", 0.3048, L, false),
    unit(&["yd", "yard"], "\\mathrm{yd}", 0.9144, L, false),
    unit(&["mi", "mile"], "\\mathrm{mi}", 1609.344, L, false),
    unit(&["lb", "pound"], "\\mathrm{lb}", 0.453_592_37, M, false),
    unit(&["atm", "atmosphere"], "\\mathrm{atm}", 101_325.0, dim(-1.0, 1.0, -2.0, 0.0), false),
    unit(&["rad", "radian"], "\\mathrm{rad}", 1.0, NONE, false),
    unit(&["deg", "degree"], "{}^{\\circ}", std::f64::consts::PI / 180.0, NONE, false),
];

const PREFIXES: &[(&str, &str, f64)] = &[
    ("Y", "Y", 1e24),
    ("Z", "Z", 1e21),
    ("E", "E", 1e18),
    ("P", "P", 1e15),
    ("T", "T", 1e12),
    ("G", "G", 1e9),
    ("M", "M", 1e6),
    ("k", "k", 1e3),
    ("h", "h", 1e2),
    ("da", "da", 1e1),
    ("d", "d", 1e-1),
    ("c", "c", 1e-2),
    ("m", "m", 1e-3),
    ("u", "\\mu ", 1e-6),
    ("µ", "\\mu ", 1e-6),
    ("n", "n", 1e-9),
    ("p", "p", 1e-12),
    ("f", "f", 1e-15),
    ("a", "a", 1e-18),
];

/// Built-in SI unit registry with prefixes and common non-SI units.
#[derive(Debug, Clone, Copy, Default)]
pub struct SiRegistry;

impl SiRegistry {
    pub fn new() -> Self {
        SiRegistry
    }

    fn lookup(&self, symbol: &str) -> Option<UnitTerm> {
        if let Some(def) = UNITS.iter().find(|u| u.names.contains(&symbol)) {
            return Some(term(def.names[0].to_string(), def.latex.to_string(), def.scale, def));
        }
        for (prefix, prefix_latex, factor) in PREFIXES {
            let Some(rest) = symbol.strip_prefix(prefix) else {
                continue;
            };
            if let Some(def) = UNITS
                .iter()
                .find(|u| u.prefixable && u.names[0] == rest)
            {
                let latex = match def.latex.strip_prefix("\\mathrm{") {
                    Some(inner) if !prefix_latex.starts_with('\\') => {
                        format!("\\mathrm{{{}{}", prefix, inner)
                    }
                    _ => format!("{}{}", prefix_latex, def.latex),
                };
                return Some(term(symbol.to_string(), latex, factor * def.scale, def));
            }
        }
        None
    }
}

fn term(symbol: String, latex: String, scale: f64, def: &UnitDef) -> UnitTerm {
    UnitTerm {
        symbol,
        latex,
        exponent: 1.0,
        scale,
        dimension: def.dimension,
    }
}

impl UnitSystem for SiRegistry {
    fn resolve(&self, descriptor: &str) -> Result<Unit, UnitError> {
        parse_descriptor(self, descriptor)
    }
}

fn malformed(descriptor: &str, reason: impl Into<String>) -> UnitError {
    UnitError::Malformed {
        descriptor: descriptor.to_string(),
        reason: reason.into(),
    }
}

/// Grammar: factors separated by `*`, `/` or whitespace; each factor is a
/// symbol with an optional `^n` or `**n`. `/` inverts only the next factor.
fn parse_descriptor(registry: &SiRegistry, descriptor: &str) -> Result<Unit, UnitError> {
    let chars: Vec<char> = descriptor.chars().collect();
    let mut i = 0;
    let mut terms = Vec::new();
    let mut invert_next = false;
    let mut expect_factor = true;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '*' && chars.get(i + 1) != Some(&'*') {
            if expect_factor {
                return Err(malformed(descriptor, "unexpected `*`"));
            }
            expect_factor = true;
            i += 1;
            continue;
        }
        if c == '/' {
            if expect_factor {
                return Err(malformed(descriptor, "unexpected `/`"));
            }
            invert_next = true;
            expect_factor = true;
            i += 1;
            continue;
        }
        if c == '1' && expect_factor && terms.is_empty() && matches!(next_significant(&chars, i + 1), Some('/')) {
            // `1/s`
            expect_factor = false;
            i += 1;
            continue;
        }
        if !(c.is_alphabetic() || c == 'µ' || c == 'Ω') {
            return Err(malformed(descriptor, format!("unexpected `{}`", c)));
        }

        let start = i;
        while i < chars.len() && (chars[i].is_alphabetic() || chars[i] == '_') {
            i += 1;
        }
        let symbol: String = chars[start..i].iter().collect();
        let mut term = registry
            .lookup(&symbol)
            .ok_or_else(|| UnitError::Unknown(symbol.clone()))?;

        let mut exponent = 1.0;
        let caret = if chars.get(i) == Some(&'^') {
            Some(1)
        } else if chars.get(i) == Some(&'*') && chars.get(i + 1) == Some(&'*') {
            Some(2)
        } else {
            None
        };
        if let Some(skip) = caret {
            i += skip;
            let exp_start = i;
            if matches!(chars.get(i), Some('-') | Some('+')) {
                i += 1;
            }
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[exp_start..i].iter().collect();
            exponent = text
                .parse::<f64>()
                .map_err(|_| malformed(descriptor, format!("bad exponent `{}`", text)))?;
        }
        if invert_next {
            exponent = -exponent;
            invert_next = false;
        }
        term.exponent = exponent;
        terms.push(term);
        expect_factor = false;
    }

    if expect_factor && !terms.is_empty() {
        return Err(malformed(descriptor, "trailing operator"));
    }
    Ok(Unit::from_terms(terms))
}

fn next_significant(chars: &[char], from: usize) -> Option<char> {
    chars[from.min(chars.len())..]
        .iter()
        .copied()
        .find(|c| !c.is_whitespace())
}
