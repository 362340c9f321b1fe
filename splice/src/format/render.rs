use crate::number::{Number, float_repr};

use super::{Align, FormatError, FormatSpec, FormatType, Sign};

/// Format a number according to `spec`.
pub fn format_number(value: Number, spec: &FormatSpec) -> Result<String, FormatError> {
    let (negative, prefix, body) = match value {
        Number::Int(n) => integer_body(n, spec)?,
        Number::Float(f) => {
            if let Some(kind) = spec.kind
                && is_integer_only(kind)
            {
                return Err(FormatError::UnknownCode {
                    code: kind.code(),
                    target: "float",
                });
            }
            float_body(f, spec)?
        }
    };

    let negative = negative && !(spec.coerce_zero && is_zero_text(&body));
    let sign = match (negative, spec.sign) {
        (true, _) => "-",
        (false, Some(Sign::Plus)) => "+",
        (false, Some(Sign::Space)) => " ",
        _ => "",
    };
    Ok(pad(sign, &prefix, &body, spec, Align::Right))
}

/// Format a string according to `spec`. Only the `s` type is accepted.
pub fn format_str(value: &str, spec: &FormatSpec) -> Result<String, FormatError> {
    if let Some(kind) = spec.kind
        && kind != FormatType::String
    {
        return Err(FormatError::UnknownCode {
            code: kind.code(),
            target: "str",
        });
    }
    if spec.sign.is_some() {
        return Err(FormatError::NotAllowed(
            "sign not allowed in string format specifier".into(),
        ));
    }
    if spec.alternate {
        return Err(FormatError::NotAllowed(
            "alternate form (#) not allowed in string format specifier".into(),
        ));
    }
    if spec.align == Some(Align::AfterSign) {
        return Err(FormatError::NotAllowed(
            "'=' alignment not allowed in string format specifier".into(),
        ));
    }
    if let Some(g) = spec.grouping {
        return Err(FormatError::NotAllowed(format!("cannot specify '{}' with 's'", g)));
    }
    let body: String = match spec.precision {
        Some(p) => value.chars().take(p).collect(),
        None => value.to_string(),
    };
    Ok(pad("", "", &body, spec, Align::Left))
}

fn is_integer_only(kind: FormatType) -> bool {
    matches!(
        kind,
        FormatType::Binary
            | FormatType::Char
            | FormatType::Decimal
            | FormatType::Octal
            | FormatType::Hex
            | FormatType::HexUpper
            | FormatType::String
    )
}

fn is_zero_text(body: &str) -> bool {
    body.chars().all(|c| matches!(c, '0' | '.' | ',' | '_' | '%'))
}

fn integer_body(n: i64, spec: &FormatSpec) -> Result<(bool, String, String), FormatError> {
    let negative = n < 0;
    let magnitude = n.unsigned_abs();
    let radix = |base: u32, upper: bool, marker: &str| -> Result<(bool, String, String), FormatError> {
        if spec.precision.is_some() {
            return Err(FormatError::NotAllowed(
                "precision not allowed in integer format specifier".into(),
            ));
        }
        if spec.grouping == Some(',') {
            return Err(FormatError::NotAllowed(format!(
                "cannot specify ',' with '{}'",
                marker.chars().last().unwrap_or('x')
            )));
        }
        let mut digits = match base {
            2 => format!("{:b}", magnitude),
            8 => format!("{:o}", magnitude),
            _ if upper => format!("{:X}", magnitude),
            _ => format!("{:x}", magnitude),
        };
        if spec.grouping == Some('_') {
            digits = group_digits(&digits, '_', 4);
        }
        let prefix = if spec.alternate {
            if upper { marker.to_uppercase() } else { marker.to_string() }
        } else {
            String::new()
        };
        Ok((negative, prefix, digits))
    };

    match spec.kind {
        None | Some(FormatType::Decimal) | Some(FormatType::Locale) => {
            if spec.precision.is_some() {
                return Err(FormatError::NotAllowed(
                    "precision not allowed in integer format specifier".into(),
                ));
            }
            let digits = magnitude.to_string();
            let digits = match spec.grouping {
                Some(sep) => group_digits(&digits, sep, 3),
                None => digits,
            };
            Ok((negative, String::new(), digits))
        }
        Some(FormatType::Binary) => radix(2, false, "0b"),
        Some(FormatType::Octal) => radix(8, false, "0o"),
        Some(FormatType::Hex) => radix(16, false, "0x"),
        Some(FormatType::HexUpper) => radix(16, true, "0x"),
        Some(FormatType::Char) => {
            if spec.sign.is_some() {
                return Err(FormatError::NotAllowed(
                    "sign not allowed with integer format specifier 'c'".into(),
                ));
            }
            let c = u32::try_from(n)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| FormatError::NotAllowed(format!("%c arg not in range: {}", n)))?;
            Ok((false, String::new(), c.to_string()))
        }
        Some(FormatType::String) => Err(FormatError::UnknownCode {
            code: 's',
            target: "int",
        }),
        Some(_) => float_body(n as f64, spec),
    }
}

fn float_body(f: f64, spec: &FormatSpec) -> Result<(bool, String, String), FormatError> {
    let negative = f.is_sign_negative() && !f.is_nan();
    let a = f.abs();
    let upper = matches!(
        spec.kind,
        Some(FormatType::ExponentUpper | FormatType::FixedUpper | FormatType::GeneralUpper)
    );

    if !a.is_finite() {
        let text = if a.is_nan() { "nan" } else { "inf" };
        let text = if upper { text.to_uppercase() } else { text.to_string() };
        return Ok((negative, String::new(), text));
    }

    let body = match spec.kind {
        Some(FormatType::Fixed) | Some(FormatType::FixedUpper) => {
            fixed(a, spec.precision.unwrap_or(6), spec.alternate)
        }
        Some(FormatType::Exponent) | Some(FormatType::ExponentUpper) => {
            let text = exponent(a, spec.precision.unwrap_or(6), spec.alternate);
            if upper { text.to_uppercase() } else { text }
        }
        Some(FormatType::General) | Some(FormatType::GeneralUpper) | Some(FormatType::Locale) => {
            let text = general(a, spec.precision.unwrap_or(6), spec.alternate);
            if upper { text.to_uppercase() } else { text }
        }
        Some(FormatType::Percent) => {
            format!("{}%", fixed(a * 100.0, spec.precision.unwrap_or(6), spec.alternate))
        }
        Some(FormatType::Typeset) => typeset(a, spec.precision.unwrap_or(2)),
        None => match spec.precision {
            None => float_repr(a),
            Some(p) => {
                let mut text = general(a, p, spec.alternate);
                if !text.contains(['.', 'e']) {
                    text.push_str(".0");
                }
                text
            }
        },
        Some(other) => {
            return Err(FormatError::UnknownCode {
                code: other.code(),
                target: "float",
            });
        }
    };

    let body = match spec.grouping {
        Some(sep) => {
            let split = body.find(|c: char| !c.is_ascii_digit()).unwrap_or(body.len());
            format!("{}{}", group_digits(&body[..split], sep, 3), &body[split..])
        }
        None => body,
    };
    Ok((negative, String::new(), body))
}

fn fixed(a: f64, precision: usize, alternate: bool) -> String {
    let mut text = format!("{:.*}", precision, a);
    if alternate && precision == 0 {
        text.push('.');
    }
    text
}

/// Split `{:e}` output into mantissa and decimal exponent.
fn scientific_parts(a: f64, precision: usize) -> (String, i32) {
    let text = format!("{:.*e}", precision, a);
    match text.split_once('e') {
        Some((mantissa, exp)) => (mantissa.to_string(), exp.parse().unwrap_or(0)),
        None => (text, 0),
    }
}

fn exponent(a: f64, precision: usize, alternate: bool) -> String {
    let (mut mantissa, exp) = scientific_parts(a, precision);
    if alternate && precision == 0 {
        mantissa.push('.');
    }
    format!("{}e{}{:02}", mantissa, if exp < 0 { '-' } else { '+' }, exp.abs())
}

fn general(a: f64, precision: usize, alternate: bool) -> String {
    let p = precision.max(1);
    let (_, exp) = scientific_parts(a, p - 1);
    if -4 <= exp && (exp as i64) < p as i64 {
        let decimals = (p as i64 - 1 - exp as i64).max(0) as usize;
        let text = format!("{:.*}", decimals, a);
        if alternate { text } else { strip_zeros(&text) }
    } else {
        let (mantissa, exp) = scientific_parts(a, p - 1);
        let mantissa = if alternate { mantissa } else { strip_zeros(&mantissa) };
        format!("{}e{}{:02}", mantissa, if exp < 0 { '-' } else { '+' }, exp.abs())
    }
}

fn typeset(a: f64, precision: usize) -> String {
    let (mantissa, exp) = scientific_parts(a, precision);
    if exp == 0 {
        mantissa
    } else {
        format!("{}\\times10^{{{}}}", mantissa, exp)
    }
}

fn strip_zeros(text: &str) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text.to_string()
    }
}

fn group_digits(digits: &str, sep: char, size: usize) -> String {
    let len = digits.chars().count();
    let mut out = String::with_capacity(len + len / size);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % size == 0 {
            out.push(sep);
        }
        out.push(c);
    }
    out
}

fn pad(sign: &str, prefix: &str, body: &str, spec: &FormatSpec, default_align: Align) -> String {
    let (fill, align) = match (spec.fill, spec.align) {
        (fill, Some(align)) => (fill.unwrap_or(' '), align),
        (_, None) if spec.zero_pad => ('0', Align::AfterSign),
        _ => (' ', default_align),
    };
    let content_len = sign.chars().count() + prefix.chars().count() + body.chars().count();
    let width = spec.width.unwrap_or(0);
    if content_len >= width {
        return format!("{}{}{}", sign, prefix, body);
    }
    let n = width - content_len;
    let fill_str = |count: usize| fill.to_string().repeat(count);
    match align {
        Align::Left => format!("{}{}{}{}", sign, prefix, body, fill_str(n)),
        Align::Right => format!("{}{}{}{}", fill_str(n), sign, prefix, body),
        Align::AfterSign => format!("{}{}{}{}", sign, prefix, fill_str(n), body),
        Align::Center => {
            let left = n / 2;
            format!("{}{}{}{}{}", fill_str(left), sign, prefix, body, fill_str(n - left))
        }
    }
}
