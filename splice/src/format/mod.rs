mod render;

use std::fmt;

use thiserror::Error;

use crate::number::{Number, float_repr};

pub use render::{format_number, format_str};

/// Failure to parse or apply a format specifier.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    #[error("invalid format specifier `{0}`")]
    Malformed(String),
    #[error("unknown format code '{code}' for value of type {target}")]
    UnknownCode { code: char, target: &'static str },
    #[error("{0}")]
    NotAllowed(String),
    #[error("structured nodes do not accept a format specifier (got `{0}`)")]
    StructuredValue(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    /// `<`
    Left,
    /// `>`
    Right,
    /// `=`, padding goes between the sign and the digits.
    AfterSign,
    /// `^`
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
    Space,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatType {
    Binary,
    Char,
    Decimal,
    Exponent,
    ExponentUpper,
    Fixed,
    FixedUpper,
    General,
    GeneralUpper,
    Locale,
    Octal,
    String,
    Hex,
    HexUpper,
    Percent,
    /// Scientific notation with a typeset exponent: `1.23\times10^{4}`.
    Typeset,
}

impl FormatType {
    fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'b' => FormatType::Binary,
            'c' => FormatType::Char,
            'd' => FormatType::Decimal,
            'e' => FormatType::Exponent,
            'E' => FormatType::ExponentUpper,
            'f' => FormatType::Fixed,
            'F' => FormatType::FixedUpper,
            'g' => FormatType::General,
            'G' => FormatType::GeneralUpper,
            'n' => FormatType::Locale,
            'o' => FormatType::Octal,
            's' => FormatType::String,
            'x' => FormatType::Hex,
            'X' => FormatType::HexUpper,
            '%' => FormatType::Percent,
            't' => FormatType::Typeset,
            _ => return None,
        })
    }

    pub fn code(self) -> char {
        match self {
            FormatType::Binary => 'b',
            FormatType::Char => 'c',
            FormatType::Decimal => 'd',
            FormatType::Exponent => 'e',
            FormatType::ExponentUpper => 'E',
            FormatType::Fixed => 'f',
            FormatType::FixedUpper => 'F',
            FormatType::General => 'g',
            FormatType::GeneralUpper => 'G',
            FormatType::Locale => 'n',
            FormatType::Octal => 'o',
            FormatType::String => 's',
            FormatType::Hex => 'x',
            FormatType::HexUpper => 'X',
            FormatType::Percent => '%',
            FormatType::Typeset => 't',
        }
    }
}

/// A parsed format specifier:
/// `[[fill]align][sign][z][#][0][width][grouping][.precision][type]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatSpec {
    pub fill: Option<char>,
    pub align: Option<Align>,
    pub sign: Option<Sign>,
    pub coerce_zero: bool,
    pub alternate: bool,
    pub zero_pad: bool,
    pub width: Option<usize>,
    pub grouping: Option<char>,
    pub precision: Option<usize>,
    pub kind: Option<FormatType>,
    text: String,
}

fn align_of(c: char) -> Option<Align> {
    match c {
        '<' => Some(Align::Left),
        '>' => Some(Align::Right),
        '=' => Some(Align::AfterSign),
        '^' => Some(Align::Center),
        _ => None,
    }
}

impl FormatSpec {
    /// Parse a complete specifier. A single leading `:` is accepted and ignored.
    pub fn parse(text: &str) -> Result<FormatSpec, FormatError> {
        let body = text.strip_prefix(':').unwrap_or(text);
        let (spec, consumed) = parse_prefix(body);
        if consumed != body.len() {
            return Err(FormatError::Malformed(text.to_string()));
        }
        Ok(spec)
    }

    /// Match a specifier at the start of `text` (the text right after a `:`).
    ///
    /// Returns the spec and the number of bytes it covers, or `None` when the
    /// colon should be read as ordinary prose.
    pub fn match_prefix(text: &str) -> Option<(FormatSpec, usize)> {
        let (spec, consumed) = parse_prefix(text);
        if consumed == 0 {
            return None;
        }
        if text.starts_with(char::is_whitespace) && spec.fill.is_none() {
            return None;
        }
        if text[consumed..]
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            return None;
        }
        Some((spec, consumed))
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn parse_prefix(text: &str) -> (FormatSpec, usize) {
    let mut spec = FormatSpec::default();
    let mut chars = text.char_indices().peekable();
    let mut end = 0;

    let mut lookahead = text.chars();
    match (lookahead.next(), lookahead.next()) {
        (Some(fill), Some(a)) if align_of(a).is_some() => {
            spec.fill = Some(fill);
            spec.align = align_of(a);
            chars.next();
            chars.next();
            end = fill.len_utf8() + 1;
        }
        (Some(a), _) if align_of(a).is_some() => {
            spec.align = align_of(a);
            chars.next();
            end = 1;
        }
        _ => {}
    }

    if let Some(&(i, c)) = chars.peek() {
        let sign = match c {
            '+' => Some(Sign::Plus),
            '-' => Some(Sign::Minus),
            ' ' => Some(Sign::Space),
            _ => None,
        };
        if sign.is_some() {
            spec.sign = sign;
            chars.next();
            end = i + 1;
        }
    }

    if let Some(&(i, 'z')) = chars.peek() {
        spec.coerce_zero = true;
        chars.next();
        end = i + 1;
    }
    if let Some(&(i, '#')) = chars.peek() {
        spec.alternate = true;
        chars.next();
        end = i + 1;
    }
    if let Some(&(i, '0')) = chars.peek() {
        spec.zero_pad = true;
        chars.next();
        end = i + 1;
    }

    let width_start = end;
    while let Some(&(i, c)) = chars.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        chars.next();
        end = i + 1;
    }
    if end > width_start {
        spec.width = text[width_start..end].parse().ok();
    }

    if let Some(&(i, c)) = chars.peek()
        && (c == ',' || c == '_')
    {
        spec.grouping = Some(c);
        chars.next();
        end = i + 1;
    }

    if let Some(&(i, '.')) = chars.peek() {
        let digits: String = text[i + 1..].chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() {
            spec.precision = digits.parse().ok();
            chars.next();
            for _ in 0..digits.len() {
                chars.next();
            }
            end = i + 1 + digits.len();
        }
    }

    if let Some(&(i, c)) = chars.peek()
        && let Some(kind) = FormatType::from_char(c)
    {
        spec.kind = Some(kind);
        end = i + 1;
    }

    spec.text = text[..end].to_string();
    (spec, end)
}

/// Process-wide numeric formatting defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatSettings {
    /// Used when neither a call nor a node supplies a specifier.
    pub default_spec: Option<FormatSpec>,
    /// Floats with more decimal digits than this are rounded and trimmed
    /// when printed without a specifier. Zero or negative disables rounding.
    pub float_digits: i32,
}

impl Default for FormatSettings {
    fn default() -> Self {
        FormatSettings {
            default_spec: None,
            float_digits: 10,
        }
    }
}

impl FormatSettings {
    /// Format with the first available of `explicit`, `stored`, and the default spec.
    pub fn format_value(
        &self,
        value: Number,
        explicit: Option<&FormatSpec>,
        stored: Option<&FormatSpec>,
    ) -> Result<String, FormatError> {
        match explicit.or(stored).or(self.default_spec.as_ref()) {
            Some(spec) if !spec.is_empty() => format_number(value, spec),
            _ => Ok(self.plain(value)),
        }
    }

    /// Stringify without a specifier, masking float representation noise.
    pub fn plain(&self, value: Number) -> String {
        let f = match value {
            Number::Int(n) => return n.to_string(),
            Number::Float(f) => f,
        };
        let repr = float_repr(f);
        if self.float_digits <= 0 || !f.is_finite() || repr.contains('e') {
            return repr;
        }
        let digits = self.float_digits as usize;
        let decimals = repr.split_once('.').map_or(0, |(_, frac)| frac.len());
        if decimals <= digits {
            return repr;
        }
        let rounded = format!("{:.*}", digits, f);
        let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
        if trimmed == "-0" {
            "0".to_string()
        } else {
            trimmed.to_string()
        }
    }
}
