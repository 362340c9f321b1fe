use std::ops::Range;

use splice::number::Number;

use crate::error::EvalError;

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    // Literals
    Number(Number),
    Str(String),
    True,
    False,
    None,

    Ident(String),

    // Keywords
    And,
    Or,
    Not,

    // Operators
    Plus,
    Minus,
    Star,
    DoubleStar,  // **
    Slash,
    DoubleSlash, // //
    Percent,
    At,          // @
    Amp,         // &
    Eq,          // =
    EqEq,        // ==
    BangEq,      // !=
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,

    /// Newline or `;` outside brackets.
    Separator,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number `{n}`"),
            Token::Str(_) => "string".to_string(),
            Token::Ident(name) => format!("`{name}`"),
            Token::Separator => "end of statement".to_string(),
            other => format!("`{}`", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::True => "True",
            Token::False => "False",
            Token::None => "None",
            Token::And => "and",
            Token::Or => "or",
            Token::Not => "not",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::DoubleStar => "**",
            Token::Slash => "/",
            Token::DoubleSlash => "//",
            Token::Percent => "%",
            Token::At => "@",
            Token::Amp => "&",
            Token::Eq => "=",
            Token::EqEq => "==",
            Token::BangEq => "!=",
            Token::Lt => "<",
            Token::LtEq => "<=",
            Token::Gt => ">",
            Token::GtEq => ">=",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Colon => ":",
            Token::Number(_) | Token::Str(_) | Token::Ident(_) | Token::Separator => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub span: Range<usize>,
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, EvalError> {
    let chars: Vec<char> = source.chars().collect();
    let len = chars.len();

    // Map character indices to byte offsets
    let byte_pos: Vec<usize> = {
        let mut bp = Vec::with_capacity(len + 1);
        let mut offset = 0;
        for c in &chars {
            bp.push(offset);
            offset += c.len_utf8();
        }
        bp.push(offset);
        bp
    };

    let mut tokens: Vec<Spanned> = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < len {
        let c = chars[i];
        let start = i;
        let token = match c {
            ' ' | '\t' | '\r' => {
                i += 1;
                continue;
            }
            '\\' if chars.get(i + 1) == Some(&'\n') => {
                i += 2;
                continue;
            }
            '#' => {
                while i < len && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '\n' | ';' => {
                i += 1;
                if depth > 0 && c == '\n' {
                    continue;
                }
                Token::Separator
            }

            '"' | '\'' => {
                let (text, end) = lex_string(&chars, i, false)
                    .map_err(|msg| EvalError::raised(msg).at(byte_pos[start]..byte_pos[len]))?;
                i = end;
                Token::Str(text)
            }

            '0'..='9' => {
                let (number, end) = lex_number(&chars, i);
                i = end;
                Token::Number(number)
            }
            '.' if chars.get(i + 1).is_some_and(|c| c.is_ascii_digit())
                && !follows_value(tokens.last()) =>
            {
                let (number, end) = lex_number(&chars, i);
                i = end;
                Token::Number(number)
            }

            c if c.is_alphabetic() || c == '_' => {
                while i < len && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                // Raw string prefix
                if (ident == "r" || ident == "R") && i < len && (chars[i] == '"' || chars[i] == '\'') {
                    let (text, end) = lex_string(&chars, i, true)
                        .map_err(|msg| EvalError::raised(msg).at(byte_pos[start]..byte_pos[len]))?;
                    i = end;
                    Token::Str(text)
                } else {
                    keyword(ident)
                }
            }

            _ => {
                let next = chars.get(i + 1).copied();
                let (token, width) = match (c, next) {
                    ('*', Some('*')) => (Token::DoubleStar, 2),
                    ('/', Some('/')) => (Token::DoubleSlash, 2),
                    ('=', Some('=')) => (Token::EqEq, 2),
                    ('!', Some('=')) => (Token::BangEq, 2),
                    ('<', Some('=')) => (Token::LtEq, 2),
                    ('>', Some('=')) => (Token::GtEq, 2),
                    ('+', _) => (Token::Plus, 1),
                    ('-', _) => (Token::Minus, 1),
                    ('*', _) => (Token::Star, 1),
                    ('/', _) => (Token::Slash, 1),
                    ('%', _) => (Token::Percent, 1),
                    ('@', _) => (Token::At, 1),
                    ('&', _) => (Token::Amp, 1),
                    ('=', _) => (Token::Eq, 1),
                    ('<', _) => (Token::Lt, 1),
                    ('>', _) => (Token::Gt, 1),
                    ('(', _) => (Token::LParen, 1),
                    (')', _) => (Token::RParen, 1),
                    ('[', _) => (Token::LBracket, 1),
                    (']', _) => (Token::RBracket, 1),
                    (',', _) => (Token::Comma, 1),
                    ('.', _) => (Token::Dot, 1),
                    (':', _) => (Token::Colon, 1),
                    _ => {
                        return Err(EvalError::raised(format!("invalid character `{c}`"))
                            .at(byte_pos[i]..byte_pos[i + 1]));
                    }
                };
                match token {
                    Token::LParen | Token::LBracket => depth += 1,
                    Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
                    _ => {}
                }
                i += width;
                token
            }
        };
        tokens.push(Spanned {
            token,
            span: byte_pos[start]..byte_pos[i],
        });
    }

    Ok(tokens)
}

fn keyword(ident: String) -> Token {
    match ident.as_str() {
        "True" => Token::True,
        "False" => Token::False,
        "None" => Token::None,
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        _ => Token::Ident(ident),
    }
}

/// A `.` after one of these is attribute access, not a number.
fn follows_value(last: Option<&Spanned>) -> bool {
    matches!(
        last.map(|t| &t.token),
        Some(
            Token::Ident(_)
                | Token::Number(_)
                | Token::Str(_)
                | Token::RParen
                | Token::RBracket
                | Token::True
                | Token::False
                | Token::None
        )
    )
}

fn lex_number(chars: &[char], mut i: usize) -> (Number, usize) {
    let start = i;
    let mut is_float = false;
    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' && !chars.get(i + 1).is_some_and(|c| c.is_alphabetic() || *c == '_') {
        is_float = true;
        i += 1;
        while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
            i += 1;
        }
    }
    if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
        let mut j = i + 1;
        if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            is_float = true;
            i = j;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    let text: String = chars[start..i].iter().filter(|c| **c != '_').collect();
    let number = if is_float {
        Number::Float(text.parse().unwrap_or(f64::NAN))
    } else {
        match text.parse::<i64>() {
            Ok(n) => Number::Int(n),
            Err(_) => Number::Float(text.parse().unwrap_or(f64::INFINITY)),
        }
    };
    (number, i)
}

/// Lex a (possibly triple-quoted) string starting at its opening quote.
/// Returns the decoded text and the index just past the closing quote.
fn lex_string(chars: &[char], start: usize, raw: bool) -> Result<(String, usize), String> {
    let quote = chars[start];
    let triple = chars.get(start + 1) == Some(&quote) && chars.get(start + 2) == Some(&quote);
    let mut i = start + if triple { 3 } else { 1 };
    let mut text = String::new();

    while i < chars.len() {
        let c = chars[i];
        if c == quote {
            if !triple {
                return Ok((text, i + 1));
            }
            if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                return Ok((text, i + 3));
            }
        }
        if c == '\n' && !triple {
            break;
        }
        if c == '\\' && i + 1 < chars.len() {
            let next = chars[i + 1];
            i += 2;
            if raw {
                text.push('\\');
                text.push(next);
                continue;
            }
            match next {
                'n' => text.push('\n'),
                't' => text.push('\t'),
                'r' => text.push('\r'),
                '0' => text.push('\0'),
                '\\' => text.push('\\'),
                '\'' => text.push('\''),
                '"' => text.push('"'),
                '\n' => {}
                // Unknown escapes keep their backslash, so `"\alpha"` means `\alpha`.
                other => {
                    text.push('\\');
                    text.push(other);
                }
            }
            continue;
        }
        text.push(c);
        i += 1;
    }

    Err("unterminated string literal".to_string())
}
