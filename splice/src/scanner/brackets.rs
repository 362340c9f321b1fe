//! Delimiter matching for directive bodies.
//!
//! Every matcher takes the byte offset of an opening delimiter and returns the
//! byte offset of its closing delimiter.

use super::error::ScanError;

fn closer_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

/// Code mode: all three bracket kinds nest on one stack, and quotes, triple
/// quotes, backslash escapes and `#` line comments are honoured.
pub(crate) fn match_code(source: &str, open: usize) -> Result<usize, ScanError> {
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut chars = source[open..].char_indices().map(|(i, c)| (open + i, c)).peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '(' | '[' | '{' => stack.push((closer_for(c), i)),
            ')' | ']' | '}' => {
                let Some((expected, _)) = stack.pop() else {
                    return Err(ScanError::MismatchedBracket {
                        offset: i,
                        expected: closer_for(source[open..].chars().next().unwrap_or('{')),
                        found: c,
                    });
                };
                if expected != c {
                    return Err(ScanError::MismatchedBracket {
                        offset: i,
                        expected,
                        found: c,
                    });
                }
                if stack.is_empty() {
                    return Ok(i);
                }
            }
            '\'' | '"' => {
                let end = skip_string(source, i, c)?;
                while chars.peek().is_some_and(|&(j, _)| j < end) {
                    chars.next();
                }
            }
            '#' => {
                while chars.peek().is_some_and(|&(_, c)| c != '\n') {
                    chars.next();
                }
            }
            '\\' => {
                chars.next();
            }
            _ => {}
        }
    }

    let (_, offset) = stack.first().copied().unwrap_or(('}', open));
    let delimiter = source[offset..].chars().next().unwrap_or('{');
    Err(ScanError::UnterminatedBracket { offset, delimiter })
}

/// Returns the offset just past the closing quote of the string opened at `start`.
fn skip_string(source: &str, start: usize, quote: char) -> Result<usize, ScanError> {
    let triple: String = std::iter::repeat_n(quote, 3).collect();
    let (body_start, closing) = if source[start..].starts_with(&triple) {
        (start + 3, triple.as_str())
    } else {
        (start + 1, &source[start..start + 1])
    };

    let mut chars = source[body_start..].char_indices();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            chars.next();
            continue;
        }
        if source[body_start + i..].starts_with(closing) {
            return Ok(body_start + i + closing.len());
        }
    }
    Err(ScanError::UnterminatedString { offset: start })
}

/// Markup mode: braces only, backslash escapes honoured, no string tracking.
pub(crate) fn match_markup(source: &str, open: usize) -> Result<usize, ScanError> {
    let mut depth = 0usize;
    let mut chars = source[open..].char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(open + i);
                }
            }
            _ => {}
        }
    }
    Err(ScanError::UnterminatedBracket {
        offset: open,
        delimiter: '{',
    })
}

/// Raw mode: `{{ ... }}`. Single braces nest inside; the first `}}` at depth
/// zero closes. Returns the offset of the first `}` of the closing pair.
pub(crate) fn match_raw(source: &str, open: usize) -> Result<usize, ScanError> {
    let body_start = open + 2;
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut i = body_start;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' if depth == 0 && bytes.get(i + 1) == Some(&b'}') => return Ok(i),
            b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }
    Err(ScanError::UnterminatedBracket {
        offset: open,
        delimiter: '{',
    })
}
