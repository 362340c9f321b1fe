use thiserror::Error;

/// A directive that cannot be delimited. Offsets are byte positions in the
/// scanned text, pointing at where the construct started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("unterminated `{delimiter}` starting at byte {offset}")]
    UnterminatedBracket { offset: usize, delimiter: char },
    #[error("unterminated string literal starting at byte {offset}")]
    UnterminatedString { offset: usize },
    #[error("mismatched bracket at byte {offset}: expected `{expected}`, found `{found}`")]
    MismatchedBracket {
        offset: usize,
        expected: char,
        found: char,
    },
    #[error("conditional include entry `{entry}` has no `:` (byte {offset})")]
    MalformedConditional { offset: usize, entry: String },
}

impl ScanError {
    pub fn offset(&self) -> usize {
        match self {
            ScanError::UnterminatedBracket { offset, .. }
            | ScanError::UnterminatedString { offset }
            | ScanError::MismatchedBracket { offset, .. }
            | ScanError::MalformedConditional { offset, .. } => *offset,
        }
    }
}
