pub mod document;
pub mod expr;
pub mod format;
pub mod number;
pub mod scanner;
pub mod units;

pub use expr::Expr;
pub use number::Number;
pub use scanner::{Span, scan};
