//! Directive expansion for Markdown documents.
//!
//! A [`Session`] scans a document, evaluates each directive through a
//! [`ScriptEvaluator`] in document order, follows includes, and returns the
//! expanded output.

pub mod error;
pub mod evaluator;
pub mod expand;
mod include;
pub mod script;
pub mod settings;

pub use error::{ErrorKind, EvalError, EvalErrorKind, ExpandError, InclusionError};
pub use evaluator::{DocumentContext, HostValue, ScriptEvaluator};
pub use expand::{Expansion, Segment, Session};
pub use script::ScriptEngine;
pub use settings::{Settings, SettingsError};
