use splice::document::Node;
use splice::expr::Expr;
use splice::format::FormatSettings;
use splice::number::Number;

use crate::error::EvalError;

/// Per-document facts the evaluator may expose to scripts.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentContext {
    pub target_format: String,
    pub format: FormatSettings,
}

/// What a directive evaluated to, as far as the expander is concerned.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    None,
    Bool(bool),
    Number(Number),
    Text(String),
    Expr(Expr),
    Node(Node),
}

/// The script-evaluator boundary.
///
/// A namespace is created once per document and threaded through every
/// directive in document order. It is the only state shared between
/// directives.
pub trait ScriptEvaluator {
    type Namespace;

    fn new_namespace(&self, ctx: &DocumentContext) -> Self::Namespace;

    /// Evaluate an expression fragment.
    fn eval(&mut self, source: &str, ns: &mut Self::Namespace) -> Result<HostValue, EvalError>;

    /// Execute statements, returning whatever they printed.
    fn exec(&mut self, source: &str, ns: &mut Self::Namespace) -> Result<String, EvalError>;

    /// Call a named callable with already-expanded arguments.
    fn call(
        &mut self,
        name: &str,
        args: Vec<HostValue>,
        ns: &mut Self::Namespace,
    ) -> Result<HostValue, EvalError>;
}
