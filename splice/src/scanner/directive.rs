use std::ops::Range;

use crate::format::FormatSpec;

/// Where a structured result should land, from an `i`/`b` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Inline,
    Block,
}

/// One `%name{...}` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroArg {
    pub text: String,
    /// `{{...}}`: passed verbatim instead of being expanded first.
    pub raw: bool,
    /// Byte range of `text` in the scanned source.
    pub range: Range<usize>,
}

/// One `labels: path` entry of a conditional include.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalEntry {
    pub labels: Vec<String>,
    pub path: String,
}

impl ConditionalEntry {
    pub fn matches(&self, target: &str) -> bool {
        self.labels.iter().any(|l| l == target)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DirectiveKind {
    /// `%name`, `%%name.attr(args)[i]`
    InlineValue { structured: bool },
    /// `%(expr)`, `%%(expr)`
    InlineExpr { structured: bool },
    /// `%name{arg}{{raw}}`
    MacroCall {
        structured: bool,
        name: String,
        args: Vec<MacroArg>,
    },
    /// `%{ statements }`
    StructuredBlock,
    /// `%%%py{path}` (statements) or `%%%md{path}` (document)
    FileInclude { path: String, structured: bool },
    /// `%%%mdifformat{ html, latex: a.md; docx: b.md }`
    ConditionalInclude { entries: Vec<ConditionalEntry> },
}

impl DirectiveKind {
    /// Whether the directive used the doubled sigil.
    pub fn is_structured(&self) -> bool {
        match self {
            DirectiveKind::InlineValue { structured }
            | DirectiveKind::InlineExpr { structured }
            | DirectiveKind::MacroCall { structured, .. }
            | DirectiveKind::FileInclude { structured, .. } => *structured,
            DirectiveKind::StructuredBlock | DirectiveKind::ConditionalInclude { .. } => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DirectiveKind::InlineValue { .. } => "inline value",
            DirectiveKind::InlineExpr { .. } => "inline expression",
            DirectiveKind::MacroCall { .. } => "macro call",
            DirectiveKind::StructuredBlock => "code block",
            DirectiveKind::FileInclude { structured: false, .. } => "script include",
            DirectiveKind::FileInclude { structured: true, .. } => "document include",
            DirectiveKind::ConditionalInclude { .. } => "conditional include",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub kind: DirectiveKind,
    /// Source fragment handed to the evaluator: an expression, statements, a
    /// macro name, an include path, or the raw conditional body.
    pub payload: String,
    pub payload_range: Range<usize>,
    pub suppressed: bool,
    pub format_spec: Option<FormatSpec>,
    pub placement: Option<Placement>,
    /// Nothing but whitespace shares the directive's first and last lines.
    pub standalone: bool,
}
