use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};

use codespan_reporting::files::SimpleFiles;
use serde::Serialize;
use splice::document::{Inline, Node, parse_inlines};
use splice::format::{FormatError, FormatSpec, format_str};
use splice::scanner::{Directive, DirectiveKind, Placement, SpanKind, scan};

use crate::error::{ErrorKind, EvalError, ExpandError, InclusionError};
use crate::evaluator::{DocumentContext, HostValue, ScriptEvaluator};
use crate::settings::{Settings, SettingsError};

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One piece of expanded output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "t", content = "c")]
pub enum Segment {
    Text(String),
    Node(Node),
}

/// The expanded document: text interleaved with structured nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Expansion {
    segments: Vec<Segment>,
}

impl Expansion {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Structured nodes in output order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Node(n) => Some(n),
            Segment::Text(_) => None,
        })
    }

    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Segment::Text(last)) = self.segments.last_mut() {
            last.push_str(text);
        } else {
            self.segments.push(Segment::Text(text.to_string()));
        }
    }

    pub fn push_node(&mut self, node: Node) {
        self.segments.push(Segment::Node(node));
    }

    pub fn append(&mut self, other: Expansion) {
        for segment in other.segments {
            match segment {
                Segment::Text(text) => self.push_text(&text),
                Segment::Node(node) => self.push_node(node),
            }
        }
    }
}

impl fmt::Display for Expansion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => f.write_str(text)?,
                Segment::Node(node) => write!(f, "{node}")?,
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One document-processing run: an evaluator, its namespace, and the files
/// read so far.
pub struct Session<E: ScriptEvaluator> {
    pub(crate) evaluator: E,
    pub(crate) namespace: E::Namespace,
    pub(crate) settings: Settings,
    pub(crate) context: DocumentContext,
    pub(crate) files: SimpleFiles<String, String>,
    /// Canonical paths of documents being expanded, outermost first.
    pub(crate) include_stack: Vec<PathBuf>,
}

impl<E: ScriptEvaluator> Session<E> {
    pub fn new(evaluator: E, settings: Settings) -> Result<Self, SettingsError> {
        let context = DocumentContext {
            target_format: settings.target.clone(),
            format: settings.format_settings()?,
        };
        let namespace = evaluator.new_namespace(&context);
        Ok(Session {
            evaluator,
            namespace,
            settings,
            context,
            files: SimpleFiles::new(),
            include_stack: Vec::new(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn context(&self) -> &DocumentContext {
        &self.context
    }

    pub fn namespace(&self) -> &E::Namespace {
        &self.namespace
    }

    pub fn namespace_mut(&mut self) -> &mut E::Namespace {
        &mut self.namespace
    }

    /// Every file read during the session, for rendering diagnostics.
    pub fn files(&self) -> &SimpleFiles<String, String> {
        &self.files
    }

    /// Expand an in-memory document.
    pub fn expand_str(&mut self, name: &str, source: &str) -> Result<Expansion, ExpandError> {
        let file_id = self.files.add(name.to_string(), source.to_string());
        self.expand_source(source, 0, file_id)
    }

    /// Expand a document on disk. It counts as the outermost include for
    /// cycle detection.
    pub fn expand_file(&mut self, path: &Path) -> Result<Expansion, ExpandError> {
        let name = path.display().to_string();
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(err) => {
                let file_id = self.files.add(name.clone(), String::new());
                return Err(ExpandError::new(
                    InclusionError::Io {
                        path: name,
                        message: err.to_string(),
                    },
                    0..0,
                    file_id,
                ));
            }
        };
        let file_id = self.files.add(name, source.clone());
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.include_stack.push(canonical);
        let result = self.expand_source(&source, 0, file_id);
        self.include_stack.pop();
        result
    }

    /// Scan and expand `source`, which starts at byte `base` of file `file_id`.
    pub(crate) fn expand_source(
        &mut self,
        source: &str,
        base: usize,
        file_id: usize,
    ) -> Result<Expansion, ExpandError> {
        let spans = scan(source).map_err(|err| {
            let at = base + err.offset();
            let end = (at + 1).min(base + source.len());
            ExpandError::new(err, at..end.max(at), file_id)
        })?;

        let mut out = Expansion::default();
        for span in &spans {
            match &span.kind {
                SpanKind::Literal => out.push_text(span.text(source)),
                SpanKind::Comment => {}
                SpanKind::Directive(directive) => {
                    let range = base + span.range.start..base + span.range.end;
                    self.directive(directive, range, base, file_id, &mut out)?;
                }
            }
        }
        Ok(out)
    }

    fn directive(
        &mut self,
        d: &Directive,
        range: Range<usize>,
        base: usize,
        file_id: usize,
        out: &mut Expansion,
    ) -> Result<(), ExpandError> {
        tracing::debug!(
            kind = d.kind.name(),
            payload = %d.payload,
            start = range.start,
            end = range.end,
            "expanding directive"
        );
        let payload_base = Some(base + d.payload_range.start);

        match &d.kind {
            DirectiveKind::InlineValue { structured } | DirectiveKind::InlineExpr { structured } => {
                let value = self
                    .evaluator
                    .eval(&d.payload, &mut self.namespace)
                    .map_err(|err| eval_error(err, payload_base, &range, file_id, d))?;
                if !d.suppressed {
                    self.splice(value, d, *structured, &range, file_id, out)?;
                }
            }
            DirectiveKind::MacroCall {
                structured,
                name,
                args,
            } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    if arg.raw {
                        values.push(HostValue::Text(arg.text.clone()));
                        continue;
                    }
                    let expanded = self
                        .expand_source(&arg.text, base + arg.range.start, file_id)?
                        .to_string();
                    values.push(if *structured {
                        HostValue::Node(markup_node(&expanded))
                    } else {
                        HostValue::Text(expanded)
                    });
                }
                let value = self
                    .evaluator
                    .call(name, values, &mut self.namespace)
                    .map_err(|err| eval_error(err, None, &range, file_id, d))?;
                if !d.suppressed {
                    self.splice(value, d, *structured, &range, file_id, out)?;
                }
            }
            DirectiveKind::StructuredBlock => {
                let output = self
                    .evaluator
                    .exec(&d.payload, &mut self.namespace)
                    .map_err(|err| eval_error(err, payload_base, &range, file_id, d))?;
                if !d.suppressed {
                    out.push_text(&output);
                }
            }
            DirectiveKind::FileInclude {
                path,
                structured: false,
            } => {
                let output = self.include_script(path, &range, file_id)?;
                if !d.suppressed {
                    out.push_text(&output);
                }
            }
            DirectiveKind::FileInclude {
                path,
                structured: true,
            } => {
                let expansion = self.include_document(path, &range, file_id)?;
                if !d.suppressed {
                    out.append(expansion);
                }
            }
            DirectiveKind::ConditionalInclude { entries } => {
                let target = self.context.target_format.clone();
                match entries.iter().find(|e| e.matches(&target)) {
                    Some(entry) => {
                        let path = entry.path.clone();
                        let expansion = self.include_document(&path, &range, file_id)?;
                        if !d.suppressed {
                            out.append(expansion);
                        }
                    }
                    None => {
                        tracing::debug!(format = %target, "no conditional include entry matches");
                    }
                }
            }
        }
        Ok(())
    }

    fn splice(
        &self,
        value: HostValue,
        d: &Directive,
        structured: bool,
        range: &Range<usize>,
        file_id: usize,
        out: &mut Expansion,
    ) -> Result<(), ExpandError> {
        let located = |err: FormatError| ExpandError::new(ErrorKind::Format(err), range.clone(), file_id);

        if !structured {
            let text = self.stringify(value, d.format_spec.as_ref()).map_err(located)?;
            out.push_text(&text);
            return Ok(());
        }

        if let Some(node) = self.structure(value, d).map_err(located)? {
            out.push_node(node);
        }
        Ok(())
    }

    fn stringify(&self, value: HostValue, spec: Option<&FormatSpec>) -> Result<String, FormatError> {
        let settings = &self.context.format;
        Ok(match value {
            HostValue::None => String::new(),
            HostValue::Bool(true) => "True".to_string(),
            HostValue::Bool(false) => "False".to_string(),
            HostValue::Number(n) => settings.format_value(n, spec, None)?,
            HostValue::Text(text) => match spec {
                Some(spec) if !spec.is_empty() => format_str(&text, spec)?,
                _ => text,
            },
            HostValue::Expr(expr) => expr.render(settings, spec)?,
            HostValue::Node(node) => {
                if let Some(spec) = spec {
                    return Err(FormatError::StructuredValue(spec.to_string()));
                }
                node.to_string()
            }
        })
    }

    /// The node a double-sigil directive contributes, coerced to its placement.
    fn structure(&self, value: HostValue, d: &Directive) -> Result<Option<Node>, FormatError> {
        let spec = d.format_spec.as_ref();
        let node = match value {
            HostValue::None => return Ok(None),
            HostValue::Node(node) => {
                if let Some(spec) = spec {
                    return Err(FormatError::StructuredValue(spec.to_string()));
                }
                node
            }
            HostValue::Expr(expr) => {
                let latex = expr.render(&self.context.format, spec)?;
                Node::Inline(Inline::math(latex, d.placement == Some(Placement::Block)))
            }
            other => Node::Inline(Inline::text(self.stringify(other, spec)?)),
        };

        let wants_block = match d.placement {
            Some(Placement::Block) => true,
            Some(Placement::Inline) => false,
            None => d.standalone,
        };
        Ok(Some(match (wants_block, node.is_block()) {
            (true, false) => Node::Block(node.into_block()),
            (false, true) => Node::Inline(node.into_inline()),
            _ => node,
        }))
    }
}

/// Expanded markup argument as a single inline node.
fn markup_node(text: &str) -> Node {
    let mut inlines = parse_inlines(text);
    if inlines.len() == 1
        && let Some(only) = inlines.pop()
    {
        return Node::Inline(only);
    }
    Node::Inline(Inline::Span(inlines))
}

/// Locate an evaluator error. Spans inside the payload are preferred over the
/// directive as a whole.
fn eval_error(
    err: EvalError,
    payload_base: Option<usize>,
    range: &Range<usize>,
    file_id: usize,
    d: &Directive,
) -> ExpandError {
    let span = match (err.span.clone(), payload_base) {
        (Some(inner), Some(base)) => {
            let start = (base + inner.start).min(range.end);
            let end = (base + inner.end).clamp(start, range.end);
            start..end
        }
        _ => range.clone(),
    };
    ExpandError::new(err.kind, span, file_id).with_note(format!(
        "while evaluating {} `{}`",
        d.kind.name(),
        d.payload.trim()
    ))
}
