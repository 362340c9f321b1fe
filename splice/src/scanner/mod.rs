//! Splits document text into literal and directive spans.

mod brackets;
mod directive;
mod error;
mod protected;

use std::ops::Range;

use crate::format::FormatSpec;

pub use directive::{ConditionalEntry, Directive, DirectiveKind, MacroArg, Placement};
pub use error::ScanError;

#[derive(Debug, Clone, PartialEq)]
pub enum SpanKind {
    Literal,
    /// An HTML comment, dropped from the expansion.
    Comment,
    Directive(Directive),
}

/// A contiguous region of the scanned text.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub range: Range<usize>,
    pub kind: SpanKind,
}

impl Span {
    /// The original text covered by this span.
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        &source[self.range.clone()]
    }

    pub fn directive(&self) -> Option<&Directive> {
        match &self.kind {
            SpanKind::Directive(d) => Some(d),
            SpanKind::Literal | SpanKind::Comment => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, SpanKind::Literal)
    }
}

/// Scan `source` into ordered, non-overlapping spans that cover it exactly.
pub fn scan(source: &str) -> Result<Vec<Span>, ScanError> {
    let mut scanner = Scanner::new(source);
    scanner.run()?;
    tracing::trace!(spans = scanner.spans.len(), "scanned");
    Ok(scanner.spans)
}

/// Concatenate the text of every span.
pub fn reconstruct(source: &str, spans: &[Span]) -> String {
    spans.iter().map(|s| s.text(source)).collect()
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

/// Offset of a `#` that starts a comment on `line`, ignoring quoted text.
fn comment_start(line: &str) -> Option<usize> {
    let mut quote = None;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '#' => return Some(i),
            None => {}
        }
    }
    None
}

struct Scanner<'a> {
    source: &'a str,
    bytes: &'a [u8],
    protected: Vec<Range<usize>>,
    next_protected: usize,
    spans: Vec<Span>,
    literal_start: usize,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str) -> Self {
        Scanner {
            source,
            bytes: source.as_bytes(),
            protected: protected::protected_regions(source),
            next_protected: 0,
            spans: Vec::new(),
            literal_start: 0,
        }
    }

    fn char_at(&self, pos: usize) -> Option<char> {
        self.source.get(pos..).and_then(|s| s.chars().next())
    }

    fn step(&self, pos: usize) -> usize {
        pos + self.char_at(pos).map_or(1, char::len_utf8)
    }

    /// End of a protected region starting exactly at `pos`.
    fn protected_end(&mut self, pos: usize) -> Option<usize> {
        while self
            .protected
            .get(self.next_protected)
            .is_some_and(|r| r.start < pos)
        {
            self.next_protected += 1;
        }
        self.protected
            .get(self.next_protected)
            .filter(|r| r.start == pos)
            .map(|r| r.end)
    }

    fn run(&mut self) -> Result<(), ScanError> {
        let mut pos = 0;
        while pos < self.bytes.len() {
            if let Some(end) = self.protected_end(pos) {
                pos = end.max(self.step(pos));
                continue;
            }
            if self.source[pos..].starts_with("<!--") {
                let end = match self.source[pos + 4..].find("-->") {
                    Some(i) => pos + 4 + i + 3,
                    None => self.bytes.len(),
                };
                self.push_span(pos, end, SpanKind::Comment);
                pos = end;
                continue;
            }
            match self.bytes[pos] {
                b'\\' => {
                    pos = self.step(pos + 1).min(self.bytes.len());
                    continue;
                }
                b'i' | b'b' if self.bytes.get(pos + 1) == Some(&b'%') && !self.ident_before(pos) => {
                    let placement = if self.bytes[pos] == b'i' {
                        Placement::Inline
                    } else {
                        Placement::Block
                    };
                    if let Some((directive, end)) = self.directive(pos + 1, Some(placement))? {
                        self.push(pos, end, directive);
                        pos = end;
                        continue;
                    }
                }
                b'%' => {
                    if let Some((directive, end)) = self.directive(pos, None)? {
                        self.push(pos, end, directive);
                        pos = end;
                        continue;
                    }
                }
                _ => {}
            }
            pos = self.step(pos);
        }
        if self.literal_start < self.bytes.len() {
            self.spans.push(Span {
                range: self.literal_start..self.bytes.len(),
                kind: SpanKind::Literal,
            });
        }
        Ok(())
    }

    fn ident_before(&self, pos: usize) -> bool {
        self.source[..pos].chars().next_back().is_some_and(is_ident_char)
    }

    fn push(&mut self, start: usize, end: usize, mut directive: Directive) {
        directive.standalone = self.is_standalone(start, end);
        tracing::trace!(start, end, kind = directive.kind.name(), "directive");
        self.push_span(start, end, SpanKind::Directive(directive));
    }

    /// Close the pending literal at `start` and record `start..end`.
    fn push_span(&mut self, start: usize, end: usize, kind: SpanKind) {
        if self.literal_start < start {
            self.spans.push(Span {
                range: self.literal_start..start,
                kind: SpanKind::Literal,
            });
        }
        self.spans.push(Span { range: start..end, kind });
        self.literal_start = end;
    }

    fn is_standalone(&self, start: usize, end: usize) -> bool {
        let line_start = self.source[..start].rfind('\n').map_or(0, |i| i + 1);
        let line_end = self.source[end..].find('\n').map_or(self.bytes.len(), |i| end + i);
        self.source[line_start..start].trim().is_empty() && self.source[end..line_end].trim().is_empty()
    }

    /// Try to read a directive whose sigil run starts at `sigil`.
    fn directive(
        &self,
        sigil: usize,
        placement: Option<Placement>,
    ) -> Result<Option<(Directive, usize)>, ScanError> {
        let run = self.bytes[sigil..].iter().take_while(|&&b| b == b'%').count();
        let after = sigil + run;
        match run {
            3 if placement.is_none() => self.include(after),
            1 | 2 => {
                let structured = run == 2;
                match self.char_at(after) {
                    Some('{') if !structured && placement.is_none() => self.code_block(after),
                    Some('(') => self.inline_expr(after, structured, placement),
                    Some(c) if is_ident_start(c) => self.shorthand(after, structured, placement),
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    fn directive_with(
        kind: DirectiveKind,
        payload: &str,
        payload_range: Range<usize>,
        placement: Option<Placement>,
    ) -> Directive {
        Directive {
            kind,
            payload: payload.to_string(),
            payload_range,
            suppressed: false,
            format_spec: None,
            placement,
            standalone: false,
        }
    }

    /// `%{ ... }`
    fn code_block(&self, open: usize) -> Result<Option<(Directive, usize)>, ScanError> {
        let close = brackets::match_code(self.source, open)?;
        let (range, quiet) = self.strip_inner_semicolon(open + 1..close);
        let mut directive = Self::directive_with(
            DirectiveKind::StructuredBlock,
            &self.source[range.clone()],
            range,
            None,
        );
        let mut end = close + 1;
        let trailing = self.bytes.get(end) == Some(&b';');
        if trailing {
            end += 1;
        }
        directive.suppressed = quiet || trailing;
        Ok(Some((directive, end)))
    }

    /// `%(expr)` and `%%(expr)`
    fn inline_expr(
        &self,
        open: usize,
        structured: bool,
        placement: Option<Placement>,
    ) -> Result<Option<(Directive, usize)>, ScanError> {
        let close = brackets::match_code(self.source, open)?;
        let (range, quiet) = self.strip_inner_semicolon(open + 1..close);
        let mut directive = Self::directive_with(
            DirectiveKind::InlineExpr { structured },
            &self.source[range.clone()],
            range,
            placement,
        );
        let end = self.tail(close + 1, &mut directive);
        directive.suppressed |= quiet;
        Ok(Some((directive, end)))
    }

    /// A `;` that is the last non-whitespace character of a body.
    /// A trailing `# comment` on the last line is skipped first.
    fn strip_inner_semicolon(&self, range: Range<usize>) -> (Range<usize>, bool) {
        let body = &self.source[range.clone()];
        let trimmed = body.trim_end();
        let line_start = trimmed.rfind('\n').map_or(0, |i| i + 1);
        let code = match comment_start(&trimmed[line_start..]) {
            Some(hash) => trimmed[..line_start + hash].trim_end(),
            None => trimmed,
        };
        match code.strip_suffix(';') {
            Some(rest) => (range.start..range.start + rest.len(), true),
            None => (range, false),
        }
    }

    /// Optional `:spec` then optional `;` after a value form.
    fn tail(&self, mut end: usize, directive: &mut Directive) -> usize {
        if self.bytes.get(end) == Some(&b':')
            && let Some((spec, len)) = FormatSpec::match_prefix(&self.source[end + 1..])
        {
            directive.format_spec = Some(spec);
            end += 1 + len;
        }
        if self.bytes.get(end) == Some(&b';') {
            directive.suppressed = true;
            end += 1;
        }
        end
    }

    fn ident_end(&self, start: usize) -> usize {
        self.source[start..]
            .char_indices()
            .find(|&(_, c)| !is_ident_char(c))
            .map_or(self.bytes.len(), |(i, _)| start + i)
    }

    /// `.ident` continuation starting at `pos`, if any.
    fn dotted(&self, pos: usize) -> Option<usize> {
        if self.bytes.get(pos) == Some(&b'.') && self.char_at(pos + 1).is_some_and(is_ident_start) {
            Some(self.ident_end(pos + 1))
        } else {
            None
        }
    }

    /// `%name...`, `%name{arg}...`
    fn shorthand(
        &self,
        start: usize,
        structured: bool,
        placement: Option<Placement>,
    ) -> Result<Option<(Directive, usize)>, ScanError> {
        let mut pos = self.ident_end(start);
        while let Some(next) = self.dotted(pos) {
            pos = next;
        }

        if self.bytes.get(pos) == Some(&b'{') {
            return self.macro_call(start, pos, structured, placement).map(Some);
        }

        loop {
            match self.bytes.get(pos) {
                Some(b'(') | Some(b'[') => pos = brackets::match_code(self.source, pos)? + 1,
                Some(b'.') => match self.dotted(pos) {
                    Some(next) => pos = next,
                    None => break,
                },
                _ => break,
            }
        }

        let mut directive = Self::directive_with(
            DirectiveKind::InlineValue { structured },
            &self.source[start..pos],
            start..pos,
            placement,
        );
        let end = self.tail(pos, &mut directive);
        Ok(Some((directive, end)))
    }

    fn macro_call(
        &self,
        start: usize,
        name_end: usize,
        structured: bool,
        placement: Option<Placement>,
    ) -> Result<(Directive, usize), ScanError> {
        let mut args = Vec::new();
        let mut pos = name_end;
        while self.bytes.get(pos) == Some(&b'{') {
            if self.bytes.get(pos + 1) == Some(&b'{') {
                let close = brackets::match_raw(self.source, pos)?;
                args.push(MacroArg {
                    text: self.source[pos + 2..close].to_string(),
                    raw: true,
                    range: pos + 2..close,
                });
                pos = close + 2;
            } else {
                let close = brackets::match_markup(self.source, pos)?;
                args.push(MacroArg {
                    text: self.source[pos + 1..close].to_string(),
                    raw: false,
                    range: pos + 1..close,
                });
                pos = close + 1;
            }
        }
        let name = &self.source[start..name_end];
        let mut directive = Self::directive_with(
            DirectiveKind::MacroCall {
                structured,
                name: name.to_string(),
                args,
            },
            name,
            start..name_end,
            placement,
        );
        let end = self.tail(pos, &mut directive);
        Ok((directive, end))
    }

    /// `%%%py{..}`, `%%%md{..}`, `%%%mdifformat{..}`
    fn include(&self, after: usize) -> Result<Option<(Directive, usize)>, ScanError> {
        let rest = &self.source[after..];
        let (keyword_len, structured, conditional) = if rest.starts_with("py{") {
            (2, false, false)
        } else if rest.starts_with("mdifformat{") {
            (10, true, true)
        } else if rest.starts_with("md{") {
            (2, true, false)
        } else {
            return Ok(None);
        };

        let open = after + keyword_len;
        let close = brackets::match_markup(self.source, open)?;
        let body_range = open + 1..close;
        let body = &self.source[body_range.clone()];

        let kind = if conditional {
            DirectiveKind::ConditionalInclude {
                entries: parse_conditional(body, body_range.start)?,
            }
        } else {
            DirectiveKind::FileInclude {
                path: body.trim().to_string(),
                structured,
            }
        };
        let mut directive = Self::directive_with(kind, body, body_range, None);
        let mut end = close + 1;
        if self.bytes.get(end) == Some(&b';') {
            directive.suppressed = true;
            end += 1;
        }
        Ok(Some((directive, end)))
    }
}

fn parse_conditional(body: &str, offset: usize) -> Result<Vec<ConditionalEntry>, ScanError> {
    let mut entries = Vec::new();
    let mut entry_start = offset;
    for raw in body.split(';') {
        let entry = raw.trim();
        if !entry.is_empty() {
            let Some((labels, path)) = entry.split_once(':') else {
                let lead = raw.len() - raw.trim_start().len();
                return Err(ScanError::MalformedConditional {
                    offset: entry_start + lead,
                    entry: entry.to_string(),
                });
            };
            entries.push(ConditionalEntry {
                labels: labels
                    .split(',')
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect(),
                path: path.trim().to_string(),
            });
        }
        entry_start += raw.len() + 1;
    }
    Ok(entries)
}
