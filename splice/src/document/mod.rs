//! Structured document nodes handed to the conversion pipeline.
//!
//! A small, JSON-serializable subset of the pipeline's tree. Every node also
//! renders to Markdown, which is how it is spliced into a text stream.

use std::fmt;
use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser as CmarkParser, Tag, TagEnd};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MathKind {
    InlineMath,
    DisplayMath,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "t", content = "c")]
pub enum Inline {
    Str(String),
    Space,
    SoftBreak,
    LineBreak,
    Math { kind: MathKind, text: String },
    Emph(Vec<Inline>),
    Strong(Vec<Inline>),
    Strikeout(Vec<Inline>),
    Code(String),
    RawInline { format: String, text: String },
    Span(Vec<Inline>),
    Link { content: Vec<Inline>, url: String },
    Underline(Vec<Inline>),
    Superscript(Vec<Inline>),
    Subscript(Vec<Inline>),
    SmallCaps(Vec<Inline>),
    Image { description: Vec<Inline>, url: String, title: String },
    /// A footnote; its blocks render inline as `^[...]`.
    Note(Vec<Block>),
    Cite { citations: Vec<Citation>, content: Vec<Inline> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CitationMode {
    NormalCitation,
    AuthorInText,
    SuppressAuthor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    pub id: String,
    pub mode: CitationMode,
    pub prefix: String,
    pub suffix: String,
}

impl Citation {
    pub fn new(id: impl Into<String>) -> Self {
        Citation {
            id: id.into(),
            mode: CitationMode::NormalCitation,
            prefix: String::new(),
            suffix: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ListStyle {
    DefaultStyle,
    Decimal,
    LowerAlpha,
    UpperAlpha,
    LowerRoman,
    UpperRoman,
    Example,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ListDelimiter {
    DefaultDelim,
    Period,
    OneParen,
    TwoParens,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "t", content = "c")]
pub enum Block {
    Para(Vec<Inline>),
    Plain(Vec<Inline>),
    Header { level: u8, content: Vec<Inline> },
    CodeBlock { language: Option<String>, text: String },
    RawBlock { format: String, text: String },
    Div(Vec<Block>),
    /// Each item is a list of blocks.
    BulletList(Vec<Vec<Block>>),
    OrderedList {
        start: u32,
        style: ListStyle,
        delimiter: ListDelimiter,
        items: Vec<Vec<Block>>,
    },
    BlockQuote(Vec<Block>),
    HorizontalRule,
    Figure { url: String, caption: Vec<Inline>, identifier: String },
}

/// Either kind of structured node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Node {
    Block(Block),
    Inline(Inline),
}

impl Inline {
    pub fn text(s: impl Into<String>) -> Self {
        Inline::Str(s.into())
    }

    pub fn math(text: impl Into<String>, display: bool) -> Self {
        Inline::Math {
            kind: if display {
                MathKind::DisplayMath
            } else {
                MathKind::InlineMath
            },
            text: text.into(),
        }
    }
}

impl Block {
    /// The closest inline equivalent, for blocks that land in running text.
    pub fn into_inline(self) -> Inline {
        match self {
            Block::Para(content) | Block::Plain(content) | Block::Header { content, .. } => {
                Inline::Span(content)
            }
            Block::CodeBlock { text, .. } => Inline::Code(text),
            Block::RawBlock { format, text } => Inline::RawInline { format, text },
            Block::Div(blocks) | Block::BlockQuote(blocks) => Inline::Span(spaced(blocks)),
            Block::BulletList(items) | Block::OrderedList { items, .. } => {
                Inline::Span(spaced(items.into_iter().flatten().collect()))
            }
            Block::HorizontalRule => Inline::Span(Vec::new()),
            Block::Figure { url, caption, .. } => Inline::Image {
                description: caption,
                url,
                title: String::new(),
            },
        }
    }
}

fn spaced(blocks: Vec<Block>) -> Vec<Inline> {
    let mut content = Vec::new();
    for (i, block) in blocks.into_iter().enumerate() {
        if i > 0 {
            content.push(Inline::Space);
        }
        content.push(block.into_inline());
    }
    content
}

impl Node {
    pub fn is_block(&self) -> bool {
        matches!(self, Node::Block(_))
    }

    pub fn into_inline(self) -> Inline {
        match self {
            Node::Inline(inline) => inline,
            Node::Block(block) => block.into_inline(),
        }
    }

    pub fn into_block(self) -> Block {
        match self {
            Node::Block(block) => block,
            Node::Inline(inline) => Block::Para(vec![inline]),
        }
    }
}

impl From<Inline> for Node {
    fn from(inline: Inline) -> Self {
        Node::Inline(inline)
    }
}

impl From<Block> for Node {
    fn from(block: Block) -> Self {
        Node::Block(block)
    }
}

/// Output format used for raw passthrough when converting to `target`.
pub fn raw_output_format(target: &str) -> &str {
    match target {
        "revealjs" | "chunkedhtml" => "html",
        "beamer" => "latex",
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Markdown rendering
// ---------------------------------------------------------------------------

fn write_inlines(f: &mut fmt::Formatter<'_>, inlines: &[Inline]) -> fmt::Result {
    for inline in inlines {
        write!(f, "{}", inline)?;
    }
    Ok(())
}

fn backtick_fence(text: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in text.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat(longest + 1)
}

fn write_code(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    let fence = backtick_fence(text);
    if text.starts_with('`') || text.ends_with('`') {
        write!(f, "{} {} {}", fence, text, fence)
    } else {
        write!(f, "{}{}{}", fence, text, fence)
    }
}

impl fmt::Display for Inline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inline::Str(s) => write!(f, "{}", s),
            Inline::Space => write!(f, " "),
            Inline::SoftBreak => writeln!(f),
            Inline::LineBreak => write!(f, "\\\n"),
            Inline::Math { kind, text } => match kind {
                MathKind::InlineMath => write!(f, "${}$", text),
                MathKind::DisplayMath => write!(f, "$${}$$", text),
            },
            Inline::Emph(content) => {
                write!(f, "*")?;
                write_inlines(f, content)?;
                write!(f, "*")
            }
            Inline::Strong(content) => {
                write!(f, "**")?;
                write_inlines(f, content)?;
                write!(f, "**")
            }
            Inline::Strikeout(content) => {
                write!(f, "~~")?;
                write_inlines(f, content)?;
                write!(f, "~~")
            }
            Inline::Code(text) => write_code(f, text),
            Inline::RawInline { format, text } => {
                write_code(f, text)?;
                write!(f, "{{={}}}", format)
            }
            Inline::Span(content) => {
                write!(f, "[")?;
                write_inlines(f, content)?;
                write!(f, "]{{}}")
            }
            Inline::Link { content, url } => {
                write!(f, "[")?;
                write_inlines(f, content)?;
                write!(f, "]({})", url)
            }
            Inline::Underline(content) => {
                write!(f, "[")?;
                write_inlines(f, content)?;
                write!(f, "]{{.underline}}")
            }
            Inline::SmallCaps(content) => {
                write!(f, "[")?;
                write_inlines(f, content)?;
                write!(f, "]{{.smallcaps}}")
            }
            Inline::Superscript(content) => {
                write!(f, "^")?;
                write_inlines(f, content)?;
                write!(f, "^")
            }
            Inline::Subscript(content) => {
                write!(f, "~")?;
                write_inlines(f, content)?;
                write!(f, "~")
            }
            Inline::Image {
                description,
                url,
                title,
            } => {
                write!(f, "![")?;
                write_inlines(f, description)?;
                if title.is_empty() {
                    write!(f, "]({})", url)
                } else {
                    write!(f, "]({} \"{}\")", url, title)
                }
            }
            Inline::Note(blocks) => {
                write!(f, "^[")?;
                for (i, block) in blocks.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", block)?;
                }
                write!(f, "]")
            }
            Inline::Cite { citations, .. } => {
                let bracketed = citations
                    .iter()
                    .any(|c| c.mode != CitationMode::AuthorInText);
                if bracketed {
                    write!(f, "[")?;
                }
                for (i, citation) in citations.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{}", citation)?;
                }
                if bracketed {
                    write!(f, "]")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.prefix.is_empty() {
            write!(f, "{} ", self.prefix)?;
        }
        if self.mode == CitationMode::SuppressAuthor {
            write!(f, "-")?;
        }
        write!(f, "@{}", self.id)?;
        if !self.suffix.is_empty() {
            write!(f, ", {}", self.suffix)?;
        }
        Ok(())
    }
}

impl ListStyle {
    /// The marker text for item number `n`.
    fn marker(self, n: u32) -> String {
        match self {
            ListStyle::DefaultStyle | ListStyle::Decimal => n.to_string(),
            ListStyle::Example => "@".to_string(),
            ListStyle::LowerAlpha => alpha(n),
            ListStyle::UpperAlpha => alpha(n).to_uppercase(),
            ListStyle::LowerRoman => roman(n),
            ListStyle::UpperRoman => roman(n).to_uppercase(),
        }
    }
}

fn alpha(n: u32) -> String {
    let mut n = n.max(1);
    let mut out = Vec::new();
    while n > 0 {
        n -= 1;
        out.push(char::from(b'a' + (n % 26) as u8));
        n /= 26;
    }
    out.iter().rev().collect()
}

fn roman(n: u32) -> String {
    const NUMERALS: &[(u32, &str)] = &[
        (1000, "m"), (900, "cm"), (500, "d"), (400, "cd"), (100, "c"), (90, "xc"),
        (50, "l"), (40, "xl"), (10, "x"), (9, "ix"), (5, "v"), (4, "iv"), (1, "i"),
    ];
    let mut n = n.max(1);
    let mut out = String::new();
    for &(value, numeral) in NUMERALS {
        while n >= value {
            out.push_str(numeral);
            n -= value;
        }
    }
    out
}

/// Render the blocks of a list item, quote or div: tight after `Plain`,
/// separated by a blank line otherwise.
fn blocks_text(blocks: &[Block]) -> String {
    let mut out = String::new();
    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            out.push_str(if matches!(blocks[i - 1], Block::Plain(_)) { "\n" } else { "\n\n" });
        }
        out.push_str(&block.to_string());
    }
    out
}

/// Write `marker` before the first line of `body` and indent the rest to match.
fn write_item(f: &mut fmt::Formatter<'_>, marker: &str, body: &str) -> fmt::Result {
    let indent = " ".repeat(marker.chars().count());
    for (i, line) in body.split('\n').enumerate() {
        match i {
            0 => write!(f, "{}{}", marker, line)?,
            _ if line.is_empty() => writeln!(f)?,
            _ => write!(f, "\n{}{}", indent, line)?,
        }
    }
    Ok(())
}

/// Blocks render without a trailing newline so they splice cleanly.
impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Block::Para(content) | Block::Plain(content) => write_inlines(f, content),
            Block::Header { level, content } => {
                write!(f, "{} ", "#".repeat(usize::from(*level).max(1)))?;
                write_inlines(f, content)
            }
            Block::CodeBlock { language, text } => {
                let fence = "`".repeat(backtick_fence(text).len().max(3));
                writeln!(f, "{}{}", fence, language.as_deref().unwrap_or(""))?;
                writeln!(f, "{}", text.strip_suffix('\n').unwrap_or(text))?;
                write!(f, "{}", fence)
            }
            Block::RawBlock { format, text } if format == "markdown" => write!(f, "{}", text),
            Block::RawBlock { format, text } => {
                let fence = "`".repeat(backtick_fence(text).len().max(3));
                writeln!(f, "{}{{={}}}", fence, format)?;
                writeln!(f, "{}", text.strip_suffix('\n').unwrap_or(text))?;
                write!(f, "{}", fence)
            }
            Block::Div(blocks) => {
                writeln!(f, "::: {{}}")?;
                for block in blocks {
                    writeln!(f, "{}", block)?;
                    writeln!(f)?;
                }
                write!(f, ":::")
            }
            Block::BulletList(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write_item(f, "- ", &blocks_text(item))?;
                }
                Ok(())
            }
            Block::OrderedList {
                start,
                style,
                delimiter,
                items,
            } => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    let n = style.marker(start.saturating_add(i as u32));
                    let marker = match delimiter {
                        ListDelimiter::OneParen => format!("{}) ", n),
                        ListDelimiter::TwoParens => format!("({}) ", n),
                        ListDelimiter::DefaultDelim | ListDelimiter::Period => format!("{}. ", n),
                    };
                    write_item(f, &marker, &blocks_text(item))?;
                }
                Ok(())
            }
            Block::BlockQuote(blocks) => {
                for (i, line) in blocks_text(blocks).split('\n').enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    if line.is_empty() {
                        write!(f, ">")?;
                    } else {
                        write!(f, "> {}", line)?;
                    }
                }
                Ok(())
            }
            Block::HorizontalRule => write!(f, "* * *"),
            Block::Figure {
                url,
                caption,
                identifier,
            } => {
                write!(f, "![")?;
                write_inlines(f, caption)?;
                write!(f, "]({})", url)?;
                if !identifier.is_empty() {
                    write!(f, "{{#{}}}", identifier)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Block(block) => write!(f, "{}", block),
            Node::Inline(inline) => write!(f, "{}", inline),
        }
    }
}

// ---------------------------------------------------------------------------
// Markdown parsing
// ---------------------------------------------------------------------------

type Events<'a> = [(Event<'a>, Range<usize>)];

/// Parse Markdown into blocks. Constructs without a node of their own (lists,
/// block quotes, tables) are kept verbatim as raw `markdown` blocks.
pub fn parse_markdown(source: &str) -> Vec<Block> {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_MATH;
    let events: Vec<(Event<'_>, Range<usize>)> =
        CmarkParser::new_ext(source, options).into_offset_iter().collect();

    let mut blocks = Vec::new();
    let mut i = 0;
    while i < events.len() {
        let (ref ev, ref range) = events[i];
        i += 1;
        match ev {
            Event::Start(Tag::Paragraph) => {
                let content = collect_inlines(&events, &mut i, &|e| matches!(e, TagEnd::Paragraph));
                blocks.push(Block::Para(content));
            }
            Event::Start(Tag::Heading { level, .. }) => {
                let content = collect_inlines(&events, &mut i, &|e| matches!(e, TagEnd::Heading(_)));
                blocks.push(Block::Header {
                    level: heading_level_to_u8(level),
                    content,
                });
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                let language = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.to_string()),
                    _ => None,
                };
                let mut text = String::new();
                while i < events.len() {
                    let (ref ev, _) = events[i];
                    i += 1;
                    match ev {
                        Event::Text(t) => text.push_str(t),
                        Event::End(TagEnd::CodeBlock) => break,
                        _ => {}
                    }
                }
                blocks.push(Block::CodeBlock { language, text });
            }
            Event::Html(html) => blocks.push(Block::RawBlock {
                format: "html".into(),
                text: html.to_string(),
            }),
            Event::Start(_) => {
                let end = skip_container(&events, &mut i).unwrap_or(range.end);
                blocks.push(Block::RawBlock {
                    format: "markdown".into(),
                    text: source[range.start..end.max(range.start)].trim_end().to_string(),
                });
            }
            Event::Rule => blocks.push(Block::RawBlock {
                format: "markdown".into(),
                text: source[range.clone()].trim_end().to_string(),
            }),
            _ => {}
        }
    }
    blocks
}

/// Parse a Markdown fragment that is expected to be a single line of text.
pub fn parse_inlines(source: &str) -> Vec<Inline> {
    let mut blocks = parse_markdown(source).into_iter();
    match (blocks.next(), blocks.next()) {
        (None, _) => Vec::new(),
        (Some(Block::Para(content)), None) => content,
        (Some(first), rest) => {
            let mut content = vec![first.into_inline()];
            for block in rest.into_iter().chain(blocks) {
                content.push(Inline::Space);
                content.push(block.into_inline());
            }
            content
        }
    }
}

/// Advance past the end of the container whose start was just consumed,
/// returning the end offset of its closing event.
fn skip_container(events: &Events<'_>, i: &mut usize) -> Option<usize> {
    let mut depth = 1usize;
    while *i < events.len() {
        let (ref ev, ref range) = events[*i];
        *i += 1;
        match ev {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Some(range.end);
                }
            }
            _ => {}
        }
    }
    None
}

fn collect_inlines(events: &Events<'_>, i: &mut usize, is_end: &dyn Fn(&TagEnd) -> bool) -> Vec<Inline> {
    let mut out = Vec::new();
    while *i < events.len() {
        let (ref ev, _) = events[*i];
        *i += 1;
        match ev {
            Event::End(end) if is_end(end) => break,
            Event::Text(t) => out.push(Inline::Str(t.to_string())),
            Event::Code(t) => out.push(Inline::Code(t.to_string())),
            Event::InlineMath(t) => out.push(Inline::math(t.to_string(), false)),
            Event::DisplayMath(t) => out.push(Inline::math(t.to_string(), true)),
            Event::InlineHtml(t) | Event::Html(t) => out.push(Inline::RawInline {
                format: "html".into(),
                text: t.to_string(),
            }),
            Event::SoftBreak => out.push(Inline::SoftBreak),
            Event::HardBreak => out.push(Inline::LineBreak),
            Event::Start(Tag::Emphasis) => {
                let content = collect_inlines(events, i, &|e| matches!(e, TagEnd::Emphasis));
                out.push(Inline::Emph(content));
            }
            Event::Start(Tag::Strong) => {
                let content = collect_inlines(events, i, &|e| matches!(e, TagEnd::Strong));
                out.push(Inline::Strong(content));
            }
            Event::Start(Tag::Strikethrough) => {
                let content = collect_inlines(events, i, &|e| matches!(e, TagEnd::Strikethrough));
                out.push(Inline::Strikeout(content));
            }
            Event::Start(Tag::Link { dest_url, .. }) => {
                let url = dest_url.to_string();
                let content = collect_inlines(events, i, &|e| matches!(e, TagEnd::Link));
                out.push(Inline::Link { content, url });
            }
            _ => {}
        }
    }
    out
}

fn heading_level_to_u8(level: &HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}
