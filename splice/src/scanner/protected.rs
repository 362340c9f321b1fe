use std::ops::Range;

use pulldown_cmark::{Event, Options, Parser as CmarkParser, Tag};

/// Byte ranges of code spans, code blocks and math, sorted by start.
pub(crate) fn protected_regions(source: &str) -> Vec<Range<usize>> {
    let options = Options::ENABLE_MATH;
    let mut regions: Vec<Range<usize>> = CmarkParser::new_ext(source, options)
        .into_offset_iter()
        .filter_map(|(event, range)| match event {
            Event::Code(_)
            | Event::InlineMath(_)
            | Event::DisplayMath(_)
            | Event::Start(Tag::CodeBlock(_)) => Some(range),
            _ => None,
        })
        .collect();
    regions.sort_by_key(|r| r.start);
    regions
}
