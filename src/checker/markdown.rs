use crate::checker::{byte_ranges_to_chars, Checker, Judgment};
use crate::document::DocumentMeta;
use crate::error::CheckerError;
use crate::ranges::RangeSet;
use futures_util::future::{self, BoxFuture, FutureExt};
use pulldown_cmark::{Event, Options, Parser, Tag};

pub const ID: &str = "markdown";

const EXTENSIONS: &[&str] = &["md", "mdx", "markdown"];

/// Treats code and raw HTML in markdown documents as correct.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownChecker;

impl MarkdownChecker {
    pub fn new() -> Self {
        Self
    }
}

/// Byte ranges of inline code, code blocks and HTML
fn code_ranges(content: &str) -> RangeSet {
    let mut skipped = RangeSet::new();
    let parser = Parser::new_ext(content, Options::empty()).into_offset_iter();

    for (event, range) in parser {
        match event {
            Event::Start(Tag::CodeBlock(_))
            | Event::Start(Tag::HtmlBlock)
            | Event::Code(_)
            | Event::Html(_)
            | Event::InlineHtml(_) => {
                skipped.append_range(range.start, range.end);
            }
            _ => {}
        }
    }

    skipped
}

impl Checker for MarkdownChecker {
    fn id(&self) -> &str {
        ID
    }

    fn name(&self) -> &str {
        "Markdown"
    }

    fn priority(&self) -> i32 {
        20
    }

    fn provides_spelling(&self, meta: &DocumentMeta) -> bool {
        meta.extension()
            .map_or(false, |ext| EXTENSIONS.contains(&ext.as_str()))
    }

    fn check<'a>(
        &'a self,
        _meta: &'a DocumentMeta,
        text: &'a str,
    ) -> BoxFuture<'a, Result<Judgment, CheckerError>> {
        let bytes = code_ranges(text);
        let ranges = byte_ranges_to_chars(text, bytes.ranges().iter().cloned());
        future::ready(Ok(Judgment::correct(ranges))).boxed()
    }
}
