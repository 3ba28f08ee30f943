//! Markdown rendering
//!
//! Blog posts, sponsored posts and newsletters are written in Markdown and
//! stored alongside their rendered HTML.
//!
//! ```
//! use tradepost::services::markdown::MarkdownRenderer;
//!
//! let html = MarkdownRenderer::new().render("# Hello\n\nThis is **bold** text.");
//! assert!(html.contains("<h1>Hello</h1>"));
//! assert!(html.contains("<strong>bold</strong>"));
//! ```

use pulldown_cmark::{html, Event, Options, Parser, TagEnd};

/// Markdown → HTML renderer.
///
/// Supports tables, strikethrough, task lists and smart punctuation. Raw
/// HTML in the source is escaped rather than passed through.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self
    }

    fn options() -> Options {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_SMART_PUNCTUATION);
        options
    }

    pub fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, Self::options()).map(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        });

        let mut output = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut output, parser);
        output
    }

    /// Plain-text excerpt of at most `max_chars` characters
    pub fn excerpt(&self, markdown: &str, max_chars: usize) -> String {
        let mut text = String::new();
        for event in Parser::new_ext(markdown, Self::options()) {
            match event {
                Event::Text(t) | Event::Code(t) => text.push_str(&t),
                Event::SoftBreak
                | Event::HardBreak
                | Event::End(
                    TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::TableCell,
                ) => text.push(' '),
                _ => {}
            }
        }

        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.chars().count() <= max_chars {
            return text;
        }
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic_markdown() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("## Title\n\n- one\n- two\n\n~~gone~~");
        assert!(html.contains("<h2>Title</h2>"));
        assert!(html.contains("<li>one</li>"));
        assert!(html.contains("<del>gone</del>"));
    }

    #[test]
    fn test_render_table() {
        let html = MarkdownRenderer::new().render("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let html = MarkdownRenderer::new().render("hi <script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_excerpt() {
        let renderer = MarkdownRenderer::new();
        assert_eq!(renderer.excerpt("# Hi\n\nSome **bold** text", 100), "Hi Some bold text");
        assert_eq!(renderer.excerpt("abcdefghij", 4), "abcd...");
        assert_eq!(renderer.excerpt("un**bold**ed", 20), "unbolded");
    }
}
