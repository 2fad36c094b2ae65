//! Markdown preview rendering

use pulldown_cmark::{html, Options, Parser};

/// Converts markdown source into preview HTML
pub trait MarkdownRenderer {
    fn render(&self, source: &str) -> String;
}

/// CommonMark renderer with tables, strikethrough, task lists and footnotes
#[derive(Debug, Clone, Copy, Default)]
pub struct PulldownRenderer;

impl MarkdownRenderer for PulldownRenderer {
    fn render(&self, source: &str) -> String {
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_FOOTNOTES;
        let parser = Parser::new_ext(source, options);

        let mut output = String::with_capacity(source.len() * 3 / 2);
        html::push_html(&mut output, parser);
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_and_emphasis() {
        let html = PulldownRenderer.render("# Title\n\nsome *text*");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<em>text</em>"));
    }

    #[test]
    fn test_tables_are_enabled() {
        let html = PulldownRenderer.render("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_empty_source() {
        assert!(PulldownRenderer.render("").is_empty());
    }
}
