//! Rendering the finished article
//!
//! A renderer is a pure function of the final record; nothing it produces
//! feeds back into the workflow.

use pulldown_cmark::{html, Options, Parser};

use crate::article::ArticleRecord;

/// Turns a finished record into an output document
pub trait Renderer: Send + Sync {
    /// Suggested file name for the output
    fn file_name(&self) -> &str;

    /// Render the record
    fn render(&self, record: &ArticleRecord) -> String;
}

/// Standalone HTML page with the article body rendered from markdown
#[derive(Debug, Clone)]
pub struct HtmlRenderer {
    /// Replace curly quotes and typographic dashes with ASCII
    scrub: bool,
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self { scrub: true }
    }
}

impl HtmlRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep typographic characters as written
    pub fn without_scrub(mut self) -> Self {
        self.scrub = false;
        self
    }
}

const STYLE: &str = r#"<style>
    body {
        font-family: 'Noto Sans', 'Arial', 'Helvetica', sans-serif;
        line-height: 1.6;
        max-width: 800px;
        margin: 0 auto;
        padding: 20px;
        background-color: #f4f4f4;
        color: #333;
    }
    h1 { color: #0056b3; }
    .date { font-size: 0.9em; color: #777; }
    p { margin: 1em 0; }
    a { color: #0056b3; text-decoration: none; }
    a:hover { text-decoration: underline; }
</style>"#;

impl Renderer for HtmlRenderer {
    fn file_name(&self) -> &str {
        "Story.html"
    }

    fn render(&self, record: &ArticleRecord) -> String {
        let body = record.body.as_deref().unwrap_or_default();
        let body = if self.scrub {
            scrub_typography(body)
        } else {
            body.to_string()
        };

        let mut content = String::new();
        // No smart punctuation: it would undo the scrub
        let options =
            Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_FOOTNOTES;
        html::push_html(&mut content, Parser::new_ext(&body, options));

        let title = record.title.as_deref().map(escape);
        let title_html = title
            .as_ref()
            .map(|t| format!("<h1>{}</h1>\n", t))
            .unwrap_or_default();
        let date_html = record
            .date
            .as_deref()
            .map(|d| format!("<p class=\"date\">{}</p>\n", escape(d)))
            .unwrap_or_default();
        let link_html = record
            .transcript
            .as_deref()
            .or(record.url.as_deref())
            .map(|url| {
                format!(
                    "<p><a href=\"{}\" target=\"_blank\">See source transcript</a></p>\n",
                    escape(url)
                )
            })
            .unwrap_or_default();

        format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
             <title>{}</title>\n{}\n</head>\n<body>\n{}{}{}{}</body>\n</html>\n",
            title.as_deref().unwrap_or("Document"),
            STYLE,
            title_html,
            date_html,
            content,
            link_html
        )
    }
}

/// Replace curly quotes and typographic dashes with ASCII equivalents
pub fn scrub_typography(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '“' | '”' => out.push('"'),
            '‘' | '’' => out.push('\''),
            '—' => out.push_str("--"),
            '–' | '‐' => out.push('-'),
            other => out.push(other),
        }
    }
    out
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
