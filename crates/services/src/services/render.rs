//! Static HTML rendering for report documents.

use std::{borrow::Cow, sync::LazyLock};

use regex::Regex;
use thiserror::Error;
use tracing::error;

use super::inline_css::{self, InlineCssError};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Css(#[from] InlineCssError),
    #[error("document has an unterminated <body>")]
    UnterminatedBody,
}

static BODY_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<body\b[^>]*>").expect("valid regex"));

static BODY_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</body\s*>").expect("valid regex"));

fn escape(s: &str, quotes: bool) -> Cow<'_, str> {
    let needs_escape = |c: char| matches!(c, '&' | '<' | '>') || (quotes && matches!(c, '"' | '\''));
    if !s.contains(needs_escape) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if quotes => out.push_str("&quot;"),
            '\'' if quotes => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

pub fn escape_text(s: &str) -> Cow<'_, str> {
    escape(s, false)
}

pub fn escape_attr(s: &str) -> Cow<'_, str> {
    escape(s, true)
}

/// HTML output buffer. Text and attribute values are escaped; only
/// [`Markup::raw`] writes verbatim.
#[derive(Debug, Default)]
pub struct Markup {
    buf: String,
}

impl Markup {
    pub fn new() -> Self {
        Self::default()
    }

    fn start_tag(&mut self, tag: &str, attrs: &[(&str, &str)]) {
        self.buf.push('<');
        self.buf.push_str(tag);
        for (name, value) in attrs {
            self.buf.push(' ');
            self.buf.push_str(name);
            self.buf.push_str("=\"");
            self.buf.push_str(&escape_attr(value));
            self.buf.push('"');
        }
        self.buf.push('>');
    }

    /// `<tag attrs>` + children + `</tag>`.
    pub fn element(
        &mut self,
        tag: &str,
        attrs: &[(&str, &str)],
        children: impl FnOnce(&mut Self),
    ) -> &mut Self {
        self.start_tag(tag, attrs);
        children(self);
        self.buf.push_str("</");
        self.buf.push_str(tag);
        self.buf.push('>');
        self
    }

    /// Element whose only child is escaped text.
    pub fn text_element(&mut self, tag: &str, attrs: &[(&str, &str)], text: &str) -> &mut Self {
        self.element(tag, attrs, |m| {
            m.text(text);
        })
    }

    pub fn void(&mut self, tag: &str, attrs: &[(&str, &str)]) -> &mut Self {
        self.start_tag(tag, attrs);
        self
    }

    pub fn text(&mut self, text: &str) -> &mut Self {
        self.buf.push_str(&escape_text(text));
        self
    }

    /// Trusted markup.
    pub fn raw(&mut self, html: &str) -> &mut Self {
        self.buf.push_str(html);
        self
    }

    pub fn component(&mut self, component: &dyn Component) -> &mut Self {
        component.render(self);
        self
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

pub trait Component {
    fn render(&self, out: &mut Markup);
}

/// Pre-rendered, trusted HTML.
#[derive(Debug, Clone, Copy)]
pub struct RawHtml<'a>(pub &'a str);

impl Component for RawHtml<'_> {
    fn render(&self, out: &mut Markup) {
        out.raw(self.0);
    }
}

pub fn render_to_static_markup(component: &dyn Component) -> String {
    let mut markup = Markup::new();
    component.render(&mut markup);
    markup.into_string()
}

/// Inner HTML of the document's `<body>`, or the whole input when it has
/// none.
pub fn extract_body(html: &str) -> Result<&str, RenderError> {
    let Some(open) = BODY_OPEN.find(html) else {
        return Ok(html);
    };
    let close = BODY_CLOSE
        .find_at(html, open.end())
        .ok_or(RenderError::UnterminatedBody)?;
    Ok(&html[open.end()..close.start()])
}

pub fn render_with_inline_styles(component: &dyn Component, css: &str) -> Result<String, RenderError> {
    let html = render_to_static_markup(component);
    let inlined = inline_css::inline(&html, css)?;
    Ok(extract_body(&inlined)?.to_string())
}

/// Render `component`, inline `css` into it and return the body's inner
/// HTML. Failures are logged and yield `None`.
pub fn render_component_to_html_string_inline_styles(
    component: &dyn Component,
    css: &str,
) -> Option<String> {
    match render_with_inline_styles(component, css) {
        Ok(html) => Some(html),
        Err(e) => {
            error!("Failed to render component with inline styles: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Greeting<'a> {
        name: &'a str,
    }

    impl Component for Greeting<'_> {
        fn render(&self, out: &mut Markup) {
            out.raw("<!DOCTYPE html>").element("html", &[], |m| {
                m.element("head", &[], |m| {
                    m.text_element("style", &[], ".hi { color: green }");
                })
                .element("body", &[("class", "page")], |m| {
                    m.text_element("p", &[("class", "hi")], &format!("Hello, {}", self.name));
                });
            });
        }
    }

    #[test]
    fn test_fragment_is_returned_whole() {
        let html =
            render_component_to_html_string_inline_styles(&RawHtml("<div>Hello</div>"), "")
                .unwrap();
        assert!(html.contains("Hello"));
        assert!(!html.contains("<html"));
        assert!(!html.contains("<body"));
    }

    #[test]
    fn test_document_body_is_extracted_with_inline_styles() {
        let html = render_component_to_html_string_inline_styles(
            &Greeting { name: "Sam & Co" },
            "p { margin: 0 }",
        )
        .unwrap();
        assert_eq!(
            html,
            r#"<p class="hi" style="margin: 0; color: green">Hello, Sam &amp; Co</p>"#
        );
    }

    #[test]
    fn test_bad_stylesheet_yields_none() {
        assert_eq!(
            render_component_to_html_string_inline_styles(&RawHtml("<p>x</p>"), "p {"),
            None
        );
    }

    #[test]
    fn test_unterminated_body_is_an_error() {
        assert!(matches!(
            extract_body("<body><p>x</p>"),
            Err(RenderError::UnterminatedBody)
        ));
    }

    #[test]
    fn test_markup_escapes_text_and_attributes() {
        let mut markup = Markup::new();
        markup
            .text_element("span", &[("title", r#"say "hi""#)], "<b>")
            .void("img", &[("src", "a.png?x=1&y=2")]);
        assert_eq!(
            markup.as_str(),
            r#"<span title="say &quot;hi&quot;">&lt;b&gt;</span><img src="a.png?x=1&amp;y=2">"#
        );
    }

    #[test]
    fn test_escape_borrows_clean_input() {
        assert!(matches!(escape_text("plain"), Cow::Borrowed(_)));
        assert_eq!(escape_attr("it's"), "it&#39;s");
    }
}
