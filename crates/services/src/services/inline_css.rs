//! Moves stylesheet rules into `style` attributes.
//!
//! The PDF service renders header and footer templates without access to
//! the page stylesheet, so everything that reaches it carries inline styles.
//! Supported selectors are compound selectors built from a type, `*`, classes
//! and an id (`td.label#total`), optionally in comma lists. Rules using
//! combinators, pseudo-classes or attribute selectors are skipped, as are
//! at-rules.

use std::{borrow::Cow, sync::LazyLock};

use regex::{Captures, Regex};
use thiserror::Error;
use tracing::debug;

use super::render::escape_attr;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InlineCssError {
    #[error("unbalanced braces at offset {0}")]
    UnbalancedBraces(usize),
    #[error("malformed rule: {0}")]
    MalformedRule(String),
}

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"));

static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b[^>]*>(.*?)</style\s*>").expect("valid regex"));

static START_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<([A-Za-z][A-Za-z0-9-]*)((?:\s+[^\s"'<>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+))?)*)\s*(/?)>"#,
    )
    .expect("valid regex")
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'<>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("valid regex")
});

static IMPORTANT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)!\s*important\s*$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq)]
struct Declaration {
    property: String,
    value: String,
    important: bool,
}

/// (ids, classes, types)
type Specificity = (u32, u32, u32);

#[derive(Debug, Clone, Default, PartialEq)]
struct Selector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

fn is_ident(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

impl Selector {
    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty()
            || text.contains(|c: char| {
                c.is_whitespace() || matches!(c, '>' | '+' | '~' | ':' | '[')
            })
        {
            return None;
        }

        let mut selector = Self::default();
        let mut rest = match text.strip_prefix('*') {
            Some(rest) => rest,
            None => {
                let end = text.find(['.', '#']).unwrap_or(text.len());
                if end > 0 {
                    let tag = &text[..end];
                    if !is_ident(tag) {
                        return None;
                    }
                    selector.tag = Some(tag.to_ascii_lowercase());
                }
                &text[end..]
            }
        };

        while let Some(marker) = rest.chars().next() {
            let body = &rest[marker.len_utf8()..];
            let end = body.find(['.', '#']).unwrap_or(body.len());
            let name = &body[..end];
            if !is_ident(name) {
                return None;
            }
            match marker {
                '.' => selector.classes.push(name.to_string()),
                '#' if selector.id.is_none() => selector.id = Some(name.to_string()),
                _ => return None,
            }
            rest = &body[end..];
        }

        Some(selector)
    }

    fn specificity(&self) -> Specificity {
        (
            u32::from(self.id.is_some()),
            self.classes.len() as u32,
            u32::from(self.tag.is_some()),
        )
    }

    fn matches(&self, tag: &str, id: Option<&str>, classes: &[&str]) -> bool {
        self.tag.as_deref().is_none_or(|t| t.eq_ignore_ascii_case(tag))
            && self.id.as_deref().is_none_or(|i| Some(i) == id)
            && self.classes.iter().all(|c| classes.contains(&c.as_str()))
    }
}

#[derive(Debug, Clone)]
struct Rule {
    selector: Selector,
    specificity: Specificity,
    order: usize,
    declarations: Vec<Declaration>,
}

/// Split a declaration block on `;`, ignoring semicolons inside
/// parentheses (`url(data:...;base64,...)`) and quoted strings.
fn split_declarations(block: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in block.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (_, '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                parts.push(&block[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&block[start..]);
    parts
}

fn parse_declarations(block: &str) -> Vec<Declaration> {
    split_declarations(block)
        .into_iter()
        .filter_map(|declaration| {
            let (property, value) = declaration.split_once(':')?;
            let property = property.trim().to_ascii_lowercase();
            let value = value.trim();
            let (value, important) = match IMPORTANT.find(value) {
                Some(m) => (value[..m.start()].trim_end(), true),
                None => (value, false),
            };
            if property.is_empty() || value.is_empty() {
                return None;
            }
            Some(Declaration {
                property,
                value: value.to_string(),
                important,
            })
        })
        .collect()
}

/// Offset of the first `}` outside a quoted string.
fn find_block_end(body: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (_, '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '}') => return Some(i),
            _ => {}
        }
    }
    None
}

/// Index just past the `}` closing the block whose body starts at `start`.
fn skip_block(css: &str, start: usize) -> Result<usize, InlineCssError> {
    let mut depth = 1usize;
    for (i, c) in css[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(start + i + 1);
                }
            }
            _ => {}
        }
    }
    Err(InlineCssError::UnbalancedBraces(start.saturating_sub(1)))
}

fn parse_stylesheet(css: &str) -> Result<Vec<Rule>, InlineCssError> {
    let css = COMMENT.replace_all(css, "");
    let css = css.as_ref();

    let mut rules = Vec::new();
    let mut order = 0;
    let mut pos = 0;

    while pos < css.len() {
        let rest = &css[pos..];
        let trimmed = rest.trim_start();
        if trimmed.is_empty() {
            break;
        }

        // Block-less at-rules such as @import and @charset.
        if trimmed.starts_with('@') {
            let semi = rest.find(';');
            let open = rest.find('{');
            if let Some(semi) = semi.filter(|s| open.is_none_or(|o| *s < o)) {
                pos += semi + 1;
                continue;
            }
        }

        let Some(open) = rest.find('{') else {
            if let Some(close) = rest.find('}') {
                return Err(InlineCssError::UnbalancedBraces(pos + close));
            }
            return Err(InlineCssError::MalformedRule(trimmed.trim_end().to_string()));
        };
        if let Some(close) = rest[..open].find('}') {
            return Err(InlineCssError::UnbalancedBraces(pos + close));
        }

        let prelude = rest[..open].trim();
        let body_start = pos + open + 1;

        if prelude.starts_with('@') {
            debug!(rule = prelude, "Skipping at-rule");
            pos = skip_block(css, body_start)?;
            continue;
        }
        if prelude.is_empty() {
            return Err(InlineCssError::MalformedRule("rule without selector".to_string()));
        }

        let close = find_block_end(&css[body_start..])
            .ok_or(InlineCssError::UnbalancedBraces(pos + open))?;
        let body = &css[body_start..body_start + close];
        if body.contains('{') {
            return Err(InlineCssError::MalformedRule(prelude.to_string()));
        }

        let declarations = parse_declarations(body);
        for part in prelude.split(',') {
            match Selector::parse(part) {
                Some(selector) => {
                    rules.push(Rule {
                        specificity: selector.specificity(),
                        selector,
                        order,
                        declarations: declarations.clone(),
                    });
                    order += 1;
                }
                None => debug!(selector = part.trim(), "Skipping unsupported selector"),
            }
        }

        pos = body_start + close + 1;
    }

    Ok(rules)
}

static CHAR_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#([0-9]{1,7})|#[xX]([0-9A-Fa-f]{1,6})|(quot|apos|lt|gt|amp|nbsp));")
        .expect("valid regex")
});

/// Decode character references in an attribute value. Unknown named
/// references are left as written.
fn unescape_attr(value: &str) -> Cow<'_, str> {
    CHAR_REF.replace_all(value, |caps: &Captures| {
        let decoded = if let Some(dec) = caps.get(1) {
            dec.as_str().parse().ok().and_then(char::from_u32)
        } else if let Some(hex) = caps.get(2) {
            u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
        } else {
            match &caps[3] {
                "quot" => Some('"'),
                "apos" => Some('\''),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                _ => Some('\u{a0}'),
            }
        };
        decoded.map_or_else(|| caps[0].to_string(), String::from)
    })
}

struct Attribute<'a> {
    name: &'a str,
    /// Decoded value, used for matching and for the `style` cascade.
    value: Option<Cow<'a, str>>,
    /// The attribute exactly as written, copied through on rewrite.
    source: &'a str,
}

fn parse_attributes(text: &str) -> Vec<Attribute<'_>> {
    ATTRIBUTE
        .captures_iter(text)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| unescape_attr(m.as_str()));
            Attribute {
                name: caps.get(1).map_or("", |m| m.as_str()),
                value,
                source: caps.get(0).map_or("", |m| m.as_str()),
            }
        })
        .collect()
}

/// Cascade order: importance, then inline over stylesheet, then
/// specificity, then source order.
type Priority = (bool, bool, Specificity, usize);

fn apply_rules(rules: &[Rule], caps: &Captures) -> String {
    let tag = &caps[1];
    let attributes = parse_attributes(caps.get(2).map_or("", |m| m.as_str()));
    let attr = |name: &str| {
        attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .and_then(|a| a.value.as_deref())
    };

    let id = attr("id");
    let classes: Vec<&str> = attr("class")
        .map(|c| c.split_whitespace().collect())
        .unwrap_or_default();

    let inline = attr("style").map(parse_declarations).unwrap_or_default();
    let mut cascade: Vec<(Priority, &Declaration)> = rules
        .iter()
        .filter(|rule| rule.selector.matches(tag, id, &classes))
        .flat_map(|rule| {
            rule.declarations
                .iter()
                .map(move |d| ((d.important, false, rule.specificity, rule.order), d))
        })
        .collect();

    if cascade.is_empty() {
        return caps[0].to_string();
    }

    cascade.extend(
        inline
            .iter()
            .enumerate()
            .map(|(i, d)| ((d.important, true, (0, 0, 0), i), d)),
    );
    cascade.sort_by_key(|(priority, _)| *priority);

    let mut computed: Vec<(&str, &str)> = Vec::new();
    for (_, declaration) in cascade {
        match computed
            .iter_mut()
            .find(|(property, _)| *property == declaration.property)
        {
            Some(entry) => entry.1 = declaration.value.as_str(),
            None => computed.push((declaration.property.as_str(), declaration.value.as_str())),
        }
    }

    let style = computed
        .iter()
        .map(|(property, value)| format!("{property}: {value}"))
        .collect::<Vec<_>>()
        .join("; ");

    let mut out = format!("<{tag}");
    for attribute in &attributes {
        if !attribute.name.eq_ignore_ascii_case("style") {
            out.push(' ');
            out.push_str(attribute.source);
        }
    }
    out.push_str(&format!(" style=\"{}\"", escape_attr(&style)));
    if &caps[3] == "/" {
        out.push_str(" /");
    }
    out.push('>');
    out
}

/// Inline `css` plus any `<style>` blocks of `html` into the matching
/// elements. The `<style>` blocks are removed from the output.
pub fn inline(html: &str, css: &str) -> Result<String, InlineCssError> {
    let mut stylesheet = css.to_string();
    for caps in STYLE_BLOCK.captures_iter(html) {
        stylesheet.push('\n');
        stylesheet.push_str(&caps[1]);
    }
    let html = STYLE_BLOCK.replace_all(html, "");

    let rules = parse_stylesheet(&stylesheet)?;
    if rules.is_empty() {
        return Ok(html.into_owned());
    }

    Ok(START_TAG
        .replace_all(&html, |caps: &Captures| apply_rules(&rules, caps))
        .into_owned())
}
