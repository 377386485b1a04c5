//! Component style scoping and stylesheet minification

use crate::error::{BuildError, Result};
use crate::types::SCOPE_ATTRIBUTE;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    /// Declaration block of an ordinary rule
    Rule,
    /// `@media`, `@supports` and friends: contain rules whose selectors get scoped
    Grouping,
    /// `@keyframes`, `@font-face`, nested rules: left untouched
    Opaque,
}

const GROUPING_AT_RULES: &[&str] = &["@media", "@supports", "@container", "@layer", "@document"];

/// Prefix every selector with `[data-shork-id="<scope_id>"]`.
///
/// Only the selector text immediately preceding a `{` at the top level or
/// inside a grouping at-rule is rewritten. Declarations, at-rule preludes,
/// keyframe selectors, comments and strings pass through verbatim.
pub fn scope_css(css: &str, scope_id: &str) -> String {
    let bytes = css.as_bytes();
    let mut out = String::with_capacity(css.len() + 64);
    let mut stack: Vec<Block> = Vec::new();
    let mut segment_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = css[i + 2..].find("*/").map_or(bytes.len(), |end| i + 2 + end + 2);
                continue;
            }
            quote @ (b'"' | b'\'') => {
                i = skip_string(bytes, i, quote);
                continue;
            }
            b'{' => {
                let prelude = &css[segment_start..i];
                match stack.last() {
                    Some(Block::Rule) | Some(Block::Opaque) => {
                        out.push_str(prelude);
                        stack.push(Block::Opaque);
                    }
                    None | Some(Block::Grouping) => {
                        let selector = strip_leading_comments(prelude).trim();
                        if selector.starts_with('@') {
                            out.push_str(prelude);
                            let grouping = GROUPING_AT_RULES
                                .iter()
                                .any(|rule| at_rule_is(selector, rule));
                            stack.push(if grouping { Block::Grouping } else { Block::Opaque });
                        } else if selector.is_empty() {
                            out.push_str(prelude);
                            stack.push(Block::Rule);
                        } else {
                            let lead = prelude.len() - strip_leading_comments(prelude).len();
                            let body = prelude[lead..].trim_end();
                            out.push_str(&prelude[..lead]);
                            out.push_str(&scope_selector_list(body, scope_id));
                            out.push_str(&prelude[lead + body.len()..]);
                            stack.push(Block::Rule);
                        }
                    }
                }
                out.push('{');
                segment_start = i + 1;
            }
            b'}' => {
                stack.pop();
                out.push_str(&css[segment_start..=i]);
                segment_start = i + 1;
            }
            // Statement at-rules such as `@import url(x);`
            b';' if matches!(stack.last(), None | Some(Block::Grouping)) => {
                out.push_str(&css[segment_start..=i]);
                segment_start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }

    out.push_str(&css[segment_start.min(css.len())..]);
    out
}

fn at_rule_is(selector: &str, rule: &str) -> bool {
    selector.get(..rule.len()).map_or(false, |head| head.eq_ignore_ascii_case(rule))
        && selector[rule.len()..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_ascii_alphanumeric() && c != '-')
}

fn skip_string(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut j = start + 1;
    while j < bytes.len() && bytes[j] != quote {
        if bytes[j] == b'\\' {
            j += 1;
        }
        j += 1;
    }
    j + 1
}

fn strip_leading_comments(mut text: &str) -> &str {
    loop {
        text = text.trim_start();
        match text.strip_prefix("/*") {
            Some(rest) => text = rest.find("*/").map_or("", |end| &rest[end + 2..]),
            None => return text,
        }
    }
}

fn scope_selector_list(selectors: &str, scope_id: &str) -> String {
    split_selector_list(selectors)
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| format!("[{SCOPE_ATTRIBUTE}=\"{scope_id}\"] {part}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Split on top-level commas, ignoring those inside `()`, `[]` or quotes
fn split_selector_list(selectors: &str) -> Vec<&str> {
    let bytes = selectors.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            quote @ (b'"' | b'\'') => {
                i = skip_string(bytes, i, quote);
                continue;
            }
            b',' if depth == 0 => {
                parts.push(&selectors[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&selectors[start.min(selectors.len())..]);
    parts
}

/// Minify a stylesheet with lightningcss
pub fn minify_css(css: &str) -> Result<String> {
    if css.trim().is_empty() {
        return Ok(String::new());
    }

    let mut sheet = StyleSheet::parse(css, ParserOptions::default())
        .map_err(|e| BuildError::Css { message: e.to_string() })?;
    sheet
        .minify(MinifyOptions::default())
        .map_err(|e| BuildError::Css { message: e.to_string() })?;
    let output = sheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .map_err(|e| BuildError::Css { message: e.to_string() })?;

    Ok(output.code)
}
