//! Structured scanning of custom component tags in raw HTML
//!
//! The scanner walks the markup once and reports the outermost component
//! occurrences in document order. Inner occurrences stay inside the slot
//! text and are picked up when the resolver recurses into it.

use crate::types::{Props, COMPONENT_NAMESPACE, COMPONENT_TAG_PREFIX};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagConvention {
    /// `<Component:Name ...>`, inlined without hydration support
    Namespaced,
    /// `<shork-name ...>`, wrapped and scoped for hydration
    Prefixed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentTag {
    pub convention: TagConvention,
    /// Tag name as written in the source
    pub tag_name: String,
    /// Normalized component identifier used for lookup
    pub component: String,
    pub props: Props,
    pub slot: String,
    /// Byte span of the whole occurrence, closing tag included
    pub start: usize,
    pub end: usize,
}

#[derive(Debug)]
struct OpenTag {
    name: String,
    attributes: Vec<(String, String)>,
    self_closing: bool,
    end: usize,
}

/// Find every top-level custom component occurrence in `html`
pub fn find_component_tags(html: &str) -> Vec<ComponentTag> {
    let bytes = html.as_bytes();
    let mut tags = Vec::new();
    let mut pos = 0;

    while let Some(offset) = find_byte(bytes, b'<', pos) {
        if let Some(skip_to) = skip_opaque(html, offset) {
            pos = skip_to;
            continue;
        }

        let Some(open) = parse_open_tag(html, offset) else {
            pos = offset + 1;
            continue;
        };

        let Some((convention, component)) = classify(&open.name) else {
            pos = skip_raw_text(html, &open).unwrap_or(open.end);
            continue;
        };

        let (slot, end) = if open.self_closing {
            (String::new(), open.end)
        } else {
            match find_matching_close(html, &open.name, convention, open.end) {
                Some((close_start, close_end)) => (html[open.end..close_start].to_string(), close_end),
                None => {
                    log::warn!("Unclosed <{}> treated as self-closing", open.name);
                    (String::new(), open.end)
                }
            }
        };

        tags.push(ComponentTag {
            convention,
            tag_name: open.name,
            component,
            props: open.attributes.into_iter().collect(),
            slot,
            start: offset,
            end,
        });
        pos = end;
    }

    tags
}

/// Map a tag name to its convention and component identifier
pub fn classify(tag_name: &str) -> Option<(TagConvention, String)> {
    if let Some(rest) = tag_name.strip_prefix(COMPONENT_NAMESPACE) {
        if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Some((TagConvention::Namespaced, rest.to_string()));
        }
        return None;
    }

    let lower = tag_name.to_ascii_lowercase();
    let rest = lower.strip_prefix(COMPONENT_TAG_PREFIX)?;
    let mut chars = rest.chars();
    let first = chars.next()?;
    Some((
        TagConvention::Prefixed,
        first.to_ascii_uppercase().to_string() + chars.as_str(),
    ))
}

/// Remove every `<tag ...>...</tag>` element from `html`, returning the
/// remaining markup and the raw contents of the removed elements in order
pub fn extract_raw_blocks(html: &str, tag: &str) -> (String, Vec<String>) {
    let lower = html.to_ascii_lowercase();
    let open_pattern = format!("<{}", tag.to_ascii_lowercase());
    let close_pattern = format!("</{}", tag.to_ascii_lowercase());
    let mut remaining = String::with_capacity(html.len());
    let mut blocks = Vec::new();
    let mut pos = 0;

    while let Some(start) = find_str(&lower, &open_pattern, pos) {
        let after = start + open_pattern.len();
        let at_boundary = lower
            .as_bytes()
            .get(after)
            .map_or(false, |b| b.is_ascii_whitespace() || *b == b'>');
        if !at_boundary {
            remaining.push_str(&html[pos..after]);
            pos = after;
            continue;
        }
        let Some(open_end) = find_str(&lower, ">", after).map(|i| i + 1) else {
            break;
        };
        let Some(close_start) = find_str(&lower, &close_pattern, open_end) else {
            break;
        };
        let close_end = find_str(&lower, ">", close_start).map_or(lower.len(), |i| i + 1);

        remaining.push_str(&html[pos..start]);
        blocks.push(html[open_end..close_start].to_string());
        pos = close_end;
    }

    remaining.push_str(&html[pos..]);
    (remaining, blocks)
}

fn find_byte(bytes: &[u8], needle: u8, from: usize) -> Option<usize> {
    bytes.get(from..)?.iter().position(|&b| b == needle).map(|i| from + i)
}

fn find_str(html: &str, needle: &str, from: usize) -> Option<usize> {
    html.get(from..)?.find(needle).map(|i| from + i)
}

/// Comments and doctype-like declarations are opaque to the scanner
fn skip_opaque(html: &str, offset: usize) -> Option<usize> {
    let rest = &html[offset..];
    if rest.starts_with("<!--") {
        return Some(find_str(html, "-->", offset + 4).map_or(html.len(), |i| i + 3));
    }
    if rest.starts_with("<!") || rest.starts_with("<?") {
        return Some(find_byte(html.as_bytes(), b'>', offset).map_or(html.len(), |i| i + 1));
    }
    None
}

/// `<script>` and `<style>` bodies are raw text and never contain components
fn skip_raw_text(html: &str, open: &OpenTag) -> Option<usize> {
    let name = open.name.to_ascii_lowercase();
    if open.self_closing || (name != "script" && name != "style") {
        return None;
    }
    let closing = format!("</{name}");
    let lower = html[open.end..].to_ascii_lowercase();
    let close = lower.find(&closing)? + open.end;
    find_byte(html.as_bytes(), b'>', close).map(|i| i + 1)
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.')
}

fn parse_open_tag(html: &str, start: usize) -> Option<OpenTag> {
    let bytes = html.as_bytes();
    let mut i = start + 1;
    let name_start = i;
    while i < bytes.len() && is_name_byte(bytes[i]) {
        i += 1;
    }
    if i == name_start || !bytes[name_start].is_ascii_alphabetic() {
        return None;
    }
    let name = html[name_start..i].to_string();
    let mut attributes = Vec::new();

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match bytes.get(i)? {
            b'>' => {
                return Some(OpenTag { name, attributes, self_closing: false, end: i + 1 });
            }
            b'/' if bytes.get(i + 1) == Some(&b'>') => {
                return Some(OpenTag { name, attributes, self_closing: true, end: i + 2 });
            }
            b'/' => {
                i += 1;
            }
            _ => {
                let attr_start = i;
                while i < bytes.len()
                    && !bytes[i].is_ascii_whitespace()
                    && !matches!(bytes[i], b'=' | b'>' | b'/' | b'"' | b'\'')
                {
                    i += 1;
                }
                if i == attr_start {
                    // Stray quote in attribute position
                    return None;
                }
                let attr_name = html[attr_start..i].to_string();

                let mut j = i;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                if bytes.get(j) != Some(&b'=') {
                    attributes.push((attr_name, String::new()));
                    continue;
                }
                j += 1;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }

                let value = match bytes.get(j)? {
                    quote @ (b'"' | b'\'') => {
                        let close = find_byte(bytes, *quote, j + 1)?;
                        let value = html[j + 1..close].to_string();
                        i = close + 1;
                        value
                    }
                    _ => {
                        let value_start = j;
                        while j < bytes.len() && !bytes[j].is_ascii_whitespace() && bytes[j] != b'>' {
                            j += 1;
                        }
                        i = j;
                        html[value_start..j].to_string()
                    }
                };
                attributes.push((attr_name, value));
            }
        }
    }
}

fn names_match(a: &str, b: &str, convention: TagConvention) -> bool {
    match convention {
        TagConvention::Namespaced => a == b,
        TagConvention::Prefixed => a.eq_ignore_ascii_case(b),
    }
}

/// Pair the open tag with its correctly nested close tag.
/// Returns the byte offsets of `</name` and one past its `>`.
fn find_matching_close(
    html: &str,
    name: &str,
    convention: TagConvention,
    from: usize,
) -> Option<(usize, usize)> {
    let bytes = html.as_bytes();
    let mut depth = 1usize;
    let mut pos = from;

    while let Some(offset) = find_byte(bytes, b'<', pos) {
        if let Some(skip_to) = skip_opaque(html, offset) {
            pos = skip_to;
            continue;
        }

        if bytes.get(offset + 1) == Some(&b'/') {
            let name_start = offset + 2;
            let mut name_end = name_start;
            while name_end < bytes.len() && is_name_byte(bytes[name_end]) {
                name_end += 1;
            }
            if names_match(&html[name_start..name_end], name, convention) {
                let close_end = find_byte(bytes, b'>', name_end)? + 1;
                depth -= 1;
                if depth == 0 {
                    return Some((offset, close_end));
                }
                pos = close_end;
            } else {
                pos = name_end.max(offset + 1);
            }
            continue;
        }

        match parse_open_tag(html, offset) {
            Some(open) => {
                if names_match(&open.name, name, convention) && !open.self_closing {
                    depth += 1;
                }
                pos = skip_raw_text(html, &open).unwrap_or(open.end);
            }
            None => pos = offset + 1,
        }
    }

    None
}
