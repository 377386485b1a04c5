//! Compiles the `{{ }}` template dialect down to a target template language
//!
//! The compiler is a single left-to-right scan over `{{ ... }}` markers with
//! an explicit block stack, so nested blocks of the same kind pair with
//! their correct close markers. It must only see markup that has already
//! gone through component expansion.

use crate::error::{BuildError, Result};
use crate::types::line_at;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// `<%- expr %>` / `<% if (..) { %>` output syntax
    Ejs,
    /// MiniJinja / Jinja2 syntax, rendered by the built-in renderer
    #[default]
    Jinja,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Ejs => write!(f, "ejs"),
            Target::Jinja => write!(f, "jinja"),
        }
    }
}

impl Target {
    fn each_open(self, list: &str, item: &str) -> String {
        match self {
            Target::Ejs => format!("<% {list}.forEach(({item}) => {{ %>"),
            Target::Jinja => format!("{{% for {item} in {list} %}}"),
        }
    }

    fn each_close(self) -> &'static str {
        match self {
            Target::Ejs => "<% }); %>",
            Target::Jinja => "{% endfor %}",
        }
    }

    fn if_open(self, condition: &str) -> String {
        match self {
            Target::Ejs => format!("<% if ({condition}) {{ %>"),
            Target::Jinja => format!("{{% if {condition} %}}"),
        }
    }

    fn if_close(self) -> &'static str {
        match self {
            Target::Ejs => "<% } %>",
            Target::Jinja => "{% endif %}",
        }
    }

    fn output(self, expression: &str) -> String {
        match self {
            Target::Ejs => format!("<%- {expression} %>"),
            Target::Jinja => format!("{{{{ {expression} }}}}"),
        }
    }

    /// Make plain template text inert in the target language.
    /// Jinja tag and comment openers are emitted as string expressions.
    fn literal(self, text: &str, out: &mut String) {
        match self {
            Target::Ejs => out.push_str(&text.replace("<%", "<%%")),
            Target::Jinja => {
                let mut rest = text;
                while let Some(at) = rest.find('{') {
                    out.push_str(&rest[..at]);
                    let tail = &rest[at..];
                    if tail.starts_with("{%") {
                        out.push_str(r#"{{ "{%" }}"#);
                        rest = &tail[2..];
                    } else if tail.starts_with("{#") {
                        out.push_str(r#"{{ "{#" }}"#);
                        rest = &tail[2..];
                    } else {
                        out.push('{');
                        rest = &tail[1..];
                    }
                }
                out.push_str(rest);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Each,
    If,
}

impl BlockKind {
    fn keyword(self) -> &'static str {
        match self {
            BlockKind::Each => "each",
            BlockKind::If => "if",
        }
    }
}

pub struct DialectCompiler {
    target: Target,
    each_regex: Regex,
}

impl DialectCompiler {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            each_regex: Regex::new(r"(?s)^#each\s+(.+?)\s+as\s+(.+?)$").unwrap(),
        }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// Rewrite blocks and expressions in `source`; `file` is only used in diagnostics
    pub fn compile(&self, source: &str, file: &str) -> Result<String> {
        let mut out = String::with_capacity(source.len() + source.len() / 4);
        // open blocks with their marker offsets
        let mut stack: Vec<(BlockKind, usize)> = Vec::new();
        let mut pos = 0;

        while let Some(rel) = source[pos..].find("{{") {
            let open = pos + rel;
            let line = || line_at(source, open);
            let Some(close_rel) = source[open + 2..].find("}}") else {
                return Err(BuildError::dialect(file, line(), "unterminated '{{' expression"));
            };
            let close = open + 2 + close_rel;
            let inner = source[open + 2..close].trim();

            self.target.literal(&source[pos..open], &mut out);

            if let Some(block) = inner.strip_prefix('#') {
                let (keyword, _) = split_keyword(block);
                match keyword {
                    "each" => {
                        let caps = self.each_regex.captures(inner).ok_or_else(|| {
                            BuildError::dialect(file, line(), format!("malformed each block '{{{{{inner}}}}}', expected '{{{{#each list as item}}}}'"))
                        })?;
                        out.push_str(&self.target.each_open(caps[1].trim(), caps[2].trim()));
                        stack.push((BlockKind::Each, open));
                    }
                    "if" => {
                        let condition = block[2..].trim();
                        if condition.is_empty() {
                            return Err(BuildError::dialect(file, line(), "'{{#if}}' needs a condition"));
                        }
                        out.push_str(&self.target.if_open(condition));
                        stack.push((BlockKind::If, open));
                    }
                    other => {
                        return Err(BuildError::dialect(file, line(), format!("unknown block '#{other}'")));
                    }
                }
            } else if let Some(block) = inner.strip_prefix('/') {
                let kind = match block.trim() {
                    "each" => BlockKind::Each,
                    "if" => BlockKind::If,
                    other => {
                        return Err(BuildError::dialect(file, line(), format!("unknown closing block '/{other}'")));
                    }
                };
                match stack.pop() {
                    Some((open_kind, _)) if open_kind == kind => {}
                    Some((open_kind, open_at)) => {
                        return Err(BuildError::dialect(
                            file,
                            line(),
                            format!(
                                "'{{{{/{}}}}}' closes '{{{{#{}}}}}' opened at line {}",
                                kind.keyword(),
                                open_kind.keyword(),
                                line_at(source, open_at)
                            ),
                        ));
                    }
                    None => {
                        return Err(BuildError::dialect(
                            file,
                            line(),
                            format!("'{{{{/{}}}}}' without a matching open block", kind.keyword()),
                        ));
                    }
                }
                out.push_str(match kind {
                    BlockKind::Each => self.target.each_close(),
                    BlockKind::If => self.target.if_close(),
                });
            } else if inner.is_empty() {
                return Err(BuildError::dialect(file, line(), "empty '{{ }}' expression"));
            } else {
                out.push_str(&self.target.output(inner));
            }

            pos = close + 2;
        }

        if let Some((kind, open_at)) = stack.pop() {
            return Err(BuildError::dialect(
                file,
                line_at(source, open_at),
                format!("'{{{{#{}}}}}' is never closed", kind.keyword()),
            ));
        }

        self.target.literal(&source[pos..], &mut out);
        Ok(out)
    }
}

fn split_keyword(block: &str) -> (&str, &str) {
    let end = block
        .find(|c: char| c.is_whitespace())
        .unwrap_or(block.len());
    (&block[..end], &block[end..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ejs(source: &str) -> String {
        DialectCompiler::new(Target::Ejs).compile(source, "test.html").unwrap()
    }

    fn jinja(source: &str) -> String {
        DialectCompiler::new(Target::Jinja).compile(source, "test.html").unwrap()
    }

    fn error_line(source: &str) -> (usize, String) {
        match DialectCompiler::new(Target::Ejs).compile(source, "test.html") {
            Err(BuildError::Dialect { line, message, .. }) => (line, message),
            other => panic!("Expected dialect error, got {other:?}"),
        }
    }

    #[test]
    fn test_expression_to_ejs() {
        assert_eq!(ejs("<p>{{ message }}</p>"), "<p><%- message %></p>");
    }

    #[test]
    fn test_if_block_to_ejs() {
        assert_eq!(
            ejs("{{#if user.isLoggedIn}}<p>Welcome</p>{{/if}}"),
            "<% if (user.isLoggedIn) { %><p>Welcome</p><% } %>"
        );
    }

    #[test]
    fn test_each_block_to_ejs() {
        assert_eq!(
            ejs("<ul>{{#each posts as post}}<li>{{ post.title }}</li>{{/each}}</ul>"),
            "<ul><% posts.forEach((post) => { %><li><%- post.title %></li><% }); %></ul>"
        );
    }

    #[test]
    fn test_jinja_output() {
        assert_eq!(
            jinja("<ul>{{#each posts as post}}{{#if post.draft}}<li>{{ post.title }}</li>{{/if}}{{/each}}</ul>"),
            "<ul>{% for post in posts %}{% if post.draft %}<li>{{ post.title }}</li>{% endif %}{% endfor %}</ul>"
        );
    }

    #[test]
    fn test_whitespace_inside_markers() {
        assert_eq!(
            ejs("{{ #each  site.nav  as  link }}{{   link.href   }}{{ /each }}"),
            "<% site.nav.forEach((link) => { %><%- link.href %><% }); %>"
        );
    }

    #[test]
    fn test_nested_same_kind_blocks() {
        let source = "{{#each rows as row}}<tr>{{#each row.cells as cell}}<td>{{ cell }}</td>{{/each}}</tr>{{/each}}";
        assert_eq!(
            ejs(source),
            "<% rows.forEach((row) => { %><tr><% row.cells.forEach((cell) => { %><td><%- cell %></td><% }); %></tr><% }); %>"
        );

        let source = "{{#if a}}A{{#if b}}B{{/if}}C{{/if}}";
        assert_eq!(jinja(source), "{% if a %}A{% if b %}B{% endif %}C{% endif %}");
    }

    #[test]
    fn test_mismatched_close_is_error() {
        let (line, message) = error_line("{{#each xs as x}}\n{{/if}}");
        assert_eq!(line, 2);
        assert!(message.contains("opened at line 1"));
    }

    #[test]
    fn test_unclosed_block_is_error() {
        let (line, message) = error_line("<p>\n{{#if ready}}never closed");
        assert_eq!(line, 2);
        assert!(message.contains("never closed"));
    }

    #[test]
    fn test_stray_close_is_error() {
        let (_, message) = error_line("text{{/each}}");
        assert!(message.contains("without a matching open block"));
    }

    #[test]
    fn test_malformed_markers_are_errors() {
        assert!(error_line("{{#each posts}}{{/each}}").1.contains("malformed each block"));
        assert!(error_line("{{#unless x}}{{/unless}}").1.contains("unknown block"));
        assert!(error_line("{{ }}").1.contains("empty"));
        assert!(error_line("{{ open").1.contains("unterminated"));
    }

    #[test]
    fn test_literal_text_is_made_inert() {
        assert_eq!(ejs("<p>50<%</p>"), "<p>50<%%</p>");
        assert_eq!(
            jinja("<p>{% not a tag %}</p>{{ x }}"),
            r#"<p>{{ "{%" }} not a tag %}</p>{{ x }}"#
        );
        assert_eq!(jinja("{#c#}{ a }"), r#"{{ "{#" }}c#}{ a }"#);
    }

    #[test]
    fn test_jinja_literal_tags_render_verbatim() {
        use crate::render::{JinjaRenderer, Renderer};
        use serde_json::json;

        let compiled = jinja("<code>{% endraw %}{% if x %}</code>{{ x }}");
        let html = JinjaRenderer::new()
            .render("test.html", &compiled, &json!({ "x": "!" }))
            .unwrap();
        assert_eq!(html, "<code>{% endraw %}{% if x %}</code>!");
    }

    #[test]
    fn test_error_lines_in_long_template() {
        let mut source = "{{ a }}\n".repeat(500);
        source.push_str("{{#if x}}\n{{/each}}");
        let (line, message) = error_line(&source);
        assert_eq!(line, 502);
        assert!(message.contains("opened at line 501"));
    }

    #[test]
    fn test_no_markers_is_identity() {
        let html = "<main><h1>Hello</h1></main>";
        assert_eq!(ejs(html), html);
        assert_eq!(jinja(html), html);
    }
}
