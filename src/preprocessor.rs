//! Page and layout preprocessing: components, styles, then dialect

use crate::component_resolver::ComponentResolver;
use crate::dialect::{DialectCompiler, Target};
use crate::error::{BuildError, Result};
use crate::session::BuildSession;
use crate::tag_scanner::extract_raw_blocks;
use std::fs;
use std::path::Path;

/// A template ready for the renderer, with the assets it pulled in
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreprocessedTemplate {
    pub template: String,
    pub css: String,
    pub js: String,
}

pub struct Preprocessor {
    resolver: ComponentResolver,
    compiler: DialectCompiler,
}

impl Preprocessor {
    pub fn new(target: Target, scope_css: bool) -> Self {
        Self {
            resolver: ComponentResolver::new(scope_css),
            compiler: DialectCompiler::new(target),
        }
    }

    pub fn target(&self) -> Target {
        self.compiler.target()
    }

    /// Run the three phases over one raw template.
    ///
    /// Components expand before the dialect is compiled, so `{{ }}` markers
    /// coming from component bodies are compiled together with the page's own.
    pub fn preprocess(
        &mut self,
        raw: &str,
        file: &str,
        session: &mut BuildSession,
    ) -> Result<PreprocessedTemplate> {
        log::debug!("Phase 1: expanding components in {}", file);
        let expansion = self.resolver.resolve(raw, session)?;

        log::debug!("Phase 2: extracting template styles in {}", file);
        let (html, styles) = extract_raw_blocks(&expansion.html, "style");
        let mut css = expansion.css;
        for style in styles {
            css.push_str(&style);
        }

        log::debug!("Phase 3: compiling dialect to {} in {}", self.compiler.target(), file);
        let template = self.compiler.compile(&html, file)?;

        Ok(PreprocessedTemplate {
            template,
            css,
            js: expansion.js,
        })
    }

    pub fn preprocess_file(&mut self, path: &Path, session: &mut BuildSession) -> Result<PreprocessedTemplate> {
        let raw = fs::read_to_string(path).map_err(|e| BuildError::FileNotFound {
            path: format!("{}: {}", path.display(), e),
        })?;
        self.preprocess(&raw, &path.to_string_lossy(), session)
    }
}

/// Convenience function to preprocess one template with a throwaway resolver
pub fn preprocess_template(
    raw: &str,
    target: Target,
    session: &mut BuildSession,
) -> Result<PreprocessedTemplate> {
    Preprocessor::new(target, true).preprocess(raw, "<inline>", session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn session_with(components: &[(&str, &str)]) -> (TempDir, BuildSession) {
        let temp_dir = TempDir::new().unwrap();
        for (name, content) in components {
            fs::write(temp_dir.path().join(format!("{name}.html")), content).unwrap();
        }
        let session = BuildSession::with_components_dir(temp_dir.path());
        (temp_dir, session)
    }

    #[test]
    fn test_expressions_and_blocks() {
        let (_dir, mut session) = session_with(&[]);

        let result = preprocess_template("<p>{{ message }}</p>", Target::Ejs, &mut session).unwrap();
        assert_eq!(result.template, "<p><%- message %></p>");

        let result = preprocess_template(
            "{{#if user.isLoggedIn}}<p>Welcome</p>{{/if}}",
            Target::Ejs,
            &mut session,
        )
        .unwrap();
        assert_eq!(result.template, "<% if (user.isLoggedIn) { %><p>Welcome</p><% } %>");
    }

    #[test]
    fn test_component_output_is_compiled() {
        let (_dir, mut session) = session_with(&[(
            "List",
            "<h2>{{ props.heading }}</h2><ul>{{#each items as item}}<li>{{ item }}</li>{{/each}}</ul>",
        )]);

        let result = preprocess_template(
            r#"<Component:List heading="Posts"/>"#,
            Target::Jinja,
            &mut session,
        )
        .unwrap();
        assert_eq!(
            result.template,
            "<h2>Posts</h2><ul>{% for item in items %}<li>{{ item }}</li>{% endfor %}</ul>"
        );
    }

    #[test]
    fn test_page_styles_append_after_component_styles() {
        let (_dir, mut session) = session_with(&[("Badge", "<b>{{ slot }}</b><style>b { color: red; }</style>")]);

        let result = preprocess_template(
            "<style>main { margin: 0; }</style><main><Component:Badge>new</Component:Badge></main>",
            Target::Jinja,
            &mut session,
        )
        .unwrap();
        assert_eq!(result.template, "<main><b>new</b></main>");
        assert_eq!(result.css, "b { color: red; }main { margin: 0; }");
    }

    #[test]
    fn test_component_scripts_are_collected() {
        let (_dir, mut session) = session_with(&[(
            "Counter",
            "<button>+</button><script>return { increment() {} };</script>",
        )]);

        let result = preprocess_template("<shork-counter></shork-counter>", Target::Jinja, &mut session).unwrap();
        assert!(result.js.contains("return { increment() {} };"));
        assert!(!result.template.contains("<script>"));
    }

    #[test]
    fn test_dialect_errors_name_the_file() {
        let (dir, mut session) = session_with(&[]);
        let page = dir.path().join("+page.html");
        fs::write(&page, "<p>\n{{#each posts as post}}").unwrap();

        let err = Preprocessor::new(Target::Jinja, true)
            .preprocess_file(&page, &mut session)
            .unwrap_err();
        match err {
            BuildError::Dialect { file, line, .. } => {
                assert!(file.ends_with("+page.html"));
                assert_eq!(line, 2);
            }
            other => panic!("Expected dialect error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_template_file() {
        let (dir, mut session) = session_with(&[]);
        let err = Preprocessor::new(Target::Jinja, true)
            .preprocess_file(&dir.path().join("missing.html"), &mut session)
            .unwrap_err();
        assert!(matches!(err, BuildError::FileNotFound { .. }));
    }
}
