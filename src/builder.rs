//! Page build orchestration
//!
//! For every route in the manifest the builder works out the concrete
//! parameter bindings, merges page data, validates it, preprocesses and
//! renders the page inside its layout, and writes the finished document
//! into the app shell.

use crate::config::SiteConfig;
use crate::error::{BuildError, Result};
use crate::manifest::{Manifest, Route};
use crate::module::{load_global_data, DataModule};
use crate::preprocessor::Preprocessor;
use crate::render::{JinjaRenderer, Renderer};
use crate::session::BuildSession;
use crate::style::minify_css;
use crate::types::{StaticParams, BODY_PLACEHOLDER, HEAD_PLACEHOLDER};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Build statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildStats {
    /// HTML documents written
    pub pages_written: usize,

    /// Dynamic routes skipped for lack of a data module or static params
    pub routes_skipped: usize,

    /// Distinct component definitions loaded
    pub components_loaded: usize,

    /// Files copied from the static directory
    pub static_files: usize,

    /// Whether a client runtime was bundled
    pub runtime_bundled: bool,

    /// Wall time in milliseconds
    pub build_time_ms: u64,
}

pub struct SiteBuilder<'a> {
    config: &'a SiteConfig,
    renderer: Box<dyn Renderer>,
    preprocessor: Preprocessor,
    app_template: String,
    global_data: Value,
    stats: BuildStats,
}

impl<'a> SiteBuilder<'a> {
    pub fn new(config: &'a SiteConfig) -> Result<Self> {
        Self::with_renderer(config, Box::new(JinjaRenderer::new()))
    }

    pub fn with_renderer(config: &'a SiteConfig, renderer: Box<dyn Renderer>) -> Result<Self> {
        let app_path = config.app_template_path();
        let app_template = fs::read_to_string(&app_path).map_err(|e| BuildError::FileNotFound {
            path: format!("{}: {}", app_path.display(), e),
        })?;
        let global_data = load_global_data(&config.src_dir)?;

        Ok(Self {
            preprocessor: Preprocessor::new(renderer.target(), config.scope_css),
            config,
            renderer,
            app_template,
            global_data,
            stats: BuildStats::default(),
        })
    }

    /// Build every route in manifest order
    pub fn build_all(&mut self, manifest: &Manifest, session: &mut BuildSession) -> Result<BuildStats> {
        let start_time = Instant::now();
        for route in &manifest.routes {
            self.build_route(route, session)?;
        }

        self.stats.components_loaded = session.components.len();
        self.stats.build_time_ms = start_time.elapsed().as_millis() as u64;
        log::info!(
            "Built {} pages ({} routes skipped) in {}ms",
            self.stats.pages_written,
            self.stats.routes_skipped,
            self.stats.build_time_ms
        );
        Ok(self.stats.clone())
    }

    /// Build all instances of one route; returns the files written
    pub fn build_route(&mut self, route: &Route, session: &mut BuildSession) -> Result<Vec<PathBuf>> {
        if !route.is_dynamic() {
            let page = self.build_page(route, &StaticParams::default(), session)?;
            return Ok(vec![page]);
        }

        let Some(module) = session.modules.data_module(route)? else {
            log::warn!("Skipping dynamic route {}: no data module", route.path);
            self.stats.routes_skipped += 1;
            return Ok(Vec::new());
        };
        let Some(entries) = module.static_params(&self.global_data)? else {
            log::warn!("Skipping dynamic route {}: data module has no static params", route.path);
            self.stats.routes_skipped += 1;
            return Ok(Vec::new());
        };

        log::debug!("Route {} has {} static param entries", route.path, entries.len());
        let mut written = Vec::with_capacity(entries.len());
        for entry in &entries {
            written.push(self.build_page(route, entry, session)?);
        }
        Ok(written)
    }

    /// Build and write one concrete page
    pub fn build_page(&mut self, route: &Route, entry: &StaticParams, session: &mut BuildSession) -> Result<PathBuf> {
        let concrete_path = route.concrete_path(&entry.params)?;
        let output = Route::output_file(&self.config.dist_dir, &concrete_path);

        let page = self.preprocessor.preprocess_file(&route.page, session)?;
        let layout = self.preprocessor.preprocess_file(&route.layout, session)?;

        let mut data = Map::new();
        data.insert("page".to_string(), json!({ "params": entry.params }));
        data.insert("isIndex".to_string(), Value::Bool(concrete_path == "/"));
        if let Value::Object(global) = &self.global_data {
            merge(&mut data, global);
        }
        merge(&mut data, &entry.props);

        let module = session.modules.data_module(route)?;
        if let Some(loaded) = load_page_data(module, entry, &self.global_data)? {
            if let Some(schema_path) = &route.schema {
                let schema = session.modules.schema(schema_path)?;
                schema
                    .validate(&Value::Object(loaded.clone()))
                    .map_err(|issues| BuildError::Validation {
                        route: route.path.clone(),
                        issues,
                    })?;
            }
            merge(&mut data, &loaded);
        }

        if let Some(schema_path) = &route.schema {
            let schema = session.modules.schema(schema_path)?;
            schema
                .validate(&Value::Object(data.clone()))
                .map_err(|issues| BuildError::Validation {
                    route: route.path.clone(),
                    issues,
                })?;
        }

        let mut page_data = data.clone();
        page_data.entry("props").or_insert_with(|| Value::Object(Map::new()));
        let body = self
            .renderer
            .render(&route.page.to_string_lossy(), &page.template, &Value::Object(page_data))?;

        let mut layout_data = data;
        layout_data.insert("body".to_string(), Value::String(body));
        let rendered = self
            .renderer
            .render(&route.layout.to_string_lossy(), &layout.template, &Value::Object(layout_data))?;

        let css = minify_css(&format!("{}{}", layout.css, page.css))?;
        let js = format!("{}{}", layout.js, page.js);
        let document = assemble_document(&self.app_template, &head_content(&css, &js), &rendered);

        write_page(&output, &document)?;
        self.stats.pages_written += 1;
        log::info!("Built {} -> {}", concrete_path, output.display());
        Ok(output)
    }
}

fn load_page_data(
    module: Option<Arc<dyn DataModule>>,
    entry: &StaticParams,
    global: &Value,
) -> Result<Option<Map<String, Value>>> {
    match module {
        Some(module) => module.load(&entry.params, global),
        None => Ok(None),
    }
}

fn merge(data: &mut Map<String, Value>, layer: &Map<String, Value>) {
    for (key, value) in layer {
        data.insert(key.clone(), value.clone());
    }
}

/// Markup injected at `%head%`
pub fn head_content(css: &str, js: &str) -> String {
    let mut head = String::new();
    if !css.is_empty() {
        head.push_str("<style>");
        head.push_str(css);
        head.push_str("</style>");
    }
    if !js.trim().is_empty() {
        if !head.is_empty() {
            head.push('\n');
        }
        head.push_str("<script>");
        head.push_str(js);
        head.push_str("</script>");
    }
    head
}

/// Substitute the shell placeholders in a single left-to-right pass.
///
/// Inserted text is never scanned again, so a page containing `%head%`
/// does not receive the head markup.
pub fn assemble_document(shell: &str, head: &str, body: &str) -> String {
    let mut out = String::with_capacity(shell.len() + head.len() + body.len());
    let mut rest = shell;
    loop {
        let next = [(HEAD_PLACEHOLDER, head), (BODY_PLACEHOLDER, body)]
            .into_iter()
            .filter_map(|(placeholder, value)| rest.find(placeholder).map(|at| (at, placeholder, value)))
            .min_by_key(|(at, _, _)| *at);

        match next {
            Some((at, placeholder, value)) => {
                out.push_str(&rest[..at]);
                out.push_str(value);
                rest = &rest[at + placeholder.len()..];
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

fn write_page(output: &Path, document: &str) -> Result<()> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, document)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestBuilder;
    use crate::module::DataModule;
    use crate::types::{Params, LAYOUT_FILE, PAGE_FILE};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const SHELL: &str = "<html><head>%head%</head><body>%body%</body></html>";

    struct Site {
        _dir: TempDir,
        config: SiteConfig,
    }

    impl Site {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let config = SiteConfig::from_root(dir.path());
            fs::create_dir_all(&config.routes_dir).unwrap();
            fs::create_dir_all(&config.components_dir).unwrap();
            fs::write(config.app_template_path(), SHELL).unwrap();
            fs::write(config.routes_dir.join(LAYOUT_FILE), "<main>{{ body }}</main>").unwrap();
            Self { _dir: dir, config }
        }

        fn file(&self, relative: &str, content: &str) -> &Self {
            let path = self.config.routes_dir.join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
            self
        }

        fn component(&self, name: &str, content: &str) -> &Self {
            fs::write(self.config.components_dir.join(format!("{name}.html")), content).unwrap();
            self
        }

        fn build_with(&self, session: &mut BuildSession) -> Result<BuildStats> {
            let manifest = ManifestBuilder::new(&self.config).build()?;
            SiteBuilder::new(&self.config)?.build_all(&manifest, session)
        }

        fn build(&self) -> Result<BuildStats> {
            self.build_with(&mut BuildSession::new(&self.config))
        }

        fn output(&self, relative: &str) -> String {
            fs::read_to_string(self.config.dist_dir.join(relative)).unwrap()
        }
    }

    #[test]
    fn test_static_route_writes_one_file() {
        let site = Site::new();
        site.file(PAGE_FILE, "<h1>Home {{ isIndex }}</h1>")
            .file(&format!("about/{PAGE_FILE}"), "<h1>About {{ isIndex }}</h1>");

        let stats = site.build().unwrap();
        assert_eq!(stats.pages_written, 2);
        assert_eq!(
            site.output("index.html"),
            "<html><head></head><body><main><h1>Home true</h1></main></body></html>"
        );
        assert!(site.output("about/index.html").contains("<h1>About false</h1>"));
    }

    #[test]
    fn test_dynamic_route_writes_one_file_per_entry() {
        let site = Site::new();
        site.file(&format!("blog/[slug]/{PAGE_FILE}"), "<h1>{{ post.title }}</h1><p>{{ page.params.slug }}</p>")
            .file(
                "blog/[slug]/+page.toml",
                "[paths_from]\ncollection = \"posts\"\nparams = { slug = \"slug\" }\nbind = \"post\"\n",
            );
        fs::write(
            site.config.src_dir.join("data.json"),
            r#"{ "posts": [ { "slug": "one", "title": "First" }, { "slug": "two", "title": "Second" } ] }"#,
        )
        .unwrap();

        let stats = site.build().unwrap();
        assert_eq!(stats.pages_written, 2);
        assert!(site.output("blog/one/index.html").contains("<h1>First</h1><p>one</p>"));
        assert!(site.output("blog/two/index.html").contains("<h1>Second</h1><p>two</p>"));
    }

    fn keyed_blog(posts: &str) -> Site {
        let site = Site::new();
        site.file(&format!("blog/[slug]/{PAGE_FILE}"), "<h1>{{ post.title }}</h1>")
            .file(
                "blog/[slug]/+page.toml",
                "[paths_from]\ncollection = \"posts\"\nparams = { slug = \"slug\" }\n\n\
                 [load_from]\ncollection = \"posts\"\nkey = \"slug\"\nparam = \"slug\"\nbind = \"post\"\n",
            )
            .file(
                "blog/[slug]/+schema.json",
                r#"{ "type": "object", "required": ["post"],
                     "properties": { "post": { "type": "object", "required": ["title"] } } }"#,
            );
        fs::write(site.config.src_dir.join("data.json"), posts).unwrap();
        site
    }

    #[test]
    fn test_param_keyed_load_is_rendered() {
        let site = keyed_blog(r#"{ "posts": [ { "slug": "one", "title": "First" }, { "slug": "two", "title": "Second" } ] }"#);

        let stats = site.build().unwrap();
        assert_eq!(stats.pages_written, 2);
        assert!(site.output("blog/two/index.html").contains("<h1>Second</h1>"));
    }

    #[test]
    fn test_param_keyed_load_is_validated() {
        let site = keyed_blog(r#"{ "posts": [ { "slug": "one", "title": "First" }, { "slug": "two" } ] }"#);

        match site.build().unwrap_err() {
            BuildError::Validation { route, issues } => {
                assert_eq!(route, "/blog/[slug]");
                assert_eq!(issues[0].path, "post.title");
                assert_eq!(issues[0].message, "Required");
            }
            other => panic!("Expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_dynamic_route_without_module_is_skipped() {
        let site = Site::new();
        site.file(&format!("blog/[slug]/{PAGE_FILE}"), "<p>post</p>")
            .file(&format!("docs/[page]/{PAGE_FILE}"), "<p>doc</p>")
            .file("docs/[page]/+page.toml", "[load]\ntitle = \"Docs\"\n");

        let stats = site.build().unwrap();
        assert_eq!(stats.pages_written, 0);
        assert_eq!(stats.routes_skipped, 2);
    }

    struct Posts;

    impl DataModule for Posts {
        fn load(&self, params: &Params, _global: &Value) -> Result<Option<Map<String, Value>>> {
            let slug = params.get("slug").cloned().unwrap_or_default();
            let mut data = Map::new();
            data.insert("title".into(), json!(slug.to_uppercase()));
            data.insert("featured".into(), json!("from load"));
            Ok(Some(data))
        }

        fn static_params(&self, _global: &Value) -> Result<Option<Vec<StaticParams>>> {
            let entry = |slug: &str| {
                StaticParams::new([("slug".to_string(), slug.to_string())].into_iter().collect())
                    .with_prop("featured", json!("from props"))
                    .with_prop("tag", json!("rust"))
            };
            Ok(Some(vec![entry("a"), entry("b"), entry("c")]))
        }
    }

    #[test]
    fn test_registered_module_and_data_layering() {
        let site = Site::new();
        site.file(
            &format!("posts/[slug]/{PAGE_FILE}"),
            "{{ title }}|{{ featured }}|{{ tag }}|{{ site }}",
        );
        fs::write(site.config.src_dir.join("data.toml"), "site = \"Shork\"\ntag = \"global\"\n").unwrap();

        let mut session = BuildSession::new(&site.config);
        session.modules.register("/posts/[slug]", Arc::new(Posts));
        let stats = site.build_with(&mut session).unwrap();

        assert_eq!(stats.pages_written, 3);
        assert!(site.output("posts/b/index.html").contains("B|from load|rust|Shork"));
    }

    #[test]
    fn test_schema_failure_is_fatal() {
        let site = Site::new();
        site.file(&format!("about/{PAGE_FILE}"), "{{ title }}")
            .file("about/+page.json", r#"{ "load": { "title": 42 } }"#)
            .file(
                "about/+schema.json",
                r#"{ "type": "object", "properties": { "title": { "type": "string" } }, "required": ["title"] }"#,
            );

        let err = site.build().unwrap_err();
        match err {
            BuildError::Validation { route, issues } => {
                assert_eq!(route, "/about");
                assert_eq!(issues[0].path, "title");
                assert_eq!(issues[0].message, "Expected string, received number");
            }
            other => panic!("Expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_schema_checks_merged_data_without_loader() {
        let site = Site::new();
        site.file(PAGE_FILE, "home")
            .file("+schema.json", r#"{ "type": "object", "required": ["site"] }"#);

        assert!(site.build().unwrap_err().is_validation());
        fs::write(site.config.src_dir.join("data.toml"), "site = \"Shork\"\n").unwrap();
        assert_eq!(site.build().unwrap().pages_written, 1);
    }

    #[test]
    fn test_components_styles_and_scripts_reach_the_head() {
        let site = Site::new();
        site.component(
            "Counter",
            "<button>{{ props.label }}</button><style>button { color: red; }</style><script>return {};</script>",
        )
        .file(PAGE_FILE, "<style>h1 { margin: 0; }</style><h1>Hi</h1><shork-counter label=\"+\"></shork-counter>");

        let stats = site.build().unwrap();
        assert_eq!(stats.components_loaded, 1);

        let html = site.output("index.html");
        assert!(html.contains("<style>[data-shork-id="));
        assert!(html.contains("h1{margin:0}</style>"));
        assert!(html.contains("window.Shork._componentFunctions"));
        assert!(html.contains("<button>+</button></div>"));
    }

    #[test]
    fn test_body_overrides_data_key_in_layout() {
        let site = Site::new();
        fs::write(site.config.src_dir.join("data.toml"), "body = \"global body\"\n").unwrap();
        site.file(PAGE_FILE, "<p>{{ body }}</p>");

        site.build().unwrap();
        assert!(site.output("index.html").contains("<main><p>global body</p></main>"));
    }

    #[test]
    fn test_render_error_names_template() {
        let site = Site::new();
        site.file(PAGE_FILE, "{{ items | nosuchfilter }}");

        match site.build().unwrap_err() {
            BuildError::Render { template, .. } => assert!(template.ends_with(PAGE_FILE)),
            other => panic!("Expected render error, got {other:?}"),
        }
    }

    #[test]
    fn test_build_is_idempotent() {
        let site = Site::new();
        site.component("Card", "<div class=\"card\">{{ slot }}</div><style>.card { padding: 1px; }</style><script>return {};</script>")
            .file(PAGE_FILE, "<shork-card><p>a</p></shork-card><shork-card><p>b</p></shork-card>");

        site.build().unwrap();
        let first = site.output("index.html");
        site.build().unwrap();
        assert_eq!(site.output("index.html"), first);
    }

    #[test]
    fn test_assemble_document_is_positional() {
        let doc = assemble_document("<head>%head%</head><body>%body%</body>", "<style>%body%</style>", "<p>%head%</p>");
        assert_eq!(doc, "<head><style>%body%</style></head><body><p>%head%</p></body>");
    }

    #[test]
    fn test_head_content() {
        assert_eq!(head_content("", ""), "");
        assert_eq!(head_content("a{b:c}", ""), "<style>a{b:c}</style>");
        assert_eq!(head_content("", "x();"), "<script>x();</script>");
        assert_eq!(head_content("a{b:c}", "x();"), "<style>a{b:c}</style>\n<script>x();</script>");
    }

    #[test]
    fn test_missing_app_shell() {
        let site = Site::new();
        fs::remove_file(site.config.app_template_path()).unwrap();
        assert!(matches!(SiteBuilder::new(&site.config), Err(BuildError::FileNotFound { .. })));
    }
}
