//! Component loading, caching and recursive expansion

use crate::error::{BuildError, Result};
use crate::session::BuildSession;
use crate::style::scope_css;
use crate::tag_scanner::{extract_raw_blocks, find_component_tags, ComponentTag, TagConvention};
use crate::types::{Props, COMPONENT_EXTENSION, MAX_COMPONENT_DEPTH, SCOPE_ATTRIBUTE};
use regex::{Captures, NoExpand, Regex};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// A component file split into markup, style and script
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDefinition {
    pub name: String,
    pub template: String,
    pub css: String,
    pub script: String,
}

impl ComponentDefinition {
    pub fn parse(name: impl Into<String>, raw: &str) -> Self {
        let (without_styles, styles) = extract_raw_blocks(raw, "style");
        let (template, scripts) = extract_raw_blocks(&without_styles, "script");
        Self {
            name: name.into(),
            template: template.trim().to_string(),
            css: styles.join("\n"),
            script: scripts.join("\n"),
        }
    }
}

/// Loads each component file at most once per session
#[derive(Debug)]
pub struct ComponentCache {
    components_dir: PathBuf,
    definitions: HashMap<String, Arc<ComponentDefinition>>,
}

impl ComponentCache {
    pub fn new(components_dir: impl Into<PathBuf>) -> Self {
        Self {
            components_dir: components_dir.into(),
            definitions: HashMap::new(),
        }
    }

    /// `Ok(None)` when no file backs the component
    pub fn get_or_load(&mut self, name: &str) -> Result<Option<Arc<ComponentDefinition>>> {
        if let Some(definition) = self.definitions.get(name) {
            return Ok(Some(Arc::clone(definition)));
        }

        if name.contains("..") || name.contains(&['/', '\\'][..]) {
            return Ok(None);
        }
        let path = self.components_dir.join(format!("{name}.{COMPONENT_EXTENSION}"));
        if !path.is_file() {
            return Ok(None);
        }

        log::debug!("Loading component {} from {}", name, path.display());
        let raw = fs::read_to_string(&path)?;
        let definition = Arc::new(ComponentDefinition::parse(name, &raw));
        self.definitions.insert(name.to_string(), Arc::clone(&definition));
        Ok(Some(definition))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Compiled markup plus everything gathered while expanding it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expansion {
    pub html: String,
    pub css: String,
    pub js: String,
}

impl Expansion {
    fn absorb_assets(&mut self, other: &Expansion) {
        self.css.push_str(&other.css);
        self.js.push_str(&other.js);
    }
}

pub struct ComponentResolver {
    instantiation_stack: Vec<String>, // Track expansion path to detect cycles
    scope_css: bool,
    prop_regex: Regex,
    slot_regex: Regex,
}

impl ComponentResolver {
    pub fn new(scope_css: bool) -> Self {
        Self {
            instantiation_stack: Vec::new(),
            scope_css,
            prop_regex: Regex::new(r"\{\{\s*props\.([A-Za-z0-9_$-]+)\s*\}\}").unwrap(),
            slot_regex: Regex::new(r"\{\{\s*slot\s*\}\}").unwrap(),
        }
    }

    /// Expand every component occurrence in `html`
    pub fn resolve(&mut self, html: &str, session: &mut BuildSession) -> Result<Expansion> {
        let tags = find_component_tags(html);
        if tags.is_empty() {
            return Ok(Expansion {
                html: html.to_string(),
                ..Expansion::default()
            });
        }

        let mut result = Expansion::default();
        let mut cursor = 0;
        for tag in &tags {
            result.html.push_str(&html[cursor..tag.start]);
            cursor = tag.end;

            if let Some(expanded) = self.expand(tag, session)? {
                result.html.push_str(&expanded.html);
                result.absorb_assets(&expanded);
            }
        }
        result.html.push_str(&html[cursor..]);

        Ok(result)
    }

    fn expand(&mut self, tag: &ComponentTag, session: &mut BuildSession) -> Result<Option<Expansion>> {
        let name = &tag.component;

        if self.instantiation_stack.iter().any(|active| active == name) {
            let mut chain = self.instantiation_stack.clone();
            chain.push(name.clone());
            return Err(BuildError::ComponentCycle { chain });
        }
        if self.instantiation_stack.len() >= MAX_COMPONENT_DEPTH {
            return Err(BuildError::LimitExceeded {
                limit_type: "component nesting depth".to_string(),
                limit: MAX_COMPONENT_DEPTH,
            });
        }

        let Some(definition) = session.components.get_or_load(name)? else {
            log::warn!("Component not found: {} (<{}>)", name, tag.tag_name);
            return Ok(None);
        };

        let scope_id = match tag.convention {
            TagConvention::Prefixed => Some(session.next_scope_id(name)),
            TagConvention::Namespaced => None,
        };

        let mut result = Expansion::default();

        if !definition.css.is_empty() {
            match &scope_id {
                Some(id) if self.scope_css => result.css.push_str(&scope_css(&definition.css, id)),
                _ => result.css.push_str(&definition.css),
            }
        }

        // Slot content belongs to the caller, so it resolves outside this component's scope
        let slot = self.resolve(&tag.slot, session)?;
        result.absorb_assets(&slot);

        // Slot scripts come before the component's own
        if !definition.script.trim().is_empty() {
            match &scope_id {
                Some(id) => result.js.push_str(&register_script(name, id, &definition.script)),
                None => log::warn!(
                    "Component {} has a <script> block; scripts only run for <shork-*> tags",
                    name
                ),
            }
        }

        let body = self.substitute(&definition.template, &tag.props, &slot.html);

        self.instantiation_stack.push(name.clone());
        let nested = self.resolve(&body, session);
        self.instantiation_stack.pop();
        let nested = nested?;
        result.absorb_assets(&nested);

        result.html = match &scope_id {
            Some(id) => format!("<div {SCOPE_ATTRIBUTE}=\"{id}\">{}</div>", nested.html),
            None => nested.html,
        };

        Ok(Some(result))
    }

    /// Replace prop placeholders and the slot placeholder.
    /// Placeholders for props the tag does not carry stay as literal text.
    fn substitute(&self, template: &str, props: &Props, slot: &str) -> String {
        let with_props = self.prop_regex.replace_all(template, |caps: &Captures| {
            props
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        });
        self.slot_regex
            .replace_all(&with_props, NoExpand(slot))
            .into_owned()
    }
}

/// Wrap a component script so its exports land in the client-side registry under `id`
fn register_script(name: &str, id: &str, script: &str) -> String {
    format!(
        "\n// Component: {name}\n((id) => {{\n    window.Shork = window.Shork || {{}};\n    window.Shork._componentFunctions = window.Shork._componentFunctions || {{}};\n    window.Shork._componentFunctions[id] = (() => {{\n        {script}\n    }})();\n}})('{id}');\n"
    )
}
