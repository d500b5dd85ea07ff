//! Namespaced minijinja template registry.
//!
//! Provider crates register one [`TemplateSource`] each under a unique
//! source name. [`TemplateRegistry::load_all`] then globs every source,
//! parses each matched file into a single [`minijinja::Environment`] under
//! `source/<file name>`, and hands back an immutable [`TemplateSet`].
//!
//! Rendering helpers (filters) are injected at load time because they
//! belong to the destination channel, not to the template source: the
//! Telegram set escapes MarkdownV2, the email set passes text through.

use std::collections::BTreeSet;
use std::path::PathBuf;

use minijinja::{Environment, UndefinedBehavior, Value};
use serde::Serialize;

/// Errors raised while loading or rendering templates.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template source '{0}' already registered")]
    DuplicateSource(String),

    #[error("invalid template source name '{0}'")]
    InvalidSourceName(String),

    #[error("failed to glob pattern '{pattern}' in source '{source_name}': {reason}")]
    Glob {
        source_name: String,
        pattern: String,
        reason: String,
    },

    #[error("failed to read template file '{path}' from source '{source_name}': {reason}")]
    Read {
        source_name: String,
        path: String,
        reason: String,
    },

    #[error("failed to parse template '{name}': {reason}")]
    Parse { name: String, reason: String },

    #[error("template '{0}' not found")]
    NotFound(String),

    #[error("failed to render template '{name}': {reason}")]
    Render { name: String, reason: String },
}

// ── Sources ───────────────────────────────────────────────────

/// A filesystem-like collection of template files.
pub trait TemplateSource: Send + Sync {
    /// Paths (relative to the source root, `/`-separated) matching `pattern`.
    fn glob(&self, pattern: &str) -> Result<Vec<String>, String>;

    /// Contents of a path previously returned by [`TemplateSource::glob`].
    fn read(&self, path: &str) -> Result<String, String>;
}

/// Templates compiled into the binary with `include_str!`.
#[derive(Debug, Clone)]
pub struct EmbeddedSource {
    files: Vec<(&'static str, &'static str)>,
}

impl EmbeddedSource {
    /// `files` is a list of `(path, contents)` pairs.
    pub fn new(files: &[(&'static str, &'static str)]) -> Self {
        Self {
            files: files.to_vec(),
        }
    }
}

impl TemplateSource for EmbeddedSource {
    fn glob(&self, pattern: &str) -> Result<Vec<String>, String> {
        let pattern = glob::Pattern::new(pattern).map_err(|e| e.to_string())?;
        let mut matches: Vec<String> = self
            .files
            .iter()
            .filter(|(path, _)| pattern.matches(path))
            .map(|(path, _)| path.to_string())
            .collect();
        matches.sort();
        Ok(matches)
    }

    fn read(&self, path: &str) -> Result<String, String> {
        self.files
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(_, contents)| contents.to_string())
            .ok_or_else(|| format!("no embedded file '{path}'"))
    }
}

/// Templates read from a directory on disk.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TemplateSource for DirSource {
    fn glob(&self, pattern: &str) -> Result<Vec<String>, String> {
        let root = self
            .root
            .to_str()
            .ok_or_else(|| format!("non UTF-8 template dir: {}", self.root.display()))?;
        let full = format!("{}/{}", glob::Pattern::escape(root), pattern);

        let mut matches = Vec::new();
        for entry in glob::glob(&full).map_err(|e| e.to_string())? {
            let path = entry.map_err(|e| e.to_string())?;
            if !path.is_file() {
                continue;
            }
            let rel = path
                .strip_prefix(&self.root)
                .map_err(|e| e.to_string())?
                .to_string_lossy()
                .replace('\\', "/");
            matches.push(rel);
        }
        matches.sort();
        Ok(matches)
    }

    fn read(&self, path: &str) -> Result<String, String> {
        std::fs::read_to_string(self.root.join(path)).map_err(|e| e.to_string())
    }
}

// ── Functions ─────────────────────────────────────────────────

/// A text filter exposed to templates as `{{ value | name }}`.
pub type TextFilter = fn(&str) -> String;

/// Rendering helpers injected into a template set at load time.
#[derive(Debug, Clone, Default)]
pub struct TemplateFunctions {
    filters: Vec<(&'static str, TextFilter)>,
}

impl TemplateFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, name: &'static str, filter: TextFilter) -> Self {
        self.filters.push((name, filter));
        self
    }

    /// `esc` as identity, for destinations without markup.
    pub fn plain() -> Self {
        Self::new().with_filter("esc", |text| text.to_string())
    }
}

// ── Registry ──────────────────────────────────────────────────

struct RegisteredSource {
    name: String,
    source: Box<dyn TemplateSource>,
    patterns: Vec<String>,
}

/// Collects template sources during startup.
#[derive(Default)]
pub struct TemplateRegistry {
    sources: Vec<RegisteredSource>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source under a unique namespace.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::DuplicateSource`] if `name` is already
    /// registered; the first registration is left untouched.
    pub fn register_source(
        &mut self,
        name: impl Into<String>,
        source: impl TemplateSource + 'static,
        patterns: &[&str],
    ) -> Result<(), TemplateError> {
        let name = name.into();
        if name.is_empty() || name.contains('/') {
            return Err(TemplateError::InvalidSourceName(name));
        }
        if self.sources.iter().any(|s| s.name == name) {
            return Err(TemplateError::DuplicateSource(name));
        }
        self.sources.push(RegisteredSource {
            name,
            source: Box::new(source),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        });
        Ok(())
    }

    /// Compile every registered source into one immutable template set.
    ///
    /// Fails fast on the first glob, read, or parse error.
    pub fn load_all(&self, functions: &TemplateFunctions) -> Result<TemplateSet, TemplateError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Chainable);

        for &(name, filter) in &functions.filters {
            env.add_filter(name, move |value: Value| -> String {
                if value.is_undefined() || value.is_none() {
                    String::new()
                } else {
                    filter(&value.to_string())
                }
            });
        }

        let mut names = BTreeSet::new();
        for registered in &self.sources {
            for pattern in &registered.patterns {
                let matches =
                    registered
                        .source
                        .glob(pattern)
                        .map_err(|reason| TemplateError::Glob {
                            source_name: registered.name.clone(),
                            pattern: pattern.clone(),
                            reason,
                        })?;

                for path in matches {
                    let contents =
                        registered
                            .source
                            .read(&path)
                            .map_err(|reason| TemplateError::Read {
                                source_name: registered.name.clone(),
                                path: path.clone(),
                                reason,
                            })?;

                    let file_name = path.rsplit('/').next().unwrap_or(&path);
                    let full_name = format!("{}/{}", registered.name, file_name);

                    env.add_template_owned(full_name.clone(), contents)
                        .map_err(|e| TemplateError::Parse {
                            name: full_name.clone(),
                            reason: e.to_string(),
                        })?;
                    names.insert(full_name);
                }
            }
        }

        tracing::debug!(templates = names.len(), "template set loaded");
        Ok(TemplateSet { env, names })
    }
}

/// Compiled, read-only templates keyed `source/file`.
#[derive(Debug)]
pub struct TemplateSet {
    env: Environment<'static>,
    names: BTreeSet<String>,
}

impl TemplateSet {
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Render a template by its full `source/file` name.
    pub fn render<S: Serialize>(&self, name: &str, data: &S) -> Result<String, TemplateError> {
        let template = self
            .env
            .get_template(name)
            .map_err(|_| TemplateError::NotFound(name.to_string()))?;
        template.render(data).map_err(|e| TemplateError::Render {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn github_source() -> EmbeddedSource {
        EmbeddedSource::new(&[
            ("templates/push.tmpl", "push to {{ repo | esc }}"),
            ("templates/default.tmpl", "event {{ event_name }}"),
            ("README.md", "not a template"),
        ])
    }

    #[test]
    fn register_and_load_namespaced() {
        let mut registry = TemplateRegistry::new();
        registry
            .register_source("github", github_source(), &["templates/*.tmpl"])
            .unwrap();
        let set = registry.load_all(&TemplateFunctions::plain()).unwrap();

        assert!(set.contains("github/push.tmpl"));
        assert!(set.contains("github/default.tmpl"));
        assert!(!set.contains("github/README.md"));
        assert!(!set.contains("push.tmpl"));
        assert_eq!(set.names().count(), 2);
    }

    #[test]
    fn duplicate_source_is_rejected() {
        let mut registry = TemplateRegistry::new();
        registry
            .register_source("github", github_source(), &["templates/*.tmpl"])
            .unwrap();
        let err = registry
            .register_source(
                "github",
                EmbeddedSource::new(&[("x.tmpl", "other")]),
                &["*.tmpl"],
            )
            .unwrap_err();
        assert!(matches!(err, TemplateError::DuplicateSource(ref n) if n == "github"));
        assert!(err.to_string().contains("already registered"));

        // The first registration survives.
        let set = registry.load_all(&TemplateFunctions::plain()).unwrap();
        assert!(set.contains("github/push.tmpl"));
        assert!(!set.contains("github/x.tmpl"));
    }

    #[test]
    fn invalid_source_name_is_rejected() {
        let mut registry = TemplateRegistry::new();
        assert!(registry
            .register_source("", github_source(), &["*"])
            .is_err());
        assert!(registry
            .register_source("a/b", github_source(), &["*"])
            .is_err());
    }

    #[test]
    fn same_file_name_in_two_sources_does_not_collide() {
        let mut registry = TemplateRegistry::new();
        registry
            .register_source("a", EmbeddedSource::new(&[("default.tmpl", "A")]), &["*.tmpl"])
            .unwrap();
        registry
            .register_source("b", EmbeddedSource::new(&[("default.tmpl", "B")]), &["*.tmpl"])
            .unwrap();
        let set = registry.load_all(&TemplateFunctions::plain()).unwrap();
        let empty = serde_json::json!({});
        assert_eq!(set.render("a/default.tmpl", &empty).unwrap(), "A");
        assert_eq!(set.render("b/default.tmpl", &empty).unwrap(), "B");
    }

    #[test]
    fn parse_error_fails_load() {
        let mut registry = TemplateRegistry::new();
        registry
            .register_source(
                "broken",
                EmbeddedSource::new(&[("bad.tmpl", "{{ unclosed")]),
                &["*.tmpl"],
            )
            .unwrap();
        match registry.load_all(&TemplateFunctions::plain()) {
            Err(TemplateError::Parse { name, .. }) => assert_eq!(name, "broken/bad.tmpl"),
            other => panic!("expected Parse error, got: {other:?}"),
        }
    }

    #[test]
    fn invalid_glob_fails_load() {
        let mut registry = TemplateRegistry::new();
        registry
            .register_source("g", github_source(), &["[unclosed"])
            .unwrap();
        assert!(matches!(
            registry.load_all(&TemplateFunctions::plain()),
            Err(TemplateError::Glob { .. })
        ));
    }

    #[test]
    fn filters_are_injected_at_load_time() {
        let mut registry = TemplateRegistry::new();
        registry
            .register_source("github", github_source(), &["templates/*.tmpl"])
            .unwrap();

        let shout = TemplateFunctions::new().with_filter("esc", |t| t.to_uppercase());
        let loud = registry.load_all(&shout).unwrap();
        let plain = registry.load_all(&TemplateFunctions::plain()).unwrap();

        let data = serde_json::json!({"repo": "octo/cat"});
        assert_eq!(loud.render("github/push.tmpl", &data).unwrap(), "push to OCTO/CAT");
        assert_eq!(plain.render("github/push.tmpl", &data).unwrap(), "push to octo/cat");
    }

    #[test]
    fn missing_values_render_empty() {
        let mut registry = TemplateRegistry::new();
        registry
            .register_source(
                "t",
                EmbeddedSource::new(&[("a.tmpl", "[{{ a.b.c }}][{{ missing | esc }}]")]),
                &["*.tmpl"],
            )
            .unwrap();
        let set = registry.load_all(&TemplateFunctions::plain()).unwrap();
        assert_eq!(set.render("t/a.tmpl", &serde_json::json!({})).unwrap(), "[][]");
    }

    #[test]
    fn render_unknown_template() {
        let registry = TemplateRegistry::new();
        let set = registry.load_all(&TemplateFunctions::plain()).unwrap();
        assert!(matches!(
            set.render("nope/x.tmpl", &serde_json::json!({})),
            Err(TemplateError::NotFound(_))
        ));
    }

    #[test]
    fn dir_source_loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("default.tmpl"), "from disk {{ x }}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut registry = TemplateRegistry::new();
        registry
            .register_source("disk", DirSource::new(dir.path()), &["*.tmpl"])
            .unwrap();
        let set = registry.load_all(&TemplateFunctions::plain()).unwrap();

        assert_eq!(set.names().collect::<Vec<_>>(), vec!["disk/default.tmpl"]);
        assert_eq!(
            set.render("disk/default.tmpl", &serde_json::json!({"x": 1}))
                .unwrap(),
            "from disk 1"
        );
    }

    #[test]
    fn dir_source_parse_error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.tmpl"), "{% if %}").unwrap();

        let mut registry = TemplateRegistry::new();
        registry
            .register_source("disk", DirSource::new(dir.path()), &["*.tmpl"])
            .unwrap();
        let err = registry
            .load_all(&TemplateFunctions::plain())
            .unwrap_err()
            .to_string();
        assert!(err.contains("disk/bad.tmpl"), "got: {err}");
    }
}
