//! Provider message templates.
//!
//! Each templated provider ships its templates compiled into the binary.
//! A configured templates directory replaces a provider's embedded set
//! when it contains a `<provider>/` subdirectory.

use std::path::Path;

use hookrelay_notify::templating::{DirSource, EmbeddedSource, TemplateError};
use hookrelay_notify::TemplateRegistry;

const TEMPLATE_PATTERN: &str = "*.tmpl";

const GITHUB: &[(&str, &str)] = &[
    ("default.tmpl", include_str!("../templates/github/default.tmpl")),
    ("issue_comment.tmpl", include_str!("../templates/github/issue_comment.tmpl")),
    ("issues.tmpl", include_str!("../templates/github/issues.tmpl")),
    ("ping.tmpl", include_str!("../templates/github/ping.tmpl")),
    ("pull_request.tmpl", include_str!("../templates/github/pull_request.tmpl")),
    ("push.tmpl", include_str!("../templates/github/push.tmpl")),
    ("release.tmpl", include_str!("../templates/github/release.tmpl")),
];

const KANBOARD: &[(&str, &str)] = &[
    ("comment.create.tmpl", include_str!("../templates/kanboard/comment.create.tmpl")),
    ("default.tmpl", include_str!("../templates/kanboard/default.tmpl")),
    ("task.close.tmpl", include_str!("../templates/kanboard/task.close.tmpl")),
    ("task.create.tmpl", include_str!("../templates/kanboard/task.create.tmpl")),
    ("task.move.column.tmpl", include_str!("../templates/kanboard/task.move.column.tmpl")),
];

/// Namespaces and their compiled-in files.
pub const EMBEDDED: &[(&str, &[(&str, &str)])] = &[("github", GITHUB), ("kanboard", KANBOARD)];

/// Registry with one source per templated provider.
pub fn provider_templates(templates_dir: Option<&Path>) -> Result<TemplateRegistry, TemplateError> {
    let mut registry = TemplateRegistry::new();

    for &(namespace, files) in EMBEDDED {
        match templates_dir.map(|dir| dir.join(namespace)) {
            Some(dir) if dir.is_dir() => {
                tracing::info!(namespace, dir = %dir.display(), "loading templates from disk");
                registry.register_source(namespace, DirSource::new(dir), &[TEMPLATE_PATTERN])?;
            }
            other => {
                if let Some(dir) = other {
                    tracing::warn!(
                        namespace,
                        dir = %dir.display(),
                        "template directory missing, using embedded templates"
                    );
                }
                registry.register_source(
                    namespace,
                    EmbeddedSource::new(files),
                    &[TEMPLATE_PATTERN],
                )?;
            }
        }
    }

    Ok(registry)
}
