//! Placeholder Templates
//!
//! Bootstrap scripts are Handlebars templates with `{{name}}` placeholders.
//! Rendering is strict (an unknown placeholder is an error) and unescaped, so
//! values land in the shell text byte for byte. Single braces and `${VAR}`
//! pass through untouched.

use handlebars::{no_escape, Handlebars, RenderError, RenderErrorReason};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("{template}: invalid template syntax: {reason}")]
    Syntax { template: String, reason: String },

    #[error("{template}: no value for placeholder '{placeholder}'")]
    MissingValue {
        template: String,
        placeholder: String,
    },

    #[error("{template}: render failed: {reason}")]
    Render { template: String, reason: String },

    #[error("failed to read template {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A compiled template
#[derive(Clone)]
pub struct Template {
    name: String,
    registry: Arc<Handlebars<'static>>,
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template").field("name", &self.name).finish()
    }
}

impl Template {
    /// Compile `source`; `name` is only used in error messages
    pub fn parse(name: impl Into<String>, source: &str) -> Result<Self, TemplateError> {
        let name = name.into();
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(no_escape);
        registry
            .register_template_string(&name, source)
            .map_err(|e| TemplateError::Syntax {
                template: name.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            name,
            registry: Arc::new(registry),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fail unless every placeholder is among `available`
    pub fn check<'a, I>(&self, available: I) -> Result<(), TemplateError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let blanks: BTreeMap<String, String> = available
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|key| (key.to_string(), String::new()))
            .collect();
        self.render(&blanks).map(|_| ())
    }

    /// Substitute every placeholder
    pub fn render(&self, values: &BTreeMap<String, String>) -> Result<String, TemplateError> {
        self.registry
            .render(&self.name, values)
            .map_err(|e| self.render_error(e))
    }

    fn render_error(&self, err: RenderError) -> TemplateError {
        match err.reason() {
            RenderErrorReason::MissingVariable(path) => TemplateError::MissingValue {
                template: self.name.clone(),
                placeholder: path.clone().unwrap_or_default(),
            },
            _ => TemplateError::Render {
                template: self.name.clone(),
                reason: err.to_string(),
            },
        }
    }
}

/// Everything after the first line, lines re-joined with `\n`
///
/// Used to drop the shebang of a script appended to another one.
pub fn without_first_line(text: &str) -> String {
    text.lines().skip(1).collect::<Vec<_>>().join("\n")
}
