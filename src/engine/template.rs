//! Build recipe rendering.
//!
//! [`TemplateRenderer`] is the seam through which the build-context assembler
//! materialises the conductor `Dockerfile`. The built-in
//! [`PlaceholderRenderer`] substitutes `{{ name }}` placeholders and refuses
//! to guess: an undefined variable or an unterminated placeholder is an error.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;

use crate::error::{BuildError, ConductorError};

/// Variables available to a template, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderVariables {
    values: BTreeMap<String, String>,
}

impl RenderVariables {
    /// Create an empty variable set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a variable.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Look up a variable.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Where a template is read from and where its output is written.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    /// Directory holding the template.
    pub template_dir: &'a Utf8Path,
    /// Template file name within `template_dir`.
    pub template_name: &'a str,
    /// Directory receiving the rendered file.
    pub output_dir: &'a Utf8Path,
    /// Output file name within `output_dir`.
    pub output_name: &'a str,
}

/// Renders a template file with variable substitution.
pub trait TemplateRenderer {
    /// Render the requested template and write the result.
    ///
    /// Returns the path of the written file.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::TemplateRenderFailed` if the template cannot be
    /// read or rendered, or the output cannot be written.
    fn render(
        &self,
        request: &RenderRequest<'_>,
        variables: &RenderVariables,
    ) -> Result<Utf8PathBuf, ConductorError>;
}

const UNSUPPORTED_TAGS: [&str; 2] = ["{%", "{#"];

/// Strict `{{ name }}` placeholder renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderRenderer;

impl PlaceholderRenderer {
    /// Render template text in memory.
    ///
    /// # Errors
    ///
    /// Returns a description of the first undefined variable, malformed
    /// placeholder, or unterminated `{{`. Jinja statement (`{% %}`) and
    /// comment (`{# #}`) tags are rejected rather than copied through.
    pub fn render_str(template: &str, variables: &RenderVariables) -> Result<String, String> {
        if let Some(tag) = UNSUPPORTED_TAGS.iter().find(|tag| template.contains(**tag)) {
            return Err(format!("unsupported template tag '{tag}'"));
        }

        let mut rendered = String::with_capacity(template.len());
        let mut rest = template;

        while let Some((literal, after_open)) = rest.split_once("{{") {
            rendered.push_str(literal);

            let Some((expression, after_close)) = after_open.split_once("}}") else {
                return Err(String::from("unterminated '{{' placeholder"));
            };

            let name = expression.trim();
            if !is_variable_name(name) {
                return Err(format!("invalid placeholder expression '{name}'"));
            }

            let value = variables
                .get(name)
                .ok_or_else(|| format!("undefined variable '{name}'"))?;
            rendered.push_str(value);
            rest = after_close;
        }

        rendered.push_str(rest);
        Ok(rendered)
    }
}

impl TemplateRenderer for PlaceholderRenderer {
    fn render(
        &self,
        request: &RenderRequest<'_>,
        variables: &RenderVariables,
    ) -> Result<Utf8PathBuf, ConductorError> {
        let render_error = |message: String| {
            ConductorError::from(BuildError::TemplateRenderFailed {
                template: String::from(request.template_name),
                message,
            })
        };

        let template_dir = Dir::open_ambient_dir(request.template_dir, ambient_authority())
            .map_err(|error| {
                render_error(format!(
                    "failed to open template directory '{}': {error}",
                    request.template_dir
                ))
            })?;
        let template = template_dir
            .read_to_string(request.template_name)
            .map_err(|error| render_error(format!("failed to read template: {error}")))?;

        let rendered = Self::render_str(&template, variables).map_err(render_error)?;

        let output_dir = Dir::open_ambient_dir(request.output_dir, ambient_authority())
            .map_err(|error| {
                render_error(format!(
                    "failed to open output directory '{}': {error}",
                    request.output_dir
                ))
            })?;
        output_dir
            .write(request.output_name, rendered)
            .map_err(|error| render_error(format!("failed to write rendered output: {error}")))?;

        tracing::debug!(
            template = request.template_name,
            output = %request.output_dir.join(request.output_name),
            "rendered template"
        );
        Ok(request.output_dir.join(request.output_name))
    }
}

fn is_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
