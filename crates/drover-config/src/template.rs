//! Port-substituted path templates for pidfiles and logfiles.
//!
//! Templates follow the `%(port)s` placeholder convention used by the init
//! scripts this supervisor replaces, for example `/run/app-%(port)s.pid`.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Placeholder replaced with the decimal worker port.
pub const PORT_PLACEHOLDER: &str = "%(port)s";

/// Substitutes `port` for every placeholder occurrence in `template`.
#[must_use]
pub fn resolve(template: &str, port: u16) -> Utf8PathBuf {
    Utf8PathBuf::from(template.replace(PORT_PLACEHOLDER, &port.to_string()))
}

/// Validated path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
}

/// Literal text surrounding the first placeholder of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateParts<'a> {
    /// Text preceding the placeholder.
    pub prefix: &'a str,
    /// Text following the placeholder.
    pub suffix: &'a str,
}

impl PathTemplate {
    /// Parses a template, rejecting blank values.
    pub fn parse(field: &'static str, raw: &str) -> Result<Self, TemplateError> {
        if raw.trim().is_empty() {
            return Err(TemplateError::Empty { field });
        }
        Ok(Self {
            raw: raw.to_owned(),
        })
    }

    /// Raw template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns true when the template carries a port placeholder.
    #[must_use]
    pub fn has_placeholder(&self) -> bool {
        self.raw.contains(PORT_PLACEHOLDER)
    }

    /// Resolves the template for a concrete port.
    #[must_use]
    pub fn resolve(&self, port: u16) -> Utf8PathBuf {
        resolve(&self.raw, port)
    }

    /// Splits the template around its first placeholder.
    #[must_use]
    pub fn split_placeholder(&self) -> Option<TemplateParts<'_>> {
        self.raw
            .split_once(PORT_PLACEHOLDER)
            .map(|(prefix, suffix)| TemplateParts { prefix, suffix })
    }

    /// Ensures the template yields distinct paths for a pool of `workers`.
    pub fn ensure_distinct_for(&self, field: &'static str, workers: u16) -> Result<(), TemplateError> {
        if workers > 1 && !self.has_placeholder() {
            return Err(TemplateError::MissingPlaceholder {
                field,
                template: self.raw.clone(),
                workers,
            });
        }
        Ok(())
    }
}

/// Errors raised while validating path templates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// The template was configured but blank.
    #[error("{field} must not be empty")]
    Empty {
        /// Configuration field holding the template.
        field: &'static str,
    },
    /// Several workers would share one path.
    #[error(
        "{field} '{template}' must contain the %(port)s placeholder when {workers} workers are configured"
    )]
    MissingPlaceholder {
        /// Configuration field holding the template.
        field: &'static str,
        /// Offending template text.
        template: String,
        /// Configured pool size.
        workers: u16,
    },
}
