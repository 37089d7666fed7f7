// crates/remotely-core/src/url_builder.rs
// ============================================================================
// Module: URL Builder
// Description: Builds request URLs from app entries and path templates.
// Purpose: Substitute host attributes into paths and layer query parameters.
// Dependencies: url, serde_json
// ============================================================================

//! ## Overview
//! URL construction is pure: no I/O, deterministic for a given app entry,
//! template, attribute values, and parameter layers.
//!
//! Path templates accept two placeholder forms, both resolved through
//! [`AttributeSource`]:
//! - `{attr}` anywhere inside a segment (`/widgets/{id}.json`);
//! - a whole segment `:attr` (`/widgets/:id`).
//!
//! Substituted values are percent-encoded as path segments. A segment that
//! renders as `.` or `..` is rejected so no value can walk out of the
//! declared path. Query parameters
//! are merged from the global defaults, the association's own parameters,
//! and call-site overrides; later layers win on key collision.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use url::Url;

use crate::error::RemotelyError;
use crate::record::AttributeSource;
use crate::registry::AppEntry;
use crate::registry::QueryParams;

// ============================================================================
// SECTION: Parameter Layers
// ============================================================================

/// Query parameter layers in increasing precedence.
#[derive(Debug, Clone, Copy)]
pub struct ParamLayers<'a> {
    /// Global default parameters from the registry.
    pub defaults: &'a QueryParams,
    /// Parameters declared on the association.
    pub association: &'a QueryParams,
    /// Call-site overrides.
    pub overrides: &'a QueryParams,
}

impl ParamLayers<'_> {
    /// Merges the layers; later layers overwrite earlier keys.
    #[must_use]
    pub fn merged(&self) -> QueryParams {
        let mut merged = self.defaults.clone();
        for layer in [self.association, self.overrides] {
            merged.extend(layer.iter().map(|(key, value)| (key.clone(), value.clone())));
        }
        merged
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builds the full request URL for a path template.
///
/// # Errors
///
/// Returns [`RemotelyError::MissingAttribute`] when a placeholder cannot be
/// filled, [`RemotelyError::InvalidUrl`] for malformed templates, and
/// [`RemotelyError::UrlHost`] when the result has no host.
pub fn build_url<S>(
    app: &AppEntry,
    template: &str,
    host: &S,
    params: ParamLayers<'_>,
) -> Result<Url, RemotelyError>
where
    S: AttributeSource + ?Sized,
{
    let raw = format!("{}{}", app.base(), app.path());
    let mut url = Url::parse(&raw).map_err(|err| RemotelyError::InvalidUrl {
        url: raw.clone(),
        reason: err.to_string(),
    })?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(RemotelyError::UrlHost {
            url: raw,
        });
    }
    let segments = substitute_segments(template, host)?;
    {
        let mut path = url.path_segments_mut().map_err(|()| RemotelyError::UrlHost {
            url: raw.clone(),
        })?;
        path.pop_if_empty();
        path.extend(segments.iter().map(String::as_str));
    }
    let merged = params.merged();
    if !merged.is_empty() {
        url.query_pairs_mut().extend_pairs(merged.iter());
    }
    Ok(url)
}

/// Splits a template into path segments with placeholders filled in.
///
/// Empty segments (leading, trailing, or doubled `/`) are dropped.
///
/// # Errors
///
/// Returns [`RemotelyError`] when a placeholder is unterminated or unresolved,
/// or when a segment renders as a dot segment.
pub fn substitute_segments<S>(template: &str, host: &S) -> Result<Vec<String>, RemotelyError>
where
    S: AttributeSource + ?Sized,
{
    template
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let rendered = match segment.strip_prefix(':') {
                Some(name) if !name.is_empty() => render_attribute(host, name)?,
                _ => substitute_braces(template, segment, host)?,
            };
            if is_dot_segment(&rendered) {
                return Err(RemotelyError::InvalidUrl {
                    url: template.to_string(),
                    reason: format!("path segment `{segment}` renders as a dot segment"),
                });
            }
            Ok(rendered)
        })
        .collect()
}

/// Checks a declared path template before it is stored.
///
/// Query strings and fragments belong in association parameters, and literal
/// dot segments are not allowed.
///
/// # Errors
///
/// Returns [`RemotelyError::InvalidUrl`] when the template contains `?` or
/// `#`, a literal `.` or `..` segment, or an unterminated placeholder.
pub fn validate_template(template: &str) -> Result<(), RemotelyError> {
    if template.contains(['?', '#']) {
        return Err(RemotelyError::InvalidUrl {
            url: template.to_string(),
            reason: "path templates cannot carry a query or fragment; declare query \
                     parameters with AssociationDecl::param"
                .to_string(),
        });
    }
    if template.split('/').any(is_dot_segment) {
        return Err(RemotelyError::InvalidUrl {
            url: template.to_string(),
            reason: "path templates cannot contain `.` or `..` segments".to_string(),
        });
    }
    placeholder_names(template).map(|_| ())
}

/// Returns true for the relative path segments `.` and `..`.
fn is_dot_segment(segment: &str) -> bool {
    matches!(segment, "." | "..")
}

/// Lists the attribute names referenced by a template, in order of appearance.
///
/// # Errors
///
/// Returns [`RemotelyError::InvalidUrl`] when a `{` placeholder is unterminated.
pub fn placeholder_names(template: &str) -> Result<Vec<String>, RemotelyError> {
    let mut names = Vec::new();
    for segment in template.split('/').filter(|segment| !segment.is_empty()) {
        if let Some(name) = segment.strip_prefix(':')
            && !name.is_empty()
        {
            names.push(name.to_string());
            continue;
        }
        let mut rest = segment;
        while let Some(start) = rest.find('{') {
            let after = &rest[start + 1 ..];
            let end = after.find('}').ok_or_else(|| RemotelyError::InvalidUrl {
                url: template.to_string(),
                reason: "unterminated path placeholder".to_string(),
            })?;
            names.push(after[.. end].to_string());
            rest = &after[end + 1 ..];
        }
    }
    Ok(names)
}

/// Replaces `{attr}` placeholders inside one segment.
fn substitute_braces<S>(template: &str, segment: &str, host: &S) -> Result<String, RemotelyError>
where
    S: AttributeSource + ?Sized,
{
    let mut rendered = String::with_capacity(segment.len());
    let mut rest = segment;
    while let Some(start) = rest.find('{') {
        rendered.push_str(&rest[.. start]);
        let after = &rest[start + 1 ..];
        let end = after.find('}').ok_or_else(|| RemotelyError::InvalidUrl {
            url: template.to_string(),
            reason: "unterminated path placeholder".to_string(),
        })?;
        rendered.push_str(&render_attribute(host, &after[.. end])?);
        rest = &after[end + 1 ..];
    }
    rendered.push_str(rest);
    Ok(rendered)
}

/// Renders a scalar attribute value as URL text.
///
/// # Errors
///
/// Returns [`RemotelyError::MissingAttribute`] for absent, empty, or
/// non-scalar values.
pub fn render_attribute<S>(host: &S, name: &str) -> Result<String, RemotelyError>
where
    S: AttributeSource + ?Sized,
{
    let rendered = match host.attribute(name) {
        Some(Value::String(text)) => text,
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        Some(Value::Null | Value::Array(_) | Value::Object(_)) | None => String::new(),
    };
    if rendered.is_empty() {
        return Err(RemotelyError::MissingAttribute {
            attribute: name.to_string(),
        });
    }
    Ok(rendered)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
