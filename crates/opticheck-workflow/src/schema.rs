//! Profile field kinds and edit sanitization.
//!
//! Each editable field has a kind decided before any edit is seen: either
//! declared in `contrib/schema/profile.toml`, or taken from the type of the
//! value stored in the profile. Submitted text is then coerced to that kind.
//! A submitted value never changes a field's kind.

use crate::profile::{FieldValue, ProfileRecord, IDENTITY_FIELD};
use serde::Deserialize;
use thiserror::Error;

const BUILTIN_SCHEMA: &str = include_str!("../../../contrib/schema/profile.toml");

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("invalid schema document: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("field {field:?}: {reason}")]
    InvalidField { field: String, reason: String },
}

/// How a field is edited.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Join key to the face-matcher label. Never editable.
    Identity,
    Integer { min: i64, max: i64 },
    Real { min: f64, max: f64 },
    Text { max_len: usize },
    Choice { options: Vec<String> },
}

impl FieldKind {
    /// Coerce a submitted value to this kind.
    ///
    /// Numbers are clamped into range; integers drop any fraction. Text is trimmed and truncated. A value
    /// that cannot be read as this kind falls back to `previous`. `None` means
    /// the field must not be written.
    pub fn sanitize(&self, input: &FieldValue, previous: Option<&FieldValue>) -> Option<FieldValue> {
        match self {
            FieldKind::Identity => None,
            FieldKind::Integer { min, max } => input
                .as_number()
                .map(|n| FieldValue::Integer(n.clamp(*min as f64, *max as f64).trunc() as i64))
                .or_else(|| previous.cloned()),
            FieldKind::Real { min, max } => input
                .as_number()
                .map(|n| FieldValue::Real(n.clamp(*min, *max)))
                .or_else(|| previous.cloned()),
            FieldKind::Text { max_len } => {
                let text = input.to_string();
                let truncated: String = text.trim().chars().take(*max_len).collect();
                Some(FieldValue::Text(truncated.trim_end().to_string()))
            }
            FieldKind::Choice { options } => {
                let text = input.to_string();
                let wanted = text.trim();
                options
                    .iter()
                    .find(|o| o.eq_ignore_ascii_case(wanted))
                    .map(|o| FieldValue::Text(o.clone()))
                    .or_else(|| previous.cloned())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct SchemaDocument {
    generic: GenericBand,
    #[serde(default, rename = "field")]
    fields: Vec<FieldEntry>,
}

#[derive(Debug, Deserialize)]
struct GenericBand {
    min: f64,
    max: f64,
    text_max_len: usize,
}

#[derive(Debug, Deserialize)]
struct FieldEntry {
    name: String,
    kind: String,
    min: Option<f64>,
    max: Option<f64>,
    max_len: Option<usize>,
    options: Option<Vec<String>>,
}

impl FieldEntry {
    fn into_kind(self, generic: &GenericBand) -> Result<(String, FieldKind), SchemaError> {
        let invalid = |reason: &str| SchemaError::InvalidField {
            field: self.name.clone(),
            reason: reason.to_string(),
        };
        let min = self.min.unwrap_or(generic.min);
        let max = self.max.unwrap_or(generic.max);
        if min > max {
            return Err(invalid("min is greater than max"));
        }

        let kind = match self.kind.as_str() {
            "identity" => FieldKind::Identity,
            "integer" => FieldKind::Integer { min: min as i64, max: max as i64 },
            "real" => FieldKind::Real { min, max },
            "text" => FieldKind::Text { max_len: self.max_len.unwrap_or(generic.text_max_len) },
            "choice" => match &self.options {
                Some(options) if !options.is_empty() => FieldKind::Choice { options: options.clone() },
                _ => return Err(invalid("choice needs at least one option")),
            },
            other => return Err(invalid(&format!("unknown kind {other:?}"))),
        };
        Ok((self.name, kind))
    }
}

/// Declared field kinds plus the bands used for undeclared fields.
#[derive(Debug, Clone)]
pub struct ProfileSchema {
    declared: Vec<(String, FieldKind)>,
    generic_min: f64,
    generic_max: f64,
    text_max_len: usize,
}

impl ProfileSchema {
    /// The schema shipped with the crate.
    pub fn builtin() -> Result<Self, SchemaError> {
        Self::from_toml(BUILTIN_SCHEMA)
    }

    pub fn from_toml(src: &str) -> Result<Self, SchemaError> {
        let doc: SchemaDocument = toml::from_str(src)?;
        if doc.generic.min > doc.generic.max {
            return Err(SchemaError::InvalidField {
                field: "generic".into(),
                reason: "min is greater than max".into(),
            });
        }
        let declared = doc
            .fields
            .into_iter()
            .map(|entry| entry.into_kind(&doc.generic))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            declared,
            generic_min: doc.generic.min,
            generic_max: doc.generic.max,
            text_max_len: doc.generic.text_max_len,
        })
    }

    /// Kind of `field`, given the value currently held for it.
    ///
    /// The identity field is always [`FieldKind::Identity`], declared or not.
    pub fn kind_for(&self, field: &str, current: Option<&FieldValue>) -> FieldKind {
        if field == IDENTITY_FIELD {
            return FieldKind::Identity;
        }
        if let Some((_, kind)) = self.declared.iter().find(|(name, _)| name == field) {
            return kind.clone();
        }
        match current {
            Some(FieldValue::Integer(_)) => FieldKind::Integer {
                min: self.generic_min as i64,
                max: self.generic_max as i64,
            },
            Some(FieldValue::Real(_)) => FieldKind::Real {
                min: self.generic_min,
                max: self.generic_max,
            },
            _ => FieldKind::Text { max_len: self.text_max_len },
        }
    }

    /// Sanitize one submitted edit against `profile`. `None` means drop it.
    pub fn sanitize(&self, profile: &ProfileRecord, field: &str, input: &FieldValue) -> Option<FieldValue> {
        let current = profile.get(field);
        self.kind_for(field, current).sanitize(input, current)
    }
}
