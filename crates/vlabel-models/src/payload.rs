//! Structured query payloads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::unit::WorkUnitKind;

/// Required number of entries per payload field.
pub const ITEMS_PER_FIELD: usize = 3;

/// Placeholder entry substituted when the service refuses the content.
pub const BLOCKED_PLACEHOLDER: &str = "content blocked";

/// Validation failure for a service response.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' has {got} entries, expected {expected}")]
    WrongArity {
        field: &'static str,
        got: usize,
        expected: usize,
    },
}

/// The structured result of one generation call: a fixed set of named
/// string-array fields, three entries each.
///
/// Stored as a sorted map so serialized records and manifests are
/// byte-stable across reruns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct QueryPayload(pub BTreeMap<String, Vec<String>>);

impl QueryPayload {
    /// Validate this payload against the field contract for `kind`.
    ///
    /// Extra fields are tolerated (the service occasionally echoes metadata);
    /// missing fields and wrong arities are not.
    pub fn validate(&self, kind: WorkUnitKind) -> Result<(), PayloadError> {
        for field in kind.query_fields().iter().copied() {
            let entries = self.0.get(field).ok_or(PayloadError::MissingField(field))?;
            if entries.len() != ITEMS_PER_FIELD {
                return Err(PayloadError::WrongArity {
                    field,
                    got: entries.len(),
                    expected: ITEMS_PER_FIELD,
                });
            }
        }
        Ok(())
    }

    /// The fixed placeholder payload recorded for moderation-blocked units.
    pub fn blocked_placeholder(kind: WorkUnitKind) -> Self {
        let map = kind
            .query_fields()
            .iter()
            .map(|field| {
                (
                    (*field).to_string(),
                    vec![BLOCKED_PLACEHOLDER.to_string(); ITEMS_PER_FIELD],
                )
            })
            .collect();
        Self(map)
    }
}
