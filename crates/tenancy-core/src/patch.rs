//! Merge-patch of client payloads onto stored documents.
//!
//! A patch is a JSON object. Keys present in the patch replace the stored
//! value (objects merge recursively), keys set to `null` are removed, and
//! keys absent from the patch are left alone. Identity fields (`_id`,
//! `_rev`, `datatype`, `tenantId`, the timestamps, and any kind-specific
//! [`Document::IDENTITY_FIELDS`]) always keep their stored values.

use serde_json::{Map, Value};
use tenancy_types::{Document, Rev, META_IDENTITY_FIELDS};

use crate::error::{CoreError, CoreResult};

/// A parsed patch body.
#[derive(Clone, Debug, PartialEq)]
pub struct MergePatch {
    body: Map<String, Value>,
}

impl MergePatch {
    /// Parse a raw request body.
    ///
    /// An empty body, malformed JSON, and any non-object value are all
    /// [`CoreError::BadRequest`].
    pub fn parse(raw: &[u8]) -> CoreResult<Self> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(CoreError::BadRequest("patch body is empty".into()));
        }
        let value: Value = serde_json::from_slice(raw)
            .map_err(|e| CoreError::BadRequest(format!("patch body is not valid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// A `_rev` that is present but neither a string nor null is
    /// [`CoreError::BadRequest`].
    pub fn from_value(value: Value) -> CoreResult<Self> {
        match value {
            Value::Object(body) => {
                match body.get("_rev") {
                    None | Some(Value::Null) | Some(Value::String(_)) => {}
                    Some(other) => {
                        return Err(CoreError::BadRequest(format!(
                            "_rev must be a string, got {}",
                            json_type(other)
                        )));
                    }
                }
                Ok(Self { body })
            }
            Value::Null => Err(CoreError::BadRequest("patch body is null".into())),
            other => Err(CoreError::BadRequest(format!(
                "patch body must be a JSON object, got {}",
                json_type(&other)
            ))),
        }
    }

    /// The revision the client claims to have read, if it sent one. An empty
    /// or null `_rev` counts as not sent.
    pub fn stated_rev(&self) -> Option<Rev> {
        match self.body.get("_rev") {
            Some(Value::String(rev)) if !rev.is_empty() => Some(Rev::new(rev.clone())),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.body.keys().map(String::as_str)
    }
}

/// Apply `patch` to `current`, returning the merged document.
///
/// The result keeps every identity field of `current`. A patch whose values
/// do not fit the document's shape is [`CoreError::BadRequest`].
pub fn apply_patch<T: Document>(current: &T, patch: &MergePatch) -> CoreResult<T> {
    let stored = serde_json::to_value(current)
        .map_err(|e| CoreError::Internal(format!("failed to serialize {}: {e}", T::KIND)))?;

    let mut merged = stored.clone();
    merge_into(&mut merged, &Value::Object(patch.body.clone()));

    if let (Value::Object(out), Value::Object(original)) = (&mut merged, &stored) {
        for field in META_IDENTITY_FIELDS.iter().chain(T::IDENTITY_FIELDS) {
            match original.get(*field) {
                Some(value) => {
                    out.insert((*field).to_string(), value.clone());
                }
                None => {
                    out.remove(*field);
                }
            }
        }
    }

    serde_json::from_value(merged).map_err(|e| {
        CoreError::BadRequest(format!(
            "patch does not fit {}: {e}",
            T::KIND.display_name()
        ))
    })
}

/// RFC 7386 merge of `patch` into `target`.
pub fn merge_into(target: &mut Value, patch: &Value) {
    let Value::Object(entries) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(map) = target {
        for (key, value) in entries {
            if value.is_null() {
                map.remove(key);
            } else {
                merge_into(map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
