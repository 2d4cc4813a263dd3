//! Job template loading and slot binding.
//!
//! A job template is a ComfyUI API-format workflow: a JSON object keyed by
//! node ID whose values are node objects (`class_type`, `inputs`, ...).
//! The template is treated as opaque except for a handful of designated
//! input slots, which receive backend asset names before submission.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Key inside a node object that holds its parameters.
const INPUTS_KEY: &str = "inputs";

/// Parameter of a `LoadImage` node that receives the backend asset name.
pub const IMAGE_INPUT_FIELD: &str = "image";

// ---------------------------------------------------------------------------
// Slot identifiers
// ---------------------------------------------------------------------------

/// Node ID of a parametrizable input slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotId(String);

impl SlotId {
    /// Create a slot ID, rejecting empty or whitespace-only values.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(CoreError::InvalidSlot {
                slot: id,
                reason: "slot id must not be empty".to_string(),
            });
        }
        Ok(Self(id))
    }

    /// Slot ID from a compile-time literal.
    pub fn from_static(id: &'static str) -> Self {
        debug_assert!(!id.trim().is_empty(), "slot id literal must not be blank");
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered slot → backend-name assignments for a single job.
///
/// Bindings are applied in insertion order, which callers keep aligned
/// with their configured slot order.
#[derive(Debug, Clone, Default)]
pub struct SlotBindings(Vec<(SlotId, String)>);

impl SlotBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, slot: SlotId, backend_name: impl Into<String>) {
        self.0.push((slot, backend_name.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SlotId, &str)> {
        self.0.iter().map(|(slot, name)| (slot, name.as_str()))
    }

    pub fn slots(&self) -> impl Iterator<Item = &SlotId> {
        self.0.iter().map(|(slot, _)| slot)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(SlotId, String)> for SlotBindings {
    fn from_iter<I: IntoIterator<Item = (SlotId, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// A single-use job description keyed by node ID.
///
/// Node order is preserved exactly as loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct JobTemplate {
    nodes: Map<String, Value>,
}

impl JobTemplate {
    /// Read and parse a template document from disk.
    ///
    /// Fails with [`CoreError::TemplateNotFound`] when the file cannot be
    /// read and [`CoreError::TemplateMalformed`] when its content is not a
    /// keyed mapping of node objects.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path)
            .await
            .map_err(|e| CoreError::TemplateNotFound {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Self::from_json_slice(&raw)
    }

    /// Parse a template from JSON text.
    pub fn from_json_str(raw: &str) -> Result<Self, CoreError> {
        Self::from_json_slice(raw.as_bytes())
    }

    /// Parse a template from raw JSON bytes.
    pub fn from_json_slice(raw: &[u8]) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_slice(raw)
            .map_err(|e| CoreError::TemplateMalformed(format!("invalid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Validate the shape of an already-parsed document.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        let Value::Object(nodes) = value else {
            return Err(CoreError::TemplateMalformed(
                "top-level value must be an object keyed by node id".to_string(),
            ));
        };

        if let Some((id, _)) = nodes.iter().find(|(_, node)| !node.is_object()) {
            return Err(CoreError::TemplateMalformed(format!(
                "node '{id}' is not an object"
            )));
        }

        Ok(Self { nodes })
    }

    /// Number of nodes in the template.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains_slot(&self, slot: &SlotId) -> bool {
        self.nodes.contains_key(slot.as_str())
    }

    /// Look up a node by ID.
    pub fn node(&self, id: &str) -> Option<&Value> {
        self.nodes.get(id)
    }

    /// Check that every slot exists and has an `inputs` object.
    pub fn validate_slots<'a>(
        &self,
        slots: impl IntoIterator<Item = &'a SlotId>,
    ) -> Result<(), CoreError> {
        for slot in slots {
            let node = self
                .nodes
                .get(slot.as_str())
                .ok_or_else(|| CoreError::UnknownSlot(slot.to_string()))?;

            if !node.get(INPUTS_KEY).is_some_and(Value::is_object) {
                return Err(CoreError::InvalidSlot {
                    slot: slot.to_string(),
                    reason: format!("node has no '{INPUTS_KEY}' object"),
                });
            }
        }
        Ok(())
    }

    /// Write each binding's backend name into `template[slot].inputs.image`.
    ///
    /// All slots are validated before anything is written, so a failed
    /// bind leaves the template untouched.
    pub fn bind(&mut self, bindings: &SlotBindings) -> Result<(), CoreError> {
        self.validate_slots(bindings.slots())?;

        for (slot, backend_name) in bindings.iter() {
            let inputs = self
                .nodes
                .get_mut(slot.as_str())
                .and_then(|node| node.get_mut(INPUTS_KEY))
                .and_then(Value::as_object_mut)
                .ok_or_else(|| CoreError::UnknownSlot(slot.to_string()))?;

            inputs.insert(
                IMAGE_INPUT_FIELD.to_string(),
                Value::String(backend_name.to_string()),
            );
        }
        Ok(())
    }

    /// Consume the template, yielding the raw JSON document.
    pub fn into_value(self) -> Value {
        Value::Object(self.nodes)
    }
}
