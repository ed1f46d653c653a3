//! Field schema built from the CRM's custom-field definitions.
//!
//! A definition is a JSON object like
//!
//! ```json
//! {"FIELD_NAME": "UF_CRM_1", "USER_TYPE_ID": "enumeration", "MULTIPLE": "N",
//!  "EDIT_FORM_LABEL": {"ru": "Источник"}, "LIST": [{"ID": "3", "VALUE": "Web"}]}
//! ```
//!
//! Each one becomes a [`FieldDescriptor`] whose [`FieldKind`] is decided here,
//! once per run, so decoding never re-inspects the type tag.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

/// Locale whose label is used for descriptors.
pub const DEFAULT_LABEL_LOCALE: &str = "ru";

/// How values of a field are decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Choice id to display label.
    Enumeration(HashMap<String, String>),
    /// `"Y"` is true, anything else false.
    Boolean,
    Passthrough,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub code: String,
    pub label: String,
    pub kind: FieldKind,
    pub is_multiple: bool,
}

impl FieldDescriptor {
    /// The choice table, present only for enumeration fields.
    pub fn enum_map(&self) -> Option<&HashMap<String, String>> {
        match &self.kind {
            FieldKind::Enumeration(choices) => Some(choices),
            _ => None,
        }
    }
}

/// Descriptors keyed by field code, iterated in definition order.
#[derive(Debug, Clone, Default)]
pub struct FieldSchema {
    fields: Vec<FieldDescriptor>,
    index: HashMap<String, usize>,
}

impl FieldSchema {
    pub fn build(definitions: &[Value]) -> Self {
        Self::build_with_locale(definitions, DEFAULT_LABEL_LOCALE)
    }

    /// Build a schema, taking labels from `locale`.
    ///
    /// Definitions without a usable code are dropped. A repeated code replaces
    /// the earlier descriptor in place.
    pub fn build_with_locale(definitions: &[Value], locale: &str) -> Self {
        let mut schema = FieldSchema::default();
        let mut dropped = 0usize;

        for definition in definitions {
            match descriptor_from_definition(definition, locale) {
                Some(descriptor) => schema.insert(descriptor),
                None => dropped += 1,
            }
        }

        debug!(
            fields = schema.len(),
            dropped, "Built field schema from definitions"
        );
        schema
    }

    fn insert(&mut self, descriptor: FieldDescriptor) {
        match self.index.get(&descriptor.code) {
            Some(&position) => self.fields[position] = descriptor,
            None => {
                self.index
                    .insert(descriptor.code.clone(), self.fields.len());
                self.fields.push(descriptor);
            }
        }
    }

    pub fn get(&self, code: &str) -> Option<&FieldDescriptor> {
        self.index.get(code).map(|&i| &self.fields[i])
    }

    pub fn contains(&self, code: &str) -> bool {
        self.index.contains_key(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn descriptor_from_definition(definition: &Value, locale: &str) -> Option<FieldDescriptor> {
    let code = non_empty_str(definition.get("FIELD_NAME"))
        .or_else(|| non_empty_str(definition.get("XML_ID")))?
        .to_owned();

    let label = definition
        .get("EDIT_FORM_LABEL")
        .and_then(|labels| labels.get(locale))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| code.clone());

    let kind = match definition.get("USER_TYPE_ID").and_then(Value::as_str) {
        Some("enumeration") => FieldKind::Enumeration(choice_table(definition.get("LIST"))),
        Some("boolean") => FieldKind::Boolean,
        _ => FieldKind::Passthrough,
    };

    let is_multiple = definition.get("MULTIPLE").and_then(Value::as_str) == Some("Y");

    Some(FieldDescriptor {
        code,
        label,
        kind,
        is_multiple,
    })
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn choice_table(list: Option<&Value>) -> HashMap<String, String> {
    let Some(choices) = list.and_then(Value::as_array) else {
        return HashMap::new();
    };

    choices
        .iter()
        .filter_map(|choice| {
            let id = scalar_key(choice.get("ID")?)?;
            let label = match choice.get("VALUE")? {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((id, label))
        })
        .collect()
}

/// String form of a choice id; numbers and strings only.
pub(crate) fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
