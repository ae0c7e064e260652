//! Postman-style collection artifacts
//!
//! A template provides one `Add <kind>` item per kind and a `Login` item.
//! Rendering copies the kind's item once per request, replaces
//! `request.body.raw` with the pretty-printed payload and appends the login
//! item. Loading reverses this: every raw `Add <kind>` body becomes a
//! pending request again.

use crate::core::build::RequestBatch;
use crate::core::layout::{atomic_write, ApiLayout};
use crate::domain::{DatasetName, Kind, PendingRequest, Result, UploaderError};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const LOGIN_ITEM: &str = "Login";

/// A collection template
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionTemplate {
    info: Option<Value>,
    items: Vec<Value>,
}

impl CollectionTemplate {
    /// Load a template file
    ///
    /// # Errors
    ///
    /// Fails when the file can't be read, isn't JSON, has no `item` array or
    /// no `Login` item.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            UploaderError::Template(format!("Failed to read template {}: {e}", path.display()))
        })?;
        let document: Value = serde_json::from_str(&text).map_err(|e| {
            UploaderError::Template(format!("Template {} is not valid JSON: {e}", path.display()))
        })?;

        let template = Self::from_document(document)
            .map_err(|e| UploaderError::Template(format!("{}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "Loaded collection template");
        Ok(template)
    }

    fn from_document(document: Value) -> std::result::Result<Self, String> {
        let items = document
            .get("item")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| "template has no 'item' array".to_string())?;

        let template = Self {
            info: document.get("info").cloned(),
            items,
        };
        template
            .login_item()
            .ok_or_else(|| format!("template has no '{LOGIN_ITEM}' item"))?;
        Ok(template)
    }

    /// The template used when no template file is configured
    pub fn builtin() -> Self {
        let add_item = |kind: Kind, endpoint: &str| {
            json!({
                "name": kind.item_name(),
                "request": {
                    "method": "POST",
                    "header": [
                        {"key": "Content-Type", "value": "application/json"},
                        {"key": "Authorization", "value": "{{token}}"}
                    ],
                    "body": {
                        "mode": "raw",
                        "raw": "",
                        "options": {"raw": {"language": "json"}}
                    },
                    "url": {
                        "raw": format!("{{{{base_url}}}}/{endpoint}"),
                        "host": ["{{base_url}}"],
                        "path": [endpoint]
                    }
                }
            })
        };

        Self {
            info: Some(json!({
                "name": "PhiDB",
                "schema": "https://schema.getpostman.com/json/collection/v2.1.0/collection.json"
            })),
            items: vec![
                add_item(Kind::Patient, "patients"),
                add_item(Kind::Acquisition, "imaging_acquisitions"),
                add_item(Kind::Feature, "features"),
                json!({
                    "name": LOGIN_ITEM,
                    "request": {
                        "method": "POST",
                        "header": [{"key": "Content-Type", "value": "application/json"}],
                        "body": {
                            "mode": "raw",
                            "raw": "{\n    \"email\": \"{{email}}\",\n    \"password\": \"{{password}}\"\n}",
                            "options": {"raw": {"language": "json"}}
                        },
                        "url": {
                            "raw": "{{base_url}}/auth/sign_in",
                            "host": ["{{base_url}}"],
                            "path": ["auth", "sign_in"]
                        }
                    }
                }),
            ],
        }
    }

    /// Use the template at `path`, or the built-in one
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::builtin()),
        }
    }

    fn item(&self, name: &str) -> Option<&Value> {
        self.items
            .iter()
            .rev()
            .find(|item| item.get("name").and_then(Value::as_str) == Some(name))
    }

    fn login_item(&self) -> Option<&Value> {
        self.item(LOGIN_ITEM)
    }

    /// Render the collection document of one kind
    ///
    /// # Errors
    ///
    /// Fails when the template has no item for `kind`.
    pub fn render<'a>(
        &self,
        kind: Kind,
        requests: impl IntoIterator<Item = &'a PendingRequest>,
    ) -> Result<String> {
        let item_name = kind.item_name();
        let template_item = self.item(&item_name).ok_or_else(|| {
            UploaderError::Template(format!("template has no '{item_name}' item"))
        })?;
        let login = self
            .login_item()
            .ok_or_else(|| UploaderError::Template(format!("template has no '{LOGIN_ITEM}' item")))?;

        let mut items = Vec::new();
        for request in requests {
            let mut item = template_item.clone();
            let raw = pretty_json(&Value::Object(request.payload.clone()))?;
            set_raw_body(&mut item, raw)
                .map_err(|e| UploaderError::Template(format!("'{item_name}' item: {e}")))?;
            items.push(item);
        }
        items.push(login.clone());

        let mut document = Map::new();
        if let Some(info) = &self.info {
            document.insert("info".to_string(), info.clone());
        }
        document.insert("item".to_string(), Value::Array(items));

        pretty_json(&Value::Object(document))
    }
}

fn set_raw_body(item: &mut Value, raw: String) -> std::result::Result<(), String> {
    let request = item
        .get_mut("request")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| "missing 'request' object".to_string())?;
    let body = request
        .entry("body")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| "'request.body' is not an object".to_string())?;

    body.insert("mode".to_string(), Value::String("raw".to_string()));
    body.insert("raw".to_string(), Value::String(raw));
    Ok(())
}

/// JSON with four-space indentation
pub(crate) fn pretty_json(value: &impl Serialize) -> Result<String> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    String::from_utf8(buffer).map_err(|e| UploaderError::Serialization(e.to_string()))
}

/// Render and write the collection of every kind present in `batch`
///
/// All documents are rendered before the first is written. Collections of
/// kinds without requests are removed so that a later `--skip-build` run
/// sees exactly this batch.
pub fn write_collections(
    layout: &ApiLayout,
    batch: &RequestBatch,
    template: &CollectionTemplate,
) -> Result<Vec<PathBuf>> {
    let dataset = batch.dataset();
    let mut rendered = Vec::new();
    let mut stale = Vec::new();

    for kind in Kind::ALL {
        let path = layout.collection_path(dataset, kind);
        if batch.of_kind(kind).next().is_none() {
            stale.push(path);
            continue;
        }
        rendered.push((path, template.render(kind, batch.of_kind(kind))?));
    }

    let mut written = Vec::with_capacity(rendered.len());
    for (path, document) in rendered {
        atomic_write(&path, document.as_bytes())?;
        tracing::info!(path = %path.display(), "Wrote collection");
        written.push(path);
    }

    for path in stale.into_iter().filter(|p| p.exists()) {
        fs::remove_file(&path)?;
        tracing::debug!(path = %path.display(), "Removed stale collection");
    }

    Ok(written)
}

/// Load the batch stored in the collections of `dataset`
///
/// # Errors
///
/// Fails when no collection exists or an item's raw body isn't a JSON
/// object with a `remote_id`.
pub fn load_batch(layout: &ApiLayout, dataset: &DatasetName) -> Result<RequestBatch> {
    let mut requests = Vec::new();
    let mut found = false;

    for kind in Kind::ALL {
        let path = layout.collection_path(dataset, kind);
        if !path.exists() {
            continue;
        }
        found = true;
        let loaded = load_payloads(&path, kind)?
            .into_iter()
            .map(|payload| PendingRequest::from_payload(kind, dataset, payload))
            .collect::<Result<Vec<_>>>()?;
        tracing::info!(path = %path.display(), requests = loaded.len(), "Loaded collection");
        requests.extend(loaded);
    }

    if !found {
        return Err(UploaderError::Input(format!(
            "No collections for dataset '{dataset}' under {}; run build first",
            layout.api_dir().display()
        )));
    }

    Ok(RequestBatch::new(dataset.clone(), requests))
}

fn load_payloads(path: &Path, kind: Kind) -> Result<Vec<Map<String, Value>>> {
    let text = fs::read_to_string(path)?;
    let document: Value = serde_json::from_str(&text)?;
    let item_name = kind.item_name();

    let items = document
        .get("item")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            UploaderError::Serialization(format!("{} has no 'item' array", path.display()))
        })?;

    let mut payloads = Vec::new();
    for item in items {
        if item.get("name").and_then(Value::as_str) != Some(item_name.as_str()) {
            continue;
        }
        let body = item.pointer("/request/body");
        if body.and_then(|b| b.get("mode")).and_then(Value::as_str) != Some("raw") {
            continue;
        }
        let raw = body
            .and_then(|b| b.get("raw"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        match serde_json::from_str::<Value>(raw)? {
            Value::Object(payload) => payloads.push(payload),
            other => {
                return Err(UploaderError::Serialization(format!(
                    "'{item_name}' body in {} is not a JSON object: {other}",
                    path.display()
                )))
            }
        }
    }

    Ok(payloads)
}
