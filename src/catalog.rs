//! Model catalog
//!
//! OpenAI-compatible servers disagree on how `/models` is shaped. The listing
//! is classified into a `ModelListShape` first, then flattened into a sorted
//! list of `ModelDescriptor`s.

use crate::error::Result;
use crate::providers::{CompletionEndpoint, Connection};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A model offered by the endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Model identifier, never empty
    pub id: String,
    /// Owning organization, when reported
    pub owned_by: Option<String>,
}

/// Recognized shapes of a model listing payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModelListShape<'a> {
    /// `{"data": [...]}`, the OpenAI shape
    Data(&'a Value),
    /// `{"models": [...]}`
    Models(&'a Value),
    /// `{"<id>": {...}, ...}`
    Mapping(&'a Map<String, Value>),
    /// `[...]`
    Array(&'a [Value]),
    /// Anything else
    Unrecognized,
}

impl<'a> ModelListShape<'a> {
    /// Classify a payload by field presence
    ///
    /// Objects are checked for `data` first, then `models`; any other object
    /// is treated as an id to descriptor mapping.
    pub fn of(payload: &'a Value) -> Self {
        match payload {
            Value::Object(map) if map.contains_key("data") => Self::Data(&map["data"]),
            Value::Object(map) if map.contains_key("models") => Self::Models(&map["models"]),
            Value::Object(map) => Self::Mapping(map),
            Value::Array(items) => Self::Array(items),
            _ => Self::Unrecognized,
        }
    }

    /// Descriptors in payload order
    pub fn descriptors(&self) -> Vec<ModelDescriptor> {
        match self {
            Self::Data(collection) | Self::Models(collection) => match collection {
                Value::Array(items) => items.iter().filter_map(|i| descriptor(i, None)).collect(),
                Value::Null => Vec::new(),
                other => {
                    tracing::debug!("Model collection is not a list: {}", other);
                    Vec::new()
                }
            },
            Self::Mapping(map) => map
                .iter()
                .filter_map(|(key, value)| descriptor(value, Some(key)))
                .collect(),
            Self::Array(items) => items.iter().filter_map(|i| descriptor(i, None)).collect(),
            Self::Unrecognized => Vec::new(),
        }
    }
}

fn non_empty_str<'v>(item: &'v Map<String, Value>, field: &str) -> Option<&'v str> {
    item.get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

fn descriptor(item: &Value, key: Option<&String>) -> Option<ModelDescriptor> {
    let item = item.as_object()?;
    let id = non_empty_str(item, "id")
        .or_else(|| non_empty_str(item, "model"))
        .or_else(|| key.map(String::as_str).filter(|k| !k.is_empty()))?;

    Some(ModelDescriptor {
        id: id.to_string(),
        owned_by: item
            .get("owned_by")
            .and_then(|v| v.as_str())
            .map(str::to_string),
    })
}

/// Flatten any recognized listing into descriptors sorted by id
///
/// Entries without a usable id are dropped; duplicates are kept.
///
/// # Examples
///
/// ```
/// use parley::catalog::normalize_model_list;
/// use serde_json::json;
///
/// let models = normalize_model_list(&json!({"data": [{"id": "b"}, {"model": "a"}, {}]}));
/// let ids: Vec<_> = models.iter().map(|m| m.id.as_str()).collect();
/// assert_eq!(ids, ["a", "b"]);
/// ```
pub fn normalize_model_list(payload: &Value) -> Vec<ModelDescriptor> {
    let mut models = ModelListShape::of(payload).descriptors();
    models.sort_by(|a, b| a.id.cmp(&b.id));
    models
}

/// Fetch and normalize the endpoint's model list
///
/// # Errors
///
/// Returns `ParleyError::Upstream` when the endpoint call fails
pub async fn list_models(
    endpoint: &dyn CompletionEndpoint,
    connection: &Connection,
) -> Result<Vec<ModelDescriptor>> {
    let payload = endpoint.list_models(connection).await?;
    let models = normalize_model_list(&payload);
    tracing::debug!(
        "Endpoint {} lists {} models",
        connection.base_url,
        models.len()
    );
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeEndpoint;
    use serde_json::json;

    fn expected() -> Vec<ModelDescriptor> {
        vec![
            ModelDescriptor {
                id: "magistral-small-2509".to_string(),
                owned_by: Some("mistral".to_string()),
            },
            ModelDescriptor {
                id: "qwen/qwen3-30b-a3b-2507".to_string(),
                owned_by: None,
            },
        ]
    }

    #[test]
    fn test_all_shapes_normalize_identically() {
        let qwen = json!({"id": "qwen/qwen3-30b-a3b-2507"});
        let magistral = json!({"id": "magistral-small-2509", "owned_by": "mistral"});

        let shapes = [
            json!({"object": "list", "data": [qwen, magistral]}),
            json!({"models": [qwen, magistral]}),
            json!({"qwen/qwen3-30b-a3b-2507": qwen, "magistral-small-2509": magistral}),
            json!([qwen, magistral]),
        ];

        for shape in &shapes {
            assert_eq!(normalize_model_list(shape), expected(), "shape {}", shape);
        }
    }

    #[test]
    fn test_shape_classification() {
        assert!(matches!(
            ModelListShape::of(&json!({"data": [], "models": []})),
            ModelListShape::Data(_)
        ));
        assert!(matches!(
            ModelListShape::of(&json!({"models": []})),
            ModelListShape::Models(_)
        ));
        assert!(matches!(
            ModelListShape::of(&json!({})),
            ModelListShape::Mapping(_)
        ));
        assert!(matches!(ModelListShape::of(&json!([])), ModelListShape::Array(_)));
        assert_eq!(ModelListShape::of(&json!("x")), ModelListShape::Unrecognized);
    }

    #[test]
    fn test_mapping_key_is_fallback_id() {
        let models = normalize_model_list(&json!({
            "llama-3": {"owned_by": "meta"},
            "ignored": "not an object"
        }));
        assert_eq!(
            models,
            vec![ModelDescriptor {
                id: "llama-3".to_string(),
                owned_by: Some("meta".to_string()),
            }]
        );
    }

    #[test]
    fn test_entries_without_id_are_dropped() {
        let models = normalize_model_list(&json!([
            {"id": ""},
            {"id": 5},
            "bare-string",
            null,
            {"model": "m1"}
        ]));
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].id, "m1");
    }

    #[test]
    fn test_duplicates_are_kept() {
        let models = normalize_model_list(&json!({"data": [{"id": "a"}, {"id": "a"}]}));
        assert_eq!(models.len(), 2);
    }

    #[test]
    fn test_non_list_collection_is_empty() {
        assert!(normalize_model_list(&json!({"data": null})).is_empty());
        assert!(normalize_model_list(&json!({"data": {"id": "x"}})).is_empty());
        assert!(normalize_model_list(&json!(42)).is_empty());
    }

    #[test]
    fn test_descriptor_serializes_null_owner() {
        let value = serde_json::to_value(&expected()[1]).unwrap();
        assert_eq!(value, json!({"id": "qwen/qwen3-30b-a3b-2507", "owned_by": null}));
    }

    #[tokio::test]
    async fn test_list_models_uses_endpoint() {
        let endpoint = FakeEndpoint::new().with_models(json!({"data": [{"id": "z"}, {"id": "y"}]}));
        let connection = Connection::new("http://localhost:1234/v1", "lm-studio");
        let models = list_models(&endpoint, &connection).await.unwrap();
        let ids: Vec<_> = models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["y", "z"]);
    }

    #[tokio::test]
    async fn test_list_models_propagates_upstream_error() {
        let endpoint = FakeEndpoint::new().failing("Endpoint returned error 401: bad key");
        let connection = Connection::new("http://localhost:1234/v1", "nope");
        let err = list_models(&endpoint, &connection).await.unwrap_err();
        assert_eq!(err.to_string(), "Endpoint returned error 401: bad key");
    }
}
