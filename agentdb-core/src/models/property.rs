//! Open property bags and the known-key subset.
//!
//! Node properties are open JSON objects. Three keys carry engine
//! semantics and get typed accessors: `key` (uniqueness, upsert and
//! namespace inference), `namespace`, and `vectorId`.

use serde_json::{Map, Value};

/// An open string-keyed property map.
pub type Properties = Map<String, Value>;

/// Distinguished property driving upsert and namespace inference.
pub const KEY_PROPERTY: &str = "key";

/// Namespace override property.
pub const NAMESPACE_PROPERTY: &str = "namespace";

/// Back-reference to a vector-store entry.
pub const VECTOR_ID_PROPERTY: &str = "vectorId";

/// Key of the synthetic root node that absorbs would-be orphans.
pub const GRAPH_ROOT_KEY: &str = "graph:root";

/// Namespaces whose nodes auto-link to the graph root when no parent is
/// given.
pub const ROOT_NAMESPACES: [&str; 3] = ["project", "research", "patterns"];

/// The `key` property, when present and a string.
pub fn property_key(properties: &Properties) -> Option<&str> {
    properties.get(KEY_PROPERTY).and_then(Value::as_str)
}

/// The `vectorId` property, when present and a string.
pub fn property_vector_id(properties: &Properties) -> Option<&str> {
    properties.get(VECTOR_ID_PROPERTY).and_then(Value::as_str)
}

/// Namespace of a key: the segment before the first `/`.
/// Keys without a `/` have no namespace.
pub fn key_namespace(key: &str) -> Option<&str> {
    key.split_once('/').map(|(ns, _)| ns)
}

/// Shallow merge of `patch` into `target`: top-level keys overwrite,
/// everything else is left alone.
pub fn merge_properties(target: &mut Properties, patch: &Properties) {
    for (k, v) in patch {
        target.insert(k.clone(), v.clone());
    }
}
