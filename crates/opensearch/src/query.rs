//! Query builders and search response shaping.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Fuzzy match of free text against every field.
pub fn multi_match(query_string: &str) -> Value {
    json!({
        "query": {
            "multi_match": {
                "query": query_string,
                "fields": ["*"],
                "fuzziness": "AUTO"
            }
        }
    })
}

/// A single search hit, flattened from the `_id`/`_score`/`_source` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: Option<String>,
    pub score: Option<f64>,
    pub document: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub total_hits: u64,
    pub results: Vec<SearchHit>,
}

impl SearchResults {
    /// Extract hits from a raw `_search` response. Missing sections yield an
    /// empty result rather than an error.
    pub fn from_response(response: &Value) -> Self {
        let hits = &response["hits"];

        // `total` is an object on 7.x+ and a bare number on older clusters
        let total_hits = match &hits["total"] {
            Value::Object(total) => total.get("value").and_then(Value::as_u64).unwrap_or(0),
            Value::Number(n) => n.as_u64().unwrap_or(0),
            _ => 0,
        };

        let results = hits["hits"]
            .as_array()
            .map(|hits| {
                hits.iter()
                    .map(|hit| SearchHit {
                        id: hit["_id"].as_str().map(str::to_string),
                        score: hit["_score"].as_f64(),
                        document: hit.get("_source").cloned(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self { total_hits, results }
    }
}
