//! Corpus loading.
//!
//! A corpus snapshot is a JSON array of opportunity records, each optionally
//! carrying an `embedding` array. Bad embeddings never fail the load: the
//! record is kept and simply has no vector.

use std::path::PathBuf;

use serde_json::Value;

use crate::opportunity::Item;

/// Errors that can occur when loading a whole corpus.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("Failed to read corpus {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse corpus {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Corpus {0} is not a JSON array")]
    NotAnArray(PathBuf),
}

/// Supplies the candidate items for ranking.
pub trait CorpusSource {
    fn load(&self) -> Result<Vec<Item>, CorpusError>;
}

/// Corpus stored as a JSON file on disk.
pub struct JsonCorpus {
    path: PathBuf,
}

impl JsonCorpus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CorpusSource for JsonCorpus {
    fn load(&self) -> Result<Vec<Item>, CorpusError> {
        let data = std::fs::read_to_string(&self.path).map_err(|source| CorpusError::Io {
            path: self.path.clone(),
            source,
        })?;

        let value = parse_corpus(&data).map_err(|source| CorpusError::Parse {
            path: self.path.clone(),
            source,
        })?;

        let Value::Array(records) = value else {
            return Err(CorpusError::NotAnArray(self.path.clone()));
        };

        let items: Vec<Item> = records.into_iter().map(item_from_record).collect();
        let with_vectors = items.iter().filter(|i| i.embedding.is_some()).count();

        log::info!(
            "Loaded {} opportunities ({} with embeddings) from {}",
            items.len(),
            with_vectors,
            self.path.display()
        );

        Ok(items)
    }
}

/// Parse a corpus snapshot.
///
/// Snapshots written by Python's `json.dump` may contain `NaN`, `Infinity`
/// and numbers beyond `f64` range, which strict JSON rejects. Those files are
/// re-read with the lenient JSON5 reader, where such numbers become `null`
/// (or infinite, then dropped by [`parse_embedding`]) instead of failing the
/// whole load. The strict error is kept when both readers fail.
fn parse_corpus(data: &str) -> Result<Value, serde_json::Error> {
    match serde_json::from_str(data) {
        Ok(value) => Ok(value),
        Err(strict) => match json5::from_str::<Value>(data) {
            Ok(value) => {
                log::warn!("Corpus is not strict JSON ({strict}), loaded leniently");
                Ok(value)
            }
            Err(_) => Err(strict),
        },
    }
}

/// Split a record into its display payload and its embedding.
///
/// The `embedding` field is removed from the payload whether or not it is usable.
pub fn item_from_record(mut record: Value) -> Item {
    let embedding = match record.as_object_mut() {
        Some(fields) => fields.remove("embedding").and_then(parse_embedding),
        None => None,
    };
    Item::new(record, embedding)
}

fn parse_embedding(value: Value) -> Option<Vec<f32>> {
    let Value::Array(components) = value else {
        return None;
    };
    if components.is_empty() {
        return None;
    }

    components
        .iter()
        .map(|c| {
            c.as_f64()
                .map(|x| x as f32)
                .filter(|x| x.is_finite())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_from_record_strips_embedding() {
        let item = item_from_record(json!({
            "activity_name": "Art Camp",
            "embedding": [0.25, -0.5, 1]
        }));

        assert_eq!(item.embedding, Some(vec![0.25, -0.5, 1.0]));
        assert_eq!(item.payload, json!({"activity_name": "Art Camp"}));
    }

    #[test]
    fn test_unusable_embeddings_become_absent() {
        let records = vec![
            json!({"activity_name": "a"}),
            json!({"activity_name": "b", "embedding": null}),
            json!({"activity_name": "c", "embedding": []}),
            json!({"activity_name": "d", "embedding": "0.1,0.2"}),
            json!({"activity_name": "e", "embedding": [0.1, "x", 0.3]}),
            json!({"activity_name": "f", "embedding": [1e300, 0.1]}),
        ];

        for record in records {
            let item = item_from_record(record);
            assert!(item.embedding.is_none(), "expected no vector for {}", item.label());
            assert!(item.payload.get("embedding").is_none());
        }
    }

    #[test]
    fn test_non_object_record_kept_without_vector() {
        let item = item_from_record(json!("just a string"));
        assert!(item.embedding.is_none());
        assert_eq!(item.payload, json!("just a string"));
    }

    #[test]
    fn test_load_json_corpus() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("corpus.json");
        std::fs::write(
            &path,
            json!([
                {"activity_name": "Swim", "embedding": [1.0, 0.0]},
                {"activity_name": "Chess"},
                {"activity_name": "Soccer", "embedding": [0.0, 1.0]}
            ])
            .to_string(),
        )
        .unwrap();

        let items = JsonCorpus::new(&path).load().unwrap();

        assert_eq!(items.len(), 3);
        let labels: Vec<&str> = items.iter().map(|i| i.label()).collect();
        assert_eq!(labels, vec!["Swim", "Chess", "Soccer"]);
        assert!(items[1].embedding.is_none());
    }

    #[test]
    fn test_load_tolerates_non_finite_numbers() {
        let tmp = tempfile::tempdir().unwrap();

        for token in ["NaN", "Infinity", "-Infinity", "1e400"] {
            let path = tmp.path().join("corpus.json");
            std::fs::write(
                &path,
                format!(
                    r#"[{{"activity_name":"bad","embedding":[{token},0.1]}},{{"activity_name":"good","embedding":[1.0,0.0]}}]"#
                ),
            )
            .unwrap();

            let items = JsonCorpus::new(&path).load().unwrap();

            assert_eq!(items.len(), 2, "{token}");
            assert_eq!(items[0].label(), "bad");
            assert!(items[0].embedding.is_none(), "{token}");
            assert!(items[0].payload.get("embedding").is_none());
            assert_eq!(items[1].embedding, Some(vec![1.0, 0.0]), "{token}");
        }
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let result = JsonCorpus::new(tmp.path().join("nope.json")).load();
        assert!(matches!(result, Err(CorpusError::Io { .. })));
    }

    #[test]
    fn test_load_rejects_non_array() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("corpus.json");
        std::fs::write(&path, r#"{"activity_name": "Swim"}"#).unwrap();

        let result = JsonCorpus::new(&path).load();
        assert!(matches!(result, Err(CorpusError::NotAnArray(_))));
    }

    #[test]
    fn test_load_rejects_invalid_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("corpus.json");
        std::fs::write(&path, "[{").unwrap();

        let result = JsonCorpus::new(&path).load();
        assert!(matches!(result, Err(CorpusError::Parse { .. })));
    }
}
