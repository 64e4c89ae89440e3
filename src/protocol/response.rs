/// Validation of image comparison payloads.
///
/// Each parser checks required fields explicitly instead of relying on serde
/// defaults, so a missing field is reported by name and nothing is invented.
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::errors::{DriverError, DriverResult};
use crate::protocol::types::{
    FindOccurrenceResult, MatchResult, OccurrenceCandidate, Point, Rect, SimilarityResult,
};

const MATCH_REQUIRED: [&str; 6] = ["points1", "rect1", "points2", "rect2", "totalCount", "count"];

pub fn parse_match_result(raw: Value) -> DriverResult<MatchResult> {
    let obj = as_object(raw, "match result")?;

    let missing: Vec<&str> = MATCH_REQUIRED
        .iter()
        .copied()
        .filter(|k| obj.get(*k).map_or(true, Value::is_null))
        .collect();
    if !missing.is_empty() {
        return Err(DriverError::malformed(format!(
            "match result is missing required field(s): {}",
            missing.join(", ")
        )));
    }

    let points1: Vec<Point> = field(&obj, "points1")?;
    let rect1: Rect = field(&obj, "rect1")?;
    let points2: Vec<Point> = field(&obj, "points2")?;
    let rect2: Rect = field(&obj, "rect2")?;
    let total_count: u64 = field(&obj, "totalCount")?;
    let count: u64 = field(&obj, "count")?;

    if count > total_count {
        return Err(DriverError::malformed(format!(
            "match result reports count {count} greater than totalCount {total_count}"
        )));
    }

    Ok(MatchResult {
        points1,
        rect1,
        points2,
        rect2,
        total_count,
        count,
        visualization: visualization(&obj)?,
    })
}

pub fn parse_find_result(raw: Value) -> DriverResult<FindOccurrenceResult> {
    let obj = as_object(raw, "occurrence result")?;

    let multiple = match obj.get("multiple") {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(rank, item)| parse_candidate(rank, item))
            .collect::<DriverResult<Vec<_>>>()?,
        Some(other) => {
            return Err(DriverError::malformed(format!(
                "occurrence result 'multiple' must be a sequence, got {}",
                json_type(other)
            )))
        }
        None => {
            return Err(DriverError::malformed(
                "occurrence result is missing required field: multiple",
            ))
        }
    };

    let rect: Option<Rect> = optional_field(&obj, "rect")?;
    let score: Option<f64> = optional_field(&obj, "score")?;

    if (rect.is_some() || score.is_some()) && multiple.is_empty() {
        return Err(DriverError::malformed(
            "occurrence result has a primary match but an empty 'multiple' list",
        ));
    }

    Ok(FindOccurrenceResult {
        rect,
        score,
        visualization: visualization(&obj)?,
        multiple,
    })
}

pub fn parse_similarity_result(raw: Value) -> DriverResult<SimilarityResult> {
    let obj = as_object(raw, "similarity result")?;
    let score: f64 = optional_field(&obj, "score")?
        .ok_or_else(|| DriverError::malformed("similarity result is missing required field: score"))?;
    Ok(SimilarityResult {
        score,
        visualization: visualization(&obj)?,
    })
}

fn parse_candidate(rank: usize, item: &Value) -> DriverResult<OccurrenceCandidate> {
    let obj = item.as_object().ok_or_else(|| {
        DriverError::malformed(format!("occurrence #{rank} must be an object, got {}", json_type(item)))
    })?;
    let rect: Rect = optional_field(obj, "rect")?
        .ok_or_else(|| DriverError::malformed(format!("occurrence #{rank} is missing 'rect'")))?;
    let score: f64 = optional_field(obj, "score")?
        .ok_or_else(|| DriverError::malformed(format!("occurrence #{rank} is missing 'score'")))?;
    Ok(OccurrenceCandidate { rect, score })
}

fn as_object(raw: Value, what: &str) -> DriverResult<Map<String, Value>> {
    match raw {
        Value::Object(map) => Ok(map),
        other => Err(DriverError::malformed(format!(
            "{what} must be an object, got {}",
            json_type(&other)
        ))),
    }
}

fn field<T: DeserializeOwned>(obj: &Map<String, Value>, key: &str) -> DriverResult<T> {
    optional_field(obj, key)?
        .ok_or_else(|| DriverError::malformed(format!("missing required field: {key}")))
}

fn optional_field<T: DeserializeOwned>(obj: &Map<String, Value>, key: &str) -> DriverResult<Option<T>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|e| DriverError::malformed(format!("field '{key}' has an unexpected shape: {e}"))),
    }
}

/// Decodes the base64 visualization when the server sent one. An empty
/// string is kept as an empty payload rather than treated as absent.
fn visualization(obj: &Map<String, Value>) -> DriverResult<Option<Vec<u8>>> {
    match obj.get("visualization") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(b64)) => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(b64.trim())
                .map_err(|e| DriverError::malformed(format!("visualization is not valid base64: {e}")))?;
            Ok(Some(bytes))
        }
        Some(other) => Err(DriverError::malformed(format!(
            "visualization must be a base64 string, got {}",
            json_type(other)
        ))),
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
