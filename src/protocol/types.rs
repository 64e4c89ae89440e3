use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Bounding box as reported by the server. Every field is optional on the
/// wire and is surfaced as-is so callers can tell missing data from zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            width: Some(width),
            height: Some(height),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.x.is_some() && self.y.is_some() && self.width.is_some() && self.height.is_some()
    }

    /// Centre point, or `None` when any coordinate is missing.
    pub fn center(&self) -> Option<Point> {
        match (self.x, self.y, self.width, self.height) {
            (Some(x), Some(y), Some(w), Some(h)) => Some(Point {
                x: x + w / 2.0,
                y: y + h / 2.0,
            }),
            _ => None,
        }
    }

    /// True when every field is within `tolerance` of `other`. A field missing
    /// on one side only counts as a mismatch.
    pub fn approx_eq(&self, other: &Rect, tolerance: f64) -> bool {
        fn close(a: Option<f64>, b: Option<f64>, tol: f64) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => (a - b).abs() <= tol,
                (None, None) => true,
                _ => false,
            }
        }
        close(self.x, other.x, tolerance)
            && close(self.y, other.y, tolerance)
            && close(self.width, other.width, tolerance)
            && close(self.height, other.height, tolerance)
    }
}

/// Feature-matching comparison of two images.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub points1: Vec<Point>,
    pub rect1: Rect,
    pub points2: Vec<Point>,
    pub rect2: Rect,
    pub total_count: u64,
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualization: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OccurrenceCandidate {
    pub rect: Rect,
    pub score: f64,
}

/// Template search result. `multiple` keeps the server's rank order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FindOccurrenceResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rect: Option<Rect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualization: Option<Vec<u8>>,
    pub multiple: Vec<OccurrenceCandidate>,
}

impl FindOccurrenceResult {
    pub fn is_empty(&self) -> bool {
        self.multiple.is_empty()
    }

    /// Highest ranked candidate.
    pub fn best(&self) -> Option<&OccurrenceCandidate> {
        self.multiple.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityResult {
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualization: Option<Vec<u8>>,
}

/// Server-side image comparison modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComparisonMode {
    MatchFeatures,
    MatchTemplate,
    GetSimilarity,
}

/// Options for [`ComparisonMode::MatchFeatures`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureMatchOptions {
    /// Keypoint detector, e.g. `ORB` (server default) or `AKAZE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detector_name: Option<String>,
    /// Matching function, e.g. `BruteForce` or `FlannBased`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_func: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub good_matches_factor: Option<u32>,
    #[serde(default)]
    pub visualize: bool,
}

/// Options for [`ComparisonMode::MatchTemplate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccurrenceOptions {
    /// Minimum score in `[0, 1]` for a region to count as a match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Pixel distance under which neighbouring matches are merged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_neighbour_threshold: Option<u32>,
    #[serde(default)]
    pub visualize: bool,
}

/// Options for [`ComparisonMode::GetSimilarity`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimilarityOptions {
    #[serde(default)]
    pub visualize: bool,
}
