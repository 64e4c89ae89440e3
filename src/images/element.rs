use std::sync::OnceLock;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use regex::Regex;

use crate::errors::{DriverError, DriverResult};
use crate::images::template::ImageTemplate;
use crate::protocol::types::{OccurrenceCandidate, Point, Rect};

pub const IMAGE_ELEMENT_PREFIX: &str = "appium-image-element-";

/// True for ids minted by this client rather than by the server.
pub fn is_image_element_id(id: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^appium-image-element-[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
                .expect("static regex")
        })
        .is_match(id)
}

/// A screen region located by template search, addressed by a synthetic id.
#[derive(Debug, Clone)]
pub struct ImageElement {
    id: String,
    template: ImageTemplate,
    /// Index of the backing candidate in the server's ranked list.
    rank: usize,
    rect: Rect,
    score: f64,
    visualization: Option<Vec<u8>>,
    found_at: DateTime<Utc>,
}

impl ImageElement {
    pub(crate) fn from_candidate(
        template: ImageTemplate,
        rank: usize,
        candidate: &OccurrenceCandidate,
        visualization: Option<Vec<u8>>,
    ) -> Self {
        Self {
            id: format!("{IMAGE_ELEMENT_PREFIX}{}", uuid::Uuid::new_v4()),
            template,
            rank,
            rect: candidate.rect,
            score: candidate.score,
            visualization,
            found_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn template(&self) -> &ImageTemplate {
        &self.template
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn visualization(&self) -> Option<&[u8]> {
        self.visualization.as_deref()
    }

    pub fn found_at(&self) -> DateTime<Utc> {
        self.found_at
    }

    pub(crate) fn refresh(&mut self, candidate: &OccurrenceCandidate) {
        self.rect = candidate.rect;
        self.score = candidate.score;
    }

    /// Tap target. Fails when the server left part of the geometry out.
    pub fn center(&self) -> DriverResult<Point> {
        self.rect.center().ok_or_else(|| {
            DriverError::malformed(format!("element '{}' has incomplete geometry: {:?}", self.id, self.rect))
        })
    }

    /// Image elements only expose `score` and `visual`.
    pub fn attribute(&self, name: &str) -> DriverResult<Option<String>> {
        match name {
            "score" => Ok(Some(self.score.to_string())),
            "visual" => Ok(self
                .visualization
                .as_ref()
                .map(|v| base64::engine::general_purpose::STANDARD.encode(v))),
            other => Err(DriverError::Unsupported {
                command: format!("attribute '{other}'"),
                platform: "image elements".into(),
            }),
        }
    }
}
