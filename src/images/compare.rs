use std::sync::Arc;

use serde_json::{json, Value};

use crate::errors::DriverResult;
use crate::images::template::encode_image;
use crate::protocol::response::{parse_find_result, parse_match_result, parse_similarity_result};
use crate::protocol::transport::{Endpoint, Transport};
use crate::protocol::types::{
    ComparisonMode, FeatureMatchOptions, FindOccurrenceResult, MatchResult, OccurrenceOptions,
    SimilarityOptions, SimilarityResult,
};

/// Issues server-side image comparisons and validates the results.
#[derive(Clone)]
pub struct ImageComparator {
    transport: Arc<dyn Transport>,
}

impl ImageComparator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn compare_images(
        &self,
        first: &[u8],
        second: &[u8],
        options: &FeatureMatchOptions,
    ) -> DriverResult<MatchResult> {
        let raw = self
            .request(
                ComparisonMode::MatchFeatures,
                &encode_image(first, "first image")?,
                &encode_image(second, "second image")?,
                serde_json::to_value(options)?,
            )
            .await?;
        parse_match_result(raw)
    }

    pub async fn find_image_occurrence(
        &self,
        full: &[u8],
        partial: &[u8],
        options: &OccurrenceOptions,
    ) -> DriverResult<FindOccurrenceResult> {
        self.match_template(
            &encode_image(full, "full image")?,
            &encode_image(partial, "partial image")?,
            options,
        )
        .await
    }

    pub async fn images_similarity(
        &self,
        first: &[u8],
        second: &[u8],
        options: &SimilarityOptions,
    ) -> DriverResult<SimilarityResult> {
        let raw = self
            .request(
                ComparisonMode::GetSimilarity,
                &encode_image(first, "first image")?,
                &encode_image(second, "second image")?,
                serde_json::to_value(options)?,
            )
            .await?;
        parse_similarity_result(raw)
    }

    /// Template search on already encoded images. Always asks for every
    /// occurrence so the result carries the ranked candidate list.
    pub(crate) async fn match_template(
        &self,
        full_b64: &str,
        partial_b64: &str,
        options: &OccurrenceOptions,
    ) -> DriverResult<FindOccurrenceResult> {
        let mut opts = serde_json::to_value(options)?;
        opts["multiple"] = Value::Bool(true);
        let raw = self
            .request(ComparisonMode::MatchTemplate, full_b64, partial_b64, opts)
            .await?;
        parse_find_result(raw)
    }

    async fn request(
        &self,
        mode: ComparisonMode,
        first_b64: &str,
        second_b64: &str,
        options: Value,
    ) -> DriverResult<Value> {
        let params = json!({
            "mode": mode,
            "firstImage": first_b64,
            "secondImage": second_b64,
            "options": options,
        });
        self.transport.call(Endpoint::CompareImages, params).await
    }
}
