/// Find-by-image: locate a template on the current screen through the wait
/// engine and mint element handles from the ranked candidates.
use std::sync::Arc;

use serde_json::Value;

use crate::errors::{DriverError, DriverResult, ErrorKind};
use crate::images::compare::ImageComparator;
use crate::images::element::ImageElement;
use crate::images::template::ImageTemplate;
use crate::protocol::transport::{Endpoint, Transport};
use crate::protocol::types::{FindOccurrenceResult, OccurrenceOptions};
use crate::wait::Wait;

/// Per-lookup knobs, taken from the session settings at call time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FindOptions {
    pub threshold: f64,
    pub visualize: bool,
}

#[derive(Clone)]
pub struct ImageFinder {
    transport: Arc<dyn Transport>,
    comparator: ImageComparator,
}

impl ImageFinder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            comparator: ImageComparator::new(transport.clone()),
            transport,
        }
    }

    /// One remote find-by-image call: grab the screen, then template-match
    /// against it. No retries.
    pub async fn find_once(
        &self,
        template: &ImageTemplate,
        options: FindOptions,
    ) -> DriverResult<FindOccurrenceResult> {
        let screenshot = match self.transport.call(Endpoint::Screenshot, Value::Null).await? {
            Value::String(s) if !s.is_empty() => s,
            other => {
                return Err(DriverError::malformed(format!(
                    "screenshot must be a non-empty base64 string, got {other}"
                )))
            }
        };
        let occurrence = OccurrenceOptions {
            threshold: Some(options.threshold),
            match_neighbour_threshold: None,
            visualize: options.visualize,
        };
        self.comparator
            .match_template(&screenshot, template.base64(), &occurrence)
            .await
    }

    /// Polls until at least one candidate shows up. Deadline expiry is
    /// reported as [`DriverError::ElementNotFound`].
    pub async fn find_all(
        &self,
        template: &ImageTemplate,
        options: FindOptions,
        wait: &Wait,
    ) -> DriverResult<FindOccurrenceResult> {
        let result = wait
            .clone()
            .ignoring(ErrorKind::TransientNotFound)
            .message(format!("Waiting for {template}"))
            .until(|| self.find_once(template, options))
            .await;

        match result {
            Ok(found) => {
                tracing::debug!(
                    candidates = found.multiple.len(),
                    best_score = ?found.best().map(|c| c.score),
                    "template located"
                );
                Ok(found)
            }
            Err(DriverError::WaitTimeout { timeout, elapsed, last_error, .. }) => {
                Err(DriverError::ElementNotFound {
                    template: template.clone(),
                    timeout,
                    elapsed,
                    last_error,
                })
            }
            Err(e) => Err(e),
        }
    }

    pub async fn find_element(
        &self,
        template: &ImageTemplate,
        options: FindOptions,
        wait: &Wait,
    ) -> DriverResult<ImageElement> {
        let found = self.find_all(template, options, wait).await?;
        let FindOccurrenceResult { multiple, visualization, .. } = found;
        let best = multiple.first().ok_or_else(|| {
            DriverError::malformed("find-by-image succeeded without any candidate")
        })?;
        Ok(ImageElement::from_candidate(template.clone(), 0, best, visualization))
    }

    /// One element per candidate, in server rank order.
    pub async fn find_elements(
        &self,
        template: &ImageTemplate,
        options: FindOptions,
        wait: &Wait,
    ) -> DriverResult<Vec<ImageElement>> {
        let found = self.find_all(template, options, wait).await?;
        Ok(found
            .multiple
            .iter()
            .enumerate()
            .map(|(rank, candidate)| {
                ImageElement::from_candidate(template.clone(), rank, candidate, found.visualization.clone())
            })
            .collect())
    }
}
