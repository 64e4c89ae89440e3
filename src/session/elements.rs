use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::{DriverError, DriverResult, ErrorKind};
use crate::images::element::ImageElement;
use crate::images::finder::FindOptions;
use crate::images::template::ImageTemplate;
use crate::protocol::transport::Endpoint;
use crate::protocol::types::{FindOccurrenceResult, Point, Rect};
use crate::session::platform::Capability;
use crate::session::Session;
use crate::settings::{Settings, TapStrategy};
use crate::wait::Wait;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: Option<f64>,
    pub y: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: Option<f64>,
    pub height: Option<f64>,
}

fn find_options(settings: &Settings) -> FindOptions {
    FindOptions {
        threshold: settings.image_match_threshold,
        visualize: settings.get_matched_image_result,
    }
}

impl Session {
    pub async fn find_element_by_image(&self, image: &[u8]) -> DriverResult<ImageElement> {
        self.find_element_by_image_with(image, &self.default_wait()).await
    }

    pub async fn find_element_by_image_with(&self, image: &[u8], wait: &Wait) -> DriverResult<ImageElement> {
        self.require(Capability::ImageElements, "find_element_by_image")?;
        let template = ImageTemplate::new(image)?;
        let settings = self.settings().await;
        let element = self.finder.find_element(&template, find_options(&settings), wait).await?;
        tracing::info!(id = element.id(), score = element.score(), "image element resolved");
        self.elements.insert(element.clone()).await;
        Ok(element)
    }

    pub async fn find_elements_by_image(&self, image: &[u8]) -> DriverResult<Vec<ImageElement>> {
        self.find_elements_by_image_with(image, &self.default_wait()).await
    }

    pub async fn find_elements_by_image_with(&self, image: &[u8], wait: &Wait) -> DriverResult<Vec<ImageElement>> {
        self.require(Capability::ImageElements, "find_elements_by_image")?;
        let template = ImageTemplate::new(image)?;
        let settings = self.settings().await;
        let elements = self.finder.find_elements(&template, find_options(&settings), wait).await?;
        tracing::info!(count = elements.len(), "image elements resolved");
        for element in &elements {
            self.elements.insert(element.clone()).await;
        }
        Ok(elements)
    }

    /// Cached handle without any staleness check.
    pub async fn element(&self, id: &str) -> DriverResult<ImageElement> {
        self.elements.get(id).await.ok_or_else(|| DriverError::StaleElement {
            id: id.to_string(),
            reason: "no such image element in this session".into(),
        })
    }

    /// Resolves `id` for a geometry or interaction query. With staleness
    /// checking on, re-runs the find once and compares the candidate at the
    /// element's original rank.
    async fn live_element(&self, id: &str) -> DriverResult<ImageElement> {
        let element = self.element(id).await?;
        let settings = self.settings().await;
        if !settings.check_for_image_element_staleness {
            return Ok(element);
        }

        let options = FindOptions {
            threshold: settings.image_match_threshold,
            visualize: false,
        };
        let found = match self.finder.find_once(element.template(), options).await {
            Ok(found) => found,
            Err(e) if e.kind() == ErrorKind::TransientNotFound => FindOccurrenceResult::default(),
            Err(e) => return Err(e),
        };

        let reason = match found.multiple.get(element.rank()) {
            None => format!(
                "template no longer matches at rank {} ({} candidate(s) found)",
                element.rank(),
                found.multiple.len()
            ),
            Some(c) if !c.rect.approx_eq(&element.rect(), settings.image_staleness_tolerance) => {
                format!("match moved from {:?} to {:?}", element.rect(), c.rect)
            }
            Some(c) => {
                let mut fresh = element.clone();
                fresh.refresh(c);
                if settings.auto_update_image_element_position
                    && !self.elements.replace_if_present(fresh.clone()).await
                {
                    tracing::debug!(id, "element dropped during staleness check, not re-registered");
                }
                return Ok(fresh);
            }
        };

        tracing::warn!(id, reason = %reason, "image element is stale");
        self.elements.remove(id).await;
        Err(DriverError::StaleElement {
            id: id.to_string(),
            reason,
        })
    }

    pub async fn element_rect(&self, id: &str) -> DriverResult<Rect> {
        Ok(self.live_element(id).await?.rect())
    }

    pub async fn element_location(&self, id: &str) -> DriverResult<Location> {
        let rect = self.element_rect(id).await?;
        Ok(Location { x: rect.x, y: rect.y })
    }

    pub async fn element_size(&self, id: &str) -> DriverResult<Size> {
        let rect = self.element_rect(id).await?;
        Ok(Size {
            width: rect.width,
            height: rect.height,
        })
    }

    pub async fn element_displayed(&self, id: &str) -> DriverResult<bool> {
        self.live_element(id).await.map(|_| true)
    }

    /// `score` and `visual` only; anything else is unsupported.
    pub async fn element_attribute(&self, id: &str, name: &str) -> DriverResult<Option<String>> {
        self.live_element(id).await?.attribute(name)
    }

    /// Taps the centre of the element using the configured tap strategy.
    pub async fn click_element(&self, id: &str) -> DriverResult<()> {
        let strategy = self.settings().await.image_element_tap_strategy;
        if strategy == TapStrategy::TouchActions {
            self.require(Capability::TouchActions, "touch actions tap")?;
        }
        let element = self.live_element(id).await?;
        let center = element.center()?;
        let (endpoint, params) = tap_request(strategy, center);
        tracing::debug!(id, x = center.x, y = center.y, ?strategy, "tapping image element");
        self.transport.call(endpoint, params).await?;
        Ok(())
    }
}

fn tap_request(strategy: TapStrategy, at: Point) -> (Endpoint, Value) {
    let (x, y) = (at.x.round() as i64, at.y.round() as i64);
    match strategy {
        TapStrategy::W3cActions => (
            Endpoint::PerformActions,
            json!({
                "actions": [{
                    "type": "pointer",
                    "id": "finger1",
                    "parameters": {"pointerType": "touch"},
                    "actions": [
                        {"type": "pointerMove", "duration": 0, "x": x, "y": y},
                        {"type": "pointerDown", "button": 0},
                        {"type": "pause", "duration": 125},
                        {"type": "pointerUp", "button": 0}
                    ]
                }]
            }),
        ),
        TapStrategy::TouchActions => (
            Endpoint::TouchPerform,
            json!({"actions": [{"action": "tap", "options": {"x": x, "y": y}}]}),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::platform::Platform;
    use crate::session::tests::session_on;
    use crate::testing::ScriptedTransport;
    use base64::Engine as _;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn candidate(x: f64, y: f64) -> Value {
        json!({"rect": {"x": x, "y": y, "width": 40.0, "height": 20.0}, "score": 0.93})
    }

    fn found(candidates: &[Value]) -> Value {
        json!({
            "rect": candidates[0]["rect"].clone(),
            "score": 0.93,
            "multiple": candidates
        })
    }

    fn ready(platform: Platform) -> (Arc<ScriptedTransport>, Session) {
        let (transport, session) = session_on(platform);
        transport.repeat(Endpoint::Screenshot, json!("c2NyZWVu"));
        (transport, session)
    }

    async fn settings_update(session: &Session, transport: &ScriptedTransport, update: Value) {
        transport.push(Endpoint::UpdateSettings, Ok(Value::Null));
        session
            .update_settings(update.as_object().cloned().unwrap())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_find_element_registers_handle() {
        let (transport, session) = ready(Platform::Android);
        transport.push(Endpoint::CompareImages, Ok(found(&[candidate(10.0, 10.0), candidate(90.0, 10.0)])));

        let element = session.find_element_by_image(b"tpl").await.unwrap();
        assert!(crate::images::element::is_image_element_id(element.id()));
        assert_eq!(element.rank(), 0);
        assert_eq!(session.element(element.id()).await.unwrap().rect(), element.rect());
    }

    #[tokio::test(start_paused = true)]
    async fn test_find_elements_preserve_rank() {
        let (transport, session) = ready(Platform::Ios);
        transport.push(
            Endpoint::CompareImages,
            Ok(found(&[candidate(90.0, 0.0), candidate(10.0, 0.0), candidate(50.0, 0.0)])),
        );

        let elements = session.find_elements_by_image(b"tpl").await.unwrap();
        let xs: Vec<Option<f64>> = elements.iter().map(|e| e.rect().x).collect();
        assert_eq!(xs, vec![Some(90.0), Some(10.0), Some(50.0)]);
        for e in &elements {
            assert!(session.element(e.id()).await.is_ok());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_element_not_found_after_timeout() {
        let (transport, session) = ready(Platform::Android);
        transport.repeat(Endpoint::CompareImages, json!({"multiple": []}));

        let start = Instant::now();
        let wait = Wait::new(Duration::from_secs(3)).interval(Duration::from_millis(400));
        let err = session.find_element_by_image_with(b"tpl", &wait).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ElementNotFound);
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert!(start.elapsed() < Duration::from_millis(3400));
        assert!(err.to_string().contains("template image (3 bytes"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_wait_comes_from_config() {
        let (transport, session) = ready(Platform::Android);
        transport.repeat(Endpoint::CompareImages, json!({"multiple": []}));

        let start = Instant::now();
        let err = session.find_elements_by_image(b"tpl").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ElementNotFound);
        assert_eq!(start.elapsed(), Duration::from_millis(5000));
        // 0, 500, ..., 5000
        assert_eq!(transport.call_count(Endpoint::CompareImages), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_when_match_moves() {
        let (transport, session) = ready(Platform::Android);
        transport.push(Endpoint::CompareImages, Ok(found(&[candidate(10.0, 10.0)])));
        let element = session.find_element_by_image(b"tpl").await.unwrap();

        transport.push(Endpoint::CompareImages, Ok(found(&[candidate(200.0, 10.0)])));
        let err = session.element_rect(element.id()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StaleElement);
        assert!(err.to_string().contains("moved"));

        // Evicted: later lookups fail without touching the server.
        let before = transport.call_count(Endpoint::CompareImages);
        assert_eq!(session.element_rect(element.id()).await.unwrap_err().kind(), ErrorKind::StaleElement);
        assert_eq!(transport.call_count(Endpoint::CompareImages), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_when_rank_disappears() {
        let (transport, session) = ready(Platform::Android);
        transport.push(Endpoint::CompareImages, Ok(found(&[candidate(10.0, 10.0), candidate(60.0, 10.0)])));
        let elements = session.find_elements_by_image(b"tpl").await.unwrap();

        transport.push(Endpoint::CompareImages, Ok(found(&[candidate(10.0, 10.0)])));
        let start = Instant::now();
        let err = session.element_displayed(elements[1].id()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StaleElement);
        assert!(err.to_string().contains("rank 1"));
        // Single shot, no polling.
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_drift_returns_fresh_geometry() {
        let (transport, session) = ready(Platform::Android);
        transport.push(Endpoint::CompareImages, Ok(found(&[candidate(10.0, 10.0)])));
        let element = session.find_element_by_image(b"tpl").await.unwrap();

        transport.push(Endpoint::CompareImages, Ok(found(&[candidate(12.0, 9.0)])));
        let rect = session.element_rect(element.id()).await.unwrap();
        assert_eq!(rect.x, Some(12.0));
        assert_eq!(rect.y, Some(9.0));
        // Position updates are off by default.
        assert_eq!(session.element(element.id()).await.unwrap().rect().x, Some(10.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_update_position() {
        let (transport, session) = ready(Platform::Android);
        settings_update(&session, &transport, json!({"autoUpdateImageElementPosition": true})).await;
        transport.push(Endpoint::CompareImages, Ok(found(&[candidate(10.0, 10.0)])));
        let element = session.find_element_by_image(b"tpl").await.unwrap();

        transport.push(Endpoint::CompareImages, Ok(found(&[candidate(13.0, 10.0)])));
        let location = session.element_location(element.id()).await.unwrap();
        assert_eq!(location, Location { x: Some(13.0), y: Some(10.0) });
        assert_eq!(session.element(element.id()).await.unwrap().rect().x, Some(13.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refind_with_no_match_is_stale() {
        let (transport, session) = ready(Platform::Android);
        transport.push(Endpoint::CompareImages, Ok(found(&[candidate(10.0, 10.0)])));
        let element = session.find_element_by_image(b"tpl").await.unwrap();

        transport.push(
            Endpoint::CompareImages,
            Err(DriverError::TransientNotFound("no match".into())),
        );
        let err = session.element_rect(element.id()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StaleElement);
        assert!(err.to_string().contains("0 candidate(s)"));
        assert!(session.element(element.id()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refind_failure_propagates_and_keeps_handle() {
        let (transport, session) = ready(Platform::Android);
        transport.push(Endpoint::CompareImages, Ok(found(&[candidate(10.0, 10.0)])));
        let element = session.find_element_by_image(b"tpl").await.unwrap();

        transport.push(
            Endpoint::CompareImages,
            Err(DriverError::SessionLost("gone".into())),
        );
        let err = session.element_rect(element.id()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionLost);
        assert!(session.element(element.id()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_update_does_not_outlive_end() {
        let (transport, session) = ready(Platform::Android);
        settings_update(&session, &transport, json!({"autoUpdateImageElementPosition": true})).await;
        transport.push(Endpoint::CompareImages, Ok(found(&[candidate(10.0, 10.0)])));
        transport.push(Endpoint::DeleteSession, Ok(Value::Null));
        let element = session.find_element_by_image(b"tpl").await.unwrap();

        transport.delay(Endpoint::CompareImages, Duration::from_millis(100));
        transport.push(Endpoint::CompareImages, Ok(found(&[candidate(12.0, 10.0)])));
        let (rect, ended) = tokio::join!(session.element_rect(element.id()), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            session.end().await
        });
        assert_eq!(rect.unwrap().x, Some(12.0));
        ended.unwrap();
        let err = session.element(element.id()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StaleElement);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_cache_is_bounded() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.repeat(Endpoint::Screenshot, json!("c2NyZWVu"));
        transport.repeat(Endpoint::CompareImages, found(&[candidate(10.0, 10.0)]));
        let mut config = crate::config::DriverConfig::default();
        config.cache.max_elements = 3;
        let session = Session::new(transport.clone(), config);

        let mut ids = Vec::new();
        for _ in 0..10 {
            ids.push(session.find_element_by_image(b"tpl").await.unwrap().id().to_string());
        }
        assert_eq!(session.elements.len().await, 3);
        let err = session.element_rect(&ids[0]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StaleElement);
        assert!(session.element(&ids[9]).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_staleness_check_disabled() {
        let (transport, session) = ready(Platform::Android);
        settings_update(&session, &transport, json!({"checkForImageElementStaleness": false})).await;
        transport.push(Endpoint::CompareImages, Ok(found(&[candidate(10.0, 10.0)])));
        let element = session.find_element_by_image(b"tpl").await.unwrap();

        let size = session.element_size(element.id()).await.unwrap();
        assert_eq!(size, Size { width: Some(40.0), height: Some(20.0) });
        assert_eq!(transport.call_count(Endpoint::CompareImages), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_w3c_taps_center() {
        let (transport, session) = ready(Platform::Windows);
        transport.repeat(Endpoint::CompareImages, found(&[candidate(10.0, 10.0)]));
        transport.push(Endpoint::PerformActions, Ok(Value::Null));
        let element = session.find_element_by_image(b"tpl").await.unwrap();

        session.click_element(element.id()).await.unwrap();
        let sent = transport.calls_to(Endpoint::PerformActions).remove(0);
        let moves = &sent["actions"][0]["actions"][0];
        assert_eq!(moves["type"], json!("pointerMove"));
        assert_eq!(moves["x"], json!(30));
        assert_eq!(moves["y"], json!(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_touch_actions() {
        let (transport, session) = ready(Platform::Android);
        settings_update(&session, &transport, json!({"imageElementTapStrategy": "touchActions"})).await;
        transport.repeat(Endpoint::CompareImages, found(&[candidate(10.0, 10.0)]));
        transport.push(Endpoint::TouchPerform, Ok(Value::Null));
        let element = session.find_element_by_image(b"tpl").await.unwrap();

        session.click_element(element.id()).await.unwrap();
        let sent = transport.calls_to(Endpoint::TouchPerform).remove(0);
        assert_eq!(sent, json!({"actions": [{"action": "tap", "options": {"x": 30, "y": 20}}]}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_actions_unsupported_on_mac() {
        let (transport, session) = ready(Platform::Mac);
        settings_update(&session, &transport, json!({"imageElementTapStrategy": "touchActions"})).await;
        transport.repeat(Endpoint::CompareImages, found(&[candidate(10.0, 10.0)]));
        let element = session.find_element_by_image(b"tpl").await.unwrap();

        let err = session.click_element(element.id()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert_eq!(transport.call_count(Endpoint::TouchPerform), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_visual_attribute_when_requested() {
        let (transport, session) = ready(Platform::Android);
        settings_update(&session, &transport, json!({"getMatchedImageResult": true})).await;
        let mut reply = found(&[candidate(10.0, 10.0)]);
        reply["visualization"] = json!(base64::engine::general_purpose::STANDARD.encode(b"PNGDATA"));
        transport.push(Endpoint::CompareImages, Ok(reply));
        let element = session.find_element_by_image(b"tpl").await.unwrap();
        assert_eq!(element.visualization(), Some(&b"PNGDATA"[..]));

        let sent = transport.calls_to(Endpoint::CompareImages).remove(0);
        assert_eq!(sent["options"]["visualize"], json!(true));

        transport.push(Endpoint::CompareImages, Ok(found(&[candidate(10.0, 10.0)])));
        let visual = session.element_attribute(element.id(), "visual").await.unwrap();
        assert_eq!(visual.as_deref(), Some("UE5HREFUQQ=="));
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_invalidates_handles() {
        let (transport, session) = ready(Platform::Android);
        transport.push(Endpoint::CompareImages, Ok(found(&[candidate(10.0, 10.0)])));
        transport.push(Endpoint::DeleteSession, Ok(Value::Null));
        let element = session.find_element_by_image(b"tpl").await.unwrap();

        session.end().await.unwrap();
        assert_eq!(transport.call_count(Endpoint::DeleteSession), 1);
        let err = session.element(element.id()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StaleElement);
    }

    #[tokio::test]
    async fn test_unknown_id_is_stale() {
        let (_transport, session) = ready(Platform::Android);
        let err = session.element_rect("appium-image-element-nope").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StaleElement);
    }

    #[tokio::test]
    async fn test_empty_template_rejected() {
        let (transport, session) = ready(Platform::Android);
        let err = session.find_element_by_image(b"").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(transport.call_count(Endpoint::Screenshot), 0);
    }
}
