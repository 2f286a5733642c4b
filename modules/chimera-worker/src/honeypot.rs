use browserless_client::BrowserSession;
use chimera_queue::ForbiddenRegions;
use tracing::warn;
use vision_client::VisionClient;

use crate::error::{Result, WorkerError};

/// Max allowed drift between vision's located point and the element's own
/// bounding-box center before the named selector is treated as absent
/// (SPEC_FULL.md §4.6 step 6).
const MAX_VISION_DRIFT_PX: f64 = 120.0;

pub fn l1_distance((x1, y1): (f64, f64), (x2, y2): (f64, f64)) -> f64 {
    (x1 - x2).abs() + (y1 - y2).abs()
}

/// Guard a selector-based click through the full honeypot/visibility
/// pipeline (SPEC_FULL.md §4.6 steps 1-7). Returns the point to click.
pub async fn guard_click(
    session: &BrowserSession,
    vision: &dyn VisionClient,
    policy: &ForbiddenRegions,
    domain: &str,
    selector: &str,
    description: &str,
) -> Result<(f64, f64)> {
    if policy.selector_blocked(selector) {
        return Err(WorkerError::HoneypotBlocked { domain: domain.to_string(), selector: selector.to_string() });
    }

    if !session.element_exists(selector).await? {
        return Err(WorkerError::SelectorNotFound(selector.to_string()));
    }

    let bbox = match session.bounding_box(selector).await? {
        Some(bbox) if !bbox.is_zero_size() => bbox,
        _ => {
            return Err(WorkerError::HoneypotBlocked { domain: domain.to_string(), selector: selector.to_string() });
        }
    };

    let screenshot = session.screenshot().await?;
    let vision_result = vision
        .process_vision(vision_client::ProcessVisionRequest {
            screenshot_bytes: screenshot,
            context: domain.to_string(),
            text_command: format!("find the visible clickable element: {description}"),
        })
        .await;

    // An unreachable vision service fails open onto the selector's own
    // bounding-box center rather than blocking the click, so a vision-service
    // outage can't deadlock the whole pipeline (SPEC_FULL.md §8 Boundaries).
    // A reachable-but-negative vision response still fails closed below.
    let vision_point = match vision_result {
        Ok(response) => match response.coordinates() {
            Some(point) if response.found => point,
            _ => {
                return Err(WorkerError::HoneypotBlocked {
                    domain: domain.to_string(),
                    selector: selector.to_string(),
                });
            }
        },
        Err(err) => {
            warn!(error = %err, domain, selector, "vision service unreachable, failing open to element bounding box");
            bbox.center()
        }
    };

    if l1_distance(vision_point, bbox.center()) > MAX_VISION_DRIFT_PX {
        return Err(WorkerError::HoneypotBlocked { domain: domain.to_string(), selector: selector.to_string() });
    }

    guard_direct_click(vision_point, domain, policy)?;
    Ok(vision_point)
}

/// Guard a direct-coordinate click (from vision grounding with no selector):
/// only the forbidden-rect check applies (SPEC_FULL.md §4.6, final line).
pub fn guard_direct_click(point: (f64, f64), domain: &str, policy: &ForbiddenRegions) -> Result<()> {
    if policy.point_blocked(point.0, point.1) {
        return Err(WorkerError::HoneypotBlocked { domain: domain.to_string(), selector: "<direct>".to_string() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l1_distance_sums_axis_deltas() {
        assert_eq!(l1_distance((0.0, 0.0), (3.0, 4.0)), 7.0);
    }

    #[test]
    fn direct_click_blocked_inside_forbidden_rect() {
        let policy = ForbiddenRegions {
            rects: vec![chimera_queue::ForbiddenRect { x: 0.0, y: 0.0, width: 50.0, height: 50.0 }],
            selectors: vec![],
        };
        assert!(guard_direct_click((10.0, 10.0), "example.com", &policy).is_err());
    }

    #[test]
    fn direct_click_allowed_outside_forbidden_rect() {
        let policy = ForbiddenRegions {
            rects: vec![chimera_queue::ForbiddenRect { x: 0.0, y: 0.0, width: 50.0, height: 50.0 }],
            selectors: vec![],
        };
        assert!(guard_direct_click((200.0, 200.0), "example.com", &policy).is_ok());
    }
}
