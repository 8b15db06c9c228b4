use serde::{Deserialize, Serialize};

use crate::detection::Rect;

/// Drawing hints for a display sink. Never fed back into control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overlay {
    pub rect: Rect,
    pub caption: String,
    pub target_center: (i32, i32),
    /// Frame centre to target centre, only while tracking.
    pub tracking_line: Option<((i32, i32), (i32, i32))>,
}

impl Overlay {
    /// Box and label only.
    pub fn marker(rect: Rect, label: &str) -> Self {
        Self {
            rect,
            caption: label.to_string(),
            target_center: rect.center(),
            tracking_line: None,
        }
    }

    pub fn tracking(rect: Rect, label: &str, frame_center: (i32, i32)) -> Self {
        Self {
            rect,
            caption: format!("Tracking: {}", label),
            target_center: rect.center(),
            tracking_line: Some((frame_center, rect.center())),
        }
    }
}
