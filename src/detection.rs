use serde::{Deserialize, Serialize};

use crate::command::Verb;
use crate::error::Result;

/// Axis-aligned box in pixel coordinates. The detector guarantees
/// `x1 < x2` and `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> i64 {
        self.x2 as i64 - self.x1 as i64
    }

    pub fn height(&self) -> i64 {
        self.y2 as i64 - self.y1 as i64
    }

    pub fn area(&self) -> i64 {
        self.width().saturating_mul(self.height())
    }

    /// Integer centre, floored like the detector's pixel grid.
    pub fn center(&self) -> (i32, i32) {
        // the midpoint of two i32 values always fits back in an i32
        (
            (self.x1 as i64 + self.x2 as i64).div_euclid(2) as i32,
            (self.y1 as i64 + self.y2 as i64).div_euclid(2) as i32,
        )
    }
}

/// What the detector saw in one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub count: u32,
    #[serde(rename = "box", default)]
    pub rect: Option<Rect>,
    #[serde(default)]
    pub label: String,
}

impl DetectionResult {
    pub fn none() -> Self {
        Self {
            count: 0,
            rect: None,
            label: String::new(),
        }
    }

    pub fn single(rect: Rect, label: impl Into<String>) -> Self {
        Self {
            count: 1,
            rect: Some(rect),
            label: label.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Label normalised for matching against directives.
    pub fn directive(&self) -> Directive {
        Directive::from_label(&self.label)
    }
}

/// What a marker label asks the vehicle to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Follow,
    Land,
    TakeOff,
    /// Linear move or rotation, debounced.
    Move(Verb),
    Unknown,
}

impl Directive {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "follow" => Directive::Follow,
            "land" => Directive::Land,
            "takeoff" => Directive::TakeOff,
            other => match Verb::from_keyword(other) {
                Some(verb) if verb.is_linear() || verb.is_rotation() => Directive::Move(verb),
                _ => Directive::Unknown,
            },
        }
    }
}

/// Source of detections, called once per control tick.
pub trait Detector<F> {
    fn detect(&mut self, frame: &F) -> Result<DetectionResult>;
}

impl<F, T> Detector<F> for T
where
    T: FnMut(&F) -> Result<DetectionResult>,
{
    fn detect(&mut self, frame: &F) -> Result<DetectionResult> {
        self(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_geometry() {
        let rect = Rect::new(400, 300, 600, 500);
        assert_eq!(rect.width(), 200);
        assert_eq!(rect.height(), 200);
        assert_eq!(rect.area(), 40_000);
        assert_eq!(rect.center(), (500, 400));
        assert_eq!(Rect::new(0, 0, 3, 5).center(), (1, 2));
    }

    #[test]
    fn extreme_coordinates_do_not_overflow() {
        let rect = Rect::new(-2_000_000_000, 0, 2_000_000_000, 10);
        assert_eq!(rect.width(), 4_000_000_000);
        assert_eq!(rect.area(), 40_000_000_000);
        assert_eq!(rect.center(), (0, 5));

        let full = Rect::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX);
        assert_eq!(full.area(), i64::MAX);
        assert_eq!(full.center(), (-1, -1));
    }

    #[test]
    fn labels_map_to_directives() {
        assert_eq!(Directive::from_label("follow"), Directive::Follow);
        assert_eq!(Directive::from_label(" Land "), Directive::Land);
        assert_eq!(Directive::from_label("takeoff"), Directive::TakeOff);
        assert_eq!(Directive::from_label("ccw"), Directive::Move(Verb::RotateCcw));
        assert_eq!(Directive::from_label("back"), Directive::Move(Verb::Back));
        assert_eq!(Directive::from_label("rc"), Directive::Unknown);
        assert_eq!(Directive::from_label(""), Directive::Unknown);
    }

    #[test]
    fn deserializes_detector_json() {
        let json = r#"{"count":1,"box":{"x1":1,"y1":2,"x2":3,"y2":4},"label":"up"}"#;
        let detection: DetectionResult = serde_json::from_str(json).unwrap();
        assert_eq!(detection, DetectionResult::single(Rect::new(1, 2, 3, 4), "up"));

        let empty: DetectionResult = serde_json::from_str(r#"{"count":0}"#).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.directive(), Directive::Unknown);
    }
}
