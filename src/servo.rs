//! Visual servo: keeps a detected target centred and at a comfortable
//! distance with a smoothed PD law.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::config::ServoConfig;
use crate::detection::Rect;

/// Where the target's apparent size sits relative to the distance band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    TooFar,
    InBand,
    TooClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServoOutput {
    pub command: Command,
    pub band: Band,
    pub area: i64,
    /// Smoothed, clamped error (x, y) that produced the command.
    pub error: [f64; 2],
    pub speed_fb: i32,
    pub speed_ud: i32,
    pub speed_yaw: i32,
}

pub struct ServoController {
    config: ServoConfig,
    center: (i32, i32),
    prev_error: Vector2<f64>,
}

impl ServoController {
    pub fn new(config: ServoConfig, center: (i32, i32)) -> Self {
        Self {
            config,
            center,
            prev_error: Vector2::zeros(),
        }
    }

    /// Forget the previous error, e.g. when tracking starts again.
    pub fn reset(&mut self) {
        self.prev_error = Vector2::zeros();
    }

    pub fn prev_error(&self) -> [f64; 2] {
        [self.prev_error.x, self.prev_error.y]
    }

    /// One control step for the current box.
    pub fn update(&mut self, rect: &Rect) -> ServoOutput {
        let cfg = &self.config;
        let (cx, cy) = rect.center();

        // positive y means the target sits above the frame centre
        let raw = Vector2::new(
            cx as f64 - self.center.0 as f64,
            self.center.1 as f64 - cy as f64,
        );
        let smoothed = raw * cfg.smoothing + self.prev_error * (1.0 - cfg.smoothing);
        let error = smoothed.map(|e| e.clamp(-cfg.error_limit, cfg.error_limit));

        let area = rect.area();
        let band = if area <= cfg.min_area {
            Band::TooFar
        } else if area >= cfg.max_area {
            Band::TooClose
        } else {
            Band::InBand
        };

        let (error, speed_fb, speed_ud, speed_yaw) = match band {
            Band::InBand => {
                let pd = error * cfg.kp + (error - self.prev_error) * cfg.kd;
                (
                    error,
                    0,
                    clamp_speed(pd.y, cfg.speed_limit),
                    clamp_speed(pd.x, cfg.speed_limit),
                )
            }
            // close the distance first, no lateral correction meanwhile
            Band::TooFar => (Vector2::zeros(), cfg.approach_speed, 0, 0),
            Band::TooClose => (Vector2::zeros(), -cfg.approach_speed, 0, 0),
        };

        self.prev_error = error;

        ServoOutput {
            command: Command::follow(0, speed_fb, speed_ud, speed_yaw),
            band,
            area,
            error: [error.x, error.y],
            speed_fb,
            speed_ud,
            speed_yaw,
        }
    }
}

fn clamp_speed(value: f64, limit: i32) -> i32 {
    let limit = limit as f64;
    value.clamp(-limit, limit) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn servo() -> ServoController {
        ServoController::new(ServoConfig::default(), (480, 360))
    }

    #[test]
    fn centred_offset_inside_band() {
        let mut servo = servo();
        let out = servo.update(&Rect::new(400, 300, 600, 500));

        assert_eq!(out.band, Band::InBand);
        assert_eq!(out.area, 40_000);
        // raw (20, -40) smoothed against a zero history -> (16, -32)
        assert_eq!(out.error, [16.0, -32.0]);
        assert_eq!(out.speed_yaw, 6);
        assert_eq!(out.speed_ud, -12);
        assert_eq!(out.speed_fb, 0);
        assert_eq!(out.command.to_string(), "rc 0 0 -12 6");
        assert_eq!(servo.prev_error(), [16.0, -32.0]);
    }

    #[test]
    fn derivative_uses_previous_error() {
        let mut servo = servo();
        servo.update(&Rect::new(400, 300, 600, 500));
        let out = servo.update(&Rect::new(400, 300, 600, 500));

        // x: 0.8*20 + 0.2*16 = 19.2 -> 0.2*19.2 + 0.2*(19.2-16) = 4.48
        assert!((out.error[0] - 19.2).abs() < 1e-9);
        assert_eq!(out.speed_yaw, 4);
        // y: 0.8*-40 + 0.2*-32 = -38.4 -> 0.2*-38.4 + 0.2*(-38.4+32) = -8.96
        assert_eq!(out.speed_ud, -8);
    }

    #[test]
    fn far_target_only_approaches() {
        let mut servo = servo();
        // area 5000, far off-centre
        let out = servo.update(&Rect::new(0, 0, 100, 50));
        assert_eq!(out.band, Band::TooFar);
        assert_eq!((out.speed_fb, out.speed_ud, out.speed_yaw), (15, 0, 0));
        assert_eq!(servo.prev_error(), [0.0, 0.0]);
    }

    #[test]
    fn band_edges_are_exclusive() {
        let mut servo = servo();
        let at_min = servo.update(&Rect::new(380, 260, 580, 360));
        assert_eq!(at_min.area, 20_000);
        assert_eq!(at_min.band, Band::TooFar);
        assert_eq!(at_min.speed_fb, 15);

        let at_max = servo.update(&Rect::new(280, 160, 680, 360));
        assert_eq!(at_max.area, 80_000);
        assert_eq!(at_max.band, Band::TooClose);
        assert_eq!((at_max.speed_fb, at_max.speed_ud, at_max.speed_yaw), (-15, 0, 0));
    }

    #[test]
    fn speeds_stay_within_limits() {
        let mut servo = servo();
        let boxes = [
            Rect::new(0, 0, 150, 150),
            Rect::new(810, 570, 960, 720),
            Rect::new(0, 570, 150, 720),
            Rect::new(810, 0, 960, 150),
            Rect::new(-5000, -5000, -4850, -4850),
            Rect::new(9000, 9000, 9150, 9150),
            Rect::new(0, 0, 960, 720),
            Rect::new(470, 350, 490, 370),
        ];
        for rect in boxes.iter().cycle().take(64) {
            let out = servo.update(rect);
            for speed in [out.speed_fb, out.speed_ud, out.speed_yaw] {
                assert!((-100..=100).contains(&speed), "{:?} -> {:?}", rect, out);
            }
            assert!(out.error.iter().all(|e| e.abs() <= 200.0));
        }
    }

    #[test]
    fn reset_clears_history() {
        let mut servo = servo();
        servo.update(&Rect::new(400, 300, 600, 500));
        servo.reset();
        assert_eq!(servo.prev_error(), [0.0, 0.0]);
    }
}
