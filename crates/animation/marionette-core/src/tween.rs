//! Timeline tweening curves.
//!
//! A tween reshapes normalized playback progress before it is mapped back onto
//! the animation timeline, so every channel speeds up and slows down together.
//! Reference curves satisfy `f(0) == 0`, `f(1) == 1` and are continuous at the
//! `t = 0.5` seam where the piecewise variants switch formula.

use std::fmt;
use std::str::FromStr;

use crate::error::AnimationError;

/// Identity curve.
#[inline]
pub fn linear(t: f64) -> f64 {
    t
}

/// Quadratic ease-in-out.
#[inline]
pub fn ease_in_out_quad(t: f64) -> f64 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        -2.0 * t * t + 4.0 * t - 1.0
    }
}

/// Cubic ease-in-out.
#[inline]
pub fn ease_in_out_cubic(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        4.0 * t * t * t - 12.0 * t * t + 12.0 * t - 3.0
    }
}

/// Progress transform applied to the playback clock.
///
/// `Custom` accepts any `fn(f64) -> f64`; callers are responsible for keeping
/// `f(0) == 0` and `f(1) == 1`. Overshooting curves are tolerated because
/// channel interpolators hold their end positions outside the keyed range.
#[derive(Clone, Copy, Debug, Default)]
pub enum Tween {
    #[default]
    Linear,
    EaseInOutQuad,
    EaseInOutCubic,
    Custom(fn(f64) -> f64),
}

impl Tween {
    /// The named curves, in declaration order.
    pub const REFERENCE: [Tween; 3] = [Tween::Linear, Tween::EaseInOutQuad, Tween::EaseInOutCubic];

    #[inline]
    pub fn apply(&self, t: f64) -> f64 {
        match self {
            Tween::Linear => linear(t),
            Tween::EaseInOutQuad => ease_in_out_quad(t),
            Tween::EaseInOutCubic => ease_in_out_cubic(t),
            Tween::Custom(f) => f(t),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tween::Linear => "linear",
            Tween::EaseInOutQuad => "ease_in_out_quad",
            Tween::EaseInOutCubic => "ease_in_out_cubic",
            Tween::Custom(_) => "custom",
        }
    }
}

impl fmt::Display for Tween {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tween {
    type Err = AnimationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "linear" => Ok(Tween::Linear),
            "ease_in_out_quad" | "ease-in-out-quad" => Ok(Tween::EaseInOutQuad),
            "ease_in_out_cubic" | "ease-in-out-cubic" => Ok(Tween::EaseInOutCubic),
            other => Err(AnimationError::UnknownTween {
                name: other.to_string(),
            }),
        }
    }
}
