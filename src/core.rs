use crate::error::{AnimrecError, AnimrecResult};

pub use kurbo::{Affine, Point, Rect, Vec2};

/// Absolute 0-based frame index in timeline space.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Frames-per-second represented as a rational `num/den`.
///
/// Carrying the rate as a rational (rather than an integer) keeps broadcast
/// rates like 30000/1001 exact all the way into the stream time base.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> AnimrecResult<Self> {
        if num == 0 {
            return Err(AnimrecError::input("Fps num must be > 0"));
        }
        if den == 0 {
            return Err(AnimrecError::input("Fps den must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Timestamp of frame `i` in seconds.
    pub fn frame_time_secs(self, i: FrameIndex) -> f64 {
        (i.0 as f64) * self.frame_duration_secs()
    }
}

/// Rational timestamp unit: one tick is `num/den` seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TimeBase {
    /// Numerator (seconds).
    pub num: u32,
    /// Denominator (ticks), must be non-zero.
    pub den: u32,
}

impl TimeBase {
    /// The canonical time base for a given frame rate: `fps.den / fps.num`
    /// seconds per frame means a tick rate of `fps.num` with `fps.den` ticks
    /// per frame.
    pub fn for_fps(fps: Fps) -> Self {
        Self {
            num: 1,
            den: fps.num,
        }
    }

    /// Presentation timestamp of frame `i` in ticks.
    ///
    /// `pts(i) = i * den / (num * fps)`, evaluated in integer arithmetic.
    /// With the canonical time base this is `i * fps.den`, which reduces to
    /// exactly `i` for integer frame rates.
    pub fn pts_for_frame(self, i: FrameIndex, fps: Fps) -> i64 {
        let num = u128::from(i.0) * u128::from(self.den) * u128::from(fps.den);
        let den = u128::from(self.num) * u128::from(fps.num);
        (num / den) as i64
    }

    /// Duration of one frame in ticks, rounded down.
    pub fn ticks_per_frame(self, fps: Fps) -> u32 {
        let num = u128::from(self.den) * u128::from(fps.den);
        let den = u128::from(self.num) * u128::from(fps.num);
        (num / den) as u32
    }

    /// Whether `pts_for_frame` is exact (drift-free) for this fps.
    pub fn is_exact_for(self, fps: Fps) -> bool {
        let num = u128::from(self.den) * u128::from(fps.den);
        let den = u128::from(self.num) * u128::from(fps.num);
        den != 0 && num % den == 0
    }
}

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_rejects_zero_parts() {
        assert!(Fps::new(0, 1).is_err());
        assert!(Fps::new(30, 0).is_err());
    }

    #[test]
    fn canonical_pts_is_frame_index_for_integer_fps() {
        let fps = Fps::new(30, 1).unwrap();
        let tb = TimeBase::for_fps(fps);
        for i in 0..1000 {
            assert_eq!(tb.pts_for_frame(FrameIndex(i), fps), i as i64);
        }
        assert!(tb.is_exact_for(fps));
        assert_eq!(tb.ticks_per_frame(fps), 1);
    }

    #[test]
    fn canonical_pts_is_exact_for_ntsc_fps() {
        let fps = Fps::new(30000, 1001).unwrap();
        let tb = TimeBase::for_fps(fps);
        assert!(tb.is_exact_for(fps));
        assert_eq!(tb.ticks_per_frame(fps), 1001);
        // Strictly increasing with a constant step.
        for i in 0..100u64 {
            assert_eq!(tb.pts_for_frame(FrameIndex(i), fps), (i * 1001) as i64);
        }
    }

    #[test]
    fn frame_time_walks_frame_duration() {
        let fps = Fps::new(30, 1).unwrap();
        let t = fps.frame_time_secs(FrameIndex(90));
        assert!((t - 3.0).abs() < 1e-12);
    }
}
