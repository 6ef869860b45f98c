use crate::error::{AnimrecError, AnimrecResult};

/// Easing applied toward the next key.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub enum Ease {
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl Ease {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::EaseIn => t * t,
            Self::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            Self::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - 2.0 * (1.0 - t) * (1.0 - t)
                }
            }
        }
    }
}

pub trait Lerp: Sized {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        a + (b - a) * t
    }
}

/// A time-keyed track sampled in seconds.
///
/// Sampling is pure: the track holds no cursor or accumulated state, so
/// evaluating the same time twice yields identical output.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Track<T> {
    /// Keys sorted by time.
    pub keys: Vec<Keyframe<T>>,
    pub mode: InterpMode,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Keyframe<T> {
    /// Key time in seconds from animation start.
    pub time: f64,
    pub value: T,
    pub ease: Ease,
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub enum InterpMode {
    Hold,
    Linear,
}

impl<T> Track<T>
where
    T: Lerp + Clone,
{
    pub fn constant(value: T) -> Self {
        Self {
            keys: vec![Keyframe {
                time: 0.0,
                value,
                ease: Ease::Linear,
            }],
            mode: InterpMode::Hold,
        }
    }

    pub fn validate(&self) -> AnimrecResult<()> {
        if self.keys.is_empty() {
            return Err(AnimrecError::input("track must have at least one key"));
        }
        if !self.keys.windows(2).all(|w| w[0].time <= w[1].time) {
            return Err(AnimrecError::input("track keys must be sorted by time"));
        }
        if self.keys.iter().any(|k| !k.time.is_finite() || k.time < 0.0) {
            return Err(AnimrecError::input("track key times must be finite and >= 0"));
        }
        Ok(())
    }

    /// Sample the track at `time` seconds. Before the first key the first
    /// value holds; after the last key the last value holds.
    pub fn sample(&self, time: f64) -> AnimrecResult<T> {
        if self.keys.is_empty() {
            return Err(AnimrecError::input("track has no keys"));
        }

        let idx = self.keys.partition_point(|k| k.time <= time);
        if idx == 0 {
            return Ok(self.keys[0].value.clone());
        }
        if idx >= self.keys.len() {
            return Ok(self.keys[self.keys.len() - 1].value.clone());
        }

        let a = &self.keys[idx - 1];
        let b = &self.keys[idx];
        let span = b.time - a.time;
        if span <= 0.0 {
            return Ok(a.value.clone());
        }

        let t = a.ease.apply((time - a.time) / span);
        match self.mode {
            InterpMode::Hold => Ok(a.value.clone()),
            InterpMode::Linear => Ok(T::lerp(&a.value, &b.value, t)),
        }
    }
}
