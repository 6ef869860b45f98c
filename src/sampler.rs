use kurbo::{Affine, Point, Rect};

use crate::{
    document::{Artboard, Channel, LinearAnimation, ShapeKind},
    error::{AnimrecError, AnimrecResult},
    render::{RasterFrame, over, premultiply},
};

/// Policy mapping the animation's source bounds onto the destination bounds.
///
/// `Cover` scales the source to fully cover the destination, cropping the
/// overscan, centered on both axes. It is the only policy the recorder
/// supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fit {
    Cover,
}

impl Fit {
    /// The affine mapping `src` into `dst` under this policy.
    pub fn transform(self, src: Rect, dst: Rect) -> Affine {
        match self {
            Self::Cover => {
                let sw = src.width();
                let sh = src.height();
                if sw <= 0.0 || sh <= 0.0 {
                    return Affine::IDENTITY;
                }
                let scale = (dst.width() / sw).max(dst.height() / sh);
                let tx = dst.x0 + (dst.width() - sw * scale) / 2.0 - src.x0 * scale;
                let ty = dst.y0 + (dst.height() - sh * scale) / 2.0 - src.y0 * scale;
                Affine::translate((tx, ty)) * Affine::scale(scale)
            }
        }
    }
}

/// The posing/drawing capability the pipeline consumes.
///
/// `pose` must be deterministic: posing the same time twice yields identical
/// derived state, with no accumulation across calls.
pub trait AnimationSampler {
    /// Set the animation's derived state for `time` seconds.
    fn pose(&mut self, time: f64) -> AnimrecResult<()>;

    /// Advance the current pose by `dt` seconds and re-derive state.
    fn advance(&mut self, dt: f64) -> AnimrecResult<()>;

    /// Render the current pose into `target`, mapping the animation's source
    /// bounds onto `dest_bounds` under `fit`.
    fn draw(&self, target: &mut RasterFrame, dest_bounds: Rect, fit: Fit) -> AnimrecResult<()>;
}

/// One shape's fully derived state for the current pose.
#[derive(Clone, Debug)]
struct PosedShape {
    kind: ShapeKind,
    /// Premultiplied fill with opacity applied.
    fill: [u8; 4],
    /// Local transform in artboard space (translate/rotate/scale about the
    /// shape center).
    local: Affine,
}

/// Poses one artboard/animation pair and rasterizes the posed shapes.
pub struct ArtboardSampler {
    artboard: Artboard,
    animation: LinearAnimation,
    time: f64,
    posed: Vec<PosedShape>,
}

impl ArtboardSampler {
    pub fn new(artboard: &Artboard, animation: &LinearAnimation) -> AnimrecResult<Self> {
        if !artboard.animations.iter().any(|a| a.name == animation.name) {
            return Err(AnimrecError::input(format!(
                "animation '{}' does not belong to artboard '{}'",
                animation.name, artboard.name
            )));
        }
        let mut sampler = Self {
            artboard: artboard.clone(),
            animation: animation.clone(),
            time: 0.0,
            posed: Vec::new(),
        };
        sampler.derive()?;
        Ok(sampler)
    }

    /// Artboard bounds in artboard space.
    pub fn bounds(&self) -> Rect {
        Rect::new(
            0.0,
            0.0,
            f64::from(self.artboard.width),
            f64::from(self.artboard.height),
        )
    }

    fn channel_value(&self, shape: &str, channel: Channel, default: f64) -> AnimrecResult<f64> {
        for ch in &self.animation.channels {
            if ch.shape == shape && ch.channel == channel {
                return ch.track.sample(self.time);
            }
        }
        Ok(default)
    }

    fn derive(&mut self) -> AnimrecResult<()> {
        let mut posed = Vec::with_capacity(self.artboard.shapes.len());
        for shape in &self.artboard.shapes {
            let tx = self.channel_value(&shape.name, Channel::TranslateX, 0.0)?;
            let ty = self.channel_value(&shape.name, Channel::TranslateY, 0.0)?;
            let sx = self.channel_value(&shape.name, Channel::ScaleX, 1.0)?;
            let sy = self.channel_value(&shape.name, Channel::ScaleY, 1.0)?;
            let rot = self.channel_value(&shape.name, Channel::Rotation, 0.0)?;
            let opacity = self.channel_value(&shape.name, Channel::Opacity, 1.0)?;

            let center = match shape.kind {
                ShapeKind::Rect { x, y, w, h } => Point::new(x + w / 2.0, y + h / 2.0),
                ShapeKind::Ellipse { cx, cy, .. } => Point::new(cx, cy),
            };
            let local = Affine::translate((tx, ty))
                * Affine::translate(center.to_vec2())
                * Affine::rotate(rot)
                * Affine::scale_non_uniform(sx, sy)
                * Affine::translate(-center.to_vec2());

            posed.push(PosedShape {
                kind: shape.kind.clone(),
                fill: premultiply(shape.fill, opacity),
                local,
            });
        }
        self.posed = posed;
        Ok(())
    }
}

impl AnimationSampler for ArtboardSampler {
    fn pose(&mut self, time: f64) -> AnimrecResult<()> {
        if !time.is_finite() || time < 0.0 {
            return Err(AnimrecError::runtime(format!(
                "pose time must be finite and >= 0, got {time}"
            )));
        }
        self.time = time;
        self.derive()
    }

    fn advance(&mut self, dt: f64) -> AnimrecResult<()> {
        self.time += dt;
        self.derive()
    }

    fn draw(&self, target: &mut RasterFrame, dest_bounds: Rect, fit: Fit) -> AnimrecResult<()> {
        let view = fit.transform(self.bounds(), dest_bounds);

        for shape in &self.posed {
            if shape.fill[3] == 0 {
                continue;
            }

            let total = view * shape.local;
            if total.determinant().abs() < 1e-12 {
                // Degenerate scale collapses the shape to nothing.
                continue;
            }
            let inv = total.inverse();

            let base = match shape.kind {
                ShapeKind::Rect { x, y, w, h } => Rect::new(x, y, x + w, y + h),
                ShapeKind::Ellipse { cx, cy, rx, ry } => {
                    Rect::new(cx - rx, cy - ry, cx + rx, cy + ry)
                }
            };

            let aabb = total.transform_rect_bbox(base);
            let clip = aabb.intersect(dest_bounds).intersect(Rect::new(
                0.0,
                0.0,
                f64::from(target.width),
                f64::from(target.height),
            ));
            if clip.is_zero_area() {
                continue;
            }

            let px0 = clip.x0.floor().max(0.0) as u32;
            let py0 = clip.y0.floor().max(0.0) as u32;
            let px1 = (clip.x1.ceil() as u32).min(target.width);
            let py1 = (clip.y1.ceil() as u32).min(target.height);

            for py in py0..py1 {
                for px in px0..px1 {
                    let p = inv * Point::new(f64::from(px) + 0.5, f64::from(py) + 0.5);
                    let inside = match shape.kind {
                        ShapeKind::Rect { x, y, w, h } => {
                            p.x >= x && p.x < x + w && p.y >= y && p.y < y + h
                        }
                        ShapeKind::Ellipse { cx, cy, rx, ry } => {
                            if rx <= 0.0 || ry <= 0.0 {
                                false
                            } else {
                                let dx = (p.x - cx) / rx;
                                let dy = (p.y - cy) / ry;
                                dx * dx + dy * dy <= 1.0
                            }
                        }
                    };
                    if inside {
                        let blended = over(target.pixel(px, py), shape.fill);
                        target.put_pixel(px, py, blended);
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anim::{Ease, InterpMode, Keyframe, Track};
    use crate::core::Fps;
    use crate::document::{ChannelTrack, Document, Shape};

    fn test_doc() -> Document {
        Document {
            artboards: vec![Artboard {
                name: "main".to_string(),
                width: 32,
                height: 32,
                background: [0, 0, 0, 255],
                shapes: vec![Shape {
                    name: "box".to_string(),
                    kind: ShapeKind::Rect {
                        x: 0.0,
                        y: 0.0,
                        w: 8.0,
                        h: 8.0,
                    },
                    fill: [255, 0, 0, 255],
                }],
                animations: vec![LinearAnimation {
                    name: "slide".to_string(),
                    fps: Fps::new(30, 1).unwrap(),
                    duration_frames: 30,
                    channels: vec![ChannelTrack {
                        shape: "box".to_string(),
                        channel: Channel::TranslateX,
                        track: Track {
                            keys: vec![
                                Keyframe {
                                    time: 0.0,
                                    value: 0.0,
                                    ease: Ease::Linear,
                                },
                                Keyframe {
                                    time: 1.0,
                                    value: 24.0,
                                    ease: Ease::Linear,
                                },
                            ],
                            mode: InterpMode::Linear,
                        },
                    }],
                }],
            }],
        }
    }

    fn sampler() -> ArtboardSampler {
        let doc = test_doc();
        let ab = doc.artboard(None).unwrap();
        let anim = ab.animation(None).unwrap();
        ArtboardSampler::new(ab, anim).unwrap()
    }

    #[test]
    fn cover_upscales_and_centers() {
        // 32x32 source into 64x32 destination: scale 2, crop top/bottom.
        let t = Fit::Cover.transform(
            Rect::new(0.0, 0.0, 32.0, 32.0),
            Rect::new(0.0, 0.0, 64.0, 32.0),
        );
        let p = t * Point::new(16.0, 16.0);
        assert!((p.x - 32.0).abs() < 1e-9);
        assert!((p.y - 16.0).abs() < 1e-9);
        // Source top edge lands above the destination (cropped overscan).
        let top = t * Point::new(16.0, 0.0);
        assert!(top.y < 0.0);
    }

    #[test]
    fn posing_same_time_twice_is_bit_identical() {
        let mut s = sampler();
        let mut a = RasterFrame::new(32, 32);
        let mut b = RasterFrame::new(32, 32);
        let dst = Rect::new(0.0, 0.0, 32.0, 32.0);

        s.pose(0.4).unwrap();
        s.draw(&mut a, dst, Fit::Cover).unwrap();
        s.pose(0.9).unwrap();
        s.pose(0.4).unwrap();
        s.draw(&mut b, dst, Fit::Cover).unwrap();

        assert_eq!(a.data, b.data);
    }

    #[test]
    fn translate_channel_moves_shape() {
        let mut s = sampler();
        let dst = Rect::new(0.0, 0.0, 32.0, 32.0);

        let mut start = RasterFrame::new(32, 32);
        s.pose(0.0).unwrap();
        s.draw(&mut start, dst, Fit::Cover).unwrap();
        assert_eq!(start.pixel(2, 2), [255, 0, 0, 255]);
        assert_eq!(start.pixel(30, 2), [0, 0, 0, 0]);

        let mut end = RasterFrame::new(32, 32);
        s.pose(1.0).unwrap();
        s.draw(&mut end, dst, Fit::Cover).unwrap();
        assert_eq!(end.pixel(2, 2), [0, 0, 0, 0]);
        assert_eq!(end.pixel(30, 2), [255, 0, 0, 255]);
    }

    #[test]
    fn advance_zero_keeps_pose() {
        let mut s = sampler();
        let dst = Rect::new(0.0, 0.0, 32.0, 32.0);

        let mut a = RasterFrame::new(32, 32);
        s.pose(0.5).unwrap();
        s.advance(0.0).unwrap();
        s.draw(&mut a, dst, Fit::Cover).unwrap();

        let mut b = RasterFrame::new(32, 32);
        s.pose(0.5).unwrap();
        s.draw(&mut b, dst, Fit::Cover).unwrap();

        assert_eq!(a.data, b.data);
    }

    #[test]
    fn pose_rejects_negative_time() {
        let mut s = sampler();
        assert!(s.pose(-1.0).is_err());
    }
}
