use std::path::Path;

use crate::{
    anim::Track,
    core::Fps,
    error::{AnimrecError, AnimrecResult},
};

/// A loaded animation source: a set of named artboards, each carrying named
/// linear animations. This is the object graph the recorder poses and draws.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Document {
    pub artboards: Vec<Artboard>,
}

/// A named drawable composition with its own pixel dimensions.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Artboard {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Opaque background color (RGBA8, straight alpha).
    pub background: [u8; 4],
    pub shapes: Vec<Shape>,
    pub animations: Vec<LinearAnimation>,
}

/// A solid-fill shape in artboard space.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Shape {
    pub name: String,
    pub kind: ShapeKind,
    /// Fill color (RGBA8, straight alpha).
    pub fill: [u8; 4],
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum ShapeKind {
    Rect { x: f64, y: f64, w: f64, h: f64 },
    Ellipse { cx: f64, cy: f64, rx: f64, ry: f64 },
}

/// A time-based track collection with a fixed frame rate and duration.
///
/// Duration is expressed in frames, matching how authoring tools store it;
/// the recorder derives total output frames directly from it.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct LinearAnimation {
    pub name: String,
    pub fps: Fps,
    pub duration_frames: u64,
    pub channels: Vec<ChannelTrack>,
}

/// One animated property channel bound to a shape by name.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ChannelTrack {
    pub shape: String,
    pub channel: Channel,
    pub track: Track<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Channel {
    TranslateX,
    TranslateY,
    ScaleX,
    ScaleY,
    /// Rotation in radians about the shape center.
    Rotation,
    /// Opacity in `[0, 1]`.
    Opacity,
}

impl Document {
    /// Load a JSON animation document from disk.
    pub fn load(path: &Path) -> AnimrecResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            AnimrecError::input(format!("failed to open source '{}': {e}", path.display()))
        })?;
        let doc: Document = serde_json::from_slice(&bytes).map_err(|e| {
            AnimrecError::input(format!("failed to parse source '{}': {e}", path.display()))
        })?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn validate(&self) -> AnimrecResult<()> {
        for ab in &self.artboards {
            if ab.width == 0 || ab.height == 0 {
                return Err(AnimrecError::input(format!(
                    "artboard '{}' must have non-zero dimensions",
                    ab.name
                )));
            }
            for anim in &ab.animations {
                for ch in &anim.channels {
                    if !ab.shapes.iter().any(|s| s.name == ch.shape) {
                        return Err(AnimrecError::input(format!(
                            "animation '{}' references unknown shape '{}'",
                            anim.name, ch.shape
                        )));
                    }
                    ch.track.validate()?;
                }
            }
        }
        Ok(())
    }

    /// Look up an artboard by name, or take the first one when no name is
    /// given.
    pub fn artboard(&self, name: Option<&str>) -> AnimrecResult<&Artboard> {
        match name {
            Some(n) => self
                .artboards
                .iter()
                .find(|ab| ab.name == n)
                .ok_or_else(|| {
                    AnimrecError::input(format!("source doesn't contain an artboard named '{n}'"))
                }),
            None => self
                .artboards
                .first()
                .ok_or_else(|| AnimrecError::input("source doesn't contain a default artboard")),
        }
    }
}

impl Artboard {
    /// Look up an animation by name, or take the first one when no name is
    /// given.
    pub fn animation(&self, name: Option<&str>) -> AnimrecResult<&LinearAnimation> {
        match name {
            Some(n) => self
                .animations
                .iter()
                .find(|a| a.name == n)
                .ok_or_else(|| {
                    AnimrecError::input(format!(
                        "artboard '{}' doesn't contain an animation named '{n}'",
                        self.name
                    ))
                }),
            None => self.animations.first().ok_or_else(|| {
                AnimrecError::input(format!(
                    "artboard '{}' doesn't contain a default animation",
                    self.name
                ))
            }),
        }
    }
}
