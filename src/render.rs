use std::path::Path;

use crate::{
    core::Canvas,
    error::{AnimrecError, AnimrecResult},
    sampler::{AnimationSampler, Fit},
};

/// A reusable packed-pixel render target.
///
/// Pixels are **premultiplied** RGBA8, tightly packed, row-major with a row
/// stride of `4 * width`. The buffer is allocated once and overwritten in
/// place every frame; it is never shared across iterations.
#[derive(Clone, Debug)]
pub struct RasterFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RasterFrame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; (width as usize) * (height as usize) * 4],
        }
    }

    /// Overwrite every pixel with `premul` (premultiplied RGBA8).
    pub fn clear(&mut self, premul: [u8; 4]) {
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&premul);
        }
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, px: [u8; 4]) {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.data[i..i + 4].copy_from_slice(&px);
    }
}

/// Source-over for premultiplied RGBA8.
pub fn over(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    if src[3] == 0 {
        return dst;
    }
    if src[3] == 255 {
        return src;
    }

    let inv = 255u16 - u16::from(src[3]);
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = src[i].saturating_add(mul_div255(u16::from(dst[i]), inv));
    }
    out
}

/// Per-channel difference blend of a straight-alpha `src` over `dst`,
/// weighted by the source alpha. Keeps an overlay visible regardless of the
/// content underneath.
pub fn difference(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    let a = u16::from(src[3]);
    if a == 0 {
        return dst;
    }
    let inv = 255u16 - a;

    let mut out = [0u8; 4];
    for i in 0..3 {
        let diff = u16::from(dst[i].abs_diff(src[i]));
        out[i] = mul_div255(u16::from(dst[i]), inv).saturating_add(mul_div255(diff, a));
    }
    out[3] = dst[3].saturating_add(mul_div255(a, 255u16 - u16::from(dst[3])));
    out
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

/// Convert a straight-alpha RGBA8 color to premultiplied, applying an extra
/// opacity factor in `[0, 1]`.
pub fn premultiply(rgba: [u8; 4], opacity: f64) -> [u8; 4] {
    let a = (f64::from(rgba[3]) * opacity.clamp(0.0, 1.0))
        .round()
        .clamp(0.0, 255.0) as u16;
    [
        mul_div255(u16::from(rgba[0]), a),
        mul_div255(u16::from(rgba[1]), a),
        mul_div255(u16::from(rgba[2]), a),
        a as u8,
    ]
}

/// Inset of the watermark from the bottom and right frame edges, in pixels.
const WATERMARK_INSET: u32 = 20;

/// A decoded watermark image, shared read-only across all frames.
#[derive(Clone, Debug)]
pub struct Watermark {
    width: u32,
    height: u32,
    /// Straight-alpha RGBA8, tightly packed.
    rgba: Vec<u8>,
}

impl Watermark {
    /// Decode a watermark image from disk.
    pub fn load(path: &Path) -> AnimrecResult<Self> {
        let img = image::open(path)
            .map_err(|e| {
                AnimrecError::input(format!(
                    "failed to decode watermark '{}': {e}",
                    path.display()
                ))
            })?
            .to_rgba8();
        Ok(Self {
            width: img.width(),
            height: img.height(),
            rgba: img.into_raw(),
        })
    }

    pub fn from_rgba8(width: u32, height: u32, rgba: Vec<u8>) -> AnimrecResult<Self> {
        if rgba.len() != (width as usize) * (height as usize) * 4 {
            return Err(AnimrecError::input(
                "watermark buffer size must be width * height * 4",
            ));
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.rgba[i],
            self.rgba[i + 1],
            self.rgba[i + 2],
            self.rgba[i + 3],
        ]
    }
}

/// Drives one frame's draw pass onto a reusable [`RasterFrame`].
///
/// Each call clears the whole target, poses the sampler at the requested
/// time, draws through the cover/center fit transform and finally
/// composites the optional watermark. No pixel survives from the previous
/// frame.
pub struct FrameRenderer<'a> {
    sampler: &'a mut dyn AnimationSampler,
    canvas: Canvas,
    background: [u8; 4],
    watermark: Option<Watermark>,
    frame: RasterFrame,
}

impl<'a> FrameRenderer<'a> {
    pub fn new(
        sampler: &'a mut dyn AnimationSampler,
        canvas: Canvas,
        background: [u8; 4],
        watermark: Option<Watermark>,
    ) -> Self {
        Self {
            sampler,
            canvas,
            background,
            watermark,
            frame: RasterFrame::new(canvas.width, canvas.height),
        }
    }

    /// Render the animation at `time` seconds and return the raster.
    pub fn render(&mut self, time: f64) -> AnimrecResult<&RasterFrame> {
        self.frame.clear(premultiply(self.background, 1.0));

        self.sampler.pose(time)?;
        let dst = kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(self.canvas.width),
            f64::from(self.canvas.height),
        );
        self.sampler.draw(&mut self.frame, dst, Fit::Cover)?;

        if let Some(wm) = &self.watermark {
            composite_watermark(&mut self.frame, wm);
        }

        Ok(&self.frame)
    }
}

fn composite_watermark(frame: &mut RasterFrame, wm: &Watermark) {
    let x0 = frame
        .width
        .saturating_sub(wm.width().saturating_add(WATERMARK_INSET));
    let y0 = frame
        .height
        .saturating_sub(wm.height().saturating_add(WATERMARK_INSET));

    for wy in 0..wm.height() {
        let fy = y0 + wy;
        if fy >= frame.height {
            break;
        }
        for wx in 0..wm.width() {
            let fx = x0 + wx;
            if fx >= frame.width {
                break;
            }
            let blended = difference(frame.pixel(fx, fy), wm.pixel(wx, wy));
            frame.put_pixel(fx, fy, blended);
        }
    }
}
