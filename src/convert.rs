use crate::render::RasterFrame;

/// A reusable planar 4:2:0 frame.
///
/// The Y, U and V planes live in one contiguous buffer (I420 layout) with
/// explicit per-plane row strides. Every plane is fully rewritten by
/// [`YuvConverter::convert`]; nothing carries over between frames.
#[derive(Clone, Debug)]
pub struct PlanarYuvFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PlanarYuvFrame {
    pub fn new(width: u32, height: u32) -> Self {
        assert!(
            width.is_multiple_of(2) && height.is_multiple_of(2),
            "4:2:0 dimensions must be even"
        );
        let y_size = (width as usize) * (height as usize);
        let c_size = y_size / 4;
        Self {
            width,
            height,
            data: vec![0u8; y_size + 2 * c_size],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Luma row stride in bytes.
    pub fn stride_y(&self) -> usize {
        self.width as usize
    }

    /// Chroma row stride in bytes (quarter-resolution planes).
    pub fn stride_c(&self) -> usize {
        (self.width / 2) as usize
    }

    pub fn y(&self) -> &[u8] {
        &self.data[..self.y_size()]
    }

    pub fn u(&self) -> &[u8] {
        let y = self.y_size();
        &self.data[y..y + self.c_size()]
    }

    pub fn v(&self) -> &[u8] {
        let y = self.y_size();
        let c = self.c_size();
        &self.data[y + c..y + 2 * c]
    }

    /// The whole I420 buffer (Y, then U, then V).
    pub fn as_i420(&self) -> &[u8] {
        &self.data
    }

    fn y_size(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    fn c_size(&self) -> usize {
        self.y_size() / 4
    }
}

/// Converts packed premultiplied RGBA rasters into planar 4:2:0.
///
/// Sized once for a fixed width/height pair and reused for every frame of a
/// run; the conversion policy (BT.601, 2x2 chroma averaging) never changes
/// mid-run. Alpha is discarded.
#[derive(Clone, Copy, Debug)]
pub struct YuvConverter {
    width: u32,
    height: u32,
}

impl YuvConverter {
    pub fn new(width: u32, height: u32) -> Self {
        assert!(
            width.is_multiple_of(2) && height.is_multiple_of(2),
            "4:2:0 dimensions must be even"
        );
        Self { width, height }
    }

    /// Rewrite `out` from `frame`. Dimension changes between frames of one
    /// run are a programming error, not a recoverable condition.
    pub fn convert(&self, frame: &RasterFrame, out: &mut PlanarYuvFrame) {
        assert!(
            frame.width == self.width && frame.height == self.height,
            "raster dimensions changed mid-run: got {}x{}, converter is {}x{}",
            frame.width,
            frame.height,
            self.width,
            self.height
        );
        assert!(
            out.width == self.width && out.height == self.height,
            "planar dimensions changed mid-run"
        );

        let w = self.width as usize;
        let h = self.height as usize;
        let y_size = w * h;
        let c_size = y_size / 4;
        let (y_plane, chroma) = out.data.split_at_mut(y_size);
        let (u_plane, v_plane) = chroma.split_at_mut(c_size);

        for row in 0..h {
            for col in 0..w {
                let i = (row * w + col) * 4;
                let r = i32::from(frame.data[i]);
                let g = i32::from(frame.data[i + 1]);
                let b = i32::from(frame.data[i + 2]);
                // BT.601 studio-range luma.
                let y = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
                y_plane[row * w + col] = y.clamp(0, 255) as u8;
            }
        }

        // Chroma from 2x2 block averages.
        let cw = w / 2;
        for crow in 0..h / 2 {
            for ccol in 0..cw {
                let (mut r, mut g, mut b) = (0i32, 0i32, 0i32);
                for dy in 0..2 {
                    for dx in 0..2 {
                        let i = ((crow * 2 + dy) * w + ccol * 2 + dx) * 4;
                        r += i32::from(frame.data[i]);
                        g += i32::from(frame.data[i + 1]);
                        b += i32::from(frame.data[i + 2]);
                    }
                }
                let (r, g, b) = ((r + 2) / 4, (g + 2) / 4, (b + 2) / 4);
                let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
                let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
                u_plane[crow * cw + ccol] = u.clamp(0, 255) as u8;
                v_plane[crow * cw + ccol] = v.clamp(0, 255) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, rgba: [u8; 4]) -> RasterFrame {
        let mut frame = RasterFrame::new(width, height);
        frame.clear(rgba);
        frame
    }

    #[test]
    fn black_maps_to_studio_black() {
        let converter = YuvConverter::new(4, 4);
        let mut out = PlanarYuvFrame::new(4, 4);
        converter.convert(&solid_frame(4, 4, [0, 0, 0, 255]), &mut out);
        assert!(out.y().iter().all(|&y| y == 16));
        assert!(out.u().iter().all(|&u| u == 128));
        assert!(out.v().iter().all(|&v| v == 128));
    }

    #[test]
    fn white_maps_to_studio_white() {
        let converter = YuvConverter::new(4, 4);
        let mut out = PlanarYuvFrame::new(4, 4);
        converter.convert(&solid_frame(4, 4, [255, 255, 255, 255]), &mut out);
        assert!(out.y().iter().all(|&y| (234..=236).contains(&y)));
        assert!(out.u().iter().all(|&u| (127..=129).contains(&u)));
        assert!(out.v().iter().all(|&v| (127..=129).contains(&v)));
    }

    #[test]
    fn red_has_high_v_low_u() {
        let converter = YuvConverter::new(4, 4);
        let mut out = PlanarYuvFrame::new(4, 4);
        converter.convert(&solid_frame(4, 4, [255, 0, 0, 255]), &mut out);
        assert!(out.v()[0] > 200);
        assert!(out.u()[0] < 110);
    }

    #[test]
    fn every_plane_is_fully_rewritten() {
        let converter = YuvConverter::new(4, 4);
        let mut out = PlanarYuvFrame::new(4, 4);
        converter.convert(&solid_frame(4, 4, [255, 255, 255, 255]), &mut out);
        converter.convert(&solid_frame(4, 4, [0, 0, 0, 255]), &mut out);
        // No residue from the white frame.
        assert!(out.y().iter().all(|&y| y == 16));
        assert!(out.u().iter().all(|&u| u == 128));
        assert!(out.v().iter().all(|&v| v == 128));
    }

    #[test]
    fn plane_layout_is_contiguous_i420() {
        let out = PlanarYuvFrame::new(6, 4);
        assert_eq!(out.y().len(), 24);
        assert_eq!(out.u().len(), 6);
        assert_eq!(out.v().len(), 6);
        assert_eq!(out.as_i420().len(), 36);
        assert_eq!(out.stride_y(), 6);
        assert_eq!(out.stride_c(), 3);
    }

    #[test]
    #[should_panic(expected = "dimensions changed mid-run")]
    fn dimension_change_is_a_programming_error() {
        let converter = YuvConverter::new(4, 4);
        let mut out = PlanarYuvFrame::new(4, 4);
        converter.convert(&solid_frame(6, 6, [0, 0, 0, 255]), &mut out);
    }
}
