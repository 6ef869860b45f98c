use std::collections::VecDeque;

use openh264::OpenH264API;
use openh264::encoder::{EncoderConfig, FrameType};
use openh264::formats::YUVBuffer;

use crate::{
    convert::PlanarYuvFrame,
    core::{Fps, TimeBase},
    error::{AnimrecError, AnimrecResult},
};

type Openh264Encoder = openh264::encoder::Encoder;

/// Codec identifier for the output stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodecId {
    H264,
}

/// Pixel layout handed to the codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Yuv420,
}

/// Immutable per-run stream parameters, derived once before the codec opens
/// and never mutated afterwards.
#[derive(Clone, Copy, Debug)]
pub struct StreamDescriptor {
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    pub bitrate_kbps: u32,
    pub codec: CodecId,
    pub pixel_format: PixelFormat,
    pub time_base: TimeBase,
}

impl StreamDescriptor {
    pub fn new(width: u32, height: u32, fps: Fps, bitrate_kbps: u32) -> AnimrecResult<Self> {
        if width == 0 || height == 0 {
            return Err(AnimrecError::setup("stream width/height must be non-zero"));
        }
        if !width.is_multiple_of(2) || !height.is_multiple_of(2) {
            return Err(AnimrecError::setup(
                "stream width/height must be even (required for 4:2:0 output)",
            ));
        }
        if bitrate_kbps == 0 {
            return Err(AnimrecError::setup("stream bitrate must be non-zero"));
        }

        let time_base = TimeBase::for_fps(fps);
        if !time_base.is_exact_for(fps) {
            return Err(AnimrecError::setup(
                "time base does not divide the frame interval exactly",
            ));
        }

        Ok(Self {
            width,
            height,
            fps,
            bitrate_kbps,
            codec: CodecId::H264,
            pixel_format: PixelFormat::Yuv420,
            time_base,
        })
    }

    /// Presentation timestamp of frame `i` in time-base ticks.
    pub fn pts_for_frame(&self, i: u64) -> i64 {
        self.time_base.pts_for_frame(crate::core::FrameIndex(i), self.fps)
    }
}

/// H.264 sequence/picture parameter sets, carried by the first packet so the
/// muxer can configure its track.
#[derive(Clone, Debug)]
pub struct AvcParams {
    pub sps: Vec<u8>,
    pub pps: Vec<u8>,
}

/// One compressed frame in AVCC form (4-byte length-prefixed NAL units).
///
/// Owned by the encoder until drained, then by the muxer until written.
#[derive(Clone, Debug)]
pub struct CompressedPacket {
    pub data: Vec<u8>,
    /// Presentation timestamp in time-base ticks.
    pub pts: i64,
    /// Decode timestamp in time-base ticks.
    pub dts: i64,
    /// Whether this packet is independently decodable.
    pub keyframe: bool,
    /// Parameter sets, present on the first packet of the stream only.
    pub avc_params: Option<AvcParams>,
}

/// Encoder seam consumed by the pipeline driver.
///
/// Call order per frame: one `submit`, then `drain` until it reports no
/// packet. After the last frame: `flush`, then `drain` until empty. The
/// encoder may hold frames back internally (look-ahead reordering), so any
/// `submit` can surface zero or more packets.
pub trait VideoEncoder {
    /// Submit one raw frame with its presentation timestamp.
    ///
    /// Timestamps must be strictly increasing; a non-monotonic timestamp is
    /// a fatal error.
    fn submit(&mut self, frame: &PlanarYuvFrame, pts: i64) -> AnimrecResult<()>;

    /// Take the next ready packet, if any.
    fn drain(&mut self) -> AnimrecResult<Option<CompressedPacket>>;

    /// Signal end-of-stream. After this, `drain` empties the encoder's
    /// remaining output and no further `submit` is accepted.
    fn flush(&mut self) -> AnimrecResult<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EncoderState {
    Opened,
    Encoding,
    Flushing,
    Closed,
}

/// OpenH264-backed encoder.
///
/// Every main-loop frame is forced to be an intra frame: the output has no
/// inter-frame group-of-pictures structure, trading compression ratio for
/// per-frame seekability. This is deliberate policy.
pub struct H264Encoder {
    inner: Openh264Encoder,
    desc: StreamDescriptor,
    state: EncoderState,
    last_pts: Option<i64>,
    params_pending: bool,
    ready: VecDeque<CompressedPacket>,
}

impl H264Encoder {
    /// Open the codec for the given stream parameters.
    pub fn open(desc: &StreamDescriptor) -> AnimrecResult<Self> {
        let config = EncoderConfig::new()
            .set_bitrate_bps(desc.bitrate_kbps.saturating_mul(1000))
            .max_frame_rate(desc.fps.as_f64() as f32)
            .enable_skip_frame(false);

        let inner = Openh264Encoder::with_api_config(OpenH264API::from_source(), config)
            .map_err(|e| AnimrecError::setup(format!("failed to open H.264 codec: {e}")))?;

        tracing::debug!(
            width = desc.width,
            height = desc.height,
            bitrate_kbps = desc.bitrate_kbps,
            "opened H.264 encoder"
        );

        Ok(Self {
            inner,
            desc: *desc,
            state: EncoderState::Opened,
            last_pts: None,
            params_pending: true,
            ready: VecDeque::new(),
        })
    }

    fn pts_to_millis(&self, pts: i64) -> u64 {
        let tb = self.desc.time_base;
        (pts.max(0) as u128 * 1000 * u128::from(tb.num) / u128::from(tb.den)) as u64
    }
}

impl VideoEncoder for H264Encoder {
    fn submit(&mut self, frame: &PlanarYuvFrame, pts: i64) -> AnimrecResult<()> {
        match self.state {
            EncoderState::Opened | EncoderState::Encoding => {}
            EncoderState::Flushing | EncoderState::Closed => {
                return Err(AnimrecError::runtime("submit after flush"));
            }
        }
        if frame.width() != self.desc.width || frame.height() != self.desc.height {
            return Err(AnimrecError::runtime(format!(
                "frame size mismatch: got {}x{}, stream is {}x{}",
                frame.width(),
                frame.height(),
                self.desc.width,
                self.desc.height
            )));
        }
        if let Some(last) = self.last_pts
            && pts <= last
        {
            return Err(AnimrecError::runtime(format!(
                "non-monotonic pts: {pts} after {last}"
            )));
        }

        self.inner.force_intra_frame();

        let yuv = YUVBuffer::from_vec(
            frame.as_i420().to_vec(),
            self.desc.width as usize,
            self.desc.height as usize,
        );
        let timestamp = openh264::Timestamp::from_millis(self.pts_to_millis(pts));
        let bitstream = self
            .inner
            .encode_at(&yuv, timestamp)
            .map_err(|e| AnimrecError::runtime(format!("encoder submit failed: {e}")))?;

        let keyframe = matches!(bitstream.frame_type(), FrameType::I | FrameType::IDR);

        let avc_params = if self.params_pending {
            let layer = bitstream.layer(0).ok_or_else(|| {
                AnimrecError::runtime("first bitstream is missing the parameter layer")
            })?;
            let sps = layer
                .nal_unit(0)
                .ok_or_else(|| AnimrecError::runtime("first bitstream is missing SPS"))?;
            let pps = layer
                .nal_unit(1)
                .ok_or_else(|| AnimrecError::runtime("first bitstream is missing PPS"))?;
            self.params_pending = false;
            Some(AvcParams {
                sps: strip_nal_start_code(sps).to_vec(),
                pps: strip_nal_start_code(pps).to_vec(),
            })
        } else {
            None
        };

        let mut data = Vec::new();
        for l in 0..bitstream.num_layers() {
            let Some(layer) = bitstream.layer(l) else {
                continue;
            };
            if !layer.is_video() {
                continue;
            }
            for n in 0..layer.nal_count() {
                let Some(nal) = layer.nal_unit(n) else {
                    continue;
                };
                let nal = strip_nal_start_code(nal);
                data.extend_from_slice(&u32::to_be_bytes(nal.len() as u32));
                data.extend_from_slice(nal);
            }
        }

        self.state = EncoderState::Encoding;
        self.last_pts = Some(pts);

        if !data.is_empty() {
            self.ready.push_back(CompressedPacket {
                data,
                pts,
                dts: pts,
                keyframe,
                avc_params,
            });
        }

        Ok(())
    }

    fn drain(&mut self) -> AnimrecResult<Option<CompressedPacket>> {
        let packet = self.ready.pop_front();
        if packet.is_none() && self.state == EncoderState::Flushing {
            self.state = EncoderState::Closed;
        }
        Ok(packet)
    }

    fn flush(&mut self) -> AnimrecResult<()> {
        match self.state {
            EncoderState::Closed => Err(AnimrecError::runtime("flush after close")),
            _ => {
                // OpenH264 runs with zero look-ahead here, so flushing only
                // hands over packets already queued; the drain loop still
                // runs until empty.
                self.state = EncoderState::Flushing;
                Ok(())
            }
        }
    }
}

fn strip_nal_start_code(nal: &[u8]) -> &[u8] {
    if let Some(rest) = nal.strip_prefix(&[0, 0, 0, 1][..]) {
        rest
    } else if let Some(rest) = nal.strip_prefix(&[0, 0, 1][..]) {
        rest
    } else {
        nal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RasterFrame;
    use crate::convert::YuvConverter;

    fn desc() -> StreamDescriptor {
        StreamDescriptor::new(64, 64, Fps::new(30, 1).unwrap(), 400).unwrap()
    }

    fn solid_planar(desc: &StreamDescriptor, rgba: [u8; 4]) -> PlanarYuvFrame {
        let mut raster = RasterFrame::new(desc.width, desc.height);
        raster.clear(rgba);
        let mut planar = PlanarYuvFrame::new(desc.width, desc.height);
        YuvConverter::new(desc.width, desc.height).convert(&raster, &mut planar);
        planar
    }

    #[test]
    fn descriptor_rejects_odd_dimensions() {
        assert!(StreamDescriptor::new(63, 64, Fps::new(30, 1).unwrap(), 400).is_err());
        assert!(StreamDescriptor::new(64, 63, Fps::new(30, 1).unwrap(), 400).is_err());
    }

    #[test]
    fn descriptor_pts_is_frame_index_for_integer_fps() {
        let d = desc();
        for i in 0..120 {
            assert_eq!(d.pts_for_frame(i), i as i64);
        }
    }

    #[test]
    fn strip_nal_start_code_handles_both_prefixes() {
        assert_eq!(strip_nal_start_code(&[0, 0, 0, 1, 9]), &[9]);
        assert_eq!(strip_nal_start_code(&[0, 0, 1, 9]), &[9]);
        assert_eq!(strip_nal_start_code(&[9, 9]), &[9, 9]);
    }

    #[test]
    fn first_packet_carries_parameter_sets_and_keyframe_flag() {
        let d = desc();
        let mut enc = H264Encoder::open(&d).unwrap();
        let frame = solid_planar(&d, [255, 0, 0, 255]);

        enc.submit(&frame, 0).unwrap();
        let pkt = enc.drain().unwrap().expect("packet after submit");
        assert!(pkt.keyframe);
        assert_eq!(pkt.pts, 0);
        let params = pkt.avc_params.expect("first packet carries SPS/PPS");
        assert!(!params.sps.is_empty());
        assert!(!params.pps.is_empty());
        assert!(enc.drain().unwrap().is_none());

        enc.submit(&frame, 1).unwrap();
        let pkt = enc.drain().unwrap().expect("packet after second submit");
        assert!(pkt.keyframe);
        assert!(pkt.avc_params.is_none());
    }

    #[test]
    fn non_monotonic_pts_is_fatal() {
        let d = desc();
        let mut enc = H264Encoder::open(&d).unwrap();
        let frame = solid_planar(&d, [0, 255, 0, 255]);

        enc.submit(&frame, 5).unwrap();
        while enc.drain().unwrap().is_some() {}
        let err = enc.submit(&frame, 5).unwrap_err();
        assert!(err.to_string().contains("non-monotonic"));
    }

    #[test]
    fn submit_after_flush_is_rejected() {
        let d = desc();
        let mut enc = H264Encoder::open(&d).unwrap();
        let frame = solid_planar(&d, [0, 0, 255, 255]);

        enc.submit(&frame, 0).unwrap();
        enc.flush().unwrap();
        while enc.drain().unwrap().is_some() {}
        assert!(enc.submit(&frame, 1).is_err());
        assert!(enc.flush().is_err());
    }

    #[test]
    fn flush_surfaces_queued_packets() {
        let d = desc();
        let mut enc = H264Encoder::open(&d).unwrap();
        let frame = solid_planar(&d, [40, 80, 120, 255]);

        enc.submit(&frame, 0).unwrap();
        // Skip the per-frame drain to leave output queued.
        enc.flush().unwrap();
        let mut drained = 0;
        while enc.drain().unwrap().is_some() {
            drained += 1;
        }
        assert!(drained >= 1);
        assert!(enc.drain().unwrap().is_none());
    }
}
