use std::io::{Seek, Write};
use std::str::FromStr;

use mp4::{
    AvcConfig, FourCC, MediaConfig, Mp4Config, Mp4Sample, Mp4Writer, TrackConfig, TrackType,
};

use crate::{
    encode::{CompressedPacket, StreamDescriptor},
    error::{AnimrecError, AnimrecResult},
};

/// Packet consumer seam: packets arrive in drained order and must be
/// non-decreasing in presentation timestamp.
pub trait PacketSink {
    /// Forward one compressed packet to the container.
    fn write(&mut self, packet: CompressedPacket) -> AnimrecResult<()>;

    /// Write the container trailer. No `write` is accepted afterwards.
    fn close(&mut self) -> AnimrecResult<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MuxState {
    Open,
    Writing,
    Closed,
}

/// MP4 muxer over a caller-supplied sink.
///
/// The container header is written at construction; `close` writes the
/// trailer. The sink is handed back by [`Mp4Muxer::into_sink`] rather than
/// dropped here, since some callers (tests, in-memory encodes) need it to
/// outlive the muxer.
pub struct Mp4Muxer<W: Write + Seek> {
    writer: Mp4Writer<W>,
    width: u16,
    height: u16,
    timescale: u32,
    ticks_per_frame: u32,
    state: MuxState,
    track_added: bool,
    last_pts: Option<i64>,
}

const VIDEO_TRACK_ID: u32 = 1;

impl<W: Write + Seek> Mp4Muxer<W> {
    /// Write the container header onto `sink` and get a muxer ready for
    /// packets.
    pub fn new(sink: W, desc: &StreamDescriptor) -> AnimrecResult<Self> {
        if desc.time_base.num != 1 {
            return Err(AnimrecError::setup(
                "MP4 track timescale requires a 1/N time base",
            ));
        }

        let writer = Mp4Writer::write_start(
            sink,
            &Mp4Config {
                major_brand: FourCC::from_str("isom")
                    .map_err(|e| AnimrecError::setup(format!("bad brand fourcc: {e}")))?,
                minor_version: 512,
                compatible_brands: vec![
                    FourCC::from_str("isom")
                        .map_err(|e| AnimrecError::setup(format!("bad brand fourcc: {e}")))?,
                    FourCC::from_str("iso2")
                        .map_err(|e| AnimrecError::setup(format!("bad brand fourcc: {e}")))?,
                    FourCC::from_str("avc1")
                        .map_err(|e| AnimrecError::setup(format!("bad brand fourcc: {e}")))?,
                    FourCC::from_str("mp41")
                        .map_err(|e| AnimrecError::setup(format!("bad brand fourcc: {e}")))?,
                ],
                timescale: 1000,
            },
        )
        .map_err(|e| AnimrecError::setup(format!("failed to write container header: {e}")))?;

        Ok(Self {
            writer,
            width: desc.width as u16,
            height: desc.height as u16,
            timescale: desc.time_base.den,
            ticks_per_frame: desc.time_base.ticks_per_frame(desc.fps),
            state: MuxState::Open,
            track_added: false,
            last_pts: None,
        })
    }

    /// Release the underlying sink back to the caller.
    pub fn into_sink(self) -> W {
        self.writer.into_writer()
    }
}

impl<W: Write + Seek> PacketSink for Mp4Muxer<W> {
    fn write(&mut self, packet: CompressedPacket) -> AnimrecResult<()> {
        if self.state == MuxState::Closed {
            return Err(AnimrecError::runtime("mux write after trailer"));
        }
        if let Some(last) = self.last_pts
            && packet.pts < last
        {
            return Err(AnimrecError::runtime(format!(
                "non-monotonic packet pts: {} after {last}",
                packet.pts
            )));
        }

        if !self.track_added {
            let params = packet.avc_params.as_ref().ok_or_else(|| {
                AnimrecError::runtime("first packet is missing codec parameter sets")
            })?;
            self.writer
                .add_track(&TrackConfig {
                    track_type: TrackType::Video,
                    timescale: self.timescale,
                    language: "und".to_string(),
                    media_conf: MediaConfig::AvcConfig(AvcConfig {
                        width: self.width,
                        height: self.height,
                        seq_param_set: params.sps.clone(),
                        pic_param_set: params.pps.clone(),
                    }),
                })
                .map_err(|e| AnimrecError::runtime(format!("failed to add video track: {e}")))?;
            self.track_added = true;
        }

        let sample = Mp4Sample {
            start_time: packet.pts.max(0) as u64,
            duration: self.ticks_per_frame,
            rendering_offset: (packet.pts - packet.dts) as i32,
            is_sync: packet.keyframe,
            bytes: packet.data.into(),
        };
        self.writer
            .write_sample(VIDEO_TRACK_ID, &sample)
            .map_err(|e| AnimrecError::runtime(format!("mux write failed: {e}")))?;

        self.last_pts = Some(packet.pts);
        self.state = MuxState::Writing;
        Ok(())
    }

    fn close(&mut self) -> AnimrecResult<()> {
        if self.state == MuxState::Closed {
            return Err(AnimrecError::shutdown("trailer already written"));
        }
        self.writer
            .write_end()
            .map_err(|e| AnimrecError::shutdown(format!("failed to write trailer: {e}")))?;
        self.state = MuxState::Closed;
        Ok(())
    }
}
