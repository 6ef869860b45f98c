use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::{
    convert::{PlanarYuvFrame, YuvConverter},
    core::{Canvas, FrameIndex},
    document::Document,
    encode::{H264Encoder, StreamDescriptor, VideoEncoder},
    error::{AnimrecError, AnimrecResult},
    mux::{Mp4Muxer, PacketSink},
    render::{FrameRenderer, Watermark},
    sampler::ArtboardSampler,
};

/// Recording options supplied by the caller.
#[derive(Clone, Debug)]
pub struct RecordOpts {
    /// Target bitrate in kbit/s.
    pub bitrate_kbps: u32,
    /// Optional watermark image path.
    pub watermark: Option<PathBuf>,
    /// Artboard to draw from; the document's first artboard when `None`.
    pub artboard: Option<String>,
    /// Animation to play; the artboard's first animation when `None`. The
    /// animation determines the number of frames recorded.
    pub animation: Option<String>,
}

impl Default for RecordOpts {
    fn default() -> Self {
        Self {
            bitrate_kbps: 400,
            watermark: None,
            artboard: None,
            animation: None,
        }
    }
}

/// Counters reported after a completed run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecordStats {
    /// Frames rendered and submitted.
    pub frames: u64,
    /// Packets muxed during the main loop.
    pub packets: u64,
    /// Packets muxed while draining the flush.
    pub flush_packets: u64,
}

/// Record one animation timeline into an MP4 file at `out_path`.
///
/// Fail-fast: any setup failure returns before a frame is produced, and any
/// mid-loop failure aborts without writing the trailer, leaving the output
/// unfinalized. A non-zero completion means the output must be discarded.
pub fn record_to_mp4(
    document: &Document,
    out_path: &Path,
    opts: &RecordOpts,
) -> AnimrecResult<RecordStats> {
    let artboard = document.artboard(opts.artboard.as_deref())?;
    let animation = artboard.animation(opts.animation.as_deref())?;

    let total_frames = animation.duration_frames;
    if total_frames == 0 {
        return Err(AnimrecError::input(format!(
            "animation '{}' has zero duration; nothing to record",
            animation.name
        )));
    }

    let desc = StreamDescriptor::new(
        artboard.width,
        artboard.height,
        animation.fps,
        opts.bitrate_kbps,
    )?;

    let watermark = match &opts.watermark {
        Some(path) => Some(Watermark::load(path)?),
        None => None,
    };

    tracing::info!(
        artboard = %artboard.name,
        animation = %animation.name,
        width = desc.width,
        height = desc.height,
        fps = desc.fps.as_f64(),
        frames = total_frames,
        out = %out_path.display(),
        "recording animation"
    );

    let mut sampler = ArtboardSampler::new(artboard, animation)?;
    let canvas = Canvas {
        width: desc.width,
        height: desc.height,
    };
    let mut renderer = FrameRenderer::new(&mut sampler, canvas, artboard.background, watermark);

    let converter = YuvConverter::new(desc.width, desc.height);
    let mut planar = PlanarYuvFrame::new(desc.width, desc.height);

    if let Some(parent) = out_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            AnimrecError::setup(format!(
                "failed to create output directory '{}': {e}",
                parent.display()
            ))
        })?;
    }
    let file = File::create(out_path).map_err(|e| {
        AnimrecError::setup(format!(
            "failed to open output file '{}': {e}",
            out_path.display()
        ))
    })?;

    let mut encoder = H264Encoder::open(&desc)?;
    let mut muxer = Mp4Muxer::new(BufWriter::new(file), &desc)?;

    let stats = run_pipeline(
        &mut renderer,
        &converter,
        &mut planar,
        &mut encoder,
        &mut muxer,
        &desc,
        total_frames,
    )?;

    muxer
        .into_sink()
        .flush()
        .map_err(|e| AnimrecError::shutdown(format!("failed to flush output file: {e}")))?;

    tracing::info!(
        frames = stats.frames,
        packets = stats.packets + stats.flush_packets,
        "finished recording"
    );
    Ok(stats)
}

/// The frame-production-to-encoder loop.
///
/// For each frame: render, convert, submit with its time-base pts, then
/// drain the encoder until empty before starting the next iteration. After
/// the loop: flush, drain until empty, write the trailer. The raster and
/// planar buffers are reused across all iterations.
pub fn run_pipeline(
    renderer: &mut FrameRenderer<'_>,
    converter: &YuvConverter,
    planar: &mut PlanarYuvFrame,
    encoder: &mut dyn VideoEncoder,
    sink: &mut dyn PacketSink,
    desc: &StreamDescriptor,
    total_frames: u64,
) -> AnimrecResult<RecordStats> {
    if total_frames == 0 {
        return Err(AnimrecError::input("cannot record zero frames"));
    }

    let mut stats = RecordStats::default();

    for i in 0..total_frames {
        let time = desc.fps.frame_time_secs(FrameIndex(i));
        let raster = renderer.render(time)?;
        converter.convert(raster, planar);

        let pts = desc.pts_for_frame(i);
        encoder.submit(planar, pts)?;
        while let Some(packet) = encoder.drain()? {
            sink.write(packet)?;
            stats.packets += 1;
        }

        stats.frames += 1;
        if stats.frames.is_multiple_of(30) || stats.frames == total_frames {
            tracing::debug!(frame = i, total = total_frames, "progress");
        }
    }

    encoder.flush()?;
    while let Some(packet) = encoder.drain()? {
        sink.write(packet)?;
        stats.flush_packets += 1;
    }
    tracing::debug!(flush_packets = stats.flush_packets, "encoder drained");

    sink.close()?;
    Ok(stats)
}
