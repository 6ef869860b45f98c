#![forbid(unsafe_code)]

//! Record a sampled vector-animation timeline into an MP4 video.
//!
//! The pipeline poses an animation for each discrete frame index,
//! rasterizes it on the CPU, converts the raster to planar 4:2:0, encodes
//! H.264 and muxes the packets into an MP4 container. Single-threaded and
//! fully synchronous: the run either completes or aborts in place.

pub mod anim;
pub mod convert;
pub mod core;
pub mod document;
pub mod encode;
pub mod error;
pub mod mux;
pub mod pipeline;
pub mod render;
pub mod sampler;

pub use anim::{Ease, InterpMode, Keyframe, Track};
pub use convert::{PlanarYuvFrame, YuvConverter};
pub use core::{Canvas, FrameIndex, Fps, TimeBase};
pub use document::{Artboard, Channel, ChannelTrack, Document, LinearAnimation, Shape, ShapeKind};
pub use encode::{
    AvcParams, CodecId, CompressedPacket, H264Encoder, PixelFormat, StreamDescriptor, VideoEncoder,
};
pub use error::{AnimrecError, AnimrecResult};
pub use mux::{Mp4Muxer, PacketSink};
pub use pipeline::{RecordOpts, RecordStats, record_to_mp4, run_pipeline};
pub use render::{FrameRenderer, RasterFrame, Watermark};
pub use sampler::{AnimationSampler, ArtboardSampler, Fit};
