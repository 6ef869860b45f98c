use std::path::PathBuf;

use clap::Parser;

/// Record playback of an animation document as an MP4 video.
#[derive(Parser, Debug)]
#[command(name = "animrec", version)]
struct Cli {
    /// Source animation document (JSON).
    #[arg(short, long)]
    source: PathBuf,

    /// Destination video filename.
    #[arg(short, long)]
    destination: PathBuf,

    /// Animation to be played; determines the number of frames recorded.
    #[arg(short, long)]
    animation: Option<String>,

    /// Artboard to draw from.
    #[arg(short = 't', long)]
    artboard: Option<String>,

    /// Watermark image filename.
    #[arg(short, long)]
    watermark: Option<PathBuf>,

    /// Target bitrate in kbit/s.
    #[arg(long, default_value_t = 400)]
    bitrate: u32,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let document = animrec::Document::load(&cli.source)?;
    let opts = animrec::RecordOpts {
        bitrate_kbps: cli.bitrate,
        watermark: cli.watermark,
        artboard: cli.artboard,
        animation: cli.animation,
    };

    let stats = animrec::record_to_mp4(&document, &cli.destination, &opts)?;

    eprintln!(
        "wrote {} ({} frames, {} packets)",
        cli.destination.display(),
        stats.frames,
        stats.packets + stats.flush_packets
    );
    Ok(())
}
