use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use reel_composer::{
    config::Config,
    export::{CancelFlag, ExportArtifact, ExportFormat, ExportSettings, FfmpegEncoder, FrameRate, InMemoryEncoder, MediaEncoder, Quality},
    filters::FilterSet,
    timeline::{AspectRatio, Clip, ClipId, Cut, EditSession},
    video::{FfmpegSource, MediaSource},
};

#[derive(Parser)]
#[command(
    name = "reel-composer",
    version,
    about = "Assemble a finished video from cuts across several source recordings",
    long_about = "Reel-Composer cuts between source recordings, applies per-clip filters and framing, replaces or mutes the audio with an overlay track and exports a single MP4 or WebM file."
)]
struct Cli {
    /// Configuration file (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the metadata of a source file as JSON
    Probe {
        /// Video file to inspect
        file: PathBuf,
    },

    /// Export cuts from one or more sources as a single clip
    Export {
        #[command(flatten)]
        io: SourceArgs,

        /// Cut as SOURCE:START-END in seconds, e.g. 0:2-8 (repeat for a composite clip)
        #[arg(long = "cut", required = true)]
        cuts: Vec<CutArg>,

        /// Mute the sources' own audio
        #[arg(long)]
        mute: bool,

        #[command(flatten)]
        look: LookArgs,
    },

    /// Alternate between sources every few seconds to cover an overlay track
    Multicam {
        #[command(flatten)]
        io: SourceArgs,

        /// Length of each cut in seconds (defaults to composition.cut_duration)
        #[arg(long)]
        cut_duration: Option<f64>,

        #[command(flatten)]
        look: LookArgs,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Source video files, referenced by cuts in the order given
    #[arg(short, long = "source", required = true)]
    sources: Vec<PathBuf>,

    /// Overlay audio that replaces the sources' audio
    #[arg(short, long)]
    audio: Option<PathBuf>,

    /// Output file (defaults to a timestamped name in the current directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Render without encoding and report what would be written
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct LookArgs {
    /// Comma-separated filters: none, grayscale, nightVision, vhs
    #[arg(long, default_value = "none")]
    filters: FilterSet,

    /// Output framing: source, 1:1, 9:16, 16:9
    #[arg(long, default_value = "source")]
    aspect: AspectRatio,

    /// Container format (mp4, webm)
    #[arg(long)]
    format: Option<ExportFormat>,

    /// Quality tier (low, medium, high)
    #[arg(long)]
    quality: Option<Quality>,

    /// Frame rate (24, 30, 60)
    #[arg(long)]
    fps: Option<FrameRate>,
}

impl LookArgs {
    fn settings(&self, defaults: ExportSettings) -> ExportSettings {
        ExportSettings {
            format: self.format.unwrap_or(defaults.format),
            quality: self.quality.unwrap_or(defaults.quality),
            frame_rate: self.fps.unwrap_or(defaults.frame_rate),
        }
    }
}

/// `SOURCE:START-END`
#[derive(Debug, Clone, Copy)]
struct CutArg(Cut);

impl FromStr for CutArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (index, range) = s.split_once(':').ok_or_else(|| format!("expected SOURCE:START-END, got '{s}'"))?;
        let (start, end) = range
            .split_once('-')
            .ok_or_else(|| format!("expected START-END, got '{range}'"))?;

        let index: usize = index.trim().parse().map_err(|_| format!("invalid source index '{index}'"))?;
        let start: f64 = start.trim().parse().map_err(|_| format!("invalid start '{start}'"))?;
        let end: f64 = end.trim().parse().map_err(|_| format!("invalid end '{end}'"))?;

        Cut::new(index, start, end).map(CutArg).map_err(|e| e.to_string())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    info!("Starting Reel-Composer v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => Config::default(),
    };

    match cli.command {
        Command::Probe { file } => probe(&file, &config).await,
        Command::Export { io, cuts, mute, look } => {
            let mut session = open_session(&config, &io).await?;
            let overlay = load_overlay(&mut session, &io).await?;

            let cuts: Vec<Cut> = cuts.into_iter().map(|c| c.0).collect();
            let clip = if cuts.len() == 1 {
                Clip::simple("export", cuts[0])
            } else {
                Clip::composite("export", cuts)?
            };
            let mut clip = clip.with_muted(mute).with_filters(look.filters.clone()).with_aspect_ratio(look.aspect);
            if let Some(overlay) = overlay {
                clip = clip.with_overlay(overlay);
            }

            let id = session.add_clip(clip)?;
            let settings = look.settings(config.export.settings);
            export_clip(&session, id, settings, &io).await
        }
        Command::Multicam {
            io,
            cut_duration,
            look,
        } => {
            let mut config = config;
            if let Some(cut_duration) = cut_duration {
                config.composition.cut_duration = cut_duration;
                config.validate()?;
            }

            let mut session = open_session(&config, &io).await?;
            let Some(overlay) = load_overlay(&mut session, &io).await? else {
                bail!("multicam needs an overlay track (--audio)");
            };

            let id = session.add_multicam_clip("multicam", overlay)?;
            session.set_clip_filters(id, look.filters.clone())?;
            session.set_clip_aspect_ratio(id, look.aspect)?;

            let settings = look.settings(config.export.settings);
            export_clip(&session, id, settings, &io).await
        }
    }
}

async fn probe(file: &Path, config: &Config) -> Result<()> {
    let source = FfmpegSource::open(file, &config.export).await?;
    let metadata = source
        .metadata()
        .with_context(|| format!("{} reported no metadata", file.display()))?;
    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}

async fn open_session(config: &Config, io: &SourceArgs) -> Result<EditSession> {
    let mut session = EditSession::new(config.clone())?;
    for path in &io.sources {
        let source = FfmpegSource::open(path, &config.export)
            .await
            .with_context(|| format!("could not open {}", path.display()))?;
        session.open_source(Arc::new(source)).await?;
    }
    Ok(session)
}

async fn load_overlay(session: &mut EditSession, io: &SourceArgs) -> Result<Option<reel_composer::audio::OverlayId>> {
    match &io.audio {
        Some(path) => Ok(Some(
            session
                .load_overlay(path)
                .await
                .with_context(|| format!("could not load overlay {}", path.display()))?,
        )),
        None => Ok(None),
    }
}

async fn export_clip(session: &EditSession, id: ClipId, settings: ExportSettings, io: &SourceArgs) -> Result<()> {
    let encoder: Box<dyn MediaEncoder> = if io.dry_run {
        Box::new(InMemoryEncoder::counting())
    } else {
        let ffmpeg = FfmpegEncoder::new(&session.config().export.ffmpeg_path);
        if !ffmpeg.is_available() {
            bail!(
                "ffmpeg not found at '{}'; install it or set export.ffmpeg_path",
                session.config().export.ffmpeg_path
            );
        }
        Box::new(ffmpeg)
    };

    info!("Exporting as {}", settings);
    let mut last_logged = 0;
    let artifact = session
        .export(id, settings, encoder, &CancelFlag::new(), |percent| {
            if percent >= last_logged + 10 || percent == 100 {
                info!("Export progress: {}%", percent);
                last_logged = percent;
            }
        })
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    report(&artifact, io)
}

fn report(artifact: &ExportArtifact, io: &SourceArgs) -> Result<()> {
    if artifact.dropped_frames > 0 {
        warn!("{} frames could not be decoded and were skipped", artifact.dropped_frames);
    }

    if io.dry_run {
        println!("{}", serde_json::to_string_pretty(artifact)?);
        return Ok(());
    }

    let output = io
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(artifact.file_name()));
    artifact.save(&output)?;
    info!(
        "Saved {} ({}x{}, {:.2}s, {} bytes)",
        output.display(),
        artifact.width,
        artifact.height,
        artifact.duration,
        artifact.size_bytes()
    );
    Ok(())
}
