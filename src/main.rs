use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use image::RgbImage;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use engagetrack_rs::{
    AnalysisPipeline, AnalyzerConfig, AssociationStrategy, BatchEntry, BatchReport,
    DetectionSource, FrameSource, FrameSummary, HandRaisePolicy, ImageSequence,
    RecordedDetections, SessionReport, Session, annotate,
};

#[derive(Parser, Debug)]
#[command(name = "engagetrack", version, about = "Classroom engagement analytics from video frames")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Track faces, score engagement and write a session report
    Analyze(AnalyzeArgs),
    /// Analyze every source in a directory and write a combined report
    Batch(BatchArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Preset {
    Accurate,
    FixedRoster,
    Realtime,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    SkinRatio,
    Classifier,
    PoseLandmarks,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Directory of frame images, played in file-name order
    #[arg(long, value_name = "DIR")]
    frames: Option<PathBuf>,

    /// Video file decoded with OpenCV
    #[cfg(feature = "opencv-backend")]
    #[arg(long, value_name = "PATH", conflicts_with = "frames")]
    video: Option<PathBuf>,

    /// Frame rate of the image directory
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// JSON Lines file with one detection array per frame
    #[arg(long, value_name = "PATH")]
    detections: Option<PathBuf>,

    #[cfg(feature = "opencv-backend")]
    #[arg(long, value_name = "PATH", default_value = "haarcascade_frontalface_default.xml")]
    face_cascade: PathBuf,

    #[cfg(feature = "opencv-backend")]
    #[arg(long, value_name = "PATH", default_value = "haarcascade_eye.xml")]
    eye_cascade: PathBuf,

    #[command(flatten)]
    analyzer: ConfigArgs,

    #[arg(long, value_name = "PATH")]
    report_json: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    report_csv: Option<PathBuf>,

    /// Write annotated frames into this directory
    #[arg(long, value_name = "DIR")]
    annotate: Option<PathBuf>,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Directory whose frame sub-directories (and, with OpenCV, video files)
    /// are analyzed one by one
    #[arg(long, value_name = "DIR")]
    input: PathBuf,

    /// Directory receiving one report per source and the combined report
    #[arg(long, value_name = "DIR", default_value = "reports")]
    output: PathBuf,

    /// Frame rate of image directories
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    #[cfg(feature = "opencv-backend")]
    #[arg(long, value_name = "PATH", default_value = "haarcascade_frontalface_default.xml")]
    face_cascade: PathBuf,

    #[cfg(feature = "opencv-backend")]
    #[arg(long, value_name = "PATH", default_value = "haarcascade_eye.xml")]
    eye_cascade: PathBuf,

    #[command(flatten)]
    analyzer: ConfigArgs,
}

/// Analyzer configuration shared by every subcommand.
#[derive(Args, Debug)]
struct ConfigArgs {
    /// JSON analyzer config; flags below override its values
    #[arg(long, value_name = "PATH", conflicts_with = "preset")]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    preset: Option<Preset>,

    /// Tracking gate in pixels
    #[arg(long)]
    gate: Option<f32>,

    #[arg(long)]
    max_identities: Option<usize>,

    /// Solve association as a global assignment instead of greedily
    #[arg(long)]
    optimal: bool,

    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    /// Hand-raise classifier artifact (JSON forest)
    #[arg(long, value_name = "PATH")]
    model: Option<PathBuf>,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("engagetrack=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}

fn build_config(args: &ConfigArgs) -> Result<AnalyzerConfig> {
    let mut config = match (&args.config, args.preset) {
        (Some(path), _) => AnalyzerConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        (None, Some(Preset::Accurate)) => AnalyzerConfig::accurate(),
        (None, Some(Preset::FixedRoster)) => AnalyzerConfig::fixed_roster(),
        (None, Some(Preset::Realtime)) => AnalyzerConfig::realtime(),
        (None, None) => AnalyzerConfig::default(),
    };

    if let Some(gate) = args.gate {
        config.tracker.tracking_gate = gate;
    }
    if let Some(max) = args.max_identities {
        config.tracker.max_identities = Some(max);
    }
    if args.optimal {
        config.tracker.association = AssociationStrategy::Optimal;
    }
    if let Some(policy) = args.policy {
        config.hand_raise = match policy {
            PolicyArg::SkinRatio => HandRaisePolicy::skin_ratio(),
            PolicyArg::Classifier => HandRaisePolicy::classifier(),
            PolicyArg::PoseLandmarks => HandRaisePolicy::pose_landmarks(),
        };
    }
    if let Some(model) = &args.model {
        config.classifier_path = Some(model.clone());
    }

    config.validate().context("invalid analyzer configuration")?;
    Ok(config)
}

fn write_annotated(dir: &Path, frame: &RgbImage, summary: &FrameSummary) -> Result<()> {
    let mut canvas = frame.clone();
    annotate(&mut canvas, summary);
    let path = dir.join(format!("frame_{:06}.png", summary.frame_index));
    canvas
        .save(&path)
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Per-run output knobs of `analyze`; batch runs use the defaults.
#[derive(Debug, Default, Clone, Copy)]
struct RunOptions<'a> {
    annotate: Option<&'a Path>,
    max_frames: Option<u64>,
}

fn analyze_with<D, S>(
    options: RunOptions<'_>,
    config: &AnalyzerConfig,
    detector: D,
    mut source: S,
) -> Result<SessionReport>
where
    D: DetectionSource,
    S: FrameSource,
{
    let session = Session::new(config, source.fps())?;
    let mut pipeline = AnalysisPipeline::new(detector, session);

    if let Some(dir) = options.annotate {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let mut write_error = None;
    let report = pipeline.run_with(&mut source, |frame, summary| {
        if let Some(dir) = options.annotate {
            if let Err(e) = write_annotated(dir, frame, summary) {
                write_error = Some(e);
                return ControlFlow::Break(());
            }
        }
        if summary.frame_index % 100 == 0 {
            info!(
                frame = summary.frame_index,
                students = summary.stable_count,
                "progress"
            );
        }
        match options.max_frames {
            Some(max) if summary.frame_index >= max => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        }
    })?;

    if let Some(e) = write_error {
        return Err(e);
    }
    Ok(report)
}

fn recorded_detections(path: Option<&Path>) -> Result<RecordedDetections> {
    match path {
        Some(path) => RecordedDetections::from_jsonl_file(path)
            .with_context(|| format!("failed to load detections {}", path.display())),
        None => {
            warn!("no detections supplied, every frame will be empty");
            Ok(RecordedDetections::default())
        }
    }
}

#[cfg(feature = "opencv-backend")]
fn run_analysis(args: &AnalyzeArgs, config: &AnalyzerConfig) -> Result<SessionReport> {
    use engagetrack_rs::{CascadeDetector, VideoCaptureSource};

    if let Some(video) = &args.video {
        let source = VideoCaptureSource::open(video)?;
        if let Some(path) = &args.detections {
            let detections = recorded_detections(Some(path.as_path()))?;
            return analyze_with(args.options(), config, detections, source);
        }
        let detector =
            CascadeDetector::new(&args.face_cascade, &args.eye_cascade, config.detector.clone())
                .context("failed to load cascades")?;
        return analyze_with(args.options(), config, detector, source);
    }
    run_frames(args, config)
}

#[cfg(not(feature = "opencv-backend"))]
fn run_analysis(args: &AnalyzeArgs, config: &AnalyzerConfig) -> Result<SessionReport> {
    run_frames(args, config)
}

fn run_frames(args: &AnalyzeArgs, config: &AnalyzerConfig) -> Result<SessionReport> {
    let Some(dir) = &args.frames else {
        bail!("provide a frame source (--frames DIR)");
    };
    let source = ImageSequence::open(dir, args.fps)?;
    let detections = recorded_detections(args.detections.as_deref())?;
    analyze_with(args.options(), config, detections, source)
}

impl AnalyzeArgs {
    fn options(&self) -> RunOptions<'_> {
        RunOptions {
            annotate: self.annotate.as_deref(),
            max_frames: self.max_frames,
        }
    }
}

fn analyze(args: AnalyzeArgs) -> Result<()> {
    let config = build_config(&args.analyzer)?;
    let report = run_analysis(&args, &config)?;

    if let Some(path) = &args.report_json {
        report
            .write_json(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "wrote JSON report");
    }
    if let Some(path) = &args.report_csv {
        report
            .write_csv(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "wrote CSV report");
    }
    if args.report_json.is_none() && args.report_csv.is_none() {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

/// Recorded detections for a frame directory live next to its images.
const BATCH_DETECTIONS_FILE: &str = "detections.jsonl";

#[cfg(feature = "opencv-backend")]
const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mov", "mkv"];

#[derive(Debug)]
enum BatchSource {
    Frames(PathBuf),
    #[cfg(feature = "opencv-backend")]
    Video(PathBuf),
}

impl BatchSource {
    fn path(&self) -> &Path {
        match self {
            BatchSource::Frames(p) => p,
            #[cfg(feature = "opencv-backend")]
            BatchSource::Video(p) => p,
        }
    }

    fn name(&self) -> String {
        let path = self.path();
        path.file_stem()
            .unwrap_or(path.as_os_str())
            .to_string_lossy()
            .into_owned()
    }
}

fn discover_sources(dir: &Path) -> Result<Vec<BatchSource>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    paths.sort();

    let mut sources = Vec::new();
    for path in paths {
        if path.is_dir() {
            sources.push(BatchSource::Frames(path));
        } else if let Some(video) = video_source(path) {
            sources.push(video);
        }
    }
    Ok(sources)
}

#[cfg(feature = "opencv-backend")]
fn video_source(path: PathBuf) -> Option<BatchSource> {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| VIDEO_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .then_some(BatchSource::Video(path))
}

#[cfg(not(feature = "opencv-backend"))]
fn video_source(_path: PathBuf) -> Option<BatchSource> {
    None
}

fn analyze_source(
    args: &BatchArgs,
    config: &AnalyzerConfig,
    source: &BatchSource,
) -> Result<SessionReport> {
    match source {
        BatchSource::Frames(dir) => {
            let frames = ImageSequence::open(dir, args.fps)?;
            let recorded = dir.join(BATCH_DETECTIONS_FILE);
            let detections =
                recorded_detections(recorded.is_file().then_some(recorded.as_path()))?;
            analyze_with(RunOptions::default(), config, detections, frames)
        }
        #[cfg(feature = "opencv-backend")]
        BatchSource::Video(path) => {
            use engagetrack_rs::{CascadeDetector, VideoCaptureSource};

            let frames = VideoCaptureSource::open(path)?;
            let detector =
                CascadeDetector::new(&args.face_cascade, &args.eye_cascade, config.detector.clone())
                    .context("failed to load cascades")?;
            analyze_with(RunOptions::default(), config, detector, frames)
        }
    }
}

fn batch(args: BatchArgs) -> Result<()> {
    let config = build_config(&args.analyzer)?;
    let sources = discover_sources(&args.input)?;
    if sources.is_empty() {
        bail!("no sources found in {}", args.input.display());
    }
    fs::create_dir_all(&args.output)
        .with_context(|| format!("failed to create {}", args.output.display()))?;
    info!(sources = sources.len(), "starting batch");

    let mut entries = Vec::with_capacity(sources.len());
    for (idx, source) in sources.iter().enumerate() {
        let name = source.name();
        info!(source = %name, index = idx + 1, total = sources.len(), "analyzing source");

        // One failing source does not abort the batch.
        let report = match analyze_source(&args, &config, source) {
            Ok(report) => report,
            Err(e) => {
                warn!(source = %name, error = %e, "source failed, skipping");
                continue;
            }
        };

        let path = args.output.join(format!("report_{name}.json"));
        report
            .write_json(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(
            source = %name,
            students = report.total_identities,
            engagement = report.summary.avg_engagement,
            hand_raises = report.summary.total_hand_raises,
            "source done"
        );
        entries.push(BatchEntry {
            video: name,
            report,
        });
    }

    if entries.is_empty() {
        bail!("every source in {} failed", args.input.display());
    }

    let combined = BatchReport::from_entries(entries);
    let path = args.output.join("combined_report.json");
    combined
        .write_json(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(
        path = %path.display(),
        videos = combined.total_videos_processed,
        "wrote combined report"
    );
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Analyze(args) => analyze(args),
        Command::Batch(args) => batch(args),
    }
}
