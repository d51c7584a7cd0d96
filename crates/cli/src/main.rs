use anyhow::{Context, Result, bail};
use arboard::Clipboard;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use photobooth_core::capture::{CaptureRenderer, CaptureSession, ScreenDevice};
use photobooth_core::config::{GenerationTier, ImageSize, PoseMode, SubjectMode};
use photobooth_core::scenes::{SCENES, SceneId};
use photobooth_core::share::{fetch_qr_code, qr_code_url};
use photobooth_core::{LiveBooth, PhotoBooth, ProcessingConfig, RasterImage, Settings, Watermark, init};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "photobooth", author, version, about = "Virtual photo booth powered by Gemini", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available background scenes
    Scenes,
    /// List monitors usable as capture sources
    Monitors,
    /// Capture a mirrored portrait still from a monitor
    Capture {
        #[arg(long, default_value_t = 0)]
        monitor: usize,
        /// Output JPEG path
        #[arg(short, long, default_value = "capture.jpg")]
        out: PathBuf,
    },
    /// Composite a photo into a scene, optionally edit and share it
    Compose(ComposeArgs),
    /// Stamp the watermark onto an existing image
    Watermark {
        input: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Show or change saved defaults
    Settings(SettingsArgs),
}

#[derive(Args, Debug, Default)]
struct Choices {
    /// Background scene (book_collection, learning_resources)
    #[arg(long)]
    scene: Option<SceneId>,
    /// Generation tier (fast, pro)
    #[arg(long)]
    tier: Option<GenerationTier>,
    /// Subject mode (single, group, family)
    #[arg(long)]
    subject: Option<SubjectMode>,
    /// Pose (natural, v-sign, heart, candid, free)
    #[arg(long)]
    pose: Option<PoseMode>,
    /// Output size for the pro tier (1K, 2K, 4K)
    #[arg(long)]
    size: Option<ImageSize>,
}

#[derive(Args, Debug)]
struct ComposeArgs {
    /// Photo to use; captures from --monitor when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    #[arg(long, default_value_t = 0)]
    monitor: usize,

    #[command(flatten)]
    choices: Choices,

    /// Natural-language edit applied after compositing (repeatable)
    #[arg(long)]
    edit: Vec<String>,

    /// Output JPEG path
    #[arg(short, long, default_value = "booth.jpg")]
    out: PathBuf,

    /// Upload the result and print a QR code link
    #[arg(long)]
    share: bool,

    /// ImgBB API key (overrides settings and IMGBB_API_KEY)
    #[arg(long, env = "IMGBB_API_KEY", hide_env_values = true)]
    imgbb_key: Option<String>,

    /// Save the QR code image here after sharing (extension added if missing)
    #[arg(long)]
    qr_out: Option<PathBuf>,

    /// Copy the public URL to the clipboard
    #[arg(short, long, default_value_t = false)]
    copy: bool,
}

#[derive(Args, Debug)]
struct SettingsArgs {
    #[command(flatten)]
    choices: Choices,

    /// Saved ImgBB API key
    #[arg(long)]
    imgbb_key: Option<String>,
}

impl Choices {
    fn apply(&self, settings: &mut Settings) {
        if let Some(scene) = self.scene {
            settings.scene = scene;
        }
        if let Some(tier) = self.tier {
            settings.tier = tier;
        }
        if let Some(subject) = self.subject {
            settings.subject_mode = subject;
        }
        if let Some(pose) = self.pose {
            settings.pose_mode = pose;
        }
        if let Some(size) = self.size {
            settings.image_size = size;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init();
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Scenes => {
            for scene in SCENES {
                println!("{:<20} {} - {}", scene.id, scene.name, scene.description);
            }
            println!();
            println!("Subjects: {}", join_labels(SubjectMode::ALL.iter().map(|m| m.label())));
            println!("Poses:    {}", join_labels(PoseMode::ALL.iter().map(|m| m.label())));
            Ok(())
        }
        Command::Monitors => {
            let devices = ScreenDevice::all().context("Failed to enumerate monitors")?;
            println!("Available monitors:");
            for device in devices {
                println!("{}", device.describe());
            }
            Ok(())
        }
        Command::Capture { monitor, out } => {
            let still = capture_from_monitor(monitor)?;
            let saved = write_image(&out, &still)?;
            println!("Saved capture to {}", saved.display());
            Ok(())
        }
        Command::Compose(args) => compose(args).await,
        Command::Watermark { input, out } => {
            let bytes = fs::read(&input).with_context(|| format!("Failed to read {}", input.display()))?;
            let font = std::env::var_os("PHOTOBOOTH_FONT").map(PathBuf::from);
            let stamped = Watermark::load(font.as_deref()).apply(&RasterImage::from_bytes(bytes));
            let saved = write_image(&out, &stamped)?;
            println!("Saved {}", saved.display());
            Ok(())
        }
        Command::Settings(args) => {
            let mut settings = Settings::load();
            args.choices.apply(&mut settings);
            if let Some(key) = args.imgbb_key {
                settings.imgbb_api_key = key;
            }
            settings.save().context("Failed to save settings")?;

            println!("Tier:    {:?} ({})", settings.tier, settings.tier.model_id());
            println!("Scene:   {}", settings.scene);
            println!("Subject: {}", settings.subject_mode);
            println!("Pose:    {}", settings.pose_mode);
            println!("Size:    {}", settings.image_size.as_str());
            println!(
                "ImgBB:   {}",
                if settings.imgbb_api_key.is_empty() { "(not set)" } else { "(set)" }
            );
            if let Some(path) = Settings::config_path() {
                println!("Saved to {}", path.display());
            }
            Ok(())
        }
    }
}

async fn compose(args: ComposeArgs) -> Result<()> {
    let mut app = PhotoBooth::new().context("Failed to load configuration")?;
    args.choices.apply(app.settings_mut());
    let mut config = app.processing_config();
    if let Some(key) = &args.imgbb_key {
        config.upload_key = key.clone();
    }

    let mut booth = app.booth().context("Failed to initialize booth")?;

    match &args.input {
        Some(path) => {
            let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            booth
                .load_photo(&RasterImage::from_bytes(bytes))
                .context("Failed to load photo")?;
        }
        None => {
            let mut device = ScreenDevice::by_index(args.monitor)
                .context("Failed to open monitor. Try `photobooth monitors` to check indices")?;
            let mut session = CaptureSession::open(&mut device)?;
            if !booth.capture(&mut session)? {
                bail!("No frame available from monitor {}", args.monitor);
            }
        }
    }

    run_with_spinner(
        format!("Compositing into {} with {}...", config.scene, config.tier.model_id()),
        booth.process(&config),
    )
    .await
    .context("Compositing failed")?;

    for instruction in &args.edit {
        run_with_spinner(format!("Editing: {}", instruction), booth.edit(instruction))
            .await
            .with_context(|| format!("Edit '{}' failed", instruction))?;
    }

    let result = booth.processed().context("No result produced")?;
    let saved = write_image(&args.out, result)?;
    println!("Saved {}", saved.display());

    if args.share {
        share(&mut booth, &config, &args).await?;
    }

    Ok(())
}

async fn share(booth: &mut LiveBooth, config: &ProcessingConfig, args: &ComposeArgs) -> Result<()> {
    if config.upload_key.trim().is_empty() {
        bail!("Sharing needs an ImgBB API key: pass --imgbb-key, set IMGBB_API_KEY, or run `photobooth settings --imgbb-key`");
    }

    let url = run_with_spinner("Uploading...".to_string(), booth.share(&config.upload_key))
        .await
        .context("Upload failed")?;

    println!("Public URL: {}", url);
    println!("QR code:    {}", qr_code_url(&url)?);

    if let Some(path) = &args.qr_out {
        let qr = fetch_qr_code(&reqwest::Client::new(), &url)
            .await
            .context("Failed to download QR code")?;
        let saved = write_image(path, &qr)?;
        println!("Saved QR code to {}", saved.display());
    }

    if args.copy {
        match Clipboard::new() {
            Ok(mut clipboard) => {
                if let Err(e) = clipboard.set_text(url.clone()) {
                    eprintln!("Warning: Failed to copy to clipboard: {}", e);
                } else {
                    println!("(Copied to clipboard)");
                }
            }
            Err(e) => eprintln!("Warning: Could not access clipboard: {}", e),
        }
    }

    Ok(())
}

fn capture_from_monitor(monitor: usize) -> Result<RasterImage> {
    let mut device = ScreenDevice::by_index(monitor)
        .context("Failed to open monitor. Try `photobooth monitors` to check indices")?;
    let mut session = CaptureSession::open(&mut device)?;
    CaptureRenderer::default()
        .capture(&mut session)?
        .with_context(|| format!("No frame available from monitor {}", monitor))
}

fn join_labels<'a>(labels: impl Iterator<Item = &'a str>) -> String {
    labels.collect::<Vec<_>>().join(", ")
}

/// Writes `image`, adding the extension matching its format when `path` has none.
fn write_image(path: &Path, image: &RasterImage) -> Result<PathBuf> {
    let path = match path.extension() {
        Some(_) => path.to_path_buf(),
        None => path.with_extension(image.extension()),
    };
    fs::write(&path, image.bytes()).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

async fn run_with_spinner<T>(
    message: String,
    work: impl std::future::Future<Output = photobooth_core::Result<T>>,
) -> photobooth_core::Result<T> {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
        .template("{spinner:.green} {msg}")
    {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));

    let outcome = work.await;
    spinner.finish_and_clear();
    outcome
}
