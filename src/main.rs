use anyhow::Result;
use clap::Parser;
use screenrecord_lib::capture::{get_displays, CaptureSource};
use screenrecord_lib::commands::{spawn_event_printer, Console};
use screenrecord_lib::config::{expand_path, Config, Quality};
use screenrecord_lib::recorder::SessionController;
use screenrecord_lib::status::{format_status, StatusReporter};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;

/// Record the screen, microphone and webcam into one video file
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Command-line mode (not implemented yet)
    #[arg(long)]
    cli: bool,

    /// Config file to use instead of ./screenrecord.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for temporaries and final recordings
    #[arg(short, long)]
    output_dir: Option<String>,

    /// What to record: one display, the whole desktop, or a clicked window
    #[arg(short, long, value_enum)]
    source: Option<CaptureSource>,

    /// Display to capture, by output name (e.g. eDP-1)
    #[arg(short, long)]
    display: Option<String>,

    /// Encoder quality preset
    #[arg(short, long, value_enum)]
    quality: Option<Quality>,

    /// Record the microphone (true/false)
    #[arg(long, value_name = "BOOL")]
    audio: Option<bool>,

    /// Record the webcam from the start
    #[arg(long)]
    camera: bool,

    /// List connected displays and exit
    #[arg(long)]
    list_displays: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.output_dir {
            config.output_dir = expand_path(dir);
        }
        if let Some(source) = self.source {
            config.video.source = source;
        }
        if let Some(display) = &self.display {
            config.video.display = Some(display.clone());
        }
        if let Some(quality) = self.quality {
            config.video.quality = quality;
        }
        if let Some(audio) = self.audio {
            config.audio.enabled = audio;
        }
        if self.camera {
            config.camera.enabled = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if args.cli {
        println!("CLI mode is not implemented yet");
        return Ok(());
    }

    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    screenrecord_lib::init_tracing(config.log_level.as_deref());
    tracing::info!("Starting screenrecord v{}", env!("CARGO_PKG_VERSION"));

    if args.list_displays {
        let fallback = (config.video.fallback_width, config.video.fallback_height);
        for display in get_displays(fallback) {
            println!(
                "{}{} {}x{}+{}+{}",
                display.name,
                if display.is_primary { " (primary)" } else { "" },
                display.width,
                display.height,
                display.x,
                display.y
            );
        }
        return Ok(());
    }

    tracing::info!("Recordings go to {:?}", config.output_dir);
    let controller = Arc::new(SessionController::from_config(&config)?);
    let printer = spawn_event_printer(controller.subscribe());

    let prompting = Arc::new(AtomicBool::new(false));
    let quiet = prompting.clone();
    let reporter = StatusReporter::spawn(controller.clone(), Duration::from_secs(1), move |status| {
        if status.state.is_active() && !quiet.load(Ordering::SeqCst) {
            println!("{}", format_status(status));
        }
    });

    let mut console = Console::new(
        controller,
        BufReader::new(tokio::io::stdin()),
        std::io::stdout(),
        prompting,
    );
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let result = console.run(interrupt).await;

    drop(reporter);
    printer.abort();
    std::io::stdout().flush()?;
    result?;

    tracing::info!("screenrecord exiting");
    // A blocked stdin read would otherwise hold up runtime shutdown
    std::process::exit(0)
}
