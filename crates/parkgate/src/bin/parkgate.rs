//! parkgate CLI: admission service, camera watcher and offline detection.

use clap::{Args, Parser, Subcommand};
use log::info;
use parkgate::camera::HttpCamera;
use parkgate::config::{LoggingConfig, ParkgateConfig};
use parkgate::notify::AdmissionClient;
use parkgate::plate::annotate::annotate;
use parkgate::server::AdmissionServer;
use parkgate::watch::Watcher;
use parkgate::{AdmissionController, PlateDetector};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "parkgate")]
#[command(about = "Licence-plate gate and two-lot admission service")]
#[command(version)]
struct Cli {
    /// Log level (off, error, warn, info, debug, trace); overrides the config file.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP admission API.
    Serve(ConfigArgs),

    /// Poll the camera and notify the admission API of every plate read.
    Watch(ConfigArgs),

    /// Run the plate pipeline on one image.
    Detect(DetectArgs),

    /// Write the default configuration.
    InitConfig {
        /// Destination TOML file.
        #[arg(long)]
        out: PathBuf,

        /// Replace an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    /// TOML configuration; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct DetectArgs {
    /// Input image.
    #[arg(long)]
    image: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,

    /// Write the frame with candidate boxes drawn on it.
    #[arg(long)]
    annotate: Option<PathBuf>,

    /// Print plates and localizer diagnostics as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => {
            let cfg = load_config(args.config.as_deref())?;
            init_logging(&cfg.logging, cli.log_level.as_deref())?;
            run_serve(cfg)
        }
        Commands::Watch(args) => {
            let cfg = load_config(args.config.as_deref())?;
            init_logging(&cfg.logging, cli.log_level.as_deref())?;
            run_watch(cfg)
        }
        Commands::Detect(args) => {
            let cfg = load_config(args.config.config.as_deref())?;
            init_logging(&cfg.logging, cli.log_level.as_deref())?;
            run_detect(&cfg, &args)
        }
        Commands::InitConfig { out, force } => run_init_config(&out, force),
    }
}

fn load_config(path: Option<&Path>) -> CliResult<ParkgateConfig> {
    Ok(match path {
        Some(path) => ParkgateConfig::load(path)?,
        None => ParkgateConfig::default(),
    })
}

fn init_logging(cfg: &LoggingConfig, level_override: Option<&str>) -> CliResult<()> {
    let mut cfg = cfg.clone();
    if let Some(level) = level_override {
        cfg.level = level.to_string();
    }
    let level = cfg.level_filter()?;

    #[cfg(feature = "tracing")]
    {
        let _ = tracing_log::LogTracer::init();
        parkgate::core::init_tracing(&level.to_string().to_lowercase(), cfg.json);
    }
    #[cfg(not(feature = "tracing"))]
    parkgate::core::init_with_level(level).map_err(|e| e.to_string())?;
    Ok(())
}

fn stop_on_ctrlc() -> CliResult<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        info!("interrupt received, stopping");
        flag.store(true, Ordering::Relaxed);
    })?;
    Ok(stop)
}

fn run_serve(cfg: ParkgateConfig) -> CliResult<()> {
    let store = cfg.facility.open_store()?;
    let controller = Arc::new(AdmissionController::new(store, cfg.admission));
    let server = AdmissionServer::bind(cfg.server, controller)?;
    let stop = stop_on_ctrlc()?;
    server.run(&stop)?;
    Ok(())
}

fn run_watch(cfg: ParkgateConfig) -> CliResult<()> {
    let detector = PlateDetector::new(cfg.detector_params(), Arc::new(cfg.ocr_engine()));
    let client = AdmissionClient::new(
        &cfg.watch.admission_url,
        Duration::from_millis(cfg.watch.notify_timeout_ms),
    );
    let camera = HttpCamera::from_config(&cfg.camera);
    info!("camera {}, admission API {}", camera.url(), client.base_url());

    let stop = stop_on_ctrlc()?;
    let mut watcher = Watcher::new(camera, detector, client, cfg.watch);
    watcher.run(&stop);
    Ok(())
}

fn run_detect(cfg: &ParkgateConfig, args: &DetectArgs) -> CliResult<()> {
    info!("loading image: {}", args.image.display());
    let frame = image::open(&args.image)?.to_rgb8();
    let detector = PlateDetector::new(cfg.detector_params(), Arc::new(cfg.ocr_engine()));
    let (reads, diagnostics) = detector.detect_with_diagnostics(&frame)?;

    if let Some(path) = &args.annotate {
        annotate(&frame, &diagnostics).save(path)?;
        info!("annotated frame written to {}", path.display());
    }

    if args.json {
        let report = json!({ "plates": reads, "diagnostics": diagnostics });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if reads.is_empty() {
        println!(
            "no plate found ({} contours, {} candidates)",
            diagnostics.contours,
            diagnostics.candidates.len()
        );
    } else {
        for read in &reads {
            let b = read.candidate.bbox;
            println!("{}\t{}x{}+{}+{}", read.text, b.width, b.height, b.x, b.y);
        }
    }
    Ok(())
}

fn run_init_config(out: &Path, force: bool) -> CliResult<()> {
    if out.exists() && !force {
        return Err(format!("{} already exists; pass --force to replace it", out.display()).into());
    }
    ParkgateConfig::default().save(out)?;
    println!("wrote default configuration to {}", out.display());
    Ok(())
}
