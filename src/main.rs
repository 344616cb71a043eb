//! Camera Session CLI
//!
//! Drives a camera manager backed by the in-memory platform: scripted
//! end-to-end scenarios, JSON-lines host call scripts, and a long-running
//! session with optional metrics export.

use camera_session::{
    platform::{DevicePosition, PlatformError},
    AutoFocusMode, CameraError, CameraManager, CameraPosition, ExposureMode, FileConfig,
    FlashMode, HostCall, HostResponse, ManagerConfig, MockPlatform, PictureOptions,
    SessionEvent, WhiteBalancePreset,
};
use clap::{Parser, Subcommand};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "camera-session")]
#[command(about = "Serialized camera capture session controller")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Keep pictures in memory instead of writing them to the photo directory
    #[arg(long, global = true)]
    no_store: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the end-to-end scenarios against the mock platform
    Demo,

    /// Execute host calls from a JSON-lines file ("-" for stdin)
    Script {
        file: PathBuf,

        /// Seconds to wait for each call to settle
        #[arg(short, long, default_value = "10")]
        timeout: u64,
    },

    /// Run a session until Ctrl+C
    Run {
        /// Camera to start with
        #[arg(short, long, value_enum, default_value = "back")]
        position: PositionArg,

        /// Take a picture every N seconds (0 to disable)
        #[arg(long, default_value = "0")]
        capture_every: u64,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum PositionArg {
    Front,
    Back,
}

impl From<PositionArg> for CameraPosition {
    fn from(arg: PositionArg) -> Self {
        match arg {
            PositionArg::Front => CameraPosition::Front,
            PositionArg::Back => CameraPosition::Back,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let mut file_config = match &cli.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    if cli.no_store {
        file_config.manager.photo_dir = None;
    }

    info!("Camera Session v{}", camera_session::VERSION);

    match cli.command.unwrap_or(Commands::Demo) {
        Commands::Demo => run_demo(&file_config.manager),
        Commands::Script { file, timeout } => {
            run_script(&file_config.manager, &file, Duration::from_secs(timeout))
        }
        Commands::Run {
            position,
            capture_every,
        } => run_session(&file_config, position.into(), capture_every),
    }
}

fn new_manager(
    platform: &MockPlatform,
    config: &ManagerConfig,
) -> Result<CameraManager, CameraError> {
    let manager = CameraManager::new(Arc::new(platform.clone()), config.clone())?;
    manager.subscribe(Arc::new(|event: &SessionEvent| match event {
        SessionEvent::Fatal { error } => error!(message = %error.message, "Session event: fatal"),
        SessionEvent::RuntimeError { message } => warn!(%message, "Session event: runtime error"),
        other => info!(event = ?other, "Session event"),
    }));
    Ok(manager)
}

fn report(scenario: &str, passed: bool) {
    if passed {
        info!(scenario, "PASS");
    } else {
        warn!(scenario, "FAIL");
    }
}

fn run_demo(config: &ManagerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut failures = 0;
    let mut check = |scenario: &str, passed: bool| {
        report(scenario, passed);
        if !passed {
            failures += 1;
        }
    };

    // Cold start, back camera, capture.
    {
        let platform = MockPlatform::new();
        let manager = new_manager(&platform, config)?;
        manager.set_camera_position(CameraPosition::Back);
        manager.start();
        let picture = manager
            .take_picture(PictureOptions::with_quality(0.8))
            .wait()?;
        info!(
            width = picture.width,
            height = picture.height,
            bytes = picture.data.len(),
            uri = ?picture.uri,
            "Captured picture"
        );
        check(
            "cold start and capture",
            !picture.data.is_empty() && manager.state().is_running(),
        );
    }

    // Switch while running.
    {
        let platform = MockPlatform::new();
        let manager = new_manager(&platform, config)?;
        manager.set_camera_position(CameraPosition::Back);
        manager.start();
        manager.set_camera_position(CameraPosition::Front).wait()?;
        check(
            "switch while running",
            manager.state().is_running()
                && platform.bound_positions() == vec![DevicePosition::Front],
        );
    }

    // Torch override.
    {
        let platform = MockPlatform::new();
        let manager = new_manager(&platform, config)?;
        manager.set_flash_mode(FlashMode::On);
        manager.set_flash_mode(FlashMode::Torch);
        manager.start();
        manager.take_picture(PictureOptions::default()).wait()?;
        let captures = platform.captures();
        check(
            "torch override",
            captures.len() == 1
                && captures[0].torch == camera_session::platform::TorchMode::On
                && captures[0].flash == camera_session::platform::FlashSetting::Off,
        );
    }

    // Invalid enum.
    {
        let platform = MockPlatform::new();
        let manager = new_manager(&platform, config)?;
        let before = manager.snapshot();
        let rejected = manager.dispatch(HostCall::SetWhiteBalance(99));
        manager.flush().wait()?;
        check(
            "invalid white balance",
            matches!(rejected, Err(CameraError::InvalidArgument(_)))
                && manager.snapshot() == before,
        );
    }

    // Recovery, then escalation.
    {
        let platform = MockPlatform::new();
        let manager = new_manager(&platform, config)?;
        manager.start().wait()?;
        platform.inject_runtime_error(PlatformError::MediaServicesReset);
        manager.flush().wait()?;
        let recovered = manager.state().is_running() && platform.is_running();
        platform.inject_runtime_error(PlatformError::MediaServicesReset);
        manager.flush().wait()?;
        let snapshot = manager.snapshot();
        check(
            "runtime error recovery",
            recovered
                && snapshot.state == camera_session::SessionState::Stopped
                && snapshot.stats.recoveries == 1
                && snapshot.stats.fatal_errors == 1,
        );
    }

    // Custom exposure without parameters.
    {
        let platform = MockPlatform::new();
        let manager = new_manager(&platform, config)?;
        manager.start();
        let result = manager.set_exposure_mode(ExposureMode::Custom, None).wait();
        let effective = manager.snapshot().effective.exposure;
        check(
            "custom exposure without parameters",
            result == Err(CameraError::ExposureParamsMissing)
                && effective
                    == Some(camera_session::platform::ExposureSetting::ContinuousAutoExposure),
        );
    }

    // Remaining setters on a running session.
    {
        let platform = MockPlatform::new();
        let manager = new_manager(&platform, config)?;
        manager.start();
        manager.set_auto_focus(AutoFocusMode::Locked);
        manager.set_white_balance(WhiteBalancePreset::Incandescent);
        manager.flush().wait()?;
        let snapshot = manager.snapshot();
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        check(
            "focus and white balance",
            snapshot.stats.configurations >= 3 && snapshot.state.is_running(),
        );
    }

    if failures > 0 {
        return Err(format!("{failures} scenario(s) failed").into());
    }
    info!("All scenarios passed");
    Ok(())
}

fn run_script(
    config: &ManagerConfig,
    file: &Path,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let reader: Box<dyn BufRead> = if file.as_os_str() == "-" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        Box::new(BufReader::new(std::fs::File::open(file)?))
    };

    let platform = MockPlatform::new();
    let manager = new_manager(&platform, config)?;

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let call: HostCall = match serde_json::from_str(line) {
            Ok(call) => call,
            Err(e) => {
                warn!(line = number + 1, error = %e, "Skipping malformed host call");
                continue;
            }
        };

        let method = call.method();
        let outcome = manager
            .dispatch(call)
            .and_then(|completion| completion.wait_timeout(timeout));
        let response = HostResponse::new(method, outcome);
        println!("{}", serde_json::to_string(&response)?);
    }

    manager.flush().wait()?;
    println!("{}", serde_json::to_string(&manager.snapshot())?);
    Ok(())
}

fn run_session(
    file_config: &FileConfig,
    position: CameraPosition,
    capture_every: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let platform = MockPlatform::new();
    let manager = new_manager(&platform, &file_config.manager)?;
    manager.set_camera_position(position);
    manager.start().wait()?;

    #[cfg(feature = "metrics")]
    let exporter = start_metrics(file_config.output.metrics_port)?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        stop_flag.store(true, Ordering::SeqCst);
    })?;

    info!("Session running (press Ctrl+C to stop)");
    let mut last_capture = Instant::now();
    let mut last_report = Instant::now();

    while !stop.load(Ordering::SeqCst) {
        if capture_every > 0 && last_capture.elapsed() >= Duration::from_secs(capture_every) {
            last_capture = Instant::now();
            match manager.take_picture(PictureOptions::default()).wait() {
                Ok(picture) => info!(uri = ?picture.uri, bytes = picture.data.len(), "Captured"),
                Err(e) => warn!(error = %e, "Capture failed"),
            }
        }

        if last_report.elapsed() >= Duration::from_secs(5) {
            last_report = Instant::now();
            let snapshot = manager.snapshot();
            if file_config.output.json {
                println!("{}", serde_json::to_string(&snapshot)?);
            } else {
                info!(
                    state = %snapshot.state,
                    position = ?snapshot.bound_position,
                    captures = snapshot.stats.captures_completed,
                    queue_depth = manager.queue_depth(),
                    "Session status"
                );
            }
            #[cfg(feature = "metrics")]
            if let Some((runtime, state)) = &exporter {
                let depth = manager.queue_depth();
                runtime.block_on(async { state.write().await.update(snapshot, depth) });
            }
        }

        std::thread::sleep(Duration::from_millis(100));
    }

    info!("Stopping session");
    manager.stop().wait()?;
    manager.teardown().wait()?;
    Ok(())
}

#[cfg(feature = "metrics")]
type Exporter = (
    tokio::runtime::Runtime,
    Arc<tokio::sync::RwLock<camera_session::metrics::MetricsState>>,
);

#[cfg(feature = "metrics")]
fn start_metrics(port: u16) -> Result<Option<Exporter>, Box<dyn std::error::Error>> {
    use camera_session::metrics::{MetricsRegistry, MetricsServer, MetricsServerConfig};

    if port == 0 {
        return Ok(None);
    }
    let runtime = tokio::runtime::Runtime::new()?;
    let server = MetricsServer::new(MetricsServerConfig::with_port(port), MetricsRegistry::new()?);
    let state = server.state();
    runtime.spawn(async move {
        if let Err(e) = server.run().await {
            error!(error = %e, "Metrics server stopped");
        }
    });
    Ok(Some((runtime, state)))
}
