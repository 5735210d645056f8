mod args;

use args::{Args, Mode};
use gakuen_updater::adb::{AdbBackend, AdbClient, AdbError};
use gakuen_updater::config::Config;
use gakuen_updater::error::AutomationError;
use gakuen_updater::game_automation::{
    Poller, RunController, RunOutcome, RunStage, ScreenClassifier, TemplateLibrary, TokioClock,
    plan_stages, required_states, stop_channel,
};
use gakuen_updater::template_matching::{Screenshot, TemplateMatcher};
use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
    let args = match Args::parse() {
        Ok(args) => args,
        Err(code) => std::process::exit(code),
    };
    init_logging(args.debug);
    log::info!("🤖 {}", args::version_line());

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("❌ Failed to start tokio runtime: {}", e);
            std::process::exit(1);
        }
    };
    let code = runtime.block_on(async {
        let result = match args.mode {
            Mode::Run => update(&args).await,
            Mode::Screenshot => screenshot(&args).await,
        };
        result.unwrap_or_else(|e| {
            log::error!("❌ {}", e);
            e.exit_code()
        })
    });
    std::process::exit(code);
}

fn init_logging(debug: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if debug {
        builder.filter_module("gakuen_updater", log::LevelFilter::Debug);
    }
    builder.format_timestamp_secs().init();
}

async fn connect(config: &Config) -> Result<AdbBackend, AutomationError> {
    let adb = &config.adb;
    let device = AdbBackend::connect(
        adb.backend,
        &adb.server.host,
        adb.server.port,
        &adb.device_serial,
        adb.command_timeout(),
    )
    .await?;
    Ok(device)
}

fn load_classifier(
    config: &Config,
    stages: &[RunStage],
) -> Result<ScreenClassifier, AutomationError> {
    let required = required_states(stages);
    let library = TemplateLibrary::load(&config.assets_dir, config.screens(), &required)?;
    Ok(ScreenClassifier::new(
        library,
        TemplateMatcher::new(config.matching.downscale),
    ))
}

/// One full update run. Config and assets are checked before the device is
/// touched.
async fn update(args: &Args) -> Result<i32, AutomationError> {
    let config = Config::load(&args.config_path)?;
    let stages = plan_stages(&config);
    let classifier = load_classifier(&config, &stages)?;
    let device = connect(&config).await?;

    let (stop, signal) = stop_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("🛑 Ctrl-C received, stopping at the next poll");
            stop.stop();
        }
    });

    let poller = Poller::new(TokioClock, config.poll_interval(), signal);
    let report = RunController::new(&config, &device, &classifier, poller)
        .run()
        .await;

    let executed: Vec<String> = report.executed.iter().map(|s| s.to_string()).collect();
    match &report.outcome {
        RunOutcome::Completed => log::info!(
            "🏁 Completed [{}] in {:.1}s, last screen {}",
            executed.join(" → "),
            report.elapsed.as_secs_f32(),
            report.last_state
        ),
        RunOutcome::Failed { stage, .. } => log::error!(
            "🏁 Failed in {} [{}] after {:.1}s, last screen {}",
            stage,
            executed.join(" → "),
            report.elapsed.as_secs_f32(),
            report.last_state
        ),
    }
    Ok(report.exit_code())
}

/// Capture one screenshot to disk and show how every screen scores on it.
async fn screenshot(args: &Args) -> Result<i32, AutomationError> {
    let config = Config::load(&args.config_path)?;
    let classifier = {
        let library = TemplateLibrary::load(&config.assets_dir, config.screens(), &BTreeSet::new())?;
        ScreenClassifier::new(library, TemplateMatcher::new(config.matching.downscale))
    };
    let device = connect(&config).await?;

    let cap = device.screen_capture().await?;
    let unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let path = format!("screenshot-{unix}.png");
    if let Err(e) = tokio::fs::write(&path, &cap.bytes).await {
        log::error!("❌ Write {} failed: {}", path, e);
    } else {
        println!("📸 Saved {} ({} bytes, {}ms)", path, cap.bytes.len(), cap.duration_ms);
    }

    let shot = Screenshot::from_png_bytes(&cap.bytes).map_err(|source| {
        AdbError::ScreenshotDecodeFailed {
            bytes: cap.bytes.len(),
            source,
        }
    })?;
    let seen = classifier.classify(&shot);
    println!(
        "📱 {}x{} classified as {} in {}ms",
        shot.width(),
        shot.height(),
        seen.state,
        seen.processing_time_ms
    );
    for score in &seen.scores {
        let mark = if score.is_active() { "✅" } else { "  " };
        let at = score
            .matched
            .as_ref()
            .map(|m| format!(" at ({}, {}) x{:.2}", m.x, m.y, m.scale))
            .unwrap_or_default();
        println!(
            "  {} {:<24} {:.3} / {:.2}{}",
            mark,
            score.state.to_string(),
            score.score,
            score.threshold,
            at
        );
    }
    Ok(0)
}
