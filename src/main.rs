//! launchpad-gw - drive keyboard macro bindings from a Novation Launchpad

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use launchpad_gw::config::AppConfig;
use launchpad_gw::keymap::{ConsoleKeys, KeyBinding, KeySink};
use launchpad_gw::launchpad::{discovery, LaunchpadDriver};
use launchpad_gw::{Brightness, Region, Surface};

/// Launchpad Gateway - turn pad presses into keyboard macros
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Sweep a region's LEDs through every brightness and exit
    /// (all, grid, row or column)
    #[arg(long, value_name = "REGION")]
    test_leds: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level)?;

    if args.list_ports {
        discovery::print_ports();
        return Ok(());
    }

    info!("Starting launchpad-gw...");
    info!("Configuration file: {}", args.config);

    let config = AppConfig::load(&args.config).await?;

    let mut driver = LaunchpadDriver::new(&config.midi.input_port, &config.midi.output_port);
    driver.connect()?;

    if let Some(target) = args.test_leds.as_deref() {
        run_led_test(&driver, target).await?;
        driver.clear_all()?;
        driver.disconnect();
        return Ok(());
    }

    let mut surface = Surface::new(driver);

    // Blank slate before painting the bound pads.
    surface.clear_all()?;

    let sink: Arc<dyn KeySink> = Arc::new(ConsoleKeys);
    for (region, index, key) in config.bindings.iter() {
        surface
            .bind(region, index, Arc::new(KeyBinding::new(key, sink.clone())))
            .await?;

        let color = config.leds.for_region(region);
        surface.set_led(region, index, color.green, color.red)?;
    }
    info!("{} pads bound", config.bindings.len());

    surface.run()?;
    info!("Ready to process pad events");

    shutdown_signal().await;

    surface.stop().await;
    if let Err(e) = surface.clear_all() {
        tracing::warn!("Failed to blank LEDs on exit: {}", e);
    }
    surface.disconnect();
    info!("launchpad-gw shutdown complete");
    Ok(())
}

/// Light every pad of the chosen region(s) at each brightness in turn
async fn run_led_test(driver: &LaunchpadDriver, target: &str) -> Result<()> {
    use tokio::time::{sleep, Duration};

    let regions: Vec<Region> = if target.eq_ignore_ascii_case("all") {
        vec![Region::Grid, Region::CommandRow, Region::CommandColumn]
    } else {
        vec![target.parse()?]
    };

    for region in regions {
        info!("LED sweep: {}", region);
        for level in [Brightness::Low, Brightness::Medium, Brightness::High] {
            for index in 0..region.pad_count() {
                driver.set_led(region, index, level, level)?;
            }
            sleep(Duration::from_millis(400)).await;
        }
    }

    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutdown signal received");
}
