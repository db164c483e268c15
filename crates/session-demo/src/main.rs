//! Session demo: applies an audio session configuration, plays the bundled
//! asset once through the desktop backend, and logs route changes until the
//! session winds down or Ctrl-C is pressed.

mod config;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use audio_session::catalog;
use audio_session::desktop;
use audio_session_types::{ActivationState, Category, OptionFlag, OptionSet, SessionMode};
use clap::Parser;
use crossbeam_channel::RecvTimeoutError;
use tracing_subscriber::EnvFilter;

use crate::config::DemoConfig;

#[derive(Parser, Debug)]
#[command(name = "session-demo", version)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print categories, options, modes and output devices, then exit
    #[arg(long)]
    list: bool,

    /// Override the configured category, e.g. `playback`
    #[arg(long, value_parser = parse_category_arg)]
    category: Option<Category>,

    /// Override the configured options (repeatable), e.g. `--option duckOthers`
    #[arg(long = "option", value_parser = parse_option_arg)]
    options: Vec<OptionFlag>,

    /// Override the configured mode, e.g. `spokenAudio`
    #[arg(long, value_parser = parse_mode_arg)]
    mode: Option<SessionMode>,

    /// Simulate an interruption this many milliseconds after playback starts
    #[arg(long)]
    interrupt_after_ms: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,audio_session=info,session_demo=info")
        }))
        .init();

    if args.list {
        print_catalog();
        return Ok(());
    }

    let cfg = match &args.config {
        Some(path) => DemoConfig::load(path)?,
        None => DemoConfig::default(),
    };

    let category = args.category.unwrap_or(cfg.session.category);
    let options = if args.options.is_empty() {
        cfg.session.options
    } else {
        args.options.iter().copied().collect::<OptionSet>()
    };
    let mode = args.mode.unwrap_or(cfg.session.mode);

    let (manager, platform) = desktop::session_manager(&cfg.manager);
    tracing::info!(
        asset = ?cfg.manager.asset,
        outputs = ?manager.current_outputs(),
        "session demo starting"
    );

    manager
        .configure_with_mode(category, options, mode)
        .context("configure audio session")?;

    let (quit_tx, quit_rx) = crossbeam_channel::bounded::<()>(1);
    let quit_on_signal = quit_tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = quit_on_signal.try_send(());
    }) {
        tracing::warn!("ctrl-c handler not installed: {e}");
    }

    manager.play().context("start playback")?;

    let interrupt_at = args
        .interrupt_after_ms
        .map(|ms| std::time::Instant::now() + Duration::from_millis(ms));
    let mut interrupted = false;
    let mut last_outputs = manager.current_outputs();

    loop {
        match quit_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(()) => {
                tracing::info!("interrupted by user; stopping");
                manager.stop();
                break;
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
        }

        if let Some(at) = interrupt_at {
            if !interrupted && std::time::Instant::now() >= at {
                interrupted = true;
                platform.begin_interruption();
            }
        }

        let outputs = manager.current_outputs();
        if outputs != last_outputs {
            println!("route: {}", outputs.join(", "));
            last_outputs = outputs;
        }

        if manager.activation_state() == ActivationState::Inactive && !manager.is_playing() {
            break;
        }
    }

    if interrupted {
        platform.end_interruption();
    }
    drop(quit_tx);

    let status = manager.status();
    tracing::info!(
        state = %status.state,
        last_deactivation = ?status.last_deactivation,
        last_playback_end = ?status.last_playback_end,
        "session demo finished"
    );
    Ok(())
}

fn print_catalog() {
    println!("categories:");
    for category in catalog::list_categories() {
        println!("  {:<14} options: {}", catalog::name_of(category), catalog::allowed_options(category));
    }
    println!("options:");
    for option in catalog::list_options() {
        println!("  {}", catalog::name_of(option));
    }
    println!("modes:");
    for mode in catalog::list_modes() {
        println!("  {}", catalog::name_of(mode));
    }
    println!("output devices:");
    for (i, name) in desktop::output_device_names().iter().enumerate() {
        println!("  #{i}: {name}");
    }
}

fn parse_category_arg(s: &str) -> Result<Category, String> {
    catalog::parse_category(s).ok_or_else(|| format!("unknown category: {s}"))
}

fn parse_option_arg(s: &str) -> Result<OptionFlag, String> {
    catalog::parse_option(s).ok_or_else(|| format!("unknown option: {s}"))
}

fn parse_mode_arg(s: &str) -> Result<SessionMode, String> {
    catalog::parse_mode(s).ok_or_else(|| format!("unknown mode: {s}"))
}
