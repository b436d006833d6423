use anyhow::Result;
use console::{Term, style};
use log::{info, warn};
use rust_i18n::t;
use std::sync::Arc;
use video_library::config::Config;
use video_library::init;
use video_library::menu::show_main_menu;
use video_library::signal::setup_shutdown_signal;
use video_library::tools::{FfmpegBackend, MediaBackend};

#[macro_use]
extern crate rust_i18n;

i18n!("locales", fallback = "en-US");

fn main() -> Result<()> {
    init::init();
    let term = Term::stdout();
    let shutdown_signal = setup_shutdown_signal()?;

    let mut config = Config::new()?;
    rust_i18n::set_locale(config.settings.language.as_str());

    let backend: Arc<dyn MediaBackend> = Arc::new(FfmpegBackend::new(
        &config.settings.ffmpeg_path,
        &config.settings.ffprobe_path,
    ));

    loop {
        match show_main_menu(&term, &shutdown_signal, &mut config, &backend) {
            Ok(true) => {}
            Ok(false) => {
                term.clear_screen()?;
                println!("\n{}", style(t!("main_menu.goodbye")).green().bold());
                info!("Program exited normally");
                break;
            }
            Err(e) => {
                warn!("Program error: {e}");
                eprintln!("{} {}", style(t!("main_menu.error_prefix")).red().bold(), e);
                break;
            }
        }
    }

    Ok(())
}
