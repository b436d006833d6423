use crate::config::save::save_settings;
use crate::config::types::{Config, Language};
use crate::menu::handlers::{LibraryAction, run_library_action, run_video_converter};
use crate::tools::MediaBackend;
use anyhow::Result;
use console::{Term, style};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use rust_i18n::t;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

pub fn show_main_menu(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &mut Config,
    backend: &Arc<dyn MediaBackend>,
) -> Result<bool> {
    term.clear_screen()?;

    println!("{}", style(t!("main_menu.title")).cyan().bold());
    println!("{}", style(t!("common.esc_hint")).dim());

    let options = vec![
        t!("main_menu.opt_library"),
        t!("main_menu.opt_import_files"),
        t!("main_menu.opt_import_folder"),
        t!("main_menu.opt_search"),
        t!("main_menu.opt_delete"),
        t!("main_menu.opt_properties"),
        t!("main_menu.opt_thumbnail"),
        t!("main_menu.opt_convert"),
        t!("main_menu.opt_settings"),
        t!("main_menu.exit"),
    ];

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(t!("main_menu.prompt"))
        .items(&options)
        .default(0)
        .interact_on_opt(term)?;

    let action = match selection {
        Some(0) => LibraryAction::List,
        Some(1) => LibraryAction::ImportFiles,
        Some(2) => LibraryAction::ImportFolder,
        Some(3) => LibraryAction::Search,
        Some(4) => LibraryAction::Delete,
        Some(5) => LibraryAction::Properties,
        Some(6) => LibraryAction::ExportThumbnail,
        Some(7) => {
            run_video_converter(term, config, backend)?;
            return Ok(true);
        }
        Some(8) => {
            show_settings_menu(term, config)?;
            return Ok(true);
        }
        Some(9) | None => return Ok(false), // ESC pressed - exit
        _ => unreachable!(),
    };

    run_library_action(term, shutdown_signal, config, backend, action)?;
    Ok(true)
}

/// 設定選單
fn show_settings_menu(term: &Term, config: &mut Config) -> Result<()> {
    loop {
        term.clear_screen()?;

        println!("{}", style(t!("settings.title")).cyan().bold());
        println!("{}", style(t!("common.esc_hint")).dim());

        let options = vec![
            t!("settings.opt_thumbnail"),
            t!("settings.opt_language"),
            t!("settings.back"),
        ];

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(t!("settings.prompt"))
            .items(&options)
            .default(0)
            .interact_on_opt(term)?;

        match selection {
            Some(0) => show_thumbnail_settings_menu(term, config)?,
            Some(1) => show_language_menu(term, config)?,
            Some(2) | None => break, // ESC or back
            _ => unreachable!(),
        }
    }

    Ok(())
}

/// 縮圖擷取時間設定
fn show_thumbnail_settings_menu(term: &Term, config: &mut Config) -> Result<()> {
    term.clear_screen()?;

    println!("{}", style(t!("settings.thumbnail.title")).cyan().bold());
    println!(
        "\n{} {}",
        style(t!("settings.thumbnail.current")).dim(),
        config.settings.thumbnail_seek_seconds
    );
    println!();

    let seconds: f64 = Input::with_theme(&ColorfulTheme::default())
        .with_prompt(t!("settings.thumbnail.prompt"))
        .default(config.settings.thumbnail_seek_seconds)
        .validate_with(|value: &f64| -> Result<(), String> {
            if value.is_finite() && *value >= 0.0 {
                Ok(())
            } else {
                Err(t!("settings.thumbnail.invalid").to_string())
            }
        })
        .interact_text_on(term)?;

    if (seconds - config.settings.thumbnail_seek_seconds).abs() > f64::EPSILON {
        config.settings.thumbnail_seek_seconds = seconds;
        save_settings(&config.settings)?;
        println!("\n{} {seconds}", style(t!("settings.saved")).green());
        std::thread::sleep(std::time::Duration::from_secs(1));
    }

    Ok(())
}

/// 語言設定選單
fn show_language_menu(term: &Term, config: &mut Config) -> Result<()> {
    term.clear_screen()?;

    println!("{}", style(t!("settings.language.title")).cyan().bold());
    println!("{}", style(t!("common.esc_hint")).dim());

    let languages = Language::ALL;
    let items: Vec<String> = languages.iter().map(ToString::to_string).collect();

    let default_index = languages
        .iter()
        .position(|&l| l == config.settings.language)
        .unwrap_or(0);

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(t!("settings.language.prompt"))
        .items(&items)
        .default(default_index)
        .interact_on_opt(term)?;

    // ESC pressed - return without saving
    let Some(selection) = selection else {
        return Ok(());
    };

    let selected_lang = languages[selection];

    if selected_lang != config.settings.language {
        config.settings.language = selected_lang;
        rust_i18n::set_locale(selected_lang.as_str());
        save_settings(&config.settings)?;
        println!(
            "\n{} {}",
            style(t!("settings.saved")).green(),
            selected_lang
        );
        std::thread::sleep(std::time::Duration::from_secs(1));
    }

    Ok(())
}
