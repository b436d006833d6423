use super::importer::{ImportOverrides, ImportSummary, VideoImporter};
use super::library_store::LibraryStore;
use super::thumbnail_extractor::{Thumbnail, extract_thumbnail};
use super::metadata_prober::format_duration;
use super::video_record::{VideoRecord, duration_to_seconds, filter_by_title};
use crate::config::Config;
use crate::config::save::{add_recent_path, save_settings};
use crate::tools::{FileProperties, MediaBackend, ensure_directory_exists};
use anyhow::Result;
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, MultiSelect, Select};
use log::{info, warn};
use rust_i18n::t;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

pub struct VideoLibrary<'a> {
    config: &'a mut Config,
    backend: Arc<dyn MediaBackend>,
    store: LibraryStore,
    shutdown_signal: Arc<AtomicBool>,
}

impl<'a> VideoLibrary<'a> {
    pub fn new(
        config: &'a mut Config,
        backend: Arc<dyn MediaBackend>,
        shutdown_signal: Arc<AtomicBool>,
    ) -> Result<Self> {
        let store = LibraryStore::open(&config.settings.database_path)?;
        Ok(Self {
            config,
            backend,
            store,
            shutdown_signal,
        })
    }

    #[must_use]
    pub const fn store(&self) -> &LibraryStore {
        &self.store
    }

    pub fn show_library(&self) -> Result<()> {
        println!("{}", style(t!("library.title")).cyan().bold());

        let records = self.store.list()?;
        if records.is_empty() {
            println!("{}", style(t!("library.empty")).yellow());
            return Ok(());
        }

        print_records(&records.iter().collect::<Vec<_>>());

        let total_seconds: u64 = records
            .iter()
            .filter_map(|r| duration_to_seconds(&r.duration))
            .sum();
        println!(
            "\n{}",
            style(t!(
                "library.total",
                count = records.len(),
                duration = format_duration(total_seconds as f64)
            ))
            .dim()
        );
        Ok(())
    }

    pub fn import_files(&self) -> Result<()> {
        println!("{}", style(t!("library.import_files_title")).cyan().bold());

        let input: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(t!("library.import_files_prompt"))
            .interact_text()?;

        let paths: Vec<PathBuf> = input
            .split(';')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .collect();

        if paths.is_empty() {
            return Ok(());
        }

        let overrides = prompt_overrides(paths.len() == 1)?;

        println!("{}", style(t!("library.importing")).dim());
        let summary = self
            .importer()
            .import_files_with(&self.store, &paths, &overrides)?;
        print_summary(&summary);
        Ok(())
    }

    pub fn import_folder(&mut self) -> Result<()> {
        println!("{}", style(t!("library.import_folder_title")).cyan().bold());

        let Some(directory) = self.prompt_directory()? else {
            return Ok(());
        };

        println!("{}", style(t!("library.scanning")).dim());
        let summary = self.importer().import_directory(
            &self.store,
            &directory,
            &self.config.file_type_table,
        )?;
        print_summary(&summary);

        add_recent_path(&mut self.config.settings, &directory.to_string_lossy());
        if let Err(e) = save_settings(&self.config.settings) {
            warn!("無法儲存最近使用的路徑: {e:#}");
        }
        Ok(())
    }

    pub fn search(&self) -> Result<()> {
        println!("{}", style(t!("library.search_title")).cyan().bold());

        let query: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(t!("library.search_prompt"))
            .allow_empty(true)
            .interact_text()?;

        let records = self.store.list()?;
        let matches = filter_by_title(&records, query.trim());
        if matches.is_empty() {
            println!("{}", style(t!("library.no_match")).yellow());
            return Ok(());
        }

        print_records(&matches);
        Ok(())
    }

    pub fn delete(&self) -> Result<()> {
        println!("{}", style(t!("library.delete_title")).cyan().bold());

        let records = self.store.list()?;
        if records.is_empty() {
            println!("{}", style(t!("library.empty")).yellow());
            return Ok(());
        }

        let items: Vec<String> = records.iter().map(record_label).collect();
        let selected = MultiSelect::with_theme(&ColorfulTheme::default())
            .with_prompt(t!("library.delete_prompt"))
            .items(&items)
            .interact_opt()?;

        let Some(selected) = selected.filter(|s| !s.is_empty()) else {
            return Ok(());
        };

        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(t!("library.delete_confirm", count = selected.len()))
            .default(false)
            .interact()?;
        if !confirmed {
            return Ok(());
        }

        let mut removed = 0;
        for index in selected {
            let record = &records[index];
            removed += self.store.delete_by_path(&record.file_path)?;
            info!("已從影片庫移除: {}", record.file_path.display());
        }

        println!(
            "{}",
            style(t!("library.deleted", count = removed)).green()
        );
        Ok(())
    }

    pub fn show_properties(&self) -> Result<()> {
        let Some(record) = self.select_record(&t!("library.properties_prompt"))? else {
            return Ok(());
        };

        let properties = FileProperties::read(&record.file_path)?;
        println!("{}", style(t!("library.properties_title")).cyan().bold());
        println!("  {}: {}", t!("library.prop_name"), properties.name);
        println!("  {}: {}", t!("library.prop_location"), properties.location);
        println!(
            "  {}: {:.2} MB ({} bytes)",
            t!("library.prop_size"),
            properties.size_mb(),
            properties.size_bytes
        );
        println!("  {}: {}", t!("library.prop_duration"), record.duration);
        println!("  {}: {}", t!("library.prop_resolution"), record.resolution);
        println!("  {}: {}", t!("library.prop_format"), properties.format);
        println!(
            "  {}: {}",
            t!("library.prop_created"),
            properties.created_display()
        );
        Ok(())
    }

    /// 將縮圖匯出為 PNG，優先使用快取，沒有快取時重新擷取並寫回資料庫
    pub fn export_thumbnail(&self) -> Result<()> {
        let Some(record) = self.select_record(&t!("library.thumbnail_prompt"))? else {
            return Ok(());
        };

        let cached = record
            .thumbnail
            .as_deref()
            .and_then(|png| Thumbnail::from_png(png).ok());

        let thumbnail = match cached {
            Some(thumbnail) => thumbnail,
            None => {
                let Some(thumbnail) = extract_thumbnail(
                    self.backend.as_ref(),
                    &record.file_path,
                    self.config.settings.thumbnail_seek_seconds,
                ) else {
                    println!("{}", style(t!("library.no_thumbnail")).yellow());
                    return Ok(());
                };
                let png = thumbnail.to_png()?;
                self.store.update_thumbnail(&record.file_path, Some(&png))?;
                thumbnail
            }
        };

        let default_target = record.file_path.with_extension("png");
        let target: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(t!("library.thumbnail_target"))
            .default(default_target.to_string_lossy().to_string())
            .interact_text()?;

        let target = PathBuf::from(target.trim());
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_directory_exists(parent)?;
        }
        thumbnail.save(&target)?;
        println!(
            "{}",
            style(t!(
                "library.thumbnail_saved",
                path = target.display(),
                width = thumbnail.width(),
                height = thumbnail.height()
            ))
            .green()
        );
        Ok(())
    }

    pub fn select_record(&self, prompt: &str) -> Result<Option<VideoRecord>> {
        let mut records = self.store.list()?;
        if records.is_empty() {
            println!("{}", style(t!("library.empty")).yellow());
            return Ok(None);
        }

        let items: Vec<String> = records.iter().map(record_label).collect();
        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .items(&items)
            .default(0)
            .interact_opt()?;

        Ok(selection.map(|index| records.swap_remove(index)))
    }

    fn importer(&self) -> VideoImporter<'_> {
        VideoImporter::new(
            self.backend.as_ref(),
            self.config.settings.thumbnail_seek_seconds,
            Arc::clone(&self.shutdown_signal),
        )
    }

    fn prompt_directory(&self) -> Result<Option<PathBuf>> {
        let recent = &self.config.settings.recent_paths;
        let input = if recent.is_empty() {
            Input::<String>::with_theme(&ColorfulTheme::default())
                .with_prompt(t!("library.import_folder_prompt"))
                .interact_text()?
        } else {
            let mut items: Vec<String> = recent.clone();
            items.push(t!("library.enter_new_path").to_string());

            let selection = Select::with_theme(&ColorfulTheme::default())
                .with_prompt(t!("library.import_folder_prompt"))
                .items(&items)
                .default(0)
                .interact_opt()?;

            match selection {
                None => return Ok(None),
                Some(index) if index < recent.len() => recent[index].clone(),
                Some(_) => Input::<String>::with_theme(&ColorfulTheme::default())
                    .with_prompt(t!("library.import_folder_prompt"))
                    .interact_text()?,
            }
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        Ok(Some(PathBuf::from(trimmed)))
    }
}

fn record_label(record: &VideoRecord) -> String {
    format!(
        "{} [{} | {}] {}",
        record.title,
        record.duration,
        record.resolution,
        record.file_path.display()
    )
}

fn print_records(records: &[&VideoRecord]) {
    for (index, record) in records.iter().enumerate() {
        println!(
            "  {}. {} {} {}",
            index + 1,
            style(&record.title).bold(),
            style(format!("[{} | {}]", record.duration, record.resolution)).dim(),
            record.file_path.display()
        );
    }
}

/// 標題只在匯入單一檔案時詢問
fn prompt_overrides(single_file: bool) -> Result<ImportOverrides> {
    let theme = ColorfulTheme::default();
    let ask = |prompt: String| -> Result<String> {
        Ok(Input::<String>::with_theme(&theme)
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?)
    };

    let title = if single_file {
        ask(t!("library.override_title").to_string())?
    } else {
        String::new()
    };
    let duration = ask(t!("library.override_duration").to_string())?;
    let resolution = ask(t!("library.override_resolution").to_string())?;
    Ok(ImportOverrides::from_input(&title, &duration, &resolution))
}

fn print_summary(summary: &ImportSummary) {
    println!();
    println!("{}", style(t!("library.summary_title")).cyan().bold());
    println!(
        "  {}",
        t!("library.summary_imported", count = style(summary.imported).green())
    );
    if summary.failed > 0 {
        println!(
            "  {}",
            t!("library.summary_failed", count = style(summary.failed).red())
        );
    }
    if summary.skipped > 0 {
        println!(
            "  {}",
            t!("library.summary_skipped", count = style(summary.skipped).yellow())
        );
    }

    info!(
        "匯入完成 - 成功: {}, 失敗: {}, 略過: {}",
        summary.imported, summary.failed, summary.skipped
    );
}
