use super::conversion_job::{ConversionJob, container_of, default_target_path, ensure_extension};
use super::transcode_worker::{TranscodeEvent, TranscodeOutcome, TranscodeWorker};
use crate::component::video_library::{LibraryStore, VideoRecord};
use crate::config::Config;
use crate::tools::{MediaBackend, format_of, validate_file_exists};
use anyhow::Result;
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use rust_i18n::t;
use std::path::PathBuf;
use std::sync::Arc;

pub struct VideoConverter<'a> {
    config: &'a Config,
    backend: Arc<dyn MediaBackend>,
}

impl<'a> VideoConverter<'a> {
    pub fn new(config: &'a Config, backend: Arc<dyn MediaBackend>) -> Self {
        Self { config, backend }
    }

    pub fn run(&self) -> Result<()> {
        println!("{}", style(t!("converter.title")).cyan().bold());

        let store = LibraryStore::open(&self.config.settings.database_path)?;
        let Some(record) = self.select_record(&store)? else {
            return Ok(());
        };
        validate_file_exists(&record.file_path)?;

        println!(
            "{} {}",
            style(t!("converter.current_format")).dim(),
            format_of(&record.file_path)
        );

        let Some(format) = self.select_format(&record)? else {
            return Ok(());
        };

        let default_target = default_target_path(&record.file_path, &format);
        let target: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(t!("converter.target_prompt"))
            .default(default_target.to_string_lossy().to_string())
            .interact_text()?;
        let target = target.trim();
        if target.is_empty() {
            return Ok(());
        }
        let destination = ensure_extension(&PathBuf::from(target), &format);

        let job = ConversionJob::new(&record.file_path, destination);
        let outcome = self.transcode(job)?;
        print_outcome(&outcome);
        Ok(())
    }

    /// 啟動背景轉檔並以進度條顯示事件，直到工作結束
    pub fn transcode(&self, job: ConversionJob) -> Result<TranscodeOutcome> {
        let worker = TranscodeWorker::new(
            job,
            Arc::clone(&self.backend),
            self.config.codec_table.clone(),
        );
        let handle = worker.spawn()?;

        let progress_bar = ProgressBar::new(100);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")?
                .progress_chars("#>-"),
        );
        progress_bar.set_message(t!("converter.converting").to_string());

        for event in handle.events() {
            match event {
                TranscodeEvent::Progress(update) => {
                    progress_bar.set_position(u64::from(update.percent));
                    if update.eta_seconds > 0.0 {
                        progress_bar.set_message(
                            t!("converter.eta", eta = format_eta(update.eta_seconds)).to_string(),
                        );
                    }
                }
                TranscodeEvent::StateChanged(_) => {}
                TranscodeEvent::Finished(outcome) => {
                    if outcome.success {
                        progress_bar.finish_with_message(t!("converter.done").to_string());
                    } else {
                        progress_bar.abandon_with_message(t!("converter.failed_short").to_string());
                    }
                }
            }
        }

        Ok(handle.wait())
    }

    fn select_record(&self, store: &LibraryStore) -> Result<Option<VideoRecord>> {
        let mut records = store.list()?;
        if records.is_empty() {
            println!("{}", style(t!("library.empty")).yellow());
            return Ok(None);
        }

        let items: Vec<String> = records
            .iter()
            .map(|r| format!("{} [{}] {}", r.title, r.duration, r.file_path.display()))
            .collect();

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(t!("converter.select_video"))
            .items(&items)
            .default(0)
            .interact_opt()?;

        Ok(selection.map(|index| records.swap_remove(index)))
    }

    fn select_format(&self, record: &VideoRecord) -> Result<Option<String>> {
        let table = &self.config.codec_table;
        let formats: Vec<String> = table.extensions().map(str::to_string).collect();
        if formats.is_empty() {
            return Ok(None);
        }

        let current = container_of(&record.file_path).unwrap_or_default();
        let items: Vec<String> = formats.iter().map(|f| f.to_uppercase()).collect();

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(t!("converter.select_format"))
            .items(&items)
            .default(table.suggested_index(&current))
            .interact_opt()?;

        Ok(selection.map(|index| formats[index].clone()))
    }
}

/// 剩餘時間顯示為 `MM:SS`
fn format_eta(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

fn print_outcome(outcome: &TranscodeOutcome) {
    println!();
    if outcome.success {
        println!(
            "{}",
            style(t!(
                "converter.success",
                path = outcome.destination.display()
            ))
            .green()
        );
    } else {
        println!("{}", style(t!("converter.failed")).red());
    }
}
