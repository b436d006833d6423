use crate::component::{VideoConverter, VideoLibrary};
use crate::config::Config;
use crate::pause;
use crate::tools::MediaBackend;
use anyhow::Result;
use console::{Term, style};
use rust_i18n::t;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// 影片庫操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryAction {
    List,
    ImportFiles,
    ImportFolder,
    Search,
    Delete,
    Properties,
    ExportThumbnail,
}

pub fn run_library_action(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &mut Config,
    backend: &Arc<dyn MediaBackend>,
    action: LibraryAction,
) -> Result<()> {
    let result = VideoLibrary::new(config, Arc::clone(backend), Arc::clone(shutdown_signal))
        .and_then(|mut library| match action {
            LibraryAction::List => library.show_library(),
            LibraryAction::ImportFiles => library.import_files(),
            LibraryAction::ImportFolder => library.import_folder(),
            LibraryAction::Search => library.search(),
            LibraryAction::Delete => library.delete(),
            LibraryAction::Properties => library.show_properties(),
            LibraryAction::ExportThumbnail => library.export_thumbnail(),
        });

    if let Err(e) = result {
        eprintln!("{} {:#}", style(t!("common.error")).red().bold(), e);
    }

    pause(term)?;
    Ok(())
}

pub fn run_video_converter(
    term: &Term,
    config: &Config,
    backend: &Arc<dyn MediaBackend>,
) -> Result<()> {
    let converter = VideoConverter::new(config, Arc::clone(backend));

    if let Err(e) = converter.run() {
        eprintln!("{} {:#}", style(t!("common.error")).red().bold(), e);
    }

    pause(term)?;
    Ok(())
}
