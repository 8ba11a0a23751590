//! Per-run state passed to every flow and batch

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::api::LookupClient;
use crate::error::Result;
use crate::features::batch::{BatchController, BatchHandle, Operation, OperationContext};
use crate::features::convert::Capabilities;
use crate::features::cover::CoverCache;
use crate::features::dispatch::AudioFile;
use crate::features::romanize::{self, Romanizer};
use crate::features::settings::Settings;

pub struct Session {
    pub settings: Settings,
    settings_path: Option<PathBuf>,
    pub capabilities: Capabilities,
    lookup: Option<LookupClient>,
    runtime: Option<Handle>,
    romanizer: Arc<dyn Romanizer>,
    cover_cache: Option<CoverCache>,
    controller: BatchController,
    /// Ctrl-C is routed to the running batch
    interruptible: bool,
}

impl Session {
    /// Probe encoders and build the lookup client from `settings`
    pub fn new(settings: Settings, settings_path: Option<PathBuf>, runtime: Option<Handle>) -> Self {
        let capabilities = Capabilities::probe(&settings.encoder);
        let lookup = match LookupClient::new(&settings) {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!("Online lookups disabled: {}", e);
                None
            }
        };
        let romanizer = Arc::from(romanize::from_settings(&settings.romanizer));

        Self {
            settings,
            settings_path,
            capabilities,
            lookup,
            runtime,
            romanizer,
            cover_cache: CoverCache::default_location(),
            controller: BatchController::new(),
            interruptible: false,
        }
    }

    /// Session without encoders, network or persistence
    #[cfg(test)]
    pub fn offline(settings: Settings) -> Self {
        let romanizer = Arc::from(romanize::from_settings(&settings.romanizer));
        Self {
            settings,
            settings_path: None,
            capabilities: Capabilities::none(),
            lookup: None,
            runtime: None,
            romanizer,
            cover_cache: None,
            controller: BatchController::new(),
            interruptible: false,
        }
    }

    /// Listen for Ctrl-C on the runtime for the rest of the run
    ///
    /// A running batch is canceled before its next file. With no batch
    /// running `on_idle` is called instead. Offline sessions have no runtime
    /// and keep the default signal behavior.
    pub fn watch_interrupts<F>(&mut self, on_idle: F) -> Option<JoinHandle<()>>
    where
        F: Fn() + Send + 'static,
    {
        let runtime = self.runtime.as_ref()?;
        let controller = self.controller.clone();
        self.interruptible = true;
        Some(runtime.spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if controller.cancel_running() {
                    tracing::info!("Interrupt received, canceling the running batch");
                } else {
                    on_idle();
                }
            }
        }))
    }

    pub fn is_interruptible(&self) -> bool {
        self.interruptible
    }

    pub fn is_online(&self) -> bool {
        self.lookup.is_some() && self.runtime.is_some()
    }

    /// Add a folder to the recent list and persist the settings
    pub fn remember_folder(&mut self, folder: &Path) {
        self.settings.push_recent_folder(folder);
        self.persist();
    }

    pub fn persist(&self) {
        let Some(path) = &self.settings_path else {
            return;
        };
        if let Err(e) = self.settings.save_to_file(path) {
            tracing::warn!("Failed to save settings to {:?}: {}", path, e);
        }
    }

    /// Services handed to batch operations
    pub fn context(&self) -> OperationContext {
        OperationContext {
            lookup: self.lookup.clone(),
            runtime: self.runtime.clone(),
            capabilities: self.capabilities.clone(),
            romanizer: self.romanizer.clone(),
            cover_cache: self.cover_cache.clone(),
            auto_lyrics: self.settings.lyrics.auto_fetch,
        }
    }

    pub fn start_batch(&self, files: Vec<AudioFile>, operation: Operation) -> Result<BatchHandle> {
        self.controller.start(files, operation, self.context())
    }

    /// Cover lookup for the interactive flow; `None` when offline or not found
    pub fn fetch_cover(&self, artist: &str, album: &str) -> Option<Vec<u8>> {
        let (client, runtime) = self.lookup.as_ref().zip(self.runtime.as_ref())?;
        runtime.block_on(client.fetch_cover(artist, album))
    }
}
