//! Watch-mode rebuild driver
//!
//! Wraps a debounced filesystem watcher around the runtime: change events
//! within the scheduler window coalesce into one rebuild trigger, and a
//! newer trigger cancels whatever run is still queued or in flight. The
//! engine's caches carry over between rebuilds, so unchanged documents are
//! reparsed only when their bytes changed.

use anyhow::{Context, Result};
use notify::RecursiveMode;
use notify_debouncer_full::{new_debouncer, DebounceEventResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::EngineConfig;
use crate::error::EngineError;

use super::{BuildReport, CancellationToken, TokenEngine};

/// Watch configuration.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Coalescing window for filesystem events.
    pub debounce: Duration,

    /// Paths to watch, relative to the configuration directory. Empty
    /// watches the configuration directory itself.
    pub paths: Vec<PathBuf>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(200),
            paths: Vec::new(),
        }
    }
}

/// Outcome of one watch-triggered rebuild, delivered to the result stream.
#[derive(Debug)]
pub enum WatchEvent {
    /// A rebuild finished.
    Rebuilt(Box<BuildReport>),

    /// A rebuild was cancelled by a newer trigger.
    Cancelled,

    /// A rebuild failed.
    Failed(EngineError),
}

/// Handle to a running watch session.
pub struct WatchHandle {
    stop_tx: Option<tokio::sync::oneshot::Sender<()>>,
    results: mpsc::UnboundedReceiver<WatchEvent>,
}

impl WatchHandle {
    /// Next rebuild outcome.
    pub async fn next_event(&mut self) -> Option<WatchEvent> {
        self.results.recv().await
    }

    /// Stop watching. In-flight writes finish; queued rebuilds are dropped.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Debounced watch driver over a [`TokenEngine`].
pub struct WatchDriver;

impl WatchDriver {
    /// Start watching and rebuilding. Every debounced batch of filesystem
    /// events triggers a rebuild; a newer batch cancels the previous run.
    pub fn start(
        engine: Arc<TokenEngine>,
        config: EngineConfig,
        options: WatchOptions,
    ) -> Result<WatchHandle> {
        let (trigger_tx, mut trigger_rx) = mpsc::unbounded_channel::<()>();
        let (result_tx, result_rx) = mpsc::unbounded_channel::<WatchEvent>();
        let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel::<()>();

        let mut debouncer = new_debouncer(
            options.debounce,
            None,
            move |result: DebounceEventResult| {
                if let Ok(events) = result {
                    let relevant = events.iter().any(|event| {
                        event.paths.iter().any(|path| Self::should_process(path))
                    });
                    if relevant {
                        let _ = trigger_tx.send(());
                    }
                }
            },
        )
        .context("failed to create filesystem debouncer")?;

        let watch_roots = if options.paths.is_empty() {
            vec![engine.config_dir().to_path_buf()]
        } else {
            options
                .paths
                .iter()
                .map(|path| engine.config_dir().join(path))
                .collect()
        };
        for root in &watch_roots {
            debouncer
                .watch(root, RecursiveMode::Recursive)
                .with_context(|| format!("failed to watch '{}'", root.display()))?;
        }
        tracing::info!(roots = watch_roots.len(), "👁️  watch mode active");

        tokio::spawn(async move {
            // The debouncer lives inside the task so dropping the handle
            // tears the watcher down.
            let _debouncer = debouncer;
            let mut current_cancel: Option<CancellationToken> = None;

            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        if let Some(cancel) = current_cancel.take() {
                            cancel.cancel();
                        }
                        tracing::info!("👁️  watch mode stopped");
                        break;
                    }
                    trigger = trigger_rx.recv() => {
                        if trigger.is_none() {
                            break;
                        }
                        // Coalesce: drain every trigger that queued up while
                        // we were waiting, and cancel the in-flight run.
                        while trigger_rx.try_recv().is_ok() {}
                        if let Some(cancel) = current_cancel.take() {
                            cancel.cancel();
                        }

                        let cancel = CancellationToken::new();
                        current_cancel = Some(cancel.clone());

                        // Rebuild in its own task so the loop keeps listening
                        // for newer triggers while the run is in flight.
                        let engine = engine.clone();
                        let config = config.clone();
                        let results = result_tx.clone();
                        tokio::spawn(async move {
                            let event = match engine.build(&config, &cancel).await {
                                Ok(report) => WatchEvent::Rebuilt(Box::new(report)),
                                Err(EngineError::Cancelled) => WatchEvent::Cancelled,
                                Err(err) => WatchEvent::Failed(err),
                            };
                            let _ = results.send(event);
                        });
                    }
                }
            }
        });

        Ok(WatchHandle {
            stop_tx: Some(stop_tx),
            results: result_rx,
        })
    }

    /// Ignore editor droppings and cache output so rebuilds do not retrigger
    /// themselves.
    fn should_process(path: &Path) -> bool {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.starts_with('.') || name.ends_with('~') || name.ends_with(".tmp") {
                return false;
            }
        }
        let display = path.to_string_lossy();
        !(display.contains("/dist/")
            || display.contains("/.dtifx/")
            || display.contains("\\dist\\")
            || display.contains("\\.dtifx\\"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FormatterInstanceConfig, SourceConfig, TransformEntry};
    use serde_json::json;
    use tempfile::TempDir;

    fn file_config() -> EngineConfig {
        EngineConfig::new()
            .with_layer("base")
            .with_source(SourceConfig::file(
                "tokens",
                "base",
                vec!["tokens/*.json".to_string()],
            ))
            .with_transform(TransformEntry::named("css/value"))
            .with_formatter(FormatterInstanceConfig::named("css"))
    }

    #[tokio::test]
    async fn edit_triggers_a_rebuild() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("tokens")).unwrap();
        std::fs::write(
            dir.path().join("tokens/base.json"),
            json!({"color": {"primary": {"$type": "color", "$value": "#111111"}}}).to_string(),
        )
        .unwrap();

        let engine = Arc::new(TokenEngine::new(dir.path()));
        let mut handle = WatchDriver::start(
            engine,
            file_config(),
            WatchOptions {
                debounce: Duration::from_millis(50),
                paths: vec![PathBuf::from("tokens")],
            },
        )
        .unwrap();

        // Give the watcher a moment to arm, then edit the document.
        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(
            dir.path().join("tokens/base.json"),
            json!({"color": {"primary": {"$type": "color", "$value": "#222222"}}}).to_string(),
        )
        .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), handle.next_event())
            .await
            .expect("watch event before timeout")
            .expect("watch stream open");
        match event {
            WatchEvent::Rebuilt(report) => {
                assert_eq!(report.resolved.tokens.len(), 1);
            }
            other => panic!("expected rebuild, got {other:?}"),
        }

        handle.stop();
    }

    #[test]
    fn output_paths_are_ignored() {
        assert!(!WatchDriver::should_process(Path::new("/p/dist/tokens.css")));
        assert!(!WatchDriver::should_process(Path::new("/p/.dtifx/deps.json")));
        assert!(!WatchDriver::should_process(Path::new("/p/tokens/.base.json.swp")));
        assert!(WatchDriver::should_process(Path::new("/p/tokens/base.json")));
    }
}
