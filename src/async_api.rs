use crate::cdp::CdpEngine;
use crate::engine::{EngineLauncher, EngineSession};
use crate::print::PrintOptions;
use crate::{EngineConfig, Error, Result};
use async_trait::async_trait;
use log::debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

enum Command {
    Load(String, oneshot::Sender<Result<()>>),
    FontsReady(Duration, oneshot::Sender<Result<bool>>),
    Print(PrintOptions, oneshot::Sender<Result<Vec<u8>>>),
    Close(oneshot::Sender<Result<()>>),
}

static WORKER_SEQ: AtomicUsize = AtomicUsize::new(0);

/// An async-friendly engine session backed by a dedicated worker thread.
///
/// The worker thread owns a synchronous `CdpEngine` and executes commands
/// in the order they were sent, so a command abandoned by a timed-out caller
/// still runs to completion before the next one (typically `Close`) starts.
/// Dropping the session ends the command loop, which drops the engine and
/// terminates Chrome.
pub struct CdpSession {
    cmd_tx: Sender<Command>,
}

impl CdpSession {
    /// Spawn the worker thread and launch Chrome on it.
    pub async fn launch(config: EngineConfig) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx) = oneshot::channel::<Result<()>>();

        let name = format!("cdp-engine-{}", WORKER_SEQ.fetch_add(1, Ordering::Relaxed));
        thread::Builder::new()
            .name(name)
            .spawn(move || {
                // Initialize engine on the worker thread
                let engine = match CdpEngine::launch(config) {
                    Ok(e) => e,
                    Err(err) => {
                        let _ = init_tx.send(Err(err));
                        return;
                    }
                };

                // Signal successful creation (no-op when the caller gave up waiting)
                let _ = init_tx.send(Ok(()));

                // Command loop
                while let Ok(cmd) = cmd_rx.recv() {
                    match cmd {
                        Command::Load(html, resp) => {
                            let _ = resp.send(engine.load_markup(&html));
                        }
                        Command::FontsReady(timeout, resp) => {
                            let _ = resp.send(engine.fonts_ready(timeout));
                        }
                        Command::Print(options, resp) => {
                            let _ = resp.send(engine.print_pdf(&options));
                        }
                        Command::Close(resp) => {
                            let _ = resp.send(engine.close());
                            return;
                        }
                    }
                }
                debug!("Engine worker channel closed; shutting the browser down");
            })
            .map_err(|e| Error::InitializationError(format!("Failed to spawn engine worker: {}", e)))?;

        // Wait for the worker to report initialization success or failure
        init_rx
            .await
            .map_err(|e| Error::InitializationError(format!("Worker init canceled: {}", e)))??;

        Ok(Self { cmd_tx })
    }

    async fn request<T>(
        &self,
        what: &str,
        command: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(command(tx))
            .map_err(|_| Error::Other(format!("{} failed: engine worker has exited", what)))?;
        rx.await
            .map_err(|e| Error::Other(format!("{} canceled: {}", what, e)))?
    }
}

#[async_trait]
impl EngineSession for CdpSession {
    async fn load_markup(&mut self, html: &str) -> Result<()> {
        let html = html.to_string();
        self.request("Load", move |tx| Command::Load(html, tx)).await
    }

    async fn fonts_ready(&mut self, timeout: Duration) -> Result<bool> {
        self.request("FontsReady", move |tx| Command::FontsReady(timeout, tx))
            .await
    }

    async fn print_pdf(&mut self, options: &PrintOptions) -> Result<Vec<u8>> {
        let options = options.clone();
        self.request("Print", move |tx| Command::Print(options, tx)).await
    }

    async fn close(&mut self) -> Result<()> {
        self.request("Close", Command::Close).await
    }
}

/// Launches headless Chrome instances, one worker thread each.
#[derive(Debug, Clone, Copy, Default)]
pub struct CdpLauncher;

#[async_trait]
impl EngineLauncher for CdpLauncher {
    type Session = CdpSession;

    async fn launch(&self, config: &EngineConfig) -> Result<CdpSession> {
        CdpSession::launch(config.clone()).await
    }
}
