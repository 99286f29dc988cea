//! Rendering engine process management.
//!
//! [`ProcessManager::acquire`] launches one engine instance, retrying with
//! backoff when the launch fails, and [`ProcessManager::release`] shuts it
//! down again. Launching and driving the engine go through the
//! [`EngineLauncher`] and [`EngineSession`] traits; the CDP backend lives in
//! [`crate::async_api`].

use crate::print::PrintOptions;
use crate::{EngineConfig, Error, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// One running engine instance with a single rendering context.
#[async_trait]
pub trait EngineSession: Send {
    /// Replace the rendering context's document with `html` and wait for
    /// the content-loaded signal.
    async fn load_markup(&mut self, html: &str) -> Result<()>;

    /// Wait up to `timeout` for web fonts. `Ok(false)` means the wait ran out.
    async fn fonts_ready(&mut self, timeout: Duration) -> Result<bool>;

    /// Export the loaded document as PDF bytes.
    async fn print_pdf(&mut self, options: &PrintOptions) -> Result<Vec<u8>>;

    /// Shut the engine down.
    async fn close(&mut self) -> Result<()>;
}

/// Starts engine instances.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    type Session: EngineSession + 'static;

    /// Make one launch attempt.
    async fn launch(&self, config: &EngineConfig) -> Result<Self::Session>;
}

/// Lifecycle of an [`EngineHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Launching,
    Ready,
    Busy,
    Closing,
    Closed,
    Failed,
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandleState::Launching => "launching",
            HandleState::Ready => "ready",
            HandleState::Busy => "busy",
            HandleState::Closing => "closing",
            HandleState::Closed => "closed",
            HandleState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Reference to one running engine instance.
///
/// Handles come from [`ProcessManager::acquire`] and must be given back to
/// [`ProcessManager::release`]. A handle dropped without release still tears
/// the engine down through the session's own `Drop`, but logs a warning.
pub struct EngineHandle<S: EngineSession> {
    id: u64,
    state: HandleState,
    session: Option<S>,
}

impl<S: EngineSession> EngineHandle<S> {
    fn launching(id: u64) -> Self {
        Self {
            id,
            state: HandleState::Launching,
            session: None,
        }
    }

    fn attach(&mut self, session: S) {
        self.session = Some(session);
        self.state = HandleState::Ready;
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    /// True once release has run (or the launch never produced an engine).
    pub fn is_released(&self) -> bool {
        self.session.is_none()
    }

    /// Borrow the engine for a pipeline stage; marks the handle busy.
    pub fn session_mut(&mut self) -> Result<&mut S> {
        match (self.state, self.session.as_mut()) {
            (HandleState::Ready | HandleState::Busy, Some(session)) => {
                self.state = HandleState::Busy;
                Ok(session)
            }
            (state, _) => Err(Error::Other(format!(
                "engine #{} is not usable (state: {})",
                self.id, state
            ))),
        }
    }

    /// Record that a pipeline stage failed on this engine.
    pub fn mark_failed(&mut self) {
        if self.session.is_some() {
            self.state = HandleState::Failed;
        }
    }
}

impl<S: EngineSession> fmt::Debug for EngineHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}

impl<S: EngineSession> Drop for EngineHandle<S> {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!(
                "Engine #{} dropped in state {} without release",
                self.id, self.state
            );
        }
    }
}

/// Broad cause of a failed launch attempt, used to pick the backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// ETXTBSY / EAGAIN style contention; worth waiting progressively longer.
    Busy,
    Other,
}

impl FailureClass {
    pub fn of(err: &Error) -> Self {
        let msg = err.to_string().to_ascii_lowercase();
        let busy = [
            "etxtbsy",
            "text file busy",
            "resource temporarily unavailable",
            "eagain",
            "os error 11",
            "os error 26",
        ];
        if busy.iter().any(|needle| msg.contains(needle)) {
            FailureClass::Busy
        } else {
            FailureClass::Other
        }
    }
}

/// Attempt bound and backoff schedule for engine launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Busy failures wait `attempt * busy_unit`
    pub busy_unit: Duration,
    /// Other failures wait this long
    pub fallback: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_attempts: config.max_launch_attempts,
            busy_unit: Duration::from_millis(config.busy_backoff_ms),
            fallback: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32, class: FailureClass) -> Duration {
        match class {
            FailureClass::Busy => self.busy_unit * attempt,
            FailureClass::Other => self.fallback,
        }
    }
}

/// Acquires and releases engine instances for the conversion pipeline.
pub struct ProcessManager<L: EngineLauncher> {
    launcher: L,
    policy: RetryPolicy,
    launch_timeout: Duration,
    close_timeout: Duration,
    next_id: AtomicU64,
}

impl<L: EngineLauncher> ProcessManager<L> {
    /// Retry bound and timeouts are read once from `config`.
    pub fn new(launcher: L, config: &EngineConfig) -> Self {
        Self {
            launcher,
            policy: RetryPolicy::from_config(config),
            launch_timeout: config.timeouts.launch(),
            close_timeout: config.timeouts.close(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Launch an engine, retrying up to the policy's attempt bound.
    ///
    /// Backoff sleeps yield to the runtime, so other conversions keep running
    /// while this one waits. Fails with [`Error::EngineLaunch`] carrying the
    /// last attempt's error once the budget is spent.
    pub async fn acquire(&self, config: &EngineConfig) -> Result<EngineHandle<L::Session>> {
        let max = self.policy.max_attempts;
        let mut last_error: Option<Error> = None;

        for attempt in 1..=max {
            let mut handle = EngineHandle::launching(self.next_id.fetch_add(1, Ordering::Relaxed));
            debug!("Engine #{} launch attempt {}/{}", handle.id, attempt, max);

            let outcome = match tokio::time::timeout(self.launch_timeout, self.launcher.launch(config)).await {
                Ok(res) => res,
                Err(_) => Err(Error::InitializationError(format!(
                    "launch timed out after {}ms",
                    self.launch_timeout.as_millis()
                ))),
            };

            match outcome {
                Ok(session) => {
                    handle.attach(session);
                    info!("Engine #{} ready after {} attempt(s)", handle.id, attempt);
                    return Ok(handle);
                }
                Err(err) => {
                    handle.state = HandleState::Failed;
                    let class = FailureClass::of(&err);
                    warn!("Engine launch attempt {}/{} failed: {}", attempt, max, err);
                    if attempt < max {
                        let delay = self.policy.delay(attempt, class);
                        debug!("Retrying launch in {}ms ({:?} failure)", delay.as_millis(), class);
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(Error::EngineLaunch {
            attempts: max,
            cause: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no launch attempts were made".to_string()),
        })
    }

    /// Shut the engine down. Safe to call repeatedly; errors are logged.
    pub async fn release(&self, handle: &mut EngineHandle<L::Session>) {
        let Some(mut session) = handle.session.take() else {
            debug!("Engine #{} already released", handle.id);
            return;
        };

        handle.state = HandleState::Closing;
        match tokio::time::timeout(self.close_timeout, session.close()).await {
            Ok(Ok(())) => debug!("Engine #{} closed", handle.id),
            Ok(Err(err)) => warn!("Failed to close engine #{}: {}", handle.id, err),
            Err(_) => warn!(
                "Closing engine #{} timed out after {}ms; dropping it",
                handle.id,
                self.close_timeout.as_millis()
            ),
        }
        drop(session);
        handle.state = HandleState::Closed;
    }
}
