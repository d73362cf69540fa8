//! UI callback contract
//!
//! The session drives the user interface through a small capability
//! trait passed into `run_pairing`, rather than a long-lived registered
//! listener. Callbacks receive a cloneable [`SessionHandle`] instead of
//! the session itself, so a UI can feed the secret back or tear the
//! session down from any task.

use async_trait::async_trait;

use crate::session::SessionHandle;
use crate::Result;

/// Severity of a session log callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Callbacks a pairing UI provides to the session.
///
/// `on_perform_input_role` is invoked from a concurrent task while the
/// driver waits on the rendezvous queue: the implementation collects the
/// secret from the user and hands it over via
/// [`SessionHandle::set_secret`]. `on_perform_output_role` is invoked
/// with the computed gamma; the implementation displays it until the
/// session ends. Either callback failing aborts the session.
#[async_trait]
pub trait PairingListener: Send + Sync {
    /// The session is about to start.
    async fn on_session_created(&self, session: &SessionHandle);

    /// The session reached a terminal state; inspect
    /// [`SessionHandle::state`] for the outcome.
    async fn on_session_ended(&self, session: &SessionHandle);

    /// Collect the secret from the user (Input role).
    async fn on_perform_input_role(&self, session: &SessionHandle) -> Result<()>;

    /// Show the secret to the user (Display role).
    async fn on_perform_output_role(&self, session: &SessionHandle, gamma: &[u8]) -> Result<()>;

    /// Session-lifecycle log message, mirrored from the engine's own
    /// tracing output for UIs that surface protocol progress.
    fn on_log_message(&self, _level: LogLevel, _message: &str) {}
}
