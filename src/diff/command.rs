//! The `take-and-compare-screenshot` command, from both ends of the channel.
//!
//! On the server, [`VdiffPlugin`] claims the command and hands it to the
//! [`DiffHandler`]. In the browser, [`screenshot_and_compare`] measures the
//! element and sends the request, turning a failed comparison into an error.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::driver::Session;
use super::handler::DiffHandler;
use super::types::{DiffError, DiffResponse, DiffResult, ScreenshotOptions, ScreenshotRequest, TAKE_AND_COMPARE};
use crate::dom::ElementRef;

/// Test-runner plugin owning the screenshot command
#[derive(Debug, Clone)]
pub struct VdiffPlugin {
    handler: DiffHandler,
}

impl VdiffPlugin {
    pub fn new(handler: DiffHandler) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &DiffHandler {
        &self.handler
    }

    /// Execute `command` for `session`. Returns `None` for commands owned by
    /// someone else.
    pub async fn execute_command(
        &self,
        session: &Session,
        command: &str,
        payload: Value,
    ) -> DiffResult<Option<Value>> {
        if command != TAKE_AND_COMPARE {
            return Ok(None);
        }
        let request: ScreenshotRequest = serde_json::from_value(payload)?;
        let response = self.handler.handle(session, &request).await?;
        Ok(Some(serde_json::to_value(response)?))
    }
}

/// Result type for browser-side command calls
pub type CommandResult<T> = Result<T, CommandError>;

/// Error types for browser-side command calls
#[derive(Debug)]
pub enum CommandError {
    /// The command could not be delivered or executed
    Channel(String),

    /// Serialization error
    Serialization(serde_json::Error),

    /// The comparison ran and did not pass
    Assertion(String),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Channel(msg) => write!(f, "Command error: {}", msg),
            CommandError::Serialization(err) => write!(f, "Serialization error: {}", err),
            CommandError::Assertion(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(err: serde_json::Error) -> Self {
        CommandError::Serialization(err)
    }
}

impl From<DiffError> for CommandError {
    fn from(err: DiffError) -> Self {
        CommandError::Channel(err.to_string())
    }
}

/// Browser-to-server command channel
#[async_trait]
pub trait CommandChannel: Send + Sync {
    async fn execute(&self, command: &str, payload: Value) -> CommandResult<Value>;
}

/// Channel delivering commands straight to an in-process plugin
#[derive(Debug, Clone)]
pub struct LocalChannel {
    plugin: Arc<VdiffPlugin>,
    session: Arc<Session>,
}

impl LocalChannel {
    pub fn new(plugin: Arc<VdiffPlugin>, session: Arc<Session>) -> Self {
        Self { plugin, session }
    }
}

#[async_trait]
impl CommandChannel for LocalChannel {
    async fn execute(&self, command: &str, payload: Value) -> CommandResult<Value> {
        self.plugin
            .execute_command(&self.session, command, payload)
            .await?
            .ok_or_else(|| CommandError::Channel(format!("Unknown command: {}", command)))
    }
}

/// Capture `element` and compare it against its golden.
///
/// Resolves `Ok(())` on a pass; a failed comparison becomes
/// [`CommandError::Assertion`] carrying the server's message.
pub async fn screenshot_and_compare(
    channel: &dyn CommandChannel,
    element: &ElementRef,
    name: &str,
    opts: ScreenshotOptions,
) -> CommandResult<()> {
    let request = ScreenshotRequest {
        name: name.to_string(),
        rect: element.bounding_rect(),
        opts,
    };
    let value = channel
        .execute(TAKE_AND_COMPARE, serde_json::to_value(&request)?)
        .await?;
    let response: DiffResponse = serde_json::from_value(value)?;

    if response.pass {
        Ok(())
    } else {
        Err(CommandError::Assertion(
            response.message.unwrap_or_else(|| "Screenshot comparison failed".to_string()),
        ))
    }
}
