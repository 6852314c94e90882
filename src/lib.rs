//! Playpen Engine
//!
//! A headless live-coding playground engine for Rust that composes three
//! editable sources (markup, style, script) into an isolated preview
//! document, executes the result in a sandboxed context, and captures the
//! sandbox's console stream on the host side.
//!
//! # Features
//!
//! - **Isolated Execution**: every rebuild discards the previous sandbox and
//!   starts a fresh global environment
//! - **Console Bridge**: diagnostic calls inside the sandbox are intercepted
//!   and relayed over a one-way, tag-validated message channel
//! - **Persistent Layout**: a drag-resize state machine over named geometry
//!   variables, persisted on release and restored at startup
//!
//! # Example
//!
//! ```no_run
//! use playpen::store::MemoryStore;
//! use playpen::{PlaygroundConfig, SourceSlot};
//!
//! # fn main() -> playpen::Result<()> {
//! let config = PlaygroundConfig {
//!     script_timeout_ms: 2000,
//!     ..Default::default()
//! };
//!
//! let mut playground = playpen::new_playground(MemoryStore::new(), config)?;
//! playground.edit(SourceSlot::Script, "console.log('hello', 42)")?;
//! playground.pump_console();
//! for line in playground.console().lines() {
//!     println!("[{}] {}", line.kind, line.text);
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Error, Result};

pub mod bridge;
pub mod compositor;
pub mod layout;
pub mod playground;
pub mod preview;
pub mod store;

pub use playground::Playground;

/// Configuration for the playground engine
///
/// The defaults are chosen to be conservative and safe: scripts are enabled
/// but run inside a dedicated sandbox context with runtime limits, and a
/// misbehaving script is cut off by the execution timeout rather than
/// stalling the host.
///
/// # Examples
///
/// ```
/// let cfg = playpen::PlaygroundConfig::default();
/// assert!(cfg.enable_scripts);
/// ```
#[derive(Debug, Clone)]
pub struct PlaygroundConfig {
    /// Workspace dimensions used to normalize pointer deltas
    pub viewport: Viewport,
    /// Whether to execute the script source inside the sandbox
    pub enable_scripts: bool,
    /// Script execution timeout in milliseconds (applies per rebuild)
    pub script_timeout_ms: u64,
    /// Maximum loop iterations before the sandbox throws (0 => disabled)
    pub script_loop_iteration_limit: u64,
    /// Maximum recursion depth before the sandbox throws (usize::MAX => disabled)
    pub script_recursion_limit: usize,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            enable_scripts: true,
            script_timeout_ms: 5000,
            script_loop_iteration_limit: 1000000,
            script_recursion_limit: 1024,
        }
    }
}

/// Workspace dimensions
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// The three editable sources combined into the preview document
///
/// Persisted as JSON under the fixed external field names `html`, `css`
/// and `js`; fields missing from a stored record deserialize to empty
/// strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSnapshot {
    /// Body markup, inserted verbatim
    #[serde(rename = "html", default)]
    pub markup: String,
    /// Stylesheet text, inserted verbatim into a `<style>` block
    #[serde(rename = "css", default)]
    pub style: String,
    /// User script, inserted verbatim into the final `<script>` block
    #[serde(rename = "js", default)]
    pub script: String,
}

/// Identifies one of the three editor slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSlot {
    Markup,
    Style,
    Script,
}

/// Diagnostic kind carried by a console message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleKind {
    Log,
    Warn,
    Error,
}

impl ConsoleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsoleKind::Log => "log",
            ConsoleKind::Warn => "warn",
            ConsoleKind::Error => "error",
        }
    }
}

impl fmt::Display for ConsoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Console message reconstructed on the host side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleMessage {
    /// One of log, warn, or error
    pub kind: ConsoleKind,
    /// Space-joined textual content of the message
    pub text: String,
}

/// Result of executing the composed document's script blocks
///
/// `value` is the displayed result of the last evaluated block (or the
/// error text when a block threw). `is_error` indicates whether any block
/// threw an uncaught error.
#[derive(Debug, Clone)]
pub struct ScriptResult {
    /// Serialized result value
    pub value: String,
    /// Whether any script block threw an error
    pub is_error: bool,
}

/// Create a playground over the given store with the given configuration
///
/// Restores any persisted sources and layout from the store, then performs
/// the initial preview rebuild.
pub fn new_playground<S: store::KeyValueStore>(
    store: S,
    config: PlaygroundConfig,
) -> Result<Playground<S>> {
    Playground::open(store, config)
}
