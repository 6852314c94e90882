//! Console bridge: the injected sender template and the host receiver.
//!
//! The sender half lives inside the isolated context. It wraps each of the
//! three diagnostic handlers with a forwarder that serializes the call's
//! arguments (per-argument `JSON.stringify`, textual fallback on failure),
//! joins them with a single space, and posts the result over the sandbox's
//! open posting primitive as a tagged JSON envelope. The original handler
//! is invoked afterwards with the unmodified arguments, so native echo
//! behavior survives interception.
//!
//! The receiver half runs on the host. The channel carries raw strings
//! from an unauthenticated sender (user code can call the posting
//! primitive directly), so the receiver validates each payload against the
//! envelope schema and the fixed source tag before appending a log line.
//! Everything else is dropped without a trace.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{ConsoleKind, ConsoleMessage};

/// Fixed source identifier carried by every legitimate bridge message
pub const SOURCE_TAG: &str = "codepen-clone";

/// The injected sender, compiled in as a fixed template.
///
/// No external parameters, identical on every rebuild, and free of any
/// closing-script-tag sequence so the surrounding markup cannot terminate
/// it early.
pub const BRIDGE_SCRIPT: &str = include_str!("bridge.js");

type OnMessageHandler = Arc<dyn Fn(&ConsoleMessage) + Send + Sync>;

/// Wire shape of a bridge message: `{source, type, message}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeMessage {
    pub source: String,
    #[serde(rename = "type")]
    pub kind: ConsoleKind,
    pub message: String,
}

/// Encode a tagged envelope for the channel.
///
/// The sandbox worker uses this for messages it originates itself
/// (uncaught script errors, timeouts); the injected sender builds the same
/// shape in script.
pub fn envelope(kind: ConsoleKind, text: &str) -> String {
    let msg = BridgeMessage {
        source: SOURCE_TAG.to_string(),
        kind,
        message: text.to_string(),
    };
    serde_json::to_string(&msg).unwrap_or_else(|_| String::new())
}

/// One rendered line of the host console view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub kind: ConsoleKind,
    pub text: String,
}

impl LogLine {
    /// Visual class encoding the kind, e.g. `console-warn`
    pub fn class(&self) -> String {
        format!("console-{}", self.kind)
    }
}

/// Host receiver: a validating, append-only console view.
///
/// Unbounded by design; an unthrottled burst of diagnostic calls produces
/// an equal burst of appended lines. The scroll cursor tracks the end of
/// the log unconditionally (most-recent-visible).
#[derive(Default)]
pub struct ConsoleLog {
    lines: Vec<LogLine>,
    scroll_top: usize,
    on_message: Option<OnMessageHandler>,
}

impl ConsoleLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate one raw channel payload and append it if trusted.
    ///
    /// Returns `true` when a line was appended. Payloads that fail to
    /// parse, carry an unknown kind, or lack the source tag are discarded
    /// silently -- this check is the sole trust boundary on the channel.
    pub fn receive(&mut self, raw: &str) -> bool {
        let msg: BridgeMessage = match serde_json::from_str(raw) {
            Ok(m) => m,
            Err(_) => return false,
        };
        if msg.source != SOURCE_TAG {
            return false;
        }

        self.lines.push(LogLine {
            kind: msg.kind,
            text: msg.message.clone(),
        });
        self.scroll_top = self.lines.len();

        if let Some(cb) = &self.on_message {
            cb(&ConsoleMessage {
                kind: msg.kind,
                text: msg.message,
            });
        }
        true
    }

    /// Manual clear: empties the view only. Bridge state and persisted
    /// snapshots are untouched.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.scroll_top = 0;
    }

    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    /// Index of the first visible line under the most-recent-visible
    /// policy; always the end of the log.
    pub fn scroll_top(&self) -> usize {
        self.scroll_top
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Register a callback observing every accepted message.
    pub fn on_message<F>(&mut self, cb: F)
    where
        F: Fn(&ConsoleMessage) + Send + Sync + 'static,
    {
        self.on_message = Some(Arc::new(cb));
    }

    /// Remove a previously registered on_message callback if any
    pub fn clear_on_message(&mut self) {
        self.on_message = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_tagged_messages() {
        let mut log = ConsoleLog::new();
        let raw = envelope(ConsoleKind::Log, "1 2");
        assert!(log.receive(&raw));
        assert_eq!(log.len(), 1);
        assert_eq!(log.lines()[0].text, "1 2");
        assert_eq!(log.lines()[0].class(), "console-log");
        assert_eq!(log.scroll_top(), 1);
    }

    #[test]
    fn discards_messages_without_the_tag() {
        let mut log = ConsoleLog::new();
        assert!(!log.receive("{\"source\":\"somewhere-else\",\"type\":\"log\",\"message\":\"hi\"}"));
        assert!(!log.receive("{\"type\":\"log\",\"message\":\"no source at all\"}"));
        assert!(log.is_empty());
    }

    #[test]
    fn discards_malformed_payloads() {
        let mut log = ConsoleLog::new();
        assert!(!log.receive("not json"));
        assert!(!log.receive("{\"source\":\"codepen-clone\"}"));
        assert!(!log.receive("{\"source\":\"codepen-clone\",\"type\":\"shout\",\"message\":\"x\"}"));
        assert!(log.is_empty());
    }

    #[test]
    fn tolerates_extra_fields() {
        let mut log = ConsoleLog::new();
        let raw = "{\"source\":\"codepen-clone\",\"type\":\"warn\",\"message\":\"w\",\"extra\":1}";
        assert!(log.receive(raw));
        assert_eq!(log.lines()[0].kind, ConsoleKind::Warn);
    }

    #[test]
    fn clear_empties_the_view() {
        let mut log = ConsoleLog::new();
        log.receive(&envelope(ConsoleKind::Error, "boom"));
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.scroll_top(), 0);
    }

    #[test]
    fn callback_sees_accepted_messages_only() {
        use std::sync::Mutex;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let mut log = ConsoleLog::new();
        log.on_message(move |m| {
            seen_clone.lock().unwrap().push(m.clone());
        });

        log.receive(&envelope(ConsoleKind::Log, "kept"));
        log.receive("{\"source\":\"spoof\",\"type\":\"log\",\"message\":\"dropped\"}");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].text, "kept");
    }

    #[test]
    fn bridge_template_has_no_terminator_sequence() {
        assert!(!BRIDGE_SCRIPT.contains("</"));
        assert!(BRIDGE_SCRIPT.contains("codepen-clone"));
    }
}
