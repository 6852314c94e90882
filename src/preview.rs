//! The isolated execution context behind the preview.
//!
//! Every rebuild discards the previous sandbox entirely: a dedicated
//! worker thread is spawned with a fresh `boa_engine::Context`, the
//! composed document's script blocks are evaluated in document order, and
//! the thread winds down. Global state never survives an edit.
//!
//! The sandbox exposes two native primitives to script:
//!
//! - `__pen_post(text)` -- the open posting primitive. Whatever string is
//!   passed lands on the host channel verbatim; the channel itself does
//!   not restrict senders, the host receiver validates.
//! - `__pen_echo(kind, text)` -- the native console backend the bridge
//!   wraps, echoing to the host process log.
//!
//! Uncaught errors from a script block are forwarded on the same channel
//! as kind `error`; later blocks still run, matching sibling-script
//! semantics.

use std::collections::HashMap;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use crate::bridge::envelope;
use crate::compositor::{self, PreviewSnapshot};
use crate::{ConsoleKind, PlaygroundConfig, Result, ScriptResult, SourceSnapshot};

static PEN_CHANNEL_REG: OnceLock<Mutex<HashMap<usize, Sender<String>>>> = OnceLock::new();

fn channel_registry() -> &'static Mutex<HashMap<usize, Sender<String>>> {
    PEN_CHANNEL_REG.get_or_init(|| Mutex::new(HashMap::new()))
}

fn first_arg_string(args: &[boa_engine::JsValue]) -> String {
    args.first()
        .and_then(|a| a.as_string())
        .map(|s| s.to_std_string_escaped())
        .unwrap_or_default()
}

fn pen_post_native(
    _this: &boa_engine::JsValue,
    args: &[boa_engine::JsValue],
    ctx: &mut boa_engine::Context,
) -> boa_engine::JsResult<boa_engine::JsValue> {
    let ptr = ctx as *const _ as usize;
    let raw = first_arg_string(args);
    if let Ok(lock) = channel_registry().lock() {
        if let Some(tx) = lock.get(&ptr) {
            let _ = tx.send(raw);
        }
    }
    Ok(boa_engine::JsValue::undefined())
}

fn pen_echo_native(
    _this: &boa_engine::JsValue,
    args: &[boa_engine::JsValue],
    _ctx: &mut boa_engine::Context,
) -> boa_engine::JsResult<boa_engine::JsValue> {
    let kind = first_arg_string(args);
    let text = args
        .get(1)
        .and_then(|a| a.as_string())
        .map(|s| s.to_std_string_escaped())
        .unwrap_or_default();
    log::debug!("sandbox console.{}: {}", kind, text);
    Ok(boa_engine::JsValue::undefined())
}

// Best-effort recovery of a source position from the engine's error text.
// Handles "... at line 10, col 15" (parser reports) and a trailing
// ":10:15".
fn split_position(msg: &str) -> Option<(String, u32, u32)> {
    if let Some(at) = msg.rfind(" at line ") {
        let rest = &msg[at + " at line ".len()..];
        let mut parts = rest.splitn(2, ',');
        let line: u32 = parts.next()?.trim().parse().ok()?;
        let col_part = parts.next()?.trim();
        let col_str = col_part
            .strip_prefix("column")
            .or_else(|| col_part.strip_prefix("col"))
            .unwrap_or(col_part)
            .trim();
        let col: u32 = col_str.parse().ok()?;
        return Some((msg[..at].to_string(), line, col));
    }

    let parts: Vec<&str> = msg.rsplitn(3, ':').collect();
    if parts.len() == 3 {
        if let (Ok(col), Ok(line)) = (parts[0].trim().parse::<u32>(), parts[1].trim().parse::<u32>())
        {
            return Some((parts[2].trim_end().to_string(), line, col));
        }
    }
    None
}

/// Format an uncaught error for the console: `"<message> (<line>:<column>)"`
/// when a position is reported, the plain message otherwise.
fn format_uncaught(msg: &str) -> String {
    match split_position(msg) {
        Some((head, line, col)) => format!("{} ({}:{})", head.trim_end(), line, col),
        None => msg.to_string(),
    }
}

fn spawn_sandbox(
    scripts: Vec<String>,
    loop_limit: u64,
    recursion_limit: usize,
    channel_tx: Sender<String>,
    resp_tx: Sender<ScriptResult>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut ctx: boa_engine::Context = boa_engine::Context::default();
        if loop_limit > 0 {
            ctx.runtime_limits_mut().set_loop_iteration_limit(loop_limit);
        }
        if recursion_limit < usize::MAX {
            ctx.runtime_limits_mut().set_recursion_limit(recursion_limit);
        }

        let nf = boa_engine::native_function::NativeFunction::from_fn_ptr(
            pen_post_native as boa_engine::native_function::NativeFunctionPointer,
        );
        let _ = ctx.register_global_builtin_callable(boa_engine::js_string!("__pen_post"), 1usize, nf);
        let nf = boa_engine::native_function::NativeFunction::from_fn_ptr(
            pen_echo_native as boa_engine::native_function::NativeFunctionPointer,
        );
        let _ = ctx.register_global_builtin_callable(boa_engine::js_string!("__pen_echo"), 2usize, nf);

        let ptr = &ctx as *const _ as usize;
        if let Ok(mut lock) = channel_registry().lock() {
            lock.insert(ptr, channel_tx.clone());
        }

        let mut value = String::new();
        let mut is_error = false;
        for code in &scripts {
            match ctx.eval(boa_engine::Source::from_bytes(code.as_bytes())) {
                Ok(val) => {
                    value = format!("{}", val.display());
                }
                Err(e) => {
                    let text = format_uncaught(&e.to_string());
                    let _ = channel_tx.send(envelope(ConsoleKind::Error, &text));
                    value = text;
                    is_error = true;
                }
            }
        }

        if let Ok(mut lock) = channel_registry().lock() {
            lock.remove(&ptr);
        }
        let _ = resp_tx.send(ScriptResult { value, is_error });
    })
}

/// The preview: a composed document plus the sandbox it runs in.
///
/// Owns the host end of the one-way message channel. Messages accumulate
/// until drained; draining is the host's only interaction with the
/// sandbox after installation.
pub struct Preview {
    config: PlaygroundConfig,
    document: String,
    message_rx: Option<Receiver<String>>,
    message_tx: Option<Sender<String>>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl Preview {
    pub fn new(config: PlaygroundConfig) -> Self {
        Self {
            config,
            document: String::new(),
            message_rx: None,
            message_tx: None,
            worker: None,
        }
    }

    /// Tear down the current sandbox and install a freshly composed
    /// document: new channel, new worker thread, new global environment.
    ///
    /// Returns the outcome of the user script blocks. Script failures are
    /// not `Err`: they surface as console messages and an `is_error`
    /// result, and never take the host down.
    pub fn rebuild(&mut self, snapshot: &SourceSnapshot) -> Result<ScriptResult> {
        self.teardown();

        self.document = compositor::compose_document(snapshot);
        log::debug!("installing preview document ({} bytes)", self.document.len());

        let (tx, rx) = std::sync::mpsc::channel::<String>();
        self.message_tx = Some(tx.clone());
        self.message_rx = Some(rx);

        if !self.config.enable_scripts {
            return Ok(ScriptResult {
                value: String::new(),
                is_error: false,
            });
        }

        let scripts = compositor::extract_scripts(&self.document);
        let (resp_tx, resp_rx) = std::sync::mpsc::channel::<ScriptResult>();
        self.worker = Some(spawn_sandbox(
            scripts,
            self.config.script_loop_iteration_limit,
            self.config.script_recursion_limit,
            tx,
            resp_tx,
        ));

        let timeout_ms = self.config.script_timeout_ms;
        match resp_rx.recv_timeout(Duration::from_millis(timeout_ms)) {
            Ok(result) => Ok(result),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                let text = format!("Script timed out after {}ms", timeout_ms);
                if let Some(tx) = &self.message_tx {
                    let _ = tx.send(envelope(ConsoleKind::Error, &text));
                }
                Ok(ScriptResult {
                    value: text,
                    is_error: true,
                })
            }
            Err(e) => Ok(ScriptResult {
                value: format!("Sandbox failed to report a result: {}", e),
                is_error: true,
            }),
        }
    }

    /// Drain every message currently queued on the channel, in arrival
    /// order. Fire-and-forget on the sender side; the host pulls at its
    /// own pace.
    pub fn drain_messages(&mut self) -> Vec<String> {
        match &self.message_rx {
            Some(rx) => rx.try_iter().collect(),
            None => Vec::new(),
        }
    }

    /// The currently installed document (empty before the first rebuild)
    pub fn document(&self) -> &str {
        &self.document
    }

    /// Textual rendering surface of the installed document
    pub fn snapshot(&self) -> PreviewSnapshot {
        compositor::snapshot_document(&self.document)
    }

    /// Style blocks of the installed document, in document order
    pub fn styles(&self) -> Vec<String> {
        compositor::extract_styles(&self.document)
    }

    /// Shut the preview down, waiting for the sandbox to wind down.
    pub fn close(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        self.message_tx = None;
        self.message_rx = None;
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::ConsoleLog;

    fn run_script(script: &str) -> (ConsoleLog, ScriptResult) {
        let mut preview = Preview::new(PlaygroundConfig::default());
        let snapshot = SourceSnapshot {
            script: script.to_string(),
            ..Default::default()
        };
        let result = preview.rebuild(&snapshot).expect("rebuild");
        let mut log = ConsoleLog::new();
        for raw in preview.drain_messages() {
            log.receive(&raw);
        }
        (log, result)
    }

    #[test]
    fn log_arguments_are_serialized_and_space_joined() {
        let (log, result) = run_script("console.log(1, 2)");
        assert!(!result.is_error);
        assert_eq!(log.len(), 1);
        assert_eq!(log.lines()[0].kind, ConsoleKind::Log);
        assert_eq!(log.lines()[0].text, "1 2");
    }

    #[test]
    fn warn_and_error_carry_their_kind() {
        let (log, _) = run_script("console.warn('w'); console.error('e');");
        assert_eq!(log.len(), 2);
        assert_eq!(log.lines()[0].kind, ConsoleKind::Warn);
        assert_eq!(log.lines()[0].text, "\"w\"");
        assert_eq!(log.lines()[1].kind, ConsoleKind::Error);
    }

    #[test]
    fn serialization_fallback_is_per_argument() {
        let (log, _) = run_script("var a = {}; a.self = a; console.log('ok', a);");
        assert_eq!(log.len(), 1);
        assert_eq!(log.lines()[0].text, "\"ok\" [object Object]");
    }

    #[test]
    fn uncaught_errors_become_error_messages() {
        let (log, result) = run_script("throw new Error('x')");
        assert!(result.is_error);
        assert_eq!(log.len(), 1);
        assert_eq!(log.lines()[0].kind, ConsoleKind::Error);
        assert!(log.lines()[0].text.contains("Error: x"));
    }

    #[test]
    fn untagged_posts_never_reach_the_log() {
        let (log, _) = run_script(
            "__pen_post(JSON.stringify({source: 'evil', type: 'log', message: 'spoofed'}));\n\
             console.log('legit');",
        );
        assert_eq!(log.len(), 1);
        assert_eq!(log.lines()[0].text, "\"legit\"");
    }

    #[test]
    fn rebuild_discards_global_state() {
        let mut preview = Preview::new(PlaygroundConfig::default());
        preview
            .rebuild(&SourceSnapshot {
                script: "var counter = 41;".into(),
                ..Default::default()
            })
            .expect("first rebuild");

        preview
            .rebuild(&SourceSnapshot {
                script: "console.log(typeof counter);".into(),
                ..Default::default()
            })
            .expect("second rebuild");

        let mut log = ConsoleLog::new();
        for raw in preview.drain_messages() {
            log.receive(&raw);
        }
        assert_eq!(log.len(), 1);
        assert_eq!(log.lines()[0].text, "\"undefined\"");
    }

    #[test]
    fn runaway_loops_hit_the_runtime_limit() {
        let mut preview = Preview::new(PlaygroundConfig {
            script_loop_iteration_limit: 1000,
            ..Default::default()
        });
        let result = preview
            .rebuild(&SourceSnapshot {
                script: "while (true) {}".into(),
                ..Default::default()
            })
            .expect("rebuild");
        assert!(result.is_error);
    }

    #[test]
    fn disabled_scripts_still_compose() {
        let mut preview = Preview::new(PlaygroundConfig {
            enable_scripts: false,
            ..Default::default()
        });
        let result = preview
            .rebuild(&SourceSnapshot {
                script: "console.log('never runs')".into(),
                ..Default::default()
            })
            .expect("rebuild");
        assert!(!result.is_error);
        assert!(preview.drain_messages().is_empty());
        assert!(preview.document().contains("never runs"));
    }

    #[test]
    fn position_formatting_appends_line_and_column() {
        assert_eq!(
            format_uncaught("SyntaxError: unexpected token at line 3, col 5"),
            "SyntaxError: unexpected token (3:5)"
        );
        assert_eq!(format_uncaught("Error: x"), "Error: x");
        assert_eq!(format_uncaught("boom at script.js:10:15"), "boom at script.js (10:15)");
    }
}
