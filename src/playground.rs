//! The host facade: one playground wiring store, layout, preview and
//! console together.
//!
//! Edits are write-through: every accepted edit rebuilds the preview (the
//! console view is cleared as part of that, and the sandbox starts over
//! with fresh global state) and persists the source snapshot before
//! returning. Layout is persisted only at drag release and on console
//! toggle.

use crate::bridge::ConsoleLog;
use crate::layout::{GeometryVars, LayoutEngine, Resizer};
use crate::preview::Preview;
use crate::store::{self, KeyValueStore};
use crate::{PlaygroundConfig, Result, ScriptResult, SourceSlot, SourceSnapshot};

pub struct Playground<S: KeyValueStore> {
    config: PlaygroundConfig,
    store: S,
    sources: SourceSnapshot,
    layout: LayoutEngine,
    preview: Preview,
    console: ConsoleLog,
}

impl<S: KeyValueStore> Playground<S> {
    /// Open a playground over the given store.
    ///
    /// Restores the persisted sources and layout when present (falling
    /// back to empty sources and default geometry), then performs the
    /// initial rebuild.
    pub fn open(store: S, config: PlaygroundConfig) -> Result<Self> {
        let sources = store::load_sources(&store).unwrap_or_default();
        let vars = store::load_layout(&store).unwrap_or_default();

        let mut playground = Self {
            preview: Preview::new(config.clone()),
            config,
            store,
            sources,
            layout: LayoutEngine::new(vars),
            console: ConsoleLog::new(),
        };
        playground.rebuild()?;
        Ok(playground)
    }

    /// Apply one edit event to a source slot and rebuild the preview.
    pub fn edit(&mut self, slot: SourceSlot, value: &str) -> Result<ScriptResult> {
        match slot {
            SourceSlot::Markup => self.sources.markup = value.to_string(),
            SourceSlot::Style => self.sources.style = value.to_string(),
            SourceSlot::Script => self.sources.script = value.to_string(),
        }
        self.rebuild()
    }

    // Full rebuild: clear the console view, discard and recreate the
    // sandbox, then write the snapshot through to the store.
    fn rebuild(&mut self) -> Result<ScriptResult> {
        self.console.clear();
        let result = self.preview.rebuild(&self.sources)?;
        store::save_sources(&mut self.store, &self.sources);
        Ok(result)
    }

    /// Drain the sandbox channel into the console view.
    ///
    /// Returns the number of accepted messages; spoofed or malformed
    /// payloads are dropped by the receiver and not counted.
    pub fn pump_console(&mut self) -> usize {
        let mut accepted = 0;
        for raw in self.preview.drain_messages() {
            if self.console.receive(&raw) {
                accepted += 1;
            }
        }
        accepted
    }

    /// Pointer press over a resizer: begin a drag session.
    pub fn pointer_down(&mut self, resizer: Resizer, x: f64, y: f64) {
        self.layout.pointer_down(resizer, x, y, self.config.viewport);
    }

    /// Pointer move: feed the active drag session, if any.
    pub fn pointer_move(&mut self, x: f64, y: f64) -> bool {
        self.layout.pointer_move(x, y)
    }

    /// Pointer release anywhere: end the session and persist the layout
    /// when one was active. Returns whether a persist happened.
    pub fn pointer_up(&mut self) -> bool {
        let was_active = self.layout.pointer_up();
        if was_active {
            store::save_layout(&mut self.store, self.layout.vars());
        }
        was_active
    }

    /// Flip the console-open flag and persist the layout.
    pub fn toggle_console(&mut self) -> bool {
        let open = self.layout.toggle_console();
        store::save_layout(&mut self.store, self.layout.vars());
        open
    }

    /// Manual clear of the console view. Sources and layout are untouched.
    pub fn clear_console(&mut self) {
        self.console.clear();
    }

    pub fn sources(&self) -> &SourceSnapshot {
        &self.sources
    }

    pub fn geometry(&self) -> &GeometryVars {
        self.layout.vars()
    }

    pub fn layout(&self) -> &LayoutEngine {
        &self.layout
    }

    pub fn console(&self) -> &ConsoleLog {
        &self.console
    }

    /// Mutable console access, e.g. to register an observer callback
    pub fn console_mut(&mut self) -> &mut ConsoleLog {
        &mut self.console
    }

    pub fn preview(&self) -> &Preview {
        &self.preview
    }

    /// Hand the store back, closing the preview.
    pub fn close(self) -> S {
        self.preview.close();
        self.store
    }
}
