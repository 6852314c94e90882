//! Panel geometry and the drag-resize state machine.
//!
//! Six named geometry variables describe the workspace: three column width
//! percentages (always summing to 100), the editors-row height percentage,
//! the console height in pixels, and the console-open flag. Three resize
//! affordances share one pointer-event stream; a single [`DragSession`]
//! variant is active at a time, so the affordances cannot cross-talk.
//!
//! Moves that would push a variable outside its bounds are rejected
//! outright rather than clamped: the geometry freezes at the last valid
//! point until the pointer comes back into range.

use std::collections::BTreeMap;

use crate::Viewport;

/// Lower bound for a column width, in percent. A move proposing a value at
/// or below this for either side of the pair is rejected.
pub const COLUMN_MIN_PCT: f64 = 2.0;

/// Open interval bounds for the editors-row height, in percent.
pub const ROW_MIN_PCT: f64 = 10.0;
pub const ROW_MAX_PCT: f64 = 80.0;

/// Lower bound for the console height, in pixels.
pub const CONSOLE_MIN_PX: f64 = 30.0;

/// The six persisted geometry variables.
///
/// Encoded to and from the fixed external key names (`--html-w` etc.) with
/// unit-suffixed string values; see [`GeometryVars::to_map`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryVars {
    /// Markup column width, percent
    pub markup_w: f64,
    /// Style column width, percent
    pub style_w: f64,
    /// Script column width, percent
    pub script_w: f64,
    /// Editors-row height, percent of the viewport
    pub editors_h: f64,
    /// Console panel height, pixels
    pub console_h: f64,
    /// Whether the console panel is open
    pub console_open: bool,
}

impl Default for GeometryVars {
    fn default() -> Self {
        Self {
            markup_w: 33.3,
            style_w: 33.3,
            script_w: 33.4,
            editors_h: 55.0,
            console_h: 160.0,
            console_open: false,
        }
    }
}

impl GeometryVars {
    /// Encode to the persisted string map: percentages suffixed `%`, the
    /// console height suffixed `px`, the open flag as `"0"`/`"1"`.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("--html-w".to_string(), format!("{}%", self.markup_w));
        map.insert("--css-w".to_string(), format!("{}%", self.style_w));
        map.insert("--js-w".to_string(), format!("{}%", self.script_w));
        map.insert("--editors-h".to_string(), format!("{}%", self.editors_h));
        map.insert("--console-h".to_string(), format!("{}px", self.console_h));
        map.insert(
            "--console-open".to_string(),
            if self.console_open { "1" } else { "0" }.to_string(),
        );
        map
    }

    /// Decode from a persisted string map. Returns `None` when any of the
    /// six variables is missing or unparsable; a half-restored layout
    /// could violate the column-sum invariant, so the record is treated as
    /// absent instead.
    pub fn from_map(map: &BTreeMap<String, String>) -> Option<Self> {
        Some(Self {
            markup_w: parse_percent(map.get("--html-w")?)?,
            style_w: parse_percent(map.get("--css-w")?)?,
            script_w: parse_percent(map.get("--js-w")?)?,
            editors_h: parse_percent(map.get("--editors-h")?)?,
            console_h: parse_px(map.get("--console-h")?)?,
            console_open: parse_flag(map.get("--console-open")?)?,
        })
    }
}

fn parse_percent(s: &str) -> Option<f64> {
    s.trim().strip_suffix('%')?.trim().parse().ok()
}

fn parse_px(s: &str) -> Option<f64> {
    s.trim().strip_suffix("px")?.trim().parse().ok()
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim() {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

/// The adjacent column pair governed by one column resizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnPair {
    /// Resizer 0: markup and style columns
    MarkupStyle,
    /// Resizer 1: style and script columns
    StyleScript,
}

/// A resize affordance under the pointer at press time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resizer {
    Column(ColumnPair),
    Row,
    Console,
}

/// Transient state tracked between a resizer's press and release.
///
/// Exactly one variant other than `Idle` is active at a time; pressing a
/// resizer replaces whatever session was active (last press wins), and any
/// release anywhere ends it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragSession {
    Idle,
    Column {
        pair: ColumnPair,
        start_x: f64,
        start_a: f64,
        start_b: f64,
        container_w: f64,
    },
    Row {
        start_y: f64,
        start_h: f64,
        viewport_h: f64,
    },
    Console {
        start_y: f64,
        start_h: f64,
    },
}

/// Owns the geometry variables and the active drag session.
///
/// The engine itself never persists anything; [`pointer_up`] reports
/// whether a session was active so the caller can write the layout out at
/// release time and only then.
///
/// [`pointer_up`]: LayoutEngine::pointer_up
#[derive(Debug)]
pub struct LayoutEngine {
    vars: GeometryVars,
    session: DragSession,
}

impl LayoutEngine {
    /// Start from the given geometry (restored from the store, or default)
    pub fn new(vars: GeometryVars) -> Self {
        Self {
            vars,
            session: DragSession::Idle,
        }
    }

    pub fn vars(&self) -> &GeometryVars {
        &self.vars
    }

    pub fn session(&self) -> &DragSession {
        &self.session
    }

    /// Begin a drag session over the given resizer.
    ///
    /// Starting values are read from the live geometry, so dragging resumes
    /// correctly from whatever layout was last restored. The container
    /// dimension used to normalize deltas is captured here, once.
    pub fn pointer_down(&mut self, resizer: Resizer, x: f64, y: f64, viewport: Viewport) {
        self.session = match resizer {
            Resizer::Column(pair) => {
                let (start_a, start_b) = self.column_pair(pair);
                DragSession::Column {
                    pair,
                    start_x: x,
                    start_a,
                    start_b,
                    container_w: f64::from(viewport.width),
                }
            }
            Resizer::Row => DragSession::Row {
                start_y: y,
                start_h: self.vars.editors_h,
                viewport_h: f64::from(viewport.height),
            },
            Resizer::Console => DragSession::Console {
                start_y: y,
                start_h: self.vars.console_h,
            },
        };
    }

    /// Feed a pointer move into the active session, if any.
    ///
    /// Returns `true` when the move produced a geometry update; a move that
    /// would violate a bound (or a move with no active session) returns
    /// `false` and leaves the geometry untouched.
    pub fn pointer_move(&mut self, x: f64, y: f64) -> bool {
        match self.session {
            DragSession::Idle => false,
            DragSession::Column {
                pair,
                start_x,
                start_a,
                start_b,
                container_w,
            } => {
                let delta = (x - start_x) / container_w * 100.0;
                let a = start_a + delta;
                let b = start_b - delta;
                if a > COLUMN_MIN_PCT && b > COLUMN_MIN_PCT {
                    self.set_column_pair(pair, a, b);
                    true
                } else {
                    false
                }
            }
            DragSession::Row {
                start_y,
                start_h,
                viewport_h,
            } => {
                let delta = (y - start_y) / viewport_h * 100.0;
                let height = start_h + delta;
                if height > ROW_MIN_PCT && height < ROW_MAX_PCT {
                    self.vars.editors_h = height;
                    true
                } else {
                    false
                }
            }
            DragSession::Console { start_y, start_h } => {
                // Inverted axis: dragging up grows the console.
                let height = start_h + (start_y - y);
                if height > CONSOLE_MIN_PX {
                    self.vars.console_h = height;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// End the active session, wherever the pointer is.
    ///
    /// Returns `true` when a session was active, signalling the caller to
    /// persist the layout.
    pub fn pointer_up(&mut self) -> bool {
        let was_active = self.session != DragSession::Idle;
        self.session = DragSession::Idle;
        was_active
    }

    /// Flip the console-open flag; returns the new state.
    pub fn toggle_console(&mut self) -> bool {
        self.vars.console_open = !self.vars.console_open;
        self.vars.console_open
    }

    fn column_pair(&self, pair: ColumnPair) -> (f64, f64) {
        match pair {
            ColumnPair::MarkupStyle => (self.vars.markup_w, self.vars.style_w),
            ColumnPair::StyleScript => (self.vars.style_w, self.vars.script_w),
        }
    }

    fn set_column_pair(&mut self, pair: ColumnPair, a: f64, b: f64) {
        match pair {
            ColumnPair::MarkupStyle => {
                self.vars.markup_w = a;
                self.vars.style_w = b;
            }
            ColumnPair::StyleScript => {
                self.vars.style_w = a;
                self.vars.script_w = b;
            }
        }
    }
}
