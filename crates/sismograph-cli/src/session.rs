//! The interactive session: one live interpreter, a history log, and the
//! last successfully rasterized image.
//!
//! All mutation is serialized by the single-threaded server loop: one event
//! is applied at a time, and the renderer only runs after the interpreter
//! has fully quiesced for that event.

use crate::raster;
use sismograph_core::{Event, EvalMode, Interpreter, Statechart, load_statechart_file};
use sismograph_render::RenderOptions;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum HistoryEntry {
    EventTriggered(String),
    Step(String),
    Error(String),
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryEntry::EventTriggered(event) => write!(f, "Triggered event \"{event}\""),
            HistoryEntry::Step(step) => write!(f, "{step}"),
            HistoryEntry::Error(message) => write!(f, "Error: {message}"),
        }
    }
}

pub struct Session {
    definition_path: PathBuf,
    chart: Arc<Statechart>,
    interpreter: Interpreter,
    pub options: RenderOptions,
    pub permissive: bool,
    history: Vec<HistoryEntry>,
    image: Option<Vec<u8>>,
    /// Bumped on every image refresh; used by the page to bust the
    /// browser's image cache.
    image_seq: u64,
}

impl Session {
    /// Loads the definition and runs the interpreter to its initial stable
    /// configuration.
    ///
    /// Interactive sessions start permissive: demo charts routinely reference
    /// variables that are not wired up yet, and those should degrade to
    /// no-ops instead of halting the first event. The form opts back into
    /// strict evaluation.
    pub fn open(path: &Path, options: RenderOptions) -> sismograph_core::Result<Self> {
        let (chart, interpreter) = boot(path, true)?;
        Ok(Self {
            definition_path: path.to_path_buf(),
            chart,
            interpreter,
            options,
            permissive: true,
            history: Vec::new(),
            image: None,
            image_seq: 0,
        })
    }

    /// Discards the interpreter and the history and reconstructs both from
    /// the original definition.
    pub fn reset(&mut self) -> sismograph_core::Result<()> {
        let (chart, interpreter) = boot(&self.definition_path, self.permissive)?;
        self.chart = chart;
        self.interpreter = interpreter;
        self.history.clear();
        tracing::info!("session reset");
        Ok(())
    }

    /// Pushes the permissive/strict choice down to the evaluator.
    pub fn apply_eval_mode(&mut self) {
        let mode = if self.permissive {
            EvalMode::Permissive
        } else {
            EvalMode::Strict
        };
        self.interpreter.context_mut().set_mode(mode);
    }

    /// Applies one external event: records the trigger marker, executes to
    /// quiescence, and appends every resulting micro-step to the history.
    ///
    /// A strict-mode evaluation error halts the in-flight macro-step and is
    /// recorded in the history; partial event processing is not retried.
    pub fn trigger(&mut self, event: &str) {
        self.history
            .push(HistoryEntry::EventTriggered(event.to_string()));
        self.apply_eval_mode();
        self.interpreter.queue(Event::new(event));
        match self.interpreter.execute() {
            Ok(macro_steps) => {
                for macro_step in macro_steps {
                    for step in macro_step.steps {
                        self.history.push(HistoryEntry::Step(step.to_string()));
                    }
                }
            }
            Err(err) => {
                tracing::warn!(%err, event, "event processing halted");
                self.history.push(HistoryEntry::Error(err.to_string()));
            }
        }
    }

    /// Event labels on transitions leaving the currently active states,
    /// deduplicated, in document order.
    pub fn enabled_events(&self) -> Vec<String> {
        let mut events: Vec<String> = Vec::new();
        for state in self.interpreter.configuration() {
            for transition in self.chart.transitions_from(state) {
                if let Some(event) = &transition.event {
                    if !events.iter().any(|e| e == event) {
                        events.push(event.clone());
                    }
                }
            }
        }
        events
    }

    pub fn render_dot_document(&self) -> sismograph_render::Result<String> {
        sismograph_render::dot::render_dot(
            &self.chart,
            self.interpreter.configuration(),
            &self.options,
        )
    }

    /// Re-renders and re-rasterizes the diagram. On rasterization failure
    /// the previously rendered image is retained so the view never shows a
    /// corrupt or empty diagram.
    pub fn refresh_image(&mut self) {
        let dot_source = match self.render_dot_document() {
            Ok(doc) => doc,
            Err(err) => {
                tracing::warn!(%err, "render failed; keeping previous image");
                return;
            }
        };
        match raster::rasterize(&dot_source, "png") {
            Ok(bytes) => {
                self.image = Some(bytes);
                self.image_seq += 1;
            }
            Err(err) => {
                tracing::warn!(%err, "rasterization failed; keeping previous image");
            }
        }
    }

    pub fn image(&self) -> Option<&[u8]> {
        self.image.as_deref()
    }

    pub fn image_seq(&self) -> u64 {
        self.image_seq
    }

    /// History entries, oldest first. Presentation reverses them.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }
}

fn boot(
    path: &Path,
    permissive: bool,
) -> sismograph_core::Result<(Arc<Statechart>, Interpreter)> {
    let chart = Arc::new(load_statechart_file(path)?);
    let mut interpreter = Interpreter::new(chart.clone());
    let mode = if permissive {
        EvalMode::Permissive
    } else {
        EvalMode::Strict
    };
    interpreter.context_mut().set_mode(mode);
    interpreter.execute()?;
    Ok((chart, interpreter))
}
