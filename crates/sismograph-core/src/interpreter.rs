//! A small run-to-completion interpreter over a statechart.
//!
//! This is intentionally a demo-grade interpreter: one transition fires per
//! micro-step, selected innermost-active-state first and in declared order
//! within a state. After an event's transition, eventless transitions run
//! until quiescence within the same macro-step. History pseudostates and
//! joint transitions across orthogonal regions are not supported.

use crate::eval::{EvalContext, Value};
use crate::statechart::{StateKind, Statechart, Transition};
use crate::{Error, Result};
use indexmap::IndexSet;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Cap on eventless micro-steps per macro-step, so a guard that stays
/// enabled cannot wedge the session.
const MAX_EVENTLESS_STEPS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub name: String,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// One indivisible unit of execution: a set of exits, at most one
/// transition, and a set of entries.
#[derive(Debug, Clone)]
pub struct MicroStep {
    pub event: Option<String>,
    pub source: Option<String>,
    pub target: Option<String>,
    pub entered: Vec<String>,
    pub exited: Vec<String>,
}

impl fmt::Display for MicroStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.source, &self.target) {
            (Some(source), Some(target)) => {
                write!(f, "transition {source} -> {target}")?;
                if let Some(event) = &self.event {
                    write!(f, " on {event}")?;
                }
            }
            _ => write!(f, "initialization")?,
        }
        if !self.exited.is_empty() {
            write!(f, "; exited [{}]", self.exited.join(", "))?;
        }
        if !self.entered.is_empty() {
            write!(f, "; entered [{}]", self.entered.join(", "))?;
        }
        Ok(())
    }
}

/// Everything that happened in response to one event (or to
/// initialization/stabilization when `event` is `None`).
#[derive(Debug, Clone)]
pub struct MacroStep {
    pub event: Option<Event>,
    pub steps: Vec<MicroStep>,
}

/// A live statechart instance.
pub struct Interpreter {
    chart: Arc<Statechart>,
    configuration: IndexSet<String>,
    context: EvalContext,
    queue: VecDeque<Event>,
    initialized: bool,
}

impl Interpreter {
    pub fn new(chart: Arc<Statechart>) -> Self {
        Self {
            chart,
            configuration: IndexSet::new(),
            context: EvalContext::new(),
            queue: VecDeque::new(),
            initialized: false,
        }
    }

    pub fn statechart(&self) -> &Statechart {
        &self.chart
    }

    /// The active configuration, in document order.
    pub fn configuration(&self) -> &IndexSet<String> {
        &self.configuration
    }

    pub fn context(&self) -> &EvalContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut EvalContext {
        &mut self.context
    }

    /// Enqueues an external event. Chainable: `interp.queue(e).execute()`.
    pub fn queue(&mut self, event: Event) -> &mut Self {
        self.queue.push_back(event);
        self
    }

    /// Runs to quiescence, returning one macro-step per processed event
    /// (plus the initialization macro-step on first execution).
    pub fn execute(&mut self) -> Result<Vec<MacroStep>> {
        let mut out = Vec::new();
        while let Some(step) = self.execute_once()? {
            out.push(step);
        }
        Ok(out)
    }

    /// Processes initialization or a single queued event.
    pub fn execute_once(&mut self) -> Result<Option<MacroStep>> {
        if !self.initialized {
            return self.initialize().map(Some);
        }
        let Some(event) = self.queue.pop_front() else {
            return Ok(None);
        };
        tracing::debug!(event = %event.name, "dispatching event");
        let mut steps = Vec::new();
        if let Some(step) = self.fire_first_enabled(Some(&event))? {
            steps.push(step);
        }
        self.stabilize(&mut steps)?;
        Ok(Some(MacroStep {
            event: Some(event),
            steps,
        }))
    }

    fn initialize(&mut self) -> Result<MacroStep> {
        let root = self.chart.root().to_string();
        let mut entered = Vec::new();
        self.enter_default(&root, &mut entered)?;
        self.sort_configuration();
        self.initialized = true;

        let mut steps = vec![MicroStep {
            event: None,
            source: None,
            target: None,
            entered,
            exited: Vec::new(),
        }];
        self.stabilize(&mut steps)?;
        Ok(MacroStep { event: None, steps })
    }

    /// Fires eventless transitions until none is enabled.
    fn stabilize(&mut self, steps: &mut Vec<MicroStep>) -> Result<()> {
        for _ in 0..MAX_EVENTLESS_STEPS {
            match self.fire_first_enabled(None)? {
                Some(step) => steps.push(step),
                None => return Ok(()),
            }
        }
        tracing::warn!(
            limit = MAX_EVENTLESS_STEPS,
            "eventless transitions did not quiesce; stopping the macro-step"
        );
        Ok(())
    }

    /// Selects and fires the first enabled transition for `event` (or an
    /// eventless transition when `event` is `None`).
    fn fire_first_enabled(&mut self, event: Option<&Event>) -> Result<Option<MicroStep>> {
        let transients = transients_for(event);

        // Innermost active states first; document order breaks ties.
        let mut candidates: Vec<(usize, String)> = Vec::with_capacity(self.configuration.len());
        for name in &self.configuration {
            candidates.push((self.chart.ancestors_for(name)?.len(), name.clone()));
        }
        candidates.sort_by(|a, b| b.0.cmp(&a.0));

        for (_, source) in candidates {
            let transitions: Vec<Transition> =
                self.chart.transitions_from(&source).cloned().collect();
            for transition in transitions {
                let matches = match event {
                    Some(e) => transition.event.as_deref() == Some(e.name.as_str()),
                    None => transition.event.is_none(),
                };
                if !matches {
                    continue;
                }
                if let Some(guard) = &transition.guard {
                    let passed =
                        self.context
                            .evaluate_guard(guard, &self.configuration, &transients)?;
                    if !passed {
                        continue;
                    }
                }
                return self.fire(&transition, event).map(Some);
            }
        }
        Ok(None)
    }

    fn fire(&mut self, transition: &Transition, event: Option<&Event>) -> Result<MicroStep> {
        let source = transition.source.as_str();
        let target = transition.target.as_str();
        let transients = transients_for(event);

        // The transition's domain: the root for a root-targeted transition
        // (the root has no ancestor to host the domain; its descendants are
        // exited and the defaults re-entered), the source itself when
        // entering one of its own descendants, otherwise the least common
        // strict ancestor.
        let domain = if target == self.chart.root() {
            target.to_string()
        } else if self.chart.is_descendant(target, source)? {
            source.to_string()
        } else {
            self.least_common_ancestor(source, target)?
        };

        // Exit the active states below the domain, deepest first.
        let in_domain = self.chart.descendants_for(&domain)?;
        let mut exited: Vec<String> = self
            .configuration
            .iter()
            .filter(|name| in_domain.iter().any(|d| d == *name))
            .cloned()
            .collect();
        exited.sort_by_key(|name| {
            std::cmp::Reverse(self.chart.ancestors_for(name).map(|a| a.len()).unwrap_or(0))
        });
        for name in &exited {
            if let Some(code) = self.chart.state(name)?.on_exit.clone() {
                self.run_action(&code, &transients)?;
            }
            self.configuration.shift_remove(name);
        }

        if let Some(code) = transition.action.clone() {
            self.run_action(&code, &transients)?;
        }

        // Enter the path from the domain down to the target, then
        // default-complete the target.
        let mut entered = Vec::new();
        let mut path: Vec<String> = Vec::new();
        let mut cursor = target.to_string();
        while cursor != domain {
            let parent = match self.chart.state(&cursor)?.parent.clone() {
                Some(p) => p,
                None => break,
            };
            path.push(cursor.clone());
            cursor = parent;
        }
        path.reverse();
        for name in path.iter().take(path.len().saturating_sub(1)) {
            self.enter_single(name, &transients, &mut entered)?;
        }
        if target == domain {
            // Root-targeted transition: the domain stays active, only its
            // default completion is rebuilt.
            self.complete_defaults(target, &mut entered)?;
        } else {
            self.enter_default(target, &mut entered)?;
        }
        self.sort_configuration();

        Ok(MicroStep {
            event: event.map(|e| e.name.clone()),
            source: Some(source.to_string()),
            target: Some(target.to_string()),
            entered,
            exited,
        })
    }

    /// Enters a state and default-completes it: a Compound enters its
    /// initial child (first child when unspecified), an Orthogonal enters
    /// all children.
    fn enter_default(&mut self, name: &str, entered: &mut Vec<String>) -> Result<()> {
        let transients = HashMap::new();
        self.enter_single(name, &transients, entered)?;
        self.complete_defaults(name, entered)
    }

    fn complete_defaults(&mut self, name: &str, entered: &mut Vec<String>) -> Result<()> {
        let state = self.chart.state(name)?;
        match state.kind {
            StateKind::Leaf => Ok(()),
            StateKind::Compound => {
                let child = state
                    .initial
                    .clone()
                    .or_else(|| state.children.first().cloned());
                if let Some(child) = child {
                    self.enter_default(&child, entered)?;
                }
                Ok(())
            }
            StateKind::Orthogonal => {
                let children = state.children.clone();
                for child in children {
                    self.enter_default(&child, entered)?;
                }
                Ok(())
            }
        }
    }

    fn enter_single(
        &mut self,
        name: &str,
        transients: &HashMap<String, Value>,
        entered: &mut Vec<String>,
    ) -> Result<()> {
        self.configuration.insert(name.to_string());
        entered.push(name.to_string());
        if let Some(code) = self.chart.state(name)?.on_entry.clone() {
            self.run_action(&code, transients)?;
        }
        Ok(())
    }

    fn run_action(&mut self, code: &str, transients: &HashMap<String, Value>) -> Result<()> {
        let sent = self
            .context
            .execute_action(code, &self.configuration, transients)?;
        for name in sent {
            self.queue.push_back(Event::new(name));
        }
        Ok(())
    }

    /// Lowest strict ancestor common to both states. For two top-level
    /// states (or a self-transition at the root's child level) this is the
    /// root itself; a transition targeting one of its own ancestors exits
    /// and re-enters that ancestor, so the domain sits one level above it.
    fn least_common_ancestor(&self, a: &str, b: &str) -> Result<String> {
        let ancestors_a = self.chart.ancestors_for(a)?;
        let ancestors_b = self.chart.ancestors_for(b)?;
        for candidate in &ancestors_a {
            if ancestors_b.iter().any(|x| x == candidate) {
                return Ok(candidate.clone());
            }
        }
        Err(Error::integrity(format!(
            "states {a} and {b} share no common ancestor"
        )))
    }

    /// Rebuilds the configuration in document order so that renders and
    /// event listings are deterministic.
    fn sort_configuration(&mut self) {
        let ordered: IndexSet<String> = self
            .chart
            .states()
            .map(|s| s.name.clone())
            .filter(|name| self.configuration.contains(name))
            .collect();
        self.configuration = ordered;
    }
}

fn transients_for(event: Option<&Event>) -> HashMap<String, Value> {
    let mut transients = HashMap::new();
    if let Some(event) = event {
        transients.insert("event".to_string(), Value::Str(event.name.clone()));
    }
    transients
}
