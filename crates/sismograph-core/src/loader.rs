//! YAML statechart definition loader.
//!
//! The accepted format: a `statechart` document with a `root state`, nested
//! `states` (Compound children) or `parallel states` (Orthogonal children),
//! `on entry`/`on exit` action code, and per-state `transitions`.

use crate::statechart::{State, StateKind, Statechart, Transition};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct DefinitionDoc {
    statechart: StatechartDef,
}

#[derive(Debug, Deserialize)]
struct StatechartDef {
    name: String,
    #[serde(rename = "root state")]
    root_state: StateDef,
}

#[derive(Debug, Deserialize)]
struct StateDef {
    name: String,
    #[serde(default)]
    initial: Option<String>,
    #[serde(default, rename = "on entry")]
    on_entry: Option<String>,
    #[serde(default, rename = "on exit")]
    on_exit: Option<String>,
    #[serde(default)]
    states: Vec<StateDef>,
    #[serde(default, rename = "parallel states")]
    parallel_states: Vec<StateDef>,
    #[serde(default)]
    transitions: Vec<TransitionDef>,
}

#[derive(Debug, Deserialize)]
struct TransitionDef {
    target: String,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    guard: Option<String>,
    #[serde(default)]
    action: Option<String>,
}

/// Parses a YAML statechart definition and validates its structure.
pub fn load_statechart(text: &str) -> Result<Statechart> {
    let doc: DefinitionDoc = serde_yaml::from_str(text)?;
    let mut states = Vec::new();
    let mut transitions = Vec::new();
    flatten(&doc.statechart.root_state, None, &mut states, &mut transitions)?;

    let root = doc.statechart.root_state.name.clone();
    let chart = Statechart::from_parts(doc.statechart.name, root, states, transitions)?;
    chart.validate()?;
    tracing::debug!(
        name = chart.name(),
        states = chart.states().count(),
        transitions = chart.transitions().len(),
        "loaded statechart definition"
    );
    Ok(chart)
}

pub fn load_statechart_file(path: impl AsRef<Path>) -> Result<Statechart> {
    let text = std::fs::read_to_string(path)?;
    load_statechart(&text)
}

fn flatten(
    def: &StateDef,
    parent: Option<&str>,
    states: &mut Vec<State>,
    transitions: &mut Vec<Transition>,
) -> Result<()> {
    if !def.states.is_empty() && !def.parallel_states.is_empty() {
        return Err(Error::integrity(format!(
            "state {} declares both `states` and `parallel states`",
            def.name
        )));
    }

    let (kind, children_defs) = if !def.states.is_empty() {
        (StateKind::Compound, &def.states)
    } else if !def.parallel_states.is_empty() {
        (StateKind::Orthogonal, &def.parallel_states)
    } else {
        (StateKind::Leaf, &def.states)
    };

    if def.initial.is_some() && kind != StateKind::Compound {
        return Err(Error::integrity(format!(
            "state {} declares an initial child but is not a compound state",
            def.name
        )));
    }

    states.push(State {
        name: def.name.clone(),
        kind,
        parent: parent.map(str::to_string),
        children: children_defs.iter().map(|c| c.name.clone()).collect(),
        initial: def.initial.clone(),
        on_entry: def.on_entry.clone(),
        on_exit: def.on_exit.clone(),
    });

    for t in &def.transitions {
        transitions.push(Transition {
            source: def.name.clone(),
            target: t.target.clone(),
            event: t.event.clone(),
            guard: t.guard.clone(),
            action: t.action.clone(),
        });
    }

    for child in children_defs {
        flatten(child, Some(&def.name), states, transitions)?;
    }

    Ok(())
}
