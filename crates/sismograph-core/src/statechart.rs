//! The statechart model and its read-only query surface.
//!
//! States form a tree rooted at a single root state. All queries return
//! results in document order (the order states appear in the definition),
//! which downstream renderers rely on for deterministic output.

use crate::{Error, Result};
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Leaf,
    Compound,
    Orthogonal,
}

#[derive(Debug, Clone)]
pub struct State {
    pub name: String,
    pub kind: StateKind,
    pub parent: Option<String>,
    /// Child state names, in declared order. Empty for `Leaf`.
    pub children: Vec<String>,
    /// The designated initial child. Only meaningful for `Compound`.
    pub initial: Option<String>,
    pub on_entry: Option<String>,
    pub on_exit: Option<String>,
}

impl State {
    pub fn is_composite(&self) -> bool {
        matches!(self.kind, StateKind::Compound | StateKind::Orthogonal)
    }
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub source: String,
    pub target: String,
    pub event: Option<String>,
    pub guard: Option<String>,
    pub action: Option<String>,
}

/// An immutable statechart. Constructed once by the loader (or
/// [`Statechart::from_parts`] in tests) and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Statechart {
    name: String,
    root: String,
    states: IndexMap<String, State>,
    transitions: Vec<Transition>,
}

impl Statechart {
    /// Assembles a statechart from already-flattened parts.
    ///
    /// Only duplicate state names are rejected here; callers that accept
    /// untrusted definitions should follow up with [`Statechart::validate`].
    pub fn from_parts(
        name: impl Into<String>,
        root: impl Into<String>,
        states: Vec<State>,
        transitions: Vec<Transition>,
    ) -> Result<Self> {
        let mut map = IndexMap::with_capacity(states.len());
        for state in states {
            let state_name = state.name.clone();
            if map.insert(state_name.clone(), state).is_some() {
                return Err(Error::integrity(format!(
                    "duplicate state name: {state_name}"
                )));
            }
        }
        Ok(Self {
            name: name.into(),
            root: root.into(),
            states: map,
            transitions,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn state(&self, name: &str) -> Result<&State> {
        self.states
            .get(name)
            .ok_or_else(|| Error::integrity(format!("unknown state: {name}")))
    }

    /// All states in document order.
    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.values()
    }

    pub fn children_for(&self, name: &str) -> Result<&[String]> {
        Ok(self.state(name)?.children.as_slice())
    }

    /// Proper descendants of `name`, pre-order, children in declared order.
    pub fn descendants_for(&self, name: &str) -> Result<Vec<String>> {
        let mut out = Vec::new();
        let mut stack: Vec<&String> = self.state(name)?.children.iter().rev().collect();
        while let Some(child) = stack.pop() {
            out.push(child.clone());
            stack.extend(self.state(child)?.children.iter().rev());
        }
        Ok(out)
    }

    /// Proper ancestors of `name`, innermost first.
    pub fn ancestors_for(&self, name: &str) -> Result<Vec<String>> {
        let mut out = Vec::new();
        let mut current = self.state(name)?;
        while let Some(parent) = current.parent.as_deref() {
            out.push(parent.to_string());
            current = self.state(parent)?;
        }
        Ok(out)
    }

    /// Whether `name` is a proper descendant of `of`.
    pub fn is_descendant(&self, name: &str, of: &str) -> Result<bool> {
        Ok(self.ancestors_for(name)?.iter().any(|a| a == of))
    }

    /// All transitions, in document order (declared order of states, then
    /// declared order of transitions per source state).
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn transitions_from<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Transition> {
        self.transitions.iter().filter(move |t| t.source == name)
    }

    pub fn transitions_to<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Transition> {
        self.transitions.iter().filter(move |t| t.target == name)
    }

    /// Checks the structural invariants: the parent/child relation is a tree
    /// rooted at the single root state, every reference names a known state,
    /// and every Compound initial child is one of its children.
    pub fn validate(&self) -> Result<()> {
        let root = self.state(&self.root)?;
        if root.parent.is_some() {
            return Err(Error::integrity(format!(
                "root state {} must not have a parent",
                self.root
            )));
        }

        for state in self.states.values() {
            for child_name in &state.children {
                let child = self.state(child_name)?;
                if child.parent.as_deref() != Some(state.name.as_str()) {
                    return Err(Error::integrity(format!(
                        "state {child_name} is listed as a child of {} but reports parent {:?}",
                        state.name, child.parent
                    )));
                }
            }
            if let Some(parent_name) = state.parent.as_deref() {
                let parent = self.state(parent_name)?;
                let listed = parent.children.iter().filter(|c| *c == &state.name).count();
                if listed != 1 {
                    return Err(Error::integrity(format!(
                        "state {} must appear exactly once among the children of {parent_name}",
                        state.name
                    )));
                }
            } else if state.name != self.root {
                return Err(Error::integrity(format!(
                    "state {} has no parent but is not the root",
                    state.name
                )));
            }
            if state.kind == StateKind::Leaf && !state.children.is_empty() {
                return Err(Error::integrity(format!(
                    "leaf state {} must not have children",
                    state.name
                )));
            }
            if let Some(initial) = state.initial.as_deref() {
                if !state.children.iter().any(|c| c == initial) {
                    return Err(Error::integrity(format!(
                        "initial child {initial} of {} is not one of its children",
                        state.name
                    )));
                }
            }
        }

        // Reachability from the root covers every state exactly once iff the
        // relation is a tree (no cycles, no second parent).
        let mut reachable = 1usize;
        let mut stack: Vec<&str> = root.children.iter().map(String::as_str).collect();
        while let Some(name) = stack.pop() {
            reachable += 1;
            if reachable > self.states.len() {
                return Err(Error::integrity(
                    "state hierarchy contains a cycle".to_string(),
                ));
            }
            stack.extend(self.state(name)?.children.iter().map(String::as_str));
        }
        if reachable != self.states.len() {
            return Err(Error::integrity(format!(
                "{} states are not reachable from the root",
                self.states.len() - reachable
            )));
        }

        for transition in &self.transitions {
            self.state(&transition.source)?;
            self.state(&transition.target)?;
        }

        Ok(())
    }
}
