//! Clustered Graphviz DOT serialization.
//!
//! Composite states become `cluster_` subgraphs. The `compound` syntax does
//! not allow an edge to terminate directly at a cluster, so every composite
//! state that participates in a transition (or is the target of an
//! initial-marker edge) carries an invisible anchor node inside its
//! cluster; edges terminate at the anchor and are clipped to the cluster
//! boundary via `ltail`/`lhead`. Transitions into a proper descendant of
//! their source are split into two segments around an invisible waypoint
//! declared inside the source's cluster.

use crate::label::compose_label;
use crate::{RenderOptions, Result};
use indexmap::IndexSet;
use sismograph_core::{State, StateKind, Statechart};

const HIGHLIGHT_COLOR: &str = "#3399ff";

pub fn render_dot(
    chart: &Statechart,
    configuration: &IndexSet<String>,
    options: &RenderOptions,
) -> Result<String> {
    chart.validate()?;

    let nodes = indent(&visit_state(chart, chart.root(), configuration)?);
    let edges = indent(&render_edges(chart, configuration, options)?);
    tracing::debug!(
        chart = chart.name(),
        states = chart.states().count(),
        transitions = chart.transitions().len(),
        "rendered dot document"
    );

    Ok(format!(
        "digraph {{\n  compound=true;\n  edge [ fontsize={fontsize} ];\n  label = <<b>{name}</b>>{nodes}{edges}\n}}\n",
        fontsize = options.edge_fontsize,
        name = escape_html(chart.name()),
    ))
}

/// Recursive, depth-first, pre-order node emission. Every returned chunk
/// starts with a newline so the caller controls indentation.
fn visit_state(
    chart: &Statechart,
    name: &str,
    configuration: &IndexSet<String>,
) -> Result<String> {
    let state = chart.state(name)?;
    let active = configuration.contains(name);
    let color = if active {
        format!("\"{HIGHLIGHT_COLOR}\"")
    } else {
        "black".to_string()
    };

    if state.kind == StateKind::Leaf {
        let style = if active { " style=filled" } else { "" };
        let label = leaf_label(state);
        return Ok(format!(
            "\n\"{id}\" [label=\"{label}\" shape=Mrecord{style} color={color}]",
            id = escape_quoted(name),
        ));
    }

    let style = match state.kind {
        StateKind::Compound => "style=rounded",
        _ => "style=dashed",
    };

    let mut inner = String::new();
    for child in &state.children {
        inner.push_str(&indent(&visit_state(chart, child, configuration)?));
    }

    let mut extras = String::new();
    if state.kind == StateKind::Compound {
        if let Some(initial) = state.initial.as_deref() {
            let (anchor, boundary) = valid_nodes(chart, initial)?;
            let lhead = if boundary == anchor {
                String::new()
            } else {
                format!(" [lhead=\"{}\"]", escape_quoted(&boundary))
            };
            extras.push_str(&format!(
                "\n  node [shape=point width=.25 height=.25];\n  \"initial_{id}\" -> \"{anchor}\"{lhead}",
                id = escape_quoted(name),
                anchor = escape_quoted(&anchor),
            ));
        }
    }
    if needs_anchor(chart, state)? {
        extras.push_str(&format!(
            "\n  node [shape=point style=invisible width=0 height=0];\n  \"invisible_{id}\"",
            id = escape_quoted(name),
        ));
    }

    // Waypoints for transitions from this state into its own descendants.
    let mut waypoints = String::new();
    for (ordinal, transition) in chart.transitions_from(name).enumerate() {
        if chart.is_descendant(&transition.target, name)? {
            waypoints.push_str(&format!(
                "\n  \"point_{id}_{ordinal}\"",
                id = escape_quoted(name),
            ));
        }
    }
    if !waypoints.is_empty() {
        extras.push_str("\n  node [shape=point margin=0 style=invis width=0 height=0];");
        extras.push_str(&waypoints);
    }

    Ok(format!(
        "\nsubgraph \"cluster_{id}\" {{\n  label = \"{label}\"\n  color = {color}\n  {style}\n  node [shape=Mrecord width=.4 height=.4];{inner}{extras}\n}}",
        id = escape_quoted(name),
        label = escape_quoted(name),
    ))
}

/// One pass over all transitions in stable document order.
fn render_edges(
    chart: &Statechart,
    configuration: &IndexSet<String>,
    options: &RenderOptions,
) -> Result<String> {
    let mut out = String::new();
    for state in chart.states() {
        for (ordinal, transition) in chart.transitions_from(&state.name).enumerate() {
            let (source_anchor, source_boundary) = valid_nodes(chart, &transition.source)?;
            let (target_anchor, target_boundary) = valid_nodes(chart, &transition.target)?;

            // Highlight transitions that are currently triggerable.
            let color = if transition.event.is_some() && configuration.contains(&transition.source)
            {
                format!(" color=\"{HIGHLIGHT_COLOR}\"")
            } else {
                String::new()
            };
            let label = compose_label(transition, options);

            if chart.is_descendant(&transition.target, &transition.source)? {
                // Two segments around the waypoint: the first is clipped at
                // the source boundary only, the second carries the label and
                // is clipped at the target boundary only.
                let waypoint = format!("point_{}_{ordinal}", transition.source);
                out.push_str(&edge_text(
                    &source_anchor,
                    &waypoint,
                    Some(&source_boundary),
                    None,
                    "",
                    " dir=none",
                    &color,
                ));
                out.push_str(&edge_text(
                    &waypoint,
                    &target_anchor,
                    None,
                    Some(&target_boundary),
                    &label,
                    "",
                    &color,
                ));
            } else {
                out.push_str(&edge_text(
                    &source_anchor,
                    &target_anchor,
                    Some(&source_boundary),
                    Some(&target_boundary),
                    &label,
                    "",
                    &color,
                ));
            }
        }
    }
    Ok(out)
}

/// Resolves a state to its `(anchor node, boundary reference)` pair: a leaf
/// anchors edges itself, a composite routes them through its invisible
/// anchor and clips at its cluster boundary.
fn valid_nodes(chart: &Statechart, name: &str) -> Result<(String, String)> {
    let state = chart.state(name)?;
    if state.is_composite() {
        Ok((format!("invisible_{name}"), format!("cluster_{name}")))
    } else {
        Ok((name.to_string(), name.to_string()))
    }
}

fn edge_text(
    source: &str,
    target: &str,
    ltail: Option<&str>,
    lhead: Option<&str>,
    label: &str,
    dir: &str,
    color: &str,
) -> String {
    let ltail = match ltail {
        Some(boundary) if boundary != source => {
            format!(" ltail=\"{}\"", escape_quoted(boundary))
        }
        _ => String::new(),
    };
    let lhead = match lhead {
        Some(boundary) if boundary != target => {
            format!(" lhead=\"{}\"", escape_quoted(boundary))
        }
        _ => String::new(),
    };
    format!(
        "\n\"{source}\" -> \"{target}\" [label=\"{label}\"{ltail}{lhead}{dir}{color}]",
        source = escape_quoted(source),
        target = escape_quoted(target),
        label = escape_quoted(label),
    )
}

/// A composite needs its invisible anchor when any transition starts or
/// ends at it, or when it is the designated initial child of a compound
/// parent (the initial-marker edge must terminate at a real node).
fn needs_anchor(chart: &Statechart, state: &State) -> Result<bool> {
    if chart.transitions_from(&state.name).next().is_some()
        || chart.transitions_to(&state.name).next().is_some()
    {
        return Ok(true);
    }
    if let Some(parent) = state.parent.as_deref() {
        let parent = chart.state(parent)?;
        if parent.kind == StateKind::Compound && parent.initial.as_deref() == Some(&state.name) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn leaf_label(state: &State) -> String {
    if state.on_entry.is_none() && state.on_exit.is_none() {
        return escape_record(&state.name);
    }
    let mut rows = String::new();
    if let Some(entry) = state.on_entry.as_deref() {
        rows.push_str(&format!("entry / {}\\l", escape_record(entry)));
    }
    if let Some(exit) = state.on_exit.as_deref() {
        rows.push_str(&format!("exit / {}\\l", escape_record(exit)));
    }
    format!("{{{}|{rows}}}", escape_record(&state.name))
}

/// Prefixes every non-empty line with two spaces.
fn indent(s: &str) -> String {
    s.lines()
        .map(|line| {
            if line.is_empty() {
                line.to_string()
            } else {
                format!("  {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Escapes content embedded in a double-quoted DOT string.
fn escape_quoted(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Escapes content embedded in an Mrecord label (also a quoted string, plus
/// the record-syntax metacharacters).
fn escape_record(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' | '"' | '|' | '{' | '}' | '<' | '>' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
