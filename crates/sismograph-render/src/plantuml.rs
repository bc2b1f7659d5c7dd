//! PlantUML-style nested text serialization.
//!
//! Lower fidelity than the DOT output: one line per state, brace-nested
//! blocks for composite states, one line per transition. This syntax has no
//! cluster-boundary restriction, so none of the anchor/waypoint machinery
//! applies; traversal order and label composition are shared with the DOT
//! path.

use crate::label::compose_label;
use crate::{RenderOptions, Result};
use sismograph_core::Statechart;

pub fn render_plantuml(chart: &Statechart, options: &RenderOptions) -> Result<String> {
    chart.validate()?;

    let mut out = String::from("@startuml\n");
    write_state(chart, chart.root(), 0, &mut out)?;
    for state in chart.states() {
        for transition in chart.transitions_from(&state.name) {
            let label = compose_label(transition, options);
            if label.is_empty() {
                out.push_str(&format!("{} --> {}\n", transition.source, transition.target));
            } else {
                out.push_str(&format!(
                    "{} --> {} : {label}\n",
                    transition.source, transition.target
                ));
            }
        }
    }
    out.push_str("@enduml\n");
    Ok(out)
}

fn write_state(chart: &Statechart, name: &str, depth: usize, out: &mut String) -> Result<()> {
    let state = chart.state(name)?;
    let pad = "  ".repeat(depth);
    if state.children.is_empty() {
        out.push_str(&format!("{pad}state {name}\n"));
        return Ok(());
    }
    out.push_str(&format!("{pad}state {name} {{\n"));
    for child in &state.children {
        write_state(chart, child, depth + 1, out)?;
    }
    out.push_str(&format!("{pad}}}\n"));
    Ok(())
}
