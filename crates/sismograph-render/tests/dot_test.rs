use indexmap::IndexSet;
use sismograph_core::{State, StateKind, Statechart, Transition, load_statechart};
use sismograph_render::{OutputSyntax, RenderOptions, render};

const MICROWAVE_YAML: &str = r#"
statechart:
  name: microwave
  root state:
    name: oven
    initial: closed
    states:
      - name: closed
        initial: idle
        transitions:
          - target: idle
            event: reset
        states:
          - name: idle
            transitions:
              - target: heating
                event: start
                guard: power > 0
                action: send('beep')
          - name: heating
            on entry: lamp = 1
            on exit: lamp = 0
            transitions:
              - target: idle
                event: stop
      - name: open
        transitions:
          - target: closed
            event: close
"#;

fn active(names: &[&str]) -> IndexSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn render_dot_with(configuration: &IndexSet<String>, options: &RenderOptions) -> String {
    let chart = load_statechart(MICROWAVE_YAML).unwrap();
    render(&chart, configuration, options, OutputSyntax::Dot).unwrap()
}

#[test]
fn output_is_deterministic() {
    let configuration = active(&["oven", "closed", "idle"]);
    let options = RenderOptions::default();
    let first = render_dot_with(&configuration, &options);
    let second = render_dot_with(&configuration, &options);
    assert_eq!(first, second);
}

#[test]
fn document_skeleton_and_title() {
    let doc = render_dot_with(&IndexSet::new(), &RenderOptions::default());
    assert!(doc.starts_with("digraph {\n  compound=true;\n"), "{doc}");
    assert!(doc.contains("edge [ fontsize=14 ];"), "{doc}");
    assert!(doc.contains("label = <<b>microwave</b>>"), "{doc}");
    assert!(doc.ends_with("}\n"), "{doc}");
}

#[test]
fn composite_states_become_clusters_with_initial_markers() {
    let doc = render_dot_with(&IndexSet::new(), &RenderOptions::default());

    assert!(doc.contains("subgraph \"cluster_oven\" {"), "{doc}");
    assert!(doc.contains("subgraph \"cluster_closed\" {"), "{doc}");
    // Leaves are plain Mrecord nodes, not clusters.
    assert!(!doc.contains("cluster_idle"), "{doc}");
    assert!(doc.contains("\"idle\" [label=\"idle\" shape=Mrecord"), "{doc}");

    // The initial marker of `oven` points at its composite child through the
    // child's anchor, clipped to the child's cluster.
    assert!(
        doc.contains("\"initial_oven\" -> \"invisible_closed\" [lhead=\"cluster_closed\"]"),
        "{doc}"
    );
    // The initial marker of `closed` terminates directly at the leaf.
    assert!(doc.contains("\"initial_closed\" -> \"idle\"\n"), "{doc}");
}

#[test]
fn edges_at_composite_states_are_boundary_clipped() {
    let doc = render_dot_with(&IndexSet::new(), &RenderOptions::default());

    // open -> closed ends at the anchor, clipped at the cluster boundary.
    assert!(
        doc.contains(
            "\"open\" -> \"invisible_closed\" [label=\"close\" lhead=\"cluster_closed\"]"
        ),
        "{doc}"
    );
}

#[test]
fn descendant_transition_splits_around_a_waypoint() {
    let doc = render_dot_with(&IndexSet::new(), &RenderOptions::default());

    // The waypoint is declared inside the source's cluster.
    assert!(
        doc.contains("node [shape=point margin=0 style=invis width=0 height=0];"),
        "{doc}"
    );
    assert!(doc.contains("\"point_closed_0\""), "{doc}");

    // First segment: unlabeled, undirected, clipped at the source boundary.
    assert!(
        doc.contains(
            "\"invisible_closed\" -> \"point_closed_0\" [label=\"\" ltail=\"cluster_closed\" dir=none]"
        ),
        "{doc}"
    );
    // Second segment carries the label and the head clip (none needed for a
    // leaf target).
    assert!(
        doc.contains("\"point_closed_0\" -> \"idle\" [label=\"reset\"]"),
        "{doc}"
    );
}

#[test]
fn labels_compose_event_guard_and_action() {
    let doc = render_dot_with(&IndexSet::new(), &RenderOptions::default());
    assert!(
        doc.contains("[label=\"start [power > 0] / send('beep')\""),
        "{doc}"
    );

    let no_guards = render_dot_with(
        &IndexSet::new(),
        &RenderOptions {
            include_guards: false,
            ..Default::default()
        },
    );
    assert!(
        no_guards.contains("[label=\"start / send('beep')\""),
        "{no_guards}"
    );

    let bare = render_dot_with(
        &IndexSet::new(),
        &RenderOptions {
            include_guards: false,
            include_actions: false,
            ..Default::default()
        },
    );
    assert!(bare.contains("[label=\"start\""), "{bare}");
}

#[test]
fn active_states_and_enabled_transitions_are_highlighted() {
    let doc = render_dot_with(&active(&["oven", "closed", "idle"]), &RenderOptions::default());

    // Active leaf: filled and recolored.
    assert!(
        doc.contains("\"idle\" [label=\"idle\" shape=Mrecord style=filled color=\"#3399ff\"]"),
        "{doc}"
    );
    // Active cluster border.
    assert!(
        doc.contains("label = \"closed\"\n      color = \"#3399ff\""),
        "{doc}"
    );
    // The transition leaving the active `idle` is triggerable.
    assert!(
        doc.contains("\"idle\" -> \"heating\" [label=\"start [power > 0] / send('beep')\" color=\"#3399ff\"]"),
        "{doc}"
    );
    // Inactive sources stay black.
    assert!(
        doc.contains("\"open\" -> \"invisible_closed\" [label=\"close\" lhead=\"cluster_closed\"]"),
        "{doc}"
    );
}

#[test]
fn entry_and_exit_actions_render_as_record_rows() {
    let doc = render_dot_with(&IndexSet::new(), &RenderOptions::default());
    assert!(
        doc.contains("\"heating\" [label=\"{heating|entry / lamp = 1\\lexit / lamp = 0\\l}\""),
        "{doc}"
    );
}

#[test]
fn font_size_option_is_applied_graph_wide() {
    let doc = render_dot_with(
        &IndexSet::new(),
        &RenderOptions {
            edge_fontsize: 8,
            ..Default::default()
        },
    );
    assert!(doc.contains("edge [ fontsize=8 ];"), "{doc}");
}

#[test]
fn orthogonal_states_are_dashed_without_initial_markers() {
    let chart = load_statechart(
        r#"
statechart:
  name: regions
  root state:
    name: top
    parallel states:
      - name: left
        initial: l1
        states:
          - name: l1
          - name: l2
      - name: right
        initial: r1
        states:
          - name: r1
"#,
    )
    .unwrap();
    let doc = render(
        &chart,
        &IndexSet::new(),
        &RenderOptions::default(),
        OutputSyntax::Dot,
    )
    .unwrap();

    assert!(doc.contains("subgraph \"cluster_top\" {"), "{doc}");
    assert!(doc.contains("style=dashed"), "{doc}");
    // All regions are entered concurrently, so the orthogonal cluster has no
    // entry point of its own; its compound children keep theirs.
    assert!(!doc.contains("\"initial_top\""), "{doc}");
    assert!(doc.contains("\"initial_left\" -> \"l1\""), "{doc}");
    assert!(doc.contains("\"initial_right\" -> \"r1\""), "{doc}");
}

#[test]
fn state_names_with_spaces_stay_quoted() {
    let chart = load_statechart(
        r#"
statechart:
  name: named
  root state:
    name: top level
    initial: first step
    states:
      - name: first step
        transitions:
          - target: second step
            event: go
      - name: second step
"#,
    )
    .unwrap();
    let doc = render(
        &chart,
        &IndexSet::new(),
        &RenderOptions::default(),
        OutputSyntax::Dot,
    )
    .unwrap();
    assert!(doc.contains("subgraph \"cluster_top level\" {"), "{doc}");
    assert!(doc.contains("\"first step\" -> \"second step\" [label=\"go\"]"), "{doc}");
}

#[test]
fn invalid_model_is_rejected_before_serialization() {
    let chart = Statechart::from_parts(
        "broken",
        "root",
        vec![
            State {
                name: "root".to_string(),
                kind: StateKind::Compound,
                parent: None,
                children: vec!["a".to_string()],
                initial: Some("missing".to_string()),
                on_entry: None,
                on_exit: None,
            },
            State {
                name: "a".to_string(),
                kind: StateKind::Leaf,
                parent: Some("root".to_string()),
                children: Vec::new(),
                initial: None,
                on_entry: None,
                on_exit: None,
            },
        ],
        Vec::<Transition>::new(),
    )
    .unwrap();

    let err = render(
        &chart,
        &IndexSet::new(),
        &RenderOptions::default(),
        OutputSyntax::Dot,
    )
    .unwrap_err();
    assert!(err.to_string().contains("initial child missing"), "{err}");
}
