mod eval;

/// A nested chart exercising guards, actions, and transitions declared on
/// composite states.
pub(crate) const COUNTER_YAML: &str = r#"
statechart:
  name: counter
  root state:
    name: root
    initial: active
    states:
      - name: active
        initial: low
        on entry: setdefault('count', 0)
        transitions:
          - target: done
            event: finish
        states:
          - name: low
            transitions:
              - target: high
                event: step
                guard: count >= 2
              - target: low
                event: step
                action: count = count + 1
          - name: high
            transitions:
              - target: active
                event: reset
      - name: done
"#;

/// Two orthogonal regions with independent event vocabularies.
pub(crate) const STOPWATCH_YAML: &str = r#"
statechart:
  name: stopwatch
  root state:
    name: stopwatch
    parallel states:
      - name: display
        initial: time view
        states:
          - name: time view
            transitions:
              - target: lap view
                event: toggle
          - name: lap view
            transitions:
              - target: time view
                event: toggle
      - name: engine
        initial: stopped
        states:
          - name: stopped
            transitions:
              - target: running
                event: start
          - name: running
            transitions:
              - target: stopped
                event: stop
"#;
