use crate::RenderOptions;
use sismograph_core::Transition;

/// Composes a transition label: event, `[guard]`, `/ action`, in that fixed
/// order, absent parts omitted, present parts space-joined. Escaping is the
/// serializer's concern.
pub(crate) fn compose_label(transition: &Transition, options: &RenderOptions) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(event) = &transition.event {
        parts.push(event.clone());
    }
    if options.include_guards {
        if let Some(guard) = &transition.guard {
            parts.push(format!("[{guard}]"));
        }
    }
    if options.include_actions {
        if let Some(action) = &transition.action {
            parts.push(format!("/ {action}"));
        }
    }
    parts.join(" ")
}
