//! Event system for stage lifecycle hooks.
//!
//! Provides an optional, non-intrusive way to observe a pipeline run.
//! Stages emit events when they start, skip generation, receive a model
//! reply, and finish. Implement [`EventHandler`] to receive them for
//! progress tracking or usage accounting (see
//! [`UsageTracker`](crate::cost::UsageTracker)).

use crate::backend::TokenUsage;
use std::sync::Arc;

/// Events emitted during a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A stage has started executing.
    StageStart {
        /// Stage name (e.g. `"chunk_explanation"`).
        name: String,
    },
    /// A stage returned without calling the backend.
    StageSkipped {
        /// Stage name.
        name: String,
        /// Why generation was skipped.
        reason: String,
    },
    /// A backend call completed.
    Generation {
        /// Name of the stage (or collaborator) that made the call.
        name: String,
        /// Model that served the call.
        model: String,
        /// Token counters, if the provider reported them.
        usage: Option<TokenUsage>,
    },
    /// A stage has finished executing.
    StageEnd {
        /// Stage name.
        name: String,
        /// Whether execution succeeded.
        ok: bool,
    },
}

/// Handler for pipeline lifecycle events.
///
/// This is entirely optional -- the pipeline works without an event handler.
///
/// # Example
///
/// ```
/// use chunkbuddy::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: Event) {
///         match event {
///             Event::StageStart { name } => println!("[start] {}", name),
///             Event::StageEnd { name, ok } => println!("[end] {} ok={}", name, ok),
///             _ => {}
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called when a stage emits an event.
    fn on_event(&self, event: Event);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: Event) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
///
/// # Example
///
/// ```
/// use chunkbuddy::events::{Event, FnEventHandler};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: Event| {
///     if let Event::StageSkipped { name, reason } = event {
///         eprintln!("{} skipped: {}", name, reason);
///     }
/// }));
/// ```
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}
