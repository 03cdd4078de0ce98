//! Reef Directives - directive dispatch engine
//!
//! Turns translated virtual trees into render trees by running directive
//! handlers in priority order. Handlers read and write the observable
//! state graph through scoped evaluation, register mount/watch effects,
//! attach event listeners, and emit one-time DOM patches that reconcile
//! server-rendered markup with the hydrated result.

mod actions;
mod builtins;
mod engine;
mod evaluate;
mod events;
mod registry;
mod render;
mod scope;

pub use actions::{Action, ActionCall, ActionOutcome, ActionTable};
pub use builtins::register_builtins;
pub use engine::{Engine, GlobalTarget};
pub use evaluate::{EvalError, EvalValue, evaluate, resolve, truthy};
pub use events::{Event, EventGuard, Listener, ListenerMode};
pub use registry::{DirectiveArgs, DirectiveFn, DirectiveRegistry, PRIORITY_DEFAULT};
pub use render::{DomPatch, RenderChild, RenderChildren, RenderNode, RenderOutput, apply_patches};
pub use scope::{ContextCell, Scope};
