//! Immutable, shared attribute values held by nodes
//!
//! Every value here is published behind an `Arc` and never edited in place;
//! each "modifying" call returns a new value. Nodes swap the `Arc` they hold.

pub mod transform_state;
pub mod render_state;
pub mod render_effects;

pub use transform_state::TransformState;
pub use render_state::{AttribSlot, ClipPlaneAttrib, RenderAttrib, RenderState};
pub use render_effects::{EffectSlot, RenderEffect, RenderEffects};
