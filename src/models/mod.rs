//! Data models for the alliance roster.
//!
//! Wire names are camelCase so the form UI can consume responses directly.

mod action;
mod player;
mod view;

pub use action::*;
pub use player::*;
pub use view::*;
