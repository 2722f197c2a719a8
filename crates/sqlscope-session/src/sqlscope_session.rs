//! sqlscope Session - the editing session core
//!
//! Owns the lifecycle of engine-produced buffers and keeps the derived view
//! state in sync with user edits:
//!
//! - `Session` - two script slots, the shared catalog, the re-analysis pipeline
//! - `FocusInfo` - highlight sets derived from cursors and graph selections
//! - `SessionObserver` - callbacks towards the surrounding editor integration

mod completion;
mod events;
mod focus;
mod session;
mod slot;

pub use completion::*;
pub use events::*;
pub use focus::*;
pub use session::*;
pub use slot::*;
