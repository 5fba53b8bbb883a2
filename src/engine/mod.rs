// FILE: src/engine/mod.rs
pub mod events;
pub mod sync;

pub use events::{RenameTracker, WatchEvent};
pub use sync::{PollReport, WatchSync};
