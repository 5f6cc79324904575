#![warn(missing_docs)]
#![allow(rustdoc::bare_urls)]
#![doc = include_str!("../README.md")]
//! # Minimal host example
//! ```no_run
#![doc = include_str!("../demos/basic.rs")]
//! ```

mod engine;
pub use engine::*;
mod overlay;
pub use overlay::*;
mod screen;
pub use screen::*;
mod task;
mod timebar;
pub use timebar::*;
