//! Timer-driven story playback
//!
//! Split into a pure state machine and an async driver:
//! - [`machine`]: states, inputs and side-effect lists; no timers or
//!   I/O, so every transition is unit-testable
//! - [`session`]: the tokio driver owning the tick timer, the media
//!   resource handle and the view-recording side effects

pub mod machine;
pub mod session;

pub use machine::{
    Effect, MachineConfig, PlaybackError, PlaybackInput, PlaybackMachine, PlaybackState,
    DEFAULT_PHOTO_DURATION_MS, DEFAULT_TICK_MS,
};
pub use session::{MediaController, NullMediaController, PlaybackSession, SessionConfig};
