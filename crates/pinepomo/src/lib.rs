//! pinepomo - Pomodoro focus timer
//!
//! "One session at a time, one second at a time."
//!
//! The core is a small deterministic state machine for a single focus or
//! break session, plus a typed event layer observers attach to:
//! - `timer`: the session state machine (start/pause/resume/cancel/complete/tick/reset)
//! - `events`: publish/subscribe fan-out of timer transitions
//! - `shared`: the machine behind a mutex, wired to the emitter
//!
//! Around it sit the collaborators a host needs:
//! - `storage` / `store`: the storage port with in-memory and JSONL adapters
//! - `runner`: tick driver and control loop that persists transitions
//! - `stats`: daily goal progress, streaks and period totals

pub mod events;
pub mod runner;
pub mod session;
pub mod shared;
pub mod stats;
pub mod storage;
pub mod store;
pub mod timer;

pub use events::{Listener, Subscription, TimerEventEmitter};
pub use runner::{Control, Runner};
pub use session::{
    StartOptions, TimerConfig, TimerConfigPatch, TimerEvent, TimerEventType, TimerSession,
    TimerStatus, MAX_DURATION_MINS,
};
pub use shared::Timer;
pub use stats::{DailyProgress, PomodoroStats, WindowStats};
pub use storage::{MemoryStorage, StorageError, StoragePort};
pub use store::FileStorage;
pub use timer::{TimerMachine, TimerState};
