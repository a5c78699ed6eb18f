pub mod lifecycle;

pub use lifecycle::{AppPhase, LifecycleWatcher, resume_signals};
