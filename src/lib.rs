//! Giro: a focus timer built around a wall-clock deadline, so the countdown
//! stays correct across missed ticks and process suspension.

pub mod config;
pub mod control;
pub mod dial;
pub mod error;
pub mod lifecycle;
pub mod notify;
pub mod pomodoro;
pub mod store;
pub mod ws;
