pub mod command;
pub mod controller;

pub use command::{Command, CommandError, parse_duration, parse_line};
pub use controller::{Controller, Dispatch, ServerMessage};
