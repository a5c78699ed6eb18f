pub mod dial;

pub use dial::{
    CircularDial, DEFAULT_MAX_DURATION_MS, DialGeometry, DragUpdate, MinuteDetent,
    angle_to_duration, duration_to_arc_fraction,
};
