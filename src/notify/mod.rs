pub mod notifier;

pub use notifier::{DesktopNotifier, NotificationContent, Notifier, Permission};

#[cfg(test)]
pub use notifier::{NotifierCall, RecordingNotifier};
