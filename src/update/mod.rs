mod controller;
mod host;
mod session;

pub use controller::{UpdateCommandResult, UpdateController};
pub use session::{UpdateInfo, UpdateProgress, UpdateStatus};
