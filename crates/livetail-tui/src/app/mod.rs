//! Application state and actions

mod action;
mod follow;
mod state;

pub use action::Action;
pub use follow::{FollowController, FollowMode};
pub use state::{AppState, FilterCache, Notification, NotificationKind, UiState};
