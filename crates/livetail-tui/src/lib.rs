//! TUI components for livetail
//!
//! This crate provides the terminal user interface: view state, follow-mode
//! scrolling, keybindings, terminal event handling and the log viewer screen.

pub mod app;
pub mod config;
pub mod tui;
pub mod ui;

pub use app::{Action, AppState, FilterCache, FollowController, FollowMode, UiState};
pub use config::{KeyBinding, KeyBindings, KeyContext};
pub use tui::{Event, EventHandler, Tui};
pub use ui::components::{HelpOverlay, StatusBar};
pub use ui::screens::LogViewerScreen;
pub use ui::{Layout, Theme};
