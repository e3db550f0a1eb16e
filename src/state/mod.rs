pub mod allocation;
pub mod hub;
pub mod registry;
pub mod room;
pub mod room_code;
pub mod state_machine;

use std::sync::Arc;

use crate::config::AppConfig;

use self::registry::RoomRegistry;

/// Cheaply clonable handle on the application state.
pub type SharedState = Arc<AppState>;

/// Central application state: the immutable configuration and the room registry.
pub struct AppState {
    config: Arc<AppConfig>,
    rooms: RoomRegistry,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig) -> SharedState {
        Arc::new(Self {
            config: Arc::new(config),
            rooms: RoomRegistry::new(),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Registry of active rooms keyed by code.
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }
}
