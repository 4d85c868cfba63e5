pub mod clock;
mod hub;
pub mod presence;
pub mod registry;
mod room;
pub mod timer;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    dao::session_directory::SessionDirectory,
    state::{clock::Clock, registry::RoomRegistry},
};

pub use self::registry::{RegistrySettings, Subscription};

pub type SharedState = Arc<AppState>;

/// Central application state: configuration, the session directory and the live rooms.
pub struct AppState {
    config: Arc<AppConfig>,
    directory: Arc<dyn SessionDirectory>,
    rooms: Arc<RoomRegistry>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(
        config: AppConfig,
        directory: Arc<dyn SessionDirectory>,
        clock: Arc<dyn Clock>,
    ) -> SharedState {
        let rooms = RoomRegistry::new(clock, Arc::clone(&directory), config.registry_settings());
        Arc::new(Self {
            config: Arc::new(config),
            directory,
            rooms,
        })
    }

    /// Shared configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        Arc::clone(&self.config)
    }

    /// Session directory used to resolve sessions and persist relays.
    pub fn directory(&self) -> &Arc<dyn SessionDirectory> {
        &self.directory
    }

    /// Live rooms keyed by session id.
    pub fn rooms(&self) -> &Arc<RoomRegistry> {
        &self.rooms
    }
}
