/// Session-content directory consumed by the room registry.
pub mod session_directory;
/// Error types shared by directory backends.
pub mod storage;
