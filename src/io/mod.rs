pub mod alert;
pub mod clock;
pub mod config_io;
pub mod lock;
pub mod recovery;
pub mod session;
pub mod state;
pub mod store;
pub mod watcher;
