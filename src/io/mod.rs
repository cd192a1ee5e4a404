pub mod config_io;
pub mod debounce;
pub mod gateway;
pub mod local_store;
pub mod lock;
pub mod portable_store;
pub mod recovery;
