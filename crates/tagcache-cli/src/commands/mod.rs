pub mod flush;
pub mod keys;
pub mod server;
