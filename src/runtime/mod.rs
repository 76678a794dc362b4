pub mod host;
pub mod messages;
pub mod transport;
