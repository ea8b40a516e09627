pub mod cache;
pub mod common;
pub mod configs;
pub mod feed;
pub mod server;
pub mod sources;
pub mod transcode;
pub mod transport;
pub mod update;
