pub mod base;
pub mod server;
pub mod transcode;
pub mod twitch;

pub use base::*;
pub use server::*;
pub use transcode::*;
pub use twitch::*;
