pub mod plugin;
pub mod twitch;

pub use plugin::{BoxedResolver, MediaResolver, ResolveError};
