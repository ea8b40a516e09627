pub mod api;
pub mod client;
pub mod hls;
pub mod models;
pub mod ratelimit;
pub mod resolver;
pub mod token;

pub use api::TwitchApi;
pub use client::{UpstreamClient, UpstreamError};
pub use models::{Channel, LiveStream, MalformedRecord, Video};
pub use ratelimit::RateLimiter;
pub use resolver::TwitchResolver;
pub use token::{AccessToken, AuthError, TwitchTokenTracker};
