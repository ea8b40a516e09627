pub mod http_server;
pub mod middleware;
pub mod routes;

pub use http_server::router;
