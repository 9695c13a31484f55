//! HTTP exposition of the latest snapshot.

mod errors;
mod handlers;
mod server;

pub use errors::ServerError;
pub use server::routes;
pub use server::MetricsServer;
pub use server::ServerConfig;
pub use server::DEFAULT_HOST;
pub use server::DEFAULT_PORT;
