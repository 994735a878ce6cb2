pub mod analytics;
pub mod handlers;
pub mod middleware;
pub mod orders;
pub mod routes;

pub use routes::create_router;
