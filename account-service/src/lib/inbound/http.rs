pub mod csrf;
pub mod handlers;
pub mod middleware;
pub mod rate_limit;
pub mod router;
pub mod security;
pub mod views;

pub use router::create_router;
pub use router::AppState;
