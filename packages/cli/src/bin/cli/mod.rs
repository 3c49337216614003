pub mod auth;
pub mod endpoint;
pub mod meals;
pub mod utils;
