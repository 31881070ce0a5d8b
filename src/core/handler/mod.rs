// src/core/handler/mod.rs

pub mod command_router;

pub use command_router::{RouteResponse, Router};
