pub mod app;
pub mod geo;
pub mod indicators;
pub mod panel;
pub mod polyline;
pub mod route;
pub mod search;
pub mod session;
pub mod track;
pub mod view;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
