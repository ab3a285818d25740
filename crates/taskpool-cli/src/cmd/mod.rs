pub mod completions;
pub mod config;
pub mod plan;
pub mod replay;
pub mod route;
pub mod sim;
