pub mod common;
pub mod config;
pub mod instance;
pub mod ir;
pub mod op;
pub mod report;
mod utility;
