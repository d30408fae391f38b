#![forbid(unsafe_code)]

pub mod book;
pub mod cli;
pub mod commands;
pub mod config;
pub mod export;
pub mod logging;
pub mod markup;
pub mod measure;
pub mod paginate;
pub mod render;
pub mod sanitize;
pub mod section;
pub mod session;
pub mod store;
pub mod tokenize;
