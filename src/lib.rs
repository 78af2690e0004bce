#![allow(clippy::manual_unwrap_or_default)]
#![allow(clippy::manual_unwrap_or)]

pub mod config;
pub mod constants;
pub mod content_store;
pub mod facade;
pub mod history;
pub mod logging;
pub mod memory;
pub mod model;
pub mod openai_client;
pub mod parser;
pub mod prompts;
pub mod registry;
pub mod saver;
pub mod session;
pub mod session_cache;
pub mod specs;
pub mod str_utils;
pub mod stream_adapter;
pub mod tools;
pub mod types;

pub use types::*;

pub use config::{Args, CoreConfig};
pub use facade::{GenerationFacade, GenerationStream};
