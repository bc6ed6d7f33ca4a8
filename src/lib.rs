pub mod config;
pub mod engine;
pub mod error;
pub mod fs;
pub mod gate;
pub mod models;
pub mod sections;
pub mod signature;
pub mod validation;

pub use engine::Engine;
pub use error::{EngineError, Result};
