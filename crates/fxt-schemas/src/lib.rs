pub mod error;
pub mod fixedpoint;
pub mod types;

pub use error::{EngineError, EngineResult};
pub use fixedpoint::Micros;
pub use types::*;
