pub mod client;
pub mod config;
pub mod error;
pub mod gviz;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod sink;

pub use error::{Error, Result};
