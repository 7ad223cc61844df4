pub mod consumer;
pub mod producer;

pub use consumer::*;
pub use producer::*;
