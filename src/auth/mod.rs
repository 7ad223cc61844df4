pub mod codes;
pub mod extractor;
pub mod jwt;

pub use codes::*;
pub use extractor::*;
pub use jwt::*;
