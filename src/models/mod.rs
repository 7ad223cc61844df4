pub mod accounts;
pub mod catalog;
pub mod location;
pub mod social;
pub mod thinkflow;
pub mod vendors;

pub use accounts::*;
pub use catalog::*;
pub use location::*;
pub use social::*;
pub use thinkflow::*;
pub use vendors::*;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        MessageResponse {
            message: message.into(),
        }
    }
}
