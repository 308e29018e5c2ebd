pub mod error;
mod engine;
mod fields;
#[cfg(feature = "mock")]
mod mock;
mod token;

pub use crate::engine::{EngineHandle, TemplateEngine};
pub use crate::fields::{FieldValue, Fields, SEQ};
#[cfg(feature = "mock")]
pub use crate::mock::MockEngine;
pub use crate::token::TokenTemplate;
