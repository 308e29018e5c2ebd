pub mod error;
mod store;

pub use crate::store::{Document, MetadataStore};
