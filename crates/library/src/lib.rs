pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod naming;
mod session;

pub use crate::session::{CreateOutcome, Session};
