//! Relational persistence for Vigil.
//!
//! Everything outside this crate treats persistence as the single source
//! of truth for durable rows; the similarity index (`vigil-index`) and the
//! presence tracker (`vigil-presence`) are kept consistent with it by
//! explicit calls from the coordinating crates, not by any mechanism in
//! here.

mod error;
mod store;

pub use error::{Result, StoreError};
pub use store::{NewCamera, NewPerson, NewRoom, Store};
