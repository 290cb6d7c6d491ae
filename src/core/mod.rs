//! # Core Module
//!
//! Fundamental primitives shared by the rest of the crate.
//!
//! ## Key Components
//! - `MtResource`: Thread-safe reference-counted resource with read-write locking
//! - `error`: The error taxonomy (configuration, generation, edit rejection)
//!
//! ## Usage
//! ```rust
//! use voxel_world::core::MtResource;
//!
//! let counter = MtResource::new(0);
//! *counter.get_mut() += 1;
//! assert_eq!(*counter.get(), 1);
//! ```

pub mod error;
pub mod mt_resource;

pub use error::{ConfigurationError, EditRejected, Error, GenerationError};
pub use mt_resource::MtResource;
