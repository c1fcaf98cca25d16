//! Core types shared by every layer: constants, sequence arithmetic,
//! configuration, owner traits and errors.

pub mod constants;

mod config;
mod error;
mod sequence;
mod traits;

pub use config::SocketConfig;
pub use error::{ConfigError, ReliantError};
pub use sequence::{
    cyclic_difference, cyclic_difference_bits, next_sequence, offset_sequence, SequenceNumber,
};
pub use traits::{ConnectionDelegate, LivenessHost};
