//! Utility types shared by every layer.
//!
//! - [`PlainOldDataType`] - array element types
//! - [`Dimensions`] - array shapes
//! - [`Error`] / [`Result`] - error handling

mod pod;
mod error;
mod dimensions;

pub use pod::*;
pub use error::*;
pub use dimensions::*;
