//! # Storage drivers
//!
//! The contract between object-store backends and the rest of the workspace:
//! a driver lists the keys in a bucket one bounded page at a time, handing
//! back an opaque cursor when more keys remain.

mod driver;
mod error;

pub use driver::Driver;
pub use driver::ListCursor;
pub use driver::ListPage;
pub use error::StorageError;
pub use error::StorageErrorBuilder;
pub use error::StorageErrorKind;
