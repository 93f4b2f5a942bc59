//! Equality matching and single-field sorting over a loaded collection.

pub mod matcher;
pub mod sorter;

pub use matcher::{matches, HashmapSearch};
pub use sorter::{SortOrder, SortSpec};
