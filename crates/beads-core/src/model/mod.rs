//! Bead records and the request shapes that create or change them.

pub mod change;
pub mod item;

pub use change::{ItemUpdate, NewItem, ParentChange};
pub use item::{Comment, IssueType, Item, ParseEnumError, Priority, Status};
