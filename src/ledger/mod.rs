//!  The per-day ledger core.
//!  The basic idea is:
//!   - A day holds an ordered list of named activities, each tagged with a
//!     category and a duration in minutes.
//!   - The derived total is recomputed from the list before every write and
//!     may never exceed the 1440 minutes a day actually has.
//!   - Everything here is pure; persistence belongs to [crate::store].

pub mod entities;
pub mod summary;
pub mod validate;
