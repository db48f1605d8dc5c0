//! Raw row shapes and write inputs for every table.
//!
//! Rows mirror the stored columns (snake_case, nullable). Domain types with
//! defaults live in `engine::types`; `engine::mapper` converts between them.

mod activity;
mod customer;
mod department;
mod enums;
mod profile;
mod recurring;
mod task;

pub use activity::*;
pub use customer::*;
pub use department::*;
pub use enums::*;
pub use profile::*;
pub use recurring::*;
pub use task::*;
