pub mod entry;
pub mod event;

pub use entry::*;
pub use event::*;
