mod entry;
mod store;

pub use entry::*;
pub use store::*;
