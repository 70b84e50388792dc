mod business;
mod event;
mod interest;

pub use business::*;
pub use event::*;
pub use interest::*;
