mod identity;
mod time;

pub use identity::*;
pub use time::*;
