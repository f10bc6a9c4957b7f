pub mod fitness;
pub mod penalty;

pub use fitness::*;
