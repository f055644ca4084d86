//! Business engine: every money-moving flow runs here as a single
//! transaction over the repository's guarded writes.

pub mod matches;
pub mod pairing;
pub mod payments;
pub mod results;
pub mod rewards;
pub mod settlement;
pub mod wallet;
