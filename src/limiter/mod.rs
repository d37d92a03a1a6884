pub mod continuous;

pub use continuous::{ContinuousLimiter, Ticket};
