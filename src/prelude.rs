pub use crate::ds::HistoryRing;
pub use crate::error::{ConfigError, InvariantError};
pub use crate::limiter::{ContinuousLimiter, Ticket};
