//! Async building blocks shared by the stores and the media pipeline

mod cancel;
mod debounce;
mod latest;
mod timeout;

pub use cancel::{Cancelled, OrCancelExt};
pub use debounce::Debouncer;
pub use latest::{LatestOnly, Ticket};
pub use timeout::with_timeout;
