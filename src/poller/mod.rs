//! Periodic refresh drivers.
//!
//! A poller repeatedly waits one interval and then runs its task. Intervals are measured from the
//! completion of the previous tick, so ticks never overlap and a slow tick delays the next one.
//! Task failures (including panics) are handed to the error handler and never stop the poller.
//! Once stopped, a poller never starts another tick; a tick already in flight is allowed to finish.
//!
//! [`Poller`] drives ticks from a dedicated thread, [`AsyncPoller`] from a tokio task.
use std::sync::Arc;

use crate::Error;

mod task;
mod thread;

pub use task::AsyncPoller;
pub use thread::Poller;

/// Receives errors returned (or panics raised) by poll ticks.
pub type ErrorHandler = Arc<dyn Fn(Error) + Send + Sync>;
