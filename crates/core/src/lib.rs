#![forbid(unsafe_code)]

pub mod error;
pub mod filter;
pub mod model;
pub mod progress;
pub mod time;

pub use error::Error;
pub use filter::{ApplicationFilter, ApplicationSort};
pub use progress::{ProgressBreakdown, ProgressMode, compute_progress, progress_breakdown};
pub use time::Clock;
