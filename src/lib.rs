//! Concurrency-limited, interval-paced scheduling for asynchronous tasks.

#![deny(missing_docs)]

#[cfg(doctest)]
use doc_comment::doctest;
#[cfg(doctest)]
doctest!("../README.md");

mod throttle;

pub use throttle::{InvalidConfiguration, Submission, Throttle, ThrottleState};
