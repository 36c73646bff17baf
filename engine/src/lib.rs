//! Core machinery for driving short-lived workloads against a Kubernetes
//! cluster and measuring how long they take to converge.
//!
//! The hard part is not issuing the API calls — it is waiting correctly for
//! eventually-consistent state: a created object is not immediately usable, a
//! deleted object is not immediately gone, a scaled workload is not
//! immediately at its new replica count. Everything here is built on one
//! bounded-retry wait primitive ([`poller::wait_until`]) parameterized by a
//! convergence predicate.
#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod events;
pub mod exec;
pub mod labels;
pub mod names;
pub mod ops;
pub mod poller;
pub mod probe;
pub mod selection;

#[cfg(test)]
pub(crate) mod stub;

pub use context::{Clock, Context, UtcClock};
pub use error::Error;
pub use kubench_common::WaitConfig;

/// Context wired with the production exec client, RNG and clock.
pub type DefaultContext = Context<exec::KubeExec>;
