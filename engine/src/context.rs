//! Shared handles every lifecycle operation needs.

use std::sync::Mutex;

use anyhow::Result;
use k8s_openapi::chrono::{DateTime, Utc};
use kube::client::Client;
use rand::{rngs::StdRng, thread_rng, RngCore, SeedableRng};

use crate::exec::KubeExec;
use crate::names;

/// Engine context
pub struct Context<E, Rng = StdRng, C = UtcClock> {
    /// Kube client
    pub k_client: Client,
    /// Channel for running commands inside pods
    pub exec_client: E,
    /// Random number generator
    pub rng: Mutex<Rng>,
    /// Clock that provides the current time
    pub clock: C,
}

impl Context<KubeExec, StdRng, UtcClock> {
    /// Create new context
    pub fn new(k_client: Client) -> Result<Self> {
        Ok(Context {
            exec_client: KubeExec::new(k_client.clone()),
            k_client,
            rng: Mutex::new(StdRng::from_rng(thread_rng())?),
            clock: UtcClock,
        })
    }
}

impl<E, Rng, C> Context<E, Rng, C>
where
    Rng: RngCore,
{
    /// Generate a cluster-legal random resource name from the context RNG.
    pub fn generate_name(&self) -> String {
        names::generate_name(&mut *self.rng.lock().expect("rng mutex poisoned"))
    }
}

/// Provides the current time.
pub trait Clock {
    /// Report the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Provides the current time using real time.
pub struct UtcClock;
impl Clock for UtcClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
