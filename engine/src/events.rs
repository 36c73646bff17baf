//! Reconstructs pod scheduling sub-phase timings from condition transitions.
//!
//! The cluster reports a pod's lifecycle as a set of condition transitions
//! (`Initialized`, `PodScheduled`, `Ready`, `ContainersReady`), each with a
//! timestamp. Correlating those gives the non-overlapping intervals a
//! benchmark charts: how long initialization took, how long scheduling took,
//! and the end-to-end creation time.

use std::time::Duration;

use k8s_openapi::api::core::v1::{Pod, PodCondition};
use k8s_openapi::chrono::{DateTime, Utc};

use crate::Error;

/// A closed interval between two observed condition transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interval {
    /// Transition that opened the interval.
    pub started_at: DateTime<Utc>,
    /// Transition that closed it.
    pub finished_at: DateTime<Utc>,
}

impl Interval {
    fn new(
        name: &'static str,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Result<Self, Error> {
        if finished_at < started_at {
            // Negative durations are a defect in the observed timeline;
            // report them instead of clamping.
            return Err(Error::NegativeInterval {
                interval: name,
                started_at,
                finished_at,
            });
        }
        Ok(Self {
            started_at,
            finished_at,
        })
    }

    /// Length of the interval. Non-negative by construction.
    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}

/// Timing intervals reconstructed from one pod's condition timeline.
///
/// An interval whose opening or closing transition was never observed is
/// absent — never reported as zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PodIntervals {
    /// `Initialized` → `PodScheduled`.
    pub initialized: Option<Interval>,
    /// `PodScheduled` → `Ready`.
    pub scheduled: Option<Interval>,
    /// `Ready` → `ContainersReady`.
    pub ready: Option<Interval>,
    /// `Initialized` → `Ready`: the whole creation.
    pub pod_create: Option<Interval>,
}

impl PodIntervals {
    /// Present intervals as `(name, duration)` pairs, in charting order.
    pub fn durations(&self) -> Vec<(&'static str, Duration)> {
        [
            ("initialized", self.initialized),
            ("scheduled", self.scheduled),
            ("ready", self.ready),
            ("pod_create", self.pod_create),
        ]
        .into_iter()
        .filter_map(|(name, interval)| interval.map(|i| (name, i.duration())))
        .collect()
    }
}

/// Associate condition transitions with interval boundaries.
///
/// Transitions are matched by condition type, not input order, so feeding
/// the same condition set in any order yields identical intervals. When a
/// type appears more than once the earliest transition wins.
pub fn correlate(conditions: &[PodCondition]) -> Result<PodIntervals, Error> {
    let initialized = transition(conditions, "Initialized");
    let scheduled = transition(conditions, "PodScheduled");
    let ready = transition(conditions, "Ready");
    let containers_ready = transition(conditions, "ContainersReady");

    Ok(PodIntervals {
        initialized: interval("initialized", initialized, scheduled)?,
        scheduled: interval("scheduled", scheduled, ready)?,
        ready: interval("ready", ready, containers_ready)?,
        pod_create: interval("pod_create", initialized, ready)?,
    })
}

/// [`correlate`] applied to a pod object as read from the cluster.
pub fn correlate_pod(pod: &Pod) -> Result<PodIntervals, Error> {
    let conditions = pod
        .status
        .as_ref()
        .and_then(|status| status.conditions.as_deref())
        .unwrap_or_default();
    correlate(conditions)
}

fn transition(conditions: &[PodCondition], type_: &str) -> Option<DateTime<Utc>> {
    conditions
        .iter()
        .filter(|condition| condition.type_ == type_)
        .filter_map(|condition| condition.last_transition_time.as_ref().map(|t| t.0))
        .min()
}

fn interval(
    name: &'static str,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
) -> Result<Option<Interval>, Error> {
    match (started_at, finished_at) {
        (Some(started_at), Some(finished_at)) => {
            Interval::new(name, started_at, finished_at).map(Some)
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use k8s_openapi::chrono::TimeZone;

    use super::*;

    fn condition(type_: &str, at_secs: i64) -> PodCondition {
        PodCondition {
            type_: type_.to_owned(),
            status: "True".to_owned(),
            last_transition_time: Some(Time(Utc.timestamp_opt(at_secs, 0).unwrap())),
            ..Default::default()
        }
    }

    #[test]
    fn concrete_timeline_yields_the_expected_durations() {
        let conditions = vec![
            condition("Initialized", 0),
            condition("PodScheduled", 2),
            condition("Ready", 5),
        ];
        let intervals = correlate(&conditions).unwrap();
        assert_eq!(
            intervals.initialized.unwrap().duration(),
            Duration::from_secs(2)
        );
        assert_eq!(
            intervals.scheduled.unwrap().duration(),
            Duration::from_secs(3)
        );
        assert_eq!(
            intervals.pod_create.unwrap().duration(),
            Duration::from_secs(5)
        );
        assert_eq!(intervals.ready, None);
    }

    #[test]
    fn input_order_does_not_matter() {
        let ordered = vec![
            condition("Initialized", 0),
            condition("PodScheduled", 2),
            condition("Ready", 5),
            condition("ContainersReady", 6),
        ];
        let mut shuffled = ordered.clone();
        shuffled.reverse();
        shuffled.swap(0, 2);
        assert_eq!(
            correlate(&ordered).unwrap(),
            correlate(&shuffled).unwrap()
        );
    }

    #[test]
    fn missing_transitions_leave_intervals_absent_not_zero() {
        let conditions = vec![condition("PodScheduled", 2), condition("Ready", 5)];
        let intervals = correlate(&conditions).unwrap();
        assert_eq!(intervals.initialized, None);
        assert_eq!(intervals.pod_create, None);
        assert_eq!(
            intervals.scheduled.unwrap().duration(),
            Duration::from_secs(3)
        );
        assert_eq!(intervals.durations().len(), 1);
    }

    #[test]
    fn an_empty_timeline_yields_no_intervals() {
        let intervals = correlate(&[]).unwrap();
        assert_eq!(intervals, PodIntervals::default());
        assert!(intervals.durations().is_empty());
    }

    #[test]
    fn a_condition_without_a_timestamp_is_ignored() {
        let mut untimed = condition("Initialized", 0);
        untimed.last_transition_time = None;
        let conditions = vec![untimed, condition("PodScheduled", 2)];
        let intervals = correlate(&conditions).unwrap();
        assert_eq!(intervals.initialized, None);
    }

    #[test]
    fn a_backwards_timeline_is_a_reported_defect() {
        let conditions = vec![condition("Initialized", 9), condition("PodScheduled", 2)];
        let err = correlate(&conditions).unwrap_err();
        assert!(matches!(
            err,
            Error::NegativeInterval {
                interval: "initialized",
                ..
            }
        ));
    }

    #[test]
    fn durations_lists_present_intervals_in_charting_order() {
        let conditions = vec![
            condition("Initialized", 0),
            condition("PodScheduled", 2),
            condition("Ready", 5),
            condition("ContainersReady", 6),
        ];
        let durations = correlate(&conditions).unwrap().durations();
        let names: Vec<&str> = durations.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["initialized", "scheduled", "ready", "pod_create"]);
    }
}
