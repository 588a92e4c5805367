//! Per-submission options.
//!
//! Each option touches the task body, the dispatch envelope, or both.
//! `Client::submit` applies them in the order given, so when two options set
//! the same field the later one wins.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use super::envelope::DispatchEnvelope;
use super::message::{Args, Kwargs, TaskMessage};

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOption {
    /// Replace positional arguments.
    Args(Args),

    /// Replace keyword arguments.
    Kwargs(Kwargs),

    /// Route to another queue (routing key and exchange).
    Queue(String),

    /// Expire the task `d` after submission. Sets the absolute `expires` on
    /// the body and the millisecond TTL in `properties.expiration`.
    Expires(Duration),

    /// Run no earlier than `d` after submission.
    Countdown(Duration),

    /// Run no earlier than the given instant.
    Eta(DateTime<Utc>),

    Priority(u8),

    Retries(u32),
}

impl TaskOption {
    pub fn queue(name: impl Into<String>) -> Self {
        TaskOption::Queue(name.into())
    }

    /// `now` is the submission time; time-relative options are resolved
    /// against it.
    pub fn apply(self, task: &mut TaskMessage, dispatch: &mut DispatchEnvelope, now: DateTime<Utc>) {
        match self {
            TaskOption::Args(args) => task.args = args,
            TaskOption::Kwargs(kwargs) => task.kwargs = kwargs,
            TaskOption::Queue(queue) => dispatch.set_queue(&queue),
            TaskOption::Expires(ttl) => {
                task.expires = Some(offset(now, ttl));
                dispatch.properties.expiration = Some(ttl.as_millis().to_string());
            }
            TaskOption::Countdown(delay) => task.eta = Some(offset(now, delay)),
            TaskOption::Eta(at) => task.eta = Some(at),
            TaskOption::Priority(priority) => dispatch.properties.priority = priority,
            TaskOption::Retries(retries) => task.retries = retries,
        }
    }
}

/// `now + d`, saturating at the largest representable instant.
fn offset(now: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(d)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EnvelopeDefaults;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixture() -> (TaskMessage, DispatchEnvelope, DateTime<Utc>) {
        (
            TaskMessage::new("tasks.add"),
            DispatchEnvelope::new(&EnvelopeDefaults::default()),
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn expires_sets_both_envelopes() {
        let (mut task, mut dispatch, now) = fixture();

        TaskOption::Expires(Duration::from_millis(1500)).apply(&mut task, &mut dispatch, now);

        assert_eq!(task.expires, Some(now + TimeDelta::milliseconds(1500)));
        assert_eq!(dispatch.properties.expiration.as_deref(), Some("1500"));
    }

    #[test]
    fn queue_sets_routing_key_and_exchange() {
        let (mut task, mut dispatch, now) = fixture();

        TaskOption::queue("q1").apply(&mut task, &mut dispatch, now);

        assert_eq!(dispatch.properties.delivery_info.routing_key, "q1");
        assert_eq!(dispatch.properties.delivery_info.exchange, "q1");
    }

    #[test]
    fn countdown_and_eta_set_schedule() {
        let (mut task, mut dispatch, now) = fixture();

        TaskOption::Countdown(Duration::from_secs(30)).apply(&mut task, &mut dispatch, now);
        assert_eq!(task.eta, Some(now + TimeDelta::seconds(30)));

        let at = Utc.with_ymd_and_hms(2030, 6, 1, 0, 0, 0).unwrap();
        TaskOption::Eta(at).apply(&mut task, &mut dispatch, now);
        assert_eq!(task.eta, Some(at));
    }

    #[test]
    fn later_option_wins() {
        let (mut task, mut dispatch, now) = fixture();

        let mut first = Kwargs::new();
        first.insert("a".to_string(), json!(1));
        let mut second = Kwargs::new();
        second.insert("b".to_string(), json!(2));

        for option in [
            TaskOption::Kwargs(first),
            TaskOption::queue("q1"),
            TaskOption::Kwargs(second.clone()),
            TaskOption::queue("q2"),
        ] {
            option.apply(&mut task, &mut dispatch, now);
        }

        assert_eq!(task.kwargs, second);
        assert_eq!(dispatch.routing_key(), "q2");
    }

    #[test]
    fn huge_durations_saturate() {
        let (mut task, mut dispatch, now) = fixture();

        TaskOption::Countdown(Duration::MAX).apply(&mut task, &mut dispatch, now);

        assert_eq!(task.eta, Some(DateTime::<Utc>::MAX_UTC));
    }
}
