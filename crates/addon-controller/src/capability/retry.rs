use std::time::Duration;

use error_stack::Report;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;

use crate::capability::CapabilityDescriptor;
use crate::capability::CapabilityError;
use crate::capability::Presence;
use crate::capability::PresenceProbe;
use crate::capability::PresenceResult;

/// Bound on how long a flaky API server may hold up capability resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive transient failures tolerated before giving up.
    pub max_attempts: u32,
    /// Fixed wait between attempts.
    pub interval: Duration,
    /// Longest a single probe may take before it counts as a transient failure.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            interval: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Upper bound on how long [`resolve_presence`] runs before it answers.
    pub fn resolution_bound(&self) -> Duration {
        let attempts = self.max_attempts.max(1);
        self.attempt_timeout * attempts + self.interval * (attempts - 1)
    }
}

/// Resolve whether a capability is installed, retrying transient failures.
///
/// Returns as soon as the probe gives a definite answer. After
/// `policy.max_attempts` consecutive transient failures the capability is
/// treated as absent, so a flaky API server degrades the process instead of
/// holding up boot.
///
/// A probe that does not answer within `policy.attempt_timeout` counts as a
/// transient failure, so resolution finishes within
/// [`RetryPolicy::resolution_bound`].
///
/// Returns `None` if `token` is cancelled first.
#[tracing::instrument(skip_all, fields(capability = descriptor.name))]
pub async fn resolve_presence(
    probe: &dyn PresenceProbe,
    descriptor: &CapabilityDescriptor,
    policy: RetryPolicy,
    token: &CancellationToken,
) -> Option<Presence> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let result = select! {
            biased;
            _ = token.cancelled() => return None,
            result = tokio::time::timeout(policy.attempt_timeout, probe.probe(descriptor)) => {
                result.unwrap_or_else(|_| {
                    PresenceResult::TransientError(
                        Report::new(CapabilityError::ProbeFailed {
                            crd: descriptor.signaling_crd.to_string(),
                        })
                        .attach_printable(format!(
                            "no answer within {:?}",
                            policy.attempt_timeout
                        )),
                    )
                })
            }
        };

        match result {
            PresenceResult::Present => return Some(Presence::Present),
            PresenceResult::Absent => return Some(Presence::Absent),
            PresenceResult::TransientError(e) if attempt >= max_attempts => {
                warn!(
                    attempts = attempt,
                    "Could not verify whether {} is present, treating it as absent: {e:?}",
                    descriptor.signaling_crd
                );
                return Some(Presence::Absent);
            }
            PresenceResult::TransientError(e) => {
                info!(
                    attempt,
                    max_attempts, "Failed to verify if {} is present: {e}", descriptor.name
                );
            }
        }

        select! {
            biased;
            _ = token.cancelled() => return None,
            _ = tokio::time::sleep(policy.interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use similar_asserts::assert_eq;
    use test_log::test;
    use tokio::time::Instant;

    use super::*;
    use crate::capability::catalog::CLUSTER_API;
    use crate::capability::mock::Scripted;
    use crate::capability::mock::ScriptedProbe;

    const CRD: &str = CLUSTER_API.descriptor.signaling_crd;

    #[test(tokio::test(start_paused = true))]
    async fn present_resolves_on_first_call() {
        let probe = ScriptedProbe::new().script(CRD, vec![Scripted::Present]);
        let started = Instant::now();

        let presence = resolve_presence(
            &probe,
            &CLUSTER_API.descriptor,
            RetryPolicy::default(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(presence, Some(Presence::Present));
        assert_eq!(probe.calls(CRD), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[test(tokio::test(start_paused = true))]
    async fn absent_resolves_without_retry() {
        let probe = ScriptedProbe::new().script(CRD, vec![Scripted::Absent]);

        let presence = resolve_presence(
            &probe,
            &CLUSTER_API.descriptor,
            RetryPolicy::default(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(presence, Some(Presence::Absent));
        assert_eq!(probe.calls(CRD), 1);
    }

    #[test(tokio::test(start_paused = true))]
    async fn exhausted_retries_degrade_to_absent() {
        let probe = ScriptedProbe::new().script(CRD, vec![Scripted::Transient]);
        let started = Instant::now();

        let presence = resolve_presence(
            &probe,
            &CLUSTER_API.descriptor,
            RetryPolicy::default(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(presence, Some(Presence::Absent));
        assert_eq!(probe.calls(CRD), 20);
        // one fixed wait between each of the 20 attempts
        assert_eq!(started.elapsed(), Duration::from_secs(19));
    }

    #[test(tokio::test(start_paused = true))]
    async fn answer_on_last_attempt_is_kept() {
        let mut script = vec![Scripted::Transient; 19];
        script.push(Scripted::Present);
        let probe = ScriptedProbe::new().script(CRD, script);

        let presence = resolve_presence(
            &probe,
            &CLUSTER_API.descriptor,
            RetryPolicy::default(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(presence, Some(Presence::Present));
        assert_eq!(probe.calls(CRD), 20);
    }

    #[test(tokio::test(start_paused = true))]
    async fn cancellation_interrupts_backoff() {
        let probe = Arc::new(ScriptedProbe::new().script(CRD, vec![Scripted::Transient]));
        let token = CancellationToken::new();
        let policy = RetryPolicy {
            interval: Duration::from_secs(30),
            ..RetryPolicy::default()
        };

        let task = {
            let probe = probe.clone();
            let token = token.clone();
            tokio::spawn(async move {
                resolve_presence(probe.as_ref(), &CLUSTER_API.descriptor, policy, &token).await
            })
        };

        tokio::time::sleep(Duration::from_secs(45)).await;
        token.cancel();

        let presence = task.await.expect("resolve task should finish");
        assert_eq!(presence, None);
        assert_eq!(probe.calls(CRD), 2);
    }

    #[test(tokio::test)]
    async fn zero_attempts_still_probes_once() {
        let probe = ScriptedProbe::new().script(CRD, vec![Scripted::Transient]);
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };

        let presence = resolve_presence(
            &probe,
            &CLUSTER_API.descriptor,
            policy,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(presence, Some(Presence::Absent));
        assert_eq!(probe.calls(CRD), 1);
    }

    #[test(tokio::test(start_paused = true))]
    async fn unanswered_probes_time_out_and_degrade_to_absent() {
        let probe = ScriptedProbe::new().script(CRD, vec![Scripted::Hang]);
        let policy = RetryPolicy::default();
        let started = Instant::now();

        let presence = resolve_presence(
            &probe,
            &CLUSTER_API.descriptor,
            policy,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(presence, Some(Presence::Absent));
        assert_eq!(probe.calls(CRD), 20);
        // 20 timed out attempts of 5 s plus 19 waits of 1 s
        assert_eq!(started.elapsed(), Duration::from_secs(119));
        assert_eq!(started.elapsed(), policy.resolution_bound());
    }

    #[test(tokio::test(start_paused = true))]
    async fn answer_after_a_timed_out_attempt_is_kept() {
        let probe = ScriptedProbe::new().script(CRD, vec![Scripted::Hang, Scripted::Present]);
        let started = Instant::now();

        let presence = resolve_presence(
            &probe,
            &CLUSTER_API.descriptor,
            RetryPolicy::default(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(presence, Some(Presence::Present));
        assert_eq!(probe.calls(CRD), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }
}
