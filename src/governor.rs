use std::time::{Duration, Instant};

use crate::channel::Channel;
use crate::error::ChannelError;

/// Thresholds for keeping the receive buffer from building a backlog.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BufferPolicy {
    /// Minimum time between two backlog checks.
    pub clear_interval: Duration,
    /// Pending bytes above this trigger a flush.
    pub max_pending_bytes: usize,
    /// Upper bound on lines read and dropped by one flush.
    pub drain_safety_limit: usize,
    /// Per-line timeout used while draining during a flush.
    pub drain_read_timeout: Duration,
}

impl Default for BufferPolicy {
    fn default() -> Self {
        BufferPolicy {
            clear_interval: Duration::from_millis(50),
            max_pending_bytes: 100,
            drain_safety_limit: 50,
            drain_read_timeout: Duration::from_millis(1),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushDecision {
    /// Called again before `clear_interval` elapsed.
    Skip,
    NoFlushNeeded,
    FlushRequired { pending_bytes: usize },
}

/// What one governance pass actually did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GovernOutcome {
    Skipped,
    Checked { pending_bytes: usize },
    Flushed { pending_bytes: usize, discarded: usize },
    /// Transport failed; governance resumes on the next interval.
    Failed,
}

/// Rate-limited backlog check over a channel.
#[derive(Debug)]
pub struct BufferGovernor {
    policy: BufferPolicy,
    last_check: Option<Instant>,
    /// Consecutive failed pending-count reads.
    check_failures: u32,
}

impl BufferGovernor {
    pub fn new(policy: BufferPolicy) -> Self {
        BufferGovernor {
            policy,
            last_check: None,
            check_failures: 0,
        }
    }

    pub fn policy(&self) -> &BufferPolicy {
        &self.policy
    }

    pub fn last_check(&self) -> Option<Instant> {
        self.last_check
    }

    pub fn check_failures(&self) -> u32 {
        self.check_failures
    }

    /// True once `clear_interval` has passed since the previous check.
    ///
    /// A `now` earlier than the last check counts as zero elapsed time, so the
    /// check timestamp never moves backwards.
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_check {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.policy.clear_interval,
        }
    }

    pub fn maybe_govern(&mut self, now: Instant, pending_bytes: usize) -> FlushDecision {
        if !self.is_due(now) {
            return FlushDecision::Skip;
        }
        self.last_check = Some(now);

        if pending_bytes > self.policy.max_pending_bytes {
            FlushDecision::FlushRequired { pending_bytes }
        } else {
            FlushDecision::NoFlushNeeded
        }
    }

    /// Run the periodic check against `channel`, flushing it if backlogged.
    ///
    /// The pending count is only read when a check is due. Transport errors
    /// are logged and swallowed; only the first of a run is a warning.
    pub fn govern<C: Channel + ?Sized>(&mut self, now: Instant, channel: &mut C) -> GovernOutcome {
        if !self.is_due(now) {
            return GovernOutcome::Skipped;
        }

        let pending = match channel.pending_byte_count() {
            Ok(pending) => pending,
            Err(e) => {
                if self.check_failures == 0 {
                    log::warn!("Buffer check failed: {}", e);
                } else {
                    log::debug!("Buffer check failed ({} in a row): {}", self.check_failures + 1, e);
                }
                self.check_failures = self.check_failures.saturating_add(1);
                self.last_check = Some(now);
                return GovernOutcome::Failed;
            }
        };
        if self.check_failures > 0 {
            log::info!("Buffer check recovered after {} failures", self.check_failures);
            self.check_failures = 0;
        }

        match self.maybe_govern(now, pending) {
            FlushDecision::Skip => GovernOutcome::Skipped,
            FlushDecision::NoFlushNeeded => GovernOutcome::Checked {
                pending_bytes: pending,
            },
            FlushDecision::FlushRequired { pending_bytes } => {
                log::info!("Buffer size: {} bytes - clearing old data", pending_bytes);
                match flush_input(channel, &self.policy) {
                    Ok(discarded) => GovernOutcome::Flushed {
                        pending_bytes,
                        discarded,
                    },
                    Err(e) => {
                        log::warn!("Buffer clear error: {}", e);
                        GovernOutcome::Failed
                    }
                }
            }
        }
    }
}

/// Reset the channel's input buffer, then drop any lines still pending.
///
/// Returns the number of lines dropped after the reset. At most
/// `drain_safety_limit` reads are made, each bounded by `drain_read_timeout`.
pub fn flush_input<C: Channel + ?Sized>(
    channel: &mut C,
    policy: &BufferPolicy,
) -> Result<usize, ChannelError> {
    channel.reset_input_buffer()?;

    let mut discarded = 0;
    while discarded < policy.drain_safety_limit && channel.pending_byte_count()? > 0 {
        match channel.read_line(policy.drain_read_timeout)? {
            Some(_) => discarded += 1,
            None => break,
        }
    }

    if discarded > 0 {
        log::info!("Discarded {} old data packets", discarded);
    }
    Ok(discarded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ScriptedChannel;

    fn backlog(lines: usize) -> ScriptedChannel {
        let mut channel = ScriptedChannel::new().with_advisory_reset();
        for i in 0..lines {
            channel.push_line(&format!("{}.0,0.0,0.0", i));
        }
        channel
    }

    #[test]
    fn test_first_check_runs_immediately() {
        let mut governor = BufferGovernor::new(BufferPolicy::default());
        let now = Instant::now();
        assert_eq!(governor.maybe_govern(now, 0), FlushDecision::NoFlushNeeded);
        assert_eq!(governor.last_check(), Some(now));
    }

    #[test]
    fn test_second_call_within_interval_is_noop() {
        let mut governor = BufferGovernor::new(BufferPolicy::default());
        let t0 = Instant::now();

        assert_eq!(governor.maybe_govern(t0, 10), FlushDecision::NoFlushNeeded);
        let second = governor.maybe_govern(t0 + Duration::from_millis(49), 10_000);
        assert_eq!(second, FlushDecision::Skip);
        assert_eq!(governor.last_check(), Some(t0));

        let third = governor.maybe_govern(t0 + Duration::from_millis(50), 10_000);
        assert_eq!(
            third,
            FlushDecision::FlushRequired {
                pending_bytes: 10_000
            }
        );
    }

    #[test]
    fn test_threshold_is_strictly_greater() {
        let mut governor = BufferGovernor::new(BufferPolicy::default());
        let t0 = Instant::now();
        assert_eq!(governor.maybe_govern(t0, 100), FlushDecision::NoFlushNeeded);
        assert_eq!(
            governor.maybe_govern(t0 + Duration::from_secs(1), 101),
            FlushDecision::FlushRequired { pending_bytes: 101 }
        );
    }

    #[test]
    fn test_last_check_never_moves_backwards() {
        let mut governor = BufferGovernor::new(BufferPolicy::default());
        let t1 = Instant::now() + Duration::from_secs(1);
        governor.maybe_govern(t1, 0);

        let earlier = t1 - Duration::from_millis(500);
        assert_eq!(governor.maybe_govern(earlier, 5_000), FlushDecision::Skip);
        assert_eq!(governor.last_check(), Some(t1));
    }

    #[test]
    fn test_flush_is_bounded_by_safety_limit() {
        let mut channel = backlog(1000);
        let policy = BufferPolicy::default();

        let discarded = flush_input(&mut channel, &policy).unwrap();
        assert_eq!(discarded, 50);
        assert_eq!(channel.buffered_lines(), 950);
    }

    #[test]
    fn test_flush_with_working_reset_discards_nothing_more() {
        let mut channel = ScriptedChannel::new();
        channel.push_line("1,2,3");
        channel.push_line("4,5,6");

        let discarded = flush_input(&mut channel, &BufferPolicy::default()).unwrap();
        assert_eq!(discarded, 0);
        assert_eq!(channel.pending_byte_count().unwrap(), 0);
    }

    #[test]
    fn test_govern_flushes_backlog() {
        let mut channel = backlog(20);
        let mut governor = BufferGovernor::new(BufferPolicy::default());

        let outcome = governor.govern(Instant::now(), &mut channel);
        match outcome {
            GovernOutcome::Flushed { discarded, .. } => assert_eq!(discarded, 20),
            other => panic!("expected flush, got {:?}", other),
        }
    }

    #[test]
    fn test_govern_skips_without_touching_channel() {
        let mut channel = backlog(20);
        let mut governor = BufferGovernor::new(BufferPolicy::default());
        let t0 = Instant::now();

        governor.govern(t0, &mut channel);
        let calls = channel.calls();
        let outcome = governor.govern(t0 + Duration::from_millis(10), &mut channel);

        assert_eq!(outcome, GovernOutcome::Skipped);
        assert_eq!(channel.calls(), calls);
    }

    #[test]
    fn test_govern_swallows_reset_failure() {
        let mut channel = backlog(20);
        channel.fail_next_reset();
        let mut governor = BufferGovernor::new(BufferPolicy::default());
        let t0 = Instant::now();

        assert_eq!(governor.govern(t0, &mut channel), GovernOutcome::Failed);
        assert_eq!(channel.buffered_lines(), 20);

        // Next interval tries again
        let outcome = governor.govern(t0 + Duration::from_millis(60), &mut channel);
        assert!(matches!(outcome, GovernOutcome::Flushed { .. }));
    }

    #[test]
    fn test_pending_count_failure_still_advances_check() {
        let mut channel = backlog(20);
        channel.fail_pending_count(1);
        let mut governor = BufferGovernor::new(BufferPolicy::default());
        let t0 = Instant::now();

        assert_eq!(governor.govern(t0, &mut channel), GovernOutcome::Failed);
        assert_eq!(governor.last_check(), Some(t0));
        assert_eq!(channel.buffered_lines(), 20);

        // Waits a full interval before asking the channel again
        let calls = channel.calls();
        let outcome = governor.govern(t0 + Duration::from_millis(30), &mut channel);
        assert_eq!(outcome, GovernOutcome::Skipped);
        assert_eq!(channel.calls(), calls);

        let outcome = governor.govern(t0 + Duration::from_millis(50), &mut channel);
        assert!(matches!(outcome, GovernOutcome::Flushed { discarded: 20, .. }));
    }

    #[test]
    fn test_consecutive_check_failures_are_counted_until_recovery() {
        let mut channel = backlog(0);
        channel.fail_pending_count(3);
        let mut governor = BufferGovernor::new(BufferPolicy::default());
        let t0 = Instant::now();

        for i in 0..3u32 {
            let now = t0 + Duration::from_millis(50 * u64::from(i));
            assert_eq!(governor.govern(now, &mut channel), GovernOutcome::Failed);
            assert_eq!(governor.check_failures(), i + 1);
        }

        let outcome = governor.govern(t0 + Duration::from_millis(150), &mut channel);
        assert_eq!(outcome, GovernOutcome::Checked { pending_bytes: 0 });
        assert_eq!(governor.check_failures(), 0);
    }
}
