/// Result Poller
///
/// **Core Responsibility:**
/// Drive every token of a submitted batch to a terminal status, or give up
/// at the deadline.
///
/// **Loop Rules:**
/// - One service query per cycle, carrying every still-unresolved token
/// - Terminal results are merged and never queried again
/// - A failed query counts as a cycle without progress, the loop goes on
/// - The deadline bounds the whole loop, including an in-flight query
/// - Tokens unresolved at the deadline get a synthetic timed-out result
///
/// The returned results are ordered like the input tokens, whatever order
/// the service answers in.
use crate::service::ExecutionService;
use codelab_common::types::{JobResult, JobToken};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    /// Cap for the backed-off interval; equal to `interval` disables backoff
    pub max_interval: Duration,
}

impl PollSettings {
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            max_interval: interval,
        }
    }

    fn next_interval(&self, current: Duration, progressed: bool) -> Duration {
        if progressed {
            self.interval
        } else {
            (current * 2).min(self.max_interval.max(self.interval))
        }
    }
}

#[derive(Debug)]
pub struct PollReport {
    /// One result per input token, in token order
    pub results: Vec<JobResult>,
    /// Number of service queries issued
    pub cycles: u32,
    /// Tokens that hit the deadline without a terminal status
    pub timed_out: usize,
}

#[instrument(skip_all, fields(tokens = tokens.len()))]
pub async fn poll<S>(
    service: &S,
    tokens: &[JobToken],
    deadline: Instant,
    settings: PollSettings,
) -> PollReport
where
    S: ExecutionService + ?Sized,
{
    let known: HashSet<&JobToken> = tokens.iter().collect();
    let mut resolved: HashMap<JobToken, JobResult> = HashMap::with_capacity(tokens.len());
    let mut interval = settings.interval;
    let mut cycles = 0u32;

    loop {
        let unresolved: Vec<JobToken> = tokens
            .iter()
            .filter(|t| !resolved.contains_key(*t))
            .cloned()
            .collect();
        if unresolved.is_empty() {
            break;
        }
        if Instant::now() >= deadline {
            break;
        }

        cycles += 1;
        let fetched = match timeout_at(deadline, service.fetch_results(&unresolved)).await {
            Ok(Ok(results)) => results,
            Ok(Err(e)) => {
                warn!(cycle = cycles, error = %e, "Poll query failed, retrying next cycle");
                Vec::new()
            }
            Err(_) => {
                debug!(cycle = cycles, "Poll query cut off by the deadline");
                break;
            }
        };

        let mut newly_terminal = 0usize;
        for result in fetched {
            if !known.contains(&result.token) {
                warn!(token = %result.token, "Ignoring result for unknown token");
                continue;
            }
            if result.status.is_terminal() && !resolved.contains_key(&result.token) {
                newly_terminal += 1;
                resolved.insert(result.token.clone(), result);
            }
        }

        let remaining = unresolved.len() - newly_terminal;
        debug!(
            cycle = cycles,
            resolved = newly_terminal,
            unresolved = remaining,
            "Poll cycle complete"
        );
        if remaining == 0 {
            break;
        }

        interval = settings.next_interval(interval, newly_terminal > 0);
        sleep_until((Instant::now() + interval).min(deadline)).await;
    }

    let results: Vec<JobResult> = tokens
        .iter()
        .map(|token| {
            resolved
                .get(token)
                .cloned()
                .unwrap_or_else(|| JobResult::timed_out(token.clone()))
        })
        .collect();
    let timed_out = results.iter().filter(|r| r.timed_out).count();

    if timed_out > 0 {
        warn!(
            timed_out,
            total = tokens.len(),
            cycles,
            "Deadline reached with unresolved jobs"
        );
    }

    PollReport {
        results,
        cycles,
        timed_out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::service::MockExecutionService;
    use crate::testing::{accepted, processing};
    use codelab_common::types::JobStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn tokens(n: usize) -> Vec<JobToken> {
        (0..n).map(|i| JobToken::new(format!("t{}", i))).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_follow_token_order() {
        let mut service = MockExecutionService::new();
        // Answers in reverse order
        service.expect_fetch_results().times(1).returning(|tokens| {
            Ok(tokens
                .iter()
                .rev()
                .map(|t| accepted(t.clone(), &format!("out-{}", t)))
                .collect())
        });

        let tokens = tokens(3);
        let deadline = Instant::now() + Duration::from_secs(10);
        let report = poll(&service, &tokens, deadline, PollSettings::fixed(Duration::from_secs(1))).await;

        assert_eq!(report.cycles, 1);
        assert_eq!(report.timed_out, 0);
        let order: Vec<&JobToken> = report.results.iter().map(|r| &r.token).collect();
        assert_eq!(order, tokens.iter().collect::<Vec<_>>());
        assert_eq!(report.results[2].stdout, "out-t2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolved_tokens_are_not_requeried() {
        let queried: Arc<std::sync::Mutex<Vec<Vec<JobToken>>>> = Default::default();
        let log = queried.clone();

        let mut service = MockExecutionService::new();
        service.expect_fetch_results().returning(move |tokens| {
            let mut log = log.lock().unwrap();
            log.push(tokens.to_vec());
            let cycle = log.len();
            // t0 resolves on the first cycle, t1 on the second, t2 on the third
            Ok(tokens
                .iter()
                .map(|t| {
                    let idx: usize = t.as_str()[1..].parse().unwrap();
                    if idx < cycle {
                        accepted(t.clone(), "ok")
                    } else {
                        processing(t.clone())
                    }
                })
                .collect())
        });

        let tokens = tokens(3);
        let deadline = Instant::now() + Duration::from_secs(30);
        let report = poll(&service, &tokens, deadline, PollSettings::fixed(Duration::from_secs(1))).await;

        assert_eq!(report.cycles, 3);
        assert_eq!(report.timed_out, 0);
        let queried = queried.lock().unwrap();
        assert_eq!(queried[0].len(), 3);
        assert_eq!(queried[1], vec![JobToken::new("t1"), JobToken::new("t2")]);
        assert_eq!(queried[2], vec![JobToken::new("t2")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_call_count_and_times_out_everything() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut service = MockExecutionService::new();
        service.expect_fetch_results().returning(move |tokens| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(tokens.iter().cloned().map(processing).collect())
        });

        let tokens = tokens(50);
        let deadline_after = Duration::from_secs(10);
        let interval = Duration::from_secs(1);
        let start = Instant::now();
        let report = poll(&service, &tokens, start + deadline_after, PollSettings::fixed(interval)).await;

        let bound = (deadline_after.as_millis() / interval.as_millis()) as usize + 1;
        let calls = calls.load(Ordering::SeqCst);
        assert!(calls <= bound, "{} calls exceeds bound {}", calls, bound);
        assert_eq!(calls, report.cycles as usize);

        assert_eq!(report.results.len(), 50);
        assert_eq!(report.timed_out, 50);
        assert!(report
            .results
            .iter()
            .all(|r| r.timed_out && r.status == JobStatus::InternalError));
        assert!(Instant::now() <= start + deadline_after);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_results_on_deadline() {
        let mut service = MockExecutionService::new();
        service.expect_fetch_results().returning(|tokens| {
            Ok(tokens
                .iter()
                .map(|t| {
                    if t.as_str() == "t1" {
                        processing(t.clone())
                    } else {
                        accepted(t.clone(), "done")
                    }
                })
                .collect())
        });

        let tokens = tokens(3);
        let deadline = Instant::now() + Duration::from_secs(5);
        let report = poll(&service, &tokens, deadline, PollSettings::fixed(Duration::from_secs(1))).await;

        assert_eq!(report.timed_out, 1);
        assert_eq!(report.results[0].status, JobStatus::Accepted);
        assert!(report.results[1].timed_out);
        assert_eq!(report.results[2].status, JobStatus::Accepted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_query_cannot_push_past_deadline() {
        let mut service = MockExecutionService::new();
        service.expect_fetch_results().returning(|_| {
            // Stand-in for a query that never answers in time
            Err(ServiceError::Timeout)
        });

        let tokens = tokens(2);
        let start = Instant::now();
        let deadline = start + Duration::from_secs(3);
        let report = poll(&service, &tokens, deadline, PollSettings::fixed(Duration::from_millis(500))).await;

        assert_eq!(report.timed_out, 2);
        assert!(report.cycles >= 1);
        assert!(Instant::now() <= deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut service = MockExecutionService::new();
        service.expect_fetch_results().returning(move |tokens| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ServiceError::Status {
                    status: 502,
                    body: "bad gateway".to_string(),
                })
            } else {
                Ok(tokens.iter().map(|t| accepted(t.clone(), "1")).collect())
            }
        });

        let tokens = tokens(2);
        let deadline = Instant::now() + Duration::from_secs(10);
        let report = poll(&service, &tokens, deadline, PollSettings::fixed(Duration::from_secs(1))).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.timed_out, 0);
        assert!(report.results.iter().all(|r| r.status == JobStatus::Accepted));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_tokens_are_ignored() {
        let mut service = MockExecutionService::new();
        service.expect_fetch_results().times(1).returning(|tokens| {
            let mut results: Vec<JobResult> =
                tokens.iter().map(|t| accepted(t.clone(), "x")).collect();
            results.push(accepted(JobToken::new("stranger"), "y"));
            Ok(results)
        });

        let tokens = tokens(1);
        let deadline = Instant::now() + Duration::from_secs(10);
        let report = poll(&service, &tokens, deadline, PollSettings::fixed(Duration::from_secs(1))).await;

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].token, JobToken::new("t0"));
    }

    #[test]
    fn test_backoff_doubles_until_cap_and_resets() {
        let settings = PollSettings {
            interval: Duration::from_millis(100),
            max_interval: Duration::from_millis(350),
        };

        let mut interval = settings.interval;
        interval = settings.next_interval(interval, false);
        assert_eq!(interval, Duration::from_millis(200));
        interval = settings.next_interval(interval, false);
        assert_eq!(interval, Duration::from_millis(350));
        interval = settings.next_interval(interval, false);
        assert_eq!(interval, Duration::from_millis(350));
        interval = settings.next_interval(interval, true);
        assert_eq!(interval, Duration::from_millis(100));

        let fixed = PollSettings::fixed(Duration::from_millis(100));
        assert_eq!(
            fixed.next_interval(Duration::from_millis(100), false),
            Duration::from_millis(100)
        );
    }
}
