//! Fixed-window rate limiting with a FIFO request queue.
//!
//! A [`RateLimiter`] wraps a task producer. Every [`call`](RateLimiter::call)
//! is queued; at most `max_calls` queued calls are admitted per window, in
//! arrival order. Admission starts the producer immediately, so this limits
//! the *rate* of invocations, not how many run at once.
//!
//! The queue and the per-window counter are owned by a single worker task
//! that is started on the first call. Callers talk to it over a channel, so
//! admission is a critical section per limiter without any lock.
//!
//! # Example
//!
//! ```no_run
//! use flowguard_core::{AppError, RateLimitConfig};
//! use flowguard_runtime::rate_limit::rate_limit;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), AppError> {
//! let limiter = rate_limit(
//!     |user_id: u64| async move { Ok::<_, AppError>(format!("profile {}", user_id)) },
//!     RateLimitConfig::new(2, Duration::from_secs(1)),
//! );
//!
//! let profile = limiter.call(7).await?;
//! # Ok(())
//! # }
//! ```

use flowguard_core::{CancelledError, RateLimitConfig};
use futures::future::BoxFuture;
use futures::FutureExt;
use metrics::{counter, gauge};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace};

/// Shortest window the worker will run with
const MIN_WINDOW: Duration = Duration::from_millis(1);

type Producer<A, T, E> = Arc<dyn Fn(A) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

/// A queued call: its arguments and the channel its task is handed back on.
struct Pending<A, T, E> {
    args: A,
    reply: oneshot::Sender<JoinHandle<Result<T, E>>>,
}

struct Shared<A, T, E> {
    producer: Producer<A, T, E>,
    config: RateLimitConfig,
    requests: OnceLock<mpsc::UnboundedSender<Pending<A, T, E>>>,
    queued: Arc<AtomicUsize>,
}

/// Throttled entry point produced by [`rate_limit`].
///
/// Clones share one queue and one window.
pub struct RateLimiter<A, T, E> {
    shared: Arc<Shared<A, T, E>>,
}

impl<A, T, E> Clone for RateLimiter<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A, T, E> fmt::Debug for RateLimiter<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.shared.config)
            .field("queued", &self.queued())
            .finish()
    }
}

impl<A, T, E> RateLimiter<A, T, E> {
    /// Calls waiting for admission
    pub fn queued(&self) -> usize {
        self.shared.queued.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.shared.config
    }
}

/// Build a rate-limited dispatcher around `producer`.
pub fn rate_limit<A, T, E, F, Fut>(producer: F, config: RateLimitConfig) -> RateLimiter<A, T, E>
where
    A: Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    RateLimiter::new(producer, config)
}

impl<A, T, E> RateLimiter<A, T, E>
where
    A: Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn new<F, Fut>(producer: F, config: RateLimitConfig) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let producer: Producer<A, T, E> = Arc::new(move |args| producer(args).boxed());
        Self {
            shared: Arc::new(Shared {
                producer,
                config,
                requests: OnceLock::new(),
                queued: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }

    /// Queue a call and wait for its own outcome.
    ///
    /// Failures of the producer are returned verbatim. The call only fails
    /// with [`CancelledError`] if the runtime tears the worker down before
    /// the call completes. A panic in the produced task is resumed here.
    pub async fn call(&self, args: A) -> Result<T, E>
    where
        E: From<CancelledError>,
    {
        let (reply, admitted) = oneshot::channel();

        self.shared.queued.fetch_add(1, Ordering::SeqCst);
        if self.sender().send(Pending { args, reply }).is_err() {
            self.shared.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(E::from(CancelledError));
        }

        let task = match admitted.await {
            Ok(task) => task,
            Err(_) => return Err(E::from(CancelledError)),
        };

        match task.await {
            Ok(outcome) => outcome,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => Err(E::from(CancelledError)),
        }
    }

    fn sender(&self) -> &mpsc::UnboundedSender<Pending<A, T, E>> {
        self.shared.requests.get_or_init(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            let worker = WindowWorker {
                producer: Arc::clone(&self.shared.producer),
                max_calls: self.shared.config.max_calls.max(1),
                queued: Arc::clone(&self.shared.queued),
                queue: VecDeque::new(),
                calls_in_window: 0,
            };
            debug!(
                "Starting rate limiter window: {} calls per {:?}",
                worker.max_calls,
                self.shared.config.per_interval()
            );
            tokio::spawn(worker.run(rx, self.shared.config));
            tx
        })
    }
}

/// Owns the queue and the window counter of one limiter.
struct WindowWorker<A, T, E> {
    producer: Producer<A, T, E>,
    max_calls: u32,
    queued: Arc<AtomicUsize>,
    queue: VecDeque<Pending<A, T, E>>,
    calls_in_window: u32,
}

impl<A, T, E> WindowWorker<A, T, E>
where
    A: Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    /// Runs until every limiter handle is dropped and the queue is empty.
    async fn run(
        mut self,
        mut requests: mpsc::UnboundedReceiver<Pending<A, T, E>>,
        config: RateLimitConfig,
    ) {
        // `interval_at` rejects a zero period.
        let period = config.per_interval().max(MIN_WINDOW);
        let mut window = interval_at(Instant::now() + period, period);
        window.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut accepting = true;

        loop {
            tokio::select! {
                biased;
                _ = window.tick() => {
                    trace!("Rate limiter window reset, {} queued", self.queue.len());
                    self.calls_in_window = 0;
                }
                request = requests.recv(), if accepting => match request {
                    Some(pending) => self.queue.push_back(pending),
                    None => accepting = false,
                },
            }

            self.drain();

            if !accepting && self.queue.is_empty() {
                debug!("Rate limiter dropped, stopping window worker");
                break;
            }
        }
    }

    fn drain(&mut self) {
        while self.calls_in_window < self.max_calls {
            let Some(pending) = self.queue.pop_front() else {
                break;
            };
            self.queued.fetch_sub(1, Ordering::SeqCst);

            // The caller stopped waiting; do not spend a slot on it.
            if pending.reply.is_closed() {
                continue;
            }

            self.calls_in_window += 1;
            // Invoke the producer inside the task so a panic stays with its caller.
            let producer = Arc::clone(&self.producer);
            let args = pending.args;
            let task = tokio::spawn(async move { producer(args).await });
            let _ = pending.reply.send(task);
            counter!("flowguard_rate_limit_admitted_total").increment(1);
        }

        gauge!("flowguard_rate_limit_queued").set(self.queue.len() as f64);
    }
}
