#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Free-running tick source for Portal Grid sessions.
//!
//! The clock owns a dedicated thread that counts ticks at a fixed cadence and
//! hands every tick number to a callback. Stopping the clock joins the thread,
//! so no callback runs once [`Clock::stop`] returns.

use std::{
    io,
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{select, Sender};
use tracing::{debug, warn};

/// Name given to the thread driving the clock.
pub const THREAD_NAME: &str = "portal-grid-clock";

/// Configuration parameters required to start a clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    interval: Duration,
}

impl Config {
    /// Creates a configuration that ticks once per `interval`.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Time between consecutive ticks.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Duration::from_millis(1))
    }
}

/// Handle to a running tick thread.
#[derive(Debug)]
pub struct Clock {
    stop: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl Clock {
    /// Starts a clock that calls `on_tick` with tick numbers `1, 2, 3, ...`.
    pub fn spawn<F>(config: Config, mut on_tick: F) -> io::Result<Self>
    where
        F: FnMut(u64) + Send + 'static,
    {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let interval = config.interval();

        let join = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                let ticker = crossbeam_channel::tick(interval);
                let mut tick = 0_u64;
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            tick = tick.saturating_add(1);
                            on_tick(tick);
                        }
                        recv(stop_rx) -> _ => break,
                    }
                }
                debug!(ticks = tick, "clock stopped");
            })?;
        debug!(?interval, "clock started");

        Ok(Self {
            stop: Some(stop_tx),
            join: Some(join),
        })
    }

    /// Reports whether the tick thread is still owned by this handle.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.join.is_some()
    }

    /// Stops the clock and waits for the tick thread to finish.
    ///
    /// Calling `stop` again is a no-op. When invoked from inside the tick
    /// callback the thread is signalled but not joined.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let Some(join) = self.join.take() else {
            return;
        };
        if join.thread().id() == thread::current().id() {
            return;
        }
        if join.join().is_err() {
            warn!("clock thread panicked");
        }
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    };

    use super::*;

    #[test]
    fn default_interval_is_one_millisecond() {
        assert_eq!(Config::default().interval(), Duration::from_millis(1));
    }

    #[test]
    fn ticks_arrive_in_order_from_one() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut clock = Clock::spawn(Config::default(), move |tick| {
            let _ = tx.send(tick);
        })
        .expect("clock spawns");

        let received: Vec<u64> = (0..5)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).expect("tick arrives"))
            .collect();
        clock.stop();

        assert_eq!(received, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn callback_runs_on_named_thread() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let _clock = Clock::spawn(Config::default(), move |_| {
            let _ = tx.send(thread::current().name().map(str::to_owned));
        })
        .expect("clock spawns");

        let name = rx.recv_timeout(Duration::from_secs(5)).expect("tick arrives");

        assert_eq!(name.as_deref(), Some(THREAD_NAME));
    }

    #[test]
    fn stop_is_idempotent_and_final() {
        let counter = Arc::new(AtomicU64::new(0));
        let observed = Arc::clone(&counter);
        let mut clock = Clock::spawn(Config::new(Duration::from_micros(200)), move |tick| {
            observed.store(tick, Ordering::SeqCst);
        })
        .expect("clock spawns");
        while counter.load(Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(1));
        }

        clock.stop();
        let after_stop = counter.load(Ordering::SeqCst);
        clock.stop();
        thread::sleep(Duration::from_millis(20));

        assert!(!clock.is_running());
        assert_eq!(counter.load(Ordering::SeqCst), after_stop);
    }
}
