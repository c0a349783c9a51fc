use amconsts::PROGRESS_INTERVAL_MAX;
use parking_lot::Mutex;
use report::format_config_line;
use spin::SearchResult;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Found(SearchResult),
    Tick {
        completed: u64,
        accepted: u64,
        total: u64,
    },
}

/// `min(100000, max(1, total / 100))`
pub fn progress_interval(total: u64) -> u64 {
    PROGRESS_INTERVAL_MAX.min((total / 100).max(1))
}

/// Shared counters of a running search, optionally feeding a reporter thread.
#[derive(Debug)]
pub struct Progress {
    tx: Option<Mutex<Sender<ProgressEvent>>>,
    total: u64,
    interval: u64,
    completed: AtomicU64,
    accepted: AtomicU64,
}

impl Progress {
    pub fn silent(total: u64) -> Progress {
        Progress {
            tx: None,
            total,
            interval: progress_interval(total),
            completed: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
        }
    }

    pub fn with_channel(total: u64, tx: Sender<ProgressEvent>) -> Progress {
        Progress {
            tx: Some(Mutex::new(tx)),
            ..Progress::silent(total)
        }
    }

    pub fn get_total(&self) -> u64 {
        self.total
    }

    pub fn get_completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn get_accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Counts one evaluated candidate.
    pub fn record(&self, found: Option<&SearchResult>) {
        if let Some(r) = found {
            self.accepted.fetch_add(1, Ordering::Relaxed);
            self.send(ProgressEvent::Found(r.clone()));
        }

        let completed = self.completed.fetch_add(1, Ordering::Relaxed) + 1;

        if completed % self.interval == 0 {
            self.tick(completed);
        }
    }

    /// Counts a batch of `n` evaluated candidates at once.
    pub fn record_batch(&self, n: u64, found: &[SearchResult]) {
        for r in found.iter() {
            self.send(ProgressEvent::Found(r.clone()));
        }

        self.accepted.fetch_add(found.len() as u64, Ordering::Relaxed);
        let completed = self.completed.fetch_add(n, Ordering::Relaxed) + n;

        self.tick(completed);
    }

    /// Forgets the counts of an abandoned run.
    pub fn reset(&self) {
        self.completed.store(0, Ordering::Relaxed);
        self.accepted.store(0, Ordering::Relaxed);
    }

    pub fn finish(&self) {
        self.tick(self.get_completed());
    }

    fn tick(&self, completed: u64) {
        self.send(ProgressEvent::Tick {
            completed,
            accepted: self.get_accepted(),
            total: self.total,
        });
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            // the reporter may already be gone; progress is best effort
            let _ = tx.lock().send(event);
        }
    }
}

/// Single owner of the console while a search runs.
pub struct ProgressReporter {
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    pub fn spawn(symbols: Vec<String>, unicode: bool) -> (Sender<ProgressEvent>, ProgressReporter) {
        let (tx, rx) = channel();

        let handle = thread::spawn(move || report_loop(rx, &symbols, unicode));

        (tx, ProgressReporter { handle })
    }

    /// Waits until every sender is dropped and the last event is printed.
    pub fn join(self) {
        if self.handle.join().is_err() {
            log::warn!("progress reporter thread panicked");
        }
    }
}

fn report_loop(rx: Receiver<ProgressEvent>, symbols: &[String], unicode: bool) {
    let symbols: Vec<&str> = symbols.iter().map(|s| s.as_str()).collect();
    let stdout = std::io::stdout();

    for event in rx.iter() {
        let mut out = stdout.lock();

        match event {
            ProgressEvent::Found(r) => {
                let _ = writeln!(
                    out,
                    "\r{:80}\r   FOUND {}",
                    "",
                    format_config_line(&symbols, &r, unicode)
                );
            }

            ProgressEvent::Tick {
                completed,
                accepted,
                total,
            } => {
                let percent = if total == 0 {
                    100.0
                } else {
                    100.0 * completed as f64 / total as f64
                };

                let _ = write!(
                    out,
                    "\r   Progress: {:.1}% ({}/{}) - Found: {}",
                    percent, completed, total, accepted
                );
            }
        }

        let _ = out.flush();
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use spin::SpinState;

    #[test]
    fn test_progress_interval() {
        assert_eq!(progress_interval(16), 1);
        assert_eq!(progress_interval(1000), 10);
        assert_eq!(progress_interval(1 << 30), 100_000);
    }

    #[test]
    fn test_progress_events() {
        let (tx, rx) = channel();
        let progress = Progress::with_channel(4, tx);

        let r = SearchResult::new(2, vec![SpinState::Up, SpinState::Down]);

        progress.record(None);
        progress.record(Some(&r));

        assert_eq!(progress.get_completed(), 2);
        assert_eq!(progress.get_accepted(), 1);

        drop(progress);
        let events: Vec<ProgressEvent> = rx.iter().collect();

        assert_eq!(
            events,
            vec![
                ProgressEvent::Tick { completed: 1, accepted: 0, total: 4 },
                ProgressEvent::Found(r),
                ProgressEvent::Tick { completed: 2, accepted: 1, total: 4 },
            ]
        );
    }

    #[test]
    fn test_silent_batch_and_reset() {
        let progress = Progress::silent(100);
        assert_eq!(progress.get_total(), 100);

        progress.record_batch(10, &[]);
        assert_eq!(progress.get_completed(), 10);

        progress.reset();
        assert_eq!(progress.get_completed(), 0);
    }
}
