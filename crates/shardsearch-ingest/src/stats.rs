use std::time::{Duration, Instant};

use crossbeam_channel::{select, tick, Receiver, Sender};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::cancel::CancellationToken;

/// Throughput over one reporting window plus the running total.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Stats {
    pub total_docs: u64,
    pub window_docs: u64,
    pub window_duration: Duration,
    /// Documents per second over the window.
    pub window_rate: f64,
    /// Mean latency of the index calls completed in the window.
    pub window_latency: Duration,
}

/// One successful index call: how many documents it carried and how long it took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub docs: usize,
    pub latency: Duration,
}

#[derive(Debug)]
pub(crate) struct Window {
    total_docs: u64,
    docs: u64,
    calls: u32,
    latency: Duration,
    started: Instant,
}

impl Window {
    pub(crate) fn new(now: Instant) -> Self {
        Self { total_docs: 0, docs: 0, calls: 0, latency: Duration::ZERO, started: now }
    }

    pub(crate) fn record(&mut self, sample: Sample) {
        self.total_docs += sample.docs as u64;
        self.docs += sample.docs as u64;
        self.calls += 1;
        self.latency += sample.latency;
    }

    /// Closes the window. Empty windows produce nothing; either way the
    /// window counters restart at `now`.
    pub(crate) fn close(&mut self, now: Instant) -> Option<Stats> {
        let duration = now.saturating_duration_since(self.started);
        let stats = (self.docs > 0).then(|| Stats {
            total_docs: self.total_docs,
            window_docs: self.docs,
            window_duration: duration,
            window_rate: if duration.is_zero() { 0.0 } else { self.docs as f64 / duration.as_secs_f64() },
            window_latency: self.latency / self.calls.max(1),
        });
        self.docs = 0;
        self.calls = 0;
        self.latency = Duration::ZERO;
        self.started = now;
        stats
    }
}

/// Console side of the reporter: a spinner line plus a tracing event per window.
pub(crate) struct Progress {
    bar: ProgressBar,
}

impl Progress {
    pub(crate) fn new(visible: bool) -> Self {
        if !visible { return Self { bar: ProgressBar::hidden() }; }
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    fn show(&self, s: &Stats) {
        self.bar.set_message(format!(
            "{} docs | {:.0} docs/s | {:.2}ms/call",
            s.total_docs,
            s.window_rate,
            s.window_latency.as_secs_f64() * 1000.0
        ));
        info!(total_docs = s.total_docs, rate = s.window_rate, latency_ms = s.window_latency.as_millis() as u64, "ingest progress");
    }

    pub(crate) fn finish(&self, total: u64) {
        self.bar.finish_with_message(format!("{total} docs indexed"));
    }
}

/// Drains samples until every index worker is gone, emitting a `Stats` per
/// non-empty window of `interval` and a last one for the final partial
/// window. Returns the last emitted `Stats`.
///
/// Forwarding to `out` blocks while the consumer lags, but never past
/// cancellation; after a cancel or a disconnect nothing more is forwarded.
pub(crate) fn report(
    samples: Receiver<Sample>,
    mut out: Option<Sender<Stats>>,
    progress: &Progress,
    interval: Duration,
    cancel: &CancellationToken,
) -> Option<Stats> {
    let ticker = tick(interval);
    let mut window = Window::new(Instant::now());
    let mut last = None;
    let mut emit = |stats: Option<Stats>| {
        let Some(stats) = stats else { return };
        progress.show(&stats);
        if let Some(tx) = &out {
            if let Err(why) = cancel.send(tx, stats) {
                warn!(reason = ?why, "stats consumer no longer served");
                out = None;
            }
        }
        last = Some(stats);
    };
    loop {
        select! {
            recv(samples) -> msg => match msg {
                Ok(sample) => window.record(sample),
                Err(_) => break,
            },
            recv(ticker) -> _ => emit(window.close(Instant::now())),
        }
    }
    emit(window.close(Instant::now()));
    last
}
