//! In-process metric cells
//!
//! Clones share storage, so a metric handed to a component can be read back
//! from a handle kept by the service for its readiness report.

use serde::{Serialize, Serializer};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
struct Cell {
    label: &'static str,
    value: Arc<AtomicU64>,
}

impl Cell {
    fn labelled(label: &'static str) -> Self {
        Self {
            label,
            value: Arc::default(),
        }
    }

    fn load(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.label, self.load())
    }
}

/// Monotonic count of events
#[derive(Debug, Clone, Default)]
pub struct Counter(Cell);

impl Counter {
    pub fn new(label: &'static str) -> Self {
        Self(Cell::labelled(label))
    }

    pub fn inc(&self) {
        self.0.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load()
    }
}

/// Last observed size of something
#[derive(Debug, Clone, Default)]
pub struct Gauge(Cell);

impl Gauge {
    pub fn new(label: &'static str) -> Self {
        Self(Cell::labelled(label))
    }

    pub fn set(&self, value: u64) {
        self.0.value.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load()
    }
}

impl Serialize for Counter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.get())
    }
}

impl Serialize for Gauge {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.get())
    }
}

const DEFAULT_WINDOW: usize = 1024;

/// Latest `window` observations, summarised on demand
#[derive(Debug, Clone)]
pub struct Histogram {
    label: &'static str,
    window: usize,
    recent: Arc<parking_lot::Mutex<VecDeque<f64>>>,
}

/// Summary of a histogram window; all zero when nothing was recorded
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct HistogramSnapshot {
    pub count: usize,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub max: f64,
}

impl Histogram {
    pub fn new(label: &'static str) -> Self {
        Self::with_window(label, DEFAULT_WINDOW)
    }

    pub fn with_window(label: &'static str, window: usize) -> Self {
        let window = window.max(1);
        Self {
            label,
            window,
            recent: Arc::new(parking_lot::Mutex::new(VecDeque::with_capacity(window))),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn record(&self, value: f64) {
        let mut recent = self.recent.lock();
        if recent.len() == self.window {
            recent.pop_front();
        }
        recent.push_back(value);
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        let mut sorted: Vec<f64> = self.recent.lock().iter().copied().collect();
        if sorted.is_empty() {
            return HistogramSnapshot::default();
        }
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let rank = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];
        HistogramSnapshot {
            count,
            mean: sorted.iter().sum::<f64>() / count as f64,
            p50: rank(0.50),
            p95: rank(0.95),
            max: sorted[count - 1],
        }
    }
}
