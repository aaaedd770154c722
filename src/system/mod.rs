//! State system: the attribute tree, the per-attribute histories and the
//! build gate behind one cloneable handle.
//!
//! One writer (usually a [`StateProvider`](crate::provider::StateProvider)
//! driven by [`build_state_system`](crate::provider::build_state_system))
//! creates attributes and appends modifications in timestamp order. Any
//! number of readers may hold clones of the same `StateSystem` and query it
//! concurrently; strict queries fail with `TimeOutOfRange` until the writer
//! calls [`StateSystem::close_store`].

use crate::attribute::AttributeTree;
use crate::config::Config;
use crate::error::{Result, StateError};
use crate::history::{AttributeHistory, Modification};
use crate::types::{Quark, StateValue, StoreStats, Timestamp};
use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

mod query;

/// Known time range of the store.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TimeBounds {
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
}

impl TimeBounds {
    fn observe(&mut self, time: Timestamp) {
        self.start = Some(self.start.map_or(time, |s| s.min(time)));
        self.end = Some(self.end.map_or(time, |e| e.max(time)));
    }
}

/// Blocks readers until the store is closed.
#[derive(Debug, Default)]
pub(crate) struct BuildGate {
    built: Mutex<bool>,
    cond: Condvar,
}

impl BuildGate {
    fn open(&self) {
        let mut built = self.built.lock();
        *built = true;
        self.cond.notify_all();
    }

    fn wait(&self) {
        let mut built = self.built.lock();
        while !*built {
            self.cond.wait(&mut built);
        }
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut built = self.built.lock();
        while !*built {
            if self.cond.wait_until(&mut built, deadline).timed_out() {
                return *built;
            }
        }
        true
    }
}

/// Time-indexed attribute state store.
///
/// Cloning is cheap and every clone sees the same store.
///
/// # Examples
///
/// ```rust
/// use statehistory::{StateSystem, StateValue};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let ss = StateSystem::new();
/// let quark = ss.get_or_create_quark(&["Requester", "alice"])?;
///
/// ss.modify_attribute(0, StateValue::Int(1), quark)?;
/// ss.modify_attribute(5, StateValue::Int(2), quark)?;
/// ss.close_store(9)?;
///
/// let interval = ss.query_single_state(3, quark)?;
/// assert_eq!((interval.start, interval.end), (0, 4));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct StateSystem {
    pub(crate) tree: Arc<RwLock<AttributeTree>>,
    /// Indexed by quark; index 0 belongs to the root and stays empty.
    pub(crate) histories: Arc<RwLock<Vec<RwLock<AttributeHistory>>>>,
    pub(crate) bounds: Arc<RwLock<TimeBounds>>,
    pub(crate) gate: Arc<BuildGate>,
    pub(crate) closed: Arc<AtomicBool>,
    pub(crate) ops_count: Arc<AtomicU64>,
    pub(crate) coalesced_count: Arc<AtomicU64>,
    pub(crate) config: Config,
}

impl StateSystem {
    /// Create an empty store with default configuration.
    pub fn new() -> Self {
        Self::from_valid_config(Config::default())
    }

    pub fn builder() -> crate::builder::StateSystemBuilder {
        crate::builder::StateSystemBuilder::new()
    }

    /// Create an empty store with custom configuration.
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().map_err(StateError::Config)?;
        Ok(Self::from_valid_config(config))
    }

    pub(crate) fn from_valid_config(config: Config) -> Self {
        let mut histories = Vec::with_capacity(config.attribute_capacity);
        histories.push(RwLock::new(AttributeHistory::new(Quark::ROOT, 0)));

        Self {
            tree: Arc::new(RwLock::new(AttributeTree::with_capacity(
                config.attribute_capacity,
            ))),
            histories: Arc::new(RwLock::new(histories)),
            bounds: Arc::new(RwLock::new(TimeBounds {
                start: config.start_time,
                end: None,
            })),
            gate: Arc::new(BuildGate::default()),
            closed: Arc::new(AtomicBool::new(false)),
            ops_count: Arc::new(AtomicU64::new(0)),
            coalesced_count: Arc::new(AtomicU64::new(0)),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StateError::StoreClosed);
        }
        Ok(())
    }

    /// Resolve `path` from the root, creating missing attributes.
    pub fn get_or_create_quark<S: AsRef<str>>(&self, path: &[S]) -> Result<Quark> {
        self.get_or_create_quark_relative(Quark::ROOT, path)
    }

    /// Resolve `path` below `start`, creating missing attributes.
    pub fn get_or_create_quark_relative<S: AsRef<str>>(
        &self,
        start: Quark,
        path: &[S],
    ) -> Result<Quark> {
        // Existing paths resolve under the read lock, even once closed
        if let Ok(quark) = self.tree.read().get_quark_relative(start, path) {
            return Ok(quark);
        }
        self.ensure_writable()?;

        let mut tree = self.tree.write();
        let before = tree.len();
        let result = tree.get_or_create_quark_relative(start, path);

        // Keep one history slot per node, even when a later segment failed
        // validation after earlier ones were created.
        if tree.len() != before {
            let node_count = tree.len() + 1;
            let mut histories = self.histories.write();
            while histories.len() < node_count {
                let quark = Quark::new(histories.len() as u32);
                histories.push(RwLock::new(AttributeHistory::new(
                    quark,
                    self.config.interval_capacity,
                )));
            }
        }
        result
    }

    pub fn get_quark<S: AsRef<str>>(&self, path: &[S]) -> Result<Quark> {
        self.tree.read().get_quark(path)
    }

    pub fn get_quark_relative<S: AsRef<str>>(&self, start: Quark, path: &[S]) -> Result<Quark> {
        self.tree.read().get_quark_relative(start, path)
    }

    /// Direct children of `quark`; `"*"` matches all of them.
    pub fn get_children(&self, quark: Quark, pattern: &str) -> Result<Vec<Quark>> {
        self.tree.read().get_children(quark, pattern)
    }

    /// Quarks matching a multi-segment pattern below `start`.
    pub fn get_quarks<S: AsRef<str>>(&self, start: Quark, pattern: &[S]) -> Result<Vec<Quark>> {
        self.tree.read().get_quarks(start, pattern)
    }

    pub fn get_path(&self, quark: Quark) -> Result<Vec<String>> {
        self.tree.read().get_path(quark)
    }

    pub fn get_attribute_name(&self, quark: Quark) -> Result<String> {
        self.tree
            .read()
            .get_attribute_name(quark)
            .map(str::to_string)
    }

    pub fn get_full_attribute_path(&self, quark: Quark) -> Result<String> {
        self.tree.read().get_full_attribute_path(quark)
    }

    pub fn get_parent(&self, quark: Quark) -> Result<Option<Quark>> {
        self.tree.read().get_parent(quark)
    }

    /// Number of attributes, root excluded.
    pub fn attribute_count(&self) -> usize {
        self.tree.read().len()
    }

    fn with_history<T>(
        &self,
        quark: Quark,
        f: impl FnOnce(&mut AttributeHistory) -> Result<T>,
    ) -> Result<T> {
        if quark.is_root() {
            return Err(StateError::InvalidAttribute(
                "the root attribute cannot hold a value".into(),
            ));
        }
        let histories = self.histories.read();
        let history = histories
            .get(quark.index())
            .ok_or_else(|| StateError::NotFound(format!("quark {}", quark)))?;
        let mut history = history.write();
        f(&mut history)
    }

    /// Record that `quark` holds `value` from `time` on.
    ///
    /// `time` must not precede the previous modification of `quark`.
    /// Repeating the current value is a no-op; a different value commits the
    /// current interval with `end = time - 1`.
    pub fn modify_attribute(&self, time: Timestamp, value: StateValue, quark: Quark) -> Result<()> {
        self.ensure_writable()?;

        let outcome = self.with_history(quark, |history| history.modify(time, value))?;

        self.bounds.write().observe(time);
        self.ops_count.fetch_add(1, Ordering::Relaxed);
        if outcome == Modification::Coalesced {
            self.coalesced_count.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Replace the current value of `quark` without starting a new interval.
    pub fn update_ongoing_state(&self, value: StateValue, quark: Quark) -> Result<()> {
        self.ensure_writable()?;
        self.with_history(quark, |history| history.update_ongoing(value))
    }

    /// Value of the open interval of `quark`, `Null` when there is none.
    pub fn query_ongoing_state(&self, quark: Quark) -> Result<StateValue> {
        self.with_history(quark, |history| {
            Ok(history
                .open()
                .map(|open| open.value.clone())
                .unwrap_or_default())
        })
    }

    /// Start time of the open interval of `quark`.
    pub fn ongoing_start_time(&self, quark: Quark) -> Result<Option<Timestamp>> {
        self.with_history(quark, |history| Ok(history.open().map(|open| open.start)))
    }

    /// Close every open interval at `end_time` and mark the store built.
    ///
    /// Releases every thread blocked in [`wait_until_built`](Self::wait_until_built).
    pub fn close_store(&self, end_time: Timestamp) -> Result<()> {
        self.ensure_writable()?;

        {
            let mut bounds = self.bounds.write();
            if let Some(last) = bounds.end
                && end_time < last
            {
                return Err(StateError::OutOfOrderInsertion {
                    quark: Quark::ROOT,
                    time: end_time,
                    last,
                });
            }

            let histories = self.histories.read();
            for history in histories.iter() {
                history.write().close(end_time);
            }

            bounds.start = Some(bounds.start.map_or(end_time, |s| s.min(end_time)));
            bounds.end = Some(end_time);
        }

        self.closed.store(true, Ordering::Release);
        self.gate.open();

        log::debug!(
            "state system closed at {} with {} attributes after {} modifications",
            end_time,
            self.attribute_count(),
            self.ops_count.load(Ordering::Relaxed)
        );
        Ok(())
    }

    /// Whether `close_store` has been called.
    pub fn is_built(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Block until the store is closed.
    pub fn wait_until_built(&self) {
        if !self.is_built() {
            self.gate.wait();
        }
    }

    /// Block until the store is closed or `timeout` elapses. Returns whether
    /// the store is built.
    pub fn wait_until_built_timeout(&self, timeout: Duration) -> bool {
        self.is_built() || self.gate.wait_timeout(timeout)
    }

    /// Get store statistics
    pub fn stats(&self) -> StoreStats {
        let bounds = *self.bounds.read();
        let interval_count = self
            .histories
            .read()
            .iter()
            .map(|history| history.read().closed().len())
            .sum();

        StoreStats {
            attribute_count: self.attribute_count(),
            interval_count,
            modifications_count: self.ops_count.load(Ordering::Relaxed),
            coalesced_count: self.coalesced_count.load(Ordering::Relaxed),
            start_time: bounds.start,
            end_time: bounds.end,
            built: self.is_built(),
        }
    }
}

impl Default for StateSystem {
    fn default() -> Self {
        Self::new()
    }
}
