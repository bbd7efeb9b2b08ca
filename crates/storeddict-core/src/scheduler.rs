//! Debounced sync: background writes from the cache to the backing file
//!
//! Each store owns one sync thread. Mutations send `Touched` to it, which
//! (re)arms a single deadline `delay` after the mutation; the thread sleeps on
//! its mailbox until either another message arrives or the deadline passes.
//! When the deadline passes with no newer touch, the thread snapshots the
//! cache as it is *now* and writes it. Because every arm, extend, flush and
//! expiry decision is made on this one thread, at most one write is ever
//! pending and there is no check-then-act window between callers.
//!
//! State machine:
//!
//! ```text
//!   Idle  --Touched-->  Armed(deadline)
//!   Armed --Touched-->  Armed(later deadline)
//!   Armed --expiry-->   write, Idle
//!   any   --Flush-->    write, Idle     (reply carries the write result)
//!   any   --Shutdown--> write if Armed, exit
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, warn};

use crate::cache::Cache;
use crate::codec;
use crate::error::{StoreError, StoreResult};

/// Where and how snapshots are written.
#[derive(Debug, Clone)]
pub struct SyncTarget {
    pub path: PathBuf,
    pub title: Option<String>,
    pub durable: bool,
    pub dry_run: bool,
}

enum Command {
    /// The cache changed at the given instant.
    Touched(Instant),
    /// Write now and report the outcome.
    Flush(Sender<StoreResult<()>>),
    Shutdown,
}

/// Counters shared between the store and its sync thread.
pub struct SyncStats {
    /// Snapshots written to disk
    writes: AtomicU64,
    /// Snapshot writes that failed
    failures: AtomicU64,
    /// Mutations that armed or extended the deadline
    touches: AtomicU64,
    /// A deadline is currently armed
    armed: AtomicBool,
    /// Completion time of the last successful write
    last_write: Mutex<Option<Instant>>,
}

impl SyncStats {
    pub fn new() -> Self {
        Self {
            writes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            touches: AtomicU64::new(0),
            armed: AtomicBool::new(false),
            last_write: Mutex::new(None),
        }
    }

    /// Snapshots written since the store was opened.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Failed snapshot writes since the store was opened.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Mutations seen by the sync thread.
    pub fn touches(&self) -> u64 {
        self.touches.load(Ordering::Relaxed)
    }

    /// True while a debounced write is waiting for its deadline.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    pub fn last_write(&self) -> Option<Instant> {
        *self.last_write.lock()
    }

    fn record_write(&self) {
        *self.last_write.lock() = Some(Instant::now());
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_touch(&self) {
        self.touches.fetch_add(1, Ordering::Relaxed);
    }

    fn set_armed(&self, armed: bool) {
        self.armed.store(armed, Ordering::Release);
    }
}

impl Default for SyncStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a running sync thread.
/// Dropping this handle writes any pending snapshot and stops the thread.
pub struct SyncHandle {
    commands: Sender<Command>,
    thread: Option<thread::JoinHandle<()>>,
}

impl SyncHandle {
    /// Report a mutation made at `at`. Arms or extends the deadline.
    pub fn touch(&self, at: Instant) -> StoreResult<()> {
        self.commands
            .send(Command::Touched(at))
            .map_err(|_| StoreError::SchedulerStopped)
    }

    /// Write the current cache now and wait for the result.
    pub fn flush(&self) -> StoreResult<()> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.commands
            .send(Command::Flush(reply_tx))
            .map_err(|_| StoreError::SchedulerStopped)?;
        reply_rx.recv().map_err(|_| StoreError::SchedulerStopped)?
    }

    /// Write any pending snapshot, stop the thread and wait for it.
    pub fn shutdown(mut self) {
        self.stop();
    }

    pub(crate) fn stop(&mut self) {
        if let Some(handle) = self.thread.take() {
            let _ = self.commands.send(Command::Shutdown);
            if handle.join().is_err() {
                warn!("sync thread panicked");
            }
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start the sync thread for one store.
///
/// # Arguments
/// * `cache` - Shared cache; read-locked only long enough to clone a snapshot
/// * `target` - Backing file and write options
/// * `delay` - Quiet period after the last touch before writing
/// * `stats` - Shared counters
pub fn start_sync(
    cache: Arc<RwLock<Cache>>,
    target: SyncTarget,
    delay: Duration,
    stats: Arc<SyncStats>,
) -> StoreResult<SyncHandle> {
    let (commands, mailbox) = crossbeam_channel::unbounded();
    let path = target.path.clone();

    let thread = thread::Builder::new()
        .name("storeddict-sync".to_string())
        .spawn(move || {
            sync_loop(mailbox, cache, target, delay, stats);
        })
        .map_err(|e| StoreError::StorageWrite {
            path,
            message: format!("failed to spawn sync thread: {}", e),
        })?;

    Ok(SyncHandle {
        commands,
        thread: Some(thread),
    })
}

/// Main sync loop, runs on the background thread.
fn sync_loop(
    mailbox: Receiver<Command>,
    cache: Arc<RwLock<Cache>>,
    target: SyncTarget,
    delay: Duration,
    stats: Arc<SyncStats>,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        let next = match deadline {
            Some(at) => mailbox.recv_deadline(at),
            None => mailbox.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match next {
            Ok(Command::Touched(at)) => {
                let at = at + delay;
                let at = deadline.map_or(at, |current| current.max(at));
                debug!(delay_s = delay.as_secs_f64(), rearmed = deadline.is_some(), "new sync deadline");
                deadline = Some(at);
                stats.record_touch();
                stats.set_armed(true);
            }
            Ok(Command::Flush(reply)) => {
                deadline = None;
                stats.set_armed(false);
                let result = write_snapshot(&cache, &target, &stats);
                let _ = reply.send(result);
            }
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                if deadline.take().is_some() {
                    stats.set_armed(false);
                    debug!("writing pending snapshot before shutdown");
                    log_failure(write_snapshot(&cache, &target, &stats), &target);
                }
                return;
            }
            Err(RecvTimeoutError::Timeout) => {
                debug!("sync waiting period ended");
                deadline = None;
                stats.set_armed(false);
                log_failure(write_snapshot(&cache, &target, &stats), &target);
            }
        }
    }
}

/// Snapshot the cache and write it. The lock is released before any I/O.
fn write_snapshot(cache: &RwLock<Cache>, target: &SyncTarget, stats: &SyncStats) -> StoreResult<()> {
    let snapshot = cache.read().as_mapping().clone();

    if target.dry_run {
        debug!(path = %target.path.display(), entries = snapshot.len(), "dry run, skipping write");
        return Ok(());
    }

    match codec::dump(&target.path, &snapshot, target.title.as_deref(), target.durable) {
        Ok(()) => {
            stats.record_write();
            Ok(())
        }
        Err(e) => {
            stats.record_failure();
            Err(e)
        }
    }
}

fn log_failure(result: StoreResult<()>, target: &SyncTarget) {
    if let Err(e) = result {
        error!(path = %target.path.display(), error = %e, "background write failed");
    }
}
