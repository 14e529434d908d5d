//! Best-effort event bus.
//!
//! `emit` never blocks and never fails: events land in a bounded FIFO
//! queue (oldest dropped on overflow) and a background task drains them
//! to the daemon socket as newline-delimited JSON whenever one is
//! listening. While no daemon exists the task re-polls every few seconds.
//! Losing events must never take a storage layer down with it.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

use agentdb_core::config::ObservabilityConfig;

use crate::event::{EngineEvent, EventDraft};

static GLOBAL: OnceLock<EventBus> = OnceLock::new();

/// Cloneable handle to the process-wide event bus.
///
/// Storage components hold an injected handle rather than reaching for a
/// global, which keeps tests hermetic; hosts that want singleton wiring
/// use [`EventBus::init_global`] once at startup.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    queue: Mutex<VecDeque<EngineEvent>>,
    capacity: usize,
    socket_path: Option<PathBuf>,
    reconnect_interval: Duration,
    shutdown: AtomicBool,
    dropped: AtomicU64,
    notify: Notify,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl EventBus {
    /// Creates a bus and spawns its socket flusher. Must be called from
    /// within a tokio runtime.
    pub fn new(config: &ObservabilityConfig) -> Self {
        let socket_path = config
            .socket_path
            .clone()
            .or_else(default_socket_path);
        let bus = Self {
            inner: Arc::new(BusInner {
                queue: Mutex::new(VecDeque::new()),
                capacity: config.queue_capacity.max(1),
                socket_path,
                reconnect_interval: Duration::from_millis(config.reconnect_interval_ms.max(100)),
                shutdown: AtomicBool::new(false),
                dropped: AtomicU64::new(0),
                notify: Notify::new(),
                flusher: Mutex::new(None),
            }),
        };
        let handle = tokio::spawn(flusher_loop(bus.inner.clone()));
        if let Ok(mut slot) = bus.inner.flusher.lock() {
            *slot = Some(handle);
        }
        bus
    }

    /// A bus with no socket task. Events queue up to capacity and are
    /// otherwise inert; used by tests and by hosts that only want metrics.
    pub fn disabled() -> Self {
        Self {
            inner: Arc::new(BusInner {
                queue: Mutex::new(VecDeque::new()),
                capacity: 10_000,
                socket_path: None,
                reconnect_interval: Duration::from_secs(5),
                shutdown: AtomicBool::new(false),
                dropped: AtomicU64::new(0),
                notify: Notify::new(),
                flusher: Mutex::new(None),
            }),
        }
    }

    /// Installs `bus` as the process-wide singleton. First call wins.
    pub fn init_global(bus: EventBus) {
        let _ = GLOBAL.set(bus);
    }

    /// The process-wide bus, when one has been installed.
    pub fn try_global() -> Option<EventBus> {
        GLOBAL.get().cloned()
    }

    /// Queues an event. Non-blocking, infallible; after [`Self::shutdown`]
    /// this is a no-op. On a full queue the oldest event is evicted.
    pub fn emit(&self, draft: EventDraft) {
        if self.inner.shutdown.load(Ordering::Acquire) {
            return;
        }
        let event = EngineEvent::from_draft(draft);
        if let Ok(mut queue) = self.inner.queue.lock() {
            if queue.len() == self.inner.capacity {
                queue.pop_front();
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            }
            queue.push_back(event);
        }
        self.inner.notify.notify_one();
    }

    /// Number of events currently queued.
    pub fn queued(&self) -> usize {
        self.inner.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Events evicted because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Drains the queue to the daemon socket, awaiting completion. Best
    /// effort: with no daemon listening the events stay queued.
    pub async fn flush(&self) {
        let Some(path) = self.inner.socket_path.clone() else {
            return;
        };
        let batch = self.inner.take_batch();
        if batch.is_empty() {
            return;
        }
        match UnixStream::connect(&path).await {
            Ok(mut stream) => {
                if let Err(err) = write_batch(&mut stream, &batch).await {
                    debug!(error = %err, "flush failed, requeueing batch");
                    self.inner.requeue(batch);
                }
            }
            Err(_) => self.inner.requeue(batch),
        }
    }

    /// Stops the flusher task and releases the socket. Subsequent emits
    /// are no-ops.
    pub async fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
        let handle = self
            .inner
            .flusher
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl BusInner {
    fn take_batch(&self) -> Vec<EngineEvent> {
        self.queue
            .lock()
            .map(|mut q| q.drain(..).collect())
            .unwrap_or_default()
    }

    /// Puts undelivered events back at the front, oldest first, still
    /// honouring the capacity bound.
    fn requeue(&self, batch: Vec<EngineEvent>) {
        if let Ok(mut queue) = self.queue.lock() {
            for event in batch.into_iter().rev() {
                if queue.len() == self.capacity {
                    queue.pop_back();
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                } else {
                    queue.push_front(event);
                }
            }
        }
    }
}

/// Preferred socket under `$HOME/.god-agent/`, `/tmp` fallback.
fn default_socket_path() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        if !home.is_empty() {
            return Some(PathBuf::from(home).join(".god-agent").join("daemon.sock"));
        }
    }
    Some(PathBuf::from("/tmp/god-agent.sock"))
}

async fn write_batch(
    stream: &mut UnixStream,
    batch: &[EngineEvent],
) -> std::io::Result<()> {
    let mut buf = Vec::with_capacity(batch.len() * 128);
    for event in batch {
        match serde_json::to_vec(event) {
            Ok(line) => {
                buf.extend_from_slice(&line);
                buf.push(b'\n');
            }
            Err(_) => continue,
        }
    }
    stream.write_all(&buf).await?;
    stream.flush().await
}

async fn flusher_loop(inner: Arc<BusInner>) {
    let Some(path) = inner.socket_path.clone() else {
        return;
    };
    while !inner.shutdown.load(Ordering::Acquire) {
        // The socket may not exist yet; poll for it.
        let mut stream = match UnixStream::connect(&path).await {
            Ok(stream) => stream,
            Err(_) => {
                tokio::select! {
                    _ = tokio::time::sleep(inner.reconnect_interval) => {}
                    _ = inner.notify.notified() => {}
                }
                continue;
            }
        };
        debug!(path = %path.display(), "connected to observability daemon");

        while !inner.shutdown.load(Ordering::Acquire) {
            let batch = inner.take_batch();
            if batch.is_empty() {
                inner.notify.notified().await;
                continue;
            }
            if let Err(err) = write_batch(&mut stream, &batch).await {
                debug!(error = %err, "daemon write failed, requeueing");
                inner.requeue(batch);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventStatus;
    use tokio::io::AsyncBufReadExt;

    fn draft(op: &str) -> EventDraft {
        EventDraft::new("test", op, EventStatus::Completed)
    }

    fn small_config(socket: Option<PathBuf>, capacity: usize) -> ObservabilityConfig {
        ObservabilityConfig {
            queue_capacity: capacity,
            socket_path: socket,
            reconnect_interval_ms: 100,
        }
    }

    #[tokio::test]
    async fn emit_never_fails_and_evicts_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let bus = EventBus::new(&small_config(Some(dir.path().join("absent.sock")), 3));
        for i in 0..10 {
            bus.emit(draft(&format!("op-{i}")));
        }
        assert_eq!(bus.queued(), 3);
        assert_eq!(bus.dropped(), 7);
        bus.shutdown().await;
        bus.emit(draft("after-shutdown"));
        assert_eq!(bus.queued(), 3);
    }

    #[tokio::test]
    async fn events_reach_a_listening_daemon() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("daemon.sock");
        let listener = tokio::net::UnixListener::bind(&sock).unwrap();

        let bus = EventBus::new(&small_config(Some(sock), 100));
        bus.emit(draft("hello"));

        let (stream, _) = listener.accept().await.unwrap();
        let mut lines = tokio::io::BufReader::new(stream).lines();
        let line = tokio::time::timeout(Duration::from_secs(2), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let event: EngineEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(event.operation, "hello");
        assert_eq!(event.component, "test");
        bus.shutdown().await;
    }

    #[tokio::test]
    async fn flush_without_daemon_keeps_events() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("missing.sock");
        let bus = EventBus::new(&small_config(Some(sock), 100));
        bus.emit(draft("queued"));
        bus.flush().await;
        assert_eq!(bus.queued(), 1);
        bus.shutdown().await;
    }
}
