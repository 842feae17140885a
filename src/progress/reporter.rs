use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::Stream;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, warn};

use crate::domain::Channel;
use crate::progress::{EventKind, ProgressEvent};
use crate::scraper::ScrapeResult;

struct Shared {
    task_id: String,
    ended: AtomicBool,
    terminal: Mutex<Option<ProgressEvent>>,
    notify: Notify,
    dropped: AtomicU64,
}

impl Shared {
    fn take_terminal(&self) -> Option<ProgressEvent> {
        self.terminal.lock().ok().and_then(|mut t| t.take())
    }
}

/// Create a connected reporter/stream pair for one task.
pub fn channel(task_id: impl Into<String>, capacity: usize) -> (ProgressReporter, ProgressStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let shared = Arc::new(Shared {
        task_id: task_id.into(),
        ended: AtomicBool::new(false),
        terminal: Mutex::new(None),
        notify: Notify::new(),
        dropped: AtomicU64::new(0),
    });
    (
        ProgressReporter {
            tx,
            shared: shared.clone(),
        },
        ProgressStream {
            rx,
            shared,
            terminal: None,
            done: false,
        },
    )
}

/// Producer side of a task's event sequence
#[derive(Clone)]
pub struct ProgressReporter {
    tx: mpsc::Sender<ProgressEvent>,
    shared: Arc<Shared>,
}

impl ProgressReporter {
    pub fn task_id(&self) -> &str {
        &self.shared.task_id
    }

    /// Queue an event without waiting. `end_stream` is routed to
    /// [`end_stream`](Self::end_stream) so it can never be dropped.
    pub fn emit(&self, event: ProgressEvent) {
        if event.is_terminal() {
            self.finish(event);
            return;
        }
        if self.shared.ended.load(Ordering::SeqCst) {
            debug!(task = %self.task_id(), "Event after end_stream ignored: {}", event.kind);
            return;
        }

        self.trace(&event);
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    task = %self.task_id(),
                    "Progress queue full, {} event dropped: {}",
                    event.kind,
                    event.summary()
                );
            }
            Err(TrySendError::Closed(_)) => {
                debug!(task = %self.task_id(), "Progress listener gone");
            }
        }
    }

    fn trace(&self, event: &ProgressEvent) {
        let task = self.task_id();
        let text = event.summary();
        match event.kind {
            EventKind::Dev => debug!(task = %task, "{}", text),
            EventKind::Warn => warn!(task = %task, "{}", text),
            EventKind::Error => error!(task = %task, "{}", text),
            kind => info!(task = %task, kind = %kind, "{}", text),
        }
    }

    fn finish(&self, event: ProgressEvent) {
        if self.shared.ended.swap(true, Ordering::SeqCst) {
            debug!(task = %self.task_id(), "Duplicate end_stream ignored");
            return;
        }
        self.trace(&event);
        if let Ok(mut terminal) = self.shared.terminal.lock() {
            *terminal = Some(event);
        }
        self.shared.notify.notify_one();
    }

    fn emit_payload(&self, kind: EventKind, payload: impl Serialize) {
        match serde_json::to_value(payload) {
            Ok(content) => self.emit(ProgressEvent::new(kind, content)),
            Err(e) => self.error(format!("Failed to encode {} payload: {}", kind, e)),
        }
    }

    pub fn info(&self, text: impl Into<String>) {
        self.emit(ProgressEvent::message(EventKind::Info, text));
    }

    pub fn dev(&self, text: impl Into<String>) {
        self.emit(ProgressEvent::message(EventKind::Dev, text));
    }

    pub fn warn(&self, text: impl Into<String>) {
        self.emit(ProgressEvent::message(EventKind::Warn, text));
    }

    pub fn error(&self, text: impl Into<String>) {
        self.emit(ProgressEvent::message(EventKind::Error, text));
    }

    pub fn success(&self, text: impl Into<String>) {
        self.emit(ProgressEvent::message(EventKind::Success, text));
    }

    pub fn channels(&self, channels: &[Channel]) {
        self.emit_payload(EventKind::Channels, channels);
    }

    pub fn scrape_result(&self, result: &ScrapeResult) {
        self.emit_payload(EventKind::ScrapeResult, result);
    }

    pub fn all_done(&self) {
        let id = self.task_id().to_string();
        self.emit(ProgressEvent::new(EventKind::AllDone, Value::String(id)));
    }

    pub fn download_ready(&self) {
        let id = self.task_id().to_string();
        self.emit(ProgressEvent::new(EventKind::DownloadReady, Value::String(id)));
    }

    /// Emit the terminal event. Only the first call has an effect.
    pub fn end_stream(&self, text: impl Into<String>) {
        self.finish(ProgressEvent::message(EventKind::EndStream, text));
    }

    /// True once the consumer dropped its stream; producers should wind down.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn dropped_events(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer side of a task's event sequence
pub struct ProgressStream {
    rx: mpsc::Receiver<ProgressEvent>,
    shared: Arc<Shared>,
    /// `end_stream` already picked up, held back until the queue is drained
    terminal: Option<ProgressEvent>,
    done: bool,
}

impl ProgressStream {
    pub fn task_id(&self) -> &str {
        &self.shared.task_id
    }

    /// Next event in emission order; `None` after `end_stream` was delivered.
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        if self.done {
            return None;
        }

        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    self.done = true;
                    let terminal = self.terminal.take().or_else(|| self.shared.take_terminal());
                    return Some(terminal.unwrap_or_else(|| {
                        warn!(task = %self.task_id(), "All producers gone without end_stream");
                        ProgressEvent::message(EventKind::EndStream, "Process ended abruptly.")
                    }));
                }
            }

            if let Some(terminal) = self.terminal.take().or_else(|| self.shared.take_terminal()) {
                // Events queued before end_stream are visible once the
                // terminal is; they go out first.
                match self.rx.try_recv() {
                    Ok(event) => {
                        self.terminal = Some(terminal);
                        return Some(event);
                    }
                    Err(_) => {
                        self.done = true;
                        return Some(terminal);
                    }
                }
            }

            tokio::select! {
                event = self.rx.recv() => {
                    if let Some(event) = event {
                        return Some(event);
                    }
                }
                _ = self.shared.notify.notified() => {}
            }
        }
    }

    /// Adapt into a [`Stream`] for transports.
    pub fn into_stream(self) -> impl Stream<Item = ProgressEvent> + Send {
        futures::stream::unfold(self, |mut stream| async move {
            stream.next().await.map(|event| (event, stream))
        })
    }
}
