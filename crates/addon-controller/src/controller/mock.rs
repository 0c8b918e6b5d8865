//! Test doubles for the controller seams.

use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::time::Duration;

use error_stack::Report;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::sync::Semaphore;

use crate::controller::source::ObjectStream;
use crate::controller::ControllerError;
use crate::controller::ObjectKey;
use crate::controller::Reconciler;
use crate::controller::SourceWatcher;
use crate::controller::Trigger;
use crate::controller::WatchedResource;

type SourceEvent = Result<ObjectKey, String>;

/// Source watcher fed by the test through [`MockSourceWatcher::publish`].
pub(crate) struct MockSourceWatcher {
    channels: Mutex<HashMap<WatchedResource, broadcast::Sender<SourceEvent>>>,
    watches: Mutex<HashMap<WatchedResource, usize>>,
}

impl MockSourceWatcher {
    pub(crate) fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            watches: Mutex::new(HashMap::new()),
        }
    }

    fn sender(&self, resource: WatchedResource) -> broadcast::Sender<SourceEvent> {
        self.channels
            .lock()
            .unwrap()
            .entry(resource)
            .or_insert_with(|| broadcast::channel(16).0)
            .clone()
    }

    pub(crate) fn publish(&self, resource: WatchedResource, object: ObjectKey) {
        let _ = self.sender(resource).send(Ok(object));
    }

    pub(crate) fn fail(&self, resource: WatchedResource, message: &str) {
        let _ = self.sender(resource).send(Err(message.to_string()));
    }

    pub(crate) fn watch_count(&self, resource: WatchedResource) -> usize {
        self.watches
            .lock()
            .unwrap()
            .get(&resource)
            .copied()
            .unwrap_or_default()
    }

    pub(crate) fn total_watches(&self) -> usize {
        self.watches.lock().unwrap().values().sum()
    }

    pub(crate) async fn wait_for_watches(&self, count: usize) {
        while self.total_watches() < count {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

impl SourceWatcher for MockSourceWatcher {
    fn watch(&self, resource: WatchedResource) -> ObjectStream {
        *self.watches.lock().unwrap().entry(resource).or_default() += 1;
        let rx = self.sender(resource).subscribe();

        futures::stream::unfold(rx, move |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(Ok(object)) => return Some((Ok(object), rx)),
                    Ok(Err(message)) => {
                        let report =
                            Report::new(ControllerError::WatchFailed { resource, message });
                        return Some((Err(report), rx));
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}

/// Reconciler that forwards every trigger to the test.
pub(crate) struct RecordingReconciler {
    tx: mpsc::UnboundedSender<Trigger>,
    fail_for: Option<String>,
}

impl RecordingReconciler {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<Trigger>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, fail_for: None }, rx)
    }

    /// Same as [`RecordingReconciler::new`], but reconciling `name` fails.
    pub(crate) fn failing_for(name: &str) -> (Self, mpsc::UnboundedReceiver<Trigger>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let reconciler = Self {
            tx,
            fail_for: Some(name.to_string()),
        };
        (reconciler, rx)
    }
}

#[async_trait::async_trait]
impl Reconciler for RecordingReconciler {
    async fn reconcile(&self, trigger: Trigger) -> Result<(), Report<ControllerError>> {
        let failed = self.fail_for.as_deref() == Some(trigger.object.name.as_str());
        let controller = trigger.controller;
        let name = trigger.object.name.clone();
        let _ = self.tx.send(trigger);

        if failed {
            return Err(Report::new(ControllerError::ReconcileFailed {
                controller,
                name,
                message: "scripted failure".to_string(),
            }));
        }
        Ok(())
    }
}

/// Reconciler that blocks every call until the test releases it.
pub(crate) struct GatedReconciler {
    gate: Semaphore,
    started: AtomicUsize,
    finished: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl GatedReconciler {
    pub(crate) fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub(crate) fn release(&self, count: usize) {
        self.gate.add_permits(count);
    }

    pub(crate) fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub(crate) async fn wait_for_started(&self, count: usize) {
        while self.started() < count {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    pub(crate) async fn wait_for_finished(&self, count: usize) {
        while self.finished.load(Ordering::SeqCst) < count {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

#[async_trait::async_trait]
impl Reconciler for GatedReconciler {
    async fn reconcile(&self, _trigger: Trigger) -> Result<(), Report<ControllerError>> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);

        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
