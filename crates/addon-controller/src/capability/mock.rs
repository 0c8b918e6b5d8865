//! Test doubles for the capability seams.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use error_stack::Report;
use futures::StreamExt;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinitionNames;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinitionSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::capability::install_watcher::CrdStream;
use crate::capability::CapabilityDescriptor;
use crate::capability::CapabilityError;
use crate::capability::CrdEventSource;
use crate::capability::PresenceProbe;
use crate::capability::PresenceResult;
use crate::capability::RestartTrigger;

/// Scripted probe outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scripted {
    Present,
    Absent,
    Transient,
    /// Never answers.
    Hang,
}

/// Probe answering from a per-CRD script. The last entry repeats forever.
#[derive(Default)]
pub(crate) struct ScriptedProbe {
    scripts: Mutex<HashMap<&'static str, VecDeque<Scripted>>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl ScriptedProbe {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script(self, crd: &'static str, outcomes: Vec<Scripted>) -> Self {
        self.scripts.lock().unwrap().insert(crd, outcomes.into());
        self
    }

    pub(crate) fn calls(&self, crd: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(crd)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl PresenceProbe for ScriptedProbe {
    async fn probe(&self, descriptor: &CapabilityDescriptor) -> PresenceResult {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(descriptor.signaling_crd)
            .or_default() += 1;

        let outcome = {
            let mut scripts = self.scripts.lock().unwrap();
            let script = scripts
                .get_mut(descriptor.signaling_crd)
                .expect("no script for probed CRD");
            if script.len() > 1 {
                script.pop_front().expect("script is not empty")
            } else {
                *script.front().expect("script must not be empty")
            }
        };

        match outcome {
            Scripted::Present => PresenceResult::Present,
            Scripted::Absent => PresenceResult::Absent,
            Scripted::Hang => std::future::pending().await,
            Scripted::Transient => {
                PresenceResult::TransientError(Report::new(CapabilityError::ProbeFailed {
                    crd: descriptor.signaling_crd.to_string(),
                }))
            }
        }
    }
}

type CrdEvent = Result<CustomResourceDefinition, String>;

/// CRD event source fed by the test through [`ChannelCrdEvents::publish`].
///
/// Every subscription first replays the CRDs passed to
/// [`ChannelCrdEvents::with_existing`], like the initial list of a real watch.
pub(crate) struct ChannelCrdEvents {
    tx: broadcast::Sender<CrdEvent>,
    existing: Vec<CustomResourceDefinition>,
    subscriptions: AtomicUsize,
}

impl ChannelCrdEvents {
    pub(crate) fn new() -> Self {
        Self::with_existing(Vec::new())
    }

    pub(crate) fn with_existing(existing: Vec<CustomResourceDefinition>) -> Self {
        Self {
            tx: broadcast::channel(16).0,
            existing,
            subscriptions: AtomicUsize::new(0),
        }
    }

    pub(crate) fn publish(&self, crd: CustomResourceDefinition) {
        let _ = self.tx.send(Ok(crd));
    }

    pub(crate) fn fail(&self, message: &str) {
        let _ = self.tx.send(Err(message.to_string()));
    }

    pub(crate) fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

impl CrdEventSource for ChannelCrdEvents {
    fn crd_events(&self) -> CrdStream {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let existing = futures::stream::iter(self.existing.clone().into_iter().map(Ok));
        let live = futures::stream::unfold(self.tx.subscribe(), |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(Ok(crd)) => return Some((Ok(crd), rx)),
                    Ok(Err(message)) => {
                        let report = Report::new(CapabilityError::WatchFailed { message });
                        return Some((Err(report), rx));
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return None,
                }
            }
        });

        existing.chain(live).boxed()
    }
}

/// Restart trigger that only counts.
#[derive(Default)]
pub(crate) struct CountingRestart {
    count: AtomicUsize,
}

impl CountingRestart {
    pub(crate) fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl RestartTrigger for CountingRestart {
    fn trigger_restart(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Build a CRD object named `<plural>.<group>`.
pub(crate) fn crd(plural: &str, group: &str) -> CustomResourceDefinition {
    CustomResourceDefinition {
        metadata: ObjectMeta {
            name: Some(format!("{plural}.{group}")),
            ..Default::default()
        },
        spec: CustomResourceDefinitionSpec {
            group: group.to_string(),
            names: CustomResourceDefinitionNames {
                plural: plural.to_string(),
                kind: plural.to_string(),
                ..Default::default()
            },
            scope: "Namespaced".to_string(),
            ..Default::default()
        },
        status: None,
    }
}
