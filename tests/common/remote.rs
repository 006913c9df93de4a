//! Scripted remote API for integration tests
//!
//! Accepts every mutation unless its target id has been marked as failing.
//! Optionally parks each dispatch on a gate so tests can act while a pass
//! is in flight.

use complisite_sync::client::error::DispatchError;
use complisite_sync::client::remote_api::RemoteApi;
use complisite_sync::shared::{ChecklistPayload, CommentPayload, MutationKind, PhotoPayload};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

/// One dispatch seen by the remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub kind: MutationKind,
    pub target: String,
}

#[derive(Debug, Default)]
pub struct DispatchGate {
    pub entered: Notify,
    pub release: Notify,
}

#[derive(Debug)]
pub struct ScriptedRemote {
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<RemoteCall>>,
    reachable: AtomicBool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    gate: Option<DispatchGate>,
}

impl Default for ScriptedRemote {
    fn default() -> Self {
        Self {
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            reachable: AtomicBool::new(true),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            gate: None,
        }
    }
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every dispatch waits on `gate().release` after signalling `entered`
    pub fn gated() -> Self {
        Self {
            gate: Some(DispatchGate::default()),
            ..Self::default()
        }
    }

    pub fn gate(&self) -> &DispatchGate {
        self.gate.as_ref().expect("remote was not built with ScriptedRemote::gated")
    }

    pub fn fail_target(&self, target: &str) {
        self.failing.lock().unwrap().insert(target.to_string());
    }

    pub fn heal_target(&self, target: &str) {
        self.failing.lock().unwrap().remove(target);
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn targets(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.target).collect()
    }

    /// Highest number of dispatches ever running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn respond(&self, kind: MutationKind, target: &str) -> BoxFuture<'_, Result<(), DispatchError>> {
        let target = target.to_string();
        async move {
            self.calls.lock().unwrap().push(RemoteCall {
                kind,
                target: target.clone(),
            });
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(running, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.entered.notify_one();
                gate.release.notified().await;
            } else {
                tokio::task::yield_now().await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let fails = self.failing.lock().unwrap().contains(&target);
            if fails {
                Err(DispatchError::rejected(503, format!("{} unavailable", target)))
            } else {
                Ok(())
            }
        }
        .boxed()
    }
}

impl RemoteApi for ScriptedRemote {
    fn sync_checklist<'a>(
        &'a self,
        payload: &'a ChecklistPayload,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        self.respond(MutationKind::Checklist, &payload.checklist_item_id)
    }

    fn upload_photo<'a>(
        &'a self,
        photo: &'a PhotoPayload,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        self.respond(MutationKind::Photo, &photo.checklist_item_id)
    }

    fn sync_comment<'a>(
        &'a self,
        payload: &'a CommentPayload,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        self.respond(MutationKind::Comment, &payload.target_id)
    }

    fn ping(&self) -> BoxFuture<'_, bool> {
        let reachable = self.reachable.load(Ordering::SeqCst);
        async move { reachable }.boxed()
    }
}
