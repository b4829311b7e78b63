//! In-memory location store backed by a remote JSON document.
//!
//! Mutations apply locally first and return a [`PersistTask`] that writes the
//! whole new document to the remote. A failed write only logs; the local
//! change stays.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use atlas_shared::maps::DEFAULT_MAP_ID;
use atlas_shared::models::{Location, LocationError, MapStore};
use serde_json::Value;
use thiserror::Error;

use crate::api::RemoteError;

/// Where the document lives.
#[allow(async_fn_in_trait)]
pub trait DocumentRemote: 'static {
    async fn fetch(&self) -> Result<Value, RemoteError>;
    async fn persist(&self, document: &MapStore) -> Result<(), RemoteError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadStatus {
    #[default]
    Loading,
    Ready,
    Error,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// Writing before the document is loaded would overwrite the remote with
    /// an empty placeholder.
    #[error("locations are not loaded ({0:?})")]
    NotReady(LoadStatus),
    #[error(transparent)]
    Invalid(#[from] LocationError),
}

#[derive(Default)]
struct StoreState {
    document: MapStore,
    status: LoadStatus,
    in_flight: usize,
    next_seq: u64,
    // Highest sequence number whose write has succeeded.
    persisted_seq: u64,
    closed: bool,
    observers: Vec<Rc<dyn Fn()>>,
}

fn notify(state: &RefCell<StoreState>) {
    let observers = state.borrow().observers.clone();
    for observer in observers {
        observer();
    }
}

/// Decrements the in-flight counter however the write ends, including when
/// the task is dropped unfinished.
struct SyncGuard {
    state: Rc<RefCell<StoreState>>,
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        {
            let mut s = self.state.borrow_mut();
            s.in_flight = s.in_flight.saturating_sub(1);
        }
        notify(&self.state);
    }
}

/// A pending write of one document snapshot.
#[must_use = "the document is only written when the task is awaited or spawned"]
pub struct PersistTask {
    seq: u64,
    future: Pin<Box<dyn Future<Output = ()>>>,
}

impl PersistTask {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl Future for PersistTask {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.future.as_mut().poll(cx)
    }
}

pub struct LocationStore<R: DocumentRemote> {
    remote: Rc<R>,
    state: Rc<RefCell<StoreState>>,
    default_map: String,
}

impl<R: DocumentRemote> Clone for LocationStore<R> {
    fn clone(&self) -> Self {
        LocationStore {
            remote: self.remote.clone(),
            state: self.state.clone(),
            default_map: self.default_map.clone(),
        }
    }
}

impl<R: DocumentRemote> PartialEq for LocationStore<R> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl<R: DocumentRemote> LocationStore<R> {
    pub fn new(remote: R) -> Self {
        LocationStore {
            remote: Rc::new(remote),
            state: Rc::new(RefCell::new(StoreState::default())),
            default_map: DEFAULT_MAP_ID.to_string(),
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Call `observer` after every change of the document, status or sync flag.
    pub fn subscribe(&self, observer: Rc<dyn Fn()>) {
        self.state.borrow_mut().observers.push(observer);
    }

    /// Stop accepting load results and drop all observers.
    pub fn close(&self) {
        let mut s = self.state.borrow_mut();
        s.closed = true;
        s.observers.clear();
    }

    pub fn status(&self) -> LoadStatus {
        self.state.borrow().status
    }

    pub fn is_syncing(&self) -> bool {
        self.state.borrow().in_flight > 0
    }

    pub fn persisted_seq(&self) -> u64 {
        self.state.borrow().persisted_seq
    }

    pub fn document(&self) -> MapStore {
        self.state.borrow().document.clone()
    }

    pub fn locations_for(&self, map_id: &str) -> Vec<Location> {
        self.state.borrow().document.locations_for(map_id).to_vec()
    }

    pub fn location(&self, map_id: &str, id: &str) -> Option<Location> {
        self.state.borrow().document.location(map_id, id).cloned()
    }

    /// Fetch the document once. Legacy flat arrays are migrated under the
    /// default map.
    pub async fn load(&self) {
        let fetched = self.remote.fetch().await;
        if self.state.borrow().closed {
            tracing::debug!("store closed before load finished, dropping result");
            return;
        }
        let parsed = fetched.and_then(|value| {
            MapStore::from_value(value, &self.default_map).map_err(RemoteError::from)
        });
        {
            let mut s = self.state.borrow_mut();
            match parsed {
                Ok(document) => {
                    tracing::info!(maps = document.entries().len(), "loaded locations");
                    s.document = document;
                    s.status = LoadStatus::Ready;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to load locations");
                    s.document = MapStore::default();
                    s.status = LoadStatus::Error;
                }
            }
        }
        notify(&self.state);
    }

    fn ensure_ready(&self) -> Result<(), StoreError> {
        match self.status() {
            LoadStatus::Ready => Ok(()),
            status => Err(StoreError::NotReady(status)),
        }
    }

    pub fn add(&self, map_id: &str, location: Location) -> Result<PersistTask, StoreError> {
        self.ensure_ready()?;
        let location = location.normalized();
        location.validate()?;
        Ok(self.commit(|doc| doc.with_added(map_id, location)))
    }

    /// Replace the record with the same id. Unknown ids change nothing but
    /// are still written.
    pub fn update(&self, map_id: &str, location: Location) -> Result<PersistTask, StoreError> {
        self.ensure_ready()?;
        let location = location.normalized();
        location.validate()?;
        Ok(self.commit(|doc| doc.with_updated(map_id, location)))
    }

    /// Apply label, link and type from `edited` onto the stored record,
    /// keeping its current coordinates.
    pub fn update_details(&self, map_id: &str, edited: Location) -> Result<PersistTask, StoreError> {
        let merged = match self.location(map_id, &edited.id) {
            Some(current) => Location {
                label: edited.label,
                link: edited.link,
                kind: edited.kind,
                ..current
            },
            None => edited,
        };
        self.update(map_id, merged)
    }

    pub fn remove(&self, map_id: &str, id: &str) -> Result<PersistTask, StoreError> {
        self.ensure_ready()?;
        Ok(self.commit(|doc| doc.with_removed(map_id, id)))
    }

    fn commit(&self, change: impl FnOnce(&MapStore) -> MapStore) -> PersistTask {
        let (snapshot, seq) = {
            let mut s = self.state.borrow_mut();
            let next = change(&s.document);
            s.document = next.clone();
            s.in_flight += 1;
            s.next_seq += 1;
            (next, s.next_seq)
        };
        notify(&self.state);

        let guard = SyncGuard {
            state: self.state.clone(),
        };
        let remote = self.remote.clone();
        let state = self.state.clone();
        let future = async move {
            let _guard = guard;
            match remote.persist(&snapshot).await {
                Ok(()) => {
                    let stale = {
                        let mut s = state.borrow_mut();
                        let stale = seq < s.persisted_seq;
                        s.persisted_seq = s.persisted_seq.max(seq);
                        stale
                    };
                    if stale {
                        tracing::warn!(seq, "older write finished last, remote may hold a stale document");
                    } else {
                        tracing::debug!(seq, "document persisted");
                    }
                }
                Err(e) => tracing::error!(seq, error = %e, "failed to persist locations"),
            }
        };
        PersistTask {
            seq,
            future: Box::pin(future),
        }
    }
}
