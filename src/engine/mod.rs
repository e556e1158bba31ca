mod availability;
mod classify;
mod error;
mod mutations;
mod queries;
mod store;
#[cfg(test)]
mod tests;

pub use availability::{last_booking, next_booking, summarize};
pub use classify::{filter_sort_page, matches_filter, now_ms, page_bounds};
pub use error::EngineError;
pub use store::{InMemoryStore, SharedItemState};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    /// Marks the start of a compaction snapshot. Every append acked after
    /// this marker is recorded and folded into the next Compact, so a
    /// write that lands mid-snapshot survives the file swap.
    CompactBegin,
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    // Appends acked since the last CompactBegin marker, None outside a
    // snapshot window.
    let mut tail: Option<Vec<Event>> = None;
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            commit_batch(&mut wal, &mut batch, &mut tail);
                            handle_non_append(&mut wal, other, &mut tail);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    commit_batch(&mut wal, &mut batch, &mut tail);
                }
            }
            other => handle_non_append(&mut wal, other, &mut tail),
        }
    }
}

fn commit_batch(
    wal: &mut Wal,
    batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>,
    tail: &mut Option<Vec<Event>>,
) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    if result.is_ok() {
        if let Some(tail) = tail.as_mut() {
            tail.extend(batch.iter().map(|(e, _)| e.clone()));
        }
    }
    respond_batch(batch, &result);
}

fn flush_batch(
    wal: &mut Wal,
    batch: &mut [(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand, tail: &mut Option<Vec<Event>>) {
    match cmd {
        WalCommand::CompactBegin => *tail = Some(Vec::new()),
        WalCommand::Compact {
            mut events,
            response,
        } => {
            // Acked writes that landed while the snapshot was being taken.
            // Replay deduplicates, so an event present in both the snapshot
            // and the tail applies once.
            if let Some(extra) = tail.take() {
                events.extend(extra);
            }
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// The booking engine for one tenant: in-memory state, WAL durability,
/// event broadcast.
pub struct Engine {
    pub(super) store: InMemoryStore,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    /// Item mutations serialize against compaction through the per-item
    /// locks; the user registry has no such lock, so user mutations hold
    /// this across append + apply and the snapshot takes the write side.
    pub(super) user_ops: RwLock<()>,
    /// At most one compaction in flight; a second CompactBegin would
    /// reset the writer's tail under the first snapshot.
    compact_lock: tokio::sync::Mutex<()>,
}

/// Extract the item id from an item-scoped event (None for user and
/// item-creation events, which apply at the map level).
fn event_item_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::ItemAvailabilityChanged { id, .. } => Some(*id),
        Event::BookingRequested { item_id, .. }
        | Event::BookingDecided { item_id, .. }
        | Event::CommentAdded { item_id, .. } => Some(*item_id),
        Event::UserCreated { .. } | Event::UserDeleted { .. } | Event::ItemCreated { .. } => None,
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> std::io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            store: InMemoryStore::new(),
            wal_tx,
            notify,
            user_ops: RwLock::new(()),
            compact_lock: tokio::sync::Mutex::new(()),
        };

        // Replay events — we're the sole owner of these Arcs, so try_write
        // always succeeds instantly (no contention). Never use blocking_write
        // here because this may run inside an async context (e.g. lazy tenant
        // creation).
        for event in &events {
            match event {
                Event::UserCreated { id, name } => {
                    engine.store.insert_user(User {
                        id: *id,
                        name: name.clone(),
                    });
                }
                Event::UserDeleted { id } => {
                    engine.store.remove_user(id);
                }
                Event::ItemCreated {
                    id,
                    owner_id,
                    name,
                    available,
                } => {
                    // A compacted WAL can repeat an event (snapshot + tail)
                    if engine.store.contains_item(id) {
                        continue;
                    }
                    let item = ItemState::new(*id, *owner_id, name.clone(), *available);
                    engine
                        .store
                        .insert_item(*id, *owner_id, Arc::new(RwLock::new(item)));
                }
                other => {
                    if let Some(item_id) = event_item_id(other)
                        && let Some(item) = engine.store.get_item(&item_id)
                    {
                        let mut guard = item.try_write().expect("replay: uncontended write");
                        engine.store.apply_event(&mut guard, other);
                    }
                }
            }
        }

        Ok(engine)
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_item(&self, id: &Ulid) -> Option<SharedItemState> {
        self.store.get_item(id)
    }

    pub fn get_user(&self, id: &Ulid) -> Option<User> {
        self.store.get_user(id)
    }

    /// WAL-append + apply + notify in one call. Eliminates the repeated 3-line pattern.
    pub(super) async fn persist_and_apply(
        &self,
        item_id: Ulid,
        item: &mut ItemState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.store.apply_event(item, event);
        self.notify.send(item_id, event);
        Ok(())
    }

    /// Lookup booking → item, get item, acquire write lock. The returned
    /// guard is the critical section for the status compare-and-set.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<ItemState>), EngineError> {
        let item_id = self
            .store
            .item_for_booking(booking_id)
            .ok_or(EngineError::NotFound(*booking_id))?;
        let item = self
            .store
            .get_item(&item_id)
            .ok_or(EngineError::NotFound(item_id))?;
        let guard = item.write_owned().await;
        Ok((item_id, guard))
    }

    /// NotFound unless the user exists — the authorization precondition
    /// shared by every listing operation.
    pub(super) fn require_user(&self, user_id: &Ulid) -> Result<(), EngineError> {
        if self.store.contains_user(user_id) {
            Ok(())
        } else {
            Err(EngineError::NotFound(*user_id))
        }
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
