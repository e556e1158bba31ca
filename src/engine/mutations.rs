//! Write path: every mutation is validate → WAL append → apply → notify.
//! State is only ever changed by applying an event that has already been
//! made durable, so replay after a crash reconstructs exactly what callers
//! were acknowledged.

use std::sync::Arc;

use tokio::sync::RwLock;
use ulid::Ulid;

use super::classify::{now_ms, validate_span};
use super::queries::has_completed_booking;
use super::{Engine, EngineError};
use crate::limits::*;
use crate::model::*;

impl Engine {
    pub async fn create_user(&self, id: Ulid, name: String) -> Result<(), EngineError> {
        if self.store.contains_user(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        if self.store.user_count() >= MAX_USERS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many users"));
        }
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(EngineError::InvalidArgument(format!(
                "user name must be 1..={MAX_NAME_LEN} bytes"
            )));
        }
        let event = Event::UserCreated {
            id,
            name: name.clone(),
        };
        // Held across append + apply so a compaction snapshot sees either
        // neither or both
        let _users = self.user_ops.read().await;
        self.wal_append(&event).await?;
        self.store.insert_user(User { id, name });
        tracing::debug!(user_id = %id, "user created");
        Ok(())
    }

    /// Remove a user. Refused while the user still owns items or has
    /// bookings on record: their items' bookings would become permanently
    /// undecidable with the owner gone.
    pub async fn delete_user(&self, id: Ulid) -> Result<(), EngineError> {
        if !self.store.contains_user(&id) {
            return Err(EngineError::NotFound(id));
        }
        if !self.store.items_of_owner(&id).is_empty() {
            return Err(EngineError::InvalidState("user still owns items"));
        }
        if !self.store.bookings_of_booker(&id).is_empty() {
            return Err(EngineError::InvalidState("user still has bookings"));
        }
        let event = Event::UserDeleted { id };
        let _users = self.user_ops.read().await;
        self.wal_append(&event).await?;
        self.store.remove_user(&id);
        tracing::debug!(user_id = %id, "user deleted");
        Ok(())
    }

    pub async fn create_item(
        &self,
        id: Ulid,
        owner_id: Ulid,
        name: String,
        available: bool,
    ) -> Result<(), EngineError> {
        self.require_user(&owner_id)?;
        if self.store.contains_item(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        if self.store.item_count() >= MAX_ITEMS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many items"));
        }
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(EngineError::InvalidArgument(format!(
                "item name must be 1..={MAX_NAME_LEN} bytes"
            )));
        }
        let event = Event::ItemCreated {
            id,
            owner_id,
            name: name.clone(),
            available,
        };
        self.wal_append(&event).await?;
        let item = ItemState::new(id, owner_id, name, available);
        self.store.insert_item(id, owner_id, Arc::new(RwLock::new(item)));
        tracing::debug!(item_id = %id, owner_id = %owner_id, "item created");
        Ok(())
    }

    /// Toggle whether an item accepts new booking requests. Owner only.
    pub async fn set_item_available(
        &self,
        item_id: Ulid,
        actor_id: Ulid,
        available: bool,
    ) -> Result<(), EngineError> {
        self.require_user(&actor_id)?;
        let item = self
            .store
            .get_item(&item_id)
            .ok_or(EngineError::NotFound(item_id))?;
        let mut guard = item.write_owned().await;
        if guard.owner_id != actor_id {
            return Err(EngineError::Forbidden(
                "only the item owner can change availability",
            ));
        }
        if guard.available == available {
            return Ok(()); // idempotent, skip the WAL write
        }
        let event = Event::ItemAvailabilityChanged {
            id: item_id,
            available,
        };
        self.persist_and_apply(item_id, &mut guard, &event).await
    }

    /// Request a booking of an item for a time span. The booking starts
    /// life WAITING until the owner decides it.
    pub async fn request_booking(
        &self,
        id: Ulid,
        item_id: Ulid,
        booker_id: Ulid,
        span: Span,
    ) -> Result<BookingInfo, EngineError> {
        validate_span(&span)?;
        self.require_user(&booker_id)?;
        if self.store.item_for_booking(&id).is_some() {
            return Err(EngineError::AlreadyExists(id));
        }
        let item = self
            .store
            .get_item(&item_id)
            .ok_or(EngineError::NotFound(item_id))?;
        let mut guard = item.write_owned().await;
        if guard.owner_id == booker_id {
            return Err(EngineError::Forbidden("cannot book own item"));
        }
        if !guard.available {
            return Err(EngineError::InvalidState("item is not available"));
        }
        if guard.bookings.len() >= MAX_BOOKINGS_PER_ITEM {
            return Err(EngineError::LimitExceeded("too many bookings for item"));
        }
        let event = Event::BookingRequested {
            id,
            item_id,
            booker_id,
            span,
        };
        self.persist_and_apply(item_id, &mut guard, &event).await?;
        tracing::debug!(booking_id = %id, item_id = %item_id, "booking requested");
        let booking = guard
            .booking(id)
            .ok_or(EngineError::NotFound(id))?;
        Ok(BookingInfo::from_booking(item_id, booking))
    }

    /// Approve or reject a WAITING booking. Item-owner only, and only
    /// once: the status check and the write happen under the same item
    /// write lock, so two concurrent decisions cannot both succeed.
    pub async fn decide_booking(
        &self,
        booking_id: Ulid,
        actor_id: Ulid,
        approve: bool,
    ) -> Result<BookingInfo, EngineError> {
        self.require_user(&actor_id)?;
        let (item_id, mut guard) = self.resolve_booking_write(&booking_id).await?;
        let booking = guard
            .booking(booking_id)
            .ok_or(EngineError::NotFound(booking_id))?;
        if guard.owner_id != actor_id {
            return Err(EngineError::Forbidden(
                "only the item owner can approve or reject",
            ));
        }
        if booking.status != BookingStatus::Waiting {
            return Err(EngineError::InvalidState(
                "only a WAITING booking can be decided",
            ));
        }
        let event = Event::BookingDecided {
            id: booking_id,
            item_id,
            approved: approve,
        };
        self.persist_and_apply(item_id, &mut guard, &event).await?;
        tracing::debug!(booking_id = %booking_id, approved = approve, "booking decided");
        let booking = guard
            .booking(booking_id)
            .ok_or(EngineError::NotFound(booking_id))?;
        Ok(BookingInfo::from_booking(item_id, booking))
    }

    /// Leave a comment on an item. Only allowed after completing a
    /// booking: an APPROVED booking of this item that has already ended.
    pub async fn add_comment(
        &self,
        id: Ulid,
        item_id: Ulid,
        author_id: Ulid,
        text: String,
    ) -> Result<CommentInfo, EngineError> {
        self.require_user(&author_id)?;
        if text.is_empty() || text.len() > MAX_COMMENT_LEN {
            return Err(EngineError::InvalidArgument(format!(
                "comment must be 1..={MAX_COMMENT_LEN} bytes"
            )));
        }
        let item = self
            .store
            .get_item(&item_id)
            .ok_or(EngineError::NotFound(item_id))?;
        let mut guard = item.write_owned().await;
        let now = now_ms();
        if !has_completed_booking(&guard.bookings, author_id, now) {
            return Err(EngineError::Forbidden(
                "user has not completed a booking of this item",
            ));
        }
        if guard.comments.len() >= MAX_COMMENTS_PER_ITEM {
            return Err(EngineError::LimitExceeded("too many comments for item"));
        }
        let event = Event::CommentAdded {
            id,
            item_id,
            author_id,
            text: text.clone(),
            created_at: now,
        };
        self.persist_and_apply(item_id, &mut guard, &event).await?;
        Ok(CommentInfo {
            id,
            item_id,
            author_id,
            text,
            created_at: now,
        })
    }

    /// Rewrite the WAL as a minimal event snapshot of current state.
    /// Replaced bookings keep their final status: a decided booking
    /// compacts to a request plus a decision, a WAITING one to just the
    /// request.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _compacting = self.compact_lock.lock().await;

        // Mark the snapshot start before reading any state: the writer
        // records every append acked from here on and folds it into the
        // compact file, so a mutation landing mid-snapshot is not lost.
        self.wal_tx
            .send(super::WalCommand::CompactBegin)
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;

        let mut events = Vec::new();
        {
            let _users = self.user_ops.write().await;
            for user in self.store.all_users() {
                events.push(Event::UserCreated {
                    id: user.id,
                    name: user.name,
                });
            }
        }
        for item_id in self.store.all_item_ids() {
            let Some(item) = self.store.get_item(&item_id) else {
                continue;
            };
            let guard = item.read().await;
            events.push(Event::ItemCreated {
                id: guard.id,
                owner_id: guard.owner_id,
                name: guard.name.clone(),
                available: guard.available,
            });
            for b in &guard.bookings {
                events.push(Event::BookingRequested {
                    id: b.id,
                    item_id: guard.id,
                    booker_id: b.booker_id,
                    span: b.span,
                });
                match b.status {
                    BookingStatus::Waiting => {}
                    BookingStatus::Approved => events.push(Event::BookingDecided {
                        id: b.id,
                        item_id: guard.id,
                        approved: true,
                    }),
                    BookingStatus::Rejected => events.push(Event::BookingDecided {
                        id: b.id,
                        item_id: guard.id,
                        approved: false,
                    }),
                }
            }
            for c in &guard.comments {
                events.push(Event::CommentAdded {
                    id: c.id,
                    item_id: guard.id,
                    author_id: c.author_id,
                    text: c.text.clone(),
                    created_at: c.created_at,
                });
            }
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.wal_tx
            .send(super::WalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        tracing::info!("WAL compacted");
        Ok(())
    }
}
