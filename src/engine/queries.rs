//! Read path. Every query takes an explicit `now` so results are stable
//! within one request and testable without clock control.

use std::collections::HashMap;

use ulid::Ulid;

use super::classify::filter_sort_page;
use super::{summarize, Engine, EngineError};
use crate::model::*;

/// Has `user_id` an APPROVED booking of this item that already ended?
/// This is the comment-eligibility predicate.
pub(super) fn has_completed_booking(bookings: &[Booking], user_id: Ulid, now: Ms) -> bool {
    bookings.iter().any(|b| {
        b.booker_id == user_id && b.status == BookingStatus::Approved && b.span.end < now
    })
}

impl Engine {
    /// Fetch one booking. Visible only to the booker and the item owner;
    /// anyone else gets NotFound, never Forbidden, so the booking's
    /// existence does not leak.
    pub async fn booking_by_id(
        &self,
        booking_id: Ulid,
        requester_id: Ulid,
    ) -> Result<BookingInfo, EngineError> {
        self.require_user(&requester_id)?;
        let item_id = self
            .store
            .item_for_booking(&booking_id)
            .ok_or(EngineError::NotFound(booking_id))?;
        let item = self
            .store
            .get_item(&item_id)
            .ok_or(EngineError::NotFound(item_id))?;
        let guard = item.read().await;
        let booking = guard
            .booking(booking_id)
            .ok_or(EngineError::NotFound(booking_id))?;
        if requester_id != booking.booker_id && requester_id != guard.owner_id {
            return Err(EngineError::NotFound(booking_id));
        }
        Ok(BookingInfo::from_booking(item_id, booking))
    }

    /// All bookings across every item the owner owns, filtered and paged.
    pub async fn bookings_by_owner(
        &self,
        owner_id: Ulid,
        filter: StateFilter,
        now: Ms,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<BookingInfo>, EngineError> {
        self.require_user(&owner_id)?;
        let mut gathered = Vec::new();
        for item_id in self.store.items_of_owner(&owner_id) {
            let Some(item) = self.store.get_item(&item_id) else {
                continue;
            };
            let guard = item.read().await;
            gathered.extend(guard.bookings.iter().map(|b| (item_id, b.clone())));
        }
        Ok(filter_sort_page(gathered, filter, now, offset, limit))
    }

    /// All bookings made by one user, filtered and paged. Groups the
    /// booking ids by item so each item lock is taken once.
    pub async fn bookings_by_booker(
        &self,
        booker_id: Ulid,
        filter: StateFilter,
        now: Ms,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<BookingInfo>, EngineError> {
        self.require_user(&booker_id)?;
        let mut by_item: HashMap<Ulid, Vec<Ulid>> = HashMap::new();
        for booking_id in self.store.bookings_of_booker(&booker_id) {
            if let Some(item_id) = self.store.item_for_booking(&booking_id) {
                by_item.entry(item_id).or_default().push(booking_id);
            }
        }
        let mut gathered = Vec::new();
        for (item_id, booking_ids) in by_item {
            let Some(item) = self.store.get_item(&item_id) else {
                continue;
            };
            let guard = item.read().await;
            for id in booking_ids {
                if let Some(b) = guard.booking(id) {
                    gathered.push((item_id, b.clone()));
                }
            }
        }
        Ok(filter_sort_page(gathered, filter, now, offset, limit))
    }

    /// The owner's item listing, each item annotated with its last and
    /// next approved booking.
    pub async fn items_by_owner(
        &self,
        owner_id: Ulid,
        now: Ms,
    ) -> Result<Vec<ItemInfo>, EngineError> {
        self.require_user(&owner_id)?;
        let mut out = Vec::new();
        for item_id in self.store.items_of_owner(&owner_id) {
            let Some(item) = self.store.get_item(&item_id) else {
                continue;
            };
            let guard = item.read().await;
            let summary = summarize(item_id, &guard.bookings, now);
            out.push(ItemInfo {
                id: guard.id,
                owner_id: guard.owner_id,
                name: guard.name.clone(),
                available: guard.available,
                last: summary.last,
                next: summary.next,
            });
        }
        out.sort_by_key(|i| i.id);
        Ok(out)
    }

    /// Bulk last/next summary. One read lock per distinct item; ids that
    /// resolve to no item produce an empty summary rather than an error,
    /// so one stale id cannot fail a whole listing page.
    pub async fn availability_for_items(
        &self,
        item_ids: &[Ulid],
        now: Ms,
    ) -> Vec<ItemAvailability> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::with_capacity(item_ids.len());
        for &item_id in item_ids {
            if !seen.insert(item_id) {
                continue;
            }
            match self.store.get_item(&item_id) {
                Some(item) => {
                    let guard = item.read().await;
                    out.push(summarize(item_id, &guard.bookings, now));
                }
                None => out.push(ItemAvailability {
                    item_id,
                    last: None,
                    next: None,
                }),
            }
        }
        out
    }

    /// May `user_id` comment on `item_id` right now?
    pub async fn can_comment(
        &self,
        user_id: Ulid,
        item_id: Ulid,
        now: Ms,
    ) -> Result<bool, EngineError> {
        self.require_user(&user_id)?;
        let item = self
            .store
            .get_item(&item_id)
            .ok_or(EngineError::NotFound(item_id))?;
        let guard = item.read().await;
        Ok(has_completed_booking(&guard.bookings, user_id, now))
    }
}
