//! Last/next booking selection — the derived availability summary shown
//! on item listings.
//!
//! Only APPROVED bookings are eligible on either side: `last` is the
//! approved booking with the greatest end at or before `now`, `next` the
//! approved booking with the smallest start after `now`. WAITING and
//! REJECTED bookings never surface here.

use crate::model::*;

/// The completed-or-completing side: max `end` with `end <= now`.
pub fn last_booking(bookings: &[Booking], now: Ms) -> Option<BookingRef> {
    bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Approved && b.span.end <= now)
        .max_by_key(|b| b.span.end)
        .map(|b| BookingRef {
            booking_id: b.id,
            booker_id: b.booker_id,
        })
}

/// The upcoming side: min `start` with `start > now`.
pub fn next_booking(bookings: &[Booking], now: Ms) -> Option<BookingRef> {
    bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Approved && b.span.start > now)
        .min_by_key(|b| b.span.start)
        .map(|b| BookingRef {
            booking_id: b.id,
            booker_id: b.booker_id,
        })
}

/// Both sides in one pass over an item's bookings.
pub fn summarize(item_id: ulid::Ulid, bookings: &[Booking], now: Ms) -> ItemAvailability {
    ItemAvailability {
        item_id,
        last: last_booking(bookings, now),
        next: next_booking(bookings, now),
    }
}
