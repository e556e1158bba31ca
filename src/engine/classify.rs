//! Temporal classification of bookings. One predicate, parameterized by
//! an explicit `now`, so every caller and every test agrees on the same
//! CURRENT/PAST/FUTURE partition.

use crate::model::*;

use super::EngineError;

pub fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

pub(crate) fn validate_span(span: &Span) -> Result<(), EngineError> {
    use crate::limits::*;
    if span.start >= span.end {
        return Err(EngineError::InvalidArgument(
            "booking start must be before end".into(),
        ));
    }
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    Ok(())
}

/// Does `booking` fall under `filter` at instant `now`?
///
/// For a fixed `now`, CURRENT (`start <= now && end >= now`),
/// PAST (`end < now`) and FUTURE (`start > now`) partition every booking:
/// each one matches exactly one of the three.
pub fn matches_filter(filter: StateFilter, booking: &Booking, now: Ms) -> bool {
    match filter {
        StateFilter::All => true,
        StateFilter::Current => booking.span.start <= now && booking.span.end >= now,
        StateFilter::Past => booking.span.end < now,
        StateFilter::Future => booking.span.start > now,
        StateFilter::Waiting => booking.status == BookingStatus::Waiting,
        StateFilter::Rejected => booking.status == BookingStatus::Rejected,
    }
}

/// Page window for a listing: page number is `offset / limit` (rounded
/// down), page size is `limit`. Callers guarantee `limit >= 1`.
pub fn page_bounds(offset: usize, limit: usize) -> (usize, usize) {
    debug_assert!(limit >= 1, "page_bounds requires limit >= 1");
    let page = offset / limit;
    (page * limit, limit)
}

/// Sort descending by start, apply the filter, slice out one page.
pub fn filter_sort_page(
    mut bookings: Vec<(ulid::Ulid, Booking)>,
    filter: StateFilter,
    now: Ms,
    offset: usize,
    limit: usize,
) -> Vec<BookingInfo> {
    bookings.retain(|(_, b)| matches_filter(filter, b, now));
    bookings.sort_by(|a, b| b.1.span.start.cmp(&a.1.span.start));
    let (skip, take) = page_bounds(offset, limit);
    bookings
        .into_iter()
        .skip(skip)
        .take(take)
        .map(|(item_id, b)| BookingInfo::from_booking(item_id, &b))
        .collect()
}
