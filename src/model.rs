use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only time type.
pub type Ms = i64;

/// Booking interval `[start, end]`. Start is strictly before end,
/// enforced where the interval enters the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }
}

/// Persisted booking status. WAITING is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Waiting,
    Approved,
    Rejected,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Waiting => "WAITING",
            BookingStatus::Approved => "APPROVED",
            BookingStatus::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query-time classification. CURRENT/PAST/FUTURE are temporal views
/// relative to an explicit `now`; they are never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateFilter {
    All,
    Current,
    Past,
    Future,
    Waiting,
    Rejected,
}

impl StateFilter {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ALL" => Some(StateFilter::All),
            "CURRENT" => Some(StateFilter::Current),
            "PAST" => Some(StateFilter::Past),
            "FUTURE" => Some(StateFilter::Future),
            "WAITING" => Some(StateFilter::Waiting),
            "REJECTED" => Some(StateFilter::Rejected),
            _ => None,
        }
    }
}

/// A reservation of an item for an interval. Lives inside its item's
/// state; the booker is referenced, never owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub id: Ulid,
    pub booker_id: Ulid,
    pub span: Span,
    pub status: BookingStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: Ulid,
    pub author_id: Ulid,
    pub text: String,
    pub created_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Ulid,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ItemState {
    pub id: Ulid,
    pub owner_id: Ulid,
    pub name: String,
    /// Whether new booking requests are accepted.
    pub available: bool,
    /// All bookings of this item, sorted by `span.start`.
    pub bookings: Vec<Booking>,
    pub comments: Vec<Comment>,
}

impl ItemState {
    pub fn new(id: Ulid, owner_id: Ulid, name: String, available: bool) -> Self {
        Self {
            id,
            owner_id,
            name,
            available,
            bookings: Vec::new(),
            comments: Vec::new(),
        }
    }

    /// Insert a booking maintaining sort order by span.start.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.span.start, |b| b.span.start)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    pub fn booking(&self, id: Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    pub fn booking_mut(&mut self, id: Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    UserCreated {
        id: Ulid,
        name: String,
    },
    UserDeleted {
        id: Ulid,
    },
    ItemCreated {
        id: Ulid,
        owner_id: Ulid,
        name: String,
        available: bool,
    },
    ItemAvailabilityChanged {
        id: Ulid,
        available: bool,
    },
    BookingRequested {
        id: Ulid,
        item_id: Ulid,
        booker_id: Ulid,
        span: Span,
    },
    BookingDecided {
        id: Ulid,
        item_id: Ulid,
        approved: bool,
    },
    CommentAdded {
        id: Ulid,
        item_id: Ulid,
        author_id: Ulid,
        text: String,
        created_at: Ms,
    },
}

// ── Query result types ───────────────────────────────────────────

/// Minimal booking reference exposed by availability summaries.
/// Deliberately just ids — unrelated booking detail never leaks here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingRef {
    pub booking_id: Ulid,
    pub booker_id: Ulid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingInfo {
    pub id: Ulid,
    pub item_id: Ulid,
    pub booker_id: Ulid,
    pub start: Ms,
    pub end: Ms,
    pub status: BookingStatus,
}

impl BookingInfo {
    pub fn from_booking(item_id: Ulid, b: &Booking) -> Self {
        Self {
            id: b.id,
            item_id,
            booker_id: b.booker_id,
            start: b.span.start,
            end: b.span.end,
            status: b.status,
        }
    }
}

/// Derived last/next summary for one item. Computed on read, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemAvailability {
    pub item_id: Ulid,
    pub last: Option<BookingRef>,
    pub next: Option<BookingRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInfo {
    pub id: Ulid,
    pub owner_id: Ulid,
    pub name: String,
    pub available: bool,
    pub last: Option<BookingRef>,
    pub next: Option<BookingRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentInfo {
    pub id: Ulid,
    pub item_id: Ulid,
    pub author_id: Ulid,
    pub text: String,
    pub created_at: Ms,
}
