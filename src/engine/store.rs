use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;

pub type SharedItemState = Arc<RwLock<ItemState>>;

/// In-memory state: items (each owning its bookings and comments), the
/// user registry, and the reverse indexes the query paths need.
pub struct InMemoryStore {
    items: DashMap<Ulid, SharedItemState>,
    users: DashMap<Ulid, User>,
    /// Reverse lookup: booking id → item id.
    booking_to_item: DashMap<Ulid, Ulid>,
    /// Owner → item ids, for O(1) owner-scoped listings.
    owner_items: DashMap<Ulid, Vec<Ulid>>,
    /// Booker → booking ids, for booker-scoped listings.
    booker_bookings: DashMap<Ulid, Vec<Ulid>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            items: DashMap::new(),
            users: DashMap::new(),
            booking_to_item: DashMap::new(),
            owner_items: DashMap::new(),
            booker_bookings: DashMap::new(),
        }
    }

    // ── Users ────────────────────────────────────────────────

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn contains_user(&self, id: &Ulid) -> bool {
        self.users.contains_key(id)
    }

    pub fn get_user(&self, id: &Ulid) -> Option<User> {
        self.users.get(id).map(|e| e.value().clone())
    }

    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn remove_user(&self, id: &Ulid) -> Option<User> {
        self.users.remove(id).map(|(_, u)| u)
    }

    pub fn all_users(&self) -> Vec<User> {
        self.users.iter().map(|e| e.value().clone()).collect()
    }

    // ── Items ────────────────────────────────────────────────

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn contains_item(&self, id: &Ulid) -> bool {
        self.items.contains_key(id)
    }

    pub fn get_item(&self, id: &Ulid) -> Option<SharedItemState> {
        self.items.get(id).map(|e| e.value().clone())
    }

    pub fn insert_item(&self, id: Ulid, owner_id: Ulid, state: SharedItemState) {
        self.items.insert(id, state);
        self.owner_items.entry(owner_id).or_default().push(id);
    }

    pub fn all_item_ids(&self) -> Vec<Ulid> {
        self.items.iter().map(|e| *e.key()).collect()
    }

    pub fn items_of_owner(&self, owner_id: &Ulid) -> Vec<Ulid> {
        self.owner_items
            .get(owner_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    // ── Booking indexes ──────────────────────────────────────

    pub fn item_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_to_item.get(booking_id).map(|e| *e.value())
    }

    pub fn bookings_of_booker(&self, booker_id: &Ulid) -> Vec<Ulid> {
        self.booker_bookings
            .get(booker_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    fn index_booking(&self, booking_id: Ulid, item_id: Ulid, booker_id: Ulid) {
        self.booking_to_item.insert(booking_id, item_id);
        self.booker_bookings
            .entry(booker_id)
            .or_default()
            .push(booking_id);
    }

    // ── Event application ────────────────────────────────────

    /// Apply an item-scoped event to an ItemState (caller holds the lock)
    /// and keep the reverse indexes in step.
    pub fn apply_event(&self, item: &mut ItemState, event: &Event) {
        match event {
            Event::ItemAvailabilityChanged { available, .. } => {
                item.available = *available;
            }
            Event::BookingRequested {
                id,
                item_id,
                booker_id,
                span,
            } => {
                // Compacted WALs can repeat an event; apply once
                if item.booking(*id).is_some() {
                    return;
                }
                item.insert_booking(Booking {
                    id: *id,
                    booker_id: *booker_id,
                    span: *span,
                    status: BookingStatus::Waiting,
                });
                self.index_booking(*id, *item_id, *booker_id);
            }
            Event::BookingDecided { id, approved, .. } => {
                if let Some(booking) = item.booking_mut(*id) {
                    booking.status = if *approved {
                        BookingStatus::Approved
                    } else {
                        BookingStatus::Rejected
                    };
                }
            }
            Event::CommentAdded {
                id,
                author_id,
                text,
                created_at,
                ..
            } => {
                if item.comments.iter().any(|c| c.id == *id) {
                    return;
                }
                item.comments.push(Comment {
                    id: *id,
                    author_id: *author_id,
                    text: text.clone(),
                    created_at: *created_at,
                });
            }
            // User and item creation/deletion are handled at the map level
            Event::UserCreated { .. }
            | Event::UserDeleted { .. }
            | Event::ItemCreated { .. } => {}
        }
    }
}
