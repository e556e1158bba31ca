//! Hard limits. Everything here exists to keep a single misbehaving
//! client from exhausting memory or disk.

use crate::model::Ms;

pub const MAX_USERS_PER_TENANT: usize = 100_000;
pub const MAX_ITEMS_PER_TENANT: usize = 100_000;
pub const MAX_BOOKINGS_PER_ITEM: usize = 10_000;
pub const MAX_COMMENTS_PER_ITEM: usize = 10_000;

pub const MAX_NAME_LEN: usize = 255;
pub const MAX_COMMENT_LEN: usize = 4_096;

/// 2000-01-01T00:00:00Z.
pub const MIN_VALID_TIMESTAMP_MS: Ms = 946_684_800_000;
/// 2100-01-01T00:00:00Z.
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// Largest accepted page size for booking/item listings.
pub const MAX_PAGE_SIZE: usize = 1_000;

/// Cap on `item_id IN (...)` lists in availability queries.
pub const MAX_IN_CLAUSE_IDS: usize = 1_000;

pub const MAX_TENANTS: usize = 1_024;
pub const MAX_TENANT_NAME_LEN: usize = 256;
