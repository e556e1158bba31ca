use super::*;
use super::classify::now_ms;
use crate::limits::*;

const H: Ms = 3_600_000; // 1 hour in ms
const M: Ms = 60_000; // 1 minute in ms

// Fixed "now" for temporal queries — 2023-11-14T22:13:20Z.
const T0: Ms = 1_700_000_000_000;

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("lendit_test_engine");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn new_engine(name: &str) -> Engine {
    Engine::new(test_wal_path(name), Arc::new(NotifyHub::new())).unwrap()
}

/// One owner, one booker, one available item.
async fn seed(engine: &Engine) -> (Ulid, Ulid, Ulid) {
    let owner = Ulid::new();
    let booker = Ulid::new();
    let item = Ulid::new();
    engine.create_user(owner, "owner".into()).await.unwrap();
    engine.create_user(booker, "booker".into()).await.unwrap();
    engine
        .create_item(item, owner, "drill".into(), true)
        .await
        .unwrap();
    (owner, booker, item)
}

async fn request(engine: &Engine, item: Ulid, booker: Ulid, start: Ms, end: Ms) -> Ulid {
    let id = Ulid::new();
    engine
        .request_booking(id, item, booker, Span::new(start, end))
        .await
        .unwrap();
    id
}

// ── Users and items ──────────────────────────────────────

#[tokio::test]
async fn create_and_get_user() {
    let engine = new_engine("create_user.wal");
    let id = Ulid::new();
    engine.create_user(id, "alice".into()).await.unwrap();
    assert_eq!(engine.get_user(&id).unwrap().name, "alice");
}

#[tokio::test]
async fn duplicate_user_rejected() {
    let engine = new_engine("dup_user.wal");
    let id = Ulid::new();
    engine.create_user(id, "alice".into()).await.unwrap();
    let result = engine.create_user(id, "alice again".into()).await;
    assert!(matches!(result, Err(EngineError::AlreadyExists(_))));
}

#[tokio::test]
async fn delete_user() {
    let engine = new_engine("delete_user.wal");
    let id = Ulid::new();
    engine.create_user(id, "alice".into()).await.unwrap();
    engine.delete_user(id).await.unwrap();
    assert!(engine.get_user(&id).is_none());
    let result = engine.delete_user(id).await;
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn delete_user_with_live_records_refused() {
    let engine = new_engine("delete_user_live.wal");
    let (owner, booker, item) = seed(&engine).await;
    let _id = request(&engine, item, booker, T0, T0 + H).await;

    // owner still owns the item, booker still has a booking
    let result = engine.delete_user(owner).await;
    assert!(matches!(result, Err(EngineError::InvalidState(_))));
    let result = engine.delete_user(booker).await;
    assert!(matches!(result, Err(EngineError::InvalidState(_))));

    let bystander = Ulid::new();
    engine.create_user(bystander, "carol".into()).await.unwrap();
    engine.delete_user(bystander).await.unwrap();
}

#[tokio::test]
async fn create_item_unknown_owner() {
    let engine = new_engine("item_no_owner.wal");
    let result = engine
        .create_item(Ulid::new(), Ulid::new(), "drill".into(), true)
        .await;
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn user_name_length_enforced() {
    let engine = new_engine("user_name_len.wal");
    let long = "x".repeat(MAX_NAME_LEN + 1);
    let result = engine.create_user(Ulid::new(), long).await;
    assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
    let result = engine.create_user(Ulid::new(), String::new()).await;
    assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
}

#[tokio::test]
async fn only_owner_toggles_availability() {
    let engine = new_engine("toggle_avail.wal");
    let (owner, booker, item) = seed(&engine).await;

    let result = engine.set_item_available(item, booker, false).await;
    assert!(matches!(result, Err(EngineError::Forbidden(_))));

    engine.set_item_available(item, owner, false).await.unwrap();
    let guard = engine.get_item(&item).unwrap();
    assert!(!guard.read().await.available);
}

// ── Booking lifecycle ────────────────────────────────────

#[tokio::test]
async fn request_starts_waiting() {
    let engine = new_engine("request_waiting.wal");
    let (_, booker, item) = seed(&engine).await;

    let id = Ulid::new();
    let info = engine
        .request_booking(id, item, booker, Span::new(T0, T0 + 2 * H))
        .await
        .unwrap();
    assert_eq!(info.id, id);
    assert_eq!(info.item_id, item);
    assert_eq!(info.booker_id, booker);
    assert_eq!(info.status, BookingStatus::Waiting);
}

#[tokio::test]
async fn cannot_book_own_item() {
    let engine = new_engine("book_own.wal");
    let (owner, _, item) = seed(&engine).await;

    let result = engine
        .request_booking(Ulid::new(), item, owner, Span::new(T0, T0 + H))
        .await;
    assert!(matches!(result, Err(EngineError::Forbidden(_))));
}

#[tokio::test]
async fn cannot_book_unavailable_item() {
    let engine = new_engine("book_unavailable.wal");
    let (owner, booker, item) = seed(&engine).await;
    engine.set_item_available(item, owner, false).await.unwrap();

    let result = engine
        .request_booking(Ulid::new(), item, booker, Span::new(T0, T0 + H))
        .await;
    assert!(matches!(result, Err(EngineError::InvalidState(_))));
}

#[tokio::test]
async fn inverted_span_rejected() {
    let engine = new_engine("inverted_span.wal");
    let (_, booker, item) = seed(&engine).await;

    let result = engine
        .request_booking(Ulid::new(), item, booker, Span::new(T0 + H, T0))
        .await;
    assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
    // zero-length is inverted too
    let result = engine
        .request_booking(Ulid::new(), item, booker, Span::new(T0, T0))
        .await;
    assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
}

#[tokio::test]
async fn owner_approves_booking() {
    let engine = new_engine("approve.wal");
    let (owner, booker, item) = seed(&engine).await;
    let id = request(&engine, item, booker, T0, T0 + 2 * H).await;

    let info = engine.decide_booking(id, owner, true).await.unwrap();
    assert_eq!(info.status, BookingStatus::Approved);
}

#[tokio::test]
async fn owner_rejects_booking() {
    let engine = new_engine("reject.wal");
    let (owner, booker, item) = seed(&engine).await;
    let id = request(&engine, item, booker, T0, T0 + 2 * H).await;

    let info = engine.decide_booking(id, owner, false).await.unwrap();
    assert_eq!(info.status, BookingStatus::Rejected);
}

#[tokio::test]
async fn only_owner_decides() {
    let engine = new_engine("decide_forbidden.wal");
    let (_, booker, item) = seed(&engine).await;
    let id = request(&engine, item, booker, T0, T0 + H).await;

    // not even the booker may approve their own request
    let result = engine.decide_booking(id, booker, true).await;
    assert!(matches!(result, Err(EngineError::Forbidden(_))));

    let stranger = Ulid::new();
    engine.create_user(stranger, "carol".into()).await.unwrap();
    let result = engine.decide_booking(id, stranger, true).await;
    assert!(matches!(result, Err(EngineError::Forbidden(_))));
}

#[tokio::test]
async fn decision_is_final() {
    let engine = new_engine("decide_once.wal");
    let (owner, booker, item) = seed(&engine).await;
    let id = request(&engine, item, booker, T0, T0 + H).await;

    engine.decide_booking(id, owner, true).await.unwrap();
    let result = engine.decide_booking(id, owner, true).await;
    assert!(matches!(result, Err(EngineError::InvalidState(_))));
    let result = engine.decide_booking(id, owner, false).await;
    assert!(matches!(result, Err(EngineError::InvalidState(_))));
}

#[tokio::test]
async fn decide_unknown_booking() {
    let engine = new_engine("decide_unknown.wal");
    let (owner, _, _) = seed(&engine).await;
    let result = engine.decide_booking(Ulid::new(), owner, true).await;
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn concurrent_decisions_one_wins() {
    let engine = Arc::new(new_engine("decide_race.wal"));
    let (owner, booker, item) = seed(&engine).await;
    let id = request(&engine, item, booker, T0, T0 + H).await;

    let approve = tokio::spawn({
        let engine = engine.clone();
        async move { engine.decide_booking(id, owner, true).await }
    });
    let reject = tokio::spawn({
        let engine = engine.clone();
        async move { engine.decide_booking(id, owner, false).await }
    });
    let (a, r) = (approve.await.unwrap(), reject.await.unwrap());
    // exactly one decision lands, the other sees a non-WAITING booking
    assert!(a.is_ok() ^ r.is_ok());
    assert!(matches!(
        if a.is_err() { a } else { r },
        Err(EngineError::InvalidState(_))
    ));
}

// ── Visibility ───────────────────────────────────────────

#[tokio::test]
async fn booking_visible_to_parties_only() {
    let engine = new_engine("visibility.wal");
    let (owner, booker, item) = seed(&engine).await;
    let id = request(&engine, item, booker, T0, T0 + H).await;

    assert!(engine.booking_by_id(id, booker).await.is_ok());
    assert!(engine.booking_by_id(id, owner).await.is_ok());

    let stranger = Ulid::new();
    engine.create_user(stranger, "carol".into()).await.unwrap();
    let result = engine.booking_by_id(id, stranger).await;
    // masked as NotFound, never Forbidden
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn booking_lookup_requires_known_requester() {
    let engine = new_engine("lookup_requester.wal");
    let (_, booker, item) = seed(&engine).await;
    let id = request(&engine, item, booker, T0, T0 + H).await;

    let result = engine.booking_by_id(id, Ulid::new()).await;
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}

// ── Temporal listings ────────────────────────────────────

/// past [T0-3H, T0-H], current [T0-M, T0+M], future [T0+H, T0+3H].
/// The current one is approved, the future one rejected.
async fn seed_timeline(engine: &Engine) -> (Ulid, Ulid, [Ulid; 3]) {
    let (owner, booker, item) = seed(engine).await;
    let past = request(engine, item, booker, T0 - 3 * H, T0 - H).await;
    let current = request(engine, item, booker, T0 - M, T0 + M).await;
    let future = request(engine, item, booker, T0 + H, T0 + 3 * H).await;
    engine.decide_booking(past, owner, true).await.unwrap();
    engine.decide_booking(current, owner, true).await.unwrap();
    engine.decide_booking(future, owner, false).await.unwrap();
    (owner, booker, [past, current, future])
}

#[tokio::test]
async fn owner_listing_all_sorted_descending() {
    let engine = new_engine("list_all.wal");
    let (owner, _, [past, current, future]) = seed_timeline(&engine).await;

    let all = engine
        .bookings_by_owner(owner, StateFilter::All, T0, 0, 20)
        .await
        .unwrap();
    let ids: Vec<Ulid> = all.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![future, current, past]);
}

#[tokio::test]
async fn temporal_filters_partition() {
    let engine = new_engine("list_temporal.wal");
    let (owner, _, [past, current, future]) = seed_timeline(&engine).await;

    let got = |filter| engine.bookings_by_owner(owner, filter, T0, 0, 20);
    let p = got(StateFilter::Past).await.unwrap();
    let c = got(StateFilter::Current).await.unwrap();
    let f = got(StateFilter::Future).await.unwrap();
    assert_eq!(p.iter().map(|b| b.id).collect::<Vec<_>>(), vec![past]);
    assert_eq!(c.iter().map(|b| b.id).collect::<Vec<_>>(), vec![current]);
    assert_eq!(f.iter().map(|b| b.id).collect::<Vec<_>>(), vec![future]);
}

#[tokio::test]
async fn status_filters() {
    let engine = new_engine("list_status.wal");
    let (owner, booker, [_, _, future]) = seed_timeline(&engine).await;
    // one more, left WAITING
    let item2 = Ulid::new();
    engine
        .create_item(item2, owner, "saw".into(), true)
        .await
        .unwrap();
    let waiting = request(&engine, item2, booker, T0 + 5 * H, T0 + 6 * H).await;

    let w = engine
        .bookings_by_owner(owner, StateFilter::Waiting, T0, 0, 20)
        .await
        .unwrap();
    assert_eq!(w.iter().map(|b| b.id).collect::<Vec<_>>(), vec![waiting]);

    let r = engine
        .bookings_by_owner(owner, StateFilter::Rejected, T0, 0, 20)
        .await
        .unwrap();
    assert_eq!(r.iter().map(|b| b.id).collect::<Vec<_>>(), vec![future]);
}

#[tokio::test]
async fn booker_listing_matches_owner_listing() {
    let engine = new_engine("list_booker.wal");
    let (owner, booker, _) = seed_timeline(&engine).await;

    let by_owner = engine
        .bookings_by_owner(owner, StateFilter::All, T0, 0, 20)
        .await
        .unwrap();
    let by_booker = engine
        .bookings_by_booker(booker, StateFilter::All, T0, 0, 20)
        .await
        .unwrap();
    assert_eq!(by_owner, by_booker);
}

#[tokio::test]
async fn listing_unknown_user() {
    let engine = new_engine("list_unknown.wal");
    seed(&engine).await;
    let result = engine
        .bookings_by_owner(Ulid::new(), StateFilter::All, T0, 0, 20)
        .await;
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn pagination_pages_do_not_overlap() {
    let engine = new_engine("pagination.wal");
    let (owner, booker, item) = seed(&engine).await;
    for i in 0..5 {
        request(&engine, item, booker, T0 + i * H, T0 + i * H + M).await;
    }

    let page1 = engine
        .bookings_by_owner(owner, StateFilter::All, T0, 0, 2)
        .await
        .unwrap();
    let page2 = engine
        .bookings_by_owner(owner, StateFilter::All, T0, 2, 2)
        .await
        .unwrap();
    let page3 = engine
        .bookings_by_owner(owner, StateFilter::All, T0, 4, 2)
        .await
        .unwrap();
    assert_eq!(page1.len(), 2);
    assert_eq!(page2.len(), 2);
    assert_eq!(page3.len(), 1);
    let mut starts: Vec<Ms> = page1
        .iter()
        .chain(&page2)
        .chain(&page3)
        .map(|b| b.start)
        .collect();
    assert!(starts.windows(2).all(|w| w[0] > w[1]));
    starts.dedup();
    assert_eq!(starts.len(), 5);
}

// ── Availability ─────────────────────────────────────────

#[tokio::test]
async fn availability_last_and_next() {
    let engine = new_engine("avail.wal");
    let (owner, booker, item) = seed(&engine).await;
    let past = request(&engine, item, booker, T0 - 3 * H, T0 - H).await;
    let older = request(&engine, item, booker, T0 - 6 * H, T0 - 5 * H).await;
    let next = request(&engine, item, booker, T0 + H, T0 + 2 * H).await;
    let later = request(&engine, item, booker, T0 + 4 * H, T0 + 5 * H).await;
    for id in [past, older, next, later] {
        engine.decide_booking(id, owner, true).await.unwrap();
    }

    let summaries = engine.availability_for_items(&[item], T0).await;
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].last.unwrap().booking_id, past);
    assert_eq!(summaries[0].next.unwrap().booking_id, next);
}

#[tokio::test]
async fn availability_ignores_undecided_and_rejected() {
    let engine = new_engine("avail_status.wal");
    let (owner, booker, item) = seed(&engine).await;
    let _waiting = request(&engine, item, booker, T0 - 2 * H, T0 - H).await;
    let rejected = request(&engine, item, booker, T0 + H, T0 + 2 * H).await;
    engine.decide_booking(rejected, owner, false).await.unwrap();

    let summaries = engine.availability_for_items(&[item], T0).await;
    assert_eq!(summaries[0].last, None);
    assert_eq!(summaries[0].next, None);
}

#[tokio::test]
async fn availability_bulk_with_unknown_and_duplicate_ids() {
    let engine = new_engine("avail_bulk.wal");
    let (_, _, item) = seed(&engine).await;
    let missing = Ulid::new();

    let summaries = engine
        .availability_for_items(&[item, missing, item], T0)
        .await;
    // duplicates collapse, unknown ids come back empty
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[1].item_id, missing);
    assert_eq!(summaries[1].last, None);
    assert_eq!(summaries[1].next, None);
}

#[tokio::test]
async fn items_by_owner_carries_summary() {
    let engine = new_engine("items_by_owner.wal");
    let (owner, booker, item) = seed(&engine).await;
    let past = request(&engine, item, booker, T0 - 2 * H, T0 - H).await;
    engine.decide_booking(past, owner, true).await.unwrap();

    let items = engine.items_by_owner(owner, T0).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, item);
    assert_eq!(items[0].last.unwrap().booking_id, past);
    assert_eq!(items[0].next, None);
}

// ── Comments ─────────────────────────────────────────────

#[tokio::test]
async fn comment_requires_completed_booking() {
    let engine = new_engine("comment_gate.wal");
    let now = now_ms();
    let (owner, booker, item) = seed(&engine).await;

    // no booking at all
    let result = engine
        .add_comment(Ulid::new(), item, booker, "great".into())
        .await;
    assert!(matches!(result, Err(EngineError::Forbidden(_))));
    assert!(!engine.can_comment(booker, item, now).await.unwrap());

    // approved booking, but still in the future
    let future = request(&engine, item, booker, now + H, now + 2 * H).await;
    engine.decide_booking(future, owner, true).await.unwrap();
    let result = engine
        .add_comment(Ulid::new(), item, booker, "great".into())
        .await;
    assert!(matches!(result, Err(EngineError::Forbidden(_))));

    // completed approved booking
    let done = request(&engine, item, booker, now - 2 * H, now - H).await;
    engine.decide_booking(done, owner, true).await.unwrap();
    assert!(engine.can_comment(booker, item, now_ms()).await.unwrap());
    let info = engine
        .add_comment(Ulid::new(), item, booker, "great drill".into())
        .await
        .unwrap();
    assert_eq!(info.text, "great drill");
    assert_eq!(info.author_id, booker);
}

#[tokio::test]
async fn waiting_booking_never_qualifies_for_comment() {
    let engine = new_engine("comment_waiting.wal");
    let now = now_ms();
    let (_, booker, item) = seed(&engine).await;
    let _past = request(&engine, item, booker, now - 2 * H, now - H).await;

    assert!(!engine.can_comment(booker, item, now_ms()).await.unwrap());
}

// ── Durability ───────────────────────────────────────────

#[tokio::test]
async fn restart_preserves_state() {
    let path = test_wal_path("restart.wal");
    let notify = Arc::new(NotifyHub::new());
    let (owner, booker, item, id);
    {
        let engine = Engine::new(path.clone(), notify.clone()).unwrap();
        let seeded = seed(&engine).await;
        (owner, booker, item) = seeded;
        id = request(&engine, item, booker, T0, T0 + 2 * H).await;
        engine.decide_booking(id, owner, true).await.unwrap();
        engine.set_item_available(item, owner, false).await.unwrap();
    }

    let engine2 = Engine::new(path, notify).unwrap();
    let info = engine2.booking_by_id(id, booker).await.unwrap();
    assert_eq!(info.status, BookingStatus::Approved);
    let guard = engine2.get_item(&item).unwrap();
    assert!(!guard.read().await.available);
}

#[tokio::test]
async fn compaction_preserves_state_and_shrinks_wal() {
    let path = test_wal_path("compact.wal");
    let notify = Arc::new(NotifyHub::new());
    let (booker, item, kept);
    {
        let engine = Engine::new(path.clone(), notify.clone()).unwrap();
        let (owner, b, i) = seed(&engine).await;
        (booker, item) = (b, i);
        // churn: lots of decided bookings plus availability flips
        for k in 0..50 {
            let id = request(&engine, item, booker, T0 + k * H, T0 + k * H + M).await;
            engine.decide_booking(id, owner, k % 2 == 0).await.unwrap();
        }
        kept = request(&engine, item, booker, T0 + 100 * H, T0 + 101 * H).await;

        let before = std::fs::metadata(&path).unwrap().len();
        engine.compact_wal().await.unwrap();
        let after = std::fs::metadata(&path).unwrap().len();
        assert!(after <= before);
        assert_eq!(engine.wal_appends_since_compact().await, 0);
    }

    let engine2 = Engine::new(path, notify).unwrap();
    let info = engine2.booking_by_id(kept, booker).await.unwrap();
    assert_eq!(info.status, BookingStatus::Waiting);
    let all = engine2
        .bookings_by_booker(booker, StateFilter::All, T0, 0, MAX_PAGE_SIZE)
        .await
        .unwrap();
    assert_eq!(all.len(), 51);
}

#[tokio::test]
async fn replay_applies_repeated_events_once() {
    let path = test_wal_path("replay_dedup.wal");
    let owner = Ulid::new();
    let booker = Ulid::new();
    let item = Ulid::new();
    let booking = Ulid::new();
    let comment = Ulid::new();
    // A compacted WAL where the snapshot and the mid-snapshot tail carry
    // the same writes
    let events = vec![
        Event::UserCreated { id: owner, name: "owner".into() },
        Event::UserCreated { id: booker, name: "booker".into() },
        Event::ItemCreated { id: item, owner_id: owner, name: "drill".into(), available: true },
        Event::BookingRequested {
            id: booking,
            item_id: item,
            booker_id: booker,
            span: Span::new(T0, T0 + H),
        },
        Event::BookingDecided { id: booking, item_id: item, approved: true },
        Event::CommentAdded {
            id: comment,
            item_id: item,
            author_id: booker,
            text: "great".into(),
            created_at: T0,
        },
        Event::UserCreated { id: booker, name: "booker".into() },
        Event::ItemCreated { id: item, owner_id: owner, name: "drill".into(), available: true },
        Event::BookingRequested {
            id: booking,
            item_id: item,
            booker_id: booker,
            span: Span::new(T0, T0 + H),
        },
        Event::BookingDecided { id: booking, item_id: item, approved: true },
        Event::CommentAdded {
            id: comment,
            item_id: item,
            author_id: booker,
            text: "great".into(),
            created_at: T0,
        },
    ];
    {
        let mut wal = crate::wal::Wal::open(&path).unwrap();
        for e in &events {
            wal.append(e).unwrap();
        }
    }

    let engine = Engine::new(path, Arc::new(NotifyHub::new())).unwrap();
    let all = engine
        .bookings_by_booker(booker, StateFilter::All, T0, 0, MAX_PAGE_SIZE)
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].status, BookingStatus::Approved);
    let guard = engine.get_item(&item).unwrap();
    assert_eq!(guard.read().await.comments.len(), 1);
    let items = engine.items_by_owner(owner, T0).await.unwrap();
    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn compaction_keeps_writes_landing_mid_snapshot() {
    let path = test_wal_path("compact_race.wal");
    let notify = Arc::new(NotifyHub::new());
    let (booker, decided);
    {
        let engine = Arc::new(Engine::new(path.clone(), notify.clone()).unwrap());
        let (owner, b, item) = seed(&engine).await;
        booker = b;
        // enough churn that snapshotting and mutating overlap
        let mut waiting = Vec::new();
        for k in 0..40 {
            waiting.push(request(&engine, item, booker, T0 + k * H, T0 + k * H + M).await);
        }

        let compact = tokio::spawn({
            let engine = engine.clone();
            async move { engine.compact_wal().await }
        });
        let decide = tokio::spawn({
            let engine = engine.clone();
            async move {
                let mut done = Vec::new();
                for id in waiting {
                    engine.decide_booking(id, owner, true).await.unwrap();
                    done.push(id);
                }
                done
            }
        });
        compact.await.unwrap().unwrap();
        decided = decide.await.unwrap();
    }

    // every acked decision must survive the swap and the restart
    let engine2 = Engine::new(path, notify).unwrap();
    for id in decided {
        let info = engine2.booking_by_id(id, booker).await.unwrap();
        assert_eq!(info.status, BookingStatus::Approved);
    }
}
