use std::time::{Duration, Instant};

use tankobon::reader::continuous::WebtoonReader;
use tankobon::test_utils::{FakeConnector, FakeWorld};
use tankobon::ReaderEvent;

const SERIES: i32 = 1;
const VOLUME: i32 = 10;
const CHAPTER: i32 = 100;

fn open_webtoon(
    page: usize,
    total: usize,
    buffer: usize,
    world: FakeWorld,
) -> (WebtoonReader, FakeConnector) {
    let connector = FakeConnector::new(world);
    let handle = connector.clone();
    let reader = WebtoonReader::open(
        Box::new(connector),
        SERIES,
        VOLUME,
        CHAPTER,
        page,
        total,
        buffer,
    );
    (reader, handle)
}

/// Instants spaced far beyond the scroll debounce interval.
fn t(n: u64) -> Instant {
    Instant::now() + Duration::from_millis(n * 100)
}

/// Load everything outstanding and let the initial scroll settle.
fn warm_up(reader: &mut WebtoonReader, at: u64) -> u64 {
    reader.pump();
    reader.on_scroll_at(1000.0, t(at));
    reader.on_scroll_at(1000.0, t(at + 1));
    at + 2
}

#[test]
fn init_seeds_window_around_start_page() {
    // totalPages=100, pageNum=50, bufferPages=5 -> [45,55).
    let (reader, _handle) = open_webtoon(50, 100, 5, FakeWorld::new());
    assert_eq!(reader.window_bounds(), (Some(45), Some(54)));
    assert_eq!(reader.resident_pages(), (45..55).collect::<Vec<_>>());
    assert!(!reader.all_images_loaded());
}

#[test]
fn forward_intersection_advances_and_extends_window() {
    let (mut reader, handle) = open_webtoon(50, 100, 5, FakeWorld::new());
    let mut clock = warm_up(&mut reader, 1);
    assert!(reader.all_images_loaded());
    assert!(!reader.is_scrolling());

    reader.on_page_visible(51, 1.0);
    assert_eq!(reader.page_num(), 51);
    assert_eq!(reader.window_bounds(), (Some(45), Some(55)));
    assert_eq!(handle.bookmark_writes(), vec![51]);

    // Too far ahead of the tracked position: declined as spurious.
    clock = warm_up(&mut reader, clock);
    let _ = clock;
    reader.on_page_visible(60, 1.0);
    assert_eq!(reader.page_num(), 51);
    assert_eq!(reader.window_bounds(), (Some(45), Some(55)));
}

#[test]
fn initial_scroll_fires_once_current_page_loads() {
    let (mut reader, _handle) = open_webtoon(50, 100, 5, FakeWorld::new());
    reader.pump();
    let events = reader.take_events();
    assert!(events.contains(&ReaderEvent::ScrollToPage(50)));
    assert!(reader.is_scrolling());

    // The settle sample releases the gate.
    reader.on_scroll_at(900.0, t(1));
    reader.on_scroll_at(900.0, t(2));
    assert!(!reader.is_scrolling());
}

#[test]
fn visibility_is_gated_while_images_load_or_scrolling() {
    let (mut reader, _handle) = open_webtoon(50, 100, 5, FakeWorld::new());

    // Nothing has loaded yet.
    reader.on_page_visible(51, 1.0);
    assert_eq!(reader.page_num(), 50);

    reader.pump();
    // Loaded, but the scroll-to-page animation is still running.
    assert!(reader.is_scrolling());
    reader.on_page_visible(51, 1.0);
    assert_eq!(reader.page_num(), 50);

    reader.on_scroll_at(900.0, t(1));
    reader.on_scroll_at(900.0, t(2));
    reader.on_page_visible(51, 1.0);
    assert_eq!(reader.page_num(), 51);
}

#[test]
fn low_intersection_ratio_is_ignored() {
    let (mut reader, _handle) = open_webtoon(50, 100, 5, FakeWorld::new());
    warm_up(&mut reader, 1);
    reader.on_page_visible(51, 0.1);
    assert_eq!(reader.page_num(), 50);
}

#[test]
fn backward_intersection_needs_backward_direction() {
    let (mut reader, _handle) = open_webtoon(50, 100, 5, FakeWorld::new());
    let clock = warm_up(&mut reader, 1);

    // Direction is forward after warm-up; a backward-looking page is
    // inconsistent with it.
    reader.on_page_visible(49, 1.0);
    assert_eq!(reader.page_num(), 50);

    // Scroll upward, then the same event is accepted.
    reader.on_scroll_at(400.0, t(clock));
    reader.on_page_visible(49, 1.0);
    assert_eq!(reader.page_num(), 49);
}

#[test]
fn desync_force_corrects_within_buffer_reach() {
    let (mut reader, handle) = open_webtoon(50, 100, 5, FakeWorld::new());
    warm_up(&mut reader, 1);

    // Visible page 54 is four steps ahead: out of sync but reachable,
    // so the current page is forced to match.
    reader.on_page_visible(54, 1.0);
    assert_eq!(reader.page_num(), 54);
    assert!(handle.bookmark_writes().contains(&54));
}

#[test]
fn residency_stays_bounded_during_long_forward_scroll() {
    let (mut reader, _handle) = open_webtoon(0, 300, 5, FakeWorld::new());
    let mut clock = warm_up(&mut reader, 1);
    let mut evicted_any = false;
    for page in 1..200usize {
        reader.on_page_visible(page, 1.0);
        assert_eq!(reader.page_num(), page);
        assert!(reader.resident_pages().len() <= 2 * 5 + 2);
        let (min, max) = reader.window_bounds();
        assert!(min.unwrap() <= page && page <= max.unwrap());
        evicted_any |= reader
            .take_events()
            .iter()
            .any(|e| matches!(e, ReaderEvent::PageEvicted(_)));
        clock = warm_up(&mut reader, clock);
    }
    assert!(evicted_any);
}

#[test]
fn failed_slab_is_left_unfilled_and_retried_on_next_pass() {
    let mut world = FakeWorld::new();
    world.failing_pages.insert((CHAPTER, 52));
    let (mut reader, handle) = open_webtoon(50, 100, 5, world);
    let mut clock = warm_up(&mut reader, 1);

    assert!(reader.all_images_loaded(), "failure still releases the gate");
    assert!(reader.image(52).is_none());
    assert!(reader
        .take_events()
        .iter()
        .any(|e| matches!(e, ReaderEvent::LoadFailed { page: Some(52), .. })));

    // The backend recovers; the next accepted advance retries the hole.
    handle.world().borrow_mut().failing_pages.clear();
    reader.on_page_visible(51, 1.0);
    clock = warm_up(&mut reader, clock);
    let _ = clock;
    assert!(reader.image(52).is_some());
}

#[test]
fn small_host_jump_keeps_window_large_jump_reseeds() {
    let (mut reader, _handle) = open_webtoon(50, 100, 5, FakeWorld::new());
    warm_up(&mut reader, 1);

    reader.set_page(51);
    assert_eq!(reader.window_bounds(), (Some(45), Some(54)));

    reader.set_page(80);
    assert_eq!(reader.window_bounds(), (Some(75), Some(84)));
    assert_eq!(reader.resident_pages(), (75..85).collect::<Vec<_>>());
}

#[test]
fn stale_loads_from_before_a_jump_are_discarded() {
    // Defer the seed loads, jump far away, then let everything complete.
    let mut world = FakeWorld::new();
    world.auto_respond = false;
    let (mut reader, handle) = open_webtoon(50, 100, 5, world);
    reader.set_page(80);
    handle.release_all();
    reader.pump();

    // Only the new window's pages have images; responses addressed to the
    // discarded window were dropped.
    assert!(reader.image(50).is_none());
    assert!(reader.image(80).is_some());
    assert_eq!(reader.resident_pages(), (75..85).collect::<Vec<_>>());
}

#[test]
fn follow_link_reseeds_and_jump_back_restores_departure() {
    let (mut reader, handle) = open_webtoon(10, 100, 5, FakeWorld::new());
    let mut clock = warm_up(&mut reader, 1);
    reader.on_scroll_at(1234.0, t(clock));
    clock += 1;

    reader.follow_link(60);
    reader.pump();
    assert_eq!(reader.page_num(), 60);
    assert_eq!(reader.window_bounds(), (Some(55), Some(64)));
    assert!(handle.bookmark_writes().contains(&60));

    let point = reader.jump_back().expect("history entry");
    assert_eq!(point.page, 10);
    assert_eq!(point.scroll_offset, 1234.0);
    assert_eq!(reader.page_num(), 10);
    let _ = clock;
}

#[test]
fn final_page_is_persisted_as_completion_marker() {
    let (mut reader, handle) = open_webtoon(96, 100, 5, FakeWorld::new());
    warm_up(&mut reader, 1);
    reader.follow_link(99);
    assert_eq!(handle.bookmark_writes().last(), Some(&100));
}
