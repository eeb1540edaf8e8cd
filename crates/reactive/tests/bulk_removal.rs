//! Observers across `Store::remove_all_data`.

mod common;

use common::*;
use parking_lot::Mutex;
use ripple_core::SortDescriptor;
use ripple_reactive::{BackgroundListObserver, EntityChange, EntityObserver, ListChange, ListObserver};
use ripple_storage::QuerySpec;
use std::sync::Arc;

type Batches = Arc<Mutex<Vec<Vec<String>>>>;

fn recorder() -> (Batches, impl Fn(&[ListChange<Arc<Channel>>]) + Send + Sync + 'static) {
    let batches: Batches = Arc::new(Mutex::new(Vec::new()));
    let b = batches.clone();
    (batches, move |changes: &[ListChange<Arc<Channel>>]| b.lock().push(describe(changes)))
}

#[test]
fn test_remove_all_data_reports_every_item() {
    let store = store();
    insert_all(&store, fixture_rows());
    let sorting = vec![by_default_sorting_at()];
    let query = store.live_query(&store.view_context(), spec_for(&sorting)).unwrap();
    let observer = ListObserver::new(query, channel, sorting);
    let (batches, on_change) = recorder();
    observer.start_observing(on_change).unwrap();

    store.remove_all_data();

    assert!(observer.items().is_empty());
    assert!(observer.is_observing());
    assert_eq!(
        *batches.lock(),
        vec![vec!["-A@4", "-D@3", "-E@2", "-C@1", "-B@0"]]
    );

    insert_all(&store, vec![channel_row(10, "K", now_millis(), None)]);
    assert_eq!(names(&observer.items().to_vec()), ["K"]);
    assert_eq!(batches.lock().last().cloned(), Some(vec!["+K@0".to_string()]));
}

#[test]
fn test_remove_all_data_on_empty_observer() {
    let store = store();
    let sorting = vec![by_default_sorting_at()];
    let query = store.live_query(&store.view_context(), spec_for(&sorting)).unwrap();
    let observer = ListObserver::new(query, channel, sorting);
    let (batches, on_change) = recorder();
    observer.start_observing(on_change).unwrap();

    store.remove_all_data();
    insert_all(&store, fixture_rows());

    let batches = batches.lock();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 5);
}

#[test]
fn test_background_observer_across_remove_all_data() {
    let store = store();
    insert_all(&store, fixture_rows());
    let sorting = vec![by_default_sorting_at()];
    let query = store
        .live_query(&store.background_context(), spec_for(&sorting))
        .unwrap();
    let observer = BackgroundListObserver::new(query, channel, sorting).unwrap();
    let (batches, on_change) = recorder();
    observer.start_observing(on_change).unwrap();
    observer.flush();

    store.remove_all_data();
    observer.flush();
    assert!(observer.items().is_empty());

    insert_all(&store, vec![channel_row(10, "K", now_millis(), None)]);
    observer.flush();

    let batches = batches.lock();
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[1], ["-A@4", "-D@3", "-E@2", "-C@1", "-B@0"]);
    assert_eq!(batches[2], ["+K@0"]);
    assert_eq!(names(&observer.items().to_vec()), ["K"]);
}

#[test]
fn test_entity_observer_sees_removal() {
    let store = store();
    insert_all(&store, fixture_rows());
    let query = store
        .live_query(
            &store.view_context(),
            QuerySpec::new(CHANNELS)
                .filter_eq("name", "C")
                .sort_by(SortDescriptor::asc("name")),
        )
        .unwrap();
    let observer = EntityObserver::new(query, channel);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    observer.on_change(move |change: &EntityChange<Arc<Channel>>| {
        s.lock().push(change.clone().map(|c| c.id))
    });
    observer.start_observing().unwrap();

    store.remove_all_data();
    assert!(observer.item().is_none());
    insert_all(&store, vec![channel_row(3, "C", now_millis(), None)]);

    assert_eq!(*seen.lock(), vec![EntityChange::Remove(3), EntityChange::Create(3)]);
    assert!(observer.is_observing());
}
