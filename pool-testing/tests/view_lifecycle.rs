mod common;

use pool_contracts::EntityOperation;
use pool_testing::fixtures::{self, VolumeFixture};
use pool_testing::middleware::MiddlewareCall;
use zfs_pool_console::stores::Store;
use zfs_pool_console::views::{DISPLAY_NAME, Lifecycle};

use common::assertions::{pool_names, storage_mask_counts};
use common::console::Harness;

#[test]
fn mount_requests_pools_and_disks_then_subscribes() {
    let mut harness = Harness::empty();
    harness.mount();

    let calls = harness.middleware.calls();
    assert_eq!(calls.len(), 3);
    assert!(matches!(calls[0], MiddlewareCall::RequestVolumes(_)));
    assert!(matches!(calls[1], MiddlewareCall::RequestAvailableDisks(_)));
    assert_eq!(calls[2], MiddlewareCall::Subscribe(DISPLAY_NAME.to_string()));

    assert_eq!(harness.console.view().lifecycle(), Lifecycle::Mounted);
    assert_eq!(harness.console.volumes().listeners().len(), 1);
    assert_eq!(storage_mask_counts(&harness.console), vec![1, 1]);
}

#[test]
fn mount_cycles_keep_subscriptions_balanced() {
    let mut harness = Harness::new(vec![fixtures::volume("tank")], Vec::new());

    for cycle in 1..=3 {
        harness.mount();
        assert_eq!(harness.middleware.subscribe_calls(DISPLAY_NAME), cycle);
        assert_eq!(storage_mask_counts(&harness.console), vec![1, 1]);

        harness.unmount();
        assert_eq!(harness.middleware.unsubscribe_calls(DISPLAY_NAME), cycle);
        assert_eq!(storage_mask_counts(&harness.console), vec![0, 0]);
        assert!(harness.console.volumes().listeners().is_empty());
    }

    assert_eq!(harness.console.view().lifecycle(), Lifecycle::Unmounted);
}

#[test]
fn mounting_twice_subscribes_once() {
    let mut harness = Harness::empty();
    harness.mount();
    harness.mount();

    assert_eq!(harness.middleware.subscribe_calls(DISPLAY_NAME), 1);
    assert_eq!(harness.console.volumes().listeners().len(), 1);

    harness.unmount();
    harness.unmount();
    assert_eq!(harness.middleware.unsubscribe_calls(DISPLAY_NAME), 1);
}

#[test]
fn unmount_before_mount_does_nothing() {
    let mut harness = Harness::empty();
    harness.unmount();

    assert!(harness.middleware.calls().is_empty());
    assert_eq!(harness.console.view().lifecycle(), Lifecycle::Unmounted);
}

#[test]
fn store_changes_after_unmount_do_not_reach_the_view() {
    let mut harness = Harness::new(vec![fixtures::volume("tank")], Vec::new());
    harness.mount();
    harness.unmount();

    let late = VolumeFixture::new("late").mirror(&["ada4", "ada5"]).build();
    harness
        .console
        .dispatch(pool_contracts::Action::MiddlewareEvent {
            event: fixtures::volume_event(EntityOperation::Create, &[late]),
        })
        .expect("dispatch late event");

    assert!(harness.console.volumes().find_volume("late").is_some());
    assert_eq!(pool_names(&harness.page()), vec!["tank"]);
}

#[test]
fn remount_picks_up_changes_made_while_unmounted() {
    let mut harness = Harness::new(vec![fixtures::volume("tank")], Vec::new());
    harness.mount();
    harness.unmount();

    harness
        .middleware
        .set_volumes(vec![fixtures::volume("tank"), fixtures::volume("backup")]);
    harness.mount();

    assert_eq!(pool_names(&harness.page()), vec!["tank", "backup"]);
}
