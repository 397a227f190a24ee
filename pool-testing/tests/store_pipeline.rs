mod common;

use std::cell::RefCell;
use std::rc::Rc;

use pool_contracts::{
    Action, ActionType, AuthState, DispatchError, EntityOperation, RequestId, RequestKind,
    SubscriptionMask,
};
use pool_testing::fixtures;
use pool_testing::middleware::RecordingMiddleware;
use zfs_pool_console::Console;
use zfs_pool_console::stores::Store;

fn console() -> Console<RecordingMiddleware> {
    Console::new(Rc::new(RecordingMiddleware::new()))
}

fn issued(console: &Console<RecordingMiddleware>, kind: RequestKind) -> RequestId {
    let request_id = RequestId::new();
    console
        .dispatch(Action::RequestIssued { request_id, kind })
        .expect("dispatch issued");
    request_id
}

#[test]
fn superseded_volume_response_is_discarded() {
    let console = console();
    let first = issued(&console, RequestKind::Volumes);
    let second = issued(&console, RequestKind::Volumes);

    console
        .dispatch(Action::ReceiveVolumes {
            request_id: first,
            volumes: vec![fixtures::volume("old")],
        })
        .expect("dispatch");
    assert!(!console.volumes().is_initialized());
    assert!(console.volumes().list_volumes().is_empty());

    console
        .dispatch(Action::ReceiveVolumes {
            request_id: second,
            volumes: vec![fixtures::volume("new")],
        })
        .expect("dispatch");
    assert!(console.volumes().is_initialized());
    assert_eq!(console.volumes().list_volumes()[0].name, "new");
    assert!(console.volumes().last_refreshed().is_some());
}

#[test]
fn unrequested_response_is_ignored() {
    let console = console();
    console
        .dispatch(Action::ReceiveAvailableDisks {
            request_id: RequestId::new(),
            disks: fixtures::disks(&["ada0"]),
        })
        .expect("dispatch");
    assert!(console.volumes().available_disks().is_empty());
}

#[test]
fn disk_events_update_the_available_list() {
    let console = console();
    let request_id = issued(&console, RequestKind::AvailableDisks);
    console
        .dispatch(Action::ReceiveAvailableDisks {
            request_id,
            disks: fixtures::disks(&["ada0", "ada1"]),
        })
        .expect("dispatch");

    for event in [
        fixtures::disk_event(EntityOperation::Create, &["ada2"]),
        fixtures::disk_event(EntityOperation::Delete, &["/dev/ada0"]),
    ] {
        console
            .dispatch(Action::MiddlewareEvent { event })
            .expect("dispatch event");
    }

    assert_eq!(
        &*console.volumes().available_disks(),
        fixtures::disks(&["ada1", "ada2"]).as_slice()
    );
}

#[test]
fn dispatch_from_a_change_listener_is_rejected() {
    let console = console();
    let dispatcher = Rc::clone(console.dispatcher());
    let outcome = Rc::new(RefCell::new(None));

    let listener = {
        let outcome = Rc::clone(&outcome);
        console.volumes().add_change_listener(Box::new(move || {
            let result = dispatcher.dispatch(&Action::ReceiveRpcServices {
                services: vec!["volume".to_string()],
            });
            *outcome.borrow_mut() = Some(result);
        }))
    };

    let request_id = issued(&console, RequestKind::Volumes);
    console
        .dispatch(Action::ReceiveVolumes {
            request_id,
            volumes: Vec::new(),
        })
        .expect("outer dispatch");

    assert_eq!(
        outcome.borrow_mut().take(),
        Some(Err(DispatchError::Reentrant(ActionType::ReceiveRpcServices)))
    );
    assert!(console.schema().services().is_empty());
    assert!(!console.dispatcher().is_dispatching());

    assert!(console.volumes().remove_change_listener(listener));
}

#[test]
fn subscription_counts_never_go_negative() {
    let console = console();
    let mask = SubscriptionMask::from("entity-subscriber.volume.changed");

    for _ in 0..2 {
        console
            .dispatch(Action::SubscribeToMask { mask: mask.clone() })
            .expect("subscribe");
    }
    for _ in 0..3 {
        console
            .dispatch(Action::UnsubscribeFromMask { mask: mask.clone() })
            .expect("unsubscribe");
    }

    assert_eq!(console.subscriptions().count(&mask), 0);
    assert!(console.subscriptions().active_masks().is_empty());
}

#[test]
fn session_and_schema_follow_their_actions() {
    let console = console();

    console
        .dispatch(Action::UpdateAuthState {
            auth_state: AuthState {
                authenticated: true,
                username: Some("root".to_string()),
            },
        })
        .expect("auth");
    console
        .dispatch(Action::ReceiveRpcServices {
            services: vec!["volume".to_string(), "disk".to_string()],
        })
        .expect("services");
    console
        .dispatch(Action::ReceiveRpcServiceMethods {
            service: "volume".to_string(),
            methods: vec!["query".to_string(), "create".to_string()],
        })
        .expect("methods");

    assert!(console.session().is_authenticated());
    assert_eq!(console.session().username().as_deref(), Some("root"));
    assert_eq!(console.schema().services(), vec!["volume", "disk"]);
    assert!(console.schema().has_method("volume.create"));
    assert!(!console.schema().has_method("disk.query"));
}
