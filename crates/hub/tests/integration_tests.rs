//! Integration tests for the hub crate
//!
//! These tests wire the store, the hibernation controller, and an event
//! bridge together the way a host application would, with recording fakes
//! at the surface and opener seams.

use std::sync::{Arc, Mutex};

use hub::{
    EventBridge, ExternalOpener, HibernationController, MailboxConfig, MailboxFamily, MailboxId,
    ServiceAction, ServiceConfig, ServiceKey, ServiceStore, ServiceType, Settings, SurfaceEvent,
    SurfaceFactory, SurfaceSpec, ViewCommand, ViewLifecycle, ViewSurface, WindowOpenOptions,
};

/// Surface fake that records loads and commands
struct FakeSurface {
    log: Arc<Mutex<Vec<String>>>,
}

impl ViewSurface for FakeSurface {
    fn load_url(&mut self, url: &str) -> anyhow::Result<()> {
        self.log.lock().unwrap().push(format!("load:{url}"));
        Ok(())
    }

    fn run_command(&mut self, command: &ViewCommand) -> anyhow::Result<()> {
        self.log.lock().unwrap().push(format!("command:{command:?}"));
        Ok(())
    }

    fn close(&mut self) {
        self.log.lock().unwrap().push("close".to_string());
    }
}

struct FakeFactory {
    log: Arc<Mutex<Vec<String>>>,
}

impl SurfaceFactory for FakeFactory {
    fn create(&self, key: &ServiceKey, spec: &SurfaceSpec) -> anyhow::Result<Box<dyn ViewSurface>> {
        self.log
            .lock()
            .unwrap()
            .push(format!("create:{key}:preload={:?}", spec.preload));
        Ok(Box::new(FakeSurface {
            log: Arc::clone(&self.log),
        }))
    }
}

struct FakeOpener {
    calls: Mutex<Vec<String>>,
}

impl ExternalOpener for FakeOpener {
    fn open_content_window(
        &self,
        key: &ServiceKey,
        url: &str,
        _options: WindowOpenOptions,
    ) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(format!("content:{key}:{url}"));
        Ok(())
    }

    fn open_external(&self, url: &str) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(format!("external:{url}"));
        Ok(())
    }
}

struct Harness {
    store: Arc<ServiceStore>,
    controller: Arc<HibernationController>,
    bridge: Arc<EventBridge>,
    key: ServiceKey,
    surface_log: Arc<Mutex<Vec<String>>>,
    opener: Arc<FakeOpener>,
}

/// Build a Slack mailbox with the full store/controller/bridge wiring a
/// host application would use, including the subscription that feeds store
/// changes back into the controller and bridge.
fn harness() -> (Harness, hub::Subscription) {
    let store = Arc::new(ServiceStore::new());
    store
        .add_mailbox(
            MailboxConfig::new("m1", MailboxFamily::Slack).with_service(
                ServiceConfig::new(ServiceType::Default, "https://m1.slack.com")
                    .with_preload("slackDefaultServiceTooling"),
            ),
        )
        .unwrap();
    let key = store
        .service_key(&MailboxId::new("m1"), ServiceType::Default)
        .unwrap();

    let surface_log = Arc::new(Mutex::new(Vec::new()));
    let controller = Arc::new(HibernationController::new(
        Arc::clone(&store),
        Box::new(FakeFactory {
            log: Arc::clone(&surface_log),
        }),
    ));
    let opener = Arc::new(FakeOpener {
        calls: Mutex::new(Vec::new()),
    });
    let opener_handle: Arc<dyn ExternalOpener> = opener.clone();
    let bridge = Arc::new(EventBridge::new(
        key.clone(),
        Arc::clone(&store),
        Settings::default(),
        opener_handle,
    ));

    let subscription = {
        let controller = Arc::clone(&controller);
        let bridge = Arc::clone(&bridge);
        store.subscribe(move |state| {
            controller.handle_state_change(&state);
            if let Some(command) = bridge.handle_state_change(&state) {
                controller.run_command(bridge.key(), &command).unwrap();
            }
        })
    };

    (
        Harness {
            store,
            controller,
            bridge,
            key,
            surface_log,
            opener,
        },
        subscription,
    )
}

#[test]
fn test_favicon_badge_drives_unread_activity() {
    let (h, _sub) = harness();

    let event = SurfaceEvent::FaviconChanged {
        key: h.key.clone(),
        favicons: vec!["https://a/chat-favicon-new-notif.png".into()],
    };
    h.bridge.handle_event(&event).unwrap();
    assert!(
        h.store
            .get_state()
            .get_service(&h.key)
            .unwrap()
            .has_unread_activity
    );

    // A favicon matching neither marker leaves the flag as it was.
    let event = SurfaceEvent::FaviconChanged {
        key: h.key.clone(),
        favicons: vec!["https://a/favicon.ico".into()],
    };
    h.bridge.handle_event(&event).unwrap();
    assert!(
        h.store
            .get_state()
            .get_service(&h.key)
            .unwrap()
            .has_unread_activity
    );
}

#[test]
fn test_open_item_for_other_mailbox_changes_nothing() {
    let (h, _sub) = harness();
    let before = h.store.get_state();

    let other = ServiceKey::new(MailboxFamily::Slack, "m2", ServiceType::Default).unwrap();
    let event = SurfaceEvent::OpenItem {
        key: other,
        launch_uri: Some("slack://item?id=1".into()),
        channel_id: None,
    };
    assert_eq!(h.bridge.handle_event(&event).unwrap(), None);

    let after = h.store.get_state();
    assert_eq!(
        before.get_service(&h.key).unwrap(),
        after.get_service(&h.key).unwrap()
    );
    assert!(h.opener.calls.lock().unwrap().is_empty());
}

#[test]
fn test_file_host_window_downloads_instead_of_opening() {
    let (h, _sub) = harness();
    h.controller.activate(&h.key).unwrap();
    h.controller.notify_load_result(&h.key, Ok(()));

    let event = SurfaceEvent::NewWindow {
        key: h.key.clone(),
        url: "https://files.slack.com/x".into(),
        options: WindowOpenOptions::default(),
    };
    let command = h.bridge.handle_event(&event).unwrap().unwrap();
    assert_eq!(
        command,
        ViewCommand::Download("https://files.slack.com/x".into())
    );
    assert!(h.controller.run_command(&h.key, &command).unwrap());

    let log = h.surface_log.lock().unwrap();
    assert!(log.iter().any(|entry| entry.contains("Download")));
    assert!(h.opener.calls.lock().unwrap().is_empty());
}

#[test]
fn test_search_session_flows_to_surface_and_untracks() {
    let (h, _sub) = harness();
    h.controller.activate(&h.key).unwrap();
    h.controller.notify_load_result(&h.key, Ok(()));
    h.store.set_active(Some(&h.key)).unwrap();

    h.store
        .dispatch(
            &h.key,
            ServiceAction::TrackSearching {
                term: Some("standup".into()),
            },
        )
        .unwrap();

    // The subscription ran the focus command against the live surface and
    // deferred the untrack, which has already been applied in order.
    let log = h.surface_log.lock().unwrap();
    assert!(
        log.iter().any(|entry| entry.contains("FocusSearchField")),
        "expected a focus command in {log:?}"
    );
    drop(log);
    assert!(!h.store.is_searching_mailbox(&h.key));
}

#[test]
fn test_hibernate_resume_retains_state() {
    let (h, _sub) = harness();
    h.controller.activate(&h.key).unwrap();
    h.controller.notify_load_result(&h.key, Ok(()));

    h.store
        .dispatch(&h.key, ServiceAction::SetUnreadCount { count: 6 })
        .unwrap();
    h.store
        .dispatch(
            &h.key,
            ServiceAction::TrackSearching {
                term: Some("retro".into()),
            },
        )
        .unwrap();

    h.controller.hibernate(&h.key).unwrap();
    assert_eq!(h.controller.lifecycle(&h.key), ViewLifecycle::Hibernated);

    // Application state survives the surface teardown untouched.
    let service = h.store.get_state().get_service(&h.key).unwrap().clone();
    assert_eq!(service.unread_count, 6);
    assert!(service.is_searching);

    h.controller.activate(&h.key).unwrap();
    h.controller.notify_load_result(&h.key, Ok(()));
    assert_eq!(h.controller.lifecycle(&h.key), ViewLifecycle::Live);

    // The resumed surface got the search focus replayed.
    let log = h.surface_log.lock().unwrap();
    let replays = log
        .iter()
        .filter(|entry| entry.contains("FocusSearchField"))
        .count();
    assert!(replays >= 1, "expected a focus replay in {log:?}");
}

#[test]
fn test_dispatch_order_is_stable_across_keys() {
    let (h, _sub) = harness();
    h.store
        .add_mailbox(
            MailboxConfig::new("m2", MailboxFamily::Google)
                .with_service(ServiceConfig::new(ServiceType::Default, "https://mail"))
                .with_service(ServiceConfig::new(ServiceType::Team, "https://chat")),
        )
        .unwrap();
    let team_key = h
        .store
        .service_key(&MailboxId::new("m2"), ServiceType::Team)
        .unwrap();

    h.store
        .dispatch(&h.key, ServiceAction::SetUnreadCount { count: 5 })
        .unwrap();
    h.store
        .dispatch(&team_key, ServiceAction::SetUnreadCount { count: 100 })
        .unwrap();
    h.store
        .dispatch(&h.key, ServiceAction::SetUnreadCount { count: 7 })
        .unwrap();

    let state = h.store.get_state();
    assert_eq!(state.get_service(&h.key).unwrap().unread_count, 7);
    assert_eq!(state.get_service(&team_key).unwrap().unread_count, 100);
}

#[test]
fn test_mailbox_removal_destroys_the_surface() {
    let (h, _sub) = harness();
    h.controller.activate(&h.key).unwrap();
    h.controller.notify_load_result(&h.key, Ok(()));
    assert_eq!(h.controller.live_count(), 1);

    h.store.remove_mailbox(&MailboxId::new("m1")).unwrap();

    // The subscription saw the removal and tore the surface down.
    assert_eq!(h.controller.live_count(), 0);
    assert!(h.surface_log.lock().unwrap().contains(&"close".to_string()));
    assert_eq!(h.controller.lifecycle(&h.key), ViewLifecycle::Uncreated);
    assert!(matches!(
        h.controller.activate(&h.key),
        Err(hub::HubError::UnknownServiceKey { .. })
    ));
}
