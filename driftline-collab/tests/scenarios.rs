use std::{sync::Arc, time::Duration};

use driftline_collab::{
    Collab, CollabError, MemoryMirror, MemoryNotifier, MemorySubscriber, NewCharteredDrift,
    NewSession, Notification,
};
use driftline_core::{Config, Role};

fn config() -> Config {
    Config {
        rtc_certificate: Some("scenario-certificate".to_string()),
        ..Default::default()
    }
}

fn collab() -> (Collab, Arc<MemoryNotifier>) {
    let notifier = Arc::new(MemoryNotifier::default());
    let collab = Collab::new(
        config(),
        Arc::new(MemoryMirror::default()),
        notifier.clone(),
    );

    (collab, notifier)
}

fn start(collab: &Collab, host: &str, room: &str) -> String {
    collab
        .sessions
        .start_session(NewSession {
            host_id: host.to_string(),
            host_display_name: "Host".to_string(),
            host_photo_ref: None,
            title: "Sunset".to_string(),
            room_name_hint: Some(room.to_string()),
        })
        .unwrap()
        .session
        .session_id
}

fn harbor_tour(price_usd: f64) -> NewCharteredDrift {
    NewCharteredDrift {
        title: "Harbor tour".to_string(),
        ticket_number: "D1".to_string(),
        price_usd,
        duration_mins: 60,
        host_uid: "captain".to_string(),
        host_name: "Captain".to_string(),
    }
}

#[tokio::test]
async fn beach_cam_request_and_accept() {
    let (collab, _) = collab();
    start(&collab, "host", "beach-cam");

    let subscriber = MemorySubscriber::new();
    collab
        .rooms
        .subscribe("beach-cam", subscriber.clone())
        .unwrap();

    collab
        .negotiation
        .request("beach-cam", "V1", "Viewer One", None)
        .unwrap();
    collab
        .negotiation
        .accept("beach-cam", "V1", None, None)
        .unwrap();

    let snapshot = collab.negotiation.snapshot("beach-cam").unwrap();
    assert_eq!(snapshot.participants, vec!["V1", "host"]);
    assert!(snapshot.requests.is_empty());

    assert_eq!(
        subscriber.event_types(),
        vec!["hello", "request", "accepted"]
    );

    let hello = &subscriber.events()[0];
    assert_eq!(hello["participants"], serde_json::json!(["host"]));
}

#[tokio::test]
async fn blocking_works_in_both_directions() {
    let (collab, _) = collab();
    start(&collab, "A", "room-a");
    start(&collab, "B", "room-b");

    collab.moderation.block("A", "B").unwrap();

    assert!(matches!(
        collab.negotiation.request("room-a", "B", "B", Some("A")),
        Err(CollabError::Forbidden(_))
    ));
    assert!(matches!(
        collab.negotiation.request("room-b", "A", "A", Some("B")),
        Err(CollabError::Forbidden(_))
    ));
    assert!(matches!(
        collab.negotiation.accept("room-b", "A", None, Some("B")),
        Err(CollabError::Forbidden(_))
    ));
}

#[tokio::test]
async fn never_requested_and_participating_at_once() {
    let (collab, _) = collab();
    start(&collab, "host", "beach-cam");

    let negotiation = &collab.negotiation;

    negotiation.request("beach-cam", "v1", "One", None).unwrap();
    negotiation.request("beach-cam", "v2", "Two", None).unwrap();
    negotiation.accept("beach-cam", "v1", None, None).unwrap();
    negotiation.request("beach-cam", "v1", "One", None).unwrap();
    collab.moderation.kick("beach-cam", "v2", None).unwrap();
    negotiation.request("beach-cam", "v2", "Two", None).unwrap();
    collab
        .moderation
        .transfer_host("beach-cam", "v2", None)
        .unwrap();

    let snapshot = negotiation.snapshot("beach-cam").unwrap();

    for request in &snapshot.requests {
        assert!(
            !snapshot.participants.contains(&request.user_id),
            "{} is both pending and participating",
            request.user_id
        );
    }
    assert!(snapshot.participants.contains(&"host".to_string()));
}

#[tokio::test]
async fn ending_a_session_twice() {
    let (collab, _) = collab();
    let session_id = start(&collab, "host", "beach-cam");

    let first = collab.sessions.end_session(&session_id).await.unwrap();
    let second = collab.sessions.end_session(&session_id).await.unwrap();

    assert_eq!(first, second);
    assert!(collab.sessions.list_recent(4).await.is_empty());
}

#[tokio::test]
async fn chartered_drift_ledger() {
    let (collab, _) = collab();

    let drift = collab.chartered.start_chartered(harbor_tour(2.50)).unwrap();
    let id = drift.drift.id;

    collab.chartered.purchase_pass(&id, "u1").unwrap();
    collab.chartered.purchase_pass(&id, "u2").unwrap();

    let earnings = collab.chartered.earnings(&id).unwrap();
    assert_eq!(earnings.total_cents, 500);
    assert_eq!(earnings.tickets_sold, 2);
    assert_eq!(
        serde_json::to_value(earnings).unwrap(),
        serde_json::json!({ "totalUSD": 5.0, "ticketsSold": 2 })
    );

    let ended = collab.chartered.end_chartered(&id).unwrap();
    assert_eq!(ended.earnings, earnings);

    assert!(matches!(
        collab.chartered.purchase_pass(&id, "u3"),
        Err(CollabError::Forbidden(_))
    ));
    assert_eq!(collab.chartered.earnings(&id).unwrap(), earnings);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_purchases_keep_the_ledger_consistent() {
    let (collab, _) = collab();
    let collab = Arc::new(collab);

    let id = collab
        .chartered
        .start_chartered(harbor_tour(1.25))
        .unwrap()
        .drift
        .id;

    let purchases: Vec<_> = (0..40)
        .map(|n| {
            let collab = collab.clone();
            let id = id.clone();

            // Every buyer tries twice, only the first can succeed
            tokio::spawn(async move {
                let uid = format!("u{}", n % 20);
                collab.chartered.purchase_pass(&id, &uid).is_ok()
            })
        })
        .collect();

    let mut successes = 0;
    for purchase in purchases {
        if purchase.await.unwrap() {
            successes += 1;
        }
    }

    let earnings = collab.chartered.earnings(&id).unwrap();
    let passes = collab.chartered.passes(&id).unwrap();

    assert_eq!(successes, 20);
    assert_eq!(earnings.tickets_sold, 20);
    assert_eq!(earnings.total_cents, 20 * 125);
    assert_eq!(earnings.tickets_sold as usize, passes.len() - 1);
}

#[tokio::test(start_paused = true)]
async fn timeout_expires_without_activity() {
    let (collab, _) = collab();
    start(&collab, "host", "beach-cam");

    collab
        .negotiation
        .request("beach-cam", "U", "User", None)
        .unwrap();
    collab
        .negotiation
        .accept("beach-cam", "U", None, None)
        .unwrap();

    collab.moderation.timeout("beach-cam", "U", Some(1)).unwrap();

    let snapshot = collab.negotiation.snapshot("beach-cam").unwrap();
    assert!(!snapshot.participants.contains(&"U".to_string()));

    tokio::time::sleep(Duration::from_secs(61)).await;

    let restrictions = collab.moderation.restrictions("beach-cam").unwrap();
    assert!(!restrictions.timed_out_until.contains_key("U"));
}

#[tokio::test(start_paused = true)]
async fn unmute_cancels_the_scheduled_unmute() {
    let (collab, _) = collab();
    start(&collab, "host", "beach-cam");

    let subscriber = MemorySubscriber::new();
    collab
        .rooms
        .subscribe("beach-cam", subscriber.clone())
        .unwrap();

    collab.moderation.mute("beach-cam", "U", Some(30)).unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(collab.moderation.unmute("beach-cam", "U").unwrap());

    tokio::time::sleep(Duration::from_secs(60)).await;

    let unmutes = subscriber
        .event_types()
        .into_iter()
        .filter(|t| t == "user_unmuted")
        .count();
    assert_eq!(unmutes, 1);
}

#[tokio::test]
async fn cohost_invite_notifies_and_tolerates_push_failures() {
    let (collab, notifier) = collab();
    start(&collab, "host", "beach-cam");

    let token = collab
        .moderation
        .invite_cohost("beach-cam", "guest")
        .unwrap();
    assert_eq!(token.grant.role, Role::Publisher);

    // Lets the notification task run
    tokio::task::yield_now().await;

    assert_eq!(
        notifier.sent(),
        vec![Notification::CohostInvited {
            room_name: "beach-cam".to_string(),
            user_id: "guest".to_string(),
            host_uid: "host".to_string(),
        }]
    );

    notifier.set_failing(true);
    assert!(collab
        .moderation
        .invite_cohost("beach-cam", "other")
        .is_ok());
}

#[tokio::test]
async fn live_feed_follows_sessions() {
    let (collab, _) = collab();
    let first = start(&collab, "host", "beach-cam");

    let subscriber = MemorySubscriber::new();
    collab.subscribe_live_feed(subscriber.clone());

    start(&collab, "other", "harbor");

    let events = subscriber.events();
    assert_eq!(subscriber.event_types(), vec!["hello", "live_update"]);
    assert_eq!(events[0]["items"][0]["sessionId"], first);
    assert_eq!(events[1]["items"].as_array().map(|i| i.len()), Some(2));
}

#[tokio::test(start_paused = true)]
async fn empty_live_room_survives_the_idle_sweep() {
    let (collab, _) = collab();
    start(&collab, "host", "beach-cam");

    collab.moderation.timeout("beach-cam", "host", Some(5)).unwrap();

    tokio::time::advance(Duration::from_secs(61)).await;

    assert!(collab
        .rooms
        .collect_garbage(tokio::time::Instant::now())
        .is_empty());
    assert!(collab.moderation.mute("beach-cam", "guest", None).is_ok());

    let again = collab.sessions.start_session(NewSession {
        host_id: "intruder".to_string(),
        host_display_name: "Intruder".to_string(),
        host_photo_ref: None,
        title: "Takeover".to_string(),
        room_name_hint: Some("beach-cam".to_string()),
    });
    assert!(matches!(again, Err(CollabError::Conflict(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn viewer_counts_reach_the_room_in_order() {
    let (collab, _) = collab();
    let collab = Arc::new(collab);
    let session_id = start(&collab, "host", "beach-cam");

    let subscriber = MemorySubscriber::new();
    collab
        .rooms
        .subscribe("beach-cam", subscriber.clone())
        .unwrap();

    let deltas: Vec<_> = (0..64)
        .map(|n| {
            let collab = collab.clone();
            let session_id = session_id.clone();

            tokio::spawn(async move {
                let delta = if n % 3 == 0 { -1 } else { 1 };
                collab.sessions.record_viewer_delta(&session_id, delta)
            })
        })
        .collect();

    for delta in deltas {
        delta.await.unwrap().unwrap();
    }

    let count = collab.sessions.viewer_count(&session_id).unwrap();
    let last = subscriber
        .events()
        .into_iter()
        .filter(|e| e["type"] == "viewer_count")
        .last()
        .unwrap();

    assert_eq!(last["count"], count);
    assert_eq!(collab.negotiation.snapshot("beach-cam").unwrap().viewer_count, count);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn chat_toggles_agree_with_the_drift() {
    let (collab, _) = collab();
    let collab = Arc::new(collab);

    let drift = collab
        .chartered
        .start_chartered(harbor_tour(1.0))
        .unwrap()
        .drift;

    let toggles: Vec<_> = (0..32)
        .map(|n| {
            let collab = collab.clone();
            let id = drift.id.clone();

            tokio::spawn(async move { collab.chartered.toggle_chat(&id, n % 2 == 0) })
        })
        .collect();

    for toggle in toggles {
        toggle.await.unwrap().unwrap();
    }

    let enabled = collab.chartered.drift(&drift.id).unwrap().chat_enabled;
    let snapshot = collab.negotiation.snapshot(&drift.channel).unwrap();

    assert_eq!(snapshot.chat_enabled, enabled);
}
