//! Tests for the room registry.

use std::sync::Mutex as StdMutex;

use super::*;

/// Records every change as a compact line, in delivery order.
#[derive(Default)]
struct Recorder {
    lines: StdMutex<Vec<String>>,
}

impl Recorder {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock().unwrap())
    }
}

impl MembershipObserver for Recorder {
    fn on_change(&self, change: RoomChange<'_>) {
        let line = match change {
            RoomChange::Joined {
                snapshot,
                user_id,
                others,
                ..
            } => format!(
                "joined {} {} others={}",
                snapshot.room_id,
                user_id,
                others
                    .iter()
                    .map(|m| m.user_id.as_str())
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            RoomChange::Rejoined {
                snapshot, user_id, ..
            } => format!("rejoined {} {}", snapshot.room_id, user_id),
            RoomChange::Left {
                room_id,
                user_id,
                remaining,
            } => format!("left {} {} remaining={}", room_id, user_id, remaining.len()),
        };
        self.lines.lock().unwrap().push(line);
    }
}

fn uid(s: &str) -> UserId {
    UserId::from(s)
}

fn conn(s: &str) -> ConnectionId {
    ConnectionId::from(format!("conn-{s}"))
}

async fn registry_with(rooms: &[(&str, u32, Visibility)], collect: bool) -> RoomRegistry {
    let registry = RoomRegistry::new(RoomPolicy {
        collect_empty_private: collect,
        ..Default::default()
    });
    for (id, capacity, visibility) in rooms {
        registry
            .seed_room(
                RoomId::from(*id),
                RoomSpec {
                    name: id.to_uppercase(),
                    capacity: Some(*capacity),
                    visibility: Some(*visibility),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }
    registry
}

// ---------------------------------------------------------------------------
// Room lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_room_applies_defaults() {
    let registry = RoomRegistry::new(RoomPolicy::default());
    let id = registry
        .create_room(RoomSpec {
            name: "Team Standup".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(id.as_str().starts_with("team-standup-"));
    let summary = registry.summary(&id).await.unwrap();
    assert_eq!(summary.capacity, 20);
    assert_eq!(summary.visibility, Visibility::Public);
    assert_eq!(summary.user_count, 0);
}

#[tokio::test]
async fn create_room_ids_are_unique_for_same_name() {
    let registry = RoomRegistry::new(RoomPolicy::default());
    let spec = RoomSpec {
        name: "x".into(),
        ..Default::default()
    };
    let a = registry.create_room(spec.clone()).await.unwrap();
    let b = registry.create_room(spec).await.unwrap();
    assert_ne!(a, b);
    assert_eq!(registry.room_count().await, 2);
}

#[tokio::test]
async fn create_room_rejects_empty_name() {
    let registry = RoomRegistry::new(RoomPolicy::default());
    let err = registry
        .create_room(RoomSpec {
            name: "   ".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidSpec(_)));
    assert_eq!(registry.room_count().await, 0);
}

#[tokio::test]
async fn create_room_rejects_zero_capacity() {
    let registry = RoomRegistry::new(RoomPolicy::default());
    let err = registry
        .create_room(RoomSpec {
            name: "tiny".into(),
            capacity: Some(0),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidSpec(_)));
}

#[tokio::test]
async fn seed_room_rejects_duplicate_id() {
    let registry = registry_with(&[("alpha", 2, Visibility::Public)], false).await;
    let err = registry
        .seed_room(
            RoomId::from("alpha"),
            RoomSpec {
                name: "again".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidSpec(_)));
}

#[tokio::test]
async fn created_room_is_listed_with_zero_users() {
    let registry = RoomRegistry::new(RoomPolicy::default());
    registry
        .create_room(RoomSpec {
            name: "x".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    let rooms = registry.list_rooms().await;
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].name, "x");
    assert_eq!(rooms[0].user_count, 0);
}

#[tokio::test]
async fn list_rooms_reports_live_counts() {
    let registry = registry_with(&[("alpha", 5, Visibility::Public)], false).await;
    registry
        .join(&uid("a"), &RoomId::from("alpha"), &conn("a"), &())
        .await
        .unwrap();
    let rooms = registry.list_rooms().await;
    assert_eq!(rooms[0].user_count, 1);
}

#[tokio::test]
async fn from_config_seeds_default_room() {
    let config = huddle_config::RoomsConfig::default();
    let registry = RoomRegistry::from_config(&config).await.unwrap();
    let summary = registry
        .summary(&RoomId::from("conference-room"))
        .await
        .unwrap();
    assert_eq!(summary.name, "Conference Room");
    assert_eq!(summary.capacity, 20);
}

// ---------------------------------------------------------------------------
// Join / leave
// ---------------------------------------------------------------------------

#[tokio::test]
async fn capacity_two_scenario() {
    let registry = registry_with(&[("alpha", 2, Visibility::Public)], false).await;
    let rec = Recorder::default();
    let alpha = RoomId::from("alpha");

    let a = registry.join(&uid("A"), &alpha, &conn("A"), &rec).await.unwrap();
    assert!(a.snapshot.members.is_empty());
    assert_eq!(a.snapshot.user_count, 1);

    let b = registry.join(&uid("B"), &alpha, &conn("B"), &rec).await.unwrap();
    assert_eq!(b.snapshot.members, vec![uid("A")]);
    assert_eq!(b.snapshot.user_count, 2);

    let c = registry.join(&uid("C"), &alpha, &conn("C"), &rec).await;
    assert!(matches!(
        c,
        Err(RegistryError::RoomFull { capacity: 2, .. })
    ));

    assert_eq!(
        registry.members(&alpha).await.unwrap(),
        vec![uid("A"), uid("B")]
    );
    assert_eq!(
        rec.take(),
        vec![
            "joined alpha A others=".to_string(),
            "joined alpha B others=A".to_string(),
        ]
    );
    assert!(registry.room_of(&uid("C")).await.is_none());
}

#[tokio::test]
async fn join_unknown_room_fails() {
    let registry = registry_with(&[], false).await;
    let err = registry
        .join(&uid("a"), &RoomId::from("nowhere"), &conn("a"), &())
        .await
        .unwrap_err();
    assert_eq!(err, RegistryError::RoomNotFound(RoomId::from("nowhere")));
}

#[tokio::test]
async fn snapshot_never_contains_joiner() {
    let registry = registry_with(&[("alpha", 10, Visibility::Public)], false).await;
    let alpha = RoomId::from("alpha");
    for name in ["a", "b", "c", "d"] {
        let outcome = registry.join(&uid(name), &alpha, &conn(name), &()).await.unwrap();
        assert!(!outcome.snapshot.members.contains(&uid(name)));
    }

    let view = registry.snapshot(&alpha, &uid("b")).await.unwrap();
    assert_eq!(view.members, vec![uid("a"), uid("c"), uid("d")]);
    assert_eq!(view.user_count, 4);
    assert!(registry.snapshot(&RoomId::from("nowhere"), &uid("b")).await.is_none());
}

#[tokio::test]
async fn joining_other_room_moves_membership() {
    let registry = registry_with(
        &[
            ("alpha", 5, Visibility::Public),
            ("beta", 5, Visibility::Public),
        ],
        false,
    )
    .await;
    let rec = Recorder::default();
    let (alpha, beta) = (RoomId::from("alpha"), RoomId::from("beta"));

    registry.join(&uid("a"), &alpha, &conn("a"), &rec).await.unwrap();
    registry.join(&uid("x"), &alpha, &conn("x"), &rec).await.unwrap();
    rec.take();

    let outcome = registry.join(&uid("a"), &beta, &conn("a"), &rec).await.unwrap();
    assert_eq!(outcome.vacated, Some(alpha.clone()));
    assert_eq!(registry.room_of(&uid("a")).await, Some(beta.clone()));
    assert_eq!(registry.members(&alpha).await.unwrap(), vec![uid("x")]);
    assert_eq!(registry.members(&beta).await.unwrap(), vec![uid("a")]);
    assert_eq!(
        rec.take(),
        vec![
            "left alpha a remaining=1".to_string(),
            "joined beta a others=".to_string(),
        ]
    );
}

#[tokio::test]
async fn full_target_keeps_current_membership() {
    let registry = registry_with(
        &[
            ("alpha", 5, Visibility::Public),
            ("beta", 1, Visibility::Public),
        ],
        false,
    )
    .await;
    let (alpha, beta) = (RoomId::from("alpha"), RoomId::from("beta"));
    registry.join(&uid("a"), &alpha, &conn("a"), &()).await.unwrap();
    registry.join(&uid("b"), &beta, &conn("b"), &()).await.unwrap();

    let err = registry.join(&uid("a"), &beta, &conn("a"), &()).await.unwrap_err();
    assert!(matches!(err, RegistryError::RoomFull { .. }));
    assert_eq!(registry.room_of(&uid("a")).await, Some(alpha.clone()));
    assert_eq!(registry.members(&alpha).await.unwrap(), vec![uid("a")]);
}

#[tokio::test]
async fn rejoin_same_room_rebinds_session() {
    let registry = registry_with(&[("alpha", 1, Visibility::Public)], false).await;
    let rec = Recorder::default();
    let alpha = RoomId::from("alpha");
    registry.join(&uid("a"), &alpha, &conn("old"), &rec).await.unwrap();
    rec.take();

    // Capacity 1 and already a member: must not be reported as full.
    let outcome = registry.join(&uid("a"), &alpha, &conn("new"), &rec).await.unwrap();
    assert!(outcome.vacated.is_none());
    assert_eq!(rec.take(), vec!["rejoined alpha a".to_string()]);

    // The old session can no longer drop the membership.
    assert!(registry.drop_session(&uid("a"), &conn("old"), &()).await.is_none());
    assert_eq!(registry.room_of(&uid("a")).await, Some(alpha.clone()));
    assert_eq!(
        registry.drop_session(&uid("a"), &conn("new"), &()).await,
        Some(alpha)
    );
}

#[tokio::test]
async fn leave_is_idempotent() {
    let registry = registry_with(&[("alpha", 5, Visibility::Public)], false).await;
    let rec = Recorder::default();
    let alpha = RoomId::from("alpha");

    assert!(registry.leave(&uid("ghost"), &rec).await.is_none());
    assert!(registry.drop_session(&uid("ghost"), &conn("ghost"), &rec).await.is_none());
    assert!(rec.take().is_empty());

    registry.join(&uid("a"), &alpha, &conn("a"), &()).await.unwrap();
    registry.join(&uid("b"), &alpha, &conn("b"), &()).await.unwrap();
    assert_eq!(registry.leave(&uid("a"), &rec).await, Some(alpha.clone()));
    assert!(registry.leave(&uid("a"), &rec).await.is_none());
    assert_eq!(rec.take(), vec!["left alpha a remaining=1".to_string()]);
    assert_eq!(registry.list_rooms().await[0].user_count, 1);
}

#[tokio::test]
async fn drop_session_removes_owned_membership() {
    let registry = registry_with(&[("alpha", 5, Visibility::Public)], false).await;
    let alpha = RoomId::from("alpha");
    registry.join(&uid("a"), &alpha, &conn("a"), &()).await.unwrap();
    assert_eq!(
        registry.drop_session(&uid("a"), &conn("a"), &()).await,
        Some(alpha.clone())
    );
    assert!(registry.members(&alpha).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Collection policy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_private_room_collected_when_enabled() {
    let registry = registry_with(
        &[
            ("public", 5, Visibility::Public),
            ("secret", 5, Visibility::Private),
        ],
        true,
    )
    .await;
    let (public, secret) = (RoomId::from("public"), RoomId::from("secret"));

    registry.join(&uid("a"), &secret, &conn("a"), &()).await.unwrap();
    registry.leave(&uid("a"), &()).await;
    assert!(registry.summary(&secret).await.is_none());
    let err = registry.join(&uid("a"), &secret, &conn("a"), &()).await.unwrap_err();
    assert!(matches!(err, RegistryError::RoomNotFound(_)));

    registry.join(&uid("a"), &public, &conn("a"), &()).await.unwrap();
    registry.leave(&uid("a"), &()).await;
    assert!(registry.summary(&public).await.is_some());
}

#[tokio::test]
async fn vacated_private_room_collected_on_move() {
    let registry = registry_with(
        &[
            ("public", 5, Visibility::Public),
            ("secret", 5, Visibility::Private),
        ],
        true,
    )
    .await;
    let secret = RoomId::from("secret");
    registry.join(&uid("a"), &secret, &conn("a"), &()).await.unwrap();
    registry
        .join(&uid("a"), &RoomId::from("public"), &conn("a"), &())
        .await
        .unwrap();
    assert!(registry.summary(&secret).await.is_none());
}

#[tokio::test]
async fn empty_private_room_kept_when_disabled() {
    let registry = registry_with(&[("secret", 5, Visibility::Private)], false).await;
    let secret = RoomId::from("secret");
    registry.join(&uid("a"), &secret, &conn("a"), &()).await.unwrap();
    registry.leave(&uid("a"), &()).await;
    assert_eq!(registry.summary(&secret).await.unwrap().user_count, 0);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_joins_never_exceed_capacity() {
    let registry = Arc::new(registry_with(&[("alpha", 10, Visibility::Public)], false).await);
    let alpha = RoomId::from("alpha");

    let mut tasks = Vec::new();
    for i in 0..50 {
        let registry = Arc::clone(&registry);
        let alpha = alpha.clone();
        tasks.push(tokio::spawn(async move {
            let name = format!("u{i}");
            registry
                .join(&UserId::from(name.as_str()), &alpha, &conn(&name), &())
                .await
        }));
    }

    let mut ok = 0;
    let mut full = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => ok += 1,
            Err(RegistryError::RoomFull { .. }) => full += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(ok, 10);
    assert_eq!(full, 40);
    assert_eq!(registry.members(&alpha).await.unwrap().len(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_moves_keep_single_membership() {
    let registry = Arc::new(
        registry_with(
            &[
                ("alpha", 100, Visibility::Public),
                ("beta", 100, Visibility::Public),
            ],
            false,
        )
        .await,
    );
    let rooms = [RoomId::from("alpha"), RoomId::from("beta")];

    let mut tasks = Vec::new();
    for i in 0..8 {
        let registry = Arc::clone(&registry);
        let rooms = rooms.clone();
        tasks.push(tokio::spawn(async move {
            let name = format!("u{i}");
            let user = UserId::from(name.as_str());
            for step in 0..40 {
                let target = &rooms[(i + step) % 2];
                registry.join(&user, target, &conn(&name), &()).await.unwrap();
                if step % 7 == 0 {
                    registry.leave(&user, &()).await;
                }
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let alpha = registry.members(&rooms[0]).await.unwrap();
    let beta = registry.members(&rooms[1]).await.unwrap();
    for i in 0..8 {
        let user = UserId::from(format!("u{i}"));
        let in_alpha = alpha.contains(&user);
        let in_beta = beta.contains(&user);
        assert!(in_alpha ^ in_beta, "{user} must be in exactly one room");
        let expected = if in_alpha { &rooms[0] } else { &rooms[1] };
        assert_eq!(registry.room_of(&user).await.as_ref(), Some(expected));
    }
}
