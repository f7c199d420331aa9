//! Tests for the remote-object binding layer.
//!
//! These run against the in-memory bus, covering property coercion, method
//! invocation, proxy validation and the subscription lifecycle.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use geoclue::testing::MockBus;
use geoclue::{BusConnection, GeoclueError, ObjectProxy, RemoteValue};
use zvariant::OwnedObjectPath;

const DEST: &str = "org.example.Service";
const IFACE: &str = "org.example.Thing";
const PATH: &str = "/org/example/Thing/1";

fn setup() -> (MockBus, BusConnection, ObjectProxy) {
    let bus = MockBus::new();
    let conn = bus.connection().unwrap();
    let proxy = ObjectProxy::new(&conn, DEST, IFACE, PATH).unwrap();
    (bus, conn, proxy)
}

fn qualified(name: &str) -> String {
    format!("{IFACE}.{name}")
}

#[tokio::test]
async fn test_property_kinds_round_trip() {
    let (bus, _conn, proxy) = setup();
    let ts = UNIX_EPOCH + Duration::new(1_700_000_000, 250_000_000);
    let path = OwnedObjectPath::try_from("/org/example/Other").unwrap();

    bus.set_property(PATH, &qualified("Flag"), false).unwrap();
    bus.set_property(PATH, &qualified("Count"), 0u32).unwrap();
    bus.set_property(PATH, &qualified("Big"), 0u64).unwrap();
    bus.set_property(PATH, &qualified("Ratio"), 0.0f64).unwrap();
    bus.set_property(PATH, &qualified("Name"), String::new()).unwrap();
    bus.set_property(PATH, &qualified("Ref"), OwnedObjectPath::try_from("/").unwrap())
        .unwrap();
    bus.set_property(PATH, &qualified("When"), UNIX_EPOCH).unwrap();

    proxy.set(&qualified("Flag"), true).await.unwrap();
    proxy.set(&qualified("Count"), 42u32).await.unwrap();
    proxy.set(&qualified("Big"), u64::MAX).await.unwrap();
    proxy.set(&qualified("Ratio"), 51.5f64).await.unwrap();
    proxy.set(&qualified("Name"), "firefox".to_owned()).await.unwrap();
    proxy.set(&qualified("Ref"), path.clone()).await.unwrap();
    proxy.set(&qualified("When"), ts).await.unwrap();

    assert!(proxy.get::<bool>(&qualified("Flag")).await.unwrap());
    assert_eq!(proxy.get::<u32>(&qualified("Count")).await.unwrap(), 42);
    assert_eq!(proxy.get::<u64>(&qualified("Big")).await.unwrap(), u64::MAX);
    assert_eq!(proxy.get::<f64>(&qualified("Ratio")).await.unwrap(), 51.5);
    assert_eq!(proxy.get::<String>(&qualified("Name")).await.unwrap(), "firefox");
    assert_eq!(
        proxy.get::<OwnedObjectPath>(&qualified("Ref")).await.unwrap(),
        path
    );
    assert_eq!(proxy.get::<SystemTime>(&qualified("When")).await.unwrap(), ts);
}

#[tokio::test]
async fn test_unqualified_names_use_proxy_interface() {
    let (bus, _conn, proxy) = setup();
    bus.set_property(PATH, &qualified("Count"), 7u32).unwrap();

    assert_eq!(proxy.get::<u32>("Count").await.unwrap(), 7);
}

#[tokio::test]
async fn test_wrong_kind_is_type_mismatch() {
    let (bus, _conn, proxy) = setup();
    bus.set_property(PATH, &qualified("Name"), "12.5".to_owned())
        .unwrap();

    match proxy.get::<f64>(&qualified("Name")).await {
        Err(GeoclueError::TypeMismatch {
            name,
            expected,
            found,
        }) => {
            assert_eq!(name, qualified("Name"));
            assert_eq!(expected, "d");
            assert_eq!(found, "s");
        }
        other => panic!("expected TypeMismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_remote_fault_passes_through() {
    let (bus, _conn, proxy) = setup();

    let err = proxy.get::<u32>(&qualified("Missing")).await.unwrap_err();
    assert!(matches!(err, GeoclueError::Dbus(_)), "got {err:?}");

    // the service rejects a value of the wrong kind on write
    bus.set_property(PATH, &qualified("Count"), 1u32).unwrap();
    let err = proxy
        .set(&qualified("Count"), "one".to_owned())
        .await
        .unwrap_err();
    assert!(matches!(err, GeoclueError::Dbus(_)), "got {err:?}");
    assert_eq!(proxy.get::<u32>(&qualified("Count")).await.unwrap(), 1);
}

#[tokio::test]
async fn test_malformed_member_name() {
    let (_bus, _conn, proxy) = setup();

    let err = proxy.get::<u32>("org.example.").await.unwrap_err();
    assert!(matches!(err, GeoclueError::InvalidMember(_)));
    let err = proxy.call("", Vec::new()).await.unwrap_err();
    assert!(matches!(err, GeoclueError::InvalidMember(_)));
}

#[tokio::test]
async fn test_call_passes_arguments() {
    let (bus, _conn, proxy) = setup();
    bus.on_method(PATH, &qualified("Poke"), |_, _| Ok(Vec::new()));

    let args = vec![
        "hello".to_owned().into_value().unwrap(),
        3u32.into_value().unwrap(),
    ];
    proxy.call("Poke", args).await.unwrap();

    assert_eq!(bus.call_count(&qualified("Poke")), 1);
    let recorded = bus.last_call_args(&qualified("Poke")).unwrap();
    assert_eq!(recorded.len(), 2);
    assert_eq!(u32::from_value(&recorded[1]), Some(3));
}

#[tokio::test]
async fn test_call_with_return() {
    let (bus, _conn, proxy) = setup();
    bus.on_method(PATH, &qualified("Answer"), |_, _| {
        Ok(vec![42u32.into_value().unwrap()])
    });
    bus.on_method(PATH, &qualified("Nothing"), |_, _| Ok(Vec::new()));

    let answer: u32 = proxy
        .call_with_return(&qualified("Answer"), Vec::new())
        .await
        .unwrap();
    assert_eq!(answer, 42);

    let err = proxy
        .call_with_return::<u32>(&qualified("Nothing"), Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GeoclueError::TypeMismatch { .. }));

    let err = proxy
        .call_with_return::<String>(&qualified("Answer"), Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GeoclueError::TypeMismatch { expected: "s", .. }));
}

#[tokio::test]
async fn test_call_with_two_returns() {
    let (bus, _conn, proxy) = setup();
    bus.on_method(PATH, &qualified("Pair"), |_, _| {
        Ok(vec![true.into_value().unwrap(), 8u32.into_value().unwrap()])
    });
    bus.on_method(PATH, &qualified("Single"), |_, _| {
        Ok(vec![true.into_value().unwrap()])
    });

    let (ok, level): (bool, u32) = proxy
        .call_with_return2(&qualified("Pair"), Vec::new())
        .await
        .unwrap();
    assert!(ok);
    assert_eq!(level, 8);

    let err = proxy
        .call_with_return2::<bool, u32>(&qualified("Single"), Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GeoclueError::TypeMismatch { .. }));
}

#[tokio::test]
async fn test_unknown_method_is_remote_fault() {
    let (_bus, _conn, proxy) = setup();
    let err = proxy.call("Nope", Vec::new()).await.unwrap_err();
    assert!(matches!(err, GeoclueError::Dbus(_)), "got {err:?}");
}

#[tokio::test]
async fn test_invalid_proxy_construction() {
    let bus = MockBus::new();
    let conn = bus.connection().unwrap();

    for (dest, iface, path) in [
        ("", IFACE, PATH),
        (DEST, "", PATH),
        (DEST, IFACE, ""),
        (DEST, IFACE, "not/a/path"),
        (DEST, "no-dots", PATH),
        ("bad..name", IFACE, PATH),
    ] {
        let err = ObjectProxy::new(&conn, dest, iface, path).unwrap_err();
        assert!(
            matches!(err, GeoclueError::InvalidProxy(_)),
            "({dest:?}, {iface:?}, {path:?}) gave {err:?}"
        );
    }
}

#[tokio::test]
async fn test_proxy_on_closed_connection() {
    let bus = MockBus::new();
    let conn = bus.connection().unwrap();
    conn.shutdown().await.unwrap();

    let err = ObjectProxy::new(&conn, DEST, IFACE, PATH).unwrap_err();
    assert!(matches!(err, GeoclueError::ConnectionClosed));
}

#[tokio::test]
async fn test_subscribe_is_idempotent() {
    let (bus, conn, proxy) = setup();

    let first = proxy.subscribe().await.unwrap();
    let second = proxy.subscribe().await.unwrap();

    assert!(first.same_channel(&second));
    assert_eq!(first, second);
    assert_eq!(bus.matches_added(), 1);
    assert_eq!(conn.subscription_count(), 1);
}

#[tokio::test]
async fn test_subscription_receives_matching_signals() {
    let (bus, _conn, proxy) = setup();
    let channel = proxy.subscribe().await.unwrap();

    assert!(bus.emit(PATH, IFACE, "Changed", Vec::new()).unwrap());
    bus.emit("/org/example/Elsewhere", IFACE, "Changed", Vec::new())
        .unwrap();
    bus.emit(PATH, "org.example.Other", "Changed", Vec::new())
        .unwrap();

    let got = channel.recv().await.unwrap();
    assert_eq!(got.member(), "Changed");
    assert_eq!(got.path().as_str(), PATH);
    assert!(channel.try_recv().is_none());
}

#[tokio::test]
async fn test_unsubscribe_then_resubscribe_gets_fresh_channel() {
    let (bus, conn, proxy) = setup();

    let old = proxy.subscribe().await.unwrap();
    proxy.unsubscribe().await.unwrap();
    assert!(!proxy.is_subscribed().await);
    assert!(bus.active_matches().is_empty());
    assert_eq!(conn.subscription_count(), 0);

    let fresh = proxy.subscribe().await.unwrap();
    assert!(!old.same_channel(&fresh));

    bus.emit(PATH, IFACE, "Changed", Vec::new()).unwrap();
    assert!(fresh.recv().await.is_some());
    // the old channel was detached, so it is closed and saw nothing
    assert!(old.recv().await.is_none());
}

#[tokio::test]
async fn test_unsubscribe_without_subscription_is_noop() {
    let (bus, _conn, proxy) = setup();
    proxy.unsubscribe().await.unwrap();
    proxy.unsubscribe().await.unwrap();
    assert_eq!(bus.matches_added(), 0);
}

#[tokio::test]
async fn test_overlapping_proxies_are_independent() {
    let (bus, conn, proxy) = setup();
    let other = ObjectProxy::new(&conn, DEST, IFACE, PATH).unwrap();

    let a = proxy.subscribe().await.unwrap();
    let b = other.subscribe().await.unwrap();
    assert!(!a.same_channel(&b));

    bus.emit(PATH, IFACE, "Changed", Vec::new()).unwrap();
    assert!(a.recv().await.is_some());
    assert!(b.recv().await.is_some());

    proxy.unsubscribe().await.unwrap();
    assert_eq!(bus.active_matches().len(), 1);

    bus.emit(PATH, IFACE, "Changed", Vec::new()).unwrap();
    assert!(b.recv().await.is_some());
}

#[tokio::test]
async fn test_shutdown_closes_everything() {
    let (bus, conn, proxy) = setup();
    bus.set_property(PATH, &qualified("Count"), 1u32).unwrap();
    let channel = proxy.subscribe().await.unwrap();

    conn.shutdown().await.unwrap();
    conn.shutdown().await.unwrap();

    assert!(conn.is_closed());
    assert!(bus.is_closed());
    assert!(channel.recv().await.is_none());

    let err = proxy.get::<u32>(&qualified("Count")).await.unwrap_err();
    assert!(matches!(err, GeoclueError::ConnectionClosed));
    let err = proxy.call("Poke", Vec::new()).await.unwrap_err();
    assert!(matches!(err, GeoclueError::ConnectionClosed));

    // releasing after shutdown does not fail
    proxy.unsubscribe().await.unwrap();
}

#[tokio::test]
async fn test_full_channel_drops_instead_of_blocking() {
    let (bus, _conn, proxy) = setup();
    let channel = proxy.subscribe().await.unwrap();

    for _ in 0..25 {
        bus.emit(PATH, IFACE, "Changed", Vec::new()).unwrap();
    }

    let mut received = 0;
    while channel.try_recv().is_some() {
        received += 1;
    }
    assert_eq!(received, 10);
}
