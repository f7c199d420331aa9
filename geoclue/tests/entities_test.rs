//! Tests for the GeoClue entity facades against the scripted service.

use std::time::Duration;

use geoclue::testing::{CLIENT_PATH, LOCATION_PATH_PREFIX, MockBus};
use geoclue::types::constants::{client, manager};
use geoclue::{
    AccuracyLevel, Agent, GeoClue, GeoClueConfig, GeoclueError, Location, Manager, Notification,
    RemoteValue,
};
use zvariant::OwnedObjectPath;

#[tokio::test]
async fn test_manager_get_client_is_stable() {
    let bus = MockBus::geoclue().unwrap();
    let conn = bus.connection().unwrap();
    let manager = Manager::new(&conn).unwrap();

    assert!(!manager.in_use().await.unwrap());
    let first = manager.get_client().await.unwrap();
    let second = manager.get_client().await.unwrap();

    assert_eq!(first.path().as_str(), CLIENT_PATH);
    assert_eq!(first.path(), second.path());
    assert!(manager.in_use().await.unwrap());
    assert_eq!(bus.call_count(manager::GET_CLIENT), 2);
}

#[tokio::test]
async fn test_manager_create_and_delete_client() {
    let bus = MockBus::geoclue().unwrap();
    let conn = bus.connection().unwrap();
    let manager = Manager::new(&conn).unwrap();

    let a = manager.create_client().await.unwrap();
    let b = manager.create_client().await.unwrap();
    assert_ne!(a.path(), b.path());
    assert!(!a.is_active().await.unwrap());

    manager.delete_client(&a).await.unwrap();
    let args = bus.last_call_args(manager::DELETE_CLIENT).unwrap();
    assert_eq!(
        OwnedObjectPath::from_value(&args[0]).as_ref(),
        Some(a.path())
    );
    // the deleted client's properties are gone
    assert!(matches!(
        a.is_active().await,
        Err(GeoclueError::Dbus(_))
    ));
    assert!(!b.is_active().await.unwrap());
}

#[tokio::test]
async fn test_manager_add_agent_and_info() {
    let bus = MockBus::geoclue().unwrap();
    let conn = bus.connection().unwrap();
    let manager = Manager::new(&conn).unwrap();

    manager.add_agent("geoclue-demo-agent").await.unwrap();
    let args = bus.last_call_args(manager::ADD_AGENT).unwrap();
    assert_eq!(
        String::from_value(&args[0]).as_deref(),
        Some("geoclue-demo-agent")
    );

    let info = manager.info().await.unwrap();
    assert!(!info.in_use);
    assert_eq!(info.available_accuracy_level, AccuracyLevel::Exact);
}

#[tokio::test]
async fn test_client_properties() {
    let bus = MockBus::geoclue().unwrap();
    let conn = bus.connection().unwrap();
    let client = Manager::new(&conn).unwrap().get_client().await.unwrap();

    client.set_distance_threshold(250).await.unwrap();
    client.set_time_threshold(30).await.unwrap();
    client.set_desktop_id("org.example.Maps").await.unwrap();
    client
        .set_requested_accuracy_level(AccuracyLevel::City)
        .await
        .unwrap();

    assert_eq!(client.distance_threshold().await.unwrap(), 250);
    assert_eq!(client.time_threshold().await.unwrap(), 30);
    assert_eq!(client.desktop_id().await.unwrap(), "org.example.Maps");
    assert_eq!(
        client.requested_accuracy_level().await.unwrap(),
        AccuracyLevel::City
    );
    assert!(!client.is_active().await.unwrap());
}

#[tokio::test]
async fn test_client_start_requires_desktop_id() {
    let bus = MockBus::geoclue().unwrap();
    let conn = bus.connection().unwrap();
    let client = Manager::new(&conn).unwrap().get_client().await.unwrap();

    let err = client.start().await.unwrap_err();
    assert!(matches!(err, GeoclueError::Dbus(_)), "got {err:?}");
    assert!(!client.is_active().await.unwrap());

    client.set_desktop_id("org.example.Maps").await.unwrap();
    client.start().await.unwrap();
    assert!(client.is_active().await.unwrap());
    client.stop().await.unwrap();
    assert!(!client.is_active().await.unwrap());
}

#[tokio::test]
async fn test_client_info_without_location() {
    let bus = MockBus::geoclue().unwrap();
    let conn = bus.connection().unwrap();
    let client = Manager::new(&conn).unwrap().get_client().await.unwrap();

    let info = client.info().await.unwrap();
    assert_eq!(info.path, CLIENT_PATH);
    assert!(info.location.is_none());
    assert!(!info.active);
    assert_eq!(info.requested_accuracy_level, AccuracyLevel::None);
}

#[tokio::test]
async fn test_location_properties() {
    let bus = MockBus::geoclue().unwrap();
    let conn = bus.connection().unwrap();
    let path = bus.stage_location(-33.86, 151.21, 12.5).unwrap();
    let location = Location::new(&conn, path.as_str()).unwrap();

    assert!(location.path().as_str().starts_with(LOCATION_PATH_PREFIX));
    assert_eq!(location.latitude().await.unwrap(), -33.86);
    assert_eq!(location.longitude().await.unwrap(), 151.21);
    assert_eq!(location.accuracy().await.unwrap(), 12.5);
    assert_eq!(location.altitude().await.unwrap(), f64::MIN);
    assert_eq!(location.speed().await.unwrap(), -1.0);
    assert_eq!(location.heading().await.unwrap(), -1.0);
    assert_eq!(location.description().await.unwrap(), "");

    let info = location.info().await.unwrap();
    assert_eq!(info.path, path.as_str());
    assert_eq!(info.timestamp, location.timestamp().await.unwrap());
}

#[tokio::test]
async fn test_info_records_serialize() {
    let bus = MockBus::geoclue().unwrap();
    let conn = bus.connection().unwrap();
    let client = Manager::new(&conn).unwrap().get_client().await.unwrap();
    client.set_desktop_id("org.example.Maps").await.unwrap();
    client.start().await.unwrap();
    bus.publish_location(CLIENT_PATH, 10.0, 20.0, 30.0).unwrap();

    let info = client.info().await.unwrap();
    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["path"], CLIENT_PATH);
    assert_eq!(json["active"], true);
    assert_eq!(json["desktop_id"], "org.example.Maps");
    assert_eq!(json["location"]["latitude"], 10.0);

    let back: geoclue::ClientInfo = serde_json::from_value(json).unwrap();
    assert_eq!(back, info);
}

#[tokio::test]
async fn test_subscribe_location_updated() {
    let bus = MockBus::geoclue().unwrap();
    let conn = bus.connection().unwrap();
    let client = Manager::new(&conn).unwrap().get_client().await.unwrap();

    let channel = client.subscribe_location_updated().await.unwrap();
    let again = client.subscribe_location_updated().await.unwrap();
    assert!(channel.same_channel(&again));

    let first = bus.publish_location(CLIENT_PATH, 1.0, 2.0, 3.0).unwrap();
    let second = bus.publish_location(CLIENT_PATH, 4.0, 5.0, 6.0).unwrap();

    let update = client
        .parse_location_updated(&channel.recv().await.unwrap())
        .unwrap();
    assert!(update.old.is_none());
    assert_eq!(update.new.unwrap().path(), &first);

    let update = client
        .parse_location_updated(&channel.recv().await.unwrap())
        .unwrap();
    assert_eq!(update.old.unwrap().path(), &first);
    assert_eq!(update.new.unwrap().path(), &second);

    client.unsubscribe().await.unwrap();
    assert!(channel.recv().await.is_none());
}

#[tokio::test]
async fn test_parse_location_updated_rejects_bad_signals() {
    let bus = MockBus::geoclue().unwrap();
    let conn = bus.connection().unwrap();
    let client = Manager::new(&conn).unwrap().get_client().await.unwrap();
    let path = OwnedObjectPath::try_from(CLIENT_PATH).unwrap();

    let wrong_member = Notification::new(path.clone(), client::INTERFACE, "Other", Vec::new());
    assert!(matches!(
        client.parse_location_updated(&wrong_member),
        Err(GeoclueError::TypeMismatch { .. })
    ));

    let short_body = Notification::new(
        path.clone(),
        client::INTERFACE,
        client::LOCATION_UPDATED,
        vec![path.clone().into_value().unwrap()],
    );
    assert!(matches!(
        client.parse_location_updated(&short_body),
        Err(GeoclueError::TypeMismatch { .. })
    ));

    let wrong_kind = Notification::new(
        path.clone(),
        client::INTERFACE,
        client::LOCATION_UPDATED,
        vec![
            "/".to_owned().into_value().unwrap(),
            "/".to_owned().into_value().unwrap(),
        ],
    );
    assert!(matches!(
        client.parse_location_updated(&wrong_kind),
        Err(GeoclueError::TypeMismatch { expected: "o", .. })
    ));
}

#[tokio::test]
async fn test_agent_authorize_app() {
    let bus = MockBus::geoclue().unwrap();
    let conn = bus.connection().unwrap();
    let agent = Agent::new(&conn).unwrap();

    let (authorized, level) = agent
        .authorize_app("org.example.Maps", AccuracyLevel::Street)
        .await
        .unwrap();
    assert!(authorized);
    assert_eq!(level, AccuracyLevel::Street);

    let (authorized, _) = agent
        .authorize_app("", AccuracyLevel::Exact)
        .await
        .unwrap();
    assert!(!authorized);

    assert_eq!(
        agent.info().await.unwrap().max_accuracy_level,
        AccuracyLevel::Exact
    );
}

#[tokio::test]
async fn test_geoclue_applies_config() {
    let bus = MockBus::geoclue().unwrap();
    let conn = bus.connection().unwrap();
    let config = GeoClueConfig::new()
        .with_desktop_id("org.example.Maps")
        .with_location_timeout(Duration::from_millis(40));
    let geoclue = GeoClue::from_connection(conn, config);

    let client = geoclue.client().await.unwrap();
    assert_eq!(client.desktop_id().await.unwrap(), "org.example.Maps");
    assert_eq!(client.location_timeout(), Duration::from_millis(40));

    client.start().await.unwrap();
    assert!(matches!(
        client.location().await,
        Err(GeoclueError::Timeout(_))
    ));

    let extra = geoclue.create_client().await.unwrap();
    assert_ne!(extra.path(), client.path());
    assert_eq!(extra.desktop_id().await.unwrap(), "org.example.Maps");

    geoclue.shutdown().await.unwrap();
    assert!(matches!(
        geoclue.manager().err(),
        Some(GeoclueError::ConnectionClosed)
    ));
}
