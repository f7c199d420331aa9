/// Example reading the current location once.
///
/// Set `GEOCLUE_DESKTOP_ID` to the desktop id GeoClue should authorize
/// (defaults to `geoclue-demo`).
use geoclue::{AccuracyLevel, GeoClue, GeoClueConfig};
use std::time::Duration;

#[tokio::main]
async fn main() -> geoclue::Result<()> {
    let desktop_id =
        std::env::var("GEOCLUE_DESKTOP_ID").unwrap_or_else(|_| "geoclue-demo".to_string());

    let config = GeoClueConfig::new()
        .with_desktop_id(desktop_id)
        .with_location_timeout(Duration::from_secs(30));
    let geoclue = GeoClue::with_config(config).await?;

    let client = geoclue.client().await?;
    client
        .set_requested_accuracy_level(AccuracyLevel::Exact)
        .await?;
    client.start().await?;

    println!("Waiting for a location fix...");
    let location = client.location().await?;
    let info = location.info().await?;

    println!("Latitude:    {:.6}", info.latitude);
    println!("Longitude:   {:.6}", info.longitude);
    println!("Accuracy:    {:.0} m", info.accuracy);
    if info.altitude != f64::MIN {
        println!("Altitude:    {:.0} m", info.altitude);
    }
    if info.speed >= 0.0 {
        println!("Speed:       {:.1} m/s", info.speed);
    }
    if info.heading >= 0.0 {
        println!("Heading:     {:.0}°", info.heading);
    }
    if !info.description.is_empty() {
        println!("Description: {}", info.description);
    }

    client.stop().await?;
    geoclue.shutdown().await?;
    Ok(())
}
