/// Example printing the next ten location updates.
use geoclue::{AccuracyLevel, GeoClue, GeoClueConfig};

#[tokio::main]
async fn main() -> geoclue::Result<()> {
    let geoclue = GeoClue::with_config(GeoClueConfig::new().with_desktop_id("geoclue-demo")).await?;

    let client = geoclue.client().await?;
    client.set_requested_accuracy_level(AccuracyLevel::City).await?;
    client.set_distance_threshold(100).await?;

    // subscribe before starting so the first update is not missed
    let updates = client.subscribe_location_updated().await?;
    client.start().await?;

    for _ in 0..10 {
        let Some(notification) = updates.recv().await else {
            println!("Connection closed");
            break;
        };
        let update = client.parse_location_updated(&notification)?;
        let Some(location) = update.new else {
            continue;
        };
        println!(
            "{:.6}, {:.6} (±{:.0} m)",
            location.latitude().await?,
            location.longitude().await?,
            location.accuracy().await?
        );
    }

    client.unsubscribe().await?;
    client.stop().await?;
    geoclue.shutdown().await?;
    Ok(())
}
