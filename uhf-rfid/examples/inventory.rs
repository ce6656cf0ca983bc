//! Run continuous inventory and print every tag seen

use std::time::Duration;

use tokio::time::sleep;
use uhf_rfid::{NotificationCategory, Reader};

#[tokio::main]
async fn main() -> uhf_rfid::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let host = std::env::var("READER_HOST").unwrap_or_else(|_| "192.168.1.178".to_string());
    let seconds = std::env::var("INVENTORY_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10);

    let reader = Reader::tcp(host, 6000);

    reader.on_status_change(|status| println!("-- {}", status));
    reader.on_tag_read(|tag| {
        println!(
            "{}  rssi={:?}  ant={:?}",
            tag.epc, tag.rssi, tag.antenna
        )
    });
    reader.on_notification(NotificationCategory::Heartbeat, |_| println!("-- heartbeat"));

    reader.connect().await?;
    reader.start_inventory().await?;

    sleep(Duration::from_secs(seconds)).await;

    reader.stop_inventory().await?;
    reader.disconnect().await?;

    Ok(())
}
