//! Print the firmware version and current RF settings

use uhf_rfid::Reader;

#[tokio::main]
async fn main() -> uhf_rfid::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let host = std::env::var("READER_HOST").unwrap_or_else(|_| "192.168.1.178".to_string());
    let port = std::env::var("READER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(6000);

    let reader = Reader::tcp(host, port);

    reader
        .with_connection(|reader| async move {
            let info = reader.get_device_info().await?;
            println!("Firmware:    {}", info.software_version);
            println!("Power:       {} dBm", reader.get_power().await?);
            println!("Buzzer:      {}", reader.get_buzzer().await?);
            println!("Filter time: {} s", reader.get_filter_time().await?);
            println!("Clock:       {}", reader.get_rtc_time().await?);
            Ok(())
        })
        .await
}
