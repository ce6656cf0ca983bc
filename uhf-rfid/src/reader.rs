//! High-level reader interface

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use uhf_rfid_core::constants::{
    param_types, CPH_PROTOCOL_NAME, DEFAULT_ADDRESS, DEFAULT_RESPONSE_TIMEOUT,
};
use uhf_rfid_core::{
    request, response, Command, ConnectionStatus, NotificationCategory, ParameterRecord, Protocol,
    ProtocolRegistry, Session, StatusObserver,
};
use uhf_rfid_transport::{TcpTransport, Transport};
use uhf_rfid_types::{
    AccessPassword, AdvanceParams, DataFlagParams, DeviceInfo, ExtParams, LockType, MemoryBank,
    ModbusParams, ModemParams, RelayState, TagRead, TransportParams, UsbDataParams, WorkingParams,
};

use crate::dispatcher::{DispatchConfig, Dispatcher, Notification, ObserverHandle, Response};
use crate::error::{Error, Result};

/// Connection settings for a [`Reader`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Reader address placed in every command frame
    pub address: u16,
    /// How long each command waits for its response
    pub response_timeout: Duration,
    /// Registry name of the wire protocol
    pub protocol: String,
    /// Bytes requested from the transport per read
    pub read_chunk: usize,
    /// Receive buffer size beyond which buffered bytes are discarded
    pub max_buffered: usize,
}

impl ReaderConfig {
    pub fn with_address(mut self, address: u16) -> Self {
        self.address = address;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn with_read_chunk(mut self, bytes: usize) -> Self {
        self.read_chunk = bytes;
        self
    }

    pub fn with_max_buffered(mut self, bytes: usize) -> Self {
        self.max_buffered = bytes;
        self
    }

    fn dispatch(&self) -> DispatchConfig {
        DispatchConfig {
            read_chunk: self.read_chunk,
            max_buffered: self.max_buffered,
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        let dispatch = DispatchConfig::default();
        Self {
            address: DEFAULT_ADDRESS,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            protocol: CPH_PROTOCOL_NAME.to_string(),
            read_chunk: dispatch.read_chunk,
            max_buffered: dispatch.max_buffered,
        }
    }
}

/// UHF RFID reader
///
/// Every method takes `&self`, so one reader can be shared across tasks in
/// an `Arc`. Commands are serialised on the wire: while one command waits
/// for its response, another fails with [`Error::Busy`].
///
/// # Examples
///
/// ```no_run
/// use uhf_rfid::Reader;
///
/// #[tokio::main]
/// async fn main() -> uhf_rfid::Result<()> {
///     let reader = Reader::tcp("192.168.1.178", 6000);
///
///     reader.connect().await?;
///     println!("Firmware: {}", reader.get_version().await?);
///
///     reader.on_tag_read(|tag| println!("{}", tag));
///     reader.start_inventory().await?;
///     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
///     reader.stop_inventory().await?;
///
///     reader.disconnect().await?;
///     Ok(())
/// }
/// ```
pub struct Reader {
    config: ReaderConfig,
    session: Session,
    dispatcher: Dispatcher,
    /// The transport while no IO task owns it
    idle: Mutex<Option<Box<dyn Transport>>>,
    lifecycle: tokio::sync::Mutex<()>,
}

impl Reader {
    /// Reader speaking CPH v4.0.1 with default settings
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        Self::with_protocol(
            Box::new(transport),
            Arc::new(uhf_rfid_core::CphProtocol::new()),
            ReaderConfig::default(),
        )
    }

    /// Reader on a TCP connection with default settings
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::new(TcpTransport::new(host, port))
    }

    /// Reader whose protocol is looked up by `config.protocol`
    ///
    /// # Errors
    ///
    /// Fails if the registry has no protocol under that name.
    pub fn from_config(
        transport: Box<dyn Transport>,
        registry: &ProtocolRegistry,
        config: ReaderConfig,
    ) -> Result<Self> {
        let protocol = registry.create(&config.protocol)?;
        Ok(Self::with_protocol(transport, protocol, config))
    }

    pub fn with_protocol(
        transport: Box<dyn Transport>,
        protocol: Arc<dyn Protocol>,
        config: ReaderConfig,
    ) -> Self {
        let session = Session::new();
        let dispatcher = Dispatcher::new(protocol, session.clone(), config.dispatch());
        Self {
            config,
            session,
            dispatcher,
            idle: Mutex::new(Some(transport)),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn protocol_name(&self) -> &str {
        self.dispatcher.protocol().name()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.session.status()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// The transport, reclaimed from a finished IO task if needed
    async fn reclaim_transport(&self) -> Option<Box<dyn Transport>> {
        if let Some(transport) = self.dispatcher.stop().await {
            return Some(transport);
        }
        self.idle.lock().take()
    }

    /// Open the connection
    ///
    /// Does nothing when already connected or connecting.
    pub async fn connect(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;

        if !self.session.begin_connect()? {
            debug!("Connect requested while {}", self.session.status());
            return Ok(());
        }

        let Some(mut transport) = self.reclaim_transport().await else {
            self.session.connect_failed()?;
            return Err(Error::ConnectionLost);
        };

        info!("Connecting to {}...", transport.remote_addr());

        if let Err(e) = transport.connect().await {
            warn!("Connection to {} failed: {}", transport.remote_addr(), e);
            *self.idle.lock() = Some(transport);
            self.session.connect_failed()?;
            return Err(e.into());
        }

        let remote = transport.remote_addr();
        self.dispatcher.start(transport);

        if self.session.connected().is_err() {
            // The link failed before we got here
            if let Some(transport) = self.dispatcher.stop().await {
                *self.idle.lock() = Some(transport);
            }
            return Err(Error::ConnectionLost);
        }

        info!("Connected to {} ({})", remote, self.protocol_name());
        Ok(())
    }

    /// Close the connection
    ///
    /// A pending command fails with [`Error::ConnectionLost`]. Does nothing
    /// when already disconnected.
    pub async fn disconnect(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;

        if !self.session.begin_disconnect()? {
            if let Some(transport) = self.dispatcher.stop().await {
                *self.idle.lock() = Some(transport);
            }
            return Ok(());
        }

        info!("Disconnecting...");

        if let Some(transport) = self.dispatcher.stop().await {
            *self.idle.lock() = Some(transport);
        }

        if self.session.status() == ConnectionStatus::Disconnecting {
            self.session.disconnected()?;
        }

        info!("Disconnected");
        Ok(())
    }

    /// Run `f` on an open connection, disconnecting on every exit path
    ///
    /// The first error wins: an error from `f` is returned even if the
    /// disconnect also fails. If the returned future is dropped while `f`
    /// runs, the IO task is cancelled and the reader is left
    /// [`Disconnected`](ConnectionStatus::Disconnected); the next
    /// [`connect`](Self::connect) reclaims the transport.
    pub async fn with_connection<'a, F, Fut, T>(&'a self, f: F) -> Result<T>
    where
        F: FnOnce(&'a Reader) -> Fut,
        Fut: Future<Output = Result<T>> + 'a,
    {
        self.connect().await?;

        let mut guard = ConnectionGuard {
            reader: self,
            armed: true,
        };
        let result = f(self).await;
        guard.armed = false;

        let closed = self.disconnect().await;

        match (result, closed) {
            (Err(e), _) => Err(e),
            (Ok(_), Err(e)) => Err(e),
            (Ok(value), Ok(())) => Ok(value),
        }
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    pub fn on_status_change<F>(&self, callback: F) -> StatusObserver
    where
        F: Fn(ConnectionStatus) + Send + Sync + 'static,
    {
        self.session.on_change(callback)
    }

    pub fn remove_status_observer(&self, handle: StatusObserver) -> bool {
        self.session.remove_observer(handle)
    }

    /// Observe raw notifications of one category
    pub fn on_notification<F>(&self, category: NotificationCategory, callback: F) -> ObserverHandle
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.dispatcher.register(category, callback)
    }

    /// Observe decoded tag reads, live and buffered
    pub fn on_tag_read<F>(&self, callback: F) -> ObserverHandle
    where
        F: Fn(&TagRead) + Send + Sync + 'static,
    {
        self.dispatcher
            .register(NotificationCategory::TagRead, move |notification| {
                match response::tag_read(&notification.params) {
                    Ok(tag) => callback(&tag),
                    Err(e) => warn!("Undecodable tag report {}: {}", notification.frame, e),
                }
            })
    }

    pub fn remove_observer(&self, handle: ObserverHandle) -> bool {
        self.dispatcher.unregister(handle)
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Send any command with a prepared parameter block
    pub async fn send(&self, command: Command, payload: &[u8]) -> Result<Response> {
        debug!("{} ({} parameter bytes)", command, payload.len());
        self.dispatcher
            .send(
                command.code(),
                self.config.address,
                payload,
                self.config.response_timeout,
            )
            .await
    }

    pub async fn get_device_info(&self) -> Result<DeviceInfo> {
        let response = self.send(Command::GetVersion, &[]).await?;
        Ok(response::device_info(&response.params)?)
    }

    /// Firmware version, e.g. `4.0.1`
    pub async fn get_version(&self) -> Result<String> {
        Ok(self.get_device_info().await?.software_version)
    }

    pub async fn reboot(&self) -> Result<()> {
        self.send(Command::Reboot, &[]).await.map(drop)
    }

    /// Restore factory parameters
    pub async fn set_default_params(&self) -> Result<()> {
        self.send(Command::SetDefaultParam, &[]).await.map(drop)
    }

    /// Start continuous inventory; tags arrive as notifications
    pub async fn start_inventory(&self) -> Result<()> {
        self.send(Command::StartInventory, &[]).await.map(drop)
    }

    pub async fn stop_inventory(&self) -> Result<()> {
        self.send(Command::StopInventory, &[]).await.map(drop)
    }

    /// Run one inventory round
    pub async fn inventory_single_burst(&self) -> Result<()> {
        self.send(Command::ActiveInventory, &[]).await.map(drop)
    }

    async fn query_parameter(&self, param_type: u8) -> Result<Response> {
        self.send(Command::QueryParameter, &request::query_parameter(param_type)?)
            .await
    }

    /// Set RF output power, 0..=33 dBm
    pub async fn set_power(&self, dbm: u8) -> Result<()> {
        let payload = request::set_power(dbm)?;
        self.send(Command::SetParameter, &payload).await.map(drop)
    }

    pub async fn get_power(&self) -> Result<u8> {
        let response = self.query_parameter(param_types::POWER).await?;
        Ok(response::power(&response.params)?)
    }

    pub async fn set_buzzer(&self, enabled: bool) -> Result<()> {
        let payload = request::set_buzzer(enabled)?;
        self.send(Command::SetParameter, &payload).await.map(drop)
    }

    pub async fn get_buzzer(&self) -> Result<bool> {
        let response = self.query_parameter(param_types::BUZZER).await?;
        Ok(response::buzzer(&response.params)?)
    }

    /// Duplicate-read filter window in seconds
    pub async fn set_filter_time(&self, seconds: u8) -> Result<()> {
        let payload = request::set_filter_time(seconds)?;
        self.send(Command::SetParameter, &payload).await.map(drop)
    }

    pub async fn get_filter_time(&self) -> Result<u8> {
        let response = self.query_parameter(param_types::TAG_FILTER_TIME).await?;
        Ok(response::filter_time(&response.params)?)
    }

    pub async fn set_modem_params(&self, modem: &ModemParams) -> Result<()> {
        let payload = request::set_modem(modem)?;
        self.send(Command::SetParameter, &payload).await.map(drop)
    }

    pub async fn get_modem_params(&self) -> Result<ModemParams> {
        let response = self.query_parameter(param_types::MODEM).await?;
        Ok(response::modem(&response.params)?)
    }

    /// Read `word_count` 16-bit words from a memory bank
    pub async fn read_tag_memory(
        &self,
        bank: MemoryBank,
        word_ptr: u16,
        word_count: u8,
        password: AccessPassword,
    ) -> Result<Bytes> {
        let payload = request::read_tag(bank, word_ptr, word_count, password)?;
        let response = self.send(Command::ReadTag, &payload).await?;
        Ok(response::tag_data(&response.params)?)
    }

    /// Write whole 16-bit words to a memory bank
    pub async fn write_tag_memory(
        &self,
        bank: MemoryBank,
        word_ptr: u16,
        data: &[u8],
        password: AccessPassword,
    ) -> Result<()> {
        let payload = request::write_tag(bank, word_ptr, data, password)?;
        self.send(Command::WriteTag, &payload).await.map(drop)
    }

    pub async fn lock_tag(&self, lock: LockType, password: AccessPassword) -> Result<()> {
        let payload = request::lock_tag(lock, password)?;
        self.send(Command::LockTag, &payload).await.map(drop)
    }

    /// Permanently disable the tag in the field
    pub async fn kill_tag(&self, kill_password: AccessPassword) -> Result<()> {
        let payload = request::kill_tag(kill_password)?;
        self.send(Command::LockTag, &payload).await.map(drop)
    }

    fn ensure_record_tag<R: ParameterRecord>(&self) -> Result<()> {
        let codec = self.dispatcher.protocol().param_codec();
        if codec.layout(R::KIND)?.tag.is_none() {
            return Err(uhf_rfid_core::Error::InvalidArgument(format!(
                "{} has no TLV tag configured",
                R::KIND
            ))
            .into());
        }
        Ok(())
    }

    async fn query_record<R: ParameterRecord>(&self, command: Command) -> Result<R> {
        self.ensure_record_tag::<R>()?;
        let response = self.send(command, &[]).await?;
        let codec = self.dispatcher.protocol().param_codec();
        Ok(response::record(codec, &response.params)?)
    }

    async fn set_record<R: ParameterRecord>(&self, command: Command, record: &R) -> Result<()> {
        let payload = request::record(self.dispatcher.protocol().param_codec(), record)?;
        self.send(command, &payload).await.map(drop)
    }

    pub async fn get_ext_params(&self) -> Result<ExtParams> {
        self.query_record(Command::QueryExtParam).await
    }

    pub async fn set_ext_params(&self, params: &ExtParams) -> Result<()> {
        self.set_record(Command::SetExtParam, params).await
    }

    pub async fn get_working_params(&self) -> Result<WorkingParams> {
        self.query_record(Command::QueryWorkingParam).await
    }

    pub async fn set_working_params(&self, params: &WorkingParams) -> Result<()> {
        self.set_record(Command::SetWorkingParam, params).await
    }

    pub async fn get_transport_params(&self) -> Result<TransportParams> {
        self.query_record(Command::QueryTransportParam).await
    }

    pub async fn set_transport_params(&self, params: &TransportParams) -> Result<()> {
        self.set_record(Command::SetTransportParam, params).await
    }

    pub async fn get_advance_params(&self) -> Result<AdvanceParams> {
        self.query_record(Command::QueryAdvanceParam).await
    }

    pub async fn set_advance_params(&self, params: &AdvanceParams) -> Result<()> {
        self.set_record(Command::SetAdvanceParam, params).await
    }

    /// Needs a layout with a TLV tag, see [`ParamCodec::with_layout`](uhf_rfid_core::ParamCodec::with_layout)
    pub async fn get_usb_data_params(&self) -> Result<UsbDataParams> {
        self.query_record(Command::QueryUsbData).await
    }

    pub async fn set_usb_data_params(&self, params: &UsbDataParams) -> Result<()> {
        self.set_record(Command::SetUsbData, params).await
    }

    /// Needs a layout with a TLV tag, see [`ParamCodec::with_layout`](uhf_rfid_core::ParamCodec::with_layout)
    pub async fn get_data_flag_params(&self) -> Result<DataFlagParams> {
        self.query_record(Command::QueryDataFlag).await
    }

    pub async fn set_data_flag_params(&self, params: &DataFlagParams) -> Result<()> {
        self.set_record(Command::SetDataFlag, params).await
    }

    pub async fn get_modbus_params(&self) -> Result<ModbusParams> {
        let response = self.send(Command::QueryModbusParam, &[]).await?;
        Ok(response::modbus(&response.params)?)
    }

    pub async fn set_modbus_params(&self, params: &ModbusParams) -> Result<()> {
        let payload = request::modbus(params)?;
        self.send(Command::SetModbusParam, &payload).await.map(drop)
    }

    pub async fn get_rtc_time(&self) -> Result<NaiveDateTime> {
        let response = self.send(Command::QueryRtcTime, &[]).await?;
        Ok(response::rtc_time(&response.params)?)
    }

    pub async fn set_rtc_time(&self, time: &NaiveDateTime) -> Result<()> {
        let payload = request::set_rtc_time(time)?;
        self.send(Command::SetRtcTime, &payload).await.map(drop)
    }

    pub async fn relay_operation(&self, state: RelayState) -> Result<()> {
        let payload = request::relay(state)?;
        self.send(Command::RelayOp, &payload).await.map(drop)
    }

    /// Speak or play `text` on readers with audio output
    pub async fn play_audio(&self, text: &str) -> Result<()> {
        let payload = request::play_audio(text)?;
        self.send(Command::AudioPlay, &payload).await.map(drop)
    }

    /// Enable or disable upload of stored access records
    pub async fn set_record_upload(&self, enabled: bool) -> Result<()> {
        let payload = request::record_upload(enabled)?;
        self.send(Command::UploadRecordStatus, &payload).await.map(drop)
    }
}

/// Tears the connection down if [`Reader::with_connection`] is cancelled
/// mid-flight
struct ConnectionGuard<'a> {
    reader: &'a Reader,
    armed: bool,
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("Connection scope dropped while running, cancelling IO");
        self.reader.dispatcher.cancel();
        self.reader.session.force_disconnected();
    }
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
