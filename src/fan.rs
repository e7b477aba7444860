//! Individual fan control.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::runtime::{AsyncUdpSocket, Mutex, UdpSocket};

use crate::bitfield::DeviceState;
use crate::command::Command;
use crate::errors::Error;
use crate::history::{MessageHistory, MessageType};
use crate::listener::FanEvent;
use crate::types::{FanSpeed, SpeedDelta, Timer};

type Result<T> = std::result::Result<T, Error>;

/// Represents a single Atomberg ceiling fan.
///
/// A `Fan` sends commands to a physical fan over UDP. Each fan is identified
/// by its IPv4 address and can optionally have a user-friendly name. Commands
/// are fire-and-forget: the fan never replies, its state arrives later through
/// a [`crate::BroadcastListener`].
///
/// # Example
///
/// ```
/// use std::net::Ipv4Addr;
/// use atomberg_fans_rs::Fan;
///
/// let fan = Fan::new(Ipv4Addr::new(192, 168, 29, 14), Some("Sofa Fan"));
/// assert_eq!(fan.port(), 5600);
/// assert!(fan.state().is_none());
/// ```
#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Deserialize)]
pub struct Fan {
    ip: Ipv4Addr,
    name: Option<String>,
    #[serde(default = "Fan::default_port")]
    port: u16,
    #[serde(skip)]
    device_id: Option<String>,
    #[serde(skip)]
    state: Option<DeviceState>,
    #[serde(skip)]
    history: Arc<Mutex<MessageHistory>>,
}

impl Clone for Fan {
    fn clone(&self) -> Self {
        let history_clone = match self.history.try_lock() {
            Ok(guard) => guard.clone(),
            Err(_) => MessageHistory::new(), // If locked, start fresh
        };
        Fan {
            ip: self.ip,
            name: self.name.clone(),
            port: self.port,
            device_id: self.device_id.clone(),
            state: self.state.clone(),
            history: Arc::new(Mutex::new(history_clone)),
        }
    }
}

impl Fan {
    pub const DEFAULT_PORT: u16 = 5600;

    pub fn new(ip: Ipv4Addr, name: Option<&str>) -> Self {
        Fan {
            ip,
            name: name.map(String::from),
            port: Self::DEFAULT_PORT,
            device_id: None,
            state: None,
            history: Arc::new(Mutex::new(MessageHistory::new())),
        }
    }

    /// Use a command port other than 5600.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    fn default_port() -> u16 {
        Self::DEFAULT_PORT
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.ip, self.port))
    }

    /// The broadcast `device_id` learned for this fan, if any.
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Last state broadcast applied with [`Fan::process_event`].
    pub fn state(&self) -> Option<&DeviceState> {
        self.state.as_ref()
    }

    pub async fn history(&self) -> MessageHistory {
        self.history.lock().await.clone()
    }

    pub async fn clear_history(&self) {
        self.history.lock().await.clear();
    }

    /// Send a command as a single datagram.
    ///
    /// Only the keys set on `command` are transmitted. Nothing is awaited
    /// from the fan and failures are not retried.
    pub async fn send(&self, command: &Command) -> Result<()> {
        if !command.is_valid() {
            return Err(Error::NoAttribute);
        }

        let body = command.to_json()?;
        let result = self.send_udp(body.as_bytes()).await;

        let mut history = self.history.lock().await;
        match &result {
            Ok(()) => {
                debug!("Sent {} to {}", body, self.addr());
                let message = serde_json::to_value(command).unwrap_or(Value::Null);
                history.record(MessageType::Command, message);
            }
            Err(e) => history.record_error(&e.to_string()),
        }
        result
    }

    pub async fn set_power(&self, on: bool) -> Result<()> {
        let mut command = Command::new();
        command.power(on);
        self.send(&command).await
    }

    pub async fn turn_on(&self) -> Result<()> {
        self.set_power(true).await
    }

    pub async fn turn_off(&self) -> Result<()> {
        self.set_power(false).await
    }

    pub async fn set_speed(&self, speed: FanSpeed) -> Result<()> {
        self.send(&Command::from(speed)).await
    }

    /// Step the speed up or down relative to the fan's current speed.
    pub async fn change_speed(&self, delta: SpeedDelta) -> Result<()> {
        self.send(&Command::from(delta)).await
    }

    pub async fn set_led(&self, on: bool) -> Result<()> {
        let mut command = Command::new();
        command.led(on);
        self.send(&command).await
    }

    pub async fn set_timer(&self, timer: Timer) -> Result<()> {
        self.send(&Command::from(timer)).await
    }

    pub async fn set_sleep(&self, on: bool) -> Result<()> {
        let mut command = Command::new();
        command.sleep(on);
        self.send(&command).await
    }

    /// Apply a listener event to this fan.
    ///
    /// `Identified` events for this fan's IP set its device id; `State`
    /// events carrying that device id replace the cached state. Returns
    /// `true` if the event concerned this fan.
    pub async fn process_event(&mut self, event: &FanEvent) -> bool {
        match event {
            FanEvent::Identified { ip, device_id } if *ip == self.ip => {
                self.device_id = Some(device_id.clone());
                true
            }
            FanEvent::State(state)
                if self.device_id.as_deref() == Some(state.device_id()) =>
            {
                let message = serde_json::to_value(state).unwrap_or(Value::Null);
                self.history.lock().await.record(MessageType::State, message);
                self.state = Some(state.clone());
                true
            }
            _ => false,
        }
    }

    async fn send_udp(&self, msg: &[u8]) -> Result<()> {
        let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
            .await
            .map_err(|e| Error::socket("bind", e))?;

        if self.ip.is_broadcast() {
            socket
                .set_broadcast(true)
                .map_err(|e| Error::socket("set_broadcast", e))?;
        }

        socket
            .send_to(msg, self.addr())
            .await
            .map_err(|e| Error::socket("send_to", e))?;
        Ok(())
    }
}
