//! Listener for the state broadcasts fans send on port 5625.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use socket2::{Domain, Protocol, Socket, Type};

use crate::bitfield::DeviceState;
use crate::dedup::DedupCache;
use crate::errors::Error;
use crate::framing;
use crate::registry::DeviceRegistry;

type Result<T> = std::result::Result<T, Error>;

pub const LISTEN_PORT: u16 = 5625;

const ERROR_BACKOFF: Duration = Duration::from_millis(100);
/// A zero read timeout means "block forever" to the OS.
const MIN_RECV_TIMEOUT: Duration = Duration::from_millis(1);

/// Settings for a [`BroadcastListener`].
///
/// # Example
///
/// ```
/// use std::net::Ipv4Addr;
/// use std::time::Duration;
/// use atomberg_fans_rs::ListenerConfig;
///
/// let config = ListenerConfig::default()
///     .with_recv_timeout(Duration::from_millis(250))
///     .with_known_fans([Ipv4Addr::new(192, 168, 29, 14)]);
/// assert_eq!(config.port, 5625);
/// ```
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    pub bind_ip: Ipv4Addr,
    pub port: u16,
    /// How often the stop flag is checked while no datagrams arrive.
    /// Values under 1 ms are raised to 1 ms.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub recv_timeout: Duration,
    pub buffer_size: usize,
    pub dedup_high_water: usize,
    pub dedup_retain: usize,
    /// Fan IPs, in the order their registry slots are filled.
    pub known_fans: Vec<Ipv4Addr>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_ip: Ipv4Addr::UNSPECIFIED,
            port: LISTEN_PORT,
            recv_timeout: Duration::from_secs(1),
            buffer_size: 4096,
            dedup_high_water: DedupCache::DEFAULT_HIGH_WATER,
            dedup_retain: DedupCache::DEFAULT_RETAIN,
            known_fans: Vec::new(),
        }
    }
}

impl ListenerConfig {
    pub fn with_bind_addr(mut self, ip: Ipv4Addr, port: u16) -> Self {
        self.bind_ip = ip;
        self.port = port;
        self
    }

    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    pub fn with_known_fans(mut self, ips: impl IntoIterator<Item = Ipv4Addr>) -> Self {
        self.known_fans = ips.into_iter().collect();
        self
    }
}

/// Events delivered by a running [`BroadcastListener`], in receipt order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FanEvent {
    /// A broadcast's `device_id` was assigned to a known fan IP.
    Identified { ip: Ipv4Addr, device_id: String },
    /// A new state broadcast was decoded.
    State(DeviceState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListenerState {
    Stopped,
    Running,
    Stopping,
}

/// Diagnostics for the broadcast listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerDiagnostics {
    pub state: ListenerState,
    pub local_addr: Option<SocketAddr>,
    pub datagrams_received: u64,
    pub states_emitted: u64,
    pub duplicates_dropped: u64,
    pub datagrams_skipped: u64,
    pub decode_failures: u64,
    pub time_since_last_datagram: Option<f64>,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    emitted: AtomicU64,
    duplicates: AtomicU64,
    skipped: AtomicU64,
    decode_failures: AtomicU64,
}

/// Receives state broadcasts on a background thread and emits decoded states.
///
/// # Example
///
/// ```no_run
/// use atomberg_fans_rs::{BroadcastListener, FanEvent, ListenerConfig};
///
/// let listener = BroadcastListener::new(ListenerConfig::default());
/// let events = listener.start()?;
/// for event in events {
///     if let FanEvent::State(state) = event {
///         println!("{} speed {}", state.device_id(), state.speed());
///     }
/// }
/// # Ok::<(), atomberg_fans_rs::Error>(())
/// ```
pub struct BroadcastListener {
    config: ListenerConfig,
    state: Arc<Mutex<ListenerState>>,
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,
    listener_thread: Mutex<Option<JoinHandle<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
    last_datagram: Arc<Mutex<Option<Instant>>>,
    last_error: Arc<Mutex<Option<String>>>,
}

impl Default for BroadcastListener {
    fn default() -> Self {
        Self::new(ListenerConfig::default())
    }
}

impl BroadcastListener {
    pub fn new(config: ListenerConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(ListenerState::Stopped)),
            running: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
            listener_thread: Mutex::new(None),
            local_addr: Mutex::new(None),
            last_datagram: Arc::new(Mutex::new(None)),
            last_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    pub fn state(&self) -> ListenerState {
        *lock(&self.state)
    }

    pub fn is_running(&self) -> bool {
        self.state() == ListenerState::Running
    }

    /// Address the socket is bound to while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *lock(&self.local_addr)
    }

    pub fn diagnostics(&self) -> ListenerDiagnostics {
        let count = |c: &AtomicU64| c.load(Ordering::Relaxed);
        ListenerDiagnostics {
            state: self.state(),
            local_addr: self.local_addr(),
            datagrams_received: count(&self.counters.received),
            states_emitted: count(&self.counters.emitted),
            duplicates_dropped: count(&self.counters.duplicates),
            datagrams_skipped: count(&self.counters.skipped),
            decode_failures: count(&self.counters.decode_failures),
            time_since_last_datagram: lock(&self.last_datagram)
                .map(|t| t.elapsed().as_secs_f64()),
            last_error: lock(&self.last_error).clone(),
        }
    }

    /// Bind the broadcast port and start receiving on a background thread.
    ///
    /// The returned receiver yields events until the listener is stopped.
    /// Failing to bind is fatal and leaves the listener stopped.
    pub fn start(&self) -> Result<Receiver<FanEvent>> {
        let mut state = lock(&self.state);
        if *state != ListenerState::Stopped {
            return Err(Error::AlreadyRunning);
        }

        let socket = open_socket(&self.config)?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| Error::socket("local_addr", e))?;

        let (events, receiver) = mpsc::channel();
        let worker = Worker {
            running: Arc::clone(&self.running),
            counters: Arc::clone(&self.counters),
            last_datagram: Arc::clone(&self.last_datagram),
            last_error: Arc::clone(&self.last_error),
            dedup: DedupCache::with_limits(self.config.dedup_high_water, self.config.dedup_retain),
            registry: DeviceRegistry::new(self.config.known_fans.iter().copied()),
            events,
        };
        let buffer_size = self.config.buffer_size;

        self.running.store(true, Ordering::SeqCst);
        let handle = thread::Builder::new()
            .name("fan-broadcast-listener".into())
            .spawn(move || worker.run(socket, buffer_size))
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                Error::ListenerThread(e.to_string())
            })?;

        info!("Listening for fan broadcasts on {local_addr}");
        *lock(&self.listener_thread) = Some(handle);
        *lock(&self.local_addr) = Some(local_addr);
        *state = ListenerState::Running;
        Ok(receiver)
    }

    /// Stop the listener and wait for its thread to exit.
    ///
    /// Returns within roughly one receive timeout.
    pub fn stop(&self) {
        {
            let mut state = lock(&self.state);
            if *state != ListenerState::Running {
                return;
            }
            *state = ListenerState::Stopping;
        }

        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = lock(&self.listener_thread).take()
            && handle.join().is_err()
        {
            *lock(&self.last_error) = Some("listener thread panicked".to_string());
            error!("Broadcast listener thread panicked");
        }

        *lock(&self.local_addr) = None;
        *lock(&self.state) = ListenerState::Stopped;
        info!("Broadcast listener stopped");
    }
}

impl Drop for BroadcastListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State owned by the listener thread.
struct Worker {
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,
    last_datagram: Arc<Mutex<Option<Instant>>>,
    last_error: Arc<Mutex<Option<String>>>,
    dedup: DedupCache,
    registry: DeviceRegistry,
    events: Sender<FanEvent>,
}

impl Worker {
    fn run(mut self, socket: UdpSocket, buffer_size: usize) {
        let mut buffer = vec![0u8; buffer_size];

        while self.running.load(Ordering::SeqCst) {
            match socket.recv_from(&mut buffer) {
                Ok((size, source)) => self.handle(&buffer[..size], source),
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(ref e) if e.kind() == ErrorKind::TimedOut => {}
                Err(e) => {
                    *lock(&self.last_error) = Some(e.to_string());
                    error!("Broadcast socket error: {e}");
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }
    }

    fn handle(&mut self, payload: &[u8], source: SocketAddr) {
        self.counters.received.fetch_add(1, Ordering::Relaxed);
        *lock(&self.last_datagram) = Some(Instant::now());

        let envelope = match framing::frame(payload) {
            Ok(envelope) => envelope,
            Err(skip) => {
                self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                debug!("Skipping datagram from {source}: {skip}");
                return;
            }
        };

        if self.dedup.is_duplicate(&envelope.message_id) {
            self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
            debug!("Dropping duplicate message {}", envelope.message_id);
            return;
        }

        let state = match DeviceState::decode(envelope.bitfield()) {
            Ok(state) => state.with_origin(&envelope.device_id, &envelope.state_string),
            Err(e) => {
                self.counters.decode_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Undecodable broadcast from {source}: {e}");
                return;
            }
        };

        if let SocketAddr::V4(v4) = source
            && let Some(ip) = self.registry.observe(*v4.ip(), state.device_id())
        {
            info!("Fan {ip} identified as {}", state.device_id());
            self.emit(FanEvent::Identified {
                ip,
                device_id: state.device_id().to_string(),
            });
        }

        self.counters.emitted.fetch_add(1, Ordering::Relaxed);
        self.emit(FanEvent::State(state));
    }

    fn emit(&self, event: FanEvent) {
        if self.events.send(event).is_err() {
            debug!("No receiver for fan event; dropping it");
        }
    }
}

fn open_socket(config: &ListenerConfig) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| Error::socket("create", e))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| Error::socket("set_reuse_address", e))?;
    socket
        .set_broadcast(true)
        .map_err(|e| Error::socket("set_broadcast", e))?;

    let addr = SocketAddr::V4(SocketAddrV4::new(config.bind_ip, config.port));
    socket
        .bind(&addr.into())
        .map_err(|e| Error::socket("bind", e))?;
    socket
        .set_read_timeout(Some(config.recv_timeout.max(MIN_RECV_TIMEOUT)))
        .map_err(|e| Error::socket("set_read_timeout", e))?;

    Ok(socket.into())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitfield::ColorMode;
    use serde_json::json;
    use std::sync::mpsc::RecvTimeoutError;

    const WAIT: Duration = Duration::from_secs(2);

    fn test_config() -> ListenerConfig {
        ListenerConfig::default()
            .with_bind_addr(Ipv4Addr::LOCALHOST, 0)
            .with_recv_timeout(Duration::from_millis(50))
    }

    fn sender_for(listener: &BroadcastListener) -> impl Fn(&[u8]) + use<> {
        let target = listener.local_addr().unwrap();
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        move |payload: &[u8]| {
            socket.send_to(payload, target).unwrap();
        }
    }

    fn broadcast(message_id: &str, device_id: &str, state_string: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "message_id": message_id,
            "device_id": device_id,
            "state_string": state_string,
        }))
        .unwrap()
    }

    fn next_state(events: &Receiver<FanEvent>) -> DeviceState {
        loop {
            match events.recv_timeout(WAIT).unwrap() {
                FanEvent::State(state) => return state,
                FanEvent::Identified { .. } => continue,
            }
        }
    }

    #[test]
    fn test_new_listener_is_stopped() {
        let listener = BroadcastListener::default();
        assert_eq!(listener.state(), ListenerState::Stopped);
        assert!(!listener.is_running());
        assert!(listener.local_addr().is_none());
        assert_eq!(listener.config().port, LISTEN_PORT);
    }

    #[test]
    fn test_end_to_end_and_duplicates() {
        let listener = BroadcastListener::new(test_config());
        let events = listener.start().unwrap();
        let send = sender_for(&listener);

        send(&broadcast("m1", "fan-a", "176,0"));
        send(&broadcast("m1", "fan-a", "176,0"));
        send(&broadcast("m2", "fan-a", "17,0"));

        let state = next_state(&events);
        assert!(state.power());
        assert!(state.led());
        assert!(state.sleep());
        assert_eq!(state.speed(), 0);
        assert!(!state.cool());
        assert!(!state.warm());
        assert_eq!(state.color_mode(), ColorMode::Off);
        assert_eq!(state.device_id(), "fan-a");
        assert_eq!(state.raw_state(), "176,0");

        // The repeated m1 is dropped, so m2 comes next.
        let state = next_state(&events);
        assert_eq!(state.raw_state(), "17,0");
        assert_eq!(state.speed(), 1);
        assert!(matches!(
            events.recv_timeout(Duration::from_millis(200)),
            Err(RecvTimeoutError::Timeout)
        ));

        let diagnostics = listener.diagnostics();
        assert_eq!(diagnostics.datagrams_received, 3);
        assert_eq!(diagnostics.states_emitted, 2);
        assert_eq!(diagnostics.duplicates_dropped, 1);
        assert!(diagnostics.time_since_last_datagram.is_some());
        listener.stop();
    }

    #[test]
    fn test_empty_message_id_is_never_deduplicated() {
        let listener = BroadcastListener::new(test_config());
        let events = listener.start().unwrap();
        let send = sender_for(&listener);

        send(&broadcast("", "", "16"));
        send(&broadcast("", "", "16"));

        assert!(next_state(&events).power());
        assert!(next_state(&events).power());
        assert_eq!(listener.diagnostics().duplicates_dropped, 0);
    }

    #[test]
    fn test_hex_payload() {
        let listener = BroadcastListener::new(test_config());
        let events = listener.start().unwrap();
        let send = sender_for(&listener);

        let hex: String = broadcast("h1", "fan-h", "8,1")
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        send(hex.as_bytes());

        let state = next_state(&events);
        assert_eq!(state.device_id(), "fan-h");
        assert_eq!(state.color_mode(), ColorMode::Cool);
    }

    #[test]
    fn test_noise_does_not_stop_the_loop() {
        let listener = BroadcastListener::new(test_config());
        let events = listener.start().unwrap();
        let send = sender_for(&listener);

        send(b"test");
        send(&[0xff, 0xfe]);
        send(br#"{"device_id":"x"}"#);
        send(&broadcast("bad", "", "fast,0"));
        send(&broadcast("ok", "", "32"));

        let state = next_state(&events);
        assert!(state.led());
        assert!(!state.power());

        let diagnostics = listener.diagnostics();
        assert_eq!(diagnostics.datagrams_skipped, 3);
        assert_eq!(diagnostics.decode_failures, 1);
        assert_eq!(diagnostics.states_emitted, 1);
        assert!(listener.is_running());
    }

    #[test]
    fn test_identifies_known_fans() {
        let listener =
            BroadcastListener::new(test_config().with_known_fans([Ipv4Addr::LOCALHOST]));
        let events = listener.start().unwrap();
        let send = sender_for(&listener);

        send(&broadcast("1", "fan-a", "0"));
        send(&broadcast("2", "fan-a", "0"));

        assert_eq!(
            events.recv_timeout(WAIT).unwrap(),
            FanEvent::Identified {
                ip: Ipv4Addr::LOCALHOST,
                device_id: "fan-a".into()
            }
        );
        assert!(matches!(events.recv_timeout(WAIT).unwrap(), FanEvent::State(_)));
        // Already known: only the state follows.
        assert!(matches!(events.recv_timeout(WAIT).unwrap(), FanEvent::State(_)));
    }

    #[test]
    fn test_start_stop_lifecycle() {
        let listener = BroadcastListener::new(test_config());
        let events = listener.start().unwrap();
        assert!(listener.is_running());
        assert!(matches!(listener.start(), Err(Error::AlreadyRunning)));

        let started = Instant::now();
        listener.stop();
        assert!(started.elapsed() < WAIT);
        assert_eq!(listener.state(), ListenerState::Stopped);
        assert!(listener.local_addr().is_none());

        // The sender is dropped with the thread.
        assert!(matches!(
            events.recv_timeout(WAIT),
            Err(RecvTimeoutError::Disconnected)
        ));

        // Stopping twice is harmless and the listener can be restarted.
        listener.stop();
        let _events = listener.start().unwrap();
        assert!(listener.is_running());
    }

    #[test]
    fn test_zero_timeout_still_stops() {
        let config: ListenerConfig = serde_json::from_value(json!({
            "bind_ip": "127.0.0.1",
            "port": 0,
            "recv_timeout": 0,
        }))
        .unwrap();
        assert_eq!(config.recv_timeout, Duration::ZERO);

        let listener = BroadcastListener::new(config);
        let events = listener.start().unwrap();
        let send = sender_for(&listener);
        send(&broadcast("z1", "", "16"));
        assert!(next_state(&events).power());

        let (done, stopped) = mpsc::channel();
        thread::spawn(move || {
            listener.stop();
            let _ = done.send(listener.state());
        });
        assert_eq!(stopped.recv_timeout(WAIT).unwrap(), ListenerState::Stopped);
    }

    #[test]
    fn test_bind_failure_is_reported() {
        let config = test_config().with_bind_addr(Ipv4Addr::new(192, 0, 2, 1), 0);
        let listener = BroadcastListener::new(config);
        match listener.start() {
            Err(Error::Socket { action, .. }) => assert_eq!(action, "bind"),
            other => panic!("expected bind error, got {other:?}"),
        }
        assert_eq!(listener.state(), ListenerState::Stopped);
    }

    #[test]
    fn test_config_from_json() {
        let config: ListenerConfig = serde_json::from_value(json!({
            "recv_timeout": 250,
            "known_fans": ["192.168.29.14", "192.168.29.15"],
        }))
        .unwrap();
        assert_eq!(config.port, LISTEN_PORT);
        assert_eq!(config.recv_timeout, Duration::from_millis(250));
        assert_eq!(config.known_fans.len(), 2);
    }
}
