use printbridge_communication::{DriverConfig, MarlinDriver, StatusAssembler, Transport};
use printbridge_core::{CancelToken, ConnectionState, DriverError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// Scripted transport standing in for the serial port: returns canned
// reply lines in order and logs every write.
struct ScriptedTransport {
    lines: VecDeque<String>,
    writes: Arc<Mutex<Vec<String>>>,
    dropped: Arc<AtomicBool>,
}

impl ScriptedTransport {
    fn new(lines: &[&str]) -> (Self, Arc<Mutex<Vec<String>>>, Arc<AtomicBool>) {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let dropped = Arc::new(AtomicBool::new(false));
        let transport = Self {
            lines: lines.iter().map(|s| s.to_string()).collect(),
            writes: writes.clone(),
            dropped: dropped.clone(),
        };
        (transport, writes, dropped)
    }
}

impl Drop for ScriptedTransport {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

impl Transport for ScriptedTransport {
    fn write_all(&mut self, bytes: &[u8]) -> printbridge_core::Result<()> {
        self.writes
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(bytes).to_string());
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> printbridge_core::Result<String> {
        // An exhausted script behaves like an unresponsive device
        self.lines
            .pop_front()
            .ok_or(DriverError::DeviceUnresponsive {
                timeout_ms: timeout.as_millis() as u64,
            })
    }

    fn clear_input(&mut self) -> printbridge_core::Result<()> {
        Ok(())
    }
}

fn fast_config() -> DriverConfig {
    DriverConfig {
        read_timeout: Duration::from_millis(100),
        settle_delay: Duration::from_millis(1),
        drain_delay: Duration::from_millis(1),
        poll_interval: Duration::from_millis(1),
    }
}

// Boot banner, banner ack, then the handshake ack for the M117
// identification message.
const STARTUP: &[&str] = &["start", "echo:SD init fail", "ok", "ok"];

fn connected_driver(
    replies: &[&str],
) -> (MarlinDriver, Arc<Mutex<Vec<String>>>, Arc<AtomicBool>) {
    let mut script: Vec<&str> = STARTUP.to_vec();
    script.extend_from_slice(replies);
    let (transport, writes, dropped) = ScriptedTransport::new(&script);
    let mut driver = MarlinDriver::new(fast_config());
    driver.connect_with_transport(Box::new(transport)).unwrap();
    (driver, writes, dropped)
}

#[test]
fn startup_reaches_ready() {
    let (driver, writes, _) = connected_driver(&[]);
    assert_eq!(driver.state(), ConnectionState::Ready);
    assert!(driver.is_ready());
    assert_eq!(
        writes.lock().unwrap().as_slice(),
        ["M117 printbridge online\n"]
    );
}

#[test]
fn startup_handshake_mismatch_is_rejected() {
    let (transport, writes, dropped) =
        ScriptedTransport::new(&["start", "ok", "echo:Unknown command: M117"]);
    let mut driver = MarlinDriver::new(fast_config());

    let err = driver
        .connect_with_transport(Box::new(transport))
        .unwrap_err();
    assert!(matches!(err, DriverError::StartupRejected { .. }));
    assert_eq!(driver.state(), ConnectionState::Closed);
    assert!(!driver.is_ready());
    assert!(dropped.load(Ordering::SeqCst));

    // Subsequent queries fail without touching any transport
    assert!(matches!(driver.position(), Err(DriverError::NotReady)));
    assert_eq!(writes.lock().unwrap().len(), 1);
}

#[test]
fn multi_line_reply_is_one_frame() {
    let (mut driver, _, _) = connected_driver(&[
        "echo:busy processing",
        "X:12.34 Y:0.00 Z:5.00 E:0.00 Count X:10160 Y:0 Z:4000",
        "ok",
    ]);
    let reply = driver.send_command("M114").unwrap();
    assert!(reply.as_str().contains("echo:busy processing"));
    assert!(reply.as_str().contains("X:12.34"));
    assert!(reply.as_str().ends_with("ok"));
}

#[test]
fn position_query_parses_reply() {
    let (mut driver, writes, _) = connected_driver(&[
        "X:12.34 Y:0.00 Z:5.00 E:0.00 Count X:10160 Y:0 Z:4000",
        "ok",
    ]);
    let pos = driver.position().unwrap();
    assert_eq!(pos.x, 12.34);
    assert_eq!(pos.y, 0.0);
    assert_eq!(pos.z, 5.0);
    assert_eq!(pos.e, 0.0);
    assert_eq!(writes.lock().unwrap().last().unwrap(), "M114\n");
}

#[test]
fn temperature_query_parses_inline_ack() {
    // M105 prepends the ack token to the payload line
    let (mut driver, writes, _) =
        connected_driver(&["ok T:18.40 /0.00 B:18.28 /0.00 @:0 B@:0"]);
    let temps = driver.temperatures().unwrap();
    assert_eq!(temps.hotend_actual, 18.40);
    assert_eq!(temps.hotend_target, 0.0);
    assert_eq!(temps.bed_actual, 18.28);
    assert_eq!(temps.bed_target, 0.0);
    assert_eq!(writes.lock().unwrap().last().unwrap(), "M105\n");
}

#[test]
fn identity_is_fetched_once_per_connection() {
    let (mut driver, writes, _) = connected_driver(&[
        "FIRMWARE_NAME:Marlin V1.1.0 PROTOCOL_VERSION:1.0 MACHINE_TYPE:Anet A8 Plus \
         UUID:cede2a2f-41a2-4748-9b12-c55c62f367ff",
        "ok",
    ]);
    let first = driver.identity().unwrap();
    let second = driver.identity().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.machine_type, "Anet A8 Plus");

    let m115_writes = writes
        .lock()
        .unwrap()
        .iter()
        .filter(|w| w.starts_with("M115"))
        .count();
    assert_eq!(m115_writes, 1);
}

#[test]
fn commands_outside_allow_list_are_rejected() {
    let (mut driver, writes, _) = connected_driver(&[]);
    assert!(matches!(
        driver.send_command("G28"),
        Err(DriverError::InvalidCommand { .. })
    ));
    // Administrative codes stay off the generic path too
    assert!(matches!(
        driver.send_command("M81"),
        Err(DriverError::InvalidCommand { .. })
    ));
    assert_eq!(writes.lock().unwrap().len(), 1);
}

#[test]
fn is_active_idle_iff_zero_fraction() {
    let (mut driver, _, _) = connected_driver(&[
        "SD printing byte 0/0",
        "ok",
        "SD printing byte 12345/67890",
        "ok",
        "Not SD printing",
        "ok",
    ]);
    assert!(!driver.is_active().unwrap());
    assert!(driver.is_active().unwrap());
    // Unrecognizable reply fails safe toward "busy"
    assert!(driver.is_active().unwrap());
}

#[test]
fn queries_before_connect_fail_with_not_ready() {
    let mut driver = MarlinDriver::new(fast_config());
    assert!(matches!(driver.position(), Err(DriverError::NotReady)));
    assert!(matches!(driver.temperatures(), Err(DriverError::NotReady)));
    assert!(matches!(driver.identity(), Err(DriverError::NotReady)));
    assert!(matches!(driver.is_active(), Err(DriverError::NotReady)));
    assert!(matches!(
        driver.send_command("M27"),
        Err(DriverError::NotReady)
    ));
}

#[test]
fn shutdown_waits_for_idle_then_powers_off() {
    let (mut driver, writes, dropped) = connected_driver(&[
        "SD printing byte 100/400",
        "ok",
        "SD printing byte 200/400",
        "ok",
        "SD printing byte 0/0",
        "ok",
        // farewell ack, power-off ack
        "ok",
        "ok",
    ]);

    driver.shutdown(&CancelToken::new()).unwrap();

    assert_eq!(driver.state(), ConnectionState::Closed);
    assert!(dropped.load(Ordering::SeqCst));
    assert_eq!(
        writes.lock().unwrap().as_slice(),
        [
            "M117 printbridge online\n",
            "M27\n",
            "M27\n",
            "M27\n",
            "M117 Shutting down\n",
            "M81\n",
        ]
    );
}

#[test]
fn shutdown_without_connection_is_a_noop() {
    let mut driver = MarlinDriver::new(fast_config());
    driver.shutdown(&CancelToken::new()).unwrap();
    assert_eq!(driver.state(), ConnectionState::Closed);

    // And again after a real shutdown
    let (mut driver, writes, _) =
        connected_driver(&["SD printing byte 0/0", "ok", "ok", "ok"]);
    driver.shutdown(&CancelToken::new()).unwrap();
    let writes_after_first = writes.lock().unwrap().len();
    driver.shutdown(&CancelToken::new()).unwrap();
    assert_eq!(writes.lock().unwrap().len(), writes_after_first);
}

#[test]
fn cancelled_shutdown_skips_protocol_traffic() {
    let (mut driver, writes, dropped) = connected_driver(&[]);
    let cancel = CancelToken::new();
    cancel.cancel();

    driver.shutdown(&cancel).unwrap();

    assert_eq!(driver.state(), ConnectionState::Closed);
    assert!(dropped.load(Ordering::SeqCst));
    // Only the startup identification was ever written
    assert_eq!(writes.lock().unwrap().len(), 1);
}

#[test]
fn cancellation_interrupts_the_idle_wait() {
    // Long poll interval so the cancel lands mid-wait
    let mut script: Vec<&str> = STARTUP.to_vec();
    script.extend_from_slice(&["SD printing byte 100/400", "ok"]);
    let (transport, writes, dropped) = ScriptedTransport::new(&script);
    let mut driver = MarlinDriver::new(DriverConfig {
        poll_interval: Duration::from_secs(30),
        ..fast_config()
    });
    driver.connect_with_transport(Box::new(transport)).unwrap();

    let cancel = CancelToken::new();
    let canceller = cancel.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    driver.shutdown(&cancel).unwrap();
    handle.join().unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(driver.state(), ConnectionState::Closed);
    assert!(dropped.load(Ordering::SeqCst));
    let writes = writes.lock().unwrap();
    assert!(!writes.iter().any(|w| w.starts_with("M81")));
}

#[test]
fn transport_failure_during_shutdown_releases_the_port() {
    // Script exhausted: the first liveness read times out
    let (mut driver, writes, dropped) = connected_driver(&[]);
    driver.shutdown(&CancelToken::new()).unwrap();

    assert_eq!(driver.state(), ConnectionState::Closed);
    assert!(dropped.load(Ordering::SeqCst));
    let writes = writes.lock().unwrap();
    assert!(!writes.iter().any(|w| w.starts_with("M81")));
}

#[test]
fn snapshot_composes_position_and_temperatures() {
    let (driver, _, _) = connected_driver(&[
        "X:12.34 Y:0.00 Z:5.00 E:0.00 Count X:10160 Y:0 Z:4000",
        "ok",
        "ok T:18.40 /0.00 B:18.28 /0.00 @:0 B@:0",
    ]);
    let assembler = StatusAssembler::new(Arc::new(parking_lot::Mutex::new(driver)));

    let snapshot = assembler.snapshot().unwrap();
    assert_eq!(snapshot.position.x, 12.34);
    assert_eq!(snapshot.temperatures.bed_actual, 18.28);
}

#[test]
fn snapshot_of_disconnected_driver_is_not_ready() {
    let driver = MarlinDriver::new(fast_config());
    let assembler = StatusAssembler::new(Arc::new(parking_lot::Mutex::new(driver)));
    assert!(matches!(assembler.snapshot(), Err(DriverError::NotReady)));
}

#[test]
fn snapshot_propagates_malformed_replies() {
    let (driver, _, _) = connected_driver(&["echo:look, no coordinates", "ok"]);
    let assembler = StatusAssembler::new(Arc::new(parking_lot::Mutex::new(driver)));
    assert!(matches!(
        assembler.snapshot(),
        Err(DriverError::MalformedReply { .. })
    ));
}
