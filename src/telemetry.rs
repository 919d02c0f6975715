//! Live telemetry: wire snapshots, the latest-snapshot slot and the receive thread.
//!
//! Snapshots arrive as one JSON object per line:
//!
//! ```json
//! {"time": 12.0, "stress_field": [0.1, 0.4], "damage_prediction": 0.3, "rul": 0.6}
//! ```
//!
//! The receive path only parses and stores; colouring happens on the twin's tick,
//! which takes whatever snapshot is newest. Older unread snapshots are overwritten.

use std::io::{BufRead, BufReader};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::{SnapshotError, TwinError};
use crate::intensity::Shade;
use crate::math::{clamp01, lerp, DEGENERATE_EPSILON};

/// Stress amplification applied at full damage.
pub const FULL_DAMAGE_AMPLIFICATION: f64 = 2.5;

/// One message from the telemetry stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Simulation time of the snapshot.
    pub time: f64,
    /// Stress per mesh vertex.
    pub stress_field: Vec<f64>,
    /// Predicted damage in `[0, 1]`.
    pub damage_prediction: f64,
    /// Remaining useful life; null or non-positive means unknown.
    #[serde(default)]
    pub rul: Option<f64>,
}

impl TelemetrySnapshot {
    /// Parse and validate one wire message.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Parse`] for malformed messages and
    /// [`SnapshotError::NonFinite`] when a number is NaN or infinite.
    ///
    /// # Examples
    /// ```
    /// use beamtwin::TelemetrySnapshot;
    ///
    /// let line = r#"{"time": 3.0, "stress_field": [1.0, 2.0], "damage_prediction": 0.2, "rul": null}"#;
    /// let snapshot = TelemetrySnapshot::parse(line).unwrap();
    /// assert_eq!(snapshot.stress_field.len(), 2);
    /// assert_eq!(snapshot.remaining_useful_life(), None);
    /// ```
    pub fn parse(message: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(message)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Reject snapshots carrying NaN or infinite values.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::NonFinite`] naming the offending field.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if !self.time.is_finite() {
            return Err(SnapshotError::NonFinite("time"));
        }
        if !self.damage_prediction.is_finite() {
            return Err(SnapshotError::NonFinite("damage_prediction"));
        }
        if self.rul.is_some_and(|rul| !rul.is_finite()) {
            return Err(SnapshotError::NonFinite("rul"));
        }
        if self.stress_field.iter().any(|value| !value.is_finite()) {
            return Err(SnapshotError::NonFinite("stress_field"));
        }
        Ok(())
    }

    /// Remaining useful life when the sender knows it.
    #[must_use]
    pub fn remaining_useful_life(&self) -> Option<f64> {
        self.rul.filter(|rul| *rul > 0.0)
    }

    /// Damage and RUL for a display collaborator.
    #[must_use]
    pub fn readout(&self) -> DamageReadout {
        DamageReadout {
            time: self.time,
            damage: self.damage_prediction,
            remaining_useful_life: self.remaining_useful_life(),
        }
    }
}

/// Damage state forwarded unchanged to a display.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DamageReadout {
    /// Time of the snapshot the readout came from.
    pub time: f64,
    /// Predicted damage as sent.
    pub damage: f64,
    /// Remaining useful life, if known.
    pub remaining_useful_life: Option<f64>,
}

/// Single-slot mailbox holding the newest unread snapshot.
///
/// Clones share the same slot, one for the receive thread and one for the tick.
#[derive(Clone, Debug, Default)]
pub struct SnapshotSlot {
    /// Latest unread snapshot.
    latest: Arc<Mutex<Option<TelemetrySnapshot>>>,
}

impl SnapshotSlot {
    /// Empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any unread snapshot with `snapshot`.
    pub fn store(&self, snapshot: TelemetrySnapshot) {
        *self.latest.lock() = Some(snapshot);
    }

    /// Move the newest snapshot out, leaving the slot empty.
    #[must_use]
    pub fn take(&self) -> Option<TelemetrySnapshot> {
        self.latest.lock().take()
    }

    /// Whether an unread snapshot is waiting.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.latest.lock().is_some()
    }
}

/// Counters reported by a finished receive thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Snapshots parsed and stored.
    pub accepted: usize,
    /// Lines that failed to parse and were dropped.
    pub dropped: usize,
}

/// Background thread feeding a [`SnapshotSlot`] from a line-oriented stream.
///
/// Dropping the receiver shuts the TCP connection down (when there is one) and joins
/// the thread, so the transport is released on every exit path.
#[derive(Debug)]
pub struct TelemetryReceiver {
    /// Receive thread; `None` once joined.
    worker: Option<JoinHandle<ReceiverStats>>,
    /// Handle used to unblock the thread on teardown.
    stream: Option<TcpStream>,
}

impl TelemetryReceiver {
    /// Read snapshots from `reader` until it reaches end of file.
    ///
    /// Dropping the receiver waits for that end of file.
    ///
    /// # Errors
    ///
    /// Returns the operating system error when the thread cannot be spawned.
    pub fn spawn<R>(reader: R, slot: SnapshotSlot) -> std::io::Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let worker = std::thread::Builder::new()
            .name("telemetry-rx".to_owned())
            .spawn(move || pump(reader, &slot))?;
        Ok(Self {
            worker: Some(worker),
            stream: None,
        })
    }

    /// Connect to a telemetry server and start receiving.
    ///
    /// # Errors
    ///
    /// Returns the I/O error when the connection cannot be established.
    pub fn connect(address: impl ToSocketAddrs, slot: SnapshotSlot) -> std::io::Result<Self> {
        let stream = TcpStream::connect(address)?;
        let peer = stream.peer_addr()?;
        let reader = BufReader::new(stream.try_clone()?);
        info!(%peer, "telemetry connected");
        let mut receiver = Self::spawn(reader, slot)?;
        receiver.stream = Some(stream);
        Ok(receiver)
    }

    /// Wait for the stream to end and report what was received.
    #[must_use]
    pub fn join(mut self) -> ReceiverStats {
        self.worker
            .take()
            .and_then(|worker| worker.join().ok())
            .unwrap_or_default()
    }
}

impl Drop for TelemetryReceiver {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(err) = stream.shutdown(Shutdown::Both) {
                debug!(error = %err, "telemetry stream already closed");
            }
        }
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(stats) => debug!(?stats, "telemetry receiver stopped"),
                Err(_) => warn!("telemetry receive thread panicked"),
            }
        }
    }
}

/// Parse lines into the slot until the reader ends or fails.
fn pump<R: BufRead>(reader: R, slot: &SnapshotSlot) -> ReceiverStats {
    let mut stats = ReceiverStats::default();
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                debug!(error = %err, "telemetry stream closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match TelemetrySnapshot::parse(&line) {
            Ok(snapshot) => {
                slot.store(snapshot);
                stats.accepted += 1;
            }
            Err(err) => {
                warn!(error = %err, "dropping telemetry message");
                stats.dropped += 1;
            }
        }
    }
    stats
}

/// Colours a mesh from streamed stress fields.
#[derive(Debug, Default)]
pub struct TelemetryAdapter {
    /// Mailbox shared with the receive thread.
    slot: SnapshotSlot,
    /// Owned receive thread, released with the adapter.
    receiver: Option<TelemetryReceiver>,
}

impl TelemetryAdapter {
    /// Adapter reading from `slot`; snapshots are stored by someone else.
    #[must_use]
    pub fn new(slot: SnapshotSlot) -> Self {
        Self {
            slot,
            receiver: None,
        }
    }

    /// Adapter owning a TCP receiver connected to `address`.
    ///
    /// # Errors
    ///
    /// Returns [`TwinError::Transport`] when the connection cannot be established.
    pub fn connect(address: impl ToSocketAddrs) -> Result<Self, TwinError> {
        let slot = SnapshotSlot::new();
        let receiver = TelemetryReceiver::connect(address, slot.clone())?;
        Ok(Self {
            slot,
            receiver: Some(receiver),
        })
    }

    /// Take ownership of a receiver so it is released together with the adapter.
    #[must_use]
    pub fn with_receiver(mut self, receiver: TelemetryReceiver) -> Self {
        self.receiver = Some(receiver);
        self
    }

    /// Shared mailbox.
    #[must_use]
    pub fn slot(&self) -> &SnapshotSlot {
        &self.slot
    }

    /// Damage-amplified shades for a snapshot.
    ///
    /// `t = clamp01(|stress| * lerp(1, 2.5, damage) / sensitivity)`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::LengthMismatch`] when the stress field does not have
    /// one value per vertex.
    pub fn shade(
        snapshot: &TelemetrySnapshot,
        vertex_count: usize,
        sensitivity: f64,
    ) -> Result<Vec<Shade>, SnapshotError> {
        if snapshot.stress_field.len() != vertex_count {
            return Err(SnapshotError::LengthMismatch {
                expected: vertex_count,
                received: snapshot.stress_field.len(),
            });
        }
        let amplification = lerp(1.0, FULL_DAMAGE_AMPLIFICATION, snapshot.damage_prediction);
        let sensitivity = sensitivity.max(DEGENERATE_EPSILON);
        Ok(snapshot
            .stress_field
            .iter()
            .map(|stress| Shade::Blend(clamp01(stress.abs() * amplification / sensitivity)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::net::TcpListener;
    use std::time::{Duration, Instant};

    use approx::assert_relative_eq;

    use super::*;

    fn snapshot(stress_field: Vec<f64>, damage: f64) -> TelemetrySnapshot {
        TelemetrySnapshot {
            time: 1.0,
            stress_field,
            damage_prediction: damage,
            rul: Some(0.4),
        }
    }

    #[test]
    fn parses_wire_format_and_unknown_rul() {
        let line = r#"{"time": 2.0, "stress_field": [0.5], "damage_prediction": 0.1, "rul": -1.0}"#;
        let parsed = TelemetrySnapshot::parse(line).expect("valid message");
        assert_eq!(parsed.time, 2.0);
        assert_eq!(parsed.remaining_useful_life(), None);

        let overdrawn = r#"{"time": 3.0, "stress_field": [], "damage_prediction": 1.2}"#;
        let readout = TelemetrySnapshot::parse(overdrawn).expect("valid message").readout();
        assert_eq!(readout.damage, 1.2);

        let missing = r#"{"time": 2.0, "stress_field": [], "damage_prediction": 0.1}"#;
        assert_eq!(TelemetrySnapshot::parse(missing).expect("rul optional").rul, None);
    }

    #[test]
    fn malformed_messages_are_rejected() {
        assert!(matches!(
            TelemetrySnapshot::parse("{\"time\": 1.0"),
            Err(SnapshotError::Parse(_))
        ));
        assert!(matches!(
            TelemetrySnapshot::parse(r#"{"time": 1.0, "stress_field": "nope", "damage_prediction": 0.0}"#),
            Err(SnapshotError::Parse(_))
        ));
        let mut bad = snapshot(vec![f64::INFINITY], 0.0);
        assert!(matches!(bad.validate(), Err(SnapshotError::NonFinite("stress_field"))));
        bad.stress_field = vec![0.0];
        bad.rul = Some(f64::NAN);
        assert!(matches!(bad.validate(), Err(SnapshotError::NonFinite("rul"))));
    }

    #[test]
    fn damage_amplifies_stress() {
        let shades = TelemetryAdapter::shade(&snapshot(vec![0.2, -0.2, 1.0], 1.0), 3, 1.0)
            .expect("lengths match");
        assert_eq!(shades[2], Shade::Blend(1.0));
        match (shades[0], shades[1]) {
            (Shade::Blend(a), Shade::Blend(b)) => {
                assert_relative_eq!(a, 0.5, epsilon = 1.0e-12);
                assert_relative_eq!(b, 0.5, epsilon = 1.0e-12);
            }
            other => panic!("unexpected shades {other:?}"),
        }

        let undamaged = TelemetryAdapter::shade(&snapshot(vec![0.2], 0.0), 1, 1.0).expect("ok");
        assert_eq!(undamaged, vec![Shade::Blend(0.2)]);
    }

    #[test]
    fn length_mismatch_is_reported() {
        let error = TelemetryAdapter::shade(&snapshot(vec![0.1; 4], 0.0), 5, 1.0)
            .expect_err("short field");
        assert!(matches!(
            error,
            SnapshotError::LengthMismatch {
                expected: 5,
                received: 4
            }
        ));
    }

    #[test]
    fn slot_keeps_only_the_newest_snapshot() {
        let slot = SnapshotSlot::new();
        assert!(!slot.has_pending());
        slot.store(snapshot(vec![1.0], 0.0));
        slot.store(snapshot(vec![2.0], 0.0));
        assert!(slot.has_pending());
        assert_eq!(slot.take().expect("stored").stress_field, vec![2.0]);
        assert!(slot.take().is_none());
    }

    #[test]
    fn receiver_stores_valid_lines_and_drops_the_rest() {
        let stream = concat!(
            "{\"time\": 0.0, \"stress_field\": [0.1], \"damage_prediction\": 0.05, \"rul\": null}\n",
            "not json\n",
            "\n",
            "{\"time\": 1.0, \"stress_field\": [0.2], \"damage_prediction\": 0.06, \"rul\": null}\n",
        );
        let slot = SnapshotSlot::new();
        let receiver =
            TelemetryReceiver::spawn(Cursor::new(stream.as_bytes().to_vec()), slot.clone())
                .expect("thread spawned");
        let stats = receiver.join();
        assert_eq!(
            stats,
            ReceiverStats {
                accepted: 2,
                dropped: 1
            }
        );
        assert_eq!(slot.take().expect("latest").time, 1.0);
    }

    #[test]
    fn dropping_a_receiver_joins_its_thread() {
        let slot = SnapshotSlot::new();
        let line = "{\"time\": 4.0, \"stress_field\": [], \"damage_prediction\": 0.0}\n";
        let receiver = TelemetryReceiver::spawn(Cursor::new(line.as_bytes().to_vec()), slot.clone())
            .expect("thread spawned");
        drop(receiver);
        assert_eq!(slot.take().expect("stored before join").time, 4.0);
    }

    #[test]
    fn dropping_an_adapter_releases_an_idle_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        let address = listener.local_addr().expect("local address");
        let adapter = TelemetryAdapter::connect(address).expect("client connects");
        // Accepted but silent: the receive thread stays blocked on read.
        let (_held, _) = listener.accept().expect("accept client");

        let started = Instant::now();
        drop(adapter);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn refused_connection_is_a_transport_error() {
        let address = {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
            listener.local_addr().expect("local address")
        };
        let err = TelemetryAdapter::connect(address).expect_err("nothing listens");
        assert!(matches!(err, TwinError::Transport(_)));
    }
}
