// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The session engine. A [`Speaker`] owns at most one TCP connection to its
//! peer and, while running, four activities:
//!
//! - the monitor, which re-establishes a lost connection every
//!   [`MONITOR_INTERVAL`] and replays the prefix database over it;
//! - the keepalive ticker, which sends a KEEPALIVE every third of the hold
//!   time;
//! - the reader, which cuts socket bytes into frames, decodes them and
//!   queues the resulting messages;
//! - the processor, which handles queued messages in arrival order.
//!
//! Transport failures close the connection and leave reconnection to the
//! monitor. Only [`Speaker::disconnect`] stops the activities.

use crate::clock::Ticker;
use crate::config::{SessionParams, SpeakerConfig};
use crate::connection_tcp::Connection;
use crate::db::PrefixDb;
use crate::error::Error;
use crate::lock;
use crate::log::{speaker_debug, speaker_log, DebugSwitch};
use crate::messages::{AsPath, Message, OpenMessage, PathOrigin, UpdateMessage};
use crate::prefix::{format_prefix, parse_prefix};
use crate::IO_TIMEOUT;
use slog::Logger;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{sleep, Builder, JoinHandle};
use std::time::Duration;

const UNIT_SESSION: &str = "session";
const UNIT_MONITOR: &str = "monitor";
const UNIT_KEEPALIVE: &str = "keepalive";
const UNIT_READER: &str = "reader";
const UNIT_PROCESSOR: &str = "processor";

/// Time between connection checks made by the monitor.
pub const MONITOR_INTERVAL: Duration = Duration::from_secs(5);

/// Capacity of the queue between the reader and the processor.
pub const INBOUND_QUEUE_SIZE: usize = 1000;

/// Called by the processor with every UPDATE the peer sends.
pub type UpdateHandler = Arc<dyn Fn(UpdateMessage) + Send + Sync>;

/// A decoded message tagged with the generation of the connection it
/// arrived on.
type Inbound = (u64, Message);

pub struct Speaker {
    inner: Arc<SpeakerInner>,

    /// Handles for the running activities. Also serializes connect and
    /// disconnect.
    activities: Mutex<Option<Activities>>,
}

struct Activities {
    monitor: Ticker,
    keepalive: Ticker,
    reader: JoinHandle<()>,
    processor: JoinHandle<()>,
}

struct SpeakerInner {
    params: SessionParams,
    log: Logger,
    debug: DebugSwitch,
    running: AtomicBool,

    /// The current connection, if any. Held only long enough to look at or
    /// swap the slot, never across a socket write.
    conn: Mutex<Option<Arc<Connection>>>,

    /// Serializes announcements, withdrawals and the replay that follows a
    /// reconnect so a prefix is never missed between them.
    announce: Mutex<()>,
    next_conn_id: AtomicU64,
    db: PrefixDb,
    handler: UpdateHandler,
}

impl Speaker {
    /// Validate the configuration and build an idle speaker. Nothing touches
    /// the network until [`Speaker::connect`].
    pub fn new(
        config: &SpeakerConfig,
        handler: Option<UpdateHandler>,
        log: Logger,
    ) -> Result<Speaker, Error> {
        let params = config.validate()?;
        let debug =
            DebugSwitch::new(config.debug, config.debug_time_format.as_deref())?;
        let handler =
            handler.unwrap_or_else(|| Arc::new(|_: UpdateMessage| {}));
        Ok(Speaker {
            inner: Arc::new(SpeakerInner {
                params,
                log,
                debug,
                running: AtomicBool::new(false),
                conn: Mutex::new(None),
                announce: Mutex::new(()),
                next_conn_id: AtomicU64::new(1),
                db: PrefixDb::new(),
                handler,
            }),
            activities: Mutex::new(None),
        })
    }

    pub fn params(&self) -> &SessionParams {
        &self.inner.params
    }

    /// Dial the peer, send OPEN, replay the database and start the session
    /// activities. A dial failure is returned here and not retried.
    pub fn connect(&self) -> Result<(), Error> {
        let mut activities = lock!(self.activities);
        if activities.is_some()
            || self
                .inner
                .running
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
        {
            return Err(Error::AlreadyRunning);
        }

        if let Err(e) = self.inner.establish() {
            self.inner.running.store(false, Ordering::SeqCst);
            speaker_log!(self.inner, error, UNIT_SESSION, "connect failed: {e}");
            return Err(e);
        }

        match self.spawn_activities() {
            Ok(a) => {
                activities.replace(a);
                speaker_log!(self.inner, info, UNIT_SESSION, "session started");
                Ok(())
            }
            Err(e) => {
                self.inner.running.store(false, Ordering::SeqCst);
                self.inner.close_current();
                Err(e.into())
            }
        }
    }

    fn spawn_activities(&self) -> std::io::Result<Activities> {
        let (tx, rx) = sync_channel::<Inbound>(INBOUND_QUEUE_SIZE);

        let inner = self.inner.clone();
        let reader = Builder::new()
            .name("bgp-reader".into())
            .spawn(move || inner.read_loop(tx))?;

        let inner = self.inner.clone();
        let processor = Builder::new()
            .name("bgp-processor".into())
            .spawn(move || inner.process_loop(rx))?;

        let inner = self.inner.clone();
        let keepalive = Ticker::spawn(
            "bgp-keepalive",
            self.inner.params.keepalive_interval(),
            true,
            move || inner.keepalive(),
        )?;

        let inner = self.inner.clone();
        let monitor =
            Ticker::spawn("bgp-monitor", MONITOR_INTERVAL, false, move || {
                inner.monitor()
            })?;

        Ok(Activities {
            monitor,
            keepalive,
            reader,
            processor,
        })
    }

    /// Stop the session: close the connection, stop every activity and wait
    /// for them to exit. The processor drains messages already queued before
    /// it exits. Safe to call from inside the update handler.
    pub fn disconnect(&self) -> Result<(), Error> {
        if self
            .inner
            .running
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::NotRunning);
        }
        // Closing first wakes any writer stalled on the peer, including a
        // connect still replaying under the activities lock.
        self.inner.close_current();
        let activities = lock!(self.activities).take();
        speaker_log!(self.inner, info, UNIT_SESSION, "session stopping");

        let Some(a) = activities else {
            return Ok(());
        };
        let handles = [
            a.monitor.shutdown(),
            a.keepalive.shutdown(),
            Some(a.reader),
            Some(a.processor),
        ];
        let me = std::thread::current().id();
        for h in handles.into_iter().flatten() {
            if h.thread().id() == me {
                continue;
            }
            if h.join().is_err() {
                speaker_log!(
                    self.inner,
                    error,
                    UNIT_SESSION,
                    "session activity panicked"
                );
            }
        }
        speaker_log!(self.inner, info, UNIT_SESSION, "session stopped");
        Ok(())
    }

    /// Announce a prefix. The announcement is stored even if it cannot be
    /// sent right now; it goes out with the replay on the next connection.
    pub fn add(
        &self,
        prefix: &str,
        origin: PathOrigin,
        as_path: AsPath,
        next_hops: Vec<String>,
    ) -> Result<(), Error> {
        let key = canonical(prefix)?;
        if self.inner.db.contains(&key) {
            return Err(Error::PrefixExists(key));
        }
        let update = UpdateMessage {
            origin,
            as_path,
            next_hops,
            prefixes: vec![key.clone()],
            ..Default::default()
        };
        // Encoding problems surface here, before anything is stored.
        update.to_wire()?;

        let _announce = lock!(self.inner.announce);
        self.inner.db.insert(&key, update.clone())?;
        speaker_debug!(self.inner, UNIT_SESSION, "announcing {}", key);
        self.inner.send_current(&update.into())
    }

    /// Withdraw a prefix. It leaves the database whether or not the
    /// withdrawal can be sent.
    pub fn del(&self, prefix: &str) -> Result<(), Error> {
        let key = canonical(prefix)?;
        let _announce = lock!(self.inner.announce);
        let withdrawal = self.inner.db.remove(&key)?.into_withdrawal();
        speaker_debug!(self.inner, UNIT_SESSION, "withdrawing {}", key);
        self.inner.send_current(&withdrawal.into())
    }

    pub fn exists(&self, prefix: &str) -> bool {
        match canonical(prefix) {
            Ok(key) => self.inner.db.contains(&key),
            Err(_) => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        lock!(self.inner.conn).is_some()
    }

    pub fn enable_debug(&self) {
        self.inner.debug.enable();
    }

    pub fn disable_debug(&self) {
        self.inner.debug.disable();
    }

    pub fn set_debug_time_format(&self, fmt: &str) -> Result<(), Error> {
        self.inner.debug.set_time_format(fmt)
    }
}

impl Drop for Speaker {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.disconnect();
        }
    }
}

/// Database key for a prefix: the masked network in CIDR notation.
fn canonical(prefix: &str) -> Result<String, Error> {
    let (network, length) = parse_prefix(prefix)?;
    format_prefix(network, length)
}

impl SpeakerInner {
    fn current(&self) -> Option<Arc<Connection>> {
        lock!(self.conn).clone()
    }

    /// Dial the peer, send OPEN, install the connection as current and
    /// replay every stored announcement over it.
    fn establish(&self) -> Result<(), Error> {
        let id = self.next_conn_id.fetch_add(1, Ordering::SeqCst);
        let conn = Arc::new(Connection::connect(
            id,
            self.params.peer,
            self.log.clone(),
        )?);

        let open = OpenMessage::new(
            self.params.asn,
            self.params.hold_time,
            self.params.id,
        );
        if let Err(e) = conn.send(&open.into()) {
            conn.close();
            return Err(e);
        }

        let _announce = lock!(self.announce);
        {
            let mut slot = lock!(self.conn);
            if !self.running.load(Ordering::SeqCst) {
                conn.close();
                return Err(Error::NotRunning);
            }
            if let Some(old) = slot.replace(conn.clone()) {
                old.close();
            }
        }
        for update in self.db.announcements() {
            if let Err(e) = conn.send(&update.into()) {
                self.drop_connection(id);
                return Err(e);
            }
        }
        speaker_debug!(
            self,
            UNIT_SESSION,
            "connection {} established, replayed {} prefixes",
            id,
            self.db.len()
        );
        Ok(())
    }

    /// Send on the given connection. A write failure tears it down.
    fn send_checked(
        &self,
        conn: &Connection,
        msg: &Message,
    ) -> Result<(), Error> {
        if let Err(e) = conn.send(msg) {
            speaker_log!(self, warn, UNIT_SESSION, "send {}: {e}", msg.title();
                "connection" => conn.id
            );
            self.drop_connection(conn.id);
            return Err(e);
        }
        Ok(())
    }

    fn send_current(&self, msg: &Message) -> Result<(), Error> {
        let conn = self.current().ok_or(Error::NotConnected)?;
        self.send_checked(&conn, msg)
    }

    /// Send on the connection with the given generation, if it is still the
    /// current one.
    fn send_on(&self, id: u64, msg: &Message) -> Result<(), Error> {
        match self.current() {
            Some(conn) if conn.id == id => self.send_checked(&conn, msg),
            _ => Err(Error::NotConnected),
        }
    }

    /// Close the connection with the given generation if it is still the
    /// current one. Stale generations are left alone.
    fn drop_connection(&self, id: u64) {
        let mut slot = lock!(self.conn);
        if slot.as_ref().is_some_and(|c| c.id == id) {
            if let Some(conn) = slot.take() {
                conn.close();
            }
        }
    }

    fn close_current(&self) {
        if let Some(conn) = lock!(self.conn).take() {
            conn.close();
        }
    }

    fn monitor(&self) {
        if !self.running.load(Ordering::SeqCst) || self.current().is_some() {
            return;
        }
        speaker_debug!(self, UNIT_MONITOR, "connection down, redialing");
        match self.establish() {
            Ok(()) => speaker_log!(self, info, UNIT_MONITOR, "reconnected"),
            Err(e) => {
                speaker_log!(self, warn, UNIT_MONITOR, "reconnect failed: {e}")
            }
        }
    }

    fn keepalive(&self) {
        let Some(conn) = self.current() else {
            return;
        };
        speaker_debug!(self, UNIT_KEEPALIVE, "sending keepalive");
        if let Err(e) = conn.send(&Message::KeepAlive) {
            speaker_log!(self, warn, UNIT_KEEPALIVE, "send keepalive: {e}");
            self.drop_connection(conn.id);
        }
    }

    fn read_loop(&self, tx: SyncSender<Inbound>) {
        while self.running.load(Ordering::SeqCst) {
            let Some(conn) = self.current() else {
                sleep(IO_TIMEOUT);
                continue;
            };
            let frames = match conn.recv() {
                Ok(frames) => frames,
                Err(e) => {
                    if self.running.load(Ordering::SeqCst) {
                        speaker_log!(self, warn, UNIT_READER, "read: {e}";
                            "connection" => conn.id
                        );
                    }
                    self.drop_connection(conn.id);
                    sleep(IO_TIMEOUT);
                    continue;
                }
            };
            for frame in frames {
                match Message::from_wire(&frame) {
                    Ok(msg) => {
                        speaker_debug!(self, UNIT_READER, "received {}", msg.title());
                        if !self.enqueue(&tx, (conn.id, msg)) {
                            return;
                        }
                    }
                    Err(e) => speaker_log!(
                        self, warn, UNIT_READER, "dropping frame: {e}";
                        "frame" => format!("{frame:02x?}")
                    ),
                }
            }
        }
    }

    /// Push onto the inbound queue, waiting while it is full. Gives up when
    /// the session stops or the processor is gone.
    ///
    /// Polls rather than blocking in `send`: a handler that calls
    /// `disconnect` parks the processor, and a reader blocked on a full
    /// queue would then never see `running` drop and disconnect would wait
    /// on it forever.
    fn enqueue(&self, tx: &SyncSender<Inbound>, mut item: Inbound) -> bool {
        loop {
            match tx.try_send(item) {
                Ok(()) => return true,
                Err(TrySendError::Disconnected(_)) => return false,
                Err(TrySendError::Full(back)) => {
                    if !self.running.load(Ordering::SeqCst) {
                        return false;
                    }
                    item = back;
                    sleep(Duration::from_millis(10));
                }
            }
        }
    }

    fn process_loop(&self, rx: Receiver<Inbound>) {
        for (id, msg) in rx {
            self.process(id, msg);
        }
        speaker_debug!(self, UNIT_PROCESSOR, "inbound queue closed");
    }

    fn process(&self, id: u64, msg: Message) {
        match msg {
            Message::Open(open) => {
                speaker_log!(self, info, UNIT_PROCESSOR, "peer open";
                    "asn" => open.asn,
                    "hold_time" => open.hold_time,
                    "id" => open.id.to_string()
                );
                if let Err(e) = self.send_on(id, &Message::KeepAlive) {
                    speaker_log!(self, warn, UNIT_PROCESSOR,
                        "keepalive after open: {e}"
                    );
                }
            }
            Message::Update(update) => (self.handler)(update),
            Message::Notification(n) => {
                speaker_log!(self, warn, UNIT_PROCESSOR, "peer notification: {n}");
                self.drop_connection(id);
            }
            Message::KeepAlive => {
                speaker_debug!(self, UNIT_PROCESSOR, "peer keepalive");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn idle_speaker() -> Speaker {
        let c = SpeakerConfig::new("1.1.1.1", 1111, 30, "127.0.0.1");
        let log = Logger::root(slog::Discard, slog::o!());
        Speaker::new(&c, None, log).expect("speaker")
    }

    /// Install a live loopback connection with the given generation as the
    /// speaker's current one. The accepted end is returned so it stays open.
    fn install(
        s: &Speaker,
        id: u64,
    ) -> (Arc<Connection>, std::net::TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let conn = Arc::new(
            Connection::connect(id, addr, s.inner.log.clone()).expect("connect"),
        );
        let (far, _) = listener.accept().expect("accept");
        lock!(s.inner.conn).replace(conn.clone());
        (conn, far)
    }

    #[test]
    fn canonical_prefix_keys() {
        assert_eq!(canonical("10.1.2.3/8").expect("prefix"), "10.0.0.0/8");
        assert_eq!(canonical("12.34.56.78/32").expect("prefix"), "12.34.56.78/32");
        assert!(canonical("10.0.0.0/33").is_err());
        assert!(canonical("not a prefix").is_err());
    }

    #[test]
    fn keepalive_write_failure_drops_connection() {
        let s = idle_speaker();
        let (conn, _far) = install(&s, 7);

        s.inner.keepalive();
        assert!(s.is_connected());

        // Writes on a shut down socket fail.
        conn.close();
        s.inner.keepalive();
        assert!(!s.is_connected());
    }

    #[test]
    fn stale_generation_left_alone() {
        let s = idle_speaker();
        let (_conn, _far) = install(&s, 7);

        s.inner.drop_connection(6);
        assert!(s.is_connected());
        assert!(matches!(
            s.inner.send_on(6, &Message::KeepAlive),
            Err(Error::NotConnected)
        ));
        s.inner.send_on(7, &Message::KeepAlive).expect("send");

        s.inner.drop_connection(7);
        assert!(!s.is_connected());
    }
}
