//! Byte-command link to the actuator.
//!
//! Sending is best effort and never fails from the caller's point of view:
//! a missing or broken link is logged and the command dropped. Receiving
//! never blocks.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Something that accepts small byte commands and may yield replies.
pub trait ActuatorChannel {
    /// Write one command. Logs and drops it when the link is down.
    fn send(&mut self, command: &[u8]);
    /// Bytes received since the last call; empty when nothing is pending.
    fn receive(&mut self) -> Vec<u8>;
    fn is_connected(&self) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandKind {
    /// The human player placed a marker.
    HumanPlacement = 1,
}

/// A command for the actuator: `[kind, cell + 1]` on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActuatorCommand {
    pub kind: CommandKind,
    /// 0-based cell index.
    pub cell: usize,
}

impl ActuatorCommand {
    pub fn human_placement(cell: usize) -> Self {
        Self {
            kind: CommandKind::HumanPlacement,
            cell,
        }
    }

    /// Wire form; the cell is sent 1-based.
    pub fn encode(&self) -> [u8; 2] {
        [self.kind as u8, (self.cell + 1).min(u8::MAX as usize) as u8]
    }
}

/// Channel used when no actuator is attached.
#[derive(Clone, Copy, Debug, Default)]
pub struct Disconnected;

impl ActuatorChannel for Disconnected {
    fn send(&mut self, command: &[u8]) {
        warn!("actuator not connected, dropping command {command:?}");
    }

    fn receive(&mut self) -> Vec<u8> {
        Vec::new()
    }

    fn is_connected(&self) -> bool {
        false
    }
}

/// Channel over any byte sink, e.g. a serial device node opened as a file.
///
/// Replies are read on a background thread and handed over through an mpsc
/// channel, so [`ActuatorChannel::receive`] never waits.
pub struct StreamChannel<W: Write> {
    writer: Option<W>,
    replies: Option<Receiver<Vec<u8>>>,
}

impl<W: Write> StreamChannel<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Some(writer),
            replies: None,
        }
    }

    /// Spawn a thread forwarding everything read from `reader` as replies.
    /// The thread ends at end of stream or on the first read error.
    pub fn with_reply_reader<R: Read + Send + 'static>(mut self, mut reader: R) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = [0u8; 64];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => {
                        debug!("actuator reply reader stopped: {err}");
                        break;
                    }
                }
            }
        });
        self.replies = Some(rx);
        self
    }

    /// Give back the writer, if the link is still up.
    pub fn into_inner(self) -> Option<W> {
        self.writer
    }
}

impl StreamChannel<File> {
    /// Open an existing device node (or plain file) for writing and read
    /// replies from the same handle. A missing path is an error, never a new
    /// file.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())?;
        let reader = file.try_clone()?;
        Ok(Self::new(file).with_reply_reader(reader))
    }
}

impl<W: Write> ActuatorChannel for StreamChannel<W> {
    fn send(&mut self, command: &[u8]) {
        let Some(writer) = self.writer.as_mut() else {
            warn!("actuator not connected, dropping command {command:?}");
            return;
        };
        if let Err(err) = writer.write_all(command).and_then(|_| writer.flush()) {
            warn!("actuator write failed, disconnecting: {err}");
            self.writer = None;
        } else {
            debug!("actuator <- {command:?}");
        }
    }

    fn receive(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        let Some(rx) = self.replies.as_ref() else {
            return out;
        };
        loop {
            match rx.try_recv() {
                Ok(chunk) => out.extend_from_slice(&chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.replies = None;
                    break;
                }
            }
        }
        out
    }

    fn is_connected(&self) -> bool {
        self.writer.is_some()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    sent: Vec<Vec<u8>>,
    replies: VecDeque<u8>,
    disconnected: bool,
}

/// In-memory channel. Clones share one log of sent commands and one reply
/// queue, so a test can keep a handle while a session owns another.
#[derive(Clone, Debug, Default)]
pub struct MemoryChannel {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel that behaves as unplugged until [`MemoryChannel::connect`].
    pub fn disconnected() -> Self {
        let channel = Self::default();
        channel.with_state(|s| s.disconnected = true);
        channel
    }

    pub fn connect(&self) {
        self.with_state(|s| s.disconnected = false);
    }

    /// Queue reply bytes for the next `receive`.
    pub fn push_reply(&self, bytes: &[u8]) {
        self.with_state(|s| s.replies.extend(bytes.iter().copied()));
    }

    /// Commands written so far, in order.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.with_state(|s| s.sent.clone())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> T) -> T {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl ActuatorChannel for MemoryChannel {
    fn send(&mut self, command: &[u8]) {
        self.with_state(|s| {
            if s.disconnected {
                warn!("actuator not connected, dropping command {command:?}");
            } else {
                s.sent.push(command.to_vec());
            }
        });
    }

    fn receive(&mut self) -> Vec<u8> {
        self.with_state(|s| s.replies.drain(..).collect())
    }

    fn is_connected(&self) -> bool {
        self.with_state(|s| !s.disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    #[test]
    fn command_is_sent_one_based() {
        assert_eq!(ActuatorCommand::human_placement(4).encode(), [1, 5]);
        assert_eq!(ActuatorCommand::human_placement(0).encode(), [1, 1]);
        assert_eq!(ActuatorCommand::human_placement(8).encode(), [1, 9]);
    }

    #[test]
    fn stream_channel_writes_and_collects_replies() {
        let mut channel =
            StreamChannel::new(Vec::new()).with_reply_reader(Cursor::new(vec![7u8, 8, 9]));
        channel.send(&[1, 5]);
        assert!(channel.is_connected());

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut replies = Vec::new();
        while replies.len() < 3 && Instant::now() < deadline {
            replies.extend(channel.receive());
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(replies, vec![7, 8, 9]);
        assert_eq!(channel.into_inner(), Some(vec![1, 5]));
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_disconnects_quietly() {
        let mut channel = StreamChannel::new(Broken);
        channel.send(&[1, 2]);
        assert!(!channel.is_connected());
        channel.send(&[1, 3]);
        assert!(channel.receive().is_empty());
    }

    #[test]
    fn opening_a_missing_device_fails_without_creating_it() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("ttyUSB0");
        let err = StreamChannel::open(&missing).err().expect("missing device");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!missing.exists());

        std::fs::write(&missing, b"").expect("create node stand-in");
        let mut channel = StreamChannel::open(&missing).expect("existing node");
        assert!(channel.is_connected());
        channel.send(&[1, 5]);
        drop(channel);
        assert_eq!(std::fs::read(&missing).expect("read back"), vec![1, 5]);
    }

    #[test]
    fn memory_channel_shares_state_between_clones() {
        let handle = MemoryChannel::new();
        let mut owned = handle.clone();
        owned.send(&[1, 5]);
        handle.push_reply(&[42]);
        assert_eq!(handle.sent(), vec![vec![1, 5]]);
        assert_eq!(owned.receive(), vec![42]);
        assert!(owned.receive().is_empty());
    }

    #[test]
    fn disconnected_channels_drop_commands() {
        let handle = MemoryChannel::disconnected();
        let mut owned = handle.clone();
        owned.send(&[1, 1]);
        assert!(handle.sent().is_empty());
        handle.connect();
        owned.send(&[1, 2]);
        assert_eq!(handle.sent(), vec![vec![1, 2]]);

        let mut none = Disconnected;
        none.send(&[1, 1]);
        assert!(!none.is_connected());
        assert!(none.receive().is_empty());
    }
}
