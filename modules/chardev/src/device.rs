//! The counter device itself.

use core::{
    fmt::{self, Write},
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};

use kmod::{LinuxError, LinuxResult, file::Operations, user::UserSliceWriter};

/// Max length of the message from the device.
pub const BUF_LEN: usize = 80;

/// Fixed-capacity message buffer.
struct Message {
    buf: [u8; BUF_LEN],
    len: usize,
}

impl Message {
    fn counter(n: u64) -> Result<Self, fmt::Error> {
        let mut msg = Message {
            buf: [0; BUF_LEN],
            len: 0,
        };
        writeln!(msg, "I already told you {} times Hello world!", n)?;
        Ok(msg)
    }

    fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl Write for Message {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.len + s.len();
        if end > BUF_LEN {
            return Err(fmt::Error);
        }
        self.buf[self.len..end].copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }
}

/// State of one open session: the message generated at open and how much of
/// it has been read.
pub struct Session {
    msg: Message,
    cursor: usize,
}

impl Session {
    /// The part of the message not yet read.
    pub fn remaining(&self) -> &[u8] {
        &self.msg.as_bytes()[self.cursor..]
    }
}

/// Says how many times it has been opened, to one reader at a time.
pub struct CounterDevice {
    open_count: AtomicU64,
    is_open: AtomicBool,
}

impl Default for CounterDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterDevice {
    pub const fn new() -> Self {
        CounterDevice {
            open_count: AtomicU64::new(0),
            is_open: AtomicBool::new(false),
        }
    }

    #[cfg(test)]
    fn with_open_count(n: u64) -> Self {
        CounterDevice {
            open_count: AtomicU64::new(n),
            is_open: AtomicBool::new(false),
        }
    }

    /// Number of sessions successfully started so far.
    pub fn open_count(&self) -> u64 {
        self.open_count.load(Ordering::Acquire)
    }

    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::Acquire)
    }
}

impl Operations for CounterDevice {
    type Data = Session;

    fn open(&self) -> LinuxResult<Session> {
        if self
            .is_open
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(LinuxError::EBUSY);
        }

        // The busy flag is held, so nobody else touches the counter until release.
        let n = self.open_count.load(Ordering::Relaxed);
        let (Some(next), Ok(msg)) = (n.checked_add(1), Message::counter(n)) else {
            self.is_open.store(false, Ordering::Release);
            return Err(LinuxError::EOVERFLOW);
        };
        self.open_count.store(next, Ordering::Release);

        Ok(Session { msg, cursor: 0 })
    }

    fn release(&self, _session: Session) {
        self.is_open.store(false, Ordering::Release);
    }

    fn read(&self, session: &mut Session, writer: &mut UserSliceWriter<'_>) -> LinuxResult<usize> {
        let remaining = session.remaining();
        if remaining.is_empty() {
            return Ok(0);
        }
        let n = remaining.len().min(writer.len());
        writer.write_slice(&remaining[..n])?;
        session.cursor += n;
        Ok(n)
    }

    fn write(&self, _session: &mut Session, _reader: &[u8]) -> LinuxResult<usize> {
        log::warn!("Sorry, this operation isn't supported.");
        Err(LinuxError::EINVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::{sync::Arc, vec::Vec};
    use crate::testlog;
    use kmod::file::OpenFile;
    use log::Level;
    use std::{sync::Barrier, thread};

    fn device() -> Arc<CounterDevice> {
        testlog::init();
        Arc::new(CounterDevice::new())
    }

    fn read_all(file: &mut OpenFile<CounterDevice>, chunk: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = alloc::vec![0u8; chunk];
        loop {
            let n = file.read(&mut buf).unwrap();
            if n == 0 {
                return out;
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    #[test]
    fn test_load_open_read_release_scenario() {
        let dev = device();
        let mut file = OpenFile::open(dev.clone()).unwrap();
        let mut buf = [0u8; 100];
        let n = file.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"I already told you 0 times Hello world!\n");
        assert_eq!(file.read(&mut buf).unwrap(), 0);
        file.release();

        let mut file = OpenFile::open(dev).unwrap();
        let mut buf = [0u8; 10];
        assert_eq!(file.read(&mut buf).unwrap(), 10);
        assert_eq!(&buf, b"I already ");
        assert_eq!(
            file.device().open_count(),
            2,
            "counter counts opens, not reads"
        );
    }

    #[test]
    fn test_counter_strictly_increases() {
        let dev = device();
        for i in 0..50u64 {
            let mut file = OpenFile::open(dev.clone()).unwrap();
            let expected = alloc::format!("I already told you {} times Hello world!\n", i);
            assert_eq!(read_all(&mut file, 7), expected.as_bytes());
        }
        assert_eq!(dev.open_count(), 50);
    }

    #[test]
    fn test_busy_open_does_not_count() {
        let dev = device();
        let file = OpenFile::open(dev.clone()).unwrap();
        assert!(dev.is_open());
        for _ in 0..3 {
            assert!(matches!(
                OpenFile::open(dev.clone()),
                Err(LinuxError::EBUSY)
            ));
        }
        assert_eq!(dev.open_count(), 1);
        drop(file);
        assert!(!dev.is_open());

        let mut file = OpenFile::open(dev.clone()).unwrap();
        let msg = read_all(&mut file, 100);
        assert_eq!(msg, b"I already told you 1 times Hello world!\n");
    }

    #[test]
    fn test_end_of_stream_is_idempotent() {
        let dev = device();
        let mut file = OpenFile::open(dev).unwrap();
        read_all(&mut file, 3);
        for len in [0usize, 1, 5, 100, 4096] {
            let mut buf = alloc::vec![0u8; len];
            assert_eq!(file.read(&mut buf).unwrap(), 0);
        }
    }

    #[test]
    fn test_zero_length_read_does_not_advance() {
        let dev = device();
        let mut file = OpenFile::open(dev).unwrap();
        assert_eq!(file.read(&mut [0u8; 0]).unwrap(), 0);
        let msg = read_all(&mut file, 1);
        assert_eq!(msg, b"I already told you 0 times Hello world!\n");
    }

    #[test]
    fn test_chunked_reads_reassemble_message() {
        let dev = device();
        for chunk in [1usize, 2, 3, 13, 39, 40, 41, 80] {
            let mut file = OpenFile::open(dev.clone()).unwrap();
            let n = dev.open_count() - 1;
            let expected = alloc::format!("I already told you {} times Hello world!\n", n);
            let msg = read_all(&mut file, chunk);
            assert_eq!(msg.len(), expected.len());
            assert_eq!(msg, expected.as_bytes());
        }
    }

    #[test]
    fn test_write_is_rejected_without_side_effects() {
        let dev = device();
        let mut file = OpenFile::open(dev.clone()).unwrap();
        let mut buf = [0u8; 5];
        file.read(&mut buf).unwrap();

        testlog::take();
        for data in [&b""[..], &b"hi"[..], &[0u8; 256][..]] {
            assert_eq!(file.write(data), Err(LinuxError::EINVAL));
            assert_eq!(
                testlog::take(),
                [(
                    Level::Warn,
                    "Sorry, this operation isn't supported.".to_string()
                )]
            );
        }
        assert_eq!(dev.open_count(), 1);
        let rest = read_all(&mut file, 100);
        assert_eq!(rest, b"eady told you 0 times Hello world!\n");
    }

    #[test]
    fn test_exhausted_counter_fails_cleanly() {
        let dev = Arc::new(CounterDevice::with_open_count(u64::MAX - 1));
        let mut file = OpenFile::open(dev.clone()).unwrap();
        let expected = alloc::format!("I already told you {} times Hello world!\n", u64::MAX - 1);
        assert_eq!(read_all(&mut file, 64), expected.as_bytes());
        drop(file);

        assert_eq!(dev.open_count(), u64::MAX);
        assert!(matches!(
            OpenFile::open(dev.clone()),
            Err(LinuxError::EOVERFLOW)
        ));
        assert!(!dev.is_open(), "a failed open must not leave the device busy");
        assert_eq!(dev.open_count(), u64::MAX);
    }

    #[test]
    fn test_message_fits_for_any_counter() {
        let msg = Message::counter(u64::MAX).unwrap();
        assert!(msg.as_bytes().len() <= BUF_LEN);
        assert!(msg.as_bytes().ends_with(b" times Hello world!\n"));
    }

    #[test]
    fn test_concurrent_open_admits_one() {
        let dev = device();
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let dev = dev.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    OpenFile::open(dev)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let opened = results.iter().filter(|r| r.is_ok()).count();
        let busy = results
            .iter()
            .filter(|r| matches!(r, Err(LinuxError::EBUSY)))
            .count();
        assert_eq!(opened, 1);
        assert_eq!(busy, threads - 1);
        assert_eq!(dev.open_count(), 1);

        drop(results);
        assert!(!dev.is_open());
    }
}
