//! Fan-out writer duplicating one byte stream into several destinations.
//!
//! Each call to [`FanOutWriter::fan_out`] drives every destination from its
//! own scoped thread. The threads live only for that call. The first
//! destination to fail raises a shared flag; its siblings finish the
//! sub-write they are in and then stop. The call reports how many bytes
//! every destination accepted (the minimum across destinations), so a
//! caller knows exactly which suffix of its input is not persisted
//! everywhere.

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// Why a single destination stopped before accepting the whole buffer.
#[derive(Debug)]
pub enum FailureKind {
    /// The destination itself returned an error.
    Io(io::Error),
    /// A sibling failed first and this destination stopped early.
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Io(e) => write!(f, "{e}"),
            FailureKind::Cancelled => write!(f, "cancelled after a sibling destination failed"),
        }
    }
}

/// Failure of one destination within a fan-out write.
#[derive(Debug, thiserror::Error)]
#[error("destination {index} stopped after {accepted} bytes: {kind}")]
pub struct DestinationFailure {
    /// Position of the destination in the writer.
    pub index: usize,
    /// Bytes this destination accepted before stopping.
    pub accepted: usize,
    pub kind: FailureKind,
}

impl DestinationFailure {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, FailureKind::Cancelled)
    }
}

/// Aggregated failure of a fan-out write.
#[derive(Debug)]
pub struct FanOutError {
    /// Bytes accepted by every destination.
    pub accepted: usize,
    /// Every destination that did not accept the whole buffer.
    pub failures: Vec<DestinationFailure>,
}

impl FanOutError {
    /// Find a fan-out failure wrapped inside an `io::Error`.
    pub fn from_io(err: &io::Error) -> Option<&FanOutError> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<FanOutError>())
    }

    /// Failures reported by the destinations themselves, excluding
    /// cancelled siblings.
    pub fn io_failures(&self) -> impl Iterator<Item = &DestinationFailure> {
        self.failures.iter().filter(|f| !f.is_cancelled())
    }
}

impl fmt::Display for FanOutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fan-out write failed on {} destination(s) with {} bytes accepted everywhere",
            self.failures.len(),
            self.accepted
        )?;
        for failure in &self.failures {
            write!(f, "; {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for FanOutError {}

/// Writer duplicating every write into all of its destinations.
pub struct FanOutWriter<'a> {
    destinations: Vec<&'a mut (dyn Write + Send)>,
}

impl<'a> FanOutWriter<'a> {
    pub fn new() -> Self {
        FanOutWriter {
            destinations: Vec::new(),
        }
    }

    /// Add a destination.
    pub fn with(mut self, dest: &'a mut (dyn Write + Send)) -> Self {
        self.destinations.push(dest);
        self
    }

    /// Number of destinations.
    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    /// Write the whole buffer into every destination concurrently.
    ///
    /// Returns `data.len()` when every destination accepted everything.
    /// Otherwise returns a [`FanOutError`] whose `accepted` field is the
    /// minimum number of bytes accepted across all destinations.
    pub fn fan_out(&mut self, data: &[u8]) -> Result<usize, FanOutError> {
        if data.is_empty() {
            return Ok(0);
        }

        let cancel = AtomicBool::new(false);
        let results: Vec<Result<(), DestinationFailure>> = thread::scope(|scope| {
            let handles: Vec<_> = self
                .destinations
                .iter_mut()
                .enumerate()
                .map(|(index, dest)| {
                    let cancel = &cancel;
                    scope.spawn(move || drive(index, &mut **dest, data, cancel))
                })
                .collect();

            handles
                .into_iter()
                .enumerate()
                .map(|(index, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        Err(DestinationFailure {
                            index,
                            accepted: 0,
                            kind: FailureKind::Io(io::Error::other("destination writer panicked")),
                        })
                    })
                })
                .collect()
        });

        let failures: Vec<DestinationFailure> =
            results.into_iter().filter_map(Result::err).collect();
        if failures.is_empty() {
            return Ok(data.len());
        }

        let accepted = failures
            .iter()
            .map(|f| f.accepted)
            .min()
            .unwrap_or(data.len());
        tracing::debug!(
            accepted,
            failed = failures.len(),
            "fan-out write stopped early"
        );
        Err(FanOutError { accepted, failures })
    }
}

/// Push `data` into one destination until it is fully accepted, the
/// destination fails, or a sibling raises `cancel`. The first sub-write is
/// always issued; the flag is checked before every further one.
fn drive(
    index: usize,
    dest: &mut (dyn Write + Send),
    data: &[u8],
    cancel: &AtomicBool,
) -> Result<(), DestinationFailure> {
    let mut accepted = 0;
    loop {
        match dest.write(&data[accepted..]) {
            Ok(0) => {
                cancel.store(true, Ordering::SeqCst);
                return Err(DestinationFailure {
                    index,
                    accepted,
                    kind: FailureKind::Io(io::Error::from(io::ErrorKind::WriteZero)),
                });
            }
            Ok(n) => accepted += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                cancel.store(true, Ordering::SeqCst);
                return Err(DestinationFailure {
                    index,
                    accepted,
                    kind: FailureKind::Io(e),
                });
            }
        }

        if accepted == data.len() {
            return Ok(());
        }
        if cancel.load(Ordering::SeqCst) {
            return Err(DestinationFailure {
                index,
                accepted,
                kind: FailureKind::Cancelled,
            });
        }
    }
}

impl Default for FanOutWriter<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for FanOutWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.fan_out(buf).map_err(io::Error::other)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut first_error = None;
        for dest in self.destinations.iter_mut() {
            if let Err(e) = dest.flush() {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts up to `limit` bytes in its first write, then fails.
    struct Limited {
        limit: usize,
        written: Vec<u8>,
        message: &'static str,
    }

    impl Limited {
        fn new(limit: usize, message: &'static str) -> Self {
            Limited {
                limit,
                written: Vec::new(),
                message,
            }
        }
    }

    impl Write for Limited {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.limit - self.written.len();
            if room == 0 {
                return Err(io::Error::other(self.message));
            }
            let n = room.min(buf.len());
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn all_destinations_receive_everything() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        let mut c = Vec::new();
        let mut writer = FanOutWriter::new().with(&mut a).with(&mut b).with(&mut c);

        assert_eq!(writer.fan_out(b"hello ").unwrap(), 6);
        writer.write_all(b"world").unwrap();
        drop(writer);

        assert_eq!(a, b"hello world");
        assert_eq!(b, a);
        assert_eq!(c, a);
    }

    #[test]
    fn reports_minimum_accepted_across_failures() {
        let data = vec![7u8; 64];
        let mut a = Limited::new(10, "a is full");
        let mut b = Limited::new(25, "b is full");
        let mut c = Limited::new(40, "c is full");
        let mut writer = FanOutWriter::new().with(&mut a).with(&mut b).with(&mut c);

        let err = writer.fan_out(&data).unwrap_err();
        assert_eq!(err.accepted, 10);
        assert_eq!(err.failures.len(), 3);

        let mut per_destination: Vec<(usize, usize)> =
            err.failures.iter().map(|f| (f.index, f.accepted)).collect();
        per_destination.sort();
        assert_eq!(per_destination, vec![(0, 10), (1, 25), (2, 40)]);
        assert!(err.io_failures().count() >= 1);
    }

    #[test]
    fn healthy_sibling_does_not_mask_failure() {
        let data = vec![1u8; 32];
        let mut healthy = Vec::new();
        let mut failing = Limited::new(12, "disk full");
        let mut writer = FanOutWriter::new().with(&mut healthy).with(&mut failing);

        let err = writer.fan_out(&data).unwrap_err();
        assert_eq!(err.accepted, 12);
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].index, 1);
        drop(writer);
        assert_eq!(healthy.len(), 32);
    }

    #[test]
    fn aggregates_every_distinct_failure() {
        let mut a = Limited::new(0, "first broken");
        let mut b = Limited::new(0, "second broken");
        let mut writer = FanOutWriter::new().with(&mut a).with(&mut b);

        let err = writer.fan_out(b"payload").unwrap_err();
        assert_eq!(err.accepted, 0);
        let text = err.to_string();
        assert!(text.contains("first broken"), "{text}");
        assert!(text.contains("second broken"), "{text}");
    }

    #[test]
    fn io_error_carries_fan_out_details() {
        let mut ok = Vec::new();
        let mut bad = Limited::new(3, "nope");
        let mut writer = FanOutWriter::new().with(&mut ok).with(&mut bad);

        let err = writer.write_all(b"abcdef").unwrap_err();
        let details = FanOutError::from_io(&err).expect("fan-out error inside io::Error");
        assert_eq!(details.accepted, 3);
    }

    #[test]
    fn empty_write_touches_nothing() {
        let mut bad = Limited::new(0, "never called");
        let mut writer = FanOutWriter::new().with(&mut bad);
        assert_eq!(writer.fan_out(&[]).unwrap(), 0);
    }
}
