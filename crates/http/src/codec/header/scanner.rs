//! Incremental search for the end of a request head.
//!
//! The scanner walks the read buffer once, remembering where it stopped, so a
//! head that arrives across many reads is never rescanned. While looking for
//! the `CRLFCRLF` terminator it rejects any control byte other than CR and LF
//! (horizontal tab included) and any byte with the high bit set.

/// Progress through a potential `\r\n\r\n` terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ScanState {
    #[default]
    None,
    Cr,
    CrLf,
    CrLfCr,
}

/// Result of scanning the bytes currently buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// No terminator yet, every byte so far is acceptable.
    Incomplete,
    /// The head ends after this many bytes, terminator included.
    Complete(usize),
    /// A byte that may not appear in a request head.
    Forbidden { byte: u8, position: usize },
}

#[derive(Debug, Default)]
pub struct HeaderScanner {
    state: ScanState,
    scanned: usize,
}

impl HeaderScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans `buf`, which must start with the same bytes as on the previous call.
    pub fn scan(&mut self, buf: &[u8]) -> ScanOutcome {
        let start = self.scanned.min(buf.len());
        for (offset, &byte) in buf[start..].iter().enumerate() {
            let position = start + offset;
            self.state = match (byte, self.state) {
                (b'\r', ScanState::CrLf) => ScanState::CrLfCr,
                (b'\r', _) => ScanState::Cr,
                (b'\n', ScanState::Cr) => ScanState::CrLf,
                (b'\n', ScanState::CrLfCr) => {
                    self.reset();
                    return ScanOutcome::Complete(position + 1);
                }
                (b'\n', _) => ScanState::None,
                (0x00..=0x1f | 0x80..=0xff, _) => {
                    self.reset();
                    return ScanOutcome::Forbidden { byte, position };
                }
                _ => ScanState::None,
            };
        }

        self.scanned = buf.len();
        ScanOutcome::Incomplete
    }

    /// Forgets all progress, ready for the next head.
    pub fn reset(&mut self) {
        self.state = ScanState::None;
        self.scanned = 0;
    }
}
