use std::io::{ErrorKind, Read};
use std::path::Path;
use crate::error::TraceError;
use crate::io::{get_reader, TraceSource};

/// Size in bytes of one trace record: four native-endian u32 words
pub const RECORD_SIZE: usize = 16;

const DEPTH_MASK: u32 = 0xF;

/// One recorded guest page walk
///
/// `l1_addr` and `l2_addr` are the guest physical addresses of the first and second level
/// descriptors, `final_addr` is the guest physical address the walk resolved to
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TranslationEvent {
    /// Number of levels the walk needed, 1 to 3
    pub depth: u8,
    pub l1_addr: u32,
    pub l2_addr: u32,
    pub final_addr: u32,
    /// Upper bits of the first word, written by the tracer and not interpreted here
    pub provenance: u32,
}

impl TranslationEvent {
    pub fn new(depth: u8, l1_addr: u32, l2_addr: u32, final_addr: u32) -> Self {
        Self {
            depth,
            l1_addr,
            l2_addr,
            final_addr,
            provenance: 0,
        }
    }

    /// Decodes a record from its four words
    pub fn from_words(words: [u32; 4]) -> Self {
        Self {
            depth: (words[0] & DEPTH_MASK) as u8,
            l1_addr: words[1],
            l2_addr: words[2],
            final_addr: words[3],
            provenance: words[0] & !DEPTH_MASK,
        }
    }

    /// Encodes the record the way the tracer writes it
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];
        let words = [self.provenance | (self.depth as u32 & DEPTH_MASK), self.l1_addr, self.l2_addr, self.final_addr];
        for (chunk, word) in out.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_ne_bytes());
        }
        out
    }
}

/// Streams translation events out of a trace
///
/// Reads are strictly sequential. A trailing partial record, from a trace cut short while it was
/// being written, ends the stream like a clean end of file does
pub struct TraceReader<R: Read> {
    input: R,
    events_read: u64,
    finished: bool,
}

impl TraceReader<TraceSource> {
    /// Opens a trace file, memory mapping it where possible
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TraceError> {
        Ok(Self::new(get_reader(path.as_ref())?))
    }
}

impl<R: Read> TraceReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            events_read: 0,
            finished: false,
        }
    }

    /// Reads the next event, returning None once fewer than 16 bytes remain
    pub fn next_event(&mut self) -> Result<Option<TranslationEvent>, TraceError> {
        if self.finished {
            return Ok(None);
        }
        let mut buffer = [0u8; RECORD_SIZE];
        match self.input.read_exact(&mut buffer) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.finished = true;
                return Ok(None);
            }
            Err(e) => {
                self.finished = true;
                return Err(TraceError::Read(e));
            }
        }
        let mut words = [0u32; 4];
        for (word, chunk) in words.iter_mut().zip(buffer.chunks_exact(4)) {
            *word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        self.events_read += 1;
        Ok(Some(TranslationEvent::from_words(words)))
    }

    /// Number of complete events returned so far
    pub fn events_read(&self) -> u64 {
        self.events_read
    }
}

impl<R: Read> Iterator for TraceReader<R> {
    type Item = Result<TranslationEvent, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}
