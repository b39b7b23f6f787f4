//! Buffered `alert()` and error output of a non-blocking attempt.
//!
//! An attempt that may still be abandoned cannot emit diagnostics right
//! away: a later attempt would emit them again. Records are held here and
//! only flushed once the attempt completes without being abandoned.

use std::mem;

/// Kind of diagnostic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Alert,
    Error,
}

/// One `alert()` call or script error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertOrError {
    pub kind: AlertKind,
    pub line_number: Option<u32>,
    pub message: String,
}

impl AlertOrError {
    pub fn alert(message: impl Into<String>) -> Self {
        Self { kind: AlertKind::Alert, line_number: None, message: message.into() }
    }

    pub fn error(line_number: Option<u32>, message: impl Into<String>) -> Self {
        Self { kind: AlertKind::Error, line_number, message: message.into() }
    }

    pub fn is_alert(&self) -> bool {
        self.kind == AlertKind::Alert
    }

    /// Approximate memory held by this record.
    fn byte_cost(&self) -> usize {
        mem::size_of::<Self>() + self.message.len()
    }
}

/// Returned by [`AlertErrorBuffer::record`] when the byte budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferFull;

/// Ordered, byte-bounded list of diagnostic records.
#[derive(Debug)]
pub struct AlertErrorBuffer {
    records: Vec<AlertOrError>,
    byte_cost: usize,
    max_bytes: usize,
}

impl AlertErrorBuffer {
    pub fn new(max_bytes: usize) -> Self {
        Self { records: Vec::new(), byte_cost: 0, max_bytes }
    }

    /// Appends a record.
    ///
    /// The running cost is charged even when the record is refused, so a
    /// refusal is sticky for the rest of the attempt.
    pub fn record(&mut self, entry: AlertOrError) -> Result<(), BufferFull> {
        self.byte_cost += entry.byte_cost();
        if self.byte_cost > self.max_bytes {
            return Err(BufferFull);
        }
        self.records.push(entry);
        Ok(())
    }

    /// Hands every record to `sink` in recording order, then empties the
    /// buffer.
    pub fn flush_to(&mut self, mut sink: impl FnMut(&AlertOrError)) {
        for entry in self.records.drain(..) {
            sink(&entry);
        }
        self.byte_cost = 0;
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.byte_cost = 0;
    }

    pub fn byte_cost(&self) -> usize {
        self.byte_cost
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
