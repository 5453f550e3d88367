use std::io::{self, Write};

use serde::Serialize;

use crate::parser::ParsedQuote;

/// A quote together with the post it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteRecord {
    pub post: String,
    #[serde(flatten)]
    pub quote: ParsedQuote,
}

/// Downstream persistence for extracted quotes, one post's records per call.
pub trait ResultConsumer {
    fn consume(&mut self, records: &[QuoteRecord]) -> io::Result<()>;
}

/// Writes each record as one JSON object per line.
pub struct JsonLinesWriter<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesWriter { writer, written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> ResultConsumer for JsonLinesWriter<W> {
    fn consume(&mut self, records: &[QuoteRecord]) -> io::Result<()> {
        for record in records {
            serde_json::to_writer(&mut self.writer, record)?;
            self.writer.write_all(b"\n")?;
            self.written += 1;
        }
        Ok(())
    }
}
