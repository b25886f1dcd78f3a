//! Byte-stream adapter: XML in, MC-processed XML out.
//!
//! [`McStream`] wraps a `BufRead` source, tokenizes it on demand and feeds
//! the notifications through a [`CompatibilityFilter`] into an in-memory
//! [`XmlWriter`]. Reading pulls tokenizer steps until enough output bytes
//! are buffered, so the input is never read completely up front.
//!
//! Seeking (sources implementing `Seek`): `Current(0)` reports the position,
//! forward seeks read and discard, backward seeks rewind the source to its
//! start and replay. `End(_)` is unsupported because the output length is
//! only known after the whole input was processed.

use std::io::{self, BufRead, Read, Seek, SeekFrom};

use log::debug;

use crate::error_sink::CompatibilityError;
use crate::filter::CompatibilityFilter;
use crate::options::FilterOptions;
use crate::xml::XmlTokenizer;
use crate::xml_writer::XmlWriter;
use crate::{Error, Result};

/// Ab diesem Lese-Offset wird der Ausgabepuffer kompaktiert.
const COMPACT_THRESHOLD: usize = 64 * 1024;

/// Chunk-Groesse beim Verwerfen fuer Vorwaerts-Seeks.
const SKIP_CHUNK: usize = 8 * 1024;

pub struct McStream<R> {
    /// `None` nach einem fehlgeschlagenen Rewind.
    tokenizer: Option<XmlTokenizer<R>>,
    filter: CompatibilityFilter<XmlWriter<Vec<u8>>>,
    /// Lese-Offset im Ausgabepuffer.
    offset: usize,
    /// Anzahl bereits gelieferter Bytes.
    position: u64,
}

impl<R: BufRead> McStream<R> {
    pub fn new(source: R, options: &FilterOptions) -> Result<Self> {
        let filter = CompatibilityFilter::with_options(XmlWriter::new(Vec::new()), options)?;
        Ok(Self { tokenizer: Some(XmlTokenizer::new(source)), filter, offset: 0, position: 0 })
    }

    /// Output bytes buffered and ready to be read without touching the source.
    pub fn available(&self) -> usize {
        self.filter.handler().get_ref().len() - self.offset
    }

    /// Number of output bytes delivered so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn error_reported(&self) -> bool {
        self.filter.error_reported()
    }

    pub fn drain_errors(&mut self) -> Vec<CompatibilityError> {
        self.filter.drain_errors()
    }

    pub fn filter(&self) -> &CompatibilityFilter<XmlWriter<Vec<u8>>> {
        &self.filter
    }

    /// Tokenisiert, bis `want` Bytes gepuffert sind oder die Eingabe endet.
    fn fill(&mut self, want: usize) -> io::Result<()> {
        let Some(tokenizer) = self.tokenizer.as_mut() else {
            return Ok(());
        };
        while self.filter.handler().get_ref().len() - self.offset < want {
            match tokenizer.step(&mut self.filter) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => return Err(into_io(e)),
            }
        }
        Ok(())
    }

    fn consume(&mut self, n: usize) {
        self.offset += n;
        self.position += n as u64;
        let buf = self.filter.handler_mut().get_mut();
        if self.offset >= COMPACT_THRESHOLD && self.offset * 2 >= buf.len() {
            buf.drain(..self.offset);
            self.offset = 0;
        }
    }

    fn skip(&mut self, mut remaining: u64) -> io::Result<()> {
        while remaining > 0 {
            let chunk = remaining.min(SKIP_CHUNK as u64) as usize;
            self.fill(chunk)?;
            let n = self.available().min(chunk);
            if n == 0 {
                break;
            }
            self.consume(n);
            remaining -= n as u64;
        }
        Ok(())
    }
}

impl<R: BufRead + Seek> McStream<R> {
    /// Setzt Quelle und Filter auf den Anfang zurueck (Registries bleiben).
    fn restart(&mut self) -> io::Result<()> {
        let Some(tokenizer) = self.tokenizer.take() else {
            return Err(io::Error::other("source lost by an earlier failed rewind"));
        };
        let mut source = tokenizer.into_inner();
        source.seek(SeekFrom::Start(0))?;
        self.tokenizer = Some(XmlTokenizer::new(source));
        self.filter.reset();
        *self.filter.handler_mut() = XmlWriter::new(Vec::new());
        self.offset = 0;
        self.position = 0;
        debug!("stream rewound");
        Ok(())
    }
}

impl<R: BufRead> Read for McStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.fill(buf.len())?;
        let n = self.available().min(buf.len());
        let start = self.offset;
        buf[..n].copy_from_slice(&self.filter.handler().get_ref()[start..start + n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: BufRead + Seek> Seek for McStream<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => n,
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream")
            })?,
            SeekFrom::End(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "seeking relative to the end of a filtered stream",
                ));
            }
        };
        if target < self.position {
            self.restart()?;
        }
        self.skip(target - self.position)?;
        Ok(self.position)
    }
}

fn into_io(e: Error) -> io::Error {
    match e {
        Error::IoError(msg) => io::Error::other(msg),
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

/// Filters a complete document held in memory; returns the processed XML and
/// the MC violations recorded on the way.
pub fn filter_str(xml: &str, options: &FilterOptions) -> Result<(String, Vec<CompatibilityError>)> {
    let mut filter = CompatibilityFilter::with_options(XmlWriter::new(Vec::new()), options)?;
    crate::xml::tokenize_str(xml, &mut filter)?;
    let errors = filter.drain_errors();
    let bytes = filter.into_handler().finish()?;
    let out = String::from_utf8(bytes)
        .map_err(|_| Error::IoError("XML output is not valid UTF-8".into()))?;
    Ok((out, errors))
}
