//! # Fan-in: many producers, one collecting loop.
//!
//! Each producer is a task holding one end of its own [`channel::pair`]. It
//! sends `count` numbered frames and closes its end. The collector multiplexes
//! every channel and writes one `"<producer> <value>"` line per frame, until all
//! channels reached end-of-stream.
//!
//! ```text
//! producer 0 ── FramedWrite ──► pair ──► FramedRead ─┐
//! producer 1 ── FramedWrite ──► pair ──► FramedRead ─┼─► select_all ─► "<i> <value>\n"
//! producer N ── FramedWrite ──► pair ──► FramedRead ─┘
//! ```
//!
//! There is no restart: a producer that fails surfaces as an error once the
//! collector is done.

use bytes::{Buf, BufMut, BytesMut};
use futures::{SinkExt, StreamExt, stream};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::codec::{Decoder, Encoder, FramedRead, FramedWrite};

use crate::channel;
use crate::error::{FaninError, SpawnError};

const FRAME_LEN: usize = 4;

/// Fixed-size big-endian `u32` frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct ValueCodec;

impl Decoder for ValueCodec {
    type Item = u32;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<u32>, Self::Error> {
        if src.len() < FRAME_LEN {
            src.reserve(FRAME_LEN - src.len());
            return Ok(None);
        }
        Ok(Some(src.get_u32()))
    }
}

impl Encoder<u32> for ValueCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: u32, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(FRAME_LEN);
        dst.put_u32(item);
        Ok(())
    }
}

/// Outcome of a fan-in run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaninReport {
    /// Frames received from each producer, by index.
    pub per_producer: Vec<u64>,
}

impl FaninReport {
    /// Frames received in total.
    pub fn total(&self) -> u64 {
        self.per_producer.iter().sum()
    }
}

/// Runs `producers` producers sending `count` values each and collects them
/// into `output`.
pub async fn run<W>(producers: usize, count: u32, mut output: W) -> Result<FaninReport, FaninError>
where
    W: AsyncWrite + Unpin,
{
    let mut readers = Vec::with_capacity(producers);
    let mut handles: Vec<JoinHandle<std::io::Result<()>>> = Vec::with_capacity(producers);

    for _ in 0..producers {
        let (ours, theirs) = channel::pair()?;
        let reader = ours
            .into_async()
            .map_err(|e| SpawnError::exhausted("registering channel", e))?;
        let writer = theirs
            .into_async()
            .map_err(|e| SpawnError::exhausted("registering channel", e))?;

        handles.push(tokio::spawn(async move {
            let mut sink = FramedWrite::new(writer, ValueCodec);
            for value in 0..count {
                sink.send(value).await?;
            }
            sink.close().await
        }));
        readers.push(reader);
    }

    let mut per_producer = vec![0u64; producers];
    let mut frames = stream::select_all(
        readers
            .into_iter()
            .enumerate()
            .map(|(i, r)| FramedRead::new(r, ValueCodec).map(move |frame| (i, frame))),
    );
    while let Some((i, frame)) = frames.next().await {
        let value = frame?;
        output.write_all(format!("{i} {value}\n").as_bytes()).await?;
        per_producer[i] += 1;
    }
    output.flush().await?;

    for (index, handle) in handles.into_iter().enumerate() {
        handle
            .await
            .map_err(|e| FaninError::Producer {
                index,
                reason: e.to_string(),
            })??;
    }

    Ok(FaninReport { per_producer })
}
