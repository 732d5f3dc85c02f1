use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

const READ_CHUNK_BYTES: usize = 4096;

/// Where model output is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
}

impl InputSource {
    /// `None` and `-` both mean stdin.
    pub fn from_arg(arg: Option<PathBuf>) -> Self {
        match arg {
            Some(path) if path != Path::new("-") => Self::File(path),
            _ => Self::Stdin,
        }
    }
}

/// Read the whole input as text.
pub async fn read_input(source: &InputSource) -> anyhow::Result<String> {
    match source {
        InputSource::Stdin => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("failed to read stdin")?;
            Ok(text)
        }
        InputSource::File(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read '{}'", path.display())),
    }
}

/// Forward the input chunk by chunk until EOF or the receiver goes away.
pub async fn stream_input(source: &InputSource, tx: mpsc::Sender<String>) -> anyhow::Result<()> {
    match source {
        InputSource::Stdin => forward_chunks(tokio::io::stdin(), tx).await,
        InputSource::File(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open '{}'", path.display()))?;
            forward_chunks(file, tx).await
        }
    }
}

async fn forward_chunks<R>(mut reader: R, tx: mpsc::Sender<String>) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut decoder = Utf8ChunkDecoder::default();
    let mut buf = vec![0u8; READ_CHUNK_BYTES];
    loop {
        let n = reader.read(&mut buf).await.context("failed to read input")?;
        let text = if n == 0 {
            decoder.finish()
        } else {
            decoder.push(&buf[..n])
        };
        if !text.is_empty() && tx.send(text).await.is_err() {
            tracing::debug!("stream consumer dropped; stop reading input");
            return Ok(());
        }
        if n == 0 {
            return Ok(());
        }
    }
}

/// Turns arbitrary byte chunks into text without splitting a code point.
///
/// Incomplete trailing sequences are held until the next chunk. Invalid bytes
/// become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    consumed = self.pending.len();
                    break;
                }
                Err(err) => {
                    let valid_up_to = consumed + err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[consumed..valid_up_to]));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid_up_to + len;
                        }
                        None => {
                            consumed = valid_up_to;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..consumed);
        out
    }

    /// Flush whatever is left, replacing a truncated sequence.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}
