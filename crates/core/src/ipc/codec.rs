use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode message '{line}'")]
    Decode {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("ipc write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Encode a message as one newline-terminated JSON line.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, IpcError> {
    let mut line = serde_json::to_string(message).map_err(IpcError::Encode)?;
    line.push('\n');
    Ok(line)
}

/// Decode one JSON line (surrounding whitespace ignored).
pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T, IpcError> {
    serde_json::from_str(line.trim()).map_err(|source| IpcError::Decode {
        line: line.trim().to_string(),
        source,
    })
}

/// Drain `rx` into `writer` as JSON lines until every sender is dropped.
///
/// Spawn this as a background task next to the producer.
pub async fn write_lines<T, W>(mut rx: mpsc::Receiver<T>, mut writer: W) -> Result<(), IpcError>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let line = encode_line(&message)?;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}
