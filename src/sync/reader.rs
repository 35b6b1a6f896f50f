use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK: usize = 64 * 1024;

/// Drains one inbound connection into a complete payload.
#[async_trait]
pub trait PayloadReader: Send + Sync {
    async fn read_payload<S>(&self, stream: &mut S) -> std::io::Result<Vec<u8>>
    where
        S: AsyncRead + Unpin + Send;
}

/// Reads until the peer closes the connection or `max_bytes` is reached.
///
/// There is no length prefix: end of message is the sender disconnecting. When
/// the budget is hit first, whatever the peer still had to send is left unread.
#[derive(Debug, Clone)]
pub struct CloseDelimitedReader {
    max_bytes: usize,
}

impl CloseDelimitedReader {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

#[async_trait]
impl PayloadReader for CloseDelimitedReader {
    async fn read_payload<S>(&self, stream: &mut S) -> std::io::Result<Vec<u8>>
    where
        S: AsyncRead + Unpin + Send,
    {
        let mut data = Vec::new();
        let mut chunk = vec![0u8; READ_CHUNK.min(self.max_bytes)];

        while data.len() < self.max_bytes {
            let want = (self.max_bytes - data.len()).min(chunk.len());
            let n = stream.read(&mut chunk[..want]).await?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);
        }

        Ok(data)
    }
}
