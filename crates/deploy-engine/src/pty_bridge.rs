use std::io::Read;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::AsyncRead;
use tokio::sync::mpsc;

/// Bridges a `portable_pty` master's synchronous `Read` side into an `AsyncRead` by running the
/// blocking read loop on a dedicated thread and forwarding chunks over a channel. `portable_pty`
/// gives us no async-capable reader, so this is the minimum glue needed to drive it from a tokio
/// task.
pub struct ChannelReader {
    rx: mpsc::Receiver<std::io::Result<Vec<u8>>>,
    pending: Vec<u8>,
    pos: usize,
}

impl ChannelReader {
    /// Spawns a blocking task that reads from `reader` until EOF or error, forwarding chunks of
    /// at most `chunk_size` bytes. Returns the `ChannelReader` side to hand to an async caller.
    pub fn spawn(mut reader: Box<dyn Read + Send>, chunk_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(64);
        tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; chunk_size];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.blocking_send(Ok(buf[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.blocking_send(Err(e));
                        break;
                    }
                }
            }
        });
        Self { rx, pending: Vec::new(), pos: 0 }
    }
}

impl AsyncRead for ChannelReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if self.pos < self.pending.len() {
            let n = std::cmp::min(buf.remaining(), self.pending.len() - self.pos);
            buf.put_slice(&self.pending[self.pos..self.pos + n]);
            self.pos += n;
            return Poll::Ready(Ok(()));
        }

        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                self.pending = chunk;
                self.pos = 0;
                let n = std::cmp::min(buf.remaining(), self.pending.len());
                buf.put_slice(&self.pending[..n]);
                self.pos = n;
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Some(Err(e))) => Poll::Ready(Err(e)),
            Poll::Ready(None) => Poll::Ready(Ok(())),
            Poll::Pending => Poll::Pending,
        }
    }
}
