//! Byte-stream plumbing for the upload pipeline.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;

use drivers::ByteStream;

/// Handle reporting whether a [`MeteredStream`] tore its pipeline down for
/// exceeding the size limit.
#[derive(Debug, Clone, Default)]
pub struct SizeExceeded(Arc<AtomicBool>);

impl SizeExceeded {
    pub fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// A pass-through stream that forwards chunks unchanged while counting bytes.
///
/// The first chunk pushing the running total past the limit is withheld; the
/// stream yields an error instead and fuses, which tears down whatever
/// consumes it (typically a driver write).
pub struct MeteredStream {
    inner: ByteStream,
    limit: u64,
    seen: u64,
    exceeded: SizeExceeded,
    done: bool,
}

impl MeteredStream {
    /// Wrap `inner`, enforcing `limit` bytes. Returns the wrapped stream and
    /// the flag distinguishing an over-limit teardown from other stream
    /// failures.
    pub fn wrap(inner: ByteStream, limit: u64) -> (ByteStream, SizeExceeded) {
        let exceeded = SizeExceeded::default();
        let stream = MeteredStream {
            inner,
            limit,
            seen: 0,
            exceeded: exceeded.clone(),
            done: false,
        };
        (Box::pin(stream), exceeded)
    }
}

impl Stream for MeteredStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.seen += chunk.len() as u64;
                if this.seen > this.limit {
                    this.done = true;
                    this.exceeded.set();
                    return Poll::Ready(Some(Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("stream exceeded the {} byte limit", this.limit),
                    ))));
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// A one-chunk stream, for small internally produced objects.
pub fn single_chunk(data: Bytes) -> ByteStream {
    Box::pin(futures::stream::once(async move { Ok(data) }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{stream, StreamExt, TryStreamExt};

    fn chunks(parts: &[&'static [u8]]) -> ByteStream {
        let items: Vec<io::Result<Bytes>> =
            parts.iter().map(|p| Ok(Bytes::from_static(p))).collect();
        Box::pin(stream::iter(items))
    }

    #[tokio::test]
    async fn under_limit_passes_bytes_through_unchanged() {
        let (stream, exceeded) = MeteredStream::wrap(chunks(&[b"hel", b"lo"]), 5);
        let collected: Vec<Bytes> = stream.try_collect().await.unwrap();
        assert_eq!(collected.concat(), b"hello");
        assert!(!exceeded.get());
    }

    #[tokio::test]
    async fn overshoot_errors_and_fuses() {
        let (mut stream, exceeded) = MeteredStream::wrap(chunks(&[b"hello", b" world"]), 8);

        assert_eq!(stream.next().await.unwrap().unwrap(), Bytes::from_static(b"hello"));
        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(exceeded.get());
        // Fused: the offending chunk is withheld and nothing follows.
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn upstream_errors_pass_through_without_the_flag() {
        let failing: ByteStream = Box::pin(stream::iter(vec![
            Ok(Bytes::from_static(b"ok")),
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "client went away")),
        ]));
        let (mut stream, exceeded) = MeteredStream::wrap(failing, 100);

        assert!(stream.next().await.unwrap().is_ok());
        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(!exceeded.get());
    }

    #[tokio::test]
    async fn exact_limit_is_allowed() {
        let (stream, exceeded) = MeteredStream::wrap(chunks(&[b"12345"]), 5);
        let collected: Vec<Bytes> = stream.try_collect().await.unwrap();
        assert_eq!(collected.concat(), b"12345");
        assert!(!exceeded.get());
    }
}
