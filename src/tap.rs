//! Non-destructive body observation
//!
//! [`TapBody`] wraps an [`http_body::Body`] and forwards every frame to the
//! downstream consumer untouched while accumulating an in-memory copy for
//! logging. The completion callback fires exactly once, only after the final
//! frame has been both captured and forwarded; a stream error or a dropped
//! body never fires it, so no record is ever built from a partial view.
//!
//! Data is carried as [`Bytes`]; for `Bytes`-backed bodies (the common case
//! with hyper) the conversion is zero-copy, so the tap adds one cheap
//! reference-counted clone per chunk, not a byte copy.

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::{Buf, Bytes};
use http_body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;

/// Outcome of observing one body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyCapture {
    /// Nothing was captured: body logging is off for this direction, or the
    /// body had no declared content. Renders as an absent body.
    Skipped,
    /// The body was (or grew) larger than the configured ceiling; only the
    /// length is reported, never the content.
    Oversized(u64),
    /// The complete body, byte-for-byte as delivered downstream.
    Full(Bytes),
}

type CompleteFn = Box<dyn FnOnce(BodyCapture) + Send>;

struct CaptureState {
    buf: Vec<u8>,
    limit: u64,
    observed: u64,
    overflowed: bool,
    on_complete: CompleteFn,
}

impl CaptureState {
    fn observe(&mut self, chunk: &Bytes) {
        self.observed += chunk.len() as u64;
        if self.overflowed {
            return;
        }
        if self.observed > self.limit {
            // Declared length lied; stop buffering, keep counting.
            self.overflowed = true;
            self.buf = Vec::new();
        } else {
            self.buf.extend_from_slice(chunk);
        }
    }

    fn complete(self) {
        let capture = if self.overflowed {
            BodyCapture::Oversized(self.observed)
        } else {
            BodyCapture::Full(Bytes::from(self.buf))
        };
        (self.on_complete)(capture);
    }
}

pin_project! {
    /// A body adapter that yields the identical byte sequence as its inner
    /// body while optionally capturing a copy.
    ///
    /// In passthrough mode ([`TapBody::passthrough`]) no capture state exists
    /// and frames are only forwarded. In capturing mode
    /// ([`TapBody::capturing`]) every data chunk is appended to an in-memory
    /// buffer bounded by the configured ceiling, and the completion callback
    /// receives the result once the stream ends.
    pub struct TapBody<B> {
        #[pin]
        inner: B,
        capture: Option<CaptureState>,
    }
}

impl<B> TapBody<B> {
    /// Wrap a body without capturing anything.
    pub fn passthrough(inner: B) -> Self {
        Self {
            inner,
            capture: None,
        }
    }

    /// Wrap a body, capturing up to `limit` bytes and invoking `on_complete`
    /// after the last chunk has been captured and forwarded.
    pub fn capturing(
        inner: B,
        limit: u64,
        on_complete: impl FnOnce(BodyCapture) + Send + 'static,
    ) -> Self {
        Self {
            inner,
            capture: Some(CaptureState {
                buf: Vec::new(),
                limit,
                observed: 0,
                overflowed: false,
                on_complete: Box::new(on_complete),
            }),
        }
    }

    /// Whether this tap is accumulating a copy (false once completed).
    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }
}

impl<B> Body for TapBody<B>
where
    B: Body,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let mut this = self.project();

        match ready!(this.inner.as_mut().poll_frame(cx)) {
            Some(Ok(frame)) => {
                let frame = frame.map_data(|mut data| data.copy_to_bytes(data.remaining()));
                if let Some(state) = this.capture.as_mut() {
                    if let Some(chunk) = frame.data_ref() {
                        state.observe(chunk);
                    }
                }
                // Some consumers stop polling once the body reports end of
                // stream, so the final data frame must also commit.
                if this.inner.is_end_stream() {
                    if let Some(state) = this.capture.take() {
                        state.complete();
                    }
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(error)) => {
                // A broken stream never commits: no partial record.
                *this.capture = None;
                Poll::Ready(Some(Err(error)))
            }
            None => {
                if let Some(state) = this.capture.take() {
                    state.complete();
                }
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::{BodyExt, Full, StreamBody};
    use proptest::prelude::*;
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<BodyCapture>>>;

    fn recorder() -> (Captured, impl FnOnce(BodyCapture) + Send + 'static) {
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));
        let sink = captured.clone();
        (captured, move |capture| {
            sink.lock().expect("capture lock").push(capture)
        })
    }

    fn chunked(chunks: Vec<&'static [u8]>) -> impl Body<Data = Bytes, Error = std::io::Error> {
        let frames = chunks
            .into_iter()
            .map(|chunk| Ok(Frame::data(Bytes::from_static(chunk))))
            .collect::<Vec<Result<_, std::io::Error>>>();
        StreamBody::new(futures_util::stream::iter(frames))
    }

    #[tokio::test]
    async fn downstream_sees_identical_bytes_across_chunks() {
        let (captured, on_complete) = recorder();
        let tap = TapBody::capturing(chunked(vec![b"hello ", b"wor", b"ld"]), 1024, on_complete);

        let collected = tap.collect().await.expect("collect").to_bytes();
        assert_eq!(collected, Bytes::from_static(b"hello world"));

        let captures = captured.lock().expect("capture lock");
        assert_eq!(
            captures.as_slice(),
            &[BodyCapture::Full(Bytes::from_static(b"hello world"))]
        );
    }

    #[tokio::test]
    async fn callback_fires_once_for_single_chunk_body() {
        let (captured, on_complete) = recorder();
        let tap = TapBody::capturing(Full::new(Bytes::from_static(b"abc")), 1024, on_complete);

        let collected = tap.collect().await.expect("collect").to_bytes();
        assert_eq!(collected, Bytes::from_static(b"abc"));
        assert_eq!(captured.lock().expect("capture lock").len(), 1);
    }

    #[tokio::test]
    async fn overflow_reports_total_length_without_content() {
        let (captured, on_complete) = recorder();
        // Declared-size checks happen upstream; the tap still defends against
        // bodies that grow past the ceiling mid-stream.
        let tap = TapBody::capturing(chunked(vec![b"aaaa", b"bbbb", b"cc"]), 6, on_complete);

        let collected = tap.collect().await.expect("collect").to_bytes();
        assert_eq!(collected.len(), 10);

        let captures = captured.lock().expect("capture lock");
        assert_eq!(captures.as_slice(), &[BodyCapture::Oversized(10)]);
    }

    #[tokio::test]
    async fn stream_error_never_commits() {
        let (captured, on_complete) = recorder();
        let frames: Vec<Result<Frame<Bytes>, std::io::Error>> = vec![
            Ok(Frame::data(Bytes::from_static(b"partial"))),
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "reset")),
        ];
        let tap = TapBody::capturing(
            StreamBody::new(futures_util::stream::iter(frames)),
            1024,
            on_complete,
        );

        assert!(tap.collect().await.is_err());
        assert!(captured.lock().expect("capture lock").is_empty());
    }

    #[tokio::test]
    async fn dropped_body_never_commits() {
        let (captured, on_complete) = recorder();
        let mut tap = TapBody::capturing(chunked(vec![b"one", b"two"]), 1024, on_complete);

        // Consume a single frame, then drop the body mid-stream.
        let frame = std::future::poll_fn(|cx| Pin::new(&mut tap).poll_frame(cx))
            .await
            .expect("first frame")
            .expect("no error");
        assert_eq!(frame.into_data().expect("data"), Bytes::from_static(b"one"));
        drop(tap);

        assert!(captured.lock().expect("capture lock").is_empty());
    }

    #[tokio::test]
    async fn passthrough_forwards_without_capture() {
        let tap = TapBody::passthrough(chunked(vec![b"a", b"b"]));
        assert!(!tap.is_capturing());
        let collected = tap.collect().await.expect("collect").to_bytes();
        assert_eq!(collected, Bytes::from_static(b"ab"));
    }

    #[test]
    fn size_hint_delegates_to_inner() {
        let tap = TapBody::passthrough(Full::new(Bytes::from_static(b"abcd")));
        assert_eq!(tap.size_hint().exact(), Some(4));
        assert!(!tap.is_end_stream());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        // For any body and any chunking of it, the downstream sees exactly
        // the original bytes and the capture equals them too.
        #[test]
        fn prop_tap_preserves_bytes_for_any_chunking(
            payload in proptest::collection::vec(any::<u8>(), 0..512),
            cut_points in proptest::collection::vec(0usize..512, 0..6),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .expect("runtime");
            rt.block_on(async {
                let mut cuts: Vec<usize> =
                    cut_points.iter().map(|c| c % (payload.len() + 1)).collect();
                cuts.sort_unstable();
                cuts.dedup();

                let mut frames = Vec::new();
                let mut last = 0;
                for cut in cuts.into_iter().chain(std::iter::once(payload.len())) {
                    if cut > last {
                        frames.push(Ok::<_, std::io::Error>(Frame::data(Bytes::copy_from_slice(
                            &payload[last..cut],
                        ))));
                        last = cut;
                    }
                }

                let (captured, on_complete) = recorder();
                let tap = TapBody::capturing(
                    StreamBody::new(futures_util::stream::iter(frames)),
                    4096,
                    on_complete,
                );

                let collected = tap.collect().await.expect("collect").to_bytes();
                prop_assert_eq!(collected.as_ref(), payload.as_slice());

                let captures = captured.lock().expect("capture lock");
                prop_assert_eq!(captures.len(), 1);
                prop_assert_eq!(
                    &captures[0],
                    &BodyCapture::Full(Bytes::copy_from_slice(&payload))
                );
                Ok(())
            })?;
        }
    }
}
