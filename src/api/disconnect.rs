use crate::core::StreamCancelHandle;
use axum::body::Bytes;
use futures::stream::{self, Stream};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Frames travelling from a relay session to the client body.
pub type FrameResult = Result<Bytes, io::Error>;

/// A stream wrapper that triggers a cancellation handle when dropped.
///
/// The HTTP server drops the response body when the client goes away, which
/// is how the relay session learns it should stop pulling from upstream.
pub struct DisconnectStream<S> {
    pub stream: S,
    pub cancel_handle: StreamCancelHandle,
}

impl<S> DisconnectStream<S> {
    pub fn new(stream: S, cancel_handle: StreamCancelHandle) -> Self {
        Self {
            stream,
            cancel_handle,
        }
    }
}

/// Body stream fed by the receiving half of a session's frame channel.
pub fn channel_body(
    mut receiver: mpsc::Receiver<FrameResult>,
    cancel_handle: StreamCancelHandle,
) -> DisconnectStream<impl Stream<Item = FrameResult> + Unpin + Send> {
    let frames = stream::poll_fn(move |cx| receiver.poll_recv(cx));
    DisconnectStream::new(frames, cancel_handle)
}

impl<S, E> Stream for DisconnectStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<Bytes, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.stream).poll_next(cx)
    }
}

impl<S> Drop for DisconnectStream<S> {
    fn drop(&mut self) {
        // Also runs after a normal end; cancel() is a no-op once the session
        // has marked itself finished.
        if !self.cancel_handle.is_finished() {
            tracing::debug!("Client disconnect detected - stream cancelled");
        }
        self.cancel_handle.cancel();
    }
}
