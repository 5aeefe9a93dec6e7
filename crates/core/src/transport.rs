//! The wire between a session and the answer service.

mod http;
#[cfg(test)]
pub(crate) mod scripted;

use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;

use crate::error::TransportError;
pub use http::{HttpBody, HttpTransport};

/// A streamed response body.
pub trait ResponseBody: Send + 'static {
    /// Polls for the next chunk of bytes.
    ///
    /// `Ok(None)` means the body ended normally.
    fn poll_chunk(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<Bytes>, TransportError>>;
}

/// Opens answer streams for questions.
pub trait Transport: Send + Sync + 'static {
    /// The body type of successful responses.
    type Body: ResponseBody;

    /// Asks a question.
    ///
    /// The returned future resolves once the server has responded with a
    /// success status; the answer then streams through the body.
    fn open(
        &self,
        question: &str,
    ) -> impl Future<Output = Result<Self::Body, TransportError>> + Send + 'static;
}

pub(crate) type BoxedBody = Pin<Box<dyn ResponseBody>>;

type OpenFuture =
    Pin<Box<dyn Future<Output = Result<BoxedBody, TransportError>> + Send>>;
type OpenFn = Arc<dyn Fn(&str) -> OpenFuture + Send + Sync>;

/// A type-erased [`Transport`].
#[derive(Clone)]
pub(crate) struct AskClient {
    open_fn: OpenFn,
}

impl AskClient {
    pub fn new<T: Transport>(transport: T) -> Self {
        let open_fn = move |question: &str| -> OpenFuture {
            let fut = transport.open(question);
            Box::pin(async move {
                let body = fut.await?;
                Ok(Box::pin(body) as BoxedBody)
            })
        };
        Self {
            open_fn: Arc::new(open_fn),
        }
    }

    #[inline]
    pub fn open(&self, question: &str) -> OpenFuture {
        (self.open_fn)(question)
    }
}

pub(crate) async fn next_chunk(
    body: &mut BoxedBody,
) -> Result<Option<Bytes>, TransportError> {
    poll_fn(|cx| body.as_mut().poll_chunk(cx)).await
}
