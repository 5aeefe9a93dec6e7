use std::fmt::{self, Debug, Formatter};
use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::Stream;
use futures_util::stream;
use relaychat_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ModelResponseEvent,
};
use tracing::Instrument;

/// A provider failure, with the provider type erased.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message} ({kind})")]
pub struct CompletionError {
    message: String,
    kind: ErrorKind,
}

impl CompletionError {
    fn from_provider<E: ModelProviderError>(err: &E) -> Self {
        Self {
            message: err.to_string(),
            kind: err.kind(),
        }
    }

    /// Returns the error kind reported by the provider.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Answer text fragments, in the order the provider produced them.
pub type Fragments =
    Pin<Box<dyn Stream<Item = Result<String, CompletionError>> + Send>>;

type BoxedStartFuture =
    Pin<Box<dyn Future<Output = Result<Fragments, CompletionError>> + Send>>;
type HandlerFn = Arc<dyn Fn(ModelRequest) -> BoxedStartFuture + Send + Sync>;

/// A wrapper around a model provider, providing a type-erased interface
/// for the request handlers.
#[derive(Clone)]
pub struct CompletionClient {
    handler_fn: HandlerFn,
}

impl Debug for CompletionClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionClient").finish_non_exhaustive()
    }
}

impl CompletionClient {
    /// Creates a client that forwards questions to `provider`.
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        let handler_fn: HandlerFn = Arc::new(move |req| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("sending request: {req:?}");
                    match fut.await {
                        Ok(resp) => Ok(fragments(resp)),
                        Err(err) => {
                            error!("provider rejected the request: {err}");
                            Err(CompletionError::from_provider(&err))
                        }
                    }
                }
                .instrument(trace_span!("completion request")),
            )
        });
        Self { handler_fn }
    }

    /// Asks the provider a single question.
    ///
    /// Resolves once the provider has accepted the request. The answer
    /// itself streams through the returned [`Fragments`]; dropping them
    /// stops pulling from the provider.
    #[inline]
    pub async fn ask(&self, question: &str) -> Result<Fragments, CompletionError> {
        (self.handler_fn)(ModelRequest::with_question(question)).await
    }
}

fn fragments<R: ModelResponse>(resp: R) -> Fragments {
    let resp = Box::pin(resp);
    Box::pin(stream::unfold(Some(resp), |resp| async move {
        let mut resp = resp?;
        loop {
            match poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await {
                Ok(Some(ModelResponseEvent::MessageDelta(delta))) => {
                    return Some((Ok(delta), Some(resp)));
                }
                Ok(Some(ModelResponseEvent::Completed(reason))) => {
                    trace!("provider finished: {reason:?}");
                }
                Ok(None) => return None,
                Err(err) => {
                    error!("provider failed mid-stream: {err}");
                    return Some((
                        Err(CompletionError::from_provider(&err)),
                        None,
                    ));
                }
            }
        }
    }))
}
