use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use reqwest::{Client, Response};
use serde::Serialize;

use super::{ResponseBody, Transport};
use crate::error::TransportError;

#[derive(Serialize)]
struct AskBody<'a> {
    question: &'a str,
}

/// Talks to a gateway over HTTP: `POST {server}/ask` with a JSON body,
/// answer streamed back as plain text.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    /// Creates a transport for the gateway at `server_url`.
    pub fn new(server_url: &str) -> Self {
        Self::with_client(Client::new(), server_url)
    }

    /// Like [`Self::new`], reusing an existing client.
    pub fn with_client(client: Client, server_url: &str) -> Self {
        let endpoint = format!("{}/ask", server_url.trim_end_matches('/'));
        Self { client, endpoint }
    }

    /// Returns the full URL questions are posted to.
    #[inline]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    type Body = HttpBody;

    fn open(
        &self,
        question: &str,
    ) -> impl Future<Output = Result<Self::Body, TransportError>> + Send + 'static
    {
        let send_fut = self
            .client
            .post(&self.endpoint)
            .json(&AskBody { question })
            .send();
        async move {
            let resp = send_fut.await.map_err(|err| {
                if err.is_connect() {
                    TransportError::Unreachable(err.to_string())
                } else {
                    TransportError::Other(err.to_string())
                }
            })?;
            let status = resp.status();
            if !status.is_success() {
                return Err(TransportError::Http(status));
            }
            Ok(HttpBody::new(resp))
        }
    }
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextChunk = (Result<Option<Bytes>, reqwest::Error>, Response);

/// Body of a [`HttpTransport`] response.
pub struct HttpBody {
    next_chunk_fut: Option<PinnedFuture<NextChunk>>,
}

impl HttpBody {
    fn new(resp: Response) -> Self {
        Self {
            next_chunk_fut: Some(read_chunk(resp)),
        }
    }
}

fn read_chunk(mut resp: Response) -> PinnedFuture<NextChunk> {
    Box::pin(async move {
        let chunk = resp.chunk().await;
        (chunk, resp)
    })
}

impl ResponseBody for HttpBody {
    fn poll_chunk(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<Bytes>, TransportError>> {
        let this = self.get_mut();
        let Some(next_chunk_fut) = &mut this.next_chunk_fut else {
            return Poll::Ready(Ok(None));
        };
        let (result, resp) = ready!(next_chunk_fut.as_mut().poll(cx));
        match result {
            Ok(Some(chunk)) => {
                this.next_chunk_fut = Some(read_chunk(resp));
                Poll::Ready(Ok(Some(chunk)))
            }
            Ok(None) => {
                this.next_chunk_fut = None;
                Poll::Ready(Ok(None))
            }
            Err(err) => {
                this.next_chunk_fut = None;
                Poll::Ready(Err(TransportError::Body(err.to_string())))
            }
        }
    }
}
