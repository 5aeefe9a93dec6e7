use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use bytes::Bytes;
use tokio::time::{Sleep, sleep};

use super::{ResponseBody, Transport};
use crate::error::TransportError;

/// How the scripted server answers one request.
#[derive(Clone, Debug)]
pub enum ScriptedReply {
    /// Never responds.
    Hang,
    /// Fails before responding.
    Fail(TransportError),
    /// Responds, then plays the chunks.
    Stream(Vec<ScriptedChunk>),
}

#[derive(Clone, Debug)]
pub enum ScriptedChunk {
    Data(Duration, Bytes),
    Error(Duration, TransportError),
    /// Stops sending anything.
    Stall,
}

impl ScriptedReply {
    /// Streams `parts`, one every 5ms.
    pub fn text<const N: usize>(parts: [&'static str; N]) -> Self {
        Self::Stream(
            parts
                .into_iter()
                .map(|part| {
                    ScriptedChunk::Data(
                        Duration::from_millis(5),
                        Bytes::from_static(part.as_bytes()),
                    )
                })
                .collect(),
        )
    }

    pub fn http_error(status: u16) -> Self {
        let status = reqwest::StatusCode::from_u16(status)
            .unwrap_or(reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        Self::Fail(TransportError::Http(status))
    }
}

#[derive(Default)]
struct Script {
    replies: VecDeque<ScriptedReply>,
    questions: Vec<String>,
}

/// A transport replaying canned replies, one per request.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn push(&self, reply: ScriptedReply) {
        self.script.lock().unwrap().replies.push_back(reply);
    }

    pub fn questions(&self) -> Vec<String> {
        self.script.lock().unwrap().questions.clone()
    }

    pub fn request_count(&self) -> usize {
        self.script.lock().unwrap().questions.len()
    }
}

impl Transport for ScriptedTransport {
    type Body = ScriptedBody;

    fn open(
        &self,
        question: &str,
    ) -> impl Future<Output = Result<Self::Body, TransportError>> + Send + 'static
    {
        let reply = {
            let mut script = self.script.lock().unwrap();
            script.questions.push(question.to_owned());
            script.replies.pop_front()
        };
        async move {
            match reply {
                Some(ScriptedReply::Hang) => std::future::pending().await,
                Some(ScriptedReply::Fail(err)) => Err(err),
                Some(ScriptedReply::Stream(chunks)) => Ok(ScriptedBody {
                    chunks: chunks.into(),
                    timer: None,
                }),
                None => Err(TransportError::Other("script exhausted".into())),
            }
        }
    }
}

pub struct ScriptedBody {
    chunks: VecDeque<ScriptedChunk>,
    timer: Option<Pin<Box<Sleep>>>,
}

impl ResponseBody for ScriptedBody {
    fn poll_chunk(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<Bytes>, TransportError>> {
        let this = self.get_mut();
        let delay = match this.chunks.front() {
            None => return Poll::Ready(Ok(None)),
            Some(ScriptedChunk::Stall) => return Poll::Pending,
            Some(
                ScriptedChunk::Data(delay, _) | ScriptedChunk::Error(delay, _),
            ) => *delay,
        };
        let timer = this.timer.get_or_insert_with(|| Box::pin(sleep(delay)));
        ready!(timer.as_mut().poll(cx));
        this.timer = None;

        match this.chunks.pop_front() {
            Some(ScriptedChunk::Data(_, bytes)) => Poll::Ready(Ok(Some(bytes))),
            Some(ScriptedChunk::Error(_, err)) => {
                this.chunks.clear();
                Poll::Ready(Err(err))
            }
            _ => Poll::Ready(Ok(None)),
        }
    }
}
