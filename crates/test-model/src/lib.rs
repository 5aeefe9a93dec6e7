//! A local fake completion provider for testing purpose.

mod preset;

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use relaychat_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    events: Vec<PresetEvent>,
    event_idx: usize,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
    finished: bool,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        if this.finished {
            // In case this method is called after completion.
            return Poll::Ready(Ok(None));
        }

        let delay = this.delay;
        let timer = this.sleep.get_or_insert_with(|| Box::pin(sleep(delay)));
        ready!(timer.as_mut().poll(cx));
        this.sleep = None;

        let Some(event) = this.events.get(this.event_idx) else {
            this.finished = true;
            return Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                ModelFinishReason::Stop,
            ))));
        };
        this.event_idx += 1;

        match event {
            PresetEvent::MessageDelta(delta) => Poll::Ready(Ok(Some(
                ModelResponseEvent::MessageDelta(delta.clone()),
            ))),
            PresetEvent::Failure(reason) => {
                this.finished = true;
                Poll::Ready(Err(Error::new(reason.clone(), ErrorKind::Other)))
            }
        }
    }
}

#[derive(Default)]
struct Script {
    steps: Vec<PresetResponse>,
    step_idx: usize,
    // Rejected requests so far for the current step.
    step_rejections: u64,
    prompts: Vec<String>,
}

/// A local fake completion provider for testing purpose.
///
/// Before sending requests, you need to setup the script, which is how the
/// provider should respond to each request. Steps are consumed in request
/// order; a step configured with failures rejects that many requests before
/// it is served. If there are no enough steps in the script, an error will
/// be returned.
///
/// Clones share the same script, so a test can keep a clone around to
/// inspect the requests after handing the provider to a server.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_response_step(&mut self, preset: PresetResponse) {
        self.lock().steps.push(preset);
    }

    /// Sets the delay before each event is delivered.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns how many requests have been received, rejected ones included.
    pub fn request_count(&self) -> usize {
        self.lock().prompts.len()
    }

    /// Returns the user prompts of all received requests.
    pub fn prompts(&self) -> Vec<String> {
        self.lock().prompts.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        // A panicking test thread may poison the lock; the script itself
        // stays usable.
        self.script.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let delay = self.delay.unwrap_or(Duration::from_millis(1));
        let mut script = self.lock();
        script
            .prompts
            .push(req.last_user_text().unwrap_or_default().to_owned());

        let result = 'blk: {
            let (rejects, events) = match script.steps.get(script.step_idx) {
                Some(step) => {
                    (step.rejects(script.step_rejections), step.events.clone())
                }
                None => {
                    break 'blk Err(Error::new(
                        "no enough steps",
                        ErrorKind::RateLimitExceeded,
                    ));
                }
            };

            if rejects {
                script.step_rejections += 1;
                break 'blk Err(Error::new(
                    "scripted failure",
                    ErrorKind::Other,
                ));
            }

            script.step_idx += 1;
            script.step_rejections = 0;
            Ok(TestModelResponse {
                events,
                event_idx: 0,
                delay,
                sleep: None,
                finished: false,
            })
        };
        ready(result)
    }
}
