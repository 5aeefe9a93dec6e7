//! Session configuration.

use std::time::Duration;

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};

/// What to do when an answer fails after part of it has arrived.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PartialReplyPolicy {
    /// Discard the partial answer and ask again from scratch, as long as
    /// retries remain.
    #[default]
    Restart,
    /// Keep the partial answer and stop, reporting the failure.
    Keep,
}

/// Tunables for a [`crate::ChatSession`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub(crate) max_retries: u32,
    pub(crate) connect_timeout: Duration,
    pub(crate) stream_timeout: Duration,
    pub(crate) initial_backoff: Duration,
    pub(crate) typing_interval: Duration,
    pub(crate) chunk_pause: Duration,
    pub(crate) partial_reply: PartialReplyPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            connect_timeout: Duration::from_secs(30),
            stream_timeout: Duration::from_secs(10),
            initial_backoff: Duration::from_secs(1),
            typing_interval: Duration::from_millis(20),
            chunk_pause: Duration::from_millis(10),
            partial_reply: PartialReplyPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Creates a builder starting from the defaults.
    #[inline]
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Retries allowed after the first attempt.
    #[inline]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// How long to wait for the server to respond.
    #[inline]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// How long the response body may stay silent.
    #[inline]
    pub fn stream_timeout(&self) -> Duration {
        self.stream_timeout
    }

    /// Delay between revealed characters.
    #[inline]
    pub fn typing_interval(&self) -> Duration {
        self.typing_interval
    }

    /// What happens to a partial answer on failure.
    #[inline]
    pub fn partial_reply(&self) -> PartialReplyPolicy {
        self.partial_reply
    }

    /// Retry delays double from the initial backoff, without jitter.
    pub(crate) fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_backoff)
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_interval(Duration::from_secs(60))
            .with_max_elapsed_time(None)
            .build()
    }
}

/// [`SessionConfig`] builder.
#[derive(Clone, Debug)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Sets how many retries follow a failed first attempt.
    #[inline]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Sets how long to wait for the server to respond.
    #[inline]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets how long the response body may stay silent.
    #[inline]
    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.config.stream_timeout = timeout;
        self
    }

    /// Sets the delay before the first retry. Later retries double it.
    #[inline]
    pub fn with_initial_backoff(mut self, delay: Duration) -> Self {
        self.config.initial_backoff = delay;
        self
    }

    /// Sets the delay between revealed characters.
    #[inline]
    pub fn with_typing_interval(mut self, interval: Duration) -> Self {
        self.config.typing_interval = interval;
        self
    }

    /// Sets the pause between two queued chunks.
    #[inline]
    pub fn with_chunk_pause(mut self, pause: Duration) -> Self {
        self.config.chunk_pause = pause;
        self
    }

    /// Sets what happens to a partial answer on failure.
    #[inline]
    pub fn with_partial_reply(mut self, policy: PartialReplyPolicy) -> Self {
        self.config.partial_reply = policy;
        self
    }

    /// Builds the config.
    #[inline]
    pub fn build(self) -> SessionConfig {
        self.config
    }
}
