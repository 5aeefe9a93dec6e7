use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;

use crate::view::{RenderState, SharedView};

/// Reveals answer chunks one character at a time.
///
/// Every run is tied to an epoch. The run task only touches the answer
/// while the view still carries its epoch, so a stopped run can never
/// write into a later answer even if it is mid-append.
pub(crate) struct Typewriter {
    view: SharedView,
    interval: Duration,
    chunk_pause: Duration,
    run: Option<Run>,
}

struct Run {
    epoch: u64,
    chunk_tx: mpsc::UnboundedSender<String>,
    // Dropping this ends the run task.
    _stop_tx: oneshot::Sender<()>,
    // Everything enqueued so far. The answer text is always a prefix of it.
    target: String,
}

impl Typewriter {
    pub fn new(view: SharedView, interval: Duration, chunk_pause: Duration) -> Self {
        Self {
            view,
            interval,
            chunk_pause,
            run: None,
        }
    }

    /// Starts a new run, discarding the previous one and clearing the
    /// trailing answer.
    pub fn start(&mut self, epoch: u64) {
        self.stop();

        self.view.update(|view| {
            view.render = RenderState {
                epoch,
                pending_chunks: 0,
            };
            view.transcript.set_assistant_text("");
        });

        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        tokio::spawn(run_typewriter(
            self.view.clone(),
            epoch,
            chunk_rx,
            stop_rx,
            self.interval,
            self.chunk_pause,
        ));
        self.run = Some(Run {
            epoch,
            chunk_tx,
            _stop_tx: stop_tx,
            target: String::new(),
        });
    }

    pub fn enqueue(&mut self, chunk: String) {
        let Some(run) = &mut self.run else {
            warn!("dropping chunk, no typewriter run");
            return;
        };
        let epoch = run.epoch;
        self.view.update_if(|view| {
            if view.render.epoch != epoch {
                return false;
            }
            view.render.pending_chunks += 1;
            true
        });
        run.target.push_str(&chunk);
        run.chunk_tx.send(chunk).ok();
    }

    /// Stops the current run, leaving the answer as revealed so far.
    pub fn stop(&mut self) {
        self.end_run(false);
    }

    /// Stops the current run, revealing the rest of the answer at once.
    pub fn flush(&mut self) {
        self.end_run(true);
    }

    fn end_run(&mut self, reveal_rest: bool) {
        let Some(run) = self.run.take() else {
            return;
        };
        self.view.update_if(|view| {
            if view.render.epoch != run.epoch {
                return false;
            }
            view.render = RenderState::default();
            if reveal_rest {
                view.transcript.set_assistant_text(&run.target);
            }
            true
        });
    }
}

async fn run_typewriter(
    view: SharedView,
    epoch: u64,
    mut chunk_rx: mpsc::UnboundedReceiver<String>,
    stop_rx: oneshot::Receiver<()>,
    interval: Duration,
    chunk_pause: Duration,
) {
    let reveal = async {
        while let Some(chunk) = chunk_rx.recv().await {
            for ch in chunk.chars() {
                sleep(interval).await;
                let appended = view.update_if(|view| {
                    view.render.epoch == epoch
                        && view.transcript.append_to_assistant(ch)
                });
                if !appended {
                    return;
                }
            }

            let mut more = false;
            view.update_if(|view| {
                if view.render.epoch != epoch {
                    return false;
                }
                view.render.pending_chunks =
                    view.render.pending_chunks.saturating_sub(1);
                more = view.render.pending_chunks > 0;
                true
            });
            if more {
                sleep(chunk_pause).await;
            }
        }
    };

    tokio::select! {
        biased;
        _ = stop_rx => {}
        _ = reveal => {}
    }
    trace!(epoch, "typewriter run ended");
}

#[cfg(test)]
mod tests {
    use tokio::time::advance;

    use super::*;
    use crate::conversation::ConversationMessage;
    use crate::view::ChatView;

    fn setup() -> (SharedView, Typewriter) {
        let view = SharedView::new(ChatView::default());
        view.update(|view| {
            view.transcript.push(ConversationMessage::user("Q"));
            view.transcript
                .push(ConversationMessage::assistant_placeholder());
        });
        let typewriter = Typewriter::new(
            view.clone(),
            Duration::from_millis(20),
            Duration::from_millis(10),
        );
        (view, typewriter)
    }

    fn answer(view: &SharedView) -> String {
        view.snapshot()
            .transcript
            .assistant_tail()
            .unwrap_or_default()
            .to_owned()
    }

    #[tokio::test(start_paused = true)]
    async fn test_reveals_in_order() {
        let (view, mut typewriter) = setup();
        typewriter.start(1);
        typewriter.enqueue("ab".to_owned());
        typewriter.enqueue("cd".to_owned());
        typewriter.enqueue("ef".to_owned());
        assert!(view.snapshot().is_typing());

        sleep(Duration::from_millis(25)).await;
        assert_eq!(answer(&view), "a");

        sleep(Duration::from_secs(1)).await;
        assert_eq!(answer(&view), "abcdef");
        assert!(!view.snapshot().is_typing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_and_flush() {
        let (view, mut typewriter) = setup();
        typewriter.start(1);
        typewriter.enqueue("hello".to_owned());
        sleep(Duration::from_millis(45)).await;
        assert_eq!(answer(&view), "he");

        typewriter.stop();
        assert!(!view.snapshot().is_typing());
        advance(Duration::from_secs(1)).await;
        assert_eq!(answer(&view), "he");

        typewriter.start(2);
        assert_eq!(answer(&view), "");
        typewriter.enqueue("world".to_owned());
        sleep(Duration::from_millis(25)).await;
        typewriter.flush();
        assert_eq!(answer(&view), "world");
        sleep(Duration::from_secs(1)).await;
        assert_eq!(answer(&view), "world");
    }
}
