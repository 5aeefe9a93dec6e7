use std::sync::Weak;

use tokio::select;
use tokio::sync::watch;

use crate::mailbox::{Mailbox, MessageReceiver};
use crate::{Actor, Message};

#[inline]
pub async fn run_actor<S: Send + 'static>(
    mailbox: Weak<Mailbox<S>>,
    mut state: S,
    mut msg_rx: MessageReceiver<S>,
    mut kill_rx: watch::Receiver<bool>,
) {
    debug!("started");
    loop {
        let msg = select! {
            biased;

            _ = kill_rx.changed() => {
                debug!("killed");
                break;
            }
            msg = msg_rx.recv() => {
                let Some(msg) = msg else {
                    break;
                };
                msg
            }
        };
        trace!("received message: {msg:?}");

        // Messages already queued when the last handle went away are
        // not handled.
        let Some(mailbox) = mailbox.upgrade() else {
            warn!("last mailbox has been dropped, discard the message");
            break;
        };

        let proc_span = trace_span!("proc msg");
        proc_span.in_scope(|| {
            msg.handle(&mut state, &Actor::from_mailbox(mailbox));
            trace!("finished");
        });
    }

    // Close the channel so that pending senders see the actor as stopped
    // before the state (and whatever it owns) is torn down.
    msg_rx.close();
    drop(state);
    debug!("terminated");
}
