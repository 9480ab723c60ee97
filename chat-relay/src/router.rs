//! Decides which sessions receive a command and queues the text for them.
//!
//! Delivery is best effort. A recipient whose queue is closed is skipped and
//! logged; it never affects other recipients or the sender. Private messages
//! to unknown names are dropped without telling the sender.

use tracing::debug;

use crate::{
    command::Command,
    registry::{Registry, SessionHandle, SessionId},
};

#[derive(Clone)]
pub struct Router {
    registry: Registry,
}

impl Router {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Routes one parsed command from `source`. Returns how many sessions the
    /// text was queued for. `Quit` is handled by the session itself and routes
    /// nothing.
    pub async fn dispatch(&self, source: &SessionHandle, command: Command) -> usize {
        match command {
            Command::Broadcast { text } => {
                let line = format!("{}: {}", source.name(), text);
                self.broadcast(source.id(), &line).await
            }
            Command::Private { target, text } => {
                let line = format!("{} (PM): {}", source.name(), text);
                self.send_private(&target, &line).await
            }
            Command::Quit => 0,
        }
    }

    pub async fn announce_join(&self, session: &SessionHandle) -> usize {
        let line = format!("{} joined the chat.", session.name());
        self.broadcast(session.id(), &line).await
    }

    pub async fn announce_leave(&self, session: &SessionHandle) -> usize {
        let line = format!("{} left the chat.", session.name());
        self.broadcast(session.id(), &line).await
    }

    /// Queues `line` for every registered session except `exclude`.
    pub async fn broadcast(&self, exclude: SessionId, line: &str) -> usize {
        let recipients = self.registry.snapshot_except(exclude).await;
        recipients
            .iter()
            .filter(|recipient| deliver(recipient, line))
            .count()
    }

    async fn send_private(&self, target: &str, line: &str) -> usize {
        match self.registry.find_by_name(target).await {
            Some(recipient) => usize::from(deliver(&recipient, line)),
            None => {
                debug!(%target, "dropping private message for unknown recipient");
                0
            }
        }
    }
}

fn deliver(recipient: &SessionHandle, line: &str) -> bool {
    match recipient.send(line) {
        Ok(()) => true,
        Err(err) => {
            debug!(recipient = recipient.name(), %err, "failed to deliver message");
            false
        }
    }
}
