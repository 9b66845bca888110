use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

use crate::domain::{Message, MessageAction, MessageLog, StoreError};

/// Shared handle to the conversation's [`MessageLog`].
///
/// Writes go through [`MessageStore::dispatch`], which runs the reducer under the
/// channel's lock so writers never interleave. Subscribers are notified only when
/// an action actually changed the log.
#[derive(Clone)]
pub struct MessageStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    log: watch::Sender<MessageLog>,
    torn_down: AtomicBool,
}

impl MessageStore {
    pub fn new(log: MessageLog) -> Self {
        let (sender, _) = watch::channel(log);
        Self {
            inner: Arc::new(StoreInner {
                log: sender,
                torn_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn dispatch(&self, action: MessageAction) -> Result<(), StoreError> {
        if self.is_torn_down() {
            tracing::debug!(action = action.name(), "Ignoring write to torn down store");
            return Ok(());
        }

        let action_name = action.name();
        let mut outcome = Ok(());
        self.inner.log.send_if_modified(|log| match log.apply(action) {
            Ok(changed) => changed,
            Err(e) => {
                outcome = Err(e);
                false
            }
        });

        if let Err(e) = &outcome {
            tracing::warn!(action = action_name, error = %e, "Rejected message store action");
        } else {
            tracing::trace!(action = action_name, "Applied message store action");
        }
        outcome
    }

    pub fn messages(&self) -> Vec<Message> {
        self.inner.log.borrow().messages().to_vec()
    }

    pub fn len(&self) -> usize {
        self.inner.log.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.log.borrow().is_empty()
    }

    /// Copy of the current log, or `None` once the store has been torn down.
    pub fn snapshot(&self) -> Option<Vec<Message>> {
        if self.is_torn_down() {
            return None;
        }
        Some(self.messages())
    }

    pub fn subscribe(&self) -> watch::Receiver<MessageLog> {
        self.inner.log.subscribe()
    }

    /// Detaches the store from its writers. Later dispatches become no-ops.
    pub fn teardown(&self) {
        if !self.inner.torn_down.swap(true, Ordering::AcqRel) {
            tracing::debug!("Message store torn down");
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.torn_down.load(Ordering::Acquire)
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new(MessageLog::new())
    }
}
