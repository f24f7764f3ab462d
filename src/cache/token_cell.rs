use std::future::Future;

use tokio::sync::{Mutex, RwLock};

use crate::cache::token::Token;

/// Single-slot token holder owned by one `TokenService`.
///
/// Reads take a short read lock on the slot. Writers are serialized by a
/// separate FIFO update lock which is held across the whole
/// `update_and_get` closure, so at most one refresh runs at a time while
/// plain reads keep going. A waiter dropped while queued leaves the queue;
/// an updater dropped mid-closure never touches the slot.
#[derive(Debug, Default)]
pub struct TokenCell {
    slot: RwLock<Option<Token>>,
    update: Mutex<()>,
}

impl TokenCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents. Does not wait for a refresh in flight.
    pub async fn get(&self) -> Option<Token> {
        self.slot.read().await.clone()
    }

    /// Replace the contents, returning what was there before.
    pub async fn set(&self, token: Token) -> Option<Token> {
        let _update = self.update.lock().await;
        self.slot.write().await.replace(token)
    }

    /// Store `new` only if the slot still holds `expected`.
    pub async fn compare_and_set(&self, expected: Option<&Token>, new: Token) -> bool {
        let _update = self.update.lock().await;
        let mut slot = self.slot.write().await;
        if slot.as_ref() != expected {
            return false;
        }
        *slot = Some(new);
        true
    }

    /// Apply `f` to the current contents and store its result.
    ///
    /// Concurrent callers run `f` one at a time in arrival order. On error
    /// the previous contents stay in place and the error is returned.
    pub async fn update_and_get<F, Fut, E>(&self, f: F) -> Result<Token, E>
    where
        F: FnOnce(Option<Token>) -> Fut,
        Fut: Future<Output = Result<Token, E>>,
    {
        let _update = self.update.lock().await;
        let current = self.slot.read().await.clone();

        let updated = f(current).await?;
        *self.slot.write().await = Some(updated.clone());
        Ok(updated)
    }
}
