// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cached bearer/session token shared by concurrent API calls.

use crate::error::AppError;
use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use tokio::sync::Mutex;

/// Margin before token expiration when we proactively refresh.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// A single cached token.
///
/// The mutex is held while a new token is fetched so concurrent callers wait
/// for one login instead of each performing their own.
#[derive(Default)]
pub struct TokenSlot {
    inner: Mutex<Option<CachedToken>>,
}

impl TokenSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached token, fetching a new one if missing or expiring.
    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<String, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(String, DateTime<Utc>), AppError>>,
    {
        let mut slot = self.inner.lock().await;
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        if let Some(cached) = slot.as_ref() {
            if Utc::now() + margin < cached.expires_at {
                return Ok(cached.token.clone());
            }
        }

        let (token, expires_at) = fetch().await?;
        *slot = Some(CachedToken {
            token: token.clone(),
            expires_at,
        });
        Ok(token)
    }

    /// Drop the cached token so the next call logs in again.
    pub async fn invalidate(&self) {
        self.inner.lock().await.take();
    }

    /// Whether a token is cached and not about to expire.
    pub async fn is_valid(&self) -> bool {
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);
        self.inner
            .lock()
            .await
            .as_ref()
            .is_some_and(|cached| Utc::now() + margin < cached.expires_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_token_is_cached_until_invalidated() {
        let slot = TokenSlot::new();
        let counter = AtomicUsize::new(0);
        let fetches = &counter;
        let fetch = move || async move {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok(("tok".to_string(), Utc::now() + Duration::hours(1)))
        };

        assert_eq!(slot.get_or_fetch(fetch).await.unwrap(), "tok");
        assert_eq!(slot.get_or_fetch(fetch).await.unwrap(), "tok");
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert!(slot.is_valid().await);

        slot.invalidate().await;
        assert!(!slot.is_valid().await);
        slot.get_or_fetch(fetch).await.unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expiring_token_is_refetched() {
        let slot = TokenSlot::new();
        slot.get_or_fetch(|| async { Ok(("old".to_string(), Utc::now() + Duration::seconds(10))) })
            .await
            .unwrap();

        let token = slot
            .get_or_fetch(|| async { Ok(("new".to_string(), Utc::now() + Duration::hours(1))) })
            .await
            .unwrap();
        assert_eq!(token, "new");
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_slot_empty() {
        let slot = TokenSlot::new();
        let result = slot
            .get_or_fetch(|| async { Err(AppError::Crm("login failed".to_string())) })
            .await;
        assert!(result.is_err());
        assert!(!slot.is_valid().await);
    }
}
