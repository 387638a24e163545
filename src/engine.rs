//! Redemption engine
//!
//! Turns a decoded token into exactly one of the scan outcomes while
//! enforcing at-most-once collection. The directory is the authority for
//! the collected flag; the in-process seen-token set only short-circuits
//! rapid duplicate scans and must never be the sole guard.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::directory::{MarkOutcome, OrderDirectory};
use crate::types::RedeemableOrder;

/// Outcome of one redemption attempt.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum RedeemOutcome {
    /// The order transitioned to collected in this call.
    Verified(RedeemableOrder),
    /// The order was collected before this call. The payload is present
    /// when the directory was consulted, absent on the cache fast path.
    AlreadyUsed(Option<RedeemableOrder>),
    /// The token resolves to no order.
    NotFound,
    /// The directory could not complete the exchange; the token stays
    /// uncached so a re-scan can succeed.
    Transient(String),
}

/// Releases the re-entrancy flag on every exit path, panics included.
struct ScanGuard<'a>(&'a AtomicBool);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct RedemptionEngine {
    directory: Arc<dyn OrderDirectory>,
    /// Tokens redeemed in this process lifetime. Canonical key is the
    /// order id; the display code is held as an alternate lookup input.
    seen_tokens: Mutex<HashSet<String>>,
    scanning: AtomicBool,
    token_prefix: String,
}

/// Strip the configured prefix and surrounding whitespace from a decoded
/// token.
pub fn normalize_token(raw: &str, prefix: &str) -> String {
    let trimmed = raw.trim();
    let stripped = if !prefix.is_empty() {
        trimmed.strip_prefix(prefix).unwrap_or(trimmed)
    } else {
        trimmed
    };
    stripped.trim().to_string()
}

impl RedemptionEngine {
    pub fn new(directory: Arc<dyn OrderDirectory>, token_prefix: String) -> Self {
        Self {
            directory,
            seen_tokens: Mutex::new(HashSet::new()),
            scanning: AtomicBool::new(false),
            token_prefix,
        }
    }

    /// True while a token is being resolved.
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }

    /// Number of tokens in the dedup cache.
    pub fn seen_count(&self) -> usize {
        self.lock_seen().len()
    }

    /// Drop the dedup cache. Correctness is unaffected: the directory
    /// still rejects collected orders.
    pub fn clear_seen(&self) {
        self.lock_seen().clear();
    }

    fn lock_seen(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        // A panic while holding this lock only loses cache entries, so
        // recover the inner set instead of propagating the poison.
        self.seen_tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remember(&self, order: &RedeemableOrder) {
        let mut seen = self.lock_seen();
        seen.insert(order.id.clone());
        seen.insert(order.code.clone());
    }

    /// Resolve one decoded token.
    ///
    /// Returns `None` when another resolution is already in flight; the
    /// overlapping call is ignored rather than surfaced as an error.
    pub async fn redeem(&self, raw_token: &str) -> Option<RedeemOutcome> {
        if self
            .scanning
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("Resolution already in flight, ignoring token");
            return None;
        }
        let _guard = ScanGuard(&self.scanning);

        let token = normalize_token(raw_token, &self.token_prefix);
        if token.is_empty() {
            log::warn!("Decoded token was empty after normalization");
            return Some(RedeemOutcome::NotFound);
        }

        if self.lock_seen().contains(&token) {
            log::info!("Token short-circuited by seen-token cache");
            return Some(RedeemOutcome::AlreadyUsed(None));
        }

        let order = match self.directory.find_by_code(&token).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                log::info!("No order for scanned token");
                return Some(RedeemOutcome::NotFound);
            }
            Err(e) => {
                log::warn!("Order lookup failed: {}", e);
                return Some(RedeemOutcome::Transient(e.to_string()));
            }
        };

        if order.collected {
            self.remember(&order);
            log::info!("Order {} already collected", order.id);
            return Some(RedeemOutcome::AlreadyUsed(Some(order)));
        }

        match self.directory.mark_collected(&order.id).await {
            Ok(MarkOutcome::Updated) => {
                self.remember(&order);
                log::info!("Order {} collected", order.id);
                let mut order = order;
                order.collected = true;
                Some(RedeemOutcome::Verified(order))
            }
            Ok(MarkOutcome::Conflict) => {
                // Another kiosk won the race. Re-check so the operator sees
                // the directory's view of the order.
                log::warn!("Mark-collected conflict for order {}", order.id);
                let current = self.recheck(&token).await.unwrap_or_else(|| {
                    let mut order = order.clone();
                    order.collected = true;
                    order
                });
                self.remember(&current);
                Some(RedeemOutcome::AlreadyUsed(Some(current)))
            }
            Err(e) => {
                log::warn!("Mark-collected failed for order {}: {}", order.id, e);
                Some(RedeemOutcome::Transient(e.to_string()))
            }
        }
    }

    async fn recheck(&self, token: &str) -> Option<RedeemableOrder> {
        match self.directory.find_by_code(token).await {
            Ok(found) => found,
            Err(e) => {
                log::debug!("Post-conflict re-check failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryDirectory;
    use crate::types::OrderItem;
    use chrono::Utc;

    fn order(id: &str, code: &str, collected: bool) -> RedeemableOrder {
        RedeemableOrder {
            id: id.to_string(),
            code: code.to_string(),
            items: vec![OrderItem {
                name: "Bento".to_string(),
                quantity: 1,
                unit_price: 250,
            }],
            total_amount: 250,
            collected,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_normalize_strips_prefix_and_whitespace() {
        assert_eq!(normalize_token("  MEAL:ABC123 \n", "MEAL:"), "ABC123");
        assert_eq!(normalize_token("ABC123", "MEAL:"), "ABC123");
        assert_eq!(normalize_token(" ABC123 ", ""), "ABC123");
    }

    #[tokio::test]
    async fn test_guard_released_after_each_outcome() {
        let directory = Arc::new(MemoryDirectory::new(vec![order("o1", "C1", false)]));
        let engine = RedemptionEngine::new(directory, String::new());

        assert!(engine.redeem("C1").await.is_some());
        assert!(!engine.is_scanning());

        assert!(engine.redeem("missing").await.is_some());
        assert!(!engine.is_scanning());
    }

    #[tokio::test]
    async fn test_empty_token_is_not_found() {
        let directory = Arc::new(MemoryDirectory::new(vec![]));
        let engine = RedemptionEngine::new(directory.clone(), "MEAL:".to_string());
        assert_eq!(
            engine.redeem("  MEAL: ").await,
            Some(RedeemOutcome::NotFound)
        );
        assert_eq!(directory.find_calls(), 0);
    }

    #[tokio::test]
    async fn test_seen_cache_keyed_by_id_and_code() {
        let directory = Arc::new(MemoryDirectory::new(vec![order("o1", "C1", false)]));
        let engine = RedemptionEngine::new(directory.clone(), String::new());

        assert!(matches!(
            engine.redeem("C1").await,
            Some(RedeemOutcome::Verified(_))
        ));

        // Both the code and the internal id short-circuit.
        assert_eq!(
            engine.redeem("C1").await,
            Some(RedeemOutcome::AlreadyUsed(None))
        );
        assert_eq!(
            engine.redeem("o1").await,
            Some(RedeemOutcome::AlreadyUsed(None))
        );
        assert_eq!(directory.find_calls(), 1);
    }
}
