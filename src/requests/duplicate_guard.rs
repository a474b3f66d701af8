//! Pre-creation idempotency check
//!
//! A guest mashing the "ready to pay" button must re-buzz the existing
//! request, not pile up new ones. The lookup runs on the same transaction
//! as the subsequent insert so a duplicate cannot slip through between
//! check and insert.

use crate::utils::AppResult;
use sqlx::SqliteConnection;

/// Phrases recognized as a payment-readiness request. Matching is
/// case-insensitive substring containment on the normalized content.
const PAYMENT_READY_PHRASES: &[&str] = &["ready to pay", "bill please", "check please", "la cuenta"];

/// Whether the content denotes a payment-readiness request.
pub fn denotes_payment_request(content: &str) -> bool {
    let normalized = content.to_lowercase();
    PAYMENT_READY_PHRASES
        .iter()
        .any(|phrase| normalized.contains(phrase))
}

/// Find an existing active request for the table with equivalent content.
/// Returns the existing request id on a match. Only payment-readiness
/// contents are guarded; anything else may repeat freely.
///
/// Must be called on the transaction that performs the insert.
pub async fn find_active_duplicate(
    conn: &mut SqliteConnection,
    table_number: i64,
    content: &str,
) -> AppResult<Option<i64>> {
    if !denotes_payment_request(content) {
        return Ok(None);
    }

    let rows: Vec<(i64, String)> = sqlx::query_as(
        "SELECT id, content FROM request WHERE table_number = ?1 AND status IN ('NEW', 'ON_HOLD') ORDER BY created_at",
    )
    .bind(table_number)
    .fetch_all(conn)
    .await?;

    Ok(rows
        .into_iter()
        .find(|(_, existing)| denotes_payment_request(existing))
        .map(|(id, _)| id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrase_matching_is_case_insensitive() {
        assert!(denotes_payment_request("ready to pay"));
        assert!(denotes_payment_request("Ready To Pay"));
        assert!(denotes_payment_request("we are READY TO PAY now, thanks"));
        assert!(denotes_payment_request("Bill please!"));
    }

    #[test]
    fn unrelated_content_is_not_guarded() {
        assert!(!denotes_payment_request("more napkins please"));
        assert!(!denotes_payment_request("ready for dessert"));
    }
}
