use std::future::Future;

use tracing::warn;
use uuid::Uuid;

use crate::credits::ledger::{Charge, CreditLedger};
use crate::errors::AppError;

/// Runs `operation` only if the user can afford `charge`, and deducts the
/// credits only after it succeeds.
///
/// A failed operation costs nothing. If the balance was spent concurrently
/// between the check and the deduction, the result is dropped and the caller
/// gets `InsufficientCredits`.
pub async fn charge_on_success<T, E, F, Fut>(
    ledger: &dyn CreditLedger,
    user_id: Uuid,
    charge: &Charge,
    operation: F,
) -> Result<T, AppError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<AppError>,
{
    let available = ledger.balance(user_id).await?;
    if available < charge.credits {
        return Err(AppError::InsufficientCredits {
            required: charge.credits,
            available,
        });
    }

    let value = operation().await.map_err(Into::into)?;

    if !ledger.deduct(user_id, charge).await? {
        let available = ledger.balance(user_id).await.unwrap_or(0);
        warn!(
            "Discarding result for user {user_id}: balance dropped to {available} before deduction"
        );
        return Err(AppError::InsufficientCredits {
            required: charge.credits,
            available,
        });
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::credits::ledger::testing::MemoryLedger;

    fn analysis_charge() -> Charge {
        Charge {
            credits: 1,
            description: "Resume analysis".to_string(),
            service_used: Some("resume_analysis".to_string()),
            reference_id: None,
        }
    }

    #[tokio::test]
    async fn test_success_deducts_exactly_once() {
        let user = Uuid::new_v4();
        let ledger = MemoryLedger::with_balance(user, 3);

        let value = charge_on_success(&ledger, user, &analysis_charge(), || async {
            Ok::<_, AppError>(72)
        })
        .await
        .unwrap();

        assert_eq!(value, 72);
        assert_eq!(ledger.deduction_count(), 1);
        assert_eq!(ledger.balance(user).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_failure_deducts_nothing() {
        let user = Uuid::new_v4();
        let ledger = MemoryLedger::with_balance(user, 3);

        let result: Result<(), _> = charge_on_success(&ledger, user, &analysis_charge(), || async {
            Err(AppError::Analysis("Analysis failed: timeout".to_string()))
        })
        .await;

        assert!(matches!(result, Err(AppError::Analysis(_))));
        assert_eq!(ledger.deduction_count(), 0);
        assert_eq!(ledger.balance(user).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_insufficient_balance_never_starts_operation() {
        let user = Uuid::new_v4();
        let ledger = MemoryLedger::with_balance(user, 0);
        let started = AtomicBool::new(false);

        let result = charge_on_success(&ledger, user, &analysis_charge(), || async {
            started.store(true, Ordering::SeqCst);
            Ok::<_, AppError>(())
        })
        .await;

        assert!(matches!(
            result,
            Err(AppError::InsufficientCredits {
                required: 1,
                available: 0
            })
        ));
        assert!(!started.load(Ordering::SeqCst));
        assert_eq!(ledger.deduction_count(), 0);
    }

    #[tokio::test]
    async fn test_balance_spent_during_operation_discards_result() {
        let user = Uuid::new_v4();
        let ledger = MemoryLedger::with_balance(user, 1);

        let result = charge_on_success(&ledger, user, &analysis_charge(), || async {
            ledger.drain(user);
            Ok::<_, AppError>("analysis")
        })
        .await;

        assert!(matches!(result, Err(AppError::InsufficientCredits { .. })));
        assert_eq!(ledger.deduction_count(), 0);
        assert_eq!(ledger.balance(user).await.unwrap(), 0);
    }
}
