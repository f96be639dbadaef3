use std::sync::Arc;

use chrono::{DateTime, Datelike, TimeZone, Utc};

use crate::error::GenerationError;
use interview_core::Clock;
use storage::repository::GenerationUsageRepository;

/// Snapshot of today's quota consumption after an attempt was admitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuotaStatus {
    pub used: u32,
    pub quota: u32,
}

/// Day-bucketed accounting over the persisted generation attempt log.
///
/// Every admitted attempt is recorded before the network call so the counter
/// survives crashes mid-request.
#[derive(Clone)]
pub struct GenerationUsageService {
    clock: Clock,
    usage: Arc<dyn GenerationUsageRepository>,
    daily_quota: u32,
    warn_ratio: f32,
}

impl GenerationUsageService {
    #[must_use]
    pub fn new(
        clock: Clock,
        usage: Arc<dyn GenerationUsageRepository>,
        daily_quota: u32,
        warn_ratio: f32,
    ) -> Self {
        Self {
            clock,
            usage,
            daily_quota,
            warn_ratio,
        }
    }

    /// Admit one attempt against today's quota and record it.
    ///
    /// Crossing the warn ratio logs an advisory; reaching the quota refuses
    /// the attempt without recording anything.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::QuotaExhausted` at or over the quota, or
    /// `GenerationError::Storage` if the log cannot be read or written.
    pub async fn check_and_record(&self) -> Result<QuotaStatus, GenerationError> {
        let now = self.clock.now();
        let used = self.usage.count_since(start_of_day(now)).await?;
        if used >= self.daily_quota {
            return Err(GenerationError::QuotaExhausted {
                quota: self.daily_quota,
            });
        }

        self.usage.record_attempt(now).await?;
        let new_used = used + 1;

        let threshold = warn_threshold(self.daily_quota, self.warn_ratio);
        if used < threshold && new_used >= threshold {
            tracing::warn!(
                used = new_used,
                quota = self.daily_quota,
                "daily generation quota is nearly exhausted"
            );
        }

        Ok(QuotaStatus {
            used: new_used,
            quota: self.daily_quota,
        })
    }

    /// Attempts consumed so far today.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::Storage` if the log cannot be read.
    pub async fn used_today(&self) -> Result<u32, GenerationError> {
        let now = self.clock.now();
        Ok(self.usage.count_since(start_of_day(now)).await?)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn warn_threshold(quota: u32, ratio: f32) -> u32 {
    let scaled = f64::from(quota) * f64::from(ratio);
    if scaled <= 0.0 {
        return 0;
    }
    if scaled >= f64::from(u32::MAX) {
        return u32::MAX;
    }
    scaled.ceil() as u32
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let date = now.date_naive();
    Utc.with_ymd_and_hms(date.year(), date.month(), date.day(), 0, 0, 0)
        .single()
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use interview_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    fn service(repo: &InMemoryRepository, quota: u32) -> GenerationUsageService {
        GenerationUsageService::new(fixed_clock(), Arc::new(repo.clone()), quota, 0.9)
    }

    #[tokio::test]
    async fn records_attempts_until_quota() {
        let repo = InMemoryRepository::new();
        let usage = service(&repo, 2);

        assert_eq!(usage.check_and_record().await.unwrap().used, 1);
        assert_eq!(usage.check_and_record().await.unwrap().used, 2);

        let err = usage.check_and_record().await.unwrap_err();
        assert!(matches!(err, GenerationError::QuotaExhausted { quota: 2 }));
        assert_eq!(usage.used_today().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn attempts_from_yesterday_do_not_count() {
        let repo = InMemoryRepository::new();
        repo.record_attempt(fixed_now() - Duration::days(1))
            .await
            .unwrap();

        let usage = service(&repo, 1);
        assert_eq!(usage.used_today().await.unwrap(), 0);
        assert_eq!(usage.check_and_record().await.unwrap().used, 1);
    }

    #[test]
    fn warn_threshold_rounds_up() {
        assert_eq!(warn_threshold(10, 0.9), 9);
        assert_eq!(warn_threshold(15, 0.9), 14);
        assert_eq!(warn_threshold(0, 0.9), 0);
    }
}
