//! C10: rolls each dependency's liveness ping together with its circuit
//! breaker state into a three-value status, then rolls those up into one
//! overall status for the `/health` endpoint.

use std::sync::Arc;

use activity_breaker::BreakerRegistry;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl DependencyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyStatus::Healthy => "healthy",
            DependencyStatus::Degraded => "degraded",
            DependencyStatus::Unhealthy => "unhealthy",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: DependencyStatus,
    pub database: DependencyStatus,
    pub redis: DependencyStatus,
    pub elasticsearch: DependencyStatus,
    pub kafka: DependencyStatus,
}

pub struct HealthAggregator {
    breakers: Arc<BreakerRegistry>,
}

impl HealthAggregator {
    pub fn new(breakers: Arc<BreakerRegistry>) -> Self {
        Self { breakers }
    }

    /// A breaker in the `OPEN` state always reports `degraded`, even if the
    /// ping that accompanies it happens to succeed — the breaker's own
    /// failure history is a stronger signal than one successful probe.
    fn dependency_status(&self, breaker_name: &str, ping_ok: bool) -> DependencyStatus {
        let mut status = if ping_ok {
            DependencyStatus::Healthy
        } else {
            DependencyStatus::Unhealthy
        };
        if self.breakers.get(breaker_name).is_open() {
            status = DependencyStatus::Degraded;
        }
        status
    }

    pub fn aggregate(&self, database_ok: bool, cache_ok: bool, search_ok: bool, kafka_ok: bool) -> HealthReport {
        let database = self.dependency_status("postgres", database_ok);
        let redis = self.dependency_status("cache", cache_ok);
        let elasticsearch = self.dependency_status("search", search_ok);
        let kafka = self.dependency_status("kafka", kafka_ok);

        let status = if database == DependencyStatus::Unhealthy {
            DependencyStatus::Unhealthy
        } else if database == DependencyStatus::Healthy
            && redis == DependencyStatus::Healthy
            && elasticsearch == DependencyStatus::Healthy
            && kafka == DependencyStatus::Healthy
        {
            DependencyStatus::Healthy
        } else {
            DependencyStatus::Degraded
        };

        HealthReport { status, database, redis, elasticsearch, kafka }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn aggregator() -> HealthAggregator {
        HealthAggregator::new(Arc::new(BreakerRegistry::new(true, 5, Duration::from_secs(60))))
    }

    #[test]
    fn all_healthy_when_everything_pings() {
        let agg = aggregator();
        let report = agg.aggregate(true, true, true, true);
        assert_eq!(report.status, DependencyStatus::Healthy);
    }

    #[test]
    fn database_down_is_unhealthy_overall() {
        let agg = aggregator();
        let report = agg.aggregate(false, true, true, true);
        assert_eq!(report.database, DependencyStatus::Unhealthy);
        assert_eq!(report.status, DependencyStatus::Unhealthy);
    }

    #[tokio::test]
    async fn open_breaker_degrades_even_with_successful_ping() {
        let breakers = Arc::new(BreakerRegistry::new(true, 1, Duration::from_secs(60)));
        let breaker = breakers.get("search");
        let _: Result<(), activity_breaker::BreakerError<&str>> =
            breaker.call(|| async { Err("boom") }).await;
        assert!(breaker.is_open());

        let agg = HealthAggregator::new(breakers);
        let report = agg.aggregate(true, true, true, true);
        assert_eq!(report.elasticsearch, DependencyStatus::Degraded);
        assert_eq!(report.status, DependencyStatus::Degraded);
    }

    #[tokio::test]
    async fn open_postgres_breaker_degrades_database_not_unhealthy() {
        let breakers = Arc::new(BreakerRegistry::new(true, 1, Duration::from_secs(60)));
        let breaker = breakers.get("postgres");
        let _: Result<(), activity_breaker::BreakerError<&str>> =
            breaker.call(|| async { Err("boom") }).await;
        assert!(breaker.is_open());

        let agg = HealthAggregator::new(breakers);
        let report = agg.aggregate(true, true, true, true);
        assert_eq!(report.database, DependencyStatus::Degraded);
        assert_eq!(report.status, DependencyStatus::Degraded);
    }
}
