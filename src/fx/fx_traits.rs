use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::fx_model::{ExchangeRate, NewExchangeRate};
use crate::errors::Result;

/// Trait for exchange rate storage operations
#[async_trait]
pub trait FxRepositoryTrait: Send + Sync {
    /// Resolves the applicable rate for a pair as of a date. An active
    /// proposal-scoped rate wins over the official one; within a scope the
    /// most recent `rate_date <= as_of` wins, ties broken by `created_at`.
    fn get_latest_rate(
        &self,
        from: &str,
        to: &str,
        as_of: NaiveDate,
        proposal_id: Option<&str>,
    ) -> Result<Option<ExchangeRate>>;

    fn get_rate_by_id(&self, id: &str) -> Result<Option<ExchangeRate>>;

    fn get_rates_for_pair(&self, from: &str, to: &str) -> Result<Vec<ExchangeRate>>;

    async fn insert_rate(&self, rate: ExchangeRate) -> Result<ExchangeRate>;

    /// Sync write path. Returns `None` when the date already carries a
    /// manual entry that must not be overwritten.
    async fn upsert_official_rate(&self, rate: ExchangeRate) -> Result<Option<ExchangeRate>>;

    async fn deactivate_rate(&self, id: &str) -> Result<()>;

    /// Deletes non-proposal rates dated before the cutoff. Returns the
    /// number of removed rows.
    async fn prune_rates_before(&self, cutoff: NaiveDate) -> Result<usize>;
}

/// Trait for currency conversion and rate management
#[async_trait]
pub trait FxServiceTrait: Send + Sync {
    /// Converts using the latest applicable global rate as of today.
    fn convert_currency(&self, amount: Decimal, from: &str, to: &str) -> Result<Decimal>;

    /// Full conversion entry point. Identity conversions return the amount
    /// untouched; an override rate short-circuits the lookup; converted
    /// amounts are rounded to 2 decimal places, half-up.
    fn convert_currency_for_date(
        &self,
        amount: Decimal,
        from: &str,
        to: &str,
        as_of: NaiveDate,
        proposal_id: Option<&str>,
        override_rate: Option<Decimal>,
    ) -> Result<Decimal>;

    fn get_latest_rate(
        &self,
        from: &str,
        to: &str,
        as_of: NaiveDate,
        proposal_id: Option<&str>,
    ) -> Result<Option<ExchangeRate>>;

    async fn add_manual_rate(&self, new_rate: NewExchangeRate) -> Result<ExchangeRate>;

    async fn add_proposal_rate(
        &self,
        new_rate: NewExchangeRate,
        proposal_id: &str,
    ) -> Result<ExchangeRate>;

    async fn upsert_official_rate(&self, new_rate: NewExchangeRate)
        -> Result<Option<ExchangeRate>>;

    async fn deactivate_rate(&self, id: &str) -> Result<()>;

    async fn prune_expired_rates(&self) -> Result<usize>;
}
