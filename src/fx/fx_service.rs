use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use log::debug;
use rust_decimal::Decimal;

use super::fx_errors::FxError;
use super::fx_model::{ExchangeRate, NewExchangeRate, RateSource};
use super::fx_traits::{FxRepositoryTrait, FxServiceTrait};
use crate::constants::RATE_RETENTION_DAYS;
use crate::errors::{Error, Result};
use crate::utils::round_money;

/// Currency conversion over the stored exchange rates.
///
/// Conversion semantics: identity conversions return the amount untouched;
/// an explicit override rate is applied without any lookup; otherwise the
/// applicable rate is resolved with proposal-scoped rows taking priority
/// over official ones. Converted amounts are rounded to 2 decimal places,
/// half-up.
pub struct FxService {
    repository: Arc<dyn FxRepositoryTrait>,
}

impl FxService {
    pub fn new(repository: Arc<dyn FxRepositoryTrait>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl FxServiceTrait for FxService {
    fn convert_currency(&self, amount: Decimal, from: &str, to: &str) -> Result<Decimal> {
        self.convert_currency_for_date(amount, from, to, Utc::now().date_naive(), None, None)
    }

    fn convert_currency_for_date(
        &self,
        amount: Decimal,
        from: &str,
        to: &str,
        as_of: NaiveDate,
        proposal_id: Option<&str>,
        override_rate: Option<Decimal>,
    ) -> Result<Decimal> {
        if from == to {
            return Ok(amount);
        }

        if let Some(rate) = override_rate {
            return Ok(round_money(amount * rate));
        }

        let rate = self
            .repository
            .get_latest_rate(from, to, as_of, proposal_id)?
            .ok_or_else(|| {
                Error::Currency(FxError::RateNotFound(format!("{}/{}", from, to)))
            })?;

        Ok(round_money(amount * rate.rate))
    }

    fn get_latest_rate(
        &self,
        from: &str,
        to: &str,
        as_of: NaiveDate,
        proposal_id: Option<&str>,
    ) -> Result<Option<ExchangeRate>> {
        self.repository.get_latest_rate(from, to, as_of, proposal_id)
    }

    async fn add_manual_rate(&self, new_rate: NewExchangeRate) -> Result<ExchangeRate> {
        new_rate.validate()?;
        self.repository
            .insert_rate(new_rate.into_rate(RateSource::Manual))
            .await
    }

    async fn add_proposal_rate(
        &self,
        mut new_rate: NewExchangeRate,
        proposal_id: &str,
    ) -> Result<ExchangeRate> {
        new_rate.validate()?;
        new_rate.proposal_id = Some(proposal_id.to_string());
        self.repository
            .insert_rate(new_rate.into_rate(RateSource::Proposal))
            .await
    }

    async fn upsert_official_rate(
        &self,
        new_rate: NewExchangeRate,
    ) -> Result<Option<ExchangeRate>> {
        new_rate.validate()?;
        self.repository
            .upsert_official_rate(new_rate.into_rate(RateSource::Official))
            .await
    }

    async fn deactivate_rate(&self, id: &str) -> Result<()> {
        self.repository.deactivate_rate(id).await
    }

    async fn prune_expired_rates(&self) -> Result<usize> {
        let cutoff = Utc::now().date_naive() - Duration::days(RATE_RETENTION_DAYS);
        let removed = self.repository.prune_rates_before(cutoff).await?;
        if removed > 0 {
            debug!("Pruned {} exchange rates older than {}", removed, cutoff);
        }
        Ok(removed)
    }
}
