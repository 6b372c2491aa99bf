use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::prelude::*;
use log::debug;

use super::fx_model::{ExchangeRate, ExchangeRateDB, RateSource};
use super::fx_traits::FxRepositoryTrait;
use crate::db::{get_connection, DbPool};
use crate::errors::Result;
use crate::schema::exchange_rates::dsl;

pub struct FxRepository {
    pool: Arc<DbPool>,
}

impl FxRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FxRepositoryTrait for FxRepository {
    fn get_latest_rate(
        &self,
        from: &str,
        to: &str,
        as_of: NaiveDate,
        proposal_id: Option<&str>,
    ) -> Result<Option<ExchangeRate>> {
        let mut conn = get_connection(&self.pool)?;

        if let Some(pid) = proposal_id {
            let scoped = dsl::exchange_rates
                .filter(dsl::from_currency.eq(from))
                .filter(dsl::to_currency.eq(to))
                .filter(dsl::is_active.eq(true))
                .filter(dsl::rate_date.le(as_of))
                .filter(dsl::proposal_id.eq(pid))
                .order((dsl::rate_date.desc(), dsl::created_at.desc()))
                .first::<ExchangeRateDB>(&mut conn)
                .optional()?;
            if let Some(db_rate) = scoped {
                return Ok(Some(db_rate.into()));
            }
        }

        let official = dsl::exchange_rates
            .filter(dsl::from_currency.eq(from))
            .filter(dsl::to_currency.eq(to))
            .filter(dsl::is_active.eq(true))
            .filter(dsl::rate_date.le(as_of))
            .filter(dsl::proposal_id.is_null())
            .order((dsl::rate_date.desc(), dsl::created_at.desc()))
            .first::<ExchangeRateDB>(&mut conn)
            .optional()?;

        Ok(official.map(Into::into))
    }

    fn get_rate_by_id(&self, id: &str) -> Result<Option<ExchangeRate>> {
        let mut conn = get_connection(&self.pool)?;
        let rate = dsl::exchange_rates
            .find(id)
            .first::<ExchangeRateDB>(&mut conn)
            .optional()?;
        Ok(rate.map(Into::into))
    }

    fn get_rates_for_pair(&self, from: &str, to: &str) -> Result<Vec<ExchangeRate>> {
        let mut conn = get_connection(&self.pool)?;
        let rates = dsl::exchange_rates
            .filter(dsl::from_currency.eq(from))
            .filter(dsl::to_currency.eq(to))
            .order((dsl::rate_date.desc(), dsl::created_at.desc()))
            .load::<ExchangeRateDB>(&mut conn)?;
        Ok(rates.into_iter().map(Into::into).collect())
    }

    async fn insert_rate(&self, rate: ExchangeRate) -> Result<ExchangeRate> {
        let mut conn = get_connection(&self.pool)?;
        let db_rate = ExchangeRateDB::from(&rate);
        diesel::insert_into(dsl::exchange_rates)
            .values(&db_rate)
            .execute(&mut conn)?;
        Ok(rate)
    }

    async fn upsert_official_rate(&self, rate: ExchangeRate) -> Result<Option<ExchangeRate>> {
        let mut conn = get_connection(&self.pool)?;

        // A manual entry for the same day wins over re-synced official data.
        let manual_count: i64 = dsl::exchange_rates
            .filter(dsl::from_currency.eq(&rate.from_currency))
            .filter(dsl::to_currency.eq(&rate.to_currency))
            .filter(dsl::rate_date.eq(rate.rate_date))
            .filter(dsl::source.eq(RateSource::Manual.as_str()))
            .filter(dsl::proposal_id.is_null())
            .count()
            .get_result(&mut conn)?;
        if manual_count > 0 {
            debug!(
                "Skipping official rate {}/{} for {}: manual entry present",
                rate.from_currency, rate.to_currency, rate.rate_date
            );
            return Ok(None);
        }

        let existing = dsl::exchange_rates
            .filter(dsl::from_currency.eq(&rate.from_currency))
            .filter(dsl::to_currency.eq(&rate.to_currency))
            .filter(dsl::rate_date.eq(rate.rate_date))
            .filter(dsl::source.eq(RateSource::Official.as_str()))
            .filter(dsl::proposal_id.is_null())
            .first::<ExchangeRateDB>(&mut conn)
            .optional()?;

        match existing {
            Some(row) => {
                diesel::update(dsl::exchange_rates.filter(dsl::id.eq(&row.id)))
                    .set((
                        dsl::rate.eq(rate.rate.to_string()),
                        dsl::is_active.eq(true),
                    ))
                    .execute(&mut conn)?;
                let refreshed = dsl::exchange_rates
                    .find(&row.id)
                    .first::<ExchangeRateDB>(&mut conn)?;
                Ok(Some(refreshed.into()))
            }
            None => {
                let db_rate = ExchangeRateDB::from(&rate);
                diesel::insert_into(dsl::exchange_rates)
                    .values(&db_rate)
                    .execute(&mut conn)?;
                Ok(Some(rate))
            }
        }
    }

    async fn deactivate_rate(&self, id: &str) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;
        diesel::update(dsl::exchange_rates.filter(dsl::id.eq(id)))
            .set(dsl::is_active.eq(false))
            .execute(&mut conn)?;
        Ok(())
    }

    async fn prune_rates_before(&self, cutoff: NaiveDate) -> Result<usize> {
        let mut conn = get_connection(&self.pool)?;
        // Proposal-scoped rates stay for as long as their proposal does.
        let removed = diesel::delete(
            dsl::exchange_rates
                .filter(dsl::rate_date.lt(cutoff))
                .filter(dsl::proposal_id.is_null()),
        )
        .execute(&mut conn)?;
        Ok(removed)
    }
}
