use chrono::{NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{RATE_SOURCE_MANUAL, RATE_SOURCE_OFFICIAL, RATE_SOURCE_PROPOSAL};
use crate::errors::{Error, Result, ValidationError};
use crate::schema::exchange_rates;
use crate::utils::decimal_serde::decimal_serde;
use crate::utils::{parse_decimal, round_rate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateSource {
    Official,
    Manual,
    Proposal,
}

impl RateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateSource::Official => RATE_SOURCE_OFFICIAL,
            RateSource::Manual => RATE_SOURCE_MANUAL,
            RateSource::Proposal => RATE_SOURCE_PROPOSAL,
        }
    }
}

impl From<&str> for RateSource {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            RATE_SOURCE_MANUAL => RateSource::Manual,
            RATE_SOURCE_PROPOSAL => RateSource::Proposal,
            _ => RateSource::Official,
        }
    }
}

/// One stored exchange rate: 1 unit of `from_currency` equals `rate` units
/// of `to_currency` on `rate_date`. Proposal-scoped rows override official
/// ones when resolving for that proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    pub id: String,
    pub from_currency: String,
    pub to_currency: String,
    #[serde(with = "decimal_serde")]
    pub rate: Decimal,
    pub rate_date: NaiveDate,
    pub source: RateSource,
    pub proposal_id: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

/// Database model for exchange rates
#[derive(Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone)]
#[diesel(table_name = exchange_rates)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ExchangeRateDB {
    pub id: String,
    pub from_currency: String,
    pub to_currency: String,
    pub rate: String,
    pub rate_date: NaiveDate,
    pub source: String,
    pub proposal_id: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

impl From<ExchangeRateDB> for ExchangeRate {
    fn from(db: ExchangeRateDB) -> Self {
        ExchangeRate {
            rate: parse_decimal(&db.rate, "exchange_rates.rate"),
            id: db.id,
            from_currency: db.from_currency,
            to_currency: db.to_currency,
            rate_date: db.rate_date,
            source: RateSource::from(db.source.as_str()),
            proposal_id: db.proposal_id,
            is_active: db.is_active,
            created_at: db.created_at,
        }
    }
}

impl From<&ExchangeRate> for ExchangeRateDB {
    fn from(domain: &ExchangeRate) -> Self {
        ExchangeRateDB {
            id: domain.id.clone(),
            from_currency: domain.from_currency.clone(),
            to_currency: domain.to_currency.clone(),
            rate: domain.rate.to_string(),
            rate_date: domain.rate_date,
            source: domain.source.as_str().to_string(),
            proposal_id: domain.proposal_id.clone(),
            is_active: domain.is_active,
            created_at: domain.created_at,
        }
    }
}

/// Input model for registering a new exchange rate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExchangeRate {
    pub from_currency: String,
    pub to_currency: String,
    #[serde(with = "decimal_serde")]
    pub rate: Decimal,
    pub rate_date: NaiveDate,
    #[serde(default)]
    pub proposal_id: Option<String>,
}

impl NewExchangeRate {
    pub fn validate(&self) -> Result<()> {
        validate_currency_code(&self.from_currency)?;
        validate_currency_code(&self.to_currency)?;
        if self.from_currency == self.to_currency {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Rate currencies must differ".to_string(),
            )));
        }
        if self.rate <= Decimal::ZERO {
            return Err(Error::Validation(ValidationError::InvalidInput(format!(
                "Exchange rate must be positive, got {}",
                self.rate
            ))));
        }
        Ok(())
    }

    pub fn into_rate(self, source: RateSource) -> ExchangeRate {
        ExchangeRate {
            id: Uuid::new_v4().to_string(),
            from_currency: self.from_currency,
            to_currency: self.to_currency,
            rate: round_rate(self.rate),
            rate_date: self.rate_date,
            source,
            proposal_id: self.proposal_id,
            is_active: true,
            created_at: Utc::now().naive_utc(),
        }
    }
}

/// Currency codes are short alphabetic tokens such as "USD" or "KZT".
pub fn validate_currency_code(code: &str) -> Result<()> {
    if code.trim().is_empty() {
        return Err(Error::Validation(ValidationError::MissingField(
            "currency".to_string(),
        )));
    }
    let valid_len = (2..=5).contains(&code.len());
    if !valid_len || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::Validation(ValidationError::InvalidInput(format!(
            "Invalid currency code '{}'",
            code
        ))));
    }
    Ok(())
}
