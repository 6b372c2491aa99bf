use rust_decimal::Decimal;

/// Settlement currency used as the pivot for cost conversions when the host
/// application does not configure another one.
pub const DEFAULT_BASE_CURRENCY: &str = "KZT";

/// Decimal precision used when serializing decimal values.
pub const DECIMAL_PRECISION: u32 = 6;

/// Decimal precision for monetary amounts.
pub const MONEY_DECIMAL_PRECISION: u32 = 2;

/// Decimal precision for exchange rates.
pub const RATE_DECIMAL_PRECISION: u32 = 6;

/// Bound for persisted margin percentages. The storage column keeps five
/// significant digits, so anything beyond this is clamped before writing.
pub const MARGIN_PERCENTAGE_CAP: Decimal = Decimal::from_parts(99999, 0, 0, false, 2);

/// How long non-proposal exchange rates are kept before pruning.
pub const RATE_RETENTION_DAYS: i64 = 31;

pub const RATE_SOURCE_OFFICIAL: &str = "OFFICIAL";
pub const RATE_SOURCE_MANUAL: &str = "MANUAL";
pub const RATE_SOURCE_PROPOSAL: &str = "PROPOSAL";

pub const PRICE_SOURCE_DOMESTIC: &str = "DOMESTIC";
pub const PRICE_SOURCE_FOREIGN: &str = "FOREIGN";
pub const PRICE_SOURCE_OWN_PRODUCTION: &str = "OWN_PRODUCTION";
pub const PRICE_SOURCE_OTHER: &str = "OTHER";

pub const ROUTE_IMPORT: &str = "IMPORT";
pub const ROUTE_DOMESTIC: &str = "DOMESTIC";
pub const ROUTE_WAREHOUSE: &str = "WAREHOUSE";
pub const ROUTE_OTHER: &str = "OTHER";

pub const EXPENSE_KIND_FIXED: &str = "FIXED";
pub const EXPENSE_KIND_PERCENTAGE: &str = "PERCENTAGE";
pub const EXPENSE_KIND_COEFFICIENT: &str = "COEFFICIENT";
