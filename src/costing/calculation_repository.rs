use std::sync::Arc;

use async_trait::async_trait;
use diesel::dsl::max;
use diesel::prelude::*;

use crate::costing::costing_model::{CostCalculation, CostCalculationDB, NewCalculationRecord};
use crate::costing::costing_traits::CalculationRepositoryTrait;
use crate::db::{get_connection, DbConnection, DbPool, DbTransactionExecutor};
use crate::errors::Result;

pub struct CalculationRepository {
    pool: Arc<DbPool>,
}

impl CalculationRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        CalculationRepository { pool }
    }
}

#[async_trait]
impl CalculationRepositoryTrait for CalculationRepository {
    async fn save(&self, new_record: NewCalculationRecord) -> Result<CostCalculation> {
        let details_json = serde_json::to_string(&new_record.breakdown)?;
        self.pool.execute(|conn: &mut DbConnection| -> Result<CostCalculation> {
            use crate::schema::cost_calculations::dsl::*;

            // Version is read and assigned inside the transaction so that
            // the per-pair sequence never repeats or skips.
            let last_version: Option<i32> = match &new_record.proposal_id {
                Some(scope_id) => cost_calculations
                    .filter(equipment_id.eq(&new_record.breakdown.equipment_id))
                    .filter(proposal_id.eq(scope_id))
                    .select(max(version))
                    .first::<Option<i32>>(conn)?,
                None => cost_calculations
                    .filter(equipment_id.eq(&new_record.breakdown.equipment_id))
                    .filter(proposal_id.is_null())
                    .select(max(version))
                    .first::<Option<i32>>(conn)?,
            };
            let next_version = last_version.unwrap_or(0) + 1;

            let record = CostCalculation::from_breakdown(
                &new_record.breakdown,
                new_record.proposal_id.clone(),
                next_version,
                new_record.is_manual_adjustment,
                new_record.notes.clone(),
                new_record.created_by.clone(),
                Some(details_json),
            );
            diesel::insert_into(cost_calculations)
                .values(&CostCalculationDB::from(&record))
                .execute(conn)?;
            Ok(record)
        })
    }

    fn get_history(
        &self,
        owner_id: &str,
        scope: Option<&str>,
    ) -> Result<Vec<CostCalculation>> {
        use crate::schema::cost_calculations::dsl::*;
        let mut conn = get_connection(&self.pool)?;
        let rows = match scope {
            Some(scope_id) => cost_calculations
                .filter(equipment_id.eq(owner_id))
                .filter(proposal_id.eq(scope_id))
                .order(version.desc())
                .load::<CostCalculationDB>(&mut conn)?,
            None => cost_calculations
                .filter(equipment_id.eq(owner_id))
                .filter(proposal_id.is_null())
                .order(version.desc())
                .load::<CostCalculationDB>(&mut conn)?,
        };
        Ok(rows.into_iter().map(CostCalculation::from).collect())
    }

    fn get_latest(
        &self,
        owner_id: &str,
        scope: Option<&str>,
    ) -> Result<Option<CostCalculation>> {
        use crate::schema::cost_calculations::dsl::*;
        let mut conn = get_connection(&self.pool)?;
        let row = match scope {
            Some(scope_id) => cost_calculations
                .filter(equipment_id.eq(owner_id))
                .filter(proposal_id.eq(scope_id))
                .order(version.desc())
                .first::<CostCalculationDB>(&mut conn)
                .optional()?,
            None => cost_calculations
                .filter(equipment_id.eq(owner_id))
                .filter(proposal_id.is_null())
                .order(version.desc())
                .first::<CostCalculationDB>(&mut conn)
                .optional()?,
        };
        Ok(row.map(CostCalculation::from))
    }
}
