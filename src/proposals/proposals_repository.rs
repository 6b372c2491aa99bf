use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use rust_decimal::Decimal;

use crate::costing::costing_model::{AdditionalExpense, AdditionalExpenseDB, NewAdditionalExpense};
use crate::costing::ExpenseProviderTrait;
use crate::db::{get_connection, DbPool};
use crate::errors::{Error, Result};

use super::proposals_errors::ProposalError;
use super::proposals_model::{
    EquipmentList, EquipmentListDB, EquipmentListItem, EquipmentListItemDB, ExpenseLinkDB,
    LineFigureUpdate, NewEquipmentList, NewLineItem, NewProposal, Proposal, ProposalDB,
};
use super::proposals_traits::ProposalRepositoryTrait;

pub struct ProposalRepository {
    pool: Arc<DbPool>,
}

impl ProposalRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        ProposalRepository { pool }
    }
}

#[async_trait]
impl ProposalRepositoryTrait for ProposalRepository {
    fn get_proposal(&self, target_id: &str) -> Result<Proposal> {
        use crate::schema::proposals::dsl::*;
        let mut conn = get_connection(&self.pool)?;
        proposals
            .find(target_id)
            .select(ProposalDB::as_select())
            .first::<ProposalDB>(&mut conn)
            .map(Proposal::from)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => {
                    Error::Proposal(ProposalError::NotFound(target_id.to_string()))
                }
                e => Error::from(e),
            })
    }

    fn get_equipment_lists(&self, scope_id: &str) -> Result<Vec<EquipmentList>> {
        use crate::schema::equipment_lists::dsl::*;
        let mut conn = get_connection(&self.pool)?;
        let rows = equipment_lists
            .filter(proposal_id.eq(scope_id))
            .order(created_at.asc())
            .select(EquipmentListDB::as_select())
            .load::<EquipmentListDB>(&mut conn)?;
        Ok(rows.into_iter().map(EquipmentList::from).collect())
    }

    fn get_list_items(&self, owner_id: &str) -> Result<Vec<EquipmentListItem>> {
        use crate::schema::equipment_list_items::dsl::*;
        let mut conn = get_connection(&self.pool)?;
        let rows = equipment_list_items
            .filter(list_id.eq(owner_id))
            .order((position.asc(), created_at.asc()))
            .select(EquipmentListItemDB::as_select())
            .load::<EquipmentListItemDB>(&mut conn)?;
        Ok(rows.into_iter().map(EquipmentListItem::from).collect())
    }

    fn get_list_expenses(&self, owner_id: &str) -> Result<Vec<AdditionalExpense>> {
        use crate::schema::{additional_expenses, equipment_list_expenses};
        let mut conn = get_connection(&self.pool)?;
        let rows = equipment_list_expenses::table
            .inner_join(additional_expenses::table)
            .filter(equipment_list_expenses::list_id.eq(owner_id))
            .order(additional_expenses::created_at.asc())
            .select(AdditionalExpenseDB::as_select())
            .load::<AdditionalExpenseDB>(&mut conn)?;
        Ok(rows.into_iter().map(AdditionalExpense::from).collect())
    }

    async fn create_proposal(&self, new_proposal: NewProposal) -> Result<Proposal> {
        use crate::schema::proposals::dsl::*;
        new_proposal.validate()?;
        let proposal = new_proposal.into_proposal();
        let mut conn = get_connection(&self.pool)?;
        diesel::insert_into(proposals)
            .values(ProposalDB::from(&proposal))
            .execute(&mut conn)?;
        Ok(proposal)
    }

    async fn create_equipment_list(&self, new_list: NewEquipmentList) -> Result<EquipmentList> {
        use crate::schema::equipment_lists::dsl::*;
        new_list.validate()?;
        let list = new_list.into_list();
        let mut conn = get_connection(&self.pool)?;
        diesel::insert_into(equipment_lists)
            .values(EquipmentListDB::from(&list))
            .execute(&mut conn)?;
        Ok(list)
    }

    async fn add_list_item(&self, new_item: NewLineItem) -> Result<EquipmentListItem> {
        use crate::schema::{equipment_list_items, equipment_lists};
        new_item.validate()?;
        let item = new_item.into_item();
        let mut conn = get_connection(&self.pool)?;
        equipment_lists::table
            .find(&item.list_id)
            .select(equipment_lists::id)
            .first::<String>(&mut conn)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => {
                    Error::Proposal(ProposalError::ListNotFound(item.list_id.clone()))
                }
                _ => e.into(),
            })?;
        diesel::insert_into(equipment_list_items::table)
            .values(EquipmentListItemDB::from(&item))
            .execute(&mut conn)?;
        Ok(item)
    }

    async fn create_expense(&self, new_expense: NewAdditionalExpense) -> Result<AdditionalExpense> {
        use crate::schema::additional_expenses::dsl::*;
        new_expense.validate()?;
        let expense = new_expense.into_expense();
        let mut conn = get_connection(&self.pool)?;
        diesel::insert_into(additional_expenses)
            .values(AdditionalExpenseDB::from(&expense))
            .execute(&mut conn)?;
        Ok(expense)
    }

    async fn attach_expense(&self, owner_id: &str, target_expense_id: &str) -> Result<()> {
        use crate::schema::equipment_list_expenses::dsl::*;
        let mut conn = get_connection(&self.pool)?;
        // Re-attaching the same expense is a no-op.
        diesel::insert_or_ignore_into(equipment_list_expenses)
            .values(ExpenseLinkDB {
                list_id: owner_id.to_string(),
                expense_id: target_expense_id.to_string(),
            })
            .execute(&mut conn)?;
        Ok(())
    }

    async fn save_cost_and_total(
        &self,
        scope_id: &str,
        cost: Decimal,
        new_total: Option<Decimal>,
    ) -> Result<()> {
        use crate::schema::proposals::dsl::*;
        let mut conn = get_connection(&self.pool)?;
        let now = Utc::now().naive_utc();
        let affected = match new_total {
            Some(value) => diesel::update(proposals.find(scope_id))
                .set((
                    cost_price.eq(Some(cost.to_string())),
                    total_price.eq(value.to_string()),
                    updated_at.eq(now),
                ))
                .execute(&mut conn)?,
            None => diesel::update(proposals.find(scope_id))
                .set((cost_price.eq(Some(cost.to_string())), updated_at.eq(now)))
                .execute(&mut conn)?,
        };
        if affected == 0 {
            return Err(Error::Proposal(ProposalError::NotFound(
                scope_id.to_string(),
            )));
        }
        Ok(())
    }

    async fn save_pricing_results(
        &self,
        scope_id: &str,
        line_updates: &[LineFigureUpdate],
        margin_total: Decimal,
        margin_pct: Decimal,
        new_total: Option<Decimal>,
        package: serde_json::Value,
    ) -> Result<()> {
        // Serialization happens before the transaction so the closure only
        // deals with storage errors.
        let mut rows = Vec::with_capacity(line_updates.len());
        for update in line_updates {
            rows.push((
                update.item_id.clone(),
                update.price_per_unit.to_string(),
                update.total_price.to_string(),
                serde_json::to_string(&update.figures)?,
            ));
        }
        let package_json = serde_json::to_string(&package)?;
        let now = Utc::now().naive_utc();

        let mut conn = get_connection(&self.pool)?;
        conn.transaction::<_, Error, _>(|conn| {
            use crate::schema::{equipment_list_items, proposals};

            for (item_key, unit_price, line_total, figures_json) in &rows {
                let affected = diesel::update(
                    equipment_list_items::table.filter(equipment_list_items::id.eq(item_key)),
                )
                .set((
                    equipment_list_items::price_per_unit.eq(Some(unit_price.clone())),
                    equipment_list_items::total_price.eq(Some(line_total.clone())),
                    equipment_list_items::calculated_data.eq(Some(figures_json.clone())),
                    equipment_list_items::updated_at.eq(now),
                ))
                .execute(conn)?;
                if affected == 0 {
                    return Err(Error::Proposal(ProposalError::ItemNotFound(
                        item_key.clone(),
                    )));
                }
            }

            let affected = match new_total {
                Some(value) => diesel::update(proposals::table.find(scope_id))
                    .set((
                        proposals::margin_value.eq(Some(margin_total.to_string())),
                        proposals::margin_percentage.eq(Some(margin_pct.to_string())),
                        proposals::total_price.eq(value.to_string()),
                        proposals::data_package.eq(Some(package_json.clone())),
                        proposals::updated_at.eq(now),
                    ))
                    .execute(conn)?,
                None => diesel::update(proposals::table.find(scope_id))
                    .set((
                        proposals::margin_value.eq(Some(margin_total.to_string())),
                        proposals::margin_percentage.eq(Some(margin_pct.to_string())),
                        proposals::data_package.eq(Some(package_json.clone())),
                        proposals::updated_at.eq(now),
                    ))
                    .execute(conn)?,
            };
            if affected == 0 {
                return Err(Error::Proposal(ProposalError::NotFound(
                    scope_id.to_string(),
                )));
            }
            Ok(())
        })
    }
}

impl ExpenseProviderTrait for ProposalRepository {
    fn get_expenses_for_equipment(
        &self,
        scope_id: &str,
        item_equipment_id: &str,
    ) -> Result<Vec<AdditionalExpense>> {
        use crate::schema::{equipment_list_items, equipment_lists};
        let mut conn = get_connection(&self.pool)?;
        // Earliest list on the proposal that carries the equipment.
        let holder: Option<String> = equipment_lists::table
            .inner_join(equipment_list_items::table)
            .filter(equipment_lists::proposal_id.eq(scope_id))
            .filter(equipment_list_items::equipment_id.eq(item_equipment_id))
            .order(equipment_lists::created_at.asc())
            .select(equipment_lists::id)
            .first::<String>(&mut conn)
            .optional()?;
        match holder {
            Some(list_key) => self.get_list_expenses(&list_key),
            None => Ok(Vec::new()),
        }
    }

    fn get_expense(&self, target_id: &str) -> Result<Option<AdditionalExpense>> {
        use crate::schema::additional_expenses::dsl::*;
        let mut conn = get_connection(&self.pool)?;
        let row = additional_expenses
            .find(target_id)
            .select(AdditionalExpenseDB::as_select())
            .first::<AdditionalExpenseDB>(&mut conn)
            .optional()?;
        Ok(row.map(AdditionalExpense::from))
    }
}
