use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use sea_orm::{Condition, QueryOrder};

/// Direction of money flow for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
pub enum TransactionKind {
    #[sea_orm(string_value = "income")]
    Income,
    #[sea_orm(string_value = "expense")]
    Expense,
}

impl From<common::TransactionKind> for TransactionKind {
    fn from(kind: common::TransactionKind) -> Self {
        match kind {
            common::TransactionKind::Income => TransactionKind::Income,
            common::TransactionKind::Expense => TransactionKind::Expense,
        }
    }
}

impl From<TransactionKind> for common::TransactionKind {
    fn from(kind: TransactionKind) -> Self {
        match kind {
            TransactionKind::Income => common::TransactionKind::Income,
            TransactionKind::Expense => common::TransactionKind::Expense,
        }
    }
}

/// A single income or expense entry owned by one user.
///
/// The amount is always positive; the direction lives in `kind`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub kind: TransactionKind,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub amount: Decimal,
    pub occurred_on: NaiveDate,
    pub merchant: Option<String>,
    pub note: Option<String>,
    pub payment_method: Option<String>,
    pub category_id: Option<i32>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_delete = "SetNull"
    )]
    Category,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = chrono::Utc::now().naive_utc();
        if insert && self.created_at.is_not_set() {
            self.created_at = Set(now);
        }
        self.updated_at = Set(now);
        Ok(self)
    }
}

/// Optional filters applied when listing a user's transactions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub kind: Option<TransactionKind>,
    pub category_id: Option<i32>,
}

impl TransactionFilter {
    pub fn between(start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> Self {
        Self {
            start_date,
            end_date,
            ..Default::default()
        }
    }

    fn condition(&self, user_id: i32) -> Condition {
        let mut condition = Condition::all().add(Column::UserId.eq(user_id));
        if let Some(start) = self.start_date {
            condition = condition.add(Column::OccurredOn.gte(start));
        }
        if let Some(end) = self.end_date {
            condition = condition.add(Column::OccurredOn.lte(end));
        }
        if let Some(kind) = self.kind {
            condition = condition.add(Column::Kind.eq(kind));
        }
        if let Some(category_id) = self.category_id {
            condition = condition.add(Column::CategoryId.eq(category_id));
        }
        condition
    }
}

impl Entity {
    /// A user's transactions matching `filter`, most recent first.
    ///
    /// Ties on the date are broken by id so pagination is stable.
    pub fn find_for_user(user_id: i32, filter: &TransactionFilter) -> Select<Entity> {
        Entity::find()
            .filter(filter.condition(user_id))
            .order_by_desc(Column::OccurredOn)
            .order_by_desc(Column::Id)
    }

    /// Looks up a transaction only if it belongs to `user_id`.
    pub async fn find_owned<C: ConnectionTrait>(
        db: &C,
        user_id: i32,
        id: i32,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find_by_id(id)
            .filter(Column::UserId.eq(user_id))
            .one(db)
            .await
    }
}
