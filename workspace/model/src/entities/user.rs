use async_trait::async_trait;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use tracing::instrument;

/// A registered user of the system.
///
/// Emails are stored lowercased so the unique constraint is effectively
/// case-insensitive. Only a bcrypt hash of the password is ever persisted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A user owns their transactions.
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transaction,
    /// A user may define private categories.
    #[sea_orm(has_many = "super::category::Entity")]
    Category,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
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
        if insert && self.created_at.is_not_set() {
            self.created_at = Set(chrono::Utc::now().naive_utc());
        }
        Ok(self)
    }
}

/// Normalizes an email address the way it is stored.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Entity {
    /// Looks a user up by email, ignoring case and surrounding whitespace.
    #[instrument(skip_all)]
    pub async fn find_by_email<C: ConnectionTrait>(
        db: &C,
        email: &str,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::Email.eq(normalize_email(email)))
            .one(db)
            .await
    }
}
