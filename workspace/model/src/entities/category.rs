use sea_orm::entity::prelude::*;
use sea_orm::{Condition, QueryOrder};
use tracing::{instrument, trace};

/// A label transactions can be filed under.
///
/// Categories without an owner are system-wide defaults seeded by the
/// migrations; they are visible to everyone and read-only.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    /// Owning user, `None` for system categories.
    pub user_id: Option<i32>,
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
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transaction,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_system(&self) -> bool {
        self.user_id.is_none()
    }

    /// Whether `user_id` may attach transactions to this category.
    pub fn is_visible_to(&self, user_id: i32) -> bool {
        self.user_id.is_none_or(|owner| owner == user_id)
    }
}

impl Entity {
    /// Condition matching system categories plus the ones owned by `user_id`.
    pub fn visible_to(user_id: i32) -> Condition {
        Condition::any()
            .add(Column::UserId.is_null())
            .add(Column::UserId.eq(user_id))
    }

    /// All categories a user can see, system ones first, then by name.
    pub async fn list_visible<C: ConnectionTrait>(
        db: &C,
        user_id: i32,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Self::visible_to(user_id))
            .order_by_asc(Column::UserId)
            .order_by_asc(Column::Name)
            .all(db)
            .await
    }

    /// Finds a category with the same name (case-insensitive) in the same
    /// ownership scope.
    #[instrument(skip(db))]
    pub async fn find_named<C: ConnectionTrait>(
        db: &C,
        user_id: Option<i32>,
        name: &str,
    ) -> Result<Option<Model>, DbErr> {
        let wanted = name.trim().to_lowercase();
        let owner = match user_id {
            Some(id) => Column::UserId.eq(id),
            None => Column::UserId.is_null(),
        };
        let candidates = Entity::find().filter(owner).all(db).await?;
        trace!("Comparing against {} categories", candidates.len());
        Ok(candidates
            .into_iter()
            .find(|category| category.name.to_lowercase() == wanted))
    }
}
