use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::ConnectionTrait;

use crate::m20240101_000001_create_tables::Categories;

/// System categories visible to every user.
const SYSTEM_CATEGORIES: &[(&str, &str)] = &[
    ("Food", "Groceries, restaurants and coffee"),
    ("Transport", "Fuel, public transport and rides"),
    ("Shopping", "Clothes, electronics and household items"),
    ("Bills", "Rent, utilities and subscriptions"),
    ("Entertainment", "Movies, games and events"),
    ("Health", "Pharmacy, doctors and fitness"),
    ("Salary", "Regular employment income"),
    ("Other", "Everything else"),
];

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut insert = Query::insert();
        insert
            .into_table(Categories::Table)
            .columns([Categories::Name, Categories::Description]);
        for (name, description) in SYSTEM_CATEGORIES {
            insert.values_panic([(*name).into(), (*description).into()]);
        }

        let db = manager.get_connection();
        db.execute(db.get_database_backend().build(&insert)).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let names: Vec<&str> = SYSTEM_CATEGORIES.iter().map(|(name, _)| *name).collect();
        let delete = Query::delete()
            .from_table(Categories::Table)
            .and_where(Expr::col(Categories::UserId).is_null())
            .and_where(Expr::col(Categories::Name).is_in(names))
            .to_owned();

        let db = manager.get_connection();
        db.execute(db.get_database_backend().build(&delete)).await?;
        Ok(())
    }
}
