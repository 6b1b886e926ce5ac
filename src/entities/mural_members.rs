use sea_orm::entity::prelude::*;

/// Explicit role assignment. At most one row per (mural, user) pair; the
/// unique index lives in the initial migration.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "mural_members")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub mural_id: i32,

    pub user_id: i32,

    /// "admin" | "editor" | "reader"
    pub role: String,

    pub joined_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::murals::Entity",
        from = "Column::MuralId",
        to = "super::murals::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Murals,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,
}

impl Related<super::murals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Murals.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
