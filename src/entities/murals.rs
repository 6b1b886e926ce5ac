use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "murals")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,

    pub description: Option<String>,

    /// The creator is always an effective administrator, with or without an
    /// explicit membership row.
    pub creator_id: i32,

    /// "public" | "private"
    pub privacy: String,

    /// 4-digit join code, unique across all murals.
    #[sea_orm(unique)]
    pub access_code: String,

    pub theme_id: i32,

    pub custom_color: Option<String>,

    pub comments_enabled: bool,

    pub likes_enabled: bool,

    pub active: bool,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::CreatorId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Creator,
    #[sea_orm(has_many = "super::mural_members::Entity")]
    MuralMembers,
    #[sea_orm(has_many = "super::posts::Entity")]
    Posts,
}

impl Related<super::mural_members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MuralMembers.def()
    }
}

impl Related<super::posts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Posts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
