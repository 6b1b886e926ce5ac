use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "posts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub mural_id: i32,

    pub author_id: i32,

    pub title: String,

    pub description: Option<String>,

    /// Layout hints kept for client compatibility; no server-side layout
    /// reads them.
    pub pos_x: Option<i32>,

    pub pos_y: Option<i32>,

    pub active: bool,

    pub created_at: String,

    pub updated_at: String,
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
        from = "Column::AuthorId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Author,
    #[sea_orm(has_many = "super::post_contents::Entity")]
    PostContents,
    #[sea_orm(has_many = "super::comments::Entity")]
    Comments,
    #[sea_orm(has_many = "super::likes::Entity")]
    Likes,
}

impl Related<super::murals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Murals.def()
    }
}

impl Related<super::post_contents::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PostContents.def()
    }
}

impl Related<super::comments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl Related<super::likes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Likes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
