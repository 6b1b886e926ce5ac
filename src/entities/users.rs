use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub email: String,

    pub display_name: String,

    /// Argon2id hash. None for accounts provisioned through an external
    /// identity provider that never set a local password.
    pub password_hash: Option<String>,

    pub avatar_url: Option<String>,

    pub failed_logins: i32,

    /// RFC 3339 timestamp until which logins are refused.
    pub locked_until: Option<String>,

    pub reset_token: Option<String>,

    pub reset_token_expires: Option<String>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::sessions::Entity")]
    Sessions,
    #[sea_orm(has_many = "super::mural_members::Entity")]
    MuralMembers,
}

impl Related<super::sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sessions.def()
    }
}

impl Related<super::mural_members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MuralMembers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
