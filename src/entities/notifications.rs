use sea_orm::entity::prelude::*;

/// Notifications are consumed by deletion; `read` only exists as a transient
/// flag between fan-out and the client acting on the row.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub sender_id: i32,

    pub receiver_id: i32,

    pub mural_id: i32,

    /// "access_request" | "invitation" | "update" | "comment" | "other"
    pub kind: String,

    pub message: String,

    pub read: bool,

    /// Only set for access requests: "pending" | "approved" | "rejected".
    pub request_status: Option<String>,

    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::ReceiverId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Receiver,
    #[sea_orm(
        belongs_to = "super::murals::Entity",
        from = "Column::MuralId",
        to = "super::murals::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Murals,
}

impl Related<super::murals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Murals.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
