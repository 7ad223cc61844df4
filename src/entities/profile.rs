use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(20))")]
pub enum ProfileType {
    #[sea_orm(string_value = "Farmer")]
    Farmer,
    #[sea_orm(string_value = "Distributor")]
    Distributor,
    #[sea_orm(string_value = "Consumer")]
    Consumer,
    #[sea_orm(string_value = "Supplier")]
    Supplier,
    #[sea_orm(string_value = "Agent")]
    Agent,
    #[sea_orm(string_value = "Vendor")]
    Vendor,
}

#[derive(
    Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(20))")]
pub enum IdCardValidationStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Verified")]
    Verified,
    #[sea_orm(string_value = "Rejected")]
    Rejected,
    #[sea_orm(string_value = "Resubmission")]
    Resubmission,
    #[sea_orm(string_value = "Expired")]
    Expired,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "profiles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub user_id: i64,
    pub full_name: String,
    #[sea_orm(unique)]
    pub email: String,
    #[sea_orm(unique)]
    pub phone_number: String,
    pub profile_type: ProfileType,
    pub id_card_file: Option<String>,
    pub id_card_validation_status: IdCardValidationStatus,
    pub headline: Option<String>,
    pub farmer_community: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub profile_picture_url: Option<String>,
    pub cover_picture_url: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
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
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
