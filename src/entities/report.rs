use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Two-letter reason codes a reporter picks from.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(2))")]
pub enum ReportReason {
    #[sea_orm(string_value = "SP")]
    #[serde(rename = "SP")]
    Spam,
    #[sea_orm(string_value = "HS")]
    #[serde(rename = "HS")]
    HateSpeech,
    #[sea_orm(string_value = "VI")]
    #[serde(rename = "VI")]
    Violence,
    #[sea_orm(string_value = "NU")]
    #[serde(rename = "NU")]
    Nudity,
    #[sea_orm(string_value = "FR")]
    #[serde(rename = "FR")]
    Fraud,
    #[sea_orm(string_value = "MI")]
    #[serde(rename = "MI")]
    Misinformation,
    #[sea_orm(string_value = "OT")]
    #[serde(rename = "OT")]
    Other,
}

impl ReportReason {
    pub fn display(&self) -> &'static str {
        match self {
            ReportReason::Spam => "Spam",
            ReportReason::HateSpeech => "Hate speech",
            ReportReason::Violence => "Violence",
            ReportReason::Nudity => "Nudity",
            ReportReason::Fraud => "Fraud or scam",
            ReportReason::Misinformation => "Misinformation",
            ReportReason::Other => "Other",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "reports")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub reason: ReportReason,
    #[sea_orm(column_type = "Text", nullable)]
    pub detail_reason: Option<String>,
    pub restrict_user: bool,
    pub block_user: bool,
    pub is_approved: bool,
    pub approved_by: Option<i64>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::post::Entity",
        from = "Column::PostId",
        to = "super::post::Column::Id",
        on_delete = "Cascade"
    )]
    Post,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Post.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
