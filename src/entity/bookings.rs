use chrono::{NaiveDate, NaiveTime};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub shop_id: Uuid,
    pub appointment_date: NaiveDate,
    /// Shop-local wall clock; the shop's timezone column resolves the instant.
    pub appointment_time: NaiveTime,
    pub total_duration_minutes: i32,
    pub total_amount: i64,
    pub booking_status: String,
    pub payment_status: String,
    pub payment_method: String,
    pub external_order_id: Option<String>,
    pub external_payment_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    Users,
    #[sea_orm(
        belongs_to = "super::shops::Entity",
        from = "Column::ShopId",
        to = "super::shops::Column::Id"
    )]
    Shops,
    #[sea_orm(has_many = "super::booking_services::Entity")]
    BookingServices,
    #[sea_orm(has_one = "super::feedbacks::Entity")]
    Feedbacks,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::shops::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shops.def()
    }
}

impl Related<super::booking_services::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BookingServices.def()
    }
}

impl Related<super::feedbacks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Feedbacks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
