use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DriverProfile {
    pub id: Uuid, // same as the authenticated worker id
    pub display_name: String,
}
