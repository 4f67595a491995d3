//! Company model - the tenant boundary that scopes business data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Company (tenant) entity. Exactly one identity holds the owner flag
/// pointing at it; `tax_id` is unique across tenants.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub tax_id: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl Company {
    pub fn new(name: String, tax_id: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            tax_id,
            enabled: true,
            created_at: Utc::now(),
        }
    }
}

/// Company response for the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct CompanyResponse {
    pub id: Uuid,
    pub name: String,
    pub tax_id: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Company> for CompanyResponse {
    fn from(c: Company) -> Self {
        Self {
            id: c.id,
            name: c.name,
            tax_id: c.tax_id,
            enabled: c.enabled,
            created_at: c.created_at,
        }
    }
}
