use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCompanyRequest {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(length(min = 1, max = 32))]
    pub tax_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CurrentCompanyResponse {
    pub company_id: Option<Uuid>,
}
