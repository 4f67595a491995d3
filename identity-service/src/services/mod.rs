pub mod account;
pub mod email;
pub mod error;
pub mod external;
pub mod permission;
pub mod tenant;
pub mod token;

pub use account::{AccountService, AuthSession, LoginOutcome};
pub use error::ServiceError;
pub use permission::PermissionService;
pub use tenant::{CompanyService, TenantResolver};
pub use token::{AccessClaims, TokenIssuer};
