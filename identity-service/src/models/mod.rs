pub mod claim;
pub mod company;
pub mod identity;
pub mod role;
pub mod verification_token;

pub use claim::IdentityClaim;
pub use company::{Company, CompanyResponse};
pub use identity::{Identity, IdentityResponse};
pub use role::SystemRole;
pub use verification_token::{TokenKind, VerificationToken};
