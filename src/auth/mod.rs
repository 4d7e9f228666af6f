mod claims;
mod jwt;
mod session;

pub use claims::Claims;
pub use jwt::JwtValidator;
pub use session::{extract_bearer_token, AdminSession};
