pub mod claims;
pub mod extractors;
pub mod jwt;
pub mod password;
pub mod tokens;

pub use extractors::AuthUser;
pub use jwt::SessionKeys;
pub use password::Argon2Hasher;
pub use tokens::TokenGenerator;
