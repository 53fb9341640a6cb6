//! Authentication module for Rentfold

pub mod jwt;
pub mod session;

pub use jwt::{Claims, JwtError, JwtManager};
pub use session::{JwtSessionResolver, Session, SessionResolver, SESSION_COOKIE};
