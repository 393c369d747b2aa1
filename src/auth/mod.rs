//! Authentication and authorization for Bookworm
//!
//! Provides:
//! - JWT token generation and validation
//! - Password hashing with Argon2
//! - Role checks for admin-only operations

pub mod jwt;
pub mod password;
pub mod permissions;

pub use jwt::{extract_token_from_header, Claims, JwtValidator};
pub use password::{hash_password, verify_password};
pub use permissions::{authenticate, require_admin, AuthUser};
