//! Request authentication and role gates

use bson::{doc, oid::ObjectId};
use hyper::header::AUTHORIZATION;

use crate::auth::jwt::extract_token_from_header;
use crate::db::schemas::{UserDoc, UserRole, USER_COLLECTION};
use crate::server::AppState;
use crate::types::{BookwormError, Result};

/// The authenticated caller, resolved from a bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub photo_url: Option<String>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Resolve the caller from the Authorization header.
///
/// Validates the JWT, loads the user, and rejects inactive accounts and
/// tokens issued before the user's current token_version.
pub async fn authenticate<B>(
    state: &AppState,
    req: &hyper::Request<B>,
) -> Result<AuthUser> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = extract_token_from_header(header)
        .ok_or_else(|| BookwormError::Auth("Not authorized, no token".into()))?;

    let claims = state.jwt.validate(token)?;

    let user_id = ObjectId::parse_str(&claims.sub)
        .map_err(|_| BookwormError::Auth("Invalid token subject".into()))?;

    let users = state.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
    let user = users
        .find_one(doc! { "_id": user_id })
        .await?
        .ok_or_else(|| BookwormError::Auth("User no longer exists".into()))?;

    if !user.is_active {
        return Err(BookwormError::Auth("Account is deactivated".into()));
    }

    if user.token_version != claims.token_version {
        return Err(BookwormError::Auth("Token has been revoked".into()));
    }

    Ok(AuthUser {
        id: user_id,
        name: user.name,
        email: user.email,
        role: user.role,
        photo_url: user.photo_url,
    })
}

/// Gate an operation behind the admin role
pub fn require_admin(user: &AuthUser) -> Result<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(BookwormError::Forbidden("Admin access required".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_admin() {
        let admin = AuthUser {
            id: ObjectId::new(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            role: UserRole::Admin,
            photo_url: None,
        };
        let user = AuthUser {
            role: UserRole::User,
            ..admin.clone()
        };

        assert!(require_admin(&admin).is_ok());
        assert!(matches!(
            require_admin(&user),
            Err(BookwormError::Forbidden(_))
        ));
    }
}
