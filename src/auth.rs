//! Authentication and role-based authorization
//!
//! Access tokens are issued by Supabase Auth (HS256, audience
//! `authenticated`). The platform role comes from `user_roles`; users without
//! a row are students.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::AppState;

/// Platform role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Vendor,
    VendorEmployee,
    Admin,
    SuperAdmin,
}

/// Actions guarded at the authorization boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    BookSeat,
    /// Edit seats of cabins owned by the caller's partner, as owner or employee
    ManageOwnProperty,
    ReviewVendors,
    ViewPlatformReports,
    ManageCoupons,
}

impl Role {
    pub fn allows(&self, permission: Permission) -> bool {
        use Permission::*;

        match self {
            Role::Student => match permission {
                BookSeat => true,
                ManageOwnProperty | ReviewVendors | ViewPlatformReports | ManageCoupons => false,
            },
            Role::Vendor => match permission {
                BookSeat | ManageOwnProperty | ManageCoupons => true,
                ReviewVendors | ViewPlatformReports => false,
            },
            Role::VendorEmployee => match permission {
                ManageOwnProperty => true,
                BookSeat | ReviewVendors | ViewPlatformReports | ManageCoupons => false,
            },
            Role::Admin => match permission {
                BookSeat | ReviewVendors | ViewPlatformReports | ManageCoupons => true,
                ManageOwnProperty => false,
            },
            Role::SuperAdmin => match permission {
                BookSeat | ManageOwnProperty | ReviewVendors | ViewPlatformReports
                | ManageCoupons => true,
            },
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Student => write!(f, "student"),
            Self::Vendor => write!(f, "vendor"),
            Self::VendorEmployee => write!(f, "vendor_employee"),
            Self::Admin => write!(f, "admin"),
            Self::SuperAdmin => write!(f, "super_admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "student" | "user" => Ok(Self::Student),
            "vendor" => Ok(Self::Vendor),
            "vendor_employee" => Ok(Self::VendorEmployee),
            "admin" => Ok(Self::Admin),
            "super_admin" => Ok(Self::SuperAdmin),
            _ => Err(RoleParseError(s.to_string())),
        }
    }
}

/// Error parsing a role string
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid role: {0}")]
pub struct RoleParseError(pub String);

/// Claims of a Supabase access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
    #[serde(default)]
    pub email: Option<String>,
    pub aud: String,
}

/// Verifies Supabase access tokens
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&["authenticated"]);

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Unauthorized(format!("invalid access token: {}", e)))
    }
}

/// The authenticated caller
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: Role,
}

impl AuthUser {
    /// Fail with `Forbidden` unless the caller's role allows `permission`
    pub fn require(&self, permission: Permission) -> Result<()> {
        if self.role.allows(permission) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = %self.user_id,
                role = %self.role,
                ?permission,
                "Permission denied"
            );
            Err(AppError::Forbidden)
        }
    }
}

fn bearer_token(parts: &Parts) -> Result<&str> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("missing Authorization header".to_string()))?;

    header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("expected a Bearer token".to_string()))
}

async fn resolve_role(state: &AppState, user_id: Uuid) -> Result<Role> {
    if let Some(role) = state.cache.roles.get(&user_id).await {
        return Ok(role);
    }

    let role = match queries::get_user_role(&state.db, user_id).await? {
        Some(name) => name.parse::<Role>().map_err(|e| {
            tracing::error!(user_id = %user_id, "Stored role rejected: {}", e);
            AppError::Forbidden
        })?,
        None => Role::Student,
    };

    state.cache.roles.insert(user_id, role).await;
    Ok(role)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let claims = state.tokens.verify(bearer_token(parts)?)?;
        let role = resolve_role(state, claims.sub).await?;

        Ok(AuthUser {
            user_id: claims.sub,
            email: claims.email,
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "super-secret-jwt-token-with-at-least-32-characters";

    fn token(secret: &str, aud: &str, exp_offset: i64) -> String {
        let claims = Claims {
            sub: Uuid::new_v4(),
            exp: Utc::now().timestamp() + exp_offset,
            email: Some("student@example.com".to_string()),
            aud: aud.to_string(),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("vendor".parse::<Role>().unwrap(), Role::Vendor);
        assert_eq!("super_admin".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert_eq!("user".parse::<Role>().unwrap(), Role::Student);
        assert!("hostel_owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_display_parses_back() {
        for role in [
            Role::Student,
            Role::Vendor,
            Role::VendorEmployee,
            Role::Admin,
            Role::SuperAdmin,
        ] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_permission_matrix() {
        assert!(Role::Student.allows(Permission::BookSeat));
        assert!(!Role::Student.allows(Permission::ReviewVendors));
        assert!(Role::Vendor.allows(Permission::ManageOwnProperty));
        assert!(!Role::Vendor.allows(Permission::ViewPlatformReports));
        assert!(!Role::VendorEmployee.allows(Permission::BookSeat));
        assert!(Role::VendorEmployee.allows(Permission::ManageOwnProperty));
        assert!(!Role::VendorEmployee.allows(Permission::ManageCoupons));
        assert!(Role::Admin.allows(Permission::ReviewVendors));
        assert!(Role::Admin.allows(Permission::ViewPlatformReports));
        assert!(Role::SuperAdmin.allows(Permission::ManageOwnProperty));
    }

    #[test]
    fn test_require_maps_to_forbidden() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            email: None,
            role: Role::Student,
        };
        assert!(user.require(Permission::BookSeat).is_ok());
        assert!(matches!(
            user.require(Permission::ViewPlatformReports),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn test_verify_valid_token() {
        let verifier = TokenVerifier::new(SECRET);
        let claims = verifier.verify(&token(SECRET, "authenticated", 3600)).unwrap();
        assert_eq!(claims.email.as_deref(), Some("student@example.com"));
    }

    #[test]
    fn test_verify_rejects_bad_tokens() {
        let verifier = TokenVerifier::new(SECRET);
        assert!(verifier.verify(&token("another-secret-of-sufficient-length!!", "authenticated", 3600)).is_err());
        assert!(verifier.verify(&token(SECRET, "anon", 3600)).is_err());
        assert!(verifier.verify(&token(SECRET, "authenticated", -3600)).is_err());
        assert!(verifier.verify("not-a-jwt").is_err());
    }

    #[test]
    fn test_bearer_token_extraction() {
        let (parts, _) = Request::builder()
            .header(AUTHORIZATION, "Bearer abc.def.ghi")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts).unwrap(), "abc.def.ghi");

        let (parts, _) = Request::builder()
            .header(AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .body(())
            .unwrap()
            .into_parts();
        assert!(bearer_token(&parts).is_err());

        let (parts, _) = Request::builder().body(()).unwrap().into_parts();
        assert!(bearer_token(&parts).is_err());
    }
}
