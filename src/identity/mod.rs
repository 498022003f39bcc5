//! Identity & token service: credential verification and token minting.
//!
//! Passwords are stored as argon2 PHC strings. Verification goes
//! through `Argon2::verify_password`, which compares digests in
//! constant time; login also verifies against a throwaway hash when the
//! email is unknown so response timing does not disclose whether an
//! account exists.

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use serde::Serialize;
use uuid::Uuid;

use crate::access::Subject;
use crate::auth::{TokenIssuer, TokenValidator};
use crate::config::AuthConfig;
use crate::domain::user::{Role, User};
use crate::error::{AppError, Result};
use crate::repository::UserStore;

/// A freshly minted bearer token.
#[derive(Debug, Clone, Serialize)]
pub struct AuthToken {
    pub token: String,
}

pub struct IdentityService {
    users: Arc<dyn UserStore>,
    issuer: TokenIssuer,
    validator: Arc<TokenValidator>,
    policy: AuthConfig,
    /// Hash verified against for unknown emails, to equalize timing.
    dummy_hash: String,
}

impl IdentityService {
    pub fn new(
        users: Arc<dyn UserStore>,
        issuer: TokenIssuer,
        validator: Arc<TokenValidator>,
        policy: AuthConfig,
    ) -> Result<Self> {
        let dummy_hash = hash_password("decoy-password")?;
        Ok(Self {
            users,
            issuer,
            validator,
            policy,
            dummy_hash,
        })
    }

    /// Create a user and mint a token for it.
    ///
    /// The role defaults to Student; Admin is self-assignable only when
    /// the `auth.allow_admin_registration` policy permits it.
    #[tracing::instrument(name = "identity.register", skip(self, password))]
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        role: Option<Role>,
    ) -> Result<AuthToken> {
        let role = role.unwrap_or(Role::Student);

        if role == Role::Admin && !self.policy.allow_admin_registration {
            tracing::warn!(email = %email, "Admin self-registration denied by policy");
            return Err(AppError::Forbidden);
        }

        if self.users.find_by_email(email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password(password)?;
        // The store's unique email index backstops the check above, so
        // a lost race still cannot create two users for one email.
        let user = self.users.create(User::new(email, password_hash, role)).await?;

        tracing::info!(user_id = %user.id, role = %user.role, "User registered");

        let token = self.issuer.issue(user.id, user.role)?;
        Ok(AuthToken { token })
    }

    /// Verify credentials and mint a token. Unknown email and wrong
    /// password are indistinguishable to the caller.
    #[tracing::instrument(name = "identity.login", skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthToken> {
        let user = self.users.find_by_email(email).await?;

        let stored_hash = user
            .as_ref()
            .map(|u| u.password_hash.as_str())
            .unwrap_or(self.dummy_hash.as_str());

        let verified = verify_password(password, stored_hash);

        match user {
            Some(user) if verified => {
                tracing::info!(user_id = %user.id, "Login succeeded");
                let token = self.issuer.issue(user.id, user.role)?;
                Ok(AuthToken { token })
            }
            _ => Err(AppError::Unauthorized("Invalid credentials".to_string())),
        }
    }

    /// Look up the account behind an authenticated subject. The record
    /// serializes without its password hash.
    pub async fn profile(&self, user_id: Uuid) -> Result<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Resolve a token to its subject. Fails `Unauthorized` on bad
    /// signature or expiry; there is no revocation list.
    pub fn validate(&self, token: &str) -> Result<Subject> {
        let claims = self.validator.validate(token)?;
        Ok(Subject {
            id: claims.subject_id(),
            role: claims.role,
        })
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "Stored password hash is malformed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::repository::MemoryUserStore;

    fn jwt_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-key-for-testing".to_string(),
            issuer: None,
            audience: None,
            expiry_seconds: 3600,
        }
    }

    fn service(policy: AuthConfig) -> IdentityService {
        let config = jwt_config();
        IdentityService::new(
            Arc::new(MemoryUserStore::new()),
            TokenIssuer::new(&config),
            Arc::new(TokenValidator::new(&config)),
            policy,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let service = service(AuthConfig::default());

        let registered = service
            .register("student@x.com", "hunter2", None)
            .await
            .unwrap();
        let subject = service.validate(&registered.token).unwrap();
        assert_eq!(subject.role, Role::Student);

        let logged_in = service.login("student@x.com", "hunter2").await.unwrap();
        let subject2 = service.validate(&logged_in.token).unwrap();
        assert_eq!(subject2.id, subject.id);
    }

    #[tokio::test]
    async fn test_register_duplicate_email_conflicts() {
        let service = service(AuthConfig::default());
        service.register("a@x.com", "pw", None).await.unwrap();

        let result = service.register("a@x.com", "pw2", None).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let service = service(AuthConfig::default());
        service.register("a@x.com", "right", None).await.unwrap();

        let result = service.login("a@x.com", "wrong").await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_login_unknown_email() {
        let service = service(AuthConfig::default());
        let result = service.login("ghost@x.com", "pw").await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_admin_registration_policy() {
        let denied = service(AuthConfig {
            allow_admin_registration: false,
        });
        assert!(matches!(
            denied.register("admin@x.com", "pw", Some(Role::Admin)).await,
            Err(AppError::Forbidden)
        ));

        let allowed = service(AuthConfig {
            allow_admin_registration: true,
        });
        let token = allowed
            .register("admin@x.com", "pw", Some(Role::Admin))
            .await
            .unwrap();
        let subject = allowed.validate(&token.token).unwrap();
        assert_eq!(subject.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_profile_returns_account_without_hash() {
        let service = service(AuthConfig::default());
        let token = service.register("me@x.com", "pw", None).await.unwrap();
        let subject = service.validate(&token.token).unwrap();

        let user = service.profile(subject.id).await.unwrap();
        assert_eq!(user.email, "me@x.com");
        assert_eq!(user.role, Role::Student);

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
    }

    #[tokio::test]
    async fn test_profile_unknown_id() {
        let service = service(AuthConfig::default());
        let result = service.profile(Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_instructor_always_self_assignable() {
        let service = service(AuthConfig::default());
        let token = service
            .register("prof@x.com", "pw", Some(Role::Instructor))
            .await
            .unwrap();
        let subject = service.validate(&token.token).unwrap();
        assert_eq!(subject.role, Role::Instructor);
    }
}
