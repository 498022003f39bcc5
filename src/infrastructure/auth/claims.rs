use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user::Role;

/// Signed claim set carried by a bearer token. Not persisted; minted at
/// login/registration and validated per request. There is no revocation
/// list, so a token stays valid until `exp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// Role fixed at registration
    pub role: Role,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

impl Claims {
    pub fn subject_id(&self) -> Uuid {
        self.sub
    }

    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.exp < now
    }
}
