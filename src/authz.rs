use std::sync::Arc;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::{Comment, Requester};
use crate::store::CommentStore;

/// Ownership rule for deletion: admins always; an identity only on an
/// exact, case-sensitive match of both author fields.
pub fn can_delete(comment: &Comment, requester: &Requester) -> bool {
    match requester {
        Requester::Admin => true,
        Requester::Identity(id) => {
            id.name == comment.author_name && id.email == comment.author_email
        }
    }
}

/// Enforces the ownership rule at the store boundary. UI-side checks only
/// drive button visibility; this is the actual guard.
#[derive(Clone)]
pub struct AuthorizationResolver {
    comments: Arc<dyn CommentStore>,
}

impl AuthorizationResolver {
    pub fn new(comments: Arc<dyn CommentStore>) -> Self {
        Self { comments }
    }

    /// Visibility/enablement decision for a delete button.
    pub async fn can_delete_by_id(&self, comment_id: Uuid, requester: &Requester) -> AppResult<bool> {
        let comment = self.comments.get(comment_id).await?.ok_or(AppError::NotFound)?;
        Ok(can_delete(&comment, requester))
    }

    pub async fn delete(&self, comment_id: Uuid, requester: &Requester) -> AppResult<()> {
        let comment = self.comments.get(comment_id).await?.ok_or(AppError::NotFound)?;
        if !can_delete(&comment, requester) {
            return Err(AppError::Unauthorized);
        }
        if !self.comments.delete(comment_id).await? {
            return Err(AppError::NotFound);
        }
        info!(comment_id = %comment_id, post_id = %comment.post_id, "comment deleted");
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminClaims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

/// The identity provider's single signal: a bearer token with an admin
/// role claim.
pub fn verify_admin_jwt(token: &str, secret: &str) -> AppResult<AdminClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let token_data = decode::<AdminClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|_| AppError::Unauthorized)?;
    if token_data.claims.role != "admin" {
        return Err(AppError::Unauthorized);
    }
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Identity;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use time::macros::datetime;

    fn comment(name: &str, email: &str) -> Comment {
        Comment {
            id: Uuid::new_v4(),
            post_id: "post-1".to_string(),
            author_name: name.to_string(),
            author_email: email.to_string(),
            content: "hello".to_string(),
            created_at: datetime!(2026-08-29 12:00 UTC),
        }
    }

    fn identity(name: &str, email: &str) -> Requester {
        Requester::Identity(Identity {
            name: name.to_string(),
            email: email.to_string(),
        })
    }

    #[test]
    fn admin_can_delete_any_comment() {
        assert!(can_delete(&comment("Lee", "lee@x.com"), &Requester::Admin));
        assert!(can_delete(&comment("Kim", "kim@x.com"), &Requester::Admin));
    }

    #[test]
    fn identity_must_match_both_fields_exactly() {
        let c = comment("Lee", "lee@x.com");
        assert!(can_delete(&c, &identity("Lee", "lee@x.com")));
        assert!(!can_delete(&c, &identity("Lee", "other@x.com")));
        assert!(!can_delete(&c, &identity("Other", "lee@x.com")));
        // Case-sensitive on both fields.
        assert!(!can_delete(&c, &identity("lee", "lee@x.com")));
        assert!(!can_delete(&c, &identity("Lee", "Lee@x.com")));
    }

    #[test]
    fn admin_jwt_roundtrip() {
        let secret = "test_secret";
        let claims = AdminClaims {
            sub: "ops".to_string(),
            role: "admin".to_string(),
            exp: 4_102_444_800, // far future
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap();
        assert!(verify_admin_jwt(&token, secret).is_ok());
        assert!(verify_admin_jwt(&token, "wrong_secret").is_err());

        let reader = AdminClaims {
            sub: "ops".to_string(),
            role: "reader".to_string(),
            exp: 4_102_444_800,
        };
        let token = encode(&Header::default(), &reader, &EncodingKey::from_secret(secret.as_bytes())).unwrap();
        assert!(verify_admin_jwt(&token, secret).is_err());
    }
}
