use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;
use crate::db::{normalize_email, CreateUser, User, UserRepository};
use crate::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub struct AuthService;

impl AuthService {
    /// Create a signed JWT for a user id
    pub fn create_jwt(config: &JwtConfig, user_id: &str) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::hours(config.expiration_hours);
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )?;
        Ok(token)
    }

    /// Decode and validate a JWT (signature and expiry), returning the claims
    pub fn decode_jwt(config: &JwtConfig, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Resolve a bearer token to the user it was issued for. A valid token whose
    /// subject no longer exists is rejected like an invalid one.
    pub async fn get_user_from_token(state: &Arc<AppState>, token: &str) -> AppResult<User> {
        let claims = Self::decode_jwt(&state.config.jwt, token)?;
        UserRepository::find_by_id(&state.db, &claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// bcrypt is CPU bound, so hashing runs on the blocking pool.
    pub async fn hash_password(password: String, cost: u32) -> AppResult<String> {
        let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AppError::Internal(e.into()))??;
        Ok(hashed)
    }

    pub async fn verify_password(password: String, hash: String) -> AppResult<bool> {
        let ok = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AppError::Internal(e.into()))??;
        Ok(ok)
    }

    /// Create an account and issue its first token.
    pub async fn register(state: &Arc<AppState>, registration: Registration) -> AppResult<(User, String)> {
        let name = registration.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }
        let email = normalize_email(&registration.email);

        if UserRepository::find_by_email(&state.db, &email).await?.is_some() {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let password_hash =
            Self::hash_password(registration.password, state.config.auth.bcrypt_cost).await?;

        // The unique index still guards against a concurrent registration.
        let user = UserRepository::create(
            &state.db,
            CreateUser {
                name,
                email,
                password_hash,
            },
        )
        .await?;

        let token = Self::create_jwt(&state.config.jwt, &user.id)?;
        tracing::info!("Registered user {}", user.id);
        Ok((user, token))
    }

    /// Check credentials and issue a token. Unknown email and wrong password
    /// are indistinguishable to the caller.
    pub async fn login(state: &Arc<AppState>, email: &str, password: String) -> AppResult<(User, String)> {
        let user = match UserRepository::find_by_email(&state.db, email).await? {
            Some(user) => user,
            None => {
                tracing::debug!("Login attempt for unknown email");
                return Err(AppError::InvalidCredentials);
            }
        };

        if !Self::verify_password(password, user.password_hash.clone()).await? {
            tracing::debug!("Invalid password for user {}", user.id);
            return Err(AppError::InvalidCredentials);
        }

        let token = Self::create_jwt(&state.config.jwt, &user.id)?;
        Ok((user, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            expiration_hours: 1,
        }
    }

    #[test]
    fn issued_token_round_trips_subject() {
        let config = jwt_config();
        let token = AuthService::create_jwt(&config, "user-1").unwrap();
        let claims = AuthService::decode_jwt(&config, &token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = AuthService::create_jwt(&jwt_config(), "user-1").unwrap();
        let other = JwtConfig {
            secret: "other-secret".to_string(),
            expiration_hours: 1,
        };
        assert!(matches!(
            AuthService::decode_jwt(&other, &token),
            Err(AppError::Jwt(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let expired = JwtConfig {
            secret: "test-secret".to_string(),
            expiration_hours: -2,
        };
        let token = AuthService::create_jwt(&expired, "user-1").unwrap();
        assert!(AuthService::decode_jwt(&expired, &token).is_err());
    }

    #[tokio::test]
    async fn password_hash_verifies_only_the_original() {
        let hash = AuthService::hash_password("correct horse".to_string(), 4)
            .await
            .unwrap();
        assert!(AuthService::verify_password("correct horse".to_string(), hash.clone())
            .await
            .unwrap());
        assert!(!AuthService::verify_password("wrong".to_string(), hash)
            .await
            .unwrap());
    }
}
