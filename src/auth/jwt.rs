use crate::config::JwtConfig;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub token_type: TokenType,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: i64, token_type: TokenType, lifetime: Duration) -> Self {
        let now = Utc::now();
        Claims {
            sub: user_id.to_string(),
            token_type,
            exp: (now + lifetime).timestamp(),
            iat: now.timestamp(),
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

pub fn create_token(claims: &Claims, secret: &str) -> Result<String, anyhow::Error> {
    let token = encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;
    Ok(token)
}

pub fn create_token_pair(user_id: i64, config: &JwtConfig) -> Result<TokenPair, anyhow::Error> {
    let access = Claims::new(
        user_id,
        TokenType::Access,
        Duration::minutes(config.access_expiration_minutes),
    );
    let refresh = Claims::new(
        user_id,
        TokenType::Refresh,
        Duration::days(config.refresh_expiration_days),
    );
    Ok(TokenPair {
        access: create_token(&access, &config.secret)?,
        refresh: create_token(&refresh, &config.secret)?,
    })
}

pub fn verify_token(
    token: &str,
    secret: &str,
    expected: TokenType,
) -> Result<Claims, anyhow::Error> {
    let validation = Validation::default();
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )?;
    if token_data.claims.token_type != expected {
        anyhow::bail!("Unexpected token type {:?}", token_data.claims.token_type);
    }
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            access_expiration_minutes: 5,
            refresh_expiration_days: 1,
        }
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let pair = create_token_pair(7, &config()).unwrap();
        let claims = verify_token(&pair.access, "test-secret", TokenType::Access).unwrap();
        assert_eq!(claims.user_id(), Some(7));
        assert!(verify_token(&pair.refresh, "test-secret", TokenType::Access).is_err());
        assert!(verify_token(&pair.refresh, "test-secret", TokenType::Refresh).is_ok());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let pair = create_token_pair(7, &config()).unwrap();
        assert!(verify_token(&pair.access, "other", TokenType::Access).is_err());
    }
}
