use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::{Role, User};

#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_expiry: Duration,
    verification_expiry: Duration,
}

impl JwtService {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            access_expiry: Duration::minutes(config.access_token_expiry_minutes),
            verification_expiry: Duration::minutes(config.verification_token_expiry_minutes),
        })
    }

    /// Full-access token carrying identity and role.
    pub fn generate_access_token(&self, user: &User) -> Result<String> {
        self.generate(user, false, self.access_expiry)
    }

    /// Short-lived token restricted to completing account verification; the
    /// `verification_pending` claim bars it from general access.
    pub fn generate_verification_token(&self, user: &User) -> Result<String> {
        self.generate(user, true, self.verification_expiry)
    }

    fn generate(&self, user: &User, verification_pending: bool, expiry: Duration) -> Result<String> {
        let now = Utc::now();
        let exp = now + expiry;
        let claims = Claims {
            sub: user.id,
            role: user.role,
            verification_pending,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(&[self.audience.clone()]);
        validation.set_issuer(&[self.issuer.clone()]);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    #[serde(default)]
    pub verification_pending: bool,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}
