use std::env;

use anyhow::{bail, Context, Result};

use crate::authz::CrossTenantPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub access_token_expiry_minutes: i64,
    pub verification_token_expiry_minutes: i64,
    pub cross_tenant_access: CrossTenantPolicy,
    pub cors_allowed_origin: Option<String>,
    pub email_from: String,
    pub smtp_host: Option<String>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub aws_endpoint_url: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_region: String,
    pub s3_bucket: String,
    pub public_storage_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("SERVER_PORT must be a valid u16")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let jwt_issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "fieldnote".to_string());
        let jwt_audience =
            env::var("JWT_AUDIENCE").unwrap_or_else(|_| "fieldnote-clients".to_string());
        let access_token_expiry_minutes = env::var("ACCESS_TOKEN_EXPIRY_MINUTES")
            .unwrap_or_else(|_| "120".to_string())
            .parse()
            .context("ACCESS_TOKEN_EXPIRY_MINUTES must be an integer")?;
        let verification_token_expiry_minutes = env::var("VERIFICATION_TOKEN_EXPIRY_MINUTES")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("VERIFICATION_TOKEN_EXPIRY_MINUTES must be an integer")?;
        let cross_tenant_access = parse_policy(env::var("CROSS_TENANT_ACCESS").ok())?;
        let cors_allowed_origin = env::var("CORS_ALLOWED_ORIGIN").ok();
        let email_from =
            env::var("EMAIL_FROM").unwrap_or_else(|_| "no-reply@fieldnote.local".to_string());
        let smtp_host = env::var("SMTP_HOST").ok();
        let smtp_username = env::var("SMTP_USERNAME").ok();
        let smtp_password = env::var("SMTP_PASSWORD").ok();
        let aws_endpoint_url = env::var("AWS_ENDPOINT_URL").ok();
        let aws_access_key_id = env::var("AWS_ACCESS_KEY_ID").ok();
        let aws_secret_access_key = env::var("AWS_SECRET_ACCESS_KEY").ok();
        let aws_region = env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let s3_bucket = env::var("S3_BUCKET").context("S3_BUCKET must be set")?;
        let public_storage_url = env::var("PUBLIC_STORAGE_URL").ok();

        Ok(Self {
            server_host,
            server_port,
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            access_token_expiry_minutes,
            verification_token_expiry_minutes,
            cross_tenant_access,
            cors_allowed_origin,
            email_from,
            smtp_host,
            smtp_username,
            smtp_password,
            aws_endpoint_url,
            aws_access_key_id,
            aws_secret_access_key,
            aws_region,
            s3_bucket,
            public_storage_url,
        })
    }
}

fn parse_policy(raw: Option<String>) -> Result<CrossTenantPolicy> {
    match raw {
        None => Ok(CrossTenantPolicy::default()),
        Some(value) => match CrossTenantPolicy::parse(value.trim()) {
            Some(policy) => Ok(policy),
            None => bail!("CROSS_TENANT_ACCESS must be 'reject' or 'conceal', got '{value}'"),
        },
    }
}
