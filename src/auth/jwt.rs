use jsonwebtoken::{decode, DecodingKey, Validation};

use crate::config::JwtConfig;
use crate::error::AppError;

use super::Claims;

pub struct JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
    admin_role: String,
}

impl JwtValidator {
    pub fn new(config: &JwtConfig) -> Self {
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        let mut validation = Validation::default();

        if let Some(ref issuer) = config.issuer {
            validation.set_issuer(&[issuer]);
        }

        if let Some(ref audience) = config.audience {
            validation.set_audience(&[audience]);
        }

        Self {
            decoding_key,
            validation,
            admin_role: config.admin_role.clone(),
        }
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AppError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }

    /// Validate a token and require the configured admin role
    pub fn validate_admin(&self, token: &str) -> Result<Claims, AppError> {
        let claims = self.validate(token)?;
        if !claims.has_role(&self.admin_role) {
            return Err(AppError::Forbidden(format!(
                "{} role required",
                self.admin_role
            )));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn create_test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-key-for-testing".to_string(),
            issuer: None,
            audience: None,
            admin_role: "ADMIN".to_string(),
        }
    }

    fn create_test_token(roles: &[&str], secret: &str) -> String {
        let claims = Claims {
            sub: "admin-123".to_string(),
            exp: chrono::Utc::now().timestamp() + 3600,
            iat: chrono::Utc::now().timestamp(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            extra: Default::default(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_admin_token() {
        let config = create_test_config();
        let validator = JwtValidator::new(&config);

        let token = create_test_token(&["ADMIN"], &config.secret);
        let claims = validator.validate_admin(&token).unwrap();
        assert_eq!(claims.user_id(), "admin-123");
    }

    #[test]
    fn test_non_admin_rejected() {
        let config = create_test_config();
        let validator = JwtValidator::new(&config);

        let token = create_test_token(&["SELLER"], &config.secret);
        assert!(validator.validate(&token).is_ok());
        assert!(matches!(
            validator.validate_admin(&token),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_invalid_token() {
        let config = create_test_config();
        let validator = JwtValidator::new(&config);

        assert!(matches!(
            validator.validate("invalid-token"),
            Err(AppError::Auth(_))
        ));

        let foreign = create_test_token(&["ADMIN"], "some-other-secret");
        assert!(validator.validate(&foreign).is_err());
    }
}
