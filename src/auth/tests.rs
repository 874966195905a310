//! Tests for auth module
//!
//! These tests verify core authentication functionality including:
//! - JWT token minting and validation
//! - Rejection of tampered, expired, and wrong-role tokens
//! - Claims structure

#[cfg(test)]
mod tests {
    use super::super::*;
    use super::super::models::{Claims, User, ROLE_AUTHENTICATED};
    use chrono::Utc;
    use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

    fn test_user() -> User {
        User {
            id: 42,
            email: "operator@example.com".to_string(),
            provider: "google".to_string(),
            provider_id: Some("google-123".to_string()),
            created_at: Utc::now(),
            last_sign_in: Utc::now(),
        }
    }

    #[test]
    fn test_minted_token_round_trips_subject_unchanged() {
        let secret = "test_secret_key";
        let token = handlers::mint_token(secret, &test_user()).expect("Failed to mint token");

        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .expect("Failed to decode token");

        assert_eq!(decoded.claims.sub, "42");
        assert_eq!(decoded.claims.email, "operator@example.com");
        assert_eq!(decoded.claims.role, ROLE_AUTHENTICATED);
    }

    #[test]
    fn test_token_expiry_is_24_hours() {
        let token = handlers::mint_token("secret", &test_user()).expect("Failed to mint token");

        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::new(Algorithm::HS256),
        )
        .expect("Failed to decode token");

        let now = Utc::now().timestamp() as usize;
        let day = 24 * 60 * 60;
        assert!(decoded.claims.exp > now + day - 60);
        assert!(decoded.claims.exp <= now + day + 60);
    }

    #[test]
    fn test_validation_fails_with_wrong_secret() {
        let token = handlers::mint_token("right_secret", &test_user()).expect("Failed to mint");

        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"wrong_secret"),
            &Validation::new(Algorithm::HS256),
        );

        assert!(
            result.is_err(),
            "Token validation should fail with wrong secret"
        );
    }

    #[test]
    fn test_validation_fails_with_expired_token() {
        let secret = "test_secret_key";
        let claims = Claims {
            sub: "42".to_string(),
            email: "operator@example.com".to_string(),
            role: ROLE_AUTHENTICATED.to_string(),
            exp: (Utc::now().timestamp() - 3600) as usize,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("Failed to encode token");

        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        );

        assert!(result.is_err(), "Expired token should be rejected");
    }

    #[test]
    fn test_validation_fails_with_tampered_token() {
        let secret = "test_secret_key";
        let token = handlers::mint_token(secret, &test_user()).expect("Failed to mint");

        // Flip a character inside the payload segment
        let mut chars: Vec<char> = token.chars().collect();
        let mid = chars.len() / 2;
        chars[mid] = if chars[mid] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();

        let result = decode::<Claims>(
            &tampered,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        );

        assert!(result.is_err(), "Tampered token should be rejected");
    }

    #[test]
    fn test_claims_structure() {
        let claims = Claims {
            sub: "7".to_string(),
            email: "a@b.c".to_string(),
            role: ROLE_AUTHENTICATED.to_string(),
            exp: 1234567890,
        };

        assert_eq!(claims.sub, "7");
        assert_eq!(claims.role, "authenticated");
        assert_eq!(claims.exp, 1234567890);
    }
}
