//! JWT Identity Integration Tests
//!
//! Bearer tokens as the identity strategy, alone and behind the gate.

#[cfg(test)]
mod tests {
    use authz_gate::decision::{Decision, DecisionClient, DecisionError, DecisionRequest};
    use authz_gate::gate::{AuthorizationGate, RequestContext};
    use authz_gate::identity::jwt::{Claims, JwtIdentity};
    use authz_gate::identity::{IdentityError, IdentityExtractor};
    use hyper::{Request, StatusCode};

    // ========================================================================
    // Helper: Create test tokens
    // ========================================================================

    fn create_hs256_token(secret: &str, claims: &Claims) -> String {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn bearer_request(token: &str) -> Request<()> {
        Request::get("/dataset1/resource1")
            .header("authorization", format!("Bearer {}", token))
            .body(())
            .unwrap()
    }

    fn extract(identity: &JwtIdentity, req: &Request<()>) -> Result<String, IdentityError> {
        identity.extract(&RequestContext::from_request(req))
    }

    fn valid_claims(sub: &str) -> Claims {
        Claims {
            sub: sub.to_string(),
            exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
            iat: Some(chrono::Utc::now().timestamp() as usize),
            iss: Some("test-issuer".to_string()),
            aud: Some("test-audience".to_string()),
        }
    }

    fn expired_claims(sub: &str) -> Claims {
        Claims {
            sub: sub.to_string(),
            exp: (chrono::Utc::now() - chrono::Duration::hours(1)).timestamp() as usize,
            iat: Some((chrono::Utc::now() - chrono::Duration::hours(2)).timestamp() as usize),
            iss: None,
            aud: None,
        }
    }

    /// Allows exactly one subject
    struct OnlySubject(&'static str);

    #[async_trait::async_trait]
    impl DecisionClient for OnlySubject {
        async fn evaluate(&self, request: &DecisionRequest) -> Result<Decision, DecisionError> {
            Ok(Decision::from(request.subject == self.0))
        }
    }

    // ========================================================================
    // TEST: Extraction
    // ========================================================================

    #[test]
    fn test_valid_token_yields_subject() {
        let secret = "super-secret-key-for-testing";
        let identity = JwtIdentity::new_hs256(secret);
        let token = create_hs256_token(secret, &valid_claims("alice"));

        assert_eq!(extract(&identity, &bearer_request(&token)).unwrap(), "alice");
    }

    #[test]
    fn test_token_from_query_parameter() {
        let secret = "super-secret-key-for-testing";
        let identity = JwtIdentity::new_hs256(secret);
        let token = create_hs256_token(secret, &valid_claims("alice"));

        let req = Request::get(format!("/dataset1/resource1?page=2&token={}", token))
            .body(())
            .unwrap();
        assert_eq!(extract(&identity, &req).unwrap(), "alice");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let identity = JwtIdentity::new_hs256("correct-secret");
        let token = create_hs256_token("wrong-secret", &valid_claims("alice"));

        assert!(matches!(
            extract(&identity, &bearer_request(&token)),
            Err(IdentityError::InvalidSignature)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let secret = "super-secret-key-for-testing";
        let identity = JwtIdentity::new_hs256(secret);
        let token = create_hs256_token(secret, &expired_claims("alice"));

        assert!(matches!(
            extract(&identity, &bearer_request(&token)),
            Err(IdentityError::TokenExpired)
        ));
    }

    #[test]
    fn test_issuer_and_audience_checked() {
        let secret = "super-secret-key-for-testing";
        let token = create_hs256_token(secret, &valid_claims("alice"));

        let matching = JwtIdentity::new_hs256(secret)
            .with_issuer("test-issuer")
            .with_audience("test-audience");
        assert_eq!(extract(&matching, &bearer_request(&token)).unwrap(), "alice");

        let wrong_issuer = JwtIdentity::new_hs256(secret).with_issuer("someone-else");
        assert!(extract(&wrong_issuer, &bearer_request(&token)).is_err());

        let wrong_audience = JwtIdentity::new_hs256(secret).with_audience("other-api");
        assert!(extract(&wrong_audience, &bearer_request(&token)).is_err());
    }

    #[test]
    fn test_missing_token_rejected() {
        let identity = JwtIdentity::new_hs256("secret");
        let req = Request::get("/dataset1/resource1").body(()).unwrap();

        assert!(matches!(
            extract(&identity, &req),
            Err(IdentityError::MissingIdentity)
        ));
    }

    #[test]
    fn test_malformed_token_rejected() {
        let identity = JwtIdentity::new_hs256("secret");

        assert!(matches!(
            extract(&identity, &bearer_request("not.a.jwt")),
            Err(IdentityError::InvalidToken(_))
        ));
    }

    // ========================================================================
    // TEST: Behind the gate
    // ========================================================================

    #[tokio::test]
    async fn test_gate_with_jwt_identity() {
        let secret = "super-secret-key-for-testing";
        let gate = AuthorizationGate::builder()
            .decision_client(OnlySubject("alice"))
            .identity(JwtIdentity::new_hs256(secret))
            .build()
            .unwrap();

        let cases = [
            (create_hs256_token(secret, &valid_claims("alice")), StatusCode::OK),
            (create_hs256_token(secret, &valid_claims("bob")), StatusCode::FORBIDDEN),
            (create_hs256_token(secret, &expired_claims("alice")), StatusCode::FORBIDDEN),
            (create_hs256_token("forged", &valid_claims("alice")), StatusCode::FORBIDDEN),
        ];

        for (token, expected) in cases {
            let status = match gate
                .authorize(bearer_request(&token), |_req| async { StatusCode::OK })
                .await
            {
                Ok(status) => status,
                Err(rejection) => rejection.status(),
            };
            assert_eq!(status, expected);
        }
    }
}
