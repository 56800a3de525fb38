//! OTP login flow: identifier entry, code verification, session
//! establishment. The flow is a small state machine whose transitions are
//! driven entirely by request outcomes; toasts and navigation are side
//! channels.

use serde::{Deserialize, Serialize};

use crate::model::{
    ChallengeId, Identifier, OtpChallenge, Route, Session, Token, UserId, UserProfile,
};
use crate::{AppError, AppResult, ErrorKind, OTP_CODE_LENGTH};

#[derive(Clone, Debug, PartialEq, Default)]
pub enum AuthPhase {
    #[default]
    EnteringIdentifier,
    OtpSent {
        challenge: OtpChallenge,
    },
    Verified,
}

impl AuthPhase {
    #[must_use]
    pub const fn challenge(&self) -> Option<&OtpChallenge> {
        match self {
            Self::OtpSent { challenge } => Some(challenge),
            _ => None,
        }
    }
}

#[derive(Default)]
pub struct AuthFlow {
    pub phase: AuthPhase,
    /// Raw input; preserved verbatim across failed attempts.
    pub identifier_input: String,
    pub code_input: String,
    /// Normalized identifier for the request currently in flight.
    pub pending_identifier: Option<Identifier>,
    /// Where to go after verification, when the caller supplied one.
    pub return_to: Option<Route>,
    pub error: Option<AppError>,
    pub sending: bool,
    pub verifying: bool,
}

impl AuthFlow {
    #[must_use]
    pub fn opened(return_to: Option<Route>) -> Self {
        Self {
            return_to,
            ..Self::default()
        }
    }

    /// The destination after a successful verification.
    #[must_use]
    pub fn destination(&self) -> Route {
        self.return_to.clone().unwrap_or(Route::Home)
    }

    /// Drop back to identifier entry without losing the typed identifier.
    pub fn change_identifier(&mut self) {
        self.phase = AuthPhase::EnteringIdentifier;
        self.code_input.clear();
        self.pending_identifier = None;
        self.error = None;
    }
}

/// Validate the entered OTP code shape before any network call.
///
/// # Errors
///
/// Returns a `Validation` error unless the code is exactly six ASCII
/// digits.
pub fn validate_otp_code(code: &str) -> AppResult<()> {
    let trimmed = code.trim();
    if trimmed.len() != OTP_CODE_LENGTH || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(
            AppError::validation("Enter the 6-digit code we sent you").with_field("otp", "Enter the 6-digit code"),
        );
    }
    Ok(())
}

// --- Wire types ---

#[derive(Debug, Clone, Serialize)]
pub struct SendOtpBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
}

impl<'a> SendOtpBody<'a> {
    #[must_use]
    pub fn for_identifier(identifier: &'a Identifier) -> Self {
        match identifier {
            Identifier::Phone(s) => Self {
                phone_number: Some(s.as_str()),
                email: None,
            },
            Identifier::Email(s) => Self {
                phone_number: None,
                email: Some(s.as_str()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyOtpBody<'a> {
    pub otp_id: &'a str,
    pub otp: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
}

impl<'a> VerifyOtpBody<'a> {
    #[must_use]
    pub fn new(challenge: &'a OtpChallenge, code: &'a str) -> Self {
        let (phone_number, email) = match &challenge.target {
            Identifier::Phone(s) => (Some(s.as_str()), None),
            Identifier::Email(s) => (None, Some(s.as_str())),
        };
        Self {
            otp_id: challenge.id.as_str(),
            otp: code,
            phone_number,
            email,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendOtpData {
    pub otp_id: String,
    #[serde(default)]
    pub masked_phone: Option<String>,
    #[serde(default)]
    pub dev_hint: Option<String>,
}

impl SendOtpData {
    #[must_use]
    pub fn into_challenge(self, target: Identifier) -> OtpChallenge {
        OtpChallenge {
            id: ChallengeId::new(self.otp_id),
            masked_target: self.masked_phone.or_else(|| Some(target.masked())),
            target,
            dev_hint: self.dev_hint,
        }
    }
}

/// Nested user shape returned by verification; flattened into
/// [`UserProfile`] at this boundary so nothing downstream deals with it.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyOtpUser {
    pub id: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub profile: Option<VerifyOtpUserProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyOtpUserProfile {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenPairData {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyOtpData {
    #[serde(default)]
    pub user: Option<VerifyOtpUser>,
    #[serde(default)]
    pub tokens: Option<TokenPairData>,
    #[serde(default)]
    pub is_new_user: Option<bool>,
}

/// Turn a verification payload into a session. A payload missing the user
/// or either token is a malformed response and a hard failure, never a
/// silent success.
///
/// # Errors
///
/// `Serialization` when the payload is incomplete.
pub fn session_from_verify(data: VerifyOtpData) -> AppResult<Session> {
    let malformed =
        || AppError::new(ErrorKind::Serialization, "The sign-in response was incomplete");

    let user = data.user.ok_or_else(malformed)?;
    let tokens = data.tokens.ok_or_else(malformed)?;

    if user.id.is_empty() || tokens.access_token.is_empty() || tokens.refresh_token.is_empty() {
        return Err(malformed());
    }

    let (city, verified) = user
        .profile
        .map_or((None, false), |p| (p.city, p.verified));

    Ok(Session {
        user: UserProfile {
            id: UserId::new(user.id),
            phone_number: user.phone_number,
            email: user.email,
            name: user.name,
            city,
            is_verified: verified,
        },
        access_token: Token::new(tokens.access_token),
        refresh_token: Token::new(tokens.refresh_token),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct LogoutBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<&'a str>,
}

// --- Admin login ---

#[derive(Debug, Clone, Serialize)]
pub struct AdminLoginBody<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminLoginData {
    pub user: crate::model::AdminProfile,
    pub token: String,
}

/// # Errors
///
/// `Validation` when the email or password is obviously malformed; checked
/// before any network call.
pub fn validate_admin_credentials(email: &str, password: &str) -> AppResult<()> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(AppError::validation("Enter a valid email address")
            .with_field("email", "Enter a valid email address"));
    }
    if password.is_empty() {
        return Err(AppError::validation("Enter your password")
            .with_field("password", "Enter your password"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge() -> OtpChallenge {
        OtpChallenge {
            id: ChallengeId::new("abc123"),
            target: Identifier::Phone("+919999999999".into()),
            masked_target: Some("+91****9999".into()),
            dev_hint: None,
        }
    }

    #[test]
    fn otp_code_must_be_six_digits() {
        assert!(validate_otp_code("123456").is_ok());
        assert!(validate_otp_code(" 123456 ").is_ok());
        assert!(validate_otp_code("12345").is_err());
        assert!(validate_otp_code("1234567").is_err());
        assert!(validate_otp_code("12345a").is_err());
        assert!(validate_otp_code("").is_err());
    }

    #[test]
    fn send_body_uses_phone_or_email_key() {
        let phone = Identifier::Phone("+919999999999".into());
        let body = serde_json::to_value(SendOtpBody::for_identifier(&phone)).unwrap();
        assert_eq!(body["phone_number"], "+919999999999");
        assert!(body.get("email").is_none());

        let email = Identifier::Email("ravi@example.com".into());
        let body = serde_json::to_value(SendOtpBody::for_identifier(&email)).unwrap();
        assert_eq!(body["email"], "ravi@example.com");
        assert!(body.get("phone_number").is_none());
    }

    #[test]
    fn verify_body_carries_challenge_and_identifier() {
        let challenge = challenge();
        let body = serde_json::to_value(VerifyOtpBody::new(&challenge, "123456")).unwrap();
        assert_eq!(body["otp_id"], "abc123");
        assert_eq!(body["otp"], "123456");
        assert_eq!(body["phone_number"], "+919999999999");
    }

    #[test]
    fn send_data_falls_back_to_local_masking() {
        let data = SendOtpData {
            otp_id: "abc123".into(),
            masked_phone: None,
            dev_hint: None,
        };
        let challenge = data.into_challenge(Identifier::Phone("+919999999999".into()));
        assert_eq!(challenge.masked_target.as_deref(), Some("+91****9999"));
    }

    #[test]
    fn verify_without_tokens_is_malformed() {
        let data: VerifyOtpData = serde_json::from_value(serde_json::json!({
            "user": {"id": "user_123"}
        }))
        .unwrap();
        let error = session_from_verify(data).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Serialization);
    }

    #[test]
    fn verify_without_user_is_malformed() {
        let data: VerifyOtpData = serde_json::from_value(serde_json::json!({
            "tokens": {"access_token": "a", "refresh_token": "r"}
        }))
        .unwrap();
        assert!(session_from_verify(data).is_err());
    }

    #[test]
    fn verify_with_empty_token_is_malformed() {
        let data: VerifyOtpData = serde_json::from_value(serde_json::json!({
            "user": {"id": "user_123"},
            "tokens": {"access_token": "", "refresh_token": "r"}
        }))
        .unwrap();
        assert!(session_from_verify(data).is_err());
    }

    #[test]
    fn verify_flattens_the_nested_profile() {
        let data: VerifyOtpData = serde_json::from_value(serde_json::json!({
            "user": {
                "id": "user_123",
                "phone_number": "+919999999999",
                "name": "Ravi",
                "profile": {"city": "Pune", "verified": true}
            },
            "tokens": {"access_token": "a", "refresh_token": "r"}
        }))
        .unwrap();
        let session = session_from_verify(data).unwrap();
        assert_eq!(session.user.city.as_deref(), Some("Pune"));
        assert!(session.user.is_verified);
        assert!(session.is_complete());
    }

    #[test]
    fn change_identifier_preserves_typed_input() {
        let mut flow = AuthFlow::opened(None);
        flow.identifier_input = "+919999999999".into();
        flow.phase = AuthPhase::OtpSent {
            challenge: challenge(),
        };
        flow.code_input = "123".into();

        flow.change_identifier();

        assert_eq!(flow.phase, AuthPhase::EnteringIdentifier);
        assert_eq!(flow.identifier_input, "+919999999999");
        assert!(flow.code_input.is_empty());
    }

    #[test]
    fn destination_defaults_to_home() {
        assert_eq!(AuthFlow::opened(None).destination(), Route::Home);
        assert_eq!(
            AuthFlow::opened(Some(Route::Sell)).destination(),
            Route::Sell
        );
    }

    #[test]
    fn admin_credentials_are_checked_locally() {
        assert!(validate_admin_credentials("admin@example.com", "secret").is_ok());
        assert!(validate_admin_credentials("", "secret").is_err());
        assert!(validate_admin_credentials("not-an-email", "secret").is_err());
        assert!(validate_admin_credentials("admin@example.com", "").is_err());
    }
}
