use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct SignUpDto {
    #[validate(length(min = 2, message = "First name must be at least 2 characters"))]
    pub first_name: String,

    #[validate(length(min = 2, message = "Last name must be at least 2 characters"))]
    pub last_name: String,

    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Please enter a valid email address")
    )]
    pub email: String,

    #[validate(length(min = 11, message = "Phone number must be at least 11 characters"))]
    pub phone_number: Option<String>,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,

    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub password_confirm: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct SignInDto {
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Please enter a valid email address")
    )]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Partial profile update; absent fields are left untouched.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateProfileDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 2, message = "First name must be at least 2 characters"))]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 2, message = "Last name must be at least 2 characters"))]
    pub last_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 11, message = "Phone number must be at least 11 characters"))]
    pub phone_number: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(url(message = "Profile image must be a valid URL"))]
    pub profile_image_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign_up() -> SignUpDto {
        SignUpDto {
            first_name: "Ada".into(),
            last_name: "Obi".into(),
            email: "ada@example.com".into(),
            phone_number: Some("08012345678".into()),
            password: "secret1".into(),
            password_confirm: "secret1".into(),
        }
    }

    #[test]
    fn test_valid_sign_up() {
        assert!(sign_up().validate().is_ok());
    }

    #[test]
    fn test_sign_up_password_mismatch() {
        let dto = SignUpDto { password_confirm: "secret2".into(), ..sign_up() };
        let errors = dto.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password_confirm"));
    }

    #[test]
    fn test_sign_up_short_phone() {
        let dto = SignUpDto { phone_number: Some("0801".into()), ..sign_up() };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn test_update_profile_skips_absent_fields() {
        let dto = UpdateProfileDto { bio: Some("Plumber".into()), ..Default::default() };
        assert!(dto.validate().is_ok());
        assert_eq!(serde_json::to_value(&dto).unwrap(), serde_json::json!({ "bio": "Plumber" }));
    }
}
