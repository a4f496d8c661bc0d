//! Ingress normalization and field validation for wire payloads.
//!
//! Wire messages model "field not set" as an empty string. That convention
//! stops at this boundary: every optional field is coerced to an explicit
//! `Option` here, so internal logic never re-interprets empty strings as
//! business-meaningful values.

use serde_json::json;

use crate::domain::{AccountValidationError, EmailAddress, Error, Login};

/// Newtype for wire field names, keeping detail payloads consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldName(&'static str);

impl FieldName {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self(name)
    }

    fn as_str(self) -> &'static str {
        self.0
    }
}

/// Map a wire-level empty string to an absent value.
pub(crate) fn normalize_optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Require a field that the wire may have sent as empty.
pub(crate) fn require_field(value: Option<String>, field: FieldName) -> Result<String, Error> {
    normalize_optional(value).ok_or_else(|| missing_field_error(field))
}

pub(crate) fn missing_field_error(field: FieldName) -> Error {
    let name = field.as_str();
    Error::invalid_argument(format!("missing required field: {name}")).with_details(json!({
        "field": name,
        "code": "missing_field",
    }))
}

fn invalid_field_error(field: FieldName, err: &AccountValidationError) -> Error {
    Error::invalid_argument(err.to_string()).with_details(json!({
        "field": field.as_str(),
        "code": "invalid_value",
    }))
}

/// Parse a required login field, normalizing case.
pub(crate) fn parse_login(value: Option<String>, field: FieldName) -> Result<Login, Error> {
    let raw = require_field(value, field)?;
    Login::new(raw).map_err(|err| invalid_field_error(field, &err))
}

/// Parse a required e-mail field, normalizing case.
pub(crate) fn parse_email(value: Option<String>, field: FieldName) -> Result<EmailAddress, Error> {
    let raw = require_field(value, field)?;
    EmailAddress::new(raw).map_err(|err| invalid_field_error(field, &err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::rstest;

    #[rstest]
    #[case(None, None)]
    #[case(Some(String::new()), None)]
    #[case(Some("value".to_owned()), Some("value"))]
    fn empty_strings_become_absent(#[case] input: Option<String>, #[case] expected: Option<&str>) {
        assert_eq!(normalize_optional(input).as_deref(), expected);
    }

    #[test]
    fn missing_required_field_is_tagged() {
        let err = require_field(Some(String::new()), FieldName::new("email"))
            .expect_err("empty required field must fail");
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        assert_eq!(
            err.details().and_then(|d| d["field"].as_str()),
            Some("email")
        );
    }

    #[test]
    fn parse_login_normalizes_case() {
        let login = parse_login(Some("Alice".to_owned()), FieldName::new("login"))
            .expect("valid login");
        assert_eq!(login.as_ref(), "alice");
    }

    #[test]
    fn parse_email_rejects_malformed_addresses() {
        let err = parse_email(Some("not-an-address".to_owned()), FieldName::new("email"))
            .expect_err("malformed email must fail");
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }
}
