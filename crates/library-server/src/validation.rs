//! Input validation shared by registration and profile updates.
//! Rules mirror what the signup form promises the user.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::AppError;

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 6;
const MIN_AGE: i32 = 16;
// Hyphenated ISBN-13 ("978-3-16-148410-0") is 17 characters; the column
// is sized to match.
const MAX_ISBN_LEN: usize = 17;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"))
}

pub fn validate_username(username: &str) -> Result<(), AppError> {
    if username.trim().is_empty() {
        return Err(AppError::field("username", "Username is required"));
    }
    if username.len() < MIN_USERNAME_LEN {
        return Err(AppError::field(
            "username",
            format!("Username must be at least {MIN_USERNAME_LEN} characters long"),
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.is_empty() {
        return Err(AppError::field("password", "Password is required"));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::field(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters long"),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase())
        || !password.chars().any(|c| c.is_ascii_digit())
    {
        return Err(AppError::field(
            "password",
            "Password must contain at least one uppercase letter and one number",
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    if email.trim().is_empty() {
        return Err(AppError::field("email", "Email is required"));
    }
    if !email_regex().is_match(email) {
        return Err(AppError::field("email", "Enter a valid email address"));
    }
    Ok(())
}

pub fn validate_isbn(isbn: &str) -> Result<(), AppError> {
    if isbn.trim().is_empty() {
        return Err(AppError::field("isbn", "ISBN is required"));
    }
    if isbn.len() > MAX_ISBN_LEN {
        return Err(AppError::field(
            "isbn",
            format!("ISBN must be at most {MAX_ISBN_LEN} characters long"),
        ));
    }
    // ISBN-10 check digits may be 'X'.
    if !isbn
        .chars()
        .all(|c| c.is_ascii_digit() || c == '-' || c.eq_ignore_ascii_case(&'X'))
    {
        return Err(AppError::field(
            "isbn",
            "ISBN may only contain digits, hyphens and X",
        ));
    }
    Ok(())
}

pub fn validate_age(age: i32) -> Result<(), AppError> {
    if age < MIN_AGE {
        return Err(AppError::field(
            "age",
            format!("You must be at least {MIN_AGE} years old to register"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert!(validate_username("bob").is_ok());
        assert!(validate_username("bo").is_err());
        assert!(validate_username("").is_err());
        assert!(validate_username("   ").is_err());
    }

    #[test]
    fn password_needs_length_uppercase_and_digit() {
        assert!(validate_password("Passw1").is_ok());
        assert!(validate_password("").is_err());
        assert!(validate_password("Pw1").is_err()); // too short
        assert!(validate_password("password1").is_err()); // no uppercase
        assert!(validate_password("Password").is_err()); // no digit
    }

    #[test]
    fn email_format() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("a b@c.com").is_err());
    }

    #[test]
    fn isbn_length_and_charset() {
        assert!(validate_isbn("978-3-16-148410-0").is_ok());
        assert!(validate_isbn("9783161484100").is_ok());
        assert!(validate_isbn("0-19-852663-X").is_ok());
        assert!(validate_isbn("").is_err());
        assert!(validate_isbn("   ").is_err());
        assert!(validate_isbn("978-3-16-148410-0-extra").is_err()); // too long
        assert!(validate_isbn("not-an-isbn").is_err());
    }

    #[test]
    fn minimum_age() {
        assert!(validate_age(16).is_ok());
        assert!(validate_age(99).is_ok());
        assert!(validate_age(15).is_err());
    }
}
