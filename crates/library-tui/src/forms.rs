//! Client-side form checks and the borrow-button rules. These run
//! before any request is issued; the backend remains authoritative.

use library_shared::{Book, Role};
use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 6;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"))
}

pub fn email_ok(email: &str) -> bool {
    email_regex().is_match(email)
}

/// Returns the first problem with the login form, if any.
pub fn login_error(username: &str, password: &str) -> Option<String> {
    if username.trim().is_empty() || password.is_empty() {
        return Some("Username and password are required".to_string());
    }
    None
}

/// Returns the first problem with the signup form, if any.
pub fn signup_error(
    username: &str,
    email: &str,
    password: &str,
    password2: &str,
) -> Option<String> {
    if username.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
        return Some("All fields are required".to_string());
    }
    if !email_ok(email) {
        return Some("Enter a valid email address".to_string());
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Some(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        ));
    }
    if password != password2 {
        return Some("Passwords do not match".to_string());
    }
    None
}

/// What the borrow control should do for a given book and viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowAction {
    /// Available: the viewer may borrow it.
    Borrow,
    /// The viewer holds this loan and may return it.
    Return,
    /// Staff may close someone else's loan.
    ReturnAsStaff,
    /// Checked out by someone else; nothing to do.
    Unavailable,
}

impl BorrowAction {
    pub fn for_book(book: &Book, viewer_id: Uuid, viewer_role: Role) -> Self {
        if book.available {
            Self::Borrow
        } else if book.borrower_id == Some(viewer_id) {
            Self::Return
        } else if viewer_role.is_staff() {
            Self::ReturnAsStaff
        } else {
            Self::Unavailable
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Borrow => "Borrow",
            Self::Return => "Return",
            Self::ReturnAsStaff => "Return (staff)",
            Self::Unavailable => "Borrowed",
        }
    }

    pub fn enabled(&self) -> bool {
        !matches!(self, Self::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use library_shared::{Category, Condition};

    fn book(available: bool, borrower_id: Option<Uuid>) -> Book {
        Book {
            id: Uuid::new_v4(),
            title: "T".into(),
            author: "A".into(),
            isbn: "1".into(),
            category: Category::Fantasy,
            category_display: "Fantasy".into(),
            condition: Condition::Good,
            condition_display: "Good".into(),
            language: "English".into(),
            publisher: None,
            publication_year: None,
            storage_location: None,
            copy_number: None,
            available,
            image_url: String::new(),
            added_by: None,
            added_by_id: None,
            borrower: None,
            borrower_id,
            borrow_date: None,
            due_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            days_left: None,
            overdue: false,
            days_overdue: 0,
            due_today: false,
        }
    }

    #[test]
    fn login_requires_both_fields() {
        assert!(login_error("", "pw").is_some());
        assert!(login_error("user", "").is_some());
        assert!(login_error("user", "pw").is_none());
    }

    #[test]
    fn signup_rejects_missing_fields_and_short_passwords() {
        assert!(signup_error("", "a@b.c", "Passw1", "Passw1").is_some());
        assert!(signup_error("user", "", "Passw1", "Passw1").is_some());
        assert!(signup_error("user", "a@b.c", "Pw1", "Pw1").is_some());
        assert!(signup_error("user", "not-an-email", "Passw1", "Passw1").is_some());
        assert!(signup_error("user", "a@b.c", "Passw1", "other").is_some());
        assert!(signup_error("user", "a@b.c", "Passw1", "Passw1").is_none());
    }

    #[test]
    fn available_book_offers_borrow() {
        let me = Uuid::new_v4();
        let action = BorrowAction::for_book(&book(true, None), me, Role::User);
        assert_eq!(action, BorrowAction::Borrow);
        assert!(action.enabled());
    }

    #[test]
    fn own_loan_offers_return() {
        let me = Uuid::new_v4();
        let action = BorrowAction::for_book(&book(false, Some(me)), me, Role::User);
        assert_eq!(action, BorrowAction::Return);
    }

    #[test]
    fn someone_elses_loan_is_disabled_for_regular_users() {
        let me = Uuid::new_v4();
        let action = BorrowAction::for_book(&book(false, Some(Uuid::new_v4())), me, Role::User);
        assert_eq!(action, BorrowAction::Unavailable);
        assert!(!action.enabled());
        assert_eq!(action.label(), "Borrowed");
    }

    #[test]
    fn staff_can_close_any_loan() {
        let me = Uuid::new_v4();
        for role in [Role::Admin, Role::Librarian] {
            let action = BorrowAction::for_book(&book(false, Some(Uuid::new_v4())), me, role);
            assert_eq!(action, BorrowAction::ReturnAsStaff);
            assert!(action.enabled());
        }
    }
}
