use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Loan period applied when a book is borrowed.
pub const BORROW_PERIOD_DAYS: i64 = 14;

/// Maximum number of books a single user may hold at once.
pub const MAX_BORROW_LIMIT: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "book_category"))]
pub enum Category {
    #[serde(rename = "CK")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "CK"))]
    Cooking,
    #[serde(rename = "CR")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "CR"))]
    Crime,
    #[serde(rename = "MY")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "MY"))]
    Mistery,
    #[serde(rename = "SF")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "SF"))]
    ScienceFiction,
    #[serde(rename = "FAN")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "FAN"))]
    Fantasy,
    #[serde(rename = "HIS")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "HIS"))]
    History,
    #[serde(rename = "ROM")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "ROM"))]
    Romance,
    #[serde(rename = "TXT")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "TXT"))]
    Textbook,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cooking => "Cooking",
            Self::Crime => "Crime",
            // Spelling kept as the catalog has always shown it.
            Self::Mistery => "Mistery",
            Self::ScienceFiction => "Science Fiction",
            Self::Fantasy => "Fantasy",
            Self::History => "History",
            Self::Romance => "Romance",
            Self::Textbook => "Textbook",
        }
    }

    pub const ALL: [Category; 8] = [
        Self::Cooking,
        Self::Crime,
        Self::Mistery,
        Self::ScienceFiction,
        Self::Fantasy,
        Self::History,
        Self::Romance,
        Self::Textbook,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "book_condition"))]
pub enum Condition {
    #[serde(rename = "NW")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "NW"))]
    New,
    #[serde(rename = "GD")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "GD"))]
    Good,
    #[serde(rename = "FR")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "FR"))]
    Fair,
    #[serde(rename = "PO")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "PO"))]
    Poor,
}

impl Condition {
    pub fn label(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
        }
    }

    pub const ALL: [Condition; 4] = [Self::New, Self::Good, Self::Fair, Self::Poor];
}

/// Catalog entry. Borrow-state fields (`borrower*`, `borrow_date`,
/// `due_date`, `available`) are only ever changed through the borrow and
/// return endpoints; the derived fields are recomputed against "today"
/// every time the book is serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub category: Category,
    pub category_display: String,
    pub condition: Condition,
    pub condition_display: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copy_number: Option<i32>,
    pub available: bool,
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_by_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub borrower: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub borrower_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub borrow_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // Derived loan fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_left: Option<i64>,
    pub overdue: bool,
    pub days_overdue: i64,
    pub due_today: bool,
}

impl Book {
    /// Recompute `days_left` / `overdue` / `days_overdue` / `due_today`
    /// against the given date. A book that is available (or has no due
    /// date) carries no loan-derived state.
    pub fn with_derived(mut self, today: NaiveDate) -> Self {
        match (self.available, self.due_date) {
            (false, Some(due)) => {
                let days_left = (due - today).num_days();
                self.days_left = Some(days_left);
                self.overdue = days_left < 0;
                self.days_overdue = if days_left < 0 { days_left.abs() } else { 0 };
                self.due_today = days_left == 0;
            }
            _ => {
                self.days_left = None;
                self.overdue = false;
                self.days_overdue = 0;
                self.due_today = false;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn book(available: bool, due_date: Option<NaiveDate>) -> Book {
        Book {
            id: Uuid::new_v4(),
            title: "The Test Book".into(),
            author: "Author One".into(),
            isbn: "978-3-16-148410-0".into(),
            category: Category::ScienceFiction,
            category_display: Category::ScienceFiction.label().into(),
            condition: Condition::Good,
            condition_display: Condition::Good.label().into(),
            language: "English".into(),
            publisher: None,
            publication_year: Some(2020),
            storage_location: None,
            copy_number: None,
            available,
            image_url: "/static/images/library_seal.jpg".into(),
            added_by: None,
            added_by_id: None,
            borrower: None,
            borrower_id: None,
            borrow_date: None,
            due_date,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            days_left: None,
            overdue: false,
            days_overdue: 0,
            due_today: false,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    #[test]
    fn available_book_has_no_loan_state() {
        let b = book(true, None).with_derived(today());
        assert_eq!(b.days_left, None);
        assert!(!b.overdue);
        assert_eq!(b.days_overdue, 0);
        assert!(!b.due_today);
    }

    #[test]
    fn borrowed_book_counts_days_left() {
        let due = today() + Duration::days(9);
        let b = book(false, Some(due)).with_derived(today());
        assert_eq!(b.days_left, Some(9));
        assert!(!b.overdue);
        assert_eq!(b.days_overdue, 0);
        assert!(!b.due_today);
    }

    #[test]
    fn due_today_is_flagged() {
        let b = book(false, Some(today())).with_derived(today());
        assert_eq!(b.days_left, Some(0));
        assert!(b.due_today);
        assert!(!b.overdue);
    }

    #[test]
    fn overdue_book_reports_days_overdue() {
        let due = today() - Duration::days(3);
        let b = book(false, Some(due)).with_derived(today());
        assert_eq!(b.days_left, Some(-3));
        assert!(b.overdue);
        assert_eq!(b.days_overdue, 3);
        assert!(!b.due_today);
    }

    #[test]
    fn stale_due_date_on_available_book_is_ignored() {
        // A returned book keeps no loan-derived state even if a due date
        // somehow survives in the row.
        let b = book(true, Some(today() - Duration::days(1))).with_derived(today());
        assert_eq!(b.days_left, None);
        assert!(!b.overdue);
    }

    #[test]
    fn category_codes_and_labels() {
        assert_eq!(
            serde_json::to_string(&Category::ScienceFiction).unwrap(),
            "\"SF\""
        );
        assert_eq!(Category::ScienceFiction.label(), "Science Fiction");
        let parsed: Category = serde_json::from_str("\"FAN\"").unwrap();
        assert_eq!(parsed, Category::Fantasy);
    }

    #[test]
    fn condition_codes_and_labels() {
        assert_eq!(serde_json::to_string(&Condition::New).unwrap(), "\"NW\"");
        let parsed: Condition = serde_json::from_str("\"PO\"").unwrap();
        assert_eq!(parsed, Condition::Poor);
        assert_eq!(parsed.label(), "Poor");
    }
}
