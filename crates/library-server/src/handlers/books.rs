use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use library_shared::api::{BookListParams, BorrowResponse, CreateBookRequest, UpdateBookRequest};
use library_shared::{Book, Category, Condition, BORROW_PERIOD_DAYS, MAX_BORROW_LIMIT};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::routes::AppState;
use crate::validation::validate_isbn;

#[derive(Debug, sqlx::FromRow)]
struct BookRow {
    id: Uuid,
    title: String,
    author: String,
    isbn: String,
    category: Category,
    condition: Condition,
    language: String,
    publisher: Option<String>,
    publication_year: Option<i32>,
    storage_location: Option<String>,
    copy_number: Option<i32>,
    available: bool,
    image_url: String,
    added_by: Option<Uuid>,
    added_by_username: Option<String>,
    borrower_id: Option<Uuid>,
    borrower_username: Option<String>,
    borrow_date: Option<NaiveDate>,
    due_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        Book {
            id: row.id,
            title: row.title,
            author: row.author,
            isbn: row.isbn,
            category: row.category,
            category_display: row.category.label().to_string(),
            condition: row.condition,
            condition_display: row.condition.label().to_string(),
            language: row.language,
            publisher: row.publisher,
            publication_year: row.publication_year,
            storage_location: row.storage_location,
            copy_number: row.copy_number,
            available: row.available,
            image_url: row.image_url,
            added_by: row.added_by_username,
            added_by_id: row.added_by,
            borrower: row.borrower_username,
            borrower_id: row.borrower_id,
            borrow_date: row.borrow_date,
            due_date: row.due_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
            days_left: None,
            overdue: false,
            days_overdue: 0,
            due_today: false,
        }
    }
}

const BOOK_COLUMNS: &str = r#"
    b.id, b.title, b.author, b.isbn, b.category, b.condition, b.language,
    b.publisher, b.publication_year, b.storage_location, b.copy_number,
    b.available, b.image_url,
    b.added_by, au.username AS added_by_username,
    b.borrower_id, bu.username AS borrower_username,
    b.borrow_date, b.due_date, b.created_at, b.updated_at
"#;

const BOOK_JOINS: &str = r#"
    FROM books b
    LEFT JOIN users au ON au.id = b.added_by
    LEFT JOIN users bu ON bu.id = b.borrower_id
"#;

fn into_book(row: BookRow) -> Book {
    Book::from(row).with_derived(Utc::now().date_naive())
}

async fn fetch_book(state: &AppState, id: Uuid) -> Result<Book, AppError> {
    let row: Option<BookRow> =
        sqlx::query_as(&format!("SELECT {BOOK_COLUMNS} {BOOK_JOINS} WHERE b.id = $1"))
            .bind(id)
            .fetch_optional(&state.db)
            .await?;

    row.map(into_book).ok_or(AppError::NotFound)
}

/// Unavailable books cannot be borrowed; users at the loan limit cannot
/// take out another book.
fn check_can_borrow(available: bool, active_loans: i64) -> Result<(), AppError> {
    if !available {
        return Err(AppError::Validation(
            "This book is currently unavailable".to_string(),
        ));
    }
    if active_loans >= MAX_BORROW_LIMIT {
        return Err(AppError::Validation(format!(
            "Borrow limit reached ({MAX_BORROW_LIMIT} books)"
        )));
    }
    Ok(())
}

/// A loan can be closed by the borrower themselves or by staff.
fn check_can_return(
    available: bool,
    borrower_id: Option<Uuid>,
    user: &AuthUser,
) -> Result<(), AppError> {
    if available {
        return Err(AppError::Validation(
            "This book is not currently borrowed".to_string(),
        ));
    }
    if borrower_id != Some(user.id) && !user.role.is_staff() {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// GET /api/books/
pub async fn list_books(
    State(state): State<AppState>,
    Query(params): Query<BookListParams>,
) -> Result<Json<Vec<Book>>, AppError> {
    let mut conditions: Vec<String> = Vec::new();
    let mut param_idx = 1;

    if params.category.is_some() {
        conditions.push(format!("b.category = ${param_idx}"));
        param_idx += 1;
    }
    if params.language.is_some() {
        conditions.push(format!("b.language ILIKE ${param_idx}"));
        param_idx += 1;
    }
    if params.available.is_some() {
        conditions.push(format!("b.available = ${param_idx}"));
        param_idx += 1;
    }
    if params.search.is_some() {
        conditions.push(format!(
            "(b.title ILIKE ${} OR b.author ILIKE ${} OR b.isbn ILIKE ${})",
            param_idx,
            param_idx + 1,
            param_idx + 2
        ));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    // Ordering is whitelisted; a leading '-' flips direction.
    let (column, direction) = match params.ordering.as_deref() {
        Some("title") => ("b.title", "ASC"),
        Some("-title") => ("b.title", "DESC"),
        Some("author") => ("b.author", "ASC"),
        Some("-author") => ("b.author", "DESC"),
        Some("publication_year") => ("b.publication_year", "ASC"),
        Some("-publication_year") => ("b.publication_year", "DESC"),
        Some("-created_at") => ("b.created_at", "DESC"),
        _ => ("b.created_at", "ASC"),
    };

    let query = format!(
        "SELECT {BOOK_COLUMNS} {BOOK_JOINS} {where_clause} ORDER BY {column} {direction}"
    );

    let mut builder = sqlx::query_as::<_, BookRow>(&query);

    if let Some(category) = params.category {
        builder = builder.bind(category);
    }
    if let Some(ref language) = params.language {
        builder = builder.bind(language.clone());
    }
    if let Some(available) = params.available {
        builder = builder.bind(available);
    }
    if let Some(ref search) = params.search {
        let pattern = format!("%{}%", search);
        builder = builder.bind(pattern.clone()).bind(pattern.clone()).bind(pattern);
    }

    let rows = builder.fetch_all(&state.db).await?;
    Ok(Json(rows.into_iter().map(into_book).collect()))
}

/// POST /api/books/ (admin/librarian only).
pub async fn create_book(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateBookRequest>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    if !user.role.can_manage_books() {
        return Err(AppError::Forbidden);
    }

    if req.title.trim().is_empty() {
        return Err(AppError::field("title", "Title is required"));
    }
    if req.author.trim().is_empty() {
        return Err(AppError::field("author", "Author is required"));
    }
    validate_isbn(&req.isbn)?;
    if req.language.trim().is_empty() {
        return Err(AppError::field("language", "Language is required"));
    }

    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM books WHERE isbn = $1")
        .bind(&req.isbn)
        .fetch_optional(&state.db)
        .await?;

    if existing.is_some() {
        return Err(AppError::field(
            "isbn",
            "A book with this ISBN already exists",
        ));
    }

    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO books (id, title, author, isbn, category, condition, language,
                           publisher, publication_year, storage_location, copy_number,
                           image_url, added_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                COALESCE($12, '/static/images/library_seal.jpg'), $13)
        "#,
    )
    .bind(id)
    .bind(&req.title)
    .bind(&req.author)
    .bind(&req.isbn)
    .bind(req.category)
    .bind(req.condition)
    .bind(&req.language)
    .bind(&req.publisher)
    .bind(req.publication_year)
    .bind(&req.storage_location)
    .bind(req.copy_number)
    .bind(&req.image_url)
    .bind(user.id)
    .execute(&state.db)
    .await?;

    let book = fetch_book(&state, id).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// GET /api/books/:id/
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Book>, AppError> {
    Ok(Json(fetch_book(&state, id).await?))
}

/// PATCH /api/books/:id/ (admin/librarian only). Borrow-state fields
/// are not writable here; they only change via borrow/return.
pub async fn update_book(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBookRequest>,
) -> Result<Json<Book>, AppError> {
    if !user.role.can_manage_books() {
        return Err(AppError::Forbidden);
    }

    if let Some(ref isbn) = req.isbn {
        validate_isbn(isbn)?;
        let taken: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM books WHERE isbn = $1 AND id != $2")
                .bind(isbn)
                .bind(id)
                .fetch_optional(&state.db)
                .await?;
        if taken.is_some() {
            return Err(AppError::field(
                "isbn",
                "A book with this ISBN already exists",
            ));
        }
    }

    let result = sqlx::query(
        r#"
        UPDATE books
        SET title = COALESCE($1, title),
            author = COALESCE($2, author),
            isbn = COALESCE($3, isbn),
            category = COALESCE($4, category),
            condition = COALESCE($5, condition),
            language = COALESCE($6, language),
            publisher = COALESCE($7, publisher),
            publication_year = COALESCE($8, publication_year),
            storage_location = COALESCE($9, storage_location),
            copy_number = COALESCE($10, copy_number),
            image_url = COALESCE($11, image_url),
            updated_at = NOW()
        WHERE id = $12
        "#,
    )
    .bind(&req.title)
    .bind(&req.author)
    .bind(&req.isbn)
    .bind(req.category)
    .bind(req.condition)
    .bind(&req.language)
    .bind(&req.publisher)
    .bind(req.publication_year)
    .bind(&req.storage_location)
    .bind(req.copy_number)
    .bind(&req.image_url)
    .bind(id)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(Json(fetch_book(&state, id).await?))
}

/// DELETE /api/books/:id/ (admin/librarian only).
pub async fn delete_book(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !user.role.can_manage_books() {
        return Err(AppError::Forbidden);
    }

    let result = sqlx::query("DELETE FROM books WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/books/:id/borrow/
pub async fn borrow_book(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<BorrowResponse>, AppError> {
    let mut tx = state.db.begin().await?;

    let row: Option<(bool,)> = sqlx::query_as("SELECT available FROM books WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

    let (available,) = row.ok_or(AppError::NotFound)?;

    // Lock the user's active loans too; concurrent borrows of different
    // books must serialize on the limit check.
    let loans: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM books WHERE borrower_id = $1 AND NOT available FOR UPDATE",
    )
    .bind(user.id)
    .fetch_all(&mut *tx)
    .await?;

    check_can_borrow(available, loans.len() as i64)?;

    let today = Utc::now().date_naive();
    let due = today + Duration::days(BORROW_PERIOD_DAYS);

    sqlx::query(
        r#"
        UPDATE books
        SET available = FALSE, borrower_id = $1, borrow_date = $2, due_date = $3,
            updated_at = NOW()
        WHERE id = $4
        "#,
    )
    .bind(user.id)
    .bind(today)
    .bind(due)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(book = %id, user = %user.username, %due, "book borrowed");

    let book = fetch_book(&state, id).await?;
    Ok(Json(BorrowResponse {
        message: "Book borrowed successfully".to_string(),
        book,
    }))
}

/// POST /api/books/:id/return/
pub async fn return_book(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<BorrowResponse>, AppError> {
    let mut tx = state.db.begin().await?;

    let row: Option<(bool, Option<Uuid>)> =
        sqlx::query_as("SELECT available, borrower_id FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

    let (available, borrower_id) = row.ok_or(AppError::NotFound)?;

    check_can_return(available, borrower_id, &user)?;

    sqlx::query(
        r#"
        UPDATE books
        SET available = TRUE, borrower_id = NULL, borrow_date = NULL, due_date = NULL,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(book = %id, user = %user.username, "book returned");

    let book = fetch_book(&state, id).await?;
    Ok(Json(BorrowResponse {
        message: "Book returned successfully".to_string(),
        book,
    }))
}

/// GET /api/books/borrowed/ lists own loans; staff see every active loan.
pub async fn borrowed_books(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Book>>, AppError> {
    let rows: Vec<BookRow> = if user.role.is_staff() {
        sqlx::query_as(&format!(
            "SELECT {BOOK_COLUMNS} {BOOK_JOINS} WHERE NOT b.available ORDER BY b.due_date"
        ))
        .fetch_all(&state.db)
        .await?
    } else {
        sqlx::query_as(&format!(
            "SELECT {BOOK_COLUMNS} {BOOK_JOINS} WHERE b.borrower_id = $1 AND NOT b.available ORDER BY b.due_date"
        ))
        .bind(user.id)
        .fetch_all(&state.db)
        .await?
    };

    Ok(Json(rows.into_iter().map(into_book).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use library_shared::Role;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            username: "tester".into(),
            role,
        }
    }

    #[test]
    fn borrow_rejected_when_unavailable() {
        let err = check_can_borrow(false, 0).unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("unavailable")));
    }

    #[test]
    fn borrow_rejected_at_limit() {
        let err = check_can_borrow(true, MAX_BORROW_LIMIT).unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("limit reached")));
    }

    #[test]
    fn borrow_allowed_below_limit() {
        assert!(check_can_borrow(true, MAX_BORROW_LIMIT - 1).is_ok());
        assert!(check_can_borrow(true, 0).is_ok());
    }

    #[test]
    fn return_rejected_when_not_borrowed() {
        let u = user(Role::User);
        let err = check_can_return(true, None, &u).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn borrower_can_return_own_loan() {
        let u = user(Role::User);
        assert!(check_can_return(false, Some(u.id), &u).is_ok());
    }

    #[test]
    fn stranger_cannot_return_someone_elses_loan() {
        let u = user(Role::User);
        let err = check_can_return(false, Some(Uuid::new_v4()), &u).unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[test]
    fn staff_can_return_any_loan() {
        for role in [Role::Admin, Role::Librarian] {
            let u = user(role);
            assert!(check_can_return(false, Some(Uuid::new_v4()), &u).is_ok());
        }
    }
}
