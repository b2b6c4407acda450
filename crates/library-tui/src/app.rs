use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use library_shared::api::{
    BookListParams, CreateBookRequest, RegisterRequest, UpdateBookRequest, UpdateUserRequest,
};
use library_shared::{Book, Category, Condition, User};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::api::ApiClient;
use crate::forms::{login_error, signup_error, BorrowAction};

/// Avatar paths served by the backend under /static.
pub const AVATARS: [&str; 16] = [
    "/static/images/avatars/default.svg",
    "/static/images/avatars/account-avatar-profile-user-2-svgrepo-com.svg",
    "/static/images/avatars/account-avatar-profile-user-3-svgrepo-com.svg",
    "/static/images/avatars/account-avatar-profile-user-4-svgrepo-com.svg",
    "/static/images/avatars/account-avatar-profile-user-5-svgrepo-com.svg",
    "/static/images/avatars/account-avatar-profile-user-6-svgrepo-com.svg",
    "/static/images/avatars/account-avatar-profile-user-7-svgrepo-com.svg",
    "/static/images/avatars/account-avatar-profile-user-8-svgrepo-com.svg",
    "/static/images/avatars/account-avatar-profile-user-9-svgrepo-com.svg",
    "/static/images/avatars/account-avatar-profile-user-10-svgrepo-com.svg",
    "/static/images/avatars/account-avatar-profile-user-11-svgrepo-com.svg",
    "/static/images/avatars/account-avatar-profile-user-12-svgrepo-com.svg",
    "/static/images/avatars/account-avatar-profile-user-13-svgrepo-com.svg",
    "/static/images/avatars/account-avatar-profile-user-14-svgrepo-com.svg",
    "/static/images/avatars/account-avatar-profile-user-15-svgrepo-com.svg",
    "/static/images/avatars/account-avatar-profile-user-16-svgrepo-com.svg",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Login,
    Catalog,
    BookDetail,
    BookForm,
    Borrowed,
    Profile,
    Users,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VimMode {
    Normal,
    Insert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    SignUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthField {
    Username,
    Email,
    Password,
    Password2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookField {
    Title,
    Author,
    Isbn,
    Language,
    PublicationYear,
    Publisher,
    Category,
    Condition,
}

impl BookField {
    const ORDER: [BookField; 8] = [
        BookField::Title,
        BookField::Author,
        BookField::Isbn,
        BookField::Language,
        BookField::PublicationYear,
        BookField::Publisher,
        BookField::Category,
        BookField::Condition,
    ];

    pub fn next(self) -> Self {
        let idx = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        Self::ORDER[(idx + 1) % Self::ORDER.len()]
    }

    pub fn prev(self) -> Self {
        let idx = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        Self::ORDER[(idx + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    FirstName,
    LastName,
    Email,
    Age,
    Password,
    Avatar,
}

impl ProfileField {
    const ORDER: [ProfileField; 6] = [
        ProfileField::FirstName,
        ProfileField::LastName,
        ProfileField::Email,
        ProfileField::Age,
        ProfileField::Password,
        ProfileField::Avatar,
    ];

    pub fn next(self) -> Self {
        let idx = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        Self::ORDER[(idx + 1) % Self::ORDER.len()]
    }

    pub fn prev(self) -> Self {
        let idx = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        Self::ORDER[(idx + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }
}

/// Add/edit book form. `editing` holds the target id when editing.
#[derive(Debug, Default)]
pub struct BookForm {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub language: String,
    pub publication_year: String,
    pub publisher: String,
    pub category_idx: usize,
    pub condition_idx: usize,
    pub editing: Option<Uuid>,
}

impl BookForm {
    pub fn from_book(book: &Book) -> Self {
        Self {
            title: book.title.clone(),
            author: book.author.clone(),
            isbn: book.isbn.clone(),
            language: book.language.clone(),
            publication_year: book
                .publication_year
                .map(|y| y.to_string())
                .unwrap_or_default(),
            publisher: book.publisher.clone().unwrap_or_default(),
            category_idx: Category::ALL
                .iter()
                .position(|c| *c == book.category)
                .unwrap_or(0),
            condition_idx: Condition::ALL
                .iter()
                .position(|c| *c == book.condition)
                .unwrap_or(0),
            editing: Some(book.id),
        }
    }

    pub fn category(&self) -> Category {
        Category::ALL[self.category_idx % Category::ALL.len()]
    }

    pub fn condition(&self) -> Condition {
        Condition::ALL[self.condition_idx % Condition::ALL.len()]
    }
}

#[derive(Debug, Default)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub age: String,
    pub password: String,
    pub avatar_idx: usize,
}

impl ProfileForm {
    pub fn from_user(user: &User) -> Self {
        let avatar_url = user
            .profile
            .as_ref()
            .and_then(|p| p.avatar_url.as_deref())
            .unwrap_or(AVATARS[0]);

        Self {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            age: user
                .profile
                .as_ref()
                .and_then(|p| p.age)
                .map(|a| a.to_string())
                .unwrap_or_default(),
            password: String::new(),
            avatar_idx: AVATARS.iter().position(|a| *a == avatar_url).unwrap_or(0),
        }
    }

    pub fn avatar_url(&self) -> &'static str {
        AVATARS[self.avatar_idx % AVATARS.len()]
    }
}

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Tick,
    AuthSuccess,
    AuthFailed(String),
}

pub struct App {
    pub api: ApiClient,
    pub view: View,
    pub vim_mode: VimMode,

    // Loading state
    pub loading: bool,
    pub loading_message: String,
    pub error_message: Option<String>,
    pub status_message: Option<String>,

    // Current user
    pub user: Option<User>,

    // Login/SignUp form
    pub auth_mode: AuthMode,
    pub auth_username: String,
    pub auth_email: String,
    pub auth_password: String,
    pub auth_password2: String,
    pub auth_field: AuthField,

    // Catalog
    pub books: Vec<Book>,
    pub selected_book_idx: usize,
    pub search_query: String,
    pub searching: bool,

    // Book add/edit form
    pub book_form: BookForm,
    pub book_field: BookField,

    // Borrowed list
    pub borrowed: Vec<Book>,
    pub selected_borrowed_idx: usize,

    // Profile
    pub profile_form: ProfileForm,
    pub profile_field: ProfileField,

    // User management (admin)
    pub users: Vec<User>,
    pub selected_user_idx: usize,
    pub confirm_delete: bool,
}

impl App {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            view: View::Login,
            vim_mode: VimMode::Normal,
            loading: false,
            loading_message: String::new(),
            error_message: None,
            status_message: None,
            user: None,
            auth_mode: AuthMode::Login,
            auth_username: String::new(),
            auth_email: String::new(),
            auth_password: String::new(),
            auth_password2: String::new(),
            auth_field: AuthField::Username,
            books: Vec::new(),
            selected_book_idx: 0,
            search_query: String::new(),
            searching: false,
            book_form: BookForm::default(),
            book_field: BookField::Title,
            borrowed: Vec::new(),
            selected_borrowed_idx: 0,
            profile_form: ProfileForm::default(),
            profile_field: ProfileField::FirstName,
            users: Vec::new(),
            selected_user_idx: 0,
            confirm_delete: false,
        }
    }

    pub fn set_loading(&mut self, loading: bool, message: &str) {
        self.loading = loading;
        self.loading_message = message.to_string();
    }

    pub fn set_error(&mut self, message: String) {
        self.error_message = Some(message);
    }

    pub fn clear_error(&mut self) {
        self.error_message = None;
    }

    pub fn set_status(&mut self, message: String) {
        self.status_message = Some(message);
    }

    pub fn is_staff(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.role().is_staff())
    }

    pub fn is_admin(&self) -> bool {
        self.user
            .as_ref()
            .is_some_and(|u| u.role().can_manage_users())
    }

    pub fn selected_book(&self) -> Option<&Book> {
        self.books.get(self.selected_book_idx)
    }

    /// What the borrow key does for the selected book, given who is
    /// looking at it.
    pub fn borrow_action(&self, book: &Book) -> Option<BorrowAction> {
        let user = self.user.as_ref()?;
        Some(BorrowAction::for_book(book, user.id, user.role()))
    }

    /// Handle key events, returns true if app should quit
    pub async fn handle_key(&mut self, key: KeyEvent, tx: mpsc::Sender<AppEvent>) -> Result<bool> {
        // Clear transient messages on any key press
        if self.error_message.is_some() && key.code != KeyCode::Esc {
            self.clear_error();
        }
        if self.status_message.is_some() {
            self.status_message = None;
        }

        // Global quit with Ctrl+C
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Ok(true);
        }

        match self.view {
            View::Login => self.handle_login_key(key, tx).await,
            View::Catalog => self.handle_catalog_key(key).await,
            View::BookDetail => self.handle_detail_key(key).await,
            View::BookForm => self.handle_book_form_key(key).await,
            View::Borrowed => self.handle_borrowed_key(key).await,
            View::Profile => self.handle_profile_key(key).await,
            View::Users => self.handle_users_key(key).await,
        }
    }

    // ============ Login / Sign up ============

    async fn handle_login_key(
        &mut self,
        key: KeyEvent,
        tx: mpsc::Sender<AppEvent>,
    ) -> Result<bool> {
        if self.loading {
            return Ok(false);
        }

        match key.code {
            KeyCode::Char('q') if self.vim_mode == VimMode::Normal => return Ok(true),
            KeyCode::Esc => {
                if self.vim_mode == VimMode::Insert {
                    self.vim_mode = VimMode::Normal;
                }
            }
            KeyCode::Char('i') if self.vim_mode == VimMode::Normal => {
                self.vim_mode = VimMode::Insert;
            }
            KeyCode::Char('s') if self.vim_mode == VimMode::Normal => {
                self.auth_mode = AuthMode::SignUp;
                self.auth_field = AuthField::Username;
            }
            KeyCode::Char('l') if self.vim_mode == VimMode::Normal => {
                self.auth_mode = AuthMode::Login;
                self.auth_field = AuthField::Username;
            }
            KeyCode::Tab | KeyCode::BackTab => {
                self.auth_field = match (self.auth_mode, self.auth_field) {
                    (AuthMode::Login, AuthField::Username) => AuthField::Password,
                    (AuthMode::Login, _) => AuthField::Username,
                    (AuthMode::SignUp, AuthField::Username) => AuthField::Email,
                    (AuthMode::SignUp, AuthField::Email) => AuthField::Password,
                    (AuthMode::SignUp, AuthField::Password) => AuthField::Password2,
                    (AuthMode::SignUp, AuthField::Password2) => AuthField::Username,
                };
            }
            KeyCode::Char('j') | KeyCode::Down if self.vim_mode == VimMode::Normal => {
                self.auth_field = match (self.auth_mode, self.auth_field) {
                    (AuthMode::Login, AuthField::Username) => AuthField::Password,
                    (AuthMode::SignUp, AuthField::Username) => AuthField::Email,
                    (AuthMode::SignUp, AuthField::Email) => AuthField::Password,
                    (AuthMode::SignUp, AuthField::Password) => AuthField::Password2,
                    _ => self.auth_field,
                };
            }
            KeyCode::Char('k') | KeyCode::Up if self.vim_mode == VimMode::Normal => {
                self.auth_field = match (self.auth_mode, self.auth_field) {
                    (AuthMode::Login, AuthField::Password) => AuthField::Username,
                    (AuthMode::SignUp, AuthField::Email) => AuthField::Username,
                    (AuthMode::SignUp, AuthField::Password) => AuthField::Email,
                    (AuthMode::SignUp, AuthField::Password2) => AuthField::Password,
                    _ => self.auth_field,
                };
            }
            KeyCode::Enter => match self.auth_mode {
                AuthMode::Login => {
                    if let Some(msg) = login_error(&self.auth_username, &self.auth_password) {
                        self.set_error(msg);
                    } else {
                        self.do_login(tx).await;
                    }
                }
                AuthMode::SignUp => {
                    if let Some(msg) = signup_error(
                        &self.auth_username,
                        &self.auth_email,
                        &self.auth_password,
                        &self.auth_password2,
                    ) {
                        self.set_error(msg);
                    } else {
                        self.do_register(tx).await;
                    }
                }
            },
            KeyCode::Char(c) if self.vim_mode == VimMode::Insert => match self.auth_field {
                AuthField::Username => self.auth_username.push(c),
                AuthField::Email => self.auth_email.push(c),
                AuthField::Password => self.auth_password.push(c),
                AuthField::Password2 => self.auth_password2.push(c),
            },
            KeyCode::Backspace if self.vim_mode == VimMode::Insert => match self.auth_field {
                AuthField::Username => {
                    self.auth_username.pop();
                }
                AuthField::Email => {
                    self.auth_email.pop();
                }
                AuthField::Password => {
                    self.auth_password.pop();
                }
                AuthField::Password2 => {
                    self.auth_password2.pop();
                }
            },
            _ => {}
        }

        Ok(false)
    }

    async fn do_login(&mut self, tx: mpsc::Sender<AppEvent>) {
        self.set_loading(true, "Logging in...");

        let username = self.auth_username.clone();
        let password = self.auth_password.clone();

        match self.api.login(&username, &password).await {
            Ok(user) => {
                self.user = Some(user);
                let _ = tx.send(AppEvent::AuthSuccess).await;
            }
            Err(e) => {
                let _ = tx.send(AppEvent::AuthFailed(e.to_string())).await;
            }
        }

        self.set_loading(false, "");
    }

    async fn do_register(&mut self, tx: mpsc::Sender<AppEvent>) {
        self.set_loading(true, "Creating account...");

        let req = RegisterRequest {
            username: self.auth_username.clone(),
            email: self.auth_email.clone(),
            password: self.auth_password.clone(),
            password2: self.auth_password2.clone(),
            first_name: None,
            last_name: None,
            role: None,
            age: None,
        };

        match self.api.register(&req).await {
            // Registration does not open a session; log in with the
            // same credentials right away.
            Ok(_) => match self
                .api
                .login(&self.auth_username.clone(), &self.auth_password.clone())
                .await
            {
                Ok(user) => {
                    self.user = Some(user);
                    let _ = tx.send(AppEvent::AuthSuccess).await;
                }
                Err(e) => {
                    let _ = tx.send(AppEvent::AuthFailed(e.to_string())).await;
                }
            },
            Err(e) => {
                self.set_error(format!("Registration failed: {}", e));
            }
        }

        self.set_loading(false, "");
    }

    pub async fn on_auth_success(&mut self) {
        self.auth_password.clear();
        self.auth_password2.clear();
        self.view = View::Catalog;
        self.load_books().await;
    }

    pub fn on_auth_failed(&mut self, msg: String) {
        self.set_error(format!("Login failed: {}", msg));
        self.auth_password.clear();
        self.auth_password2.clear();
    }

    async fn do_logout(&mut self) {
        let _ = self.api.logout().await;
        self.user = None;
        self.books.clear();
        self.borrowed.clear();
        self.users.clear();
        self.search_query.clear();
        self.selected_book_idx = 0;
        self.view = View::Login;
    }

    // ============ Catalog ============

    async fn handle_catalog_key(&mut self, key: KeyEvent) -> Result<bool> {
        if self.loading {
            return Ok(false);
        }

        // Typing into the search bar
        if self.searching {
            match key.code {
                KeyCode::Esc => {
                    self.searching = false;
                    self.search_query.clear();
                    self.load_books().await;
                }
                KeyCode::Enter => {
                    self.searching = false;
                    self.load_books().await;
                }
                KeyCode::Char(c) => {
                    self.search_query.push(c);
                }
                KeyCode::Backspace => {
                    self.search_query.pop();
                }
                _ => {}
            }
            return Ok(false);
        }

        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('L') => self.do_logout().await,
            KeyCode::Char('r') => self.load_books().await,
            KeyCode::Char('/') => {
                self.searching = true;
                self.search_query.clear();
            }
            KeyCode::Char('j') | KeyCode::Down => {
                if self.selected_book_idx < self.books.len().saturating_sub(1) {
                    self.selected_book_idx += 1;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if self.selected_book_idx > 0 {
                    self.selected_book_idx -= 1;
                }
            }
            KeyCode::Enter => {
                if self.selected_book().is_some() {
                    self.view = View::BookDetail;
                }
            }
            KeyCode::Char('b') => {
                self.view = View::Borrowed;
                self.selected_borrowed_idx = 0;
                self.load_borrowed().await;
            }
            KeyCode::Char('p') => {
                if let Some(user) = &self.user {
                    self.profile_form = ProfileForm::from_user(user);
                    self.profile_field = ProfileField::FirstName;
                    self.view = View::Profile;
                }
            }
            KeyCode::Char('u') if self.is_admin() => {
                self.view = View::Users;
                self.selected_user_idx = 0;
                self.confirm_delete = false;
                self.load_users().await;
            }
            KeyCode::Char('a') if self.is_staff() => {
                self.book_form = BookForm::default();
                self.book_field = BookField::Title;
                self.vim_mode = VimMode::Normal;
                self.view = View::BookForm;
            }
            KeyCode::Char('e') if self.is_staff() => {
                if let Some(book) = self.selected_book() {
                    self.book_form = BookForm::from_book(book);
                    self.book_field = BookField::Title;
                    self.vim_mode = VimMode::Normal;
                    self.view = View::BookForm;
                }
            }
            KeyCode::Char('d') if self.is_staff() => {
                if let Some(book) = self.selected_book() {
                    let id = book.id;
                    self.do_delete_book(id).await;
                }
            }
            _ => {}
        }

        Ok(false)
    }

    async fn load_books(&mut self) {
        self.set_loading(true, "Loading catalog...");

        let params = BookListParams {
            category: None,
            language: None,
            available: None,
            search: if self.search_query.is_empty() {
                None
            } else {
                Some(self.search_query.clone())
            },
            ordering: Some("title".to_string()),
        };

        match self.api.list_books(&params).await {
            Ok(books) => {
                self.books = books;
                if self.selected_book_idx >= self.books.len() {
                    self.selected_book_idx = self.books.len().saturating_sub(1);
                }
            }
            Err(e) => self.set_error(format!("Failed to load books: {}", e)),
        }

        self.set_loading(false, "");
    }

    async fn do_delete_book(&mut self, id: Uuid) {
        self.set_loading(true, "Deleting book...");

        match self.api.delete_book(id).await {
            Ok(()) => {
                self.set_status("Book deleted".to_string());
                self.load_books().await;
            }
            Err(e) => self.set_error(format!("Failed to delete book: {}", e)),
        }

        self.set_loading(false, "");
    }

    // ============ Book detail ============

    async fn handle_detail_key(&mut self, key: KeyEvent) -> Result<bool> {
        if self.loading {
            return Ok(false);
        }

        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Esc | KeyCode::Backspace => self.view = View::Catalog,
            KeyCode::Char('b') | KeyCode::Enter => {
                let Some(book) = self.selected_book() else {
                    return Ok(false);
                };
                let Some(action) = self.borrow_action(book) else {
                    return Ok(false);
                };
                let id = book.id;

                match action {
                    BorrowAction::Borrow => self.do_borrow(id).await,
                    BorrowAction::Return | BorrowAction::ReturnAsStaff => self.do_return(id).await,
                    BorrowAction::Unavailable => {}
                }
            }
            KeyCode::Char('e') if self.is_staff() => {
                if let Some(book) = self.selected_book() {
                    self.book_form = BookForm::from_book(book);
                    self.book_field = BookField::Title;
                    self.vim_mode = VimMode::Normal;
                    self.view = View::BookForm;
                }
            }
            KeyCode::Char('d') if self.is_staff() => {
                if let Some(book) = self.selected_book() {
                    let id = book.id;
                    self.do_delete_book(id).await;
                    self.view = View::Catalog;
                }
            }
            _ => {}
        }

        Ok(false)
    }

    async fn do_borrow(&mut self, id: Uuid) {
        self.set_loading(true, "Borrowing...");

        match self.api.borrow_book(id).await {
            Ok(response) => {
                self.set_status(response.message);
                self.replace_book(response.book);
            }
            Err(e) => self.set_error(e.to_string()),
        }

        self.set_loading(false, "");
    }

    async fn do_return(&mut self, id: Uuid) {
        self.set_loading(true, "Returning...");

        match self.api.return_book(id).await {
            Ok(response) => {
                self.set_status(response.message);
                self.replace_book(response.book);
            }
            Err(e) => self.set_error(e.to_string()),
        }

        self.set_loading(false, "");
    }

    fn replace_book(&mut self, updated: Book) {
        if let Some(slot) = self.books.iter_mut().find(|b| b.id == updated.id) {
            *slot = updated;
        }
    }

    // ============ Book form ============

    async fn handle_book_form_key(&mut self, key: KeyEvent) -> Result<bool> {
        if self.loading {
            return Ok(false);
        }

        match key.code {
            KeyCode::Esc => {
                if self.vim_mode == VimMode::Insert {
                    self.vim_mode = VimMode::Normal;
                } else {
                    self.view = View::Catalog;
                }
            }
            KeyCode::Char('q') if self.vim_mode == VimMode::Normal => return Ok(true),
            KeyCode::Char('i') if self.vim_mode == VimMode::Normal => {
                self.vim_mode = VimMode::Insert;
            }
            KeyCode::Tab | KeyCode::Char('j') | KeyCode::Down
                if key.code == KeyCode::Tab || self.vim_mode == VimMode::Normal =>
            {
                self.book_field = self.book_field.next();
            }
            KeyCode::BackTab | KeyCode::Char('k') | KeyCode::Up
                if key.code == KeyCode::BackTab || self.vim_mode == VimMode::Normal =>
            {
                self.book_field = self.book_field.prev();
            }
            KeyCode::Left | KeyCode::Char('h')
                if key.code == KeyCode::Left || self.vim_mode == VimMode::Normal =>
            {
                match self.book_field {
                    BookField::Category => {
                        self.book_form.category_idx = (self.book_form.category_idx
                            + Category::ALL.len()
                            - 1)
                            % Category::ALL.len();
                    }
                    BookField::Condition => {
                        self.book_form.condition_idx = (self.book_form.condition_idx
                            + Condition::ALL.len()
                            - 1)
                            % Condition::ALL.len();
                    }
                    _ => {}
                }
            }
            KeyCode::Right | KeyCode::Char('l')
                if key.code == KeyCode::Right || self.vim_mode == VimMode::Normal =>
            {
                match self.book_field {
                    BookField::Category => {
                        self.book_form.category_idx =
                            (self.book_form.category_idx + 1) % Category::ALL.len();
                    }
                    BookField::Condition => {
                        self.book_form.condition_idx =
                            (self.book_form.condition_idx + 1) % Condition::ALL.len();
                    }
                    _ => {}
                }
            }
            KeyCode::Enter => self.do_save_book().await,
            KeyCode::Char(c) if self.vim_mode == VimMode::Insert => {
                if let Some(field) = self.book_text_field() {
                    field.push(c);
                }
            }
            KeyCode::Backspace if self.vim_mode == VimMode::Insert => {
                if let Some(field) = self.book_text_field() {
                    field.pop();
                }
            }
            _ => {}
        }

        Ok(false)
    }

    fn book_text_field(&mut self) -> Option<&mut String> {
        match self.book_field {
            BookField::Title => Some(&mut self.book_form.title),
            BookField::Author => Some(&mut self.book_form.author),
            BookField::Isbn => Some(&mut self.book_form.isbn),
            BookField::Language => Some(&mut self.book_form.language),
            BookField::PublicationYear => Some(&mut self.book_form.publication_year),
            BookField::Publisher => Some(&mut self.book_form.publisher),
            BookField::Category | BookField::Condition => None,
        }
    }

    async fn do_save_book(&mut self) {
        if self.book_form.title.trim().is_empty()
            || self.book_form.author.trim().is_empty()
            || self.book_form.isbn.trim().is_empty()
        {
            self.set_error("Title, author and ISBN are required".to_string());
            return;
        }

        let publication_year = if self.book_form.publication_year.trim().is_empty() {
            None
        } else {
            match self.book_form.publication_year.trim().parse::<i32>() {
                Ok(year) => Some(year),
                Err(_) => {
                    self.set_error("Publication year must be a number".to_string());
                    return;
                }
            }
        };

        let publisher = if self.book_form.publisher.trim().is_empty() {
            None
        } else {
            Some(self.book_form.publisher.trim().to_string())
        };

        self.set_loading(true, "Saving book...");

        let form = &self.book_form;
        let result = match form.editing {
            Some(id) => {
                let req = UpdateBookRequest {
                    title: Some(form.title.trim().to_string()),
                    author: Some(form.author.trim().to_string()),
                    isbn: Some(form.isbn.trim().to_string()),
                    category: Some(form.category()),
                    condition: Some(form.condition()),
                    language: Some(form.language.trim().to_string()),
                    publisher,
                    publication_year,
                    storage_location: None,
                    copy_number: None,
                    image_url: None,
                };
                self.api.update_book(id, &req).await
            }
            None => {
                let req = CreateBookRequest {
                    title: form.title.trim().to_string(),
                    author: form.author.trim().to_string(),
                    isbn: form.isbn.trim().to_string(),
                    category: form.category(),
                    condition: form.condition(),
                    language: if form.language.trim().is_empty() {
                        "English".to_string()
                    } else {
                        form.language.trim().to_string()
                    },
                    publisher,
                    publication_year,
                    storage_location: None,
                    copy_number: None,
                    image_url: None,
                };
                self.api.create_book(&req).await
            }
        };

        match result {
            Ok(_) => {
                let verb = if self.book_form.editing.is_some() {
                    "updated"
                } else {
                    "added"
                };
                self.set_status(format!("Book {} successfully", verb));
                self.view = View::Catalog;
                self.vim_mode = VimMode::Normal;
                self.load_books().await;
            }
            Err(e) => self.set_error(e.to_string()),
        }

        self.set_loading(false, "");
    }

    // ============ Borrowed ============

    async fn handle_borrowed_key(&mut self, key: KeyEvent) -> Result<bool> {
        if self.loading {
            return Ok(false);
        }

        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Esc | KeyCode::Backspace => self.view = View::Catalog,
            KeyCode::Char('r') => self.load_borrowed().await,
            KeyCode::Char('j') | KeyCode::Down => {
                if self.selected_borrowed_idx < self.borrowed.len().saturating_sub(1) {
                    self.selected_borrowed_idx += 1;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if self.selected_borrowed_idx > 0 {
                    self.selected_borrowed_idx -= 1;
                }
            }
            KeyCode::Enter => {
                if let Some(book) = self.borrowed.get(self.selected_borrowed_idx) {
                    let id = book.id;
                    self.do_return(id).await;
                    self.load_borrowed().await;
                }
            }
            _ => {}
        }

        Ok(false)
    }

    async fn load_borrowed(&mut self) {
        self.set_loading(true, "Loading borrowed books...");

        match self.api.borrowed_books().await {
            Ok(books) => {
                self.borrowed = books;
                if self.selected_borrowed_idx >= self.borrowed.len() {
                    self.selected_borrowed_idx = self.borrowed.len().saturating_sub(1);
                }
            }
            Err(e) => self.set_error(format!("Failed to load borrowed books: {}", e)),
        }

        self.set_loading(false, "");
    }

    // ============ Profile ============

    async fn handle_profile_key(&mut self, key: KeyEvent) -> Result<bool> {
        if self.loading {
            return Ok(false);
        }

        match key.code {
            KeyCode::Esc => {
                if self.vim_mode == VimMode::Insert {
                    self.vim_mode = VimMode::Normal;
                } else {
                    self.view = View::Catalog;
                }
            }
            KeyCode::Char('q') if self.vim_mode == VimMode::Normal => return Ok(true),
            KeyCode::Char('i') if self.vim_mode == VimMode::Normal => {
                self.vim_mode = VimMode::Insert;
            }
            KeyCode::Tab | KeyCode::Char('j') | KeyCode::Down
                if key.code == KeyCode::Tab || self.vim_mode == VimMode::Normal =>
            {
                self.profile_field = self.profile_field.next();
            }
            KeyCode::BackTab | KeyCode::Char('k') | KeyCode::Up
                if key.code == KeyCode::BackTab || self.vim_mode == VimMode::Normal =>
            {
                self.profile_field = self.profile_field.prev();
            }
            KeyCode::Left | KeyCode::Char('h')
                if self.profile_field == ProfileField::Avatar
                    && (key.code == KeyCode::Left || self.vim_mode == VimMode::Normal) =>
            {
                self.profile_form.avatar_idx =
                    (self.profile_form.avatar_idx + AVATARS.len() - 1) % AVATARS.len();
            }
            KeyCode::Right | KeyCode::Char('l')
                if self.profile_field == ProfileField::Avatar
                    && (key.code == KeyCode::Right || self.vim_mode == VimMode::Normal) =>
            {
                self.profile_form.avatar_idx = (self.profile_form.avatar_idx + 1) % AVATARS.len();
            }
            KeyCode::Enter => self.do_save_profile().await,
            KeyCode::Char(c) if self.vim_mode == VimMode::Insert => {
                if let Some(field) = self.profile_text_field() {
                    field.push(c);
                }
            }
            KeyCode::Backspace if self.vim_mode == VimMode::Insert => {
                if let Some(field) = self.profile_text_field() {
                    field.pop();
                }
            }
            _ => {}
        }

        Ok(false)
    }

    fn profile_text_field(&mut self) -> Option<&mut String> {
        match self.profile_field {
            ProfileField::FirstName => Some(&mut self.profile_form.first_name),
            ProfileField::LastName => Some(&mut self.profile_form.last_name),
            ProfileField::Email => Some(&mut self.profile_form.email),
            ProfileField::Age => Some(&mut self.profile_form.age),
            ProfileField::Password => Some(&mut self.profile_form.password),
            ProfileField::Avatar => None,
        }
    }

    async fn do_save_profile(&mut self) {
        let email = self.profile_form.email.trim().to_string();
        if !email.is_empty() && !crate::forms::email_ok(&email) {
            self.set_error("Enter a valid email address".to_string());
            return;
        }

        let age = if self.profile_form.age.trim().is_empty() {
            None
        } else {
            match self.profile_form.age.trim().parse::<i32>() {
                Ok(age) => Some(age),
                Err(_) => {
                    self.set_error("Age must be a number".to_string());
                    return;
                }
            }
        };

        let form = &self.profile_form;
        let req = UpdateUserRequest {
            first_name: Some(form.first_name.trim().to_string()),
            last_name: Some(form.last_name.trim().to_string()),
            email: if email.is_empty() { None } else { Some(email) },
            age,
            avatar_url: Some(form.avatar_url().to_string()),
            password: if form.password.is_empty() {
                None
            } else {
                Some(form.password.clone())
            },
        };

        self.set_loading(true, "Saving profile...");

        match self.api.update_me(&req).await {
            Ok(user) => {
                self.user = Some(user);
                self.profile_form.password.clear();
                self.set_status("Profile updated".to_string());
                self.vim_mode = VimMode::Normal;
                self.view = View::Catalog;
            }
            Err(e) => self.set_error(e.to_string()),
        }

        self.set_loading(false, "");
    }

    // ============ Users (admin) ============

    async fn handle_users_key(&mut self, key: KeyEvent) -> Result<bool> {
        if self.loading {
            return Ok(false);
        }

        if self.confirm_delete {
            match key.code {
                KeyCode::Char('y') => {
                    self.confirm_delete = false;
                    if let Some(user) = self.users.get(self.selected_user_idx) {
                        let id = user.id;
                        self.do_delete_user(id).await;
                    }
                }
                _ => self.confirm_delete = false,
            }
            return Ok(false);
        }

        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Esc | KeyCode::Backspace => self.view = View::Catalog,
            KeyCode::Char('r') => self.load_users().await,
            KeyCode::Char('j') | KeyCode::Down => {
                if self.selected_user_idx < self.users.len().saturating_sub(1) {
                    self.selected_user_idx += 1;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if self.selected_user_idx > 0 {
                    self.selected_user_idx -= 1;
                }
            }
            KeyCode::Char('d') => {
                let Some(target) = self.users.get(self.selected_user_idx) else {
                    return Ok(false);
                };
                // Backend refuses self-deletion too; fail fast here.
                if self.user.as_ref().is_some_and(|me| me.id == target.id) {
                    self.set_error("You cannot delete your own account".to_string());
                } else {
                    self.confirm_delete = true;
                }
            }
            _ => {}
        }

        Ok(false)
    }

    async fn load_users(&mut self) {
        self.set_loading(true, "Loading users...");

        match self.api.list_users().await {
            Ok(users) => {
                self.users = users;
                if self.selected_user_idx >= self.users.len() {
                    self.selected_user_idx = self.users.len().saturating_sub(1);
                }
            }
            Err(e) => self.set_error(format!("Failed to load users: {}", e)),
        }

        self.set_loading(false, "");
    }

    async fn do_delete_user(&mut self, id: Uuid) {
        self.set_loading(true, "Deleting user...");

        match self.api.delete_user(id).await {
            Ok(()) => {
                self.set_status("User deleted".to_string());
                self.load_users().await;
            }
            Err(e) => self.set_error(format!("Failed to delete user: {}", e)),
        }

        self.set_loading(false, "");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use library_shared::Profile;

    fn user_with_avatar(avatar_url: Option<&str>) -> User {
        User {
            id: Uuid::new_v4(),
            username: "reader".into(),
            email: "reader@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Reader".into(),
            profile: Some(Profile::new(
                library_shared::Role::User,
                Some(30),
                avatar_url.map(String::from),
            )),
            is_staff: false,
            date_joined: Utc::now(),
        }
    }

    #[test]
    fn profile_form_selects_matching_avatar() {
        let form = ProfileForm::from_user(&user_with_avatar(Some(AVATARS[5])));
        assert_eq!(form.avatar_idx, 5);
        assert_eq!(form.avatar_url(), AVATARS[5]);
    }

    #[test]
    fn profile_form_falls_back_to_default_avatar() {
        let form = ProfileForm::from_user(&user_with_avatar(None));
        assert_eq!(form.avatar_idx, 0);

        let form = ProfileForm::from_user(&user_with_avatar(Some("/static/images/gone.svg")));
        assert_eq!(form.avatar_idx, 0);
    }

    #[test]
    fn profile_form_carries_account_fields() {
        let form = ProfileForm::from_user(&user_with_avatar(None));
        assert_eq!(form.first_name, "Ada");
        assert_eq!(form.email, "reader@example.com");
        assert_eq!(form.age, "30");
        assert!(form.password.is_empty());
    }

    #[test]
    fn book_field_order_wraps_both_ways() {
        assert_eq!(BookField::Title.next(), BookField::Author);
        assert_eq!(BookField::Condition.next(), BookField::Title);
        assert_eq!(BookField::Title.prev(), BookField::Condition);
    }

    #[test]
    fn empty_book_form_starts_on_first_choices() {
        let form = BookForm::default();
        assert!(form.editing.is_none());
        assert_eq!(form.category(), Category::ALL[0]);
        assert_eq!(form.condition(), Condition::ALL[0]);
    }
}
