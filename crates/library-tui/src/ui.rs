use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Table, Wrap},
    Frame,
};

use crate::app::{
    App, AuthField, AuthMode, BookField, ProfileField, View, VimMode, AVATARS,
};
use library_shared::Book;

pub fn draw(f: &mut Frame, app: &App) {
    match app.view {
        View::Login => draw_login(f, app),
        View::Catalog => draw_catalog(f, app),
        View::BookDetail => draw_book_detail(f, app),
        View::BookForm => draw_book_form(f, app),
        View::Borrowed => draw_borrowed(f, app),
        View::Profile => draw_profile(f, app),
        View::Users => draw_users(f, app),
    }

    if let Some(ref error) = app.error_message {
        draw_popup(f, " Error ", error, Color::Red);
    } else if let Some(ref status) = app.status_message {
        draw_popup(f, " Info ", status, Color::Green);
    }

    if app.loading {
        draw_loading_overlay(f, &app.loading_message);
    }
}

/// Status column text for a book row: Available, or loan progress.
fn status_text(book: &Book) -> (String, Color) {
    if book.available {
        return ("Available".to_string(), Color::Green);
    }
    if book.overdue {
        return (format!("Overdue {}d", book.days_overdue), Color::Red);
    }
    if book.due_today {
        return ("Due today".to_string(), Color::Yellow);
    }
    match book.days_left {
        Some(days) => (format!("Due in {}d", days), Color::Yellow),
        None => ("Borrowed".to_string(), Color::Yellow),
    }
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(width),
            Constraint::Min(0),
        ])
        .split(vertical[1]);

    horizontal[1]
}

fn draw_login(f: &mut Frame, app: &App) {
    let area = f.area();

    let is_signup = app.auth_mode == AuthMode::SignUp;
    let form_height = if is_signup { 18 } else { 12 };
    let form_area = centered_rect(50, form_height, area);

    let title = if is_signup { " Sign Up " } else { " Login " };
    let form_block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = form_block.inner(form_area);
    f.render_widget(form_block, form_area);

    let constraints = if is_signup {
        vec![
            Constraint::Length(3), // Username
            Constraint::Length(3), // Email
            Constraint::Length(3), // Password
            Constraint::Length(3), // Confirm password
            Constraint::Length(2), // Hint
            Constraint::Min(0),
        ]
    } else {
        vec![
            Constraint::Length(3), // Username
            Constraint::Length(3), // Password
            Constraint::Length(2), // Hint
            Constraint::Min(0),
        ]
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(constraints)
        .split(inner);

    let field_style = |field: AuthField| {
        if app.auth_field == field {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Gray)
        }
    };

    let username = Paragraph::new(app.auth_username.as_str()).block(
        Block::default()
            .title(" Username ")
            .borders(Borders::ALL)
            .border_style(field_style(AuthField::Username)),
    );
    f.render_widget(username, chunks[0]);

    let password_display = "*".repeat(app.auth_password.len());
    let password_idx = if is_signup { 2 } else { 1 };
    let hint_idx = if is_signup { 4 } else { 2 };

    if is_signup {
        let email = Paragraph::new(app.auth_email.as_str()).block(
            Block::default()
                .title(" Email ")
                .borders(Borders::ALL)
                .border_style(field_style(AuthField::Email)),
        );
        f.render_widget(email, chunks[1]);

        let password2_display = "*".repeat(app.auth_password2.len());
        let password2 = Paragraph::new(password2_display.as_str()).block(
            Block::default()
                .title(" Confirm Password ")
                .borders(Borders::ALL)
                .border_style(field_style(AuthField::Password2)),
        );
        f.render_widget(password2, chunks[3]);
    }

    let password = Paragraph::new(password_display.as_str()).block(
        Block::default()
            .title(" Password ")
            .borders(Borders::ALL)
            .border_style(field_style(AuthField::Password)),
    );
    f.render_widget(password, chunks[password_idx]);

    let mode_text = match (app.vim_mode, is_signup) {
        (VimMode::Normal, false) => "'i' edit | Enter submit | 's' sign up | 'q' quit",
        (VimMode::Normal, true) => "'i' edit | Enter submit | 'l' login | 'q' quit",
        (VimMode::Insert, _) => "Type to enter | Esc normal | Enter submit",
    };
    let hint = Paragraph::new(mode_text)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(hint, chunks[hint_idx]);

    if app.vim_mode == VimMode::Insert {
        let (chunk_idx, len) = match app.auth_field {
            AuthField::Username => (0, app.auth_username.len()),
            AuthField::Email => (1, app.auth_email.len()),
            AuthField::Password => (password_idx, app.auth_password.len()),
            AuthField::Password2 => (3, app.auth_password2.len()),
        };
        let chunk = chunks[chunk_idx];
        f.set_cursor_position((chunk.x + 1 + len as u16, chunk.y + 1));
    }
}

fn header_line(app: &App) -> Line<'_> {
    let (name, role) = app
        .user
        .as_ref()
        .map(|u| (u.username.as_str(), u.role().label()))
        .unwrap_or(("?", ""));

    Line::from(vec![
        Span::styled(
            "LIBRARY",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::styled(name, Style::default().fg(Color::Yellow)),
        Span::raw(" ("),
        Span::styled(role, Style::default().fg(Color::Magenta)),
        Span::raw(")"),
    ])
}

fn draw_catalog(f: &mut Frame, app: &App) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Header
            Constraint::Length(3), // Search
            Constraint::Min(0),    // Table
            Constraint::Length(1), // Key hints
        ])
        .split(area);

    let header = Paragraph::new(vec![header_line(app)]).block(Block::default().borders(Borders::BOTTOM));
    f.render_widget(header, chunks[0]);

    let search_style = if app.searching {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let search = Paragraph::new(app.search_query.as_str()).block(
        Block::default()
            .title(" Search (/) ")
            .borders(Borders::ALL)
            .border_style(search_style),
    );
    f.render_widget(search, chunks[1]);

    let rows: Vec<Row> = app
        .books
        .iter()
        .enumerate()
        .map(|(i, book)| {
            let (status, color) = status_text(book);
            let style = if i == app.selected_book_idx {
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(book.title.clone()),
                Cell::from(book.author.clone()),
                Cell::from(book.category_display.clone()),
                Cell::from(book.condition_display.clone()),
                Cell::from(status).style(Style::default().fg(color)),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(35),
            Constraint::Percentage(25),
            Constraint::Percentage(15),
            Constraint::Percentage(10),
            Constraint::Percentage(15),
        ],
    )
    .header(
        Row::new(vec!["Title", "Author", "Category", "Condition", "Status"])
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().title(" Catalog ").borders(Borders::ALL));
    f.render_widget(table, chunks[2]);

    let mut hints = String::from("j/k move | Enter detail | / search | b borrowed | p profile");
    if app.is_admin() {
        hints.push_str(" | u users");
    }
    if app.is_staff() {
        hints.push_str(" | a add | e edit | d delete");
    }
    hints.push_str(" | L logout | q quit");

    let hint = Paragraph::new(hints).style(Style::default().fg(Color::DarkGray));
    f.render_widget(hint, chunks[3]);

    if app.searching {
        f.set_cursor_position((
            chunks[1].x + 1 + app.search_query.len() as u16,
            chunks[1].y + 1,
        ));
    }
}

fn detail_row<'a>(label: &'a str, value: String) -> Line<'a> {
    Line::from(vec![
        Span::styled(
            format!("{:>16}: ", label),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw(value),
    ])
}

fn draw_book_detail(f: &mut Frame, app: &App) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    let header = Paragraph::new(vec![header_line(app)]).block(Block::default().borders(Borders::BOTTOM));
    f.render_widget(header, chunks[0]);

    let Some(book) = app.selected_book() else {
        let empty = Paragraph::new("No book selected").alignment(Alignment::Center);
        f.render_widget(empty, chunks[1]);
        return;
    };

    let (status, status_color) = status_text(book);

    let mut lines = vec![
        Line::from(Span::styled(
            book.title.clone(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        detail_row("Author", book.author.clone()),
        detail_row("ISBN", book.isbn.clone()),
        detail_row("Category", book.category_display.clone()),
        detail_row("Condition", book.condition_display.clone()),
        detail_row("Language", book.language.clone()),
    ];

    if let Some(ref publisher) = book.publisher {
        lines.push(detail_row("Publisher", publisher.clone()));
    }
    if let Some(year) = book.publication_year {
        lines.push(detail_row("Published", year.to_string()));
    }
    if let Some(ref location) = book.storage_location {
        lines.push(detail_row("Location", location.clone()));
    }
    if let Some(ref added_by) = book.added_by {
        lines.push(detail_row("Added by", added_by.clone()));
    }

    lines.push(Line::default());
    lines.push(Line::from(vec![
        Span::styled("          Status: ", Style::default().fg(Color::DarkGray)),
        Span::styled(status, Style::default().fg(status_color)),
    ]));

    if !book.available {
        if let Some(ref borrower) = book.borrower {
            lines.push(detail_row("Borrower", borrower.clone()));
        }
        if let Some(due) = book.due_date {
            lines.push(detail_row("Due date", due.format("%Y-%m-%d").to_string()));
        }
    }

    let detail = Paragraph::new(lines)
        .block(Block::default().title(" Book ").borders(Borders::ALL))
        .wrap(Wrap { trim: false });
    f.render_widget(detail, chunks[1]);

    let action_hint = match app.borrow_action(book) {
        Some(action) if action.enabled() => format!("b {}", action.label()),
        _ => "borrowed by someone else".to_string(),
    };
    let mut hints = format!("Esc back | {}", action_hint);
    if app.is_staff() {
        hints.push_str(" | e edit | d delete");
    }
    hints.push_str(" | q quit");

    let hint = Paragraph::new(hints).style(Style::default().fg(Color::DarkGray));
    f.render_widget(hint, chunks[2]);
}

fn draw_book_form(f: &mut Frame, app: &App) {
    let area = f.area();
    let form_area = centered_rect(60, 30, area);

    let title = if app.book_form.editing.is_some() {
        " Edit Book "
    } else {
        " Add Book "
    };
    let form_block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = form_block.inner(form_area);
    f.render_widget(form_block, form_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Length(3), // Author
            Constraint::Length(3), // ISBN
            Constraint::Length(3), // Language
            Constraint::Length(3), // Year
            Constraint::Length(3), // Publisher
            Constraint::Length(3), // Category
            Constraint::Length(3), // Condition
            Constraint::Length(2), // Hint
            Constraint::Min(0),
        ])
        .split(inner);

    let field_style = |field: BookField| {
        if app.book_field == field {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Gray)
        }
    };

    let text_fields = [
        (" Title ", &app.book_form.title, BookField::Title, 0),
        (" Author ", &app.book_form.author, BookField::Author, 1),
        (" ISBN ", &app.book_form.isbn, BookField::Isbn, 2),
        (" Language ", &app.book_form.language, BookField::Language, 3),
        (
            " Publication Year ",
            &app.book_form.publication_year,
            BookField::PublicationYear,
            4,
        ),
        (" Publisher ", &app.book_form.publisher, BookField::Publisher, 5),
    ];

    for (title, value, field, idx) in text_fields {
        let widget = Paragraph::new(value.as_str()).block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(field_style(field)),
        );
        f.render_widget(widget, chunks[idx]);
    }

    let category = Paragraph::new(format!("< {} >", app.book_form.category().label())).block(
        Block::default()
            .title(" Category ")
            .borders(Borders::ALL)
            .border_style(field_style(BookField::Category)),
    );
    f.render_widget(category, chunks[6]);

    let condition = Paragraph::new(format!("< {} >", app.book_form.condition().label())).block(
        Block::default()
            .title(" Condition ")
            .borders(Borders::ALL)
            .border_style(field_style(BookField::Condition)),
    );
    f.render_widget(condition, chunks[7]);

    let mode_text = match app.vim_mode {
        VimMode::Normal => "'i' edit | Tab/j/k move | h/l cycle | Enter save | Esc cancel",
        VimMode::Insert => "Type to enter | Esc normal | Enter save",
    };
    let hint = Paragraph::new(mode_text)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(hint, chunks[8]);

    if app.vim_mode == VimMode::Insert {
        let cursor = text_fields_cursor(app);
        if let Some((idx, len)) = cursor {
            let chunk = chunks[idx];
            f.set_cursor_position((chunk.x + 1 + len as u16, chunk.y + 1));
        }
    }
}

fn text_fields_cursor(app: &App) -> Option<(usize, usize)> {
    match app.book_field {
        BookField::Title => Some((0, app.book_form.title.len())),
        BookField::Author => Some((1, app.book_form.author.len())),
        BookField::Isbn => Some((2, app.book_form.isbn.len())),
        BookField::Language => Some((3, app.book_form.language.len())),
        BookField::PublicationYear => Some((4, app.book_form.publication_year.len())),
        BookField::Publisher => Some((5, app.book_form.publisher.len())),
        BookField::Category | BookField::Condition => None,
    }
}

fn draw_borrowed(f: &mut Frame, app: &App) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    let header = Paragraph::new(vec![header_line(app)]).block(Block::default().borders(Borders::BOTTOM));
    f.render_widget(header, chunks[0]);

    let rows: Vec<Row> = app
        .borrowed
        .iter()
        .enumerate()
        .map(|(i, book)| {
            let (status, color) = status_text(book);
            let style = if i == app.selected_borrowed_idx {
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let borrower = book.borrower.clone().unwrap_or_default();
            let due = book
                .due_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            Row::new(vec![
                Cell::from(book.title.clone()),
                Cell::from(borrower),
                Cell::from(due),
                Cell::from(status).style(Style::default().fg(color)),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(40),
            Constraint::Percentage(20),
            Constraint::Percentage(20),
            Constraint::Percentage(20),
        ],
    )
    .header(
        Row::new(vec!["Title", "Borrower", "Due Date", "Status"])
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
    )
    .block(
        Block::default()
            .title(" Borrowed Books ")
            .borders(Borders::ALL),
    );
    f.render_widget(table, chunks[1]);

    let hint = Paragraph::new("j/k move | Enter return | r refresh | Esc back | q quit")
        .style(Style::default().fg(Color::DarkGray));
    f.render_widget(hint, chunks[2]);
}

fn draw_profile(f: &mut Frame, app: &App) {
    let area = f.area();
    let form_area = centered_rect(60, 24, area);

    let form_block = Block::default()
        .title(" Profile ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = form_block.inner(form_area);
    f.render_widget(form_block, form_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // First name
            Constraint::Length(3), // Last name
            Constraint::Length(3), // Email
            Constraint::Length(3), // Age
            Constraint::Length(3), // New password
            Constraint::Length(3), // Avatar
            Constraint::Length(2), // Hint
            Constraint::Min(0),
        ])
        .split(inner);

    let field_style = |field: ProfileField| {
        if app.profile_field == field {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Gray)
        }
    };

    let fields = [
        (
            " First Name ",
            app.profile_form.first_name.clone(),
            ProfileField::FirstName,
            0,
        ),
        (
            " Last Name ",
            app.profile_form.last_name.clone(),
            ProfileField::LastName,
            1,
        ),
        (" Email ", app.profile_form.email.clone(), ProfileField::Email, 2),
        (" Age ", app.profile_form.age.clone(), ProfileField::Age, 3),
        (
            " New Password ",
            "*".repeat(app.profile_form.password.len()),
            ProfileField::Password,
            4,
        ),
    ];

    for (title, value, field, idx) in fields {
        let widget = Paragraph::new(value).block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(field_style(field)),
        );
        f.render_widget(widget, chunks[idx]);
    }

    // Show the short file name, the full path is noise here
    let avatar_name = app
        .profile_form
        .avatar_url()
        .rsplit('/')
        .next()
        .unwrap_or(AVATARS[0]);
    let avatar = Paragraph::new(format!(
        "< {} > ({}/{})",
        avatar_name,
        app.profile_form.avatar_idx + 1,
        AVATARS.len()
    ))
    .block(
        Block::default()
            .title(" Avatar ")
            .borders(Borders::ALL)
            .border_style(field_style(ProfileField::Avatar)),
    );
    f.render_widget(avatar, chunks[5]);

    let mode_text = match app.vim_mode {
        VimMode::Normal => "'i' edit | Tab/j/k move | h/l avatar | Enter save | Esc back",
        VimMode::Insert => "Type to enter | Esc normal | Enter save",
    };
    let hint = Paragraph::new(mode_text)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(hint, chunks[6]);

    if app.vim_mode == VimMode::Insert {
        let cursor = match app.profile_field {
            ProfileField::FirstName => Some((0, app.profile_form.first_name.len())),
            ProfileField::LastName => Some((1, app.profile_form.last_name.len())),
            ProfileField::Email => Some((2, app.profile_form.email.len())),
            ProfileField::Age => Some((3, app.profile_form.age.len())),
            ProfileField::Password => Some((4, app.profile_form.password.len())),
            ProfileField::Avatar => None,
        };
        if let Some((idx, len)) = cursor {
            let chunk = chunks[idx];
            f.set_cursor_position((chunk.x + 1 + len as u16, chunk.y + 1));
        }
    }
}

fn draw_users(f: &mut Frame, app: &App) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    let header = Paragraph::new(vec![header_line(app)]).block(Block::default().borders(Borders::BOTTOM));
    f.render_widget(header, chunks[0]);

    let items: Vec<ListItem> = app
        .users
        .iter()
        .enumerate()
        .map(|(i, user)| {
            let role = user.role().label();
            let label = if user.first_name.is_empty() && user.last_name.is_empty() {
                format!("{} <{}> [{}]", user.username, user.email, role)
            } else {
                format!(
                    "{} ({} {}) <{}> [{}]",
                    user.username, user.first_name, user.last_name, user.email, role
                )
            };
            let style = if i == app.selected_user_idx {
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(label).style(style)
        })
        .collect();

    let list =
        List::new(items).block(Block::default().title(" Users ").borders(Borders::ALL));
    f.render_widget(list, chunks[1]);

    let hint = Paragraph::new("j/k move | d delete | r refresh | Esc back | q quit")
        .style(Style::default().fg(Color::DarkGray));
    f.render_widget(hint, chunks[2]);

    if app.confirm_delete {
        if let Some(user) = app.users.get(app.selected_user_idx) {
            let text = format!("Delete user '{}'? (y/n)", user.username);
            draw_popup(f, " Confirm ", &text, Color::Yellow);
        }
    }
}

fn draw_popup(f: &mut Frame, title: &str, message: &str, color: Color) {
    let area = f.area();
    let width = (message.len() as u16 + 6).clamp(30, area.width.saturating_sub(4));
    let lines = message.lines().count().max(1) as u16;
    let popup_area = centered_rect(width, lines + 4, area);

    f.render_widget(Clear, popup_area);

    let popup = Paragraph::new(message)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        )
        .wrap(Wrap { trim: true })
        .alignment(Alignment::Center);
    f.render_widget(popup, popup_area);
}

fn draw_loading_overlay(f: &mut Frame, message: &str) {
    let area = f.area();
    let popup_area = centered_rect(40, 3, area);

    f.render_widget(Clear, popup_area);

    let loading = Paragraph::new(message)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .alignment(Alignment::Center);
    f.render_widget(loading, popup_area);
}
