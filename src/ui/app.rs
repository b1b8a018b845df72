use std::mem;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use crossterm::event::KeyCode;
use open::that as open_link;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use rusqlite::Connection;

use crate::db::{
    active_loans_for, add_or_increment_book, add_tree_level, assign_tree_level, check_in,
    check_out, fetch_tree_levels, find_book, find_borrower, late_loans, list_books,
    register_borrower, search_books, set_reference_only,
};
use crate::error::LibraryError;
use crate::lookup::{normalize_isbn, MetadataSource};
use crate::models::{due_date, AddOutcome, Book, BookListing, BookRecord};

use super::forms::{BookPreview, ConfirmReference, PromptForm, PromptKind};
use super::helpers::{centered_rect, format_date, is_fatal, surface_error, yes_no};
use super::screens::{BorrowerScreen, LateScreen, Listing, SearchScreen, TreeLevelPicker};

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
/// Rows skipped by PageUp / PageDown.
const PAGE_STEP: isize = 5;
/// Google Books landing page; the ISBN is appended.
const BOOK_PAGE_URL: &str = "https://books.google.com/books?vid=ISBN";

/// What fills the content area. The catalog is home; every other screen
/// returns to it on Esc.
enum Screen {
    Catalog,
    Search(SearchScreen),
    Late(LateScreen),
    Borrower(BorrowerScreen),
}

/// Dialogs layered over the current screen.
enum Mode {
    Normal,
    Prompt(PromptForm),
    ConfirmAddBook(BookPreview),
    ConfirmReference(ConfirmReference),
    PickingTreeLevel(TreeLevelPicker),
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state. Owns the store handle for the whole session.
pub struct App {
    conn: Connection,
    lookup: Box<dyn MetadataSource>,
    books: Listing<BookListing>,
    screen: Screen,
    mode: Mode,
    status: Option<StatusMessage>,
}

impl App {
    pub fn new(conn: Connection, lookup: Box<dyn MetadataSource>) -> Result<Self> {
        let books = list_books(&conn).context("failed to load the catalog")?;
        Ok(Self {
            conn,
            lookup,
            books: Listing::new(books),
            screen: Screen::Catalog,
            mode: Mode::Normal,
            status: None,
        })
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    /// Feed one key press through the active dialog or screen. Returns `true`
    /// once the operator asked to quit.
    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);

        self.mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit)?,
            Mode::Prompt(form) => self.handle_prompt(code, form)?,
            Mode::ConfirmAddBook(preview) => self.handle_confirm_add_book(code, preview)?,
            Mode::ConfirmReference(confirm) => self.handle_confirm_reference(code, confirm)?,
            Mode::PickingTreeLevel(picker) => self.handle_pick_tree_level(code, picker)?,
        };
        Ok(exit)
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        match code {
            KeyCode::Char('q') => *exit = true,
            KeyCode::Esc => {
                if matches!(self.screen, Screen::Catalog) {
                    *exit = true;
                } else {
                    self.clear_status();
                    self.screen = Screen::Catalog;
                }
            }
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Down => self.move_selection(1),
            KeyCode::PageUp => self.move_selection(-PAGE_STEP),
            KeyCode::PageDown => self.move_selection(PAGE_STEP),
            KeyCode::Home => self.select_edge(true),
            KeyCode::End => self.select_edge(false),
            KeyCode::Char('a') => return Ok(self.open_prompt(PromptKind::AddBook)),
            KeyCode::Char('b') => return Ok(self.open_prompt(PromptKind::RegisterBorrower)),
            KeyCode::Char('t') => return Ok(self.open_prompt(PromptKind::AddTreeLevel)),
            KeyCode::Char('v') => return Ok(self.open_prompt(PromptKind::ViewBorrower)),
            KeyCode::Char('/') => return Ok(self.open_prompt(PromptKind::Search)),
            KeyCode::Char('L') => {
                self.clear_status();
                let result = self.open_late_loans();
                self.report(result)?;
            }
            KeyCode::Char('c') => {
                if let Some(book) = self.selected_book()? {
                    // Refuse before asking for a card; check_out re-checks both.
                    if book.reference_only {
                        let err = LibraryError::ReferenceOnly { title: book.title };
                        self.set_status(err.to_string(), StatusKind::Error);
                        return Ok(Mode::Normal);
                    }
                    if book.copies_available <= 0 {
                        let err = LibraryError::NoCopiesAvailable { title: book.title };
                        self.set_status(err.to_string(), StatusKind::Error);
                        return Ok(Mode::Normal);
                    }
                    return Ok(self.open_prompt(PromptKind::CheckOut {
                        isbn: book.isbn,
                        title: book.title,
                    }));
                }
                self.set_status("No book selected to check out.", StatusKind::Error);
            }
            KeyCode::Char('r') => {
                if let Some(book) = self.selected_book()? {
                    let result = self.check_in_book(&book.isbn);
                    self.report(result)?;
                } else {
                    self.set_status("No book selected to check in.", StatusKind::Error);
                }
            }
            KeyCode::Char('l') => {
                if let Some(book) = self.selected_book()? {
                    let levels = fetch_tree_levels(&self.conn)?;
                    if levels.is_empty() {
                        self.set_status(
                            "No tree levels available. Press 't' to add one first.",
                            StatusKind::Error,
                        );
                    } else {
                        self.clear_status();
                        return Ok(Mode::PickingTreeLevel(TreeLevelPicker::new(
                            book.isbn,
                            book.title,
                            levels,
                            book.tree_level_id,
                        )));
                    }
                } else {
                    self.set_status("No book selected.", StatusKind::Error);
                }
            }
            KeyCode::Char('f') => {
                if let Some(book) = self.selected_book()? {
                    self.clear_status();
                    return Ok(Mode::ConfirmReference(ConfirmReference::from(&book)));
                }
                self.set_status("No book selected.", StatusKind::Error);
            }
            KeyCode::Char('w') => {
                if let Some(book) = self.selected_book()? {
                    let url = format!("{BOOK_PAGE_URL}{}", book.isbn);
                    match open_link(&url) {
                        Ok(()) => self.set_status(format!("Opened {url}"), StatusKind::Info),
                        Err(err) => self.set_status(
                            format!("Failed to open link: {err}"),
                            StatusKind::Error,
                        ),
                    }
                } else {
                    self.set_status("No book selected.", StatusKind::Error);
                }
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_prompt(&mut self, code: KeyCode, mut form: PromptForm) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status(format!("{} cancelled.", form.kind.title()), StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.submit_prompt(&form) {
                Ok(next) => return Ok(next),
                Err(err) if is_fatal(&err) => return Err(err),
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Ok(Mode::Prompt(form))
    }

    fn submit_prompt(&mut self, form: &PromptForm) -> Result<Mode> {
        let value = form.parse_input()?;
        match &form.kind {
            PromptKind::AddBook => return self.lookup_book(&value),
            PromptKind::RegisterBorrower => {
                let borrower = register_borrower(&self.conn, &value)?;
                self.set_status(
                    format!("Borrower '{}' added successfully.", borrower.card_id),
                    StatusKind::Info,
                );
            }
            PromptKind::AddTreeLevel => {
                let level = add_tree_level(&self.conn, &value)?;
                self.set_status(
                    format!("Tree level '{}' added successfully.", level.name),
                    StatusKind::Info,
                );
            }
            PromptKind::CheckOut { isbn, .. } => {
                let receipt = check_out(&mut self.conn, isbn, &value, Self::today())?;
                self.refresh_after_change(Some(isbn))?;
                self.set_status(
                    format!(
                        "Book '{}' checked out to {}, due {}. {} copies left.",
                        receipt.title,
                        receipt.card_id,
                        format_date(receipt.loan.due_date()),
                        receipt.copies_available
                    ),
                    StatusKind::Info,
                );
            }
            PromptKind::ViewBorrower => {
                let borrower = find_borrower(&self.conn, &value)?;
                let loans = active_loans_for(&self.conn, borrower.id)?;
                self.clear_status();
                self.screen = Screen::Borrower(BorrowerScreen {
                    borrower,
                    loans: Listing::new(loans),
                });
            }
            PromptKind::Search => {
                let hits = search_books(&self.conn, &value)?;
                if hits.is_empty() {
                    self.set_status("No books found matching the search term.", StatusKind::Info);
                } else {
                    self.clear_status();
                }
                self.screen = Screen::Search(SearchScreen {
                    term: value,
                    results: Listing::new(hits),
                });
            }
        }
        Ok(Mode::Normal)
    }

    /// Resolve the ISBN through the metadata source. A title already in the
    /// catalog gains a copy straight away; a new one is previewed first.
    fn lookup_book(&mut self, input: &str) -> Result<Mode> {
        let isbn = normalize_isbn(input)?;
        let record = self.lookup.lookup(&isbn)?;
        match find_book(&self.conn, &record.preferred_isbn) {
            Ok(_) => {
                self.add_copy(&record)?;
                Ok(Mode::Normal)
            }
            Err(LibraryError::NotFound { .. }) => {
                self.clear_status();
                Ok(Mode::ConfirmAddBook(BookPreview { record }))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn add_copy(&mut self, record: &BookRecord) -> Result<()> {
        let outcome = add_or_increment_book(&mut self.conn, record)?;
        self.refresh_after_change(Some(&record.preferred_isbn))?;
        let message = match &outcome {
            AddOutcome::Inserted(book) => {
                format!("Book '{}' added to inventory with 1 copy.", book.title)
            }
            AddOutcome::Incremented {
                isbn,
                copies_available,
                ..
            } => format!(
                "Book with ISBN {isbn} already exists. Added another copy; {copies_available} now available."
            ),
        };
        self.set_status(message, StatusKind::Info);
        Ok(())
    }

    fn handle_confirm_add_book(&mut self, code: KeyCode, preview: BookPreview) -> Result<Mode> {
        match code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                let result = self.add_copy(&preview.record);
                self.report(result)?;
                Ok(Mode::Normal)
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.set_status("Book addition canceled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            _ => Ok(Mode::ConfirmAddBook(preview)),
        }
    }

    fn handle_confirm_reference(
        &mut self,
        code: KeyCode,
        confirm: ConfirmReference,
    ) -> Result<Mode> {
        match code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                let result = self.apply_reference_flag(&confirm);
                self.report(result)?;
                Ok(Mode::Normal)
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.set_status("Reference status unchanged.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            _ => Ok(Mode::ConfirmReference(confirm)),
        }
    }

    fn apply_reference_flag(&mut self, confirm: &ConfirmReference) -> Result<()> {
        let target = confirm.target();
        set_reference_only(&mut self.conn, &confirm.isbn, target)?;
        self.refresh_after_change(Some(&confirm.isbn))?;
        self.set_status(
            format!(
                "Reference status for '{}' has been updated to: {}",
                confirm.title,
                yes_no(target)
            ),
            StatusKind::Info,
        );
        Ok(())
    }

    fn handle_pick_tree_level(
        &mut self,
        code: KeyCode,
        mut picker: TreeLevelPicker,
    ) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Tree level unchanged.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Up => picker.levels.move_selection(-1),
            KeyCode::Down => picker.levels.move_selection(1),
            KeyCode::Home => picker.levels.select_first(),
            KeyCode::End => picker.levels.select_last(),
            KeyCode::Enter => {
                if let Some(level_id) = picker.levels.current().map(|level| level.id) {
                    let result = self.assign_level(&picker, level_id);
                    self.report(result)?;
                    return Ok(Mode::Normal);
                }
            }
            _ => {}
        }
        Ok(Mode::PickingTreeLevel(picker))
    }

    fn assign_level(&mut self, picker: &TreeLevelPicker, level_id: i64) -> Result<()> {
        let level = assign_tree_level(&mut self.conn, &picker.isbn, level_id)?;
        self.refresh_after_change(Some(&picker.isbn))?;
        self.set_status(
            format!(
                "Tree level '{}' assigned to the book '{}'.",
                level.name, picker.title
            ),
            StatusKind::Info,
        );
        Ok(())
    }

    fn check_in_book(&mut self, isbn: &str) -> Result<()> {
        let receipt = check_in(&mut self.conn, isbn, Self::today())?;
        self.refresh_after_change(Some(isbn))?;
        self.set_status(
            format!(
                "Book '{}' checked in from {}. {} copies available.",
                receipt.title, receipt.card_id, receipt.copies_available
            ),
            StatusKind::Info,
        );
        Ok(())
    }

    fn open_late_loans(&mut self) -> Result<()> {
        let as_of = Self::today();
        let loans = late_loans(&self.conn, as_of)?;
        if loans.is_empty() {
            self.set_status("No late books.", StatusKind::Info);
        }
        self.screen = Screen::Late(LateScreen {
            as_of,
            loans: Listing::new(loans),
        });
        Ok(())
    }

    /// Re-query the catalog and whatever the current screen shows so every
    /// view reflects the last committed change. `focus` keeps the cursor on
    /// the affected book.
    fn refresh_after_change(&mut self, focus: Option<&str>) -> Result<()> {
        let books = list_books(&self.conn)?;
        self.books
            .replace(books, |listing| Some(listing.book.isbn.as_str()) == focus);

        match &mut self.screen {
            Screen::Catalog => {}
            Screen::Search(search) => {
                let hits = search_books(&self.conn, &search.term)?;
                search
                    .results
                    .replace(hits, |hit| Some(hit.book.isbn.as_str()) == focus);
            }
            Screen::Late(late) => {
                let loans = late_loans(&self.conn, late.as_of)?;
                late.loans
                    .replace(loans, |loan| Some(loan.isbn.as_str()) == focus);
            }
            Screen::Borrower(view) => {
                let loans = active_loans_for(&self.conn, view.borrower.id)?;
                view.loans
                    .replace(loans, |loan| Some(loan.isbn.as_str()) == focus);
            }
        }
        Ok(())
    }

    /// The book the next action applies to: the highlighted catalog row or
    /// search hit, or the book behind the highlighted loan.
    fn selected_book(&self) -> Result<Option<Book>> {
        let isbn = match &self.screen {
            Screen::Catalog => {
                return Ok(self.books.current().map(|listing| listing.book.clone()))
            }
            Screen::Search(search) => {
                return Ok(search.results.current().map(|hit| hit.book.clone()))
            }
            Screen::Late(late) => late.loans.current().map(|loan| loan.isbn.clone()),
            Screen::Borrower(view) => view.loans.current().map(|loan| loan.isbn.clone()),
        };
        match isbn {
            Some(isbn) => Ok(Some(find_book(&self.conn, &isbn)?)),
            None => Ok(None),
        }
    }

    fn open_prompt(&mut self, kind: PromptKind) -> Mode {
        self.clear_status();
        Mode::Prompt(PromptForm::new(kind))
    }

    fn move_selection(&mut self, offset: isize) {
        match &mut self.screen {
            Screen::Catalog => self.books.move_selection(offset),
            Screen::Search(search) => search.results.move_selection(offset),
            Screen::Late(late) => late.loans.move_selection(offset),
            Screen::Borrower(view) => view.loans.move_selection(offset),
        }
    }

    fn select_edge(&mut self, first: bool) {
        match &mut self.screen {
            Screen::Catalog if first => self.books.select_first(),
            Screen::Catalog => self.books.select_last(),
            Screen::Search(search) if first => search.results.select_first(),
            Screen::Search(search) => search.results.select_last(),
            Screen::Late(late) if first => late.loans.select_first(),
            Screen::Late(late) => late.loans.select_last(),
            Screen::Borrower(view) if first => view.loans.select_first(),
            Screen::Borrower(view) => view.loans.select_last(),
        }
    }

    /// Show a recoverable failure in the footer. Storage failures propagate
    /// and end the session.
    fn report(&mut self, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(err) if is_fatal(&err) => Err(err),
            Err(err) => {
                self.set_status(surface_error(&err), StatusKind::Error);
                Ok(())
            }
        }
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let footer_height = FOOTER_HEIGHT.min(area.height);

        let (content_area, footer_area) = if area.height > footer_height {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(footer_height)])
                .split(area);
            (chunks[0], chunks[1])
        } else {
            (area, area)
        };

        match &self.screen {
            Screen::Catalog => self.draw_catalog(frame, content_area),
            Screen::Search(search) => self.draw_search(frame, content_area, search),
            Screen::Late(late) => self.draw_late(frame, content_area, late),
            Screen::Borrower(view) => self.draw_borrower(frame, content_area, view),
        }

        if area.height >= footer_height {
            self.draw_footer(frame, footer_area);
        }

        match &self.mode {
            Mode::Prompt(form) => self.draw_prompt(frame, area, form),
            Mode::ConfirmAddBook(preview) => self.draw_book_preview(frame, area, preview),
            Mode::ConfirmReference(confirm) => self.draw_confirm_reference(frame, area, confirm),
            Mode::PickingTreeLevel(picker) => self.draw_tree_picker(frame, area, picker),
            Mode::Normal => {}
        }
    }

    /// Split a screen into a 3-row header and the list below it.
    fn split_header(&self, area: Rect) -> (Rect, Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(1)])
            .split(area);
        (chunks[0], chunks[1])
    }

    fn draw_header(&self, frame: &mut Frame, area: Rect, heading: String, summary: String) {
        let header = Paragraph::new(vec![
            Line::from(Span::styled(
                heading,
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(summary),
        ])
        .alignment(Alignment::Left)
        .block(Block::default().borders(Borders::BOTTOM));
        frame.render_widget(header, area);
    }

    fn draw_empty(&self, frame: &mut Frame, area: Rect, message: &str) {
        let paragraph = Paragraph::new(message.to_string())
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::NONE));
        frame.render_widget(paragraph, area);
    }

    fn render_list(
        &self,
        frame: &mut Frame,
        area: Rect,
        items: Vec<ListItem<'static>>,
        selected: usize,
    ) {
        let list = List::new(items)
            .block(Block::default().borders(Borders::NONE))
            .highlight_style(Style::default().fg(Color::Yellow))
            .highlight_symbol("▶ ");

        let mut list_state = ListState::default();
        list_state.select(Some(selected));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn draw_catalog(&self, frame: &mut Frame, area: Rect) {
        let (header_area, list_area) = self.split_header(area);
        let on_loan: i64 = self
            .books
            .items
            .iter()
            .map(|listing| listing.book.copies_on_loan())
            .sum();
        self.draw_header(
            frame,
            header_area,
            "Library Catalog".to_string(),
            format!("{} titles  •  {on_loan} copies on loan", self.books.len()),
        );

        if self.books.is_empty() {
            self.draw_empty(
                frame,
                list_area,
                "No books available in the inventory. Press 'a' to add one.",
            );
            return;
        }

        let items = self
            .books
            .items
            .iter()
            .map(|listing| book_item(&listing.book, listing.tree_level_label(), Vec::new()))
            .collect();
        self.render_list(frame, list_area, items, self.books.selected);
    }

    fn draw_search(&self, frame: &mut Frame, area: Rect, search: &SearchScreen) {
        let (header_area, list_area) = self.split_header(area);
        self.draw_header(
            frame,
            header_area,
            format!("Search Results for '{}'", search.term),
            format!("{} matching books", search.results.len()),
        );

        if search.results.is_empty() {
            self.draw_empty(frame, list_area, "No books found matching the search term.");
            return;
        }

        let today = Self::today();
        let items = search
            .results
            .items
            .iter()
            .map(|hit| {
                let mut extra = vec![Line::from(format!(
                    "Reference Only: {}",
                    yes_no(hit.book.reference_only)
                ))];
                extra.push(match &hit.last_loan {
                    Some(loan) if loan.return_date.is_none() => {
                        let due = due_date(loan.borrow_date);
                        let style = if due < today {
                            Style::default().fg(Color::Red)
                        } else {
                            Style::default().fg(Color::LightBlue)
                        };
                        Line::from(Span::styled(
                            format!(
                                "On loan to {} since {}, due {}",
                                loan.card_id,
                                format_date(loan.borrow_date),
                                format_date(due)
                            ),
                            style,
                        ))
                    }
                    Some(loan) => Line::from(format!(
                        "Last borrowed by {}, returned {}",
                        loan.card_id,
                        loan.return_date.map(format_date).unwrap_or_default()
                    )),
                    None => Line::from("Currently not borrowed."),
                });
                book_item(&hit.book, hit.tree_level_label(), extra)
            })
            .collect();
        self.render_list(frame, list_area, items, search.results.selected);
    }

    fn draw_late(&self, frame: &mut Frame, area: Rect, late: &LateScreen) {
        let (header_area, list_area) = self.split_header(area);
        self.draw_header(
            frame,
            header_area,
            "Late Books".to_string(),
            format!(
                "{} overdue as of {}",
                late.loans.len(),
                format_date(late.as_of)
            ),
        );

        if late.loans.is_empty() {
            self.draw_empty(frame, list_area, "No late books.");
            return;
        }

        let items = late
            .loans
            .items
            .iter()
            .map(|loan| {
                ListItem::new(vec![
                    Line::from(Span::styled(
                        loan.title.clone(),
                        Style::default().add_modifier(Modifier::BOLD),
                    )),
                    Line::from(format!(
                        "ISBN {}  •  Borrower: {}  •  Due: {}",
                        loan.isbn,
                        loan.card_id,
                        format_date(loan.due_date())
                    )),
                    Line::from(Span::styled(
                        format!("{} days overdue", loan.days_overdue(late.as_of)),
                        Style::default().fg(Color::Red),
                    )),
                    Line::from(""),
                ])
            })
            .collect();
        self.render_list(frame, list_area, items, late.loans.selected);
    }

    fn draw_borrower(&self, frame: &mut Frame, area: Rect, view: &BorrowerScreen) {
        let (header_area, list_area) = self.split_header(area);
        self.draw_header(
            frame,
            header_area,
            format!("Borrower {}", view.borrower.card_id),
            format!("{} books currently borrowed", view.loans.len()),
        );

        if view.loans.is_empty() {
            self.draw_empty(frame, list_area, "No books currently borrowed by this borrower.");
            return;
        }

        let today = Self::today();
        let items = view
            .loans
            .items
            .iter()
            .map(|loan| {
                let due = loan.due_date();
                let due_style = if due < today {
                    Style::default().fg(Color::Red)
                } else {
                    Style::default()
                };
                ListItem::new(vec![
                    Line::from(Span::styled(
                        loan.title.clone(),
                        Style::default().add_modifier(Modifier::BOLD),
                    )),
                    Line::from(vec![
                        Span::raw(format!(
                            "ISBN {}  •  Loan Date: {}  •  ",
                            loan.isbn,
                            format_date(loan.borrow_date)
                        )),
                        Span::styled(format!("Due Date: {}", format_date(due)), due_style),
                    ]),
                    Line::from(""),
                ])
            })
            .collect();
        self.render_list(frame, list_area, items, view.loans.selected);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let paragraph =
            Paragraph::new(vec![status_line, self.footer_instructions()]).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        let hints: &[(&'static str, &'static str)] = match (&self.screen, &self.mode) {
            (_, Mode::Prompt(_)) => &[("[Enter]", "Submit"), ("[Esc]", "Cancel")],
            (_, Mode::ConfirmAddBook(_)) | (_, Mode::ConfirmReference(_)) => {
                &[("[Y]", "Confirm"), ("[N/Esc]", "Cancel")]
            }
            (_, Mode::PickingTreeLevel(_)) => {
                &[("[↑↓]", "Navigate"), ("[Enter]", "Assign"), ("[Esc]", "Cancel")]
            }
            (Screen::Catalog, Mode::Normal) => &[
                ("[c]", "Check out"),
                ("[r]", "Check in"),
                ("[/]", "Search"),
                ("[L]", "Late"),
                ("[a]", "Add book"),
                ("[b]", "Add borrower"),
                ("[v]", "View borrower"),
                ("[t]", "Add tree level"),
                ("[l]", "Assign level"),
                ("[f]", "Reference"),
                ("[w]", "Web page"),
                ("[q]", "Quit"),
            ],
            (_, Mode::Normal) => &[
                ("[↑↓]", "Navigate"),
                ("[c]", "Check out"),
                ("[r]", "Check in"),
                ("[l]", "Assign level"),
                ("[f]", "Reference"),
                ("[w]", "Web page"),
                ("[Esc]", "Catalog"),
                ("[q]", "Quit"),
            ],
        };

        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let spans = hints
            .iter()
            .flat_map(|(key, action)| {
                [
                    Span::styled(*key, key_style),
                    Span::raw(format!(" {action}   ")),
                ]
            })
            .collect::<Vec<_>>();
        Line::from(spans)
    }

    fn draw_prompt(&self, frame: &mut Frame, area: Rect, form: &PromptForm) {
        let popup_area = centered_rect(60, 25, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(form.kind.title())
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = vec![form.build_line(), Line::from("")];
        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "Enter to submit • Esc to cancel",
                Style::default().fg(Color::Gray),
            )));
        }

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        let cursor_x = inner.x + form.prefix().chars().count() as u16 + form.value_len() as u16;
        frame.set_cursor_position((cursor_x, inner.y));
    }

    fn draw_book_preview(&self, frame: &mut Frame, area: Rect, preview: &BookPreview) {
        let popup_area = centered_rect(70, 60, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Book Details")
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let label_style = Style::default().add_modifier(Modifier::BOLD);
        let mut lines: Vec<Line> = preview
            .detail_lines()
            .into_iter()
            .map(|(label, value)| {
                Line::from(vec![
                    Span::styled(format!("{label}: "), label_style),
                    Span::raw(value),
                ])
            })
            .collect();
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Add this book to the inventory? Press Y to confirm or N / Esc to cancel.",
            Style::default().fg(Color::Gray),
        )));

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_confirm_reference(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmReference) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Reference Only")
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            Line::from(format!("Book Title: {}", confirm.title)),
            Line::from(format!(
                "Current Reference Only Status: {}",
                yes_no(confirm.current)
            )),
            Line::from(""),
            Line::from(format!(
                "Change reference only to {}?",
                yes_no(confirm.target())
            )),
            Line::from(Span::styled(
                "Press Y to confirm or N / Esc to cancel.",
                Style::default().fg(Color::Gray),
            )),
        ];

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_tree_picker(&self, frame: &mut Frame, area: Rect, picker: &TreeLevelPicker) {
        let popup_area = centered_rect(60, 50, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(format!("Assign Tree Level to '{}'", picker.title))
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let items = picker
            .levels
            .items
            .iter()
            .map(|level| ListItem::new(level.to_string()))
            .collect();
        self.render_list(frame, inner, items, picker.levels.selected);
    }
}

/// Two-line card for a book plus any screen-specific lines.
fn book_item(book: &Book, tree_level: &str, extra: Vec<Line<'static>>) -> ListItem<'static> {
    let mut heading = vec![Span::styled(
        book.display_title(),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    if book.reference_only {
        heading.push(Span::styled(
            "  [Reference]",
            Style::default().fg(Color::Magenta),
        ));
    }

    let copies_style = if book.copies_available == 0 {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::Green)
    };

    let mut lines = vec![
        Line::from(heading),
        Line::from(vec![
            Span::raw(format!(
                "ISBN {}  •  Published {}  •  ",
                book.isbn,
                book.published_date.as_deref().unwrap_or("-")
            )),
            Span::styled(
                format!(
                    "Copies Available: {}/{}",
                    book.copies_available, book.total_copies
                ),
                copies_style,
            ),
            Span::raw(format!("  •  Tree Level: {tree_level}")),
        ]),
    ];
    lines.extend(extra);
    lines.push(Line::from(""));
    ListItem::new(lines)
}
