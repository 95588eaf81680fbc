//! In-process book and user domains
//!
//! These implement the same client traits as the HTTP stubs, with the
//! backend-side rules (borrow preconditions, fine computation, registration
//! uniqueness). They serve `BACKEND_MODE=embedded` and double as test
//! backends: every batched lookup is recorded and faults can be injected per
//! call kind.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::StreamExt;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    AccountStatus, BOOK_SERVICE, BookRecord, BookServiceClient, BookStream, BorrowReply,
    BorrowRequest, BorrowTransaction, HistoryEntry, HistoryReply, HistoryRequest, LoanStatus,
    Membership, RegisterReply, RegisterRequest, RelatedIds, ReturnReply, ReturnRequest, RpcError,
    RpcStatus, SearchField, SearchRequest, USER_SERVICE, UserRecord, UserServiceClient,
};

/// Call kinds a fault can be injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    PointGet,
    BatchGet,
    Search,
    Borrowers,
    Borrow,
    Return,
    History,
    Register,
}

/// Per-service call bookkeeping
#[derive(Default)]
struct CallLog {
    point_gets: usize,
    /// Keys of every batched lookup, in call order
    batches: Vec<Vec<String>>,
    faults: HashSet<Fault>,
}

impl CallLog {
    fn check(&mut self, service: &'static str, fault: Fault) -> Result<(), RpcError> {
        if self.faults.contains(&fault) {
            warn!(service, ?fault, "Injected fault");
            return Err(RpcError::unavailable(service, format!("{:?} unavailable", fault)));
        }
        Ok(())
    }
}

fn parse_id(service: &'static str, kind: &str, id: &str) -> Result<u64, RpcError> {
    if id.trim().is_empty() {
        return Err(RpcError::new(
            service,
            RpcStatus::InvalidArgument,
            format!("{} ID cannot be empty", kind),
        ));
    }
    id.parse::<u64>().map_err(|_| {
        RpcError::new(
            service,
            RpcStatus::InvalidArgument,
            format!("{} ID must be a valid number: {}", kind, id),
        )
    })
}

fn from_epoch(service: &'static str, epoch: i64) -> Result<DateTime<Utc>, RpcError> {
    Utc.timestamp_opt(epoch, 0).single().ok_or_else(|| {
        RpcError::new(
            service,
            RpcStatus::InvalidArgument,
            format!("Invalid timestamp: {}", epoch),
        )
    })
}

// ============================================================================
// Book domain
// ============================================================================

#[derive(Default)]
struct BookLedger {
    books: BTreeMap<u64, BookRecord>,
    loans: Vec<BorrowTransaction>,
    next_id: u64,
}

impl BookLedger {
    fn active_loan_mut(&mut self, user_id: &str, book_id: &str) -> Option<&mut BorrowTransaction> {
        self.loans
            .iter_mut()
            .find(|l| l.user_id == user_id && l.book_id == book_id && l.is_active())
    }
}

/// Book inventory plus the authoritative loan ledger
pub struct InMemoryBookService {
    ledger: Mutex<BookLedger>,
    calls: Mutex<CallLog>,
    fine_per_day: f64,
}

impl InMemoryBookService {
    pub fn new(fine_per_day: f64) -> Self {
        Self {
            ledger: Mutex::new(BookLedger {
                next_id: 1,
                ..Default::default()
            }),
            calls: Mutex::new(CallLog::default()),
            fine_per_day,
        }
    }

    /// Add a book, assigning it the next id. Returns the id.
    pub fn add_book(&self, mut book: BookRecord) -> String {
        let mut ledger = self.ledger.lock();
        let id = ledger.next_id;
        ledger.next_id += 1;
        book.id = id.to_string();
        ledger.books.insert(id, book);
        id.to_string()
    }

    /// Record an open loan directly in the ledger (seeding).
    pub fn record_loan(&self, book_id: &str, user_id: &str, borrow_date: DateTime<Utc>, due_date: DateTime<Utc>) {
        let mut ledger = self.ledger.lock();
        let Some(book) = book_id
            .parse::<u64>()
            .ok()
            .and_then(|id| ledger.books.get_mut(&id))
        else {
            warn!(book_id, "Cannot seed loan for unknown book");
            return;
        };
        if book.available_copies > 0 {
            book.available_copies -= 1;
        }
        ledger.loans.push(BorrowTransaction {
            transaction_id: Uuid::new_v4().to_string(),
            book_id: book_id.to_string(),
            user_id: user_id.to_string(),
            borrow_date,
            due_date,
            return_date: None,
            status: LoanStatus::Borrowed,
            fine_amount: 0.0,
        });
    }

    pub fn book(&self, id: &str) -> Option<BookRecord> {
        let id = id.parse::<u64>().ok()?;
        self.ledger.lock().books.get(&id).cloned()
    }

    pub fn loans(&self) -> Vec<BorrowTransaction> {
        self.ledger.lock().loans.clone()
    }

    pub fn inject(&self, fault: Fault) {
        self.calls.lock().faults.insert(fault);
    }

    pub fn clear_faults(&self) {
        self.calls.lock().faults.clear();
    }

    /// Keys of every batched lookup served so far
    pub fn batch_log(&self) -> Vec<Vec<String>> {
        self.calls.lock().batches.clone()
    }

    pub fn point_get_count(&self) -> usize {
        self.calls.lock().point_gets
    }

    fn fine_for(&self, due_date: DateTime<Utc>, return_date: DateTime<Utc>) -> f64 {
        if return_date <= due_date {
            return 0.0;
        }
        let days_late = (return_date - due_date).num_days().max(0);
        days_late as f64 * self.fine_per_day
    }
}

fn matches_search(book: &BookRecord, field: SearchField, query: &str) -> bool {
    let needle = query.to_lowercase();
    let contains = |value: &str| value.to_lowercase().contains(&needle);
    let isbn_eq = || book.isbn.as_deref() == Some(query);
    match field {
        SearchField::Title => contains(&book.title),
        SearchField::Author => contains(&book.author),
        SearchField::Genre => book.genre.as_deref().is_some_and(contains),
        SearchField::Isbn => isbn_eq(),
        SearchField::All => {
            contains(&book.title)
                || contains(&book.author)
                || book.genre.as_deref().is_some_and(contains)
                || isbn_eq()
        }
    }
}

#[async_trait]
impl BookServiceClient for InMemoryBookService {
    async fn get_book(&self, id: &str) -> Result<Option<BookRecord>, RpcError> {
        {
            let mut calls = self.calls.lock();
            calls.check(BOOK_SERVICE, Fault::PointGet)?;
            calls.point_gets += 1;
        }
        let key = parse_id(BOOK_SERVICE, "Book", id)?;
        Ok(self.ledger.lock().books.get(&key).cloned())
    }

    async fn get_books(&self, ids: &[String]) -> Result<Vec<BookRecord>, RpcError> {
        {
            let mut calls = self.calls.lock();
            calls.check(BOOK_SERVICE, Fault::BatchGet)?;
            calls.batches.push(ids.to_vec());
        }
        debug!(count = ids.len(), "Serving batched book lookup");
        let ledger = self.ledger.lock();
        Ok(ids
            .iter()
            .filter_map(|id| id.parse::<u64>().ok())
            .filter_map(|id| ledger.books.get(&id).cloned())
            .collect())
    }

    async fn search_books(&self, request: SearchRequest) -> Result<BookStream, RpcError> {
        self.calls.lock().check(BOOK_SERVICE, Fault::Search)?;
        let limit = if request.limit > 0 { request.limit as usize } else { 10 };
        let offset = request.offset.max(0) as usize;

        let hits: Vec<BookRecord> = self
            .ledger
            .lock()
            .books
            .values()
            .filter(|b| matches_search(b, request.search_type, &request.query))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();

        debug!(query = %request.query, hits = hits.len(), "Book search");
        Ok(futures::stream::iter(hits.into_iter().map(Ok)).boxed())
    }

    async fn list_borrower_ids(&self, book_id: &str) -> Result<RelatedIds, RpcError> {
        self.calls.lock().check(BOOK_SERVICE, Fault::Borrowers)?;
        if let Err(e) = parse_id(BOOK_SERVICE, "Book", book_id) {
            return Ok(RelatedIds {
                success: false,
                message: e.message,
                ids: Vec::new(),
            });
        }
        let ledger = self.ledger.lock();
        let ids = ledger
            .loans
            .iter()
            .filter(|l| l.book_id == book_id && l.is_active())
            .map(|l| l.user_id.clone())
            .collect();
        Ok(RelatedIds {
            success: true,
            message: "Borrowers retrieved successfully".to_string(),
            ids,
        })
    }

    async fn borrow_book(&self, request: BorrowRequest) -> Result<BorrowReply, RpcError> {
        self.calls.lock().check(BOOK_SERVICE, Fault::Borrow)?;
        info!(book_id = %request.book_id, user_id = %request.user_id, "Borrow requested");

        let key = parse_id(BOOK_SERVICE, "Book", &request.book_id)?;
        let borrow_date = from_epoch(BOOK_SERVICE, request.borrow_epoch)?;
        let due_date = from_epoch(BOOK_SERVICE, request.due_epoch)?;

        let rejected = |message: &str| BorrowReply {
            success: false,
            message: message.to_string(),
            transaction_id: None,
            due_epoch: None,
        };

        if due_date <= borrow_date {
            return Ok(rejected("Due date must be after the borrow date"));
        }

        let mut ledger = self.ledger.lock();
        if !ledger.books.contains_key(&key) {
            return Ok(rejected("Book not found"));
        }
        if ledger
            .active_loan_mut(&request.user_id, &request.book_id)
            .is_some()
        {
            return Ok(rejected("User already has this book borrowed"));
        }
        let Some(book) = ledger.books.get_mut(&key) else {
            return Ok(rejected("Book not found"));
        };
        if !book.is_available() {
            return Ok(rejected("Book is not available for borrowing"));
        }
        book.available_copies -= 1;

        let transaction_id = Uuid::new_v4().to_string();
        ledger.loans.push(BorrowTransaction {
            transaction_id: transaction_id.clone(),
            book_id: request.book_id.clone(),
            user_id: request.user_id.clone(),
            borrow_date,
            due_date,
            return_date: None,
            status: LoanStatus::Borrowed,
            fine_amount: 0.0,
        });

        Ok(BorrowReply {
            success: true,
            message: "Book borrowed successfully".to_string(),
            transaction_id: Some(transaction_id),
            due_epoch: Some(request.due_epoch),
        })
    }

    async fn return_book(&self, request: ReturnRequest) -> Result<ReturnReply, RpcError> {
        self.calls.lock().check(BOOK_SERVICE, Fault::Return)?;
        info!(book_id = %request.book_id, user_id = %request.user_id, "Return requested");

        let key = parse_id(BOOK_SERVICE, "Book", &request.book_id)?;
        let return_date = from_epoch(BOOK_SERVICE, request.return_epoch)?;

        let mut ledger = self.ledger.lock();
        let Some(loan) = ledger.active_loan_mut(&request.user_id, &request.book_id) else {
            return Ok(ReturnReply {
                success: false,
                message: "No active borrow record found for this book and user".to_string(),
                transaction_id: None,
                return_epoch: None,
                fine_amount: 0.0,
            });
        };

        let fine_amount = self.fine_for(loan.due_date, return_date);
        loan.return_date = Some(return_date);
        loan.status = LoanStatus::Returned;
        loan.fine_amount = fine_amount;
        let transaction_id = loan.transaction_id.clone();

        if let Some(book) = ledger.books.get_mut(&key)
            && book.available_copies < book.total_copies
        {
            book.available_copies += 1;
        }

        Ok(ReturnReply {
            success: true,
            message: "Book returned successfully".to_string(),
            transaction_id: Some(transaction_id),
            return_epoch: Some(request.return_epoch),
            fine_amount,
        })
    }

    async fn borrow_history(&self, request: HistoryRequest) -> Result<HistoryReply, RpcError> {
        self.calls.lock().check(BOOK_SERVICE, Fault::History)?;
        let now = Utc::now();
        let ledger = self.ledger.lock();

        let matching: Vec<HistoryEntry> = ledger
            .loans
            .iter()
            .filter(|l| l.user_id == request.user_id)
            .filter(|l| {
                request
                    .status_filter
                    .is_none_or(|status| l.effective_status(now) == status)
            })
            .map(|l| {
                let book_title = l
                    .book_id
                    .parse::<u64>()
                    .ok()
                    .and_then(|id| ledger.books.get(&id))
                    .map(|b| b.title.clone())
                    .unwrap_or_default();
                let mut transaction = l.clone();
                transaction.status = l.effective_status(now);
                HistoryEntry {
                    transaction,
                    book_title,
                }
            })
            .collect();

        let total_count = matching.len() as i32;
        let limit = if request.limit > 0 { request.limit as usize } else { matching.len() };
        let history = matching
            .into_iter()
            .skip(request.offset.max(0) as usize)
            .take(limit)
            .collect();

        Ok(HistoryReply {
            success: true,
            message: "Borrow history retrieved successfully".to_string(),
            history,
            total_count,
        })
    }

    async fn ping(&self) -> Result<(), RpcError> {
        Ok(())
    }
}

// ============================================================================
// User domain
// ============================================================================

#[derive(Default)]
struct UserTable {
    users: BTreeMap<u64, UserRecord>,
    next_id: u64,
}

/// User profiles and their own loan counters
pub struct InMemoryUserService {
    table: Mutex<UserTable>,
    calls: Mutex<CallLog>,
}

impl Default for InMemoryUserService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUserService {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(UserTable {
                next_id: 1,
                ..Default::default()
            }),
            calls: Mutex::new(CallLog::default()),
        }
    }

    /// Add a user, assigning it the next id. Returns the id.
    pub fn add_user(&self, mut user: UserRecord) -> String {
        let mut table = self.table.lock();
        let id = table.next_id;
        table.next_id += 1;
        user.id = id.to_string();
        table.users.insert(id, user);
        id.to_string()
    }

    pub fn user(&self, id: &str) -> Option<UserRecord> {
        let id = id.parse::<u64>().ok()?;
        self.table.lock().users.get(&id).cloned()
    }

    pub fn inject(&self, fault: Fault) {
        self.calls.lock().faults.insert(fault);
    }

    pub fn clear_faults(&self) {
        self.calls.lock().faults.clear();
    }

    pub fn batch_log(&self) -> Vec<Vec<String>> {
        self.calls.lock().batches.clone()
    }

    pub fn point_get_count(&self) -> usize {
        self.calls.lock().point_gets
    }
}

#[async_trait]
impl UserServiceClient for InMemoryUserService {
    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, RpcError> {
        {
            let mut calls = self.calls.lock();
            calls.check(USER_SERVICE, Fault::PointGet)?;
            calls.point_gets += 1;
        }
        let key = parse_id(USER_SERVICE, "User", id)?;
        Ok(self.table.lock().users.get(&key).cloned())
    }

    async fn get_users(&self, ids: &[String]) -> Result<Vec<UserRecord>, RpcError> {
        {
            let mut calls = self.calls.lock();
            calls.check(USER_SERVICE, Fault::BatchGet)?;
            calls.batches.push(ids.to_vec());
        }
        debug!(count = ids.len(), "Serving batched user lookup");
        let table = self.table.lock();
        Ok(ids
            .iter()
            .filter_map(|id| id.parse::<u64>().ok())
            .filter_map(|id| table.users.get(&id).cloned())
            .collect())
    }

    async fn register_user(&self, request: RegisterRequest) -> Result<RegisterReply, RpcError> {
        self.calls.lock().check(USER_SERVICE, Fault::Register)?;
        info!(email = %request.email, "Register requested");

        let mut table = self.table.lock();
        let rejected = |message: &str| RegisterReply {
            success: false,
            message: message.to_string(),
            user: None,
        };
        if table.users.values().any(|u| u.email == request.email) {
            return Ok(rejected("User with this email already exists"));
        }
        if table.users.values().any(|u| u.username == request.username) {
            return Ok(rejected("User with this username already exists"));
        }

        let id = table.next_id;
        table.next_id += 1;
        let user = UserRecord {
            id: id.to_string(),
            username: request.username,
            email: request.email,
            first_name: request.first_name,
            last_name: request.last_name,
            phone: request.phone,
            address: request.address,
            registration_date: Utc::now(),
            status: AccountStatus::Active,
            membership_type: request.membership_type,
            max_books_allowed: request.membership_type.max_books(),
            current_borrowed_books: 0,
            outstanding_fines: 0.0,
            borrowed_book_ids: Vec::new(),
        };
        table.users.insert(id, user.clone());

        Ok(RegisterReply {
            success: true,
            message: "User registered successfully".to_string(),
            user: Some(user),
        })
    }

    async fn ping(&self) -> Result<(), RpcError> {
        Ok(())
    }
}

// ============================================================================
// Sample data
// ============================================================================

pub mod sample {
    //! Seed catalogue for embedded mode

    use chrono::{Duration, Utc};

    use super::{InMemoryBookService, InMemoryUserService};
    use crate::services::rpc::{AccountStatus, BookRecord, Membership, UserRecord};

    #[allow(clippy::too_many_arguments)]
    fn book(
        title: &str,
        author: &str,
        isbn: &str,
        publisher: &str,
        year: i32,
        genre: &str,
        copies: i32,
        pages: i32,
        description: &str,
    ) -> BookRecord {
        BookRecord {
            id: String::new(),
            title: title.to_string(),
            author: author.to_string(),
            isbn: Some(isbn.to_string()),
            publisher: Some(publisher.to_string()),
            publication_year: Some(year),
            genre: Some(genre.to_string()),
            total_copies: copies,
            available_copies: copies,
            description: Some(description.to_string()),
            language: Some("English".to_string()),
            pages: Some(pages),
        }
    }

    fn user(username: &str, first: &str, last: &str, membership: Membership, borrowed: &[&str]) -> UserRecord {
        UserRecord {
            id: String::new(),
            username: username.to_string(),
            email: format!("{}@library.example", username),
            first_name: first.to_string(),
            last_name: last.to_string(),
            phone: None,
            address: None,
            registration_date: Utc::now() - Duration::days(90),
            status: AccountStatus::Active,
            membership_type: membership,
            max_books_allowed: membership.max_books(),
            current_borrowed_books: borrowed.len() as i32,
            outstanding_fines: 0.0,
            borrowed_book_ids: borrowed.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Populate both domains with a small catalogue and two members whose
    /// loans appear consistently in both stores.
    pub fn seed(books: &InMemoryBookService, users: &InMemoryUserService) {
        let catalogue = [
            book("The Great Gatsby", "F. Scott Fitzgerald", "978-0-7432-7356-5", "Scribner", 1925, "Fiction", 5, 180, "A classic American novel set in the Jazz Age"),
            book("To Kill a Mockingbird", "Harper Lee", "978-0-06-112008-4", "J.B. Lippincott & Co.", 1960, "Fiction", 3, 376, "A tale of racial injustice and childhood in the American South"),
            book("1984", "George Orwell", "978-0-452-28423-4", "Secker & Warburg", 1949, "Dystopian Fiction", 4, 328, "A dystopian social science fiction novel"),
            book("Dune", "Frank Herbert", "978-0-441-17271-9", "Chilton Books", 1965, "Science Fiction", 2, 688, "Epic science fiction novel set on the desert planet Arrakis"),
            book("The Pragmatic Programmer", "Andrew Hunt", "978-0-201-61622-4", "Addison-Wesley", 1999, "Technology", 1, 352, "Practical advice for working programmers"),
        ];
        let book_ids: Vec<String> = catalogue.into_iter().map(|b| books.add_book(b)).collect();

        let alice = users.add_user(user("alice", "Alice", "Reader", Membership::Premium, &[book_ids[0].as_str(), book_ids[2].as_str()]));
        let bob = users.add_user(user("bob", "Bob", "Borrower", Membership::Student, &[book_ids[3].as_str()]));
        users.add_user(user("carol", "Carol", "Newcomer", Membership::Basic, &[]));

        let now = Utc::now();
        books.record_loan(&book_ids[0], &alice, now - Duration::days(3), now + Duration::days(11));
        books.record_loan(&book_ids[2], &alice, now - Duration::days(20), now - Duration::days(6));
        books.record_loan(&book_ids[3], &bob, now - Duration::days(1), now + Duration::days(13));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn book_with_copies(copies: i32) -> BookRecord {
        BookRecord {
            id: String::new(),
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            isbn: Some("978-0-441-17271-9".to_string()),
            publisher: None,
            publication_year: Some(1965),
            genre: Some("Science Fiction".to_string()),
            total_copies: copies.max(1),
            available_copies: copies,
            description: None,
            language: None,
            pages: None,
        }
    }

    fn borrow(book_id: &str, user_id: &str) -> BorrowRequest {
        let now = Utc::now();
        BorrowRequest {
            book_id: book_id.to_string(),
            user_id: user_id.to_string(),
            borrow_epoch: now.timestamp(),
            due_epoch: (now + Duration::days(14)).timestamp(),
        }
    }

    #[tokio::test]
    async fn test_borrow_without_copies_leaves_availability_untouched() {
        let service = InMemoryBookService::new(1.0);
        let id = service.add_book(book_with_copies(0));

        let reply = service.borrow_book(borrow(&id, "7")).await.unwrap();

        assert!(!reply.success);
        assert_eq!(reply.message, "Book is not available for borrowing");
        assert_eq!(service.book(&id).unwrap().available_copies, 0);
        assert!(service.loans().is_empty());
    }

    #[tokio::test]
    async fn test_borrow_decrements_and_records_one_loan() {
        let service = InMemoryBookService::new(1.0);
        let id = service.add_book(book_with_copies(2));

        let reply = service.borrow_book(borrow(&id, "7")).await.unwrap();

        assert!(reply.success);
        assert!(reply.transaction_id.is_some());
        assert_eq!(service.book(&id).unwrap().available_copies, 1);
        assert_eq!(service.loans().len(), 1);
    }

    #[tokio::test]
    async fn test_second_borrow_by_same_user_is_rejected_as_active_loan() {
        let service = InMemoryBookService::new(1.0);
        let id = service.add_book(book_with_copies(3));

        assert!(service.borrow_book(borrow(&id, "7")).await.unwrap().success);
        let again = service.borrow_book(borrow(&id, "7")).await.unwrap();

        assert!(!again.success);
        assert_eq!(again.message, "User already has this book borrowed");
        assert_eq!(service.book(&id).unwrap().available_copies, 2);
    }

    #[tokio::test]
    async fn test_return_three_days_late_is_fined_three() {
        let service = InMemoryBookService::new(1.0);
        let id = service.add_book(book_with_copies(1));
        let request = borrow(&id, "7");
        let due_epoch = request.due_epoch;
        service.borrow_book(request).await.unwrap();

        let reply = service
            .return_book(ReturnRequest {
                book_id: id.clone(),
                user_id: "7".to_string(),
                return_epoch: due_epoch + 3 * 86_400,
            })
            .await
            .unwrap();

        assert!(reply.success);
        assert_eq!(reply.fine_amount, 3.0);
        assert_eq!(service.book(&id).unwrap().available_copies, 1);
        assert_eq!(service.loans()[0].status, LoanStatus::Returned);
    }

    #[tokio::test]
    async fn test_return_on_due_date_is_not_fined() {
        let service = InMemoryBookService::new(1.0);
        let id = service.add_book(book_with_copies(1));
        let request = borrow(&id, "7");
        let due_epoch = request.due_epoch;
        service.borrow_book(request).await.unwrap();

        let reply = service
            .return_book(ReturnRequest {
                book_id: id,
                user_id: "7".to_string(),
                return_epoch: due_epoch,
            })
            .await
            .unwrap();

        assert!(reply.success);
        assert_eq!(reply.fine_amount, 0.0);
    }

    #[tokio::test]
    async fn test_return_without_loan_is_rejected() {
        let service = InMemoryBookService::new(1.0);
        let id = service.add_book(book_with_copies(1));

        let reply = service
            .return_book(ReturnRequest {
                book_id: id,
                user_id: "7".to_string(),
                return_epoch: Utc::now().timestamp(),
            })
            .await
            .unwrap();

        assert!(!reply.success);
    }

    #[tokio::test]
    async fn test_batched_lookup_omits_unknown_ids_and_is_logged() {
        let service = InMemoryBookService::new(1.0);
        let id = service.add_book(book_with_copies(1));
        let keys = vec![id.clone(), "999".to_string(), "not-a-number".to_string()];

        let found = service.get_books(&keys).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);
        assert_eq!(service.batch_log(), vec![keys]);
    }

    #[tokio::test]
    async fn test_point_get_rejects_malformed_id() {
        let service = InMemoryBookService::new(1.0);
        let err = service.get_book("abc").await.unwrap_err();
        assert_eq!(err.status, RpcStatus::InvalidArgument);
    }

    #[tokio::test]
    async fn test_injected_fault_surfaces_as_unavailable() {
        let service = InMemoryBookService::new(1.0);
        service.inject(Fault::BatchGet);
        assert_matches!(
            service.get_books(&["1".to_string()]).await,
            Err(RpcError { status: RpcStatus::Unavailable, .. })
        );
        service.clear_faults();
        assert!(service.get_books(&["1".to_string()]).await.is_ok());
    }

    #[tokio::test]
    async fn test_search_by_author() {
        let service = InMemoryBookService::new(1.0);
        let other = InMemoryUserService::new();
        sample::seed(&service, &other);

        let stream = service
            .search_books(SearchRequest {
                query: "herbert".to_string(),
                search_type: SearchField::Author,
                limit: 10,
                offset: 0,
            })
            .await
            .unwrap();
        let hits: Vec<_> = stream.collect().await;

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].as_ref().unwrap().title, "Dune");
    }

    #[tokio::test]
    async fn test_history_filters_on_derived_overdue_status() {
        let books = InMemoryBookService::new(1.0);
        let users = InMemoryUserService::new();
        sample::seed(&books, &users);

        let reply = books
            .borrow_history(HistoryRequest {
                user_id: "1".to_string(),
                status_filter: Some(LoanStatus::Overdue),
                limit: 10,
                offset: 0,
            })
            .await
            .unwrap();

        assert_eq!(reply.total_count, 1);
        assert_eq!(reply.history[0].book_title, "1984");
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_email() {
        let users = InMemoryUserService::new();
        let request = RegisterRequest {
            username: "dana".to_string(),
            email: "dana@library.example".to_string(),
            first_name: "Dana".to_string(),
            last_name: "Scully".to_string(),
            phone: None,
            address: None,
            membership_type: Membership::Student,
        };

        let first = users.register_user(request.clone()).await.unwrap();
        assert!(first.success);
        assert_eq!(first.user.unwrap().max_books_allowed, 5);

        let second = users
            .register_user(RegisterRequest {
                username: "dana2".to_string(),
                ..request
            })
            .await
            .unwrap();
        assert!(!second.success);
        assert_eq!(second.message, "User with this email already exists");
    }
}
