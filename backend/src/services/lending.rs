//! Borrow/return workflow across the book and user domains
//!
//! The book domain's ledger is authoritative: it checks availability, records
//! the transaction and computes fines. After a successful step the outcome is
//! enriched with fresh book and user snapshots, each fetched on its own so a
//! failing lookup only blanks its own field.
//!
//! The user domain's loan counters are not touched here. Whoever owns that
//! store reconciles it.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::{debug, error, info, warn};

use super::rpc::{
    BackendClients, BookRecord, BorrowReply, BorrowRequest, ReturnReply, ReturnRequest, RpcError,
    UserRecord,
};
use super::validation::{self, Violations};
use crate::error::{GatewayError, GatewayResult};

pub const DEFAULT_LOAN_PERIOD_DAYS: i64 = 14;

/// Result of a borrow attempt
#[derive(Debug, Clone)]
pub struct BorrowOutcome {
    pub success: bool,
    pub message: String,
    pub error_code: Option<&'static str>,
    pub transaction_id: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub book: Option<BookRecord>,
    pub user: Option<UserRecord>,
}

impl BorrowOutcome {
    fn failed(error: GatewayError) -> Self {
        let descriptor = error.describe();
        Self::rejected(descriptor.code, descriptor.message)
    }

    fn rejected(code: &'static str, message: String) -> Self {
        Self {
            success: false,
            message,
            error_code: Some(code),
            transaction_id: None,
            due_date: None,
            book: None,
            user: None,
        }
    }
}

/// Result of a return attempt
#[derive(Debug, Clone)]
pub struct ReturnOutcome {
    pub success: bool,
    pub message: String,
    pub error_code: Option<&'static str>,
    pub transaction_id: Option<String>,
    pub return_date: Option<DateTime<Utc>>,
    pub fine_amount: f64,
    pub book: Option<BookRecord>,
    pub user: Option<UserRecord>,
}

impl ReturnOutcome {
    fn failed(error: GatewayError) -> Self {
        let descriptor = error.describe();
        Self::rejected(descriptor.code, descriptor.message)
    }

    fn rejected(code: &'static str, message: String) -> Self {
        Self {
            success: false,
            message,
            error_code: Some(code),
            transaction_id: None,
            return_date: None,
            fine_amount: 0.0,
            book: None,
            user: None,
        }
    }
}

pub struct LendingService {
    clients: BackendClients,
    loan_period: Duration,
}

impl LendingService {
    pub fn new(clients: BackendClients, loan_period_days: i64) -> Arc<Self> {
        Arc::new(Self {
            clients,
            loan_period: Duration::days(loan_period_days),
        })
    }

    /// Borrow a book. `Err` only for input that never reached a backend.
    pub async fn borrow(
        &self,
        book_id: &str,
        user_id: &str,
        due_date: Option<DateTime<Utc>>,
    ) -> GatewayResult<BorrowOutcome> {
        let now = Utc::now();

        let mut violations = Violations::new();
        validation::required_id(&mut violations, "bookId", book_id);
        validation::required_id(&mut violations, "userId", user_id);
        if let Some(due) = due_date {
            validation::future_date(&mut violations, "dueDate", due, now);
        }
        violations.finish()?;

        let due_date = due_date.unwrap_or(now + self.loan_period);
        info!(book_id, user_id, due_date = %due_date, "Processing borrow request");

        let reply: BorrowReply = match self
            .clients
            .books
            .borrow_book(BorrowRequest {
                book_id: book_id.to_string(),
                user_id: user_id.to_string(),
                borrow_epoch: now.timestamp(),
                due_epoch: due_date.timestamp(),
            })
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                log_call_failure("BorrowBook", book_id, user_id, &e);
                return Ok(BorrowOutcome::failed(e.into()));
            }
        };

        if !reply.success {
            info!(book_id, user_id, reason = %reply.message, "Borrow rejected");
            let code = GatewayError::rejected(reply.message.clone()).code();
            return Ok(BorrowOutcome::rejected(code, reply.message));
        }

        info!(
            book_id,
            user_id,
            transaction_id = ?reply.transaction_id,
            "Book borrowed"
        );

        let (book, user) = self.snapshots(book_id, user_id).await;

        Ok(BorrowOutcome {
            success: true,
            message: reply.message,
            error_code: None,
            transaction_id: reply.transaction_id,
            due_date: reply
                .due_epoch
                .and_then(|epoch| Utc.timestamp_opt(epoch, 0).single())
                .or(Some(due_date)),
            book,
            user,
        })
    }

    /// Return a book. `Err` only for input that never reached a backend.
    pub async fn return_book(
        &self,
        book_id: &str,
        user_id: &str,
        return_date: Option<DateTime<Utc>>,
    ) -> GatewayResult<ReturnOutcome> {
        let mut violations = Violations::new();
        validation::required_id(&mut violations, "bookId", book_id);
        validation::required_id(&mut violations, "userId", user_id);
        violations.finish()?;

        let return_date = return_date.unwrap_or_else(Utc::now);
        info!(book_id, user_id, return_date = %return_date, "Processing return request");

        let reply: ReturnReply = match self
            .clients
            .books
            .return_book(ReturnRequest {
                book_id: book_id.to_string(),
                user_id: user_id.to_string(),
                return_epoch: return_date.timestamp(),
            })
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                log_call_failure("ReturnBook", book_id, user_id, &e);
                return Ok(ReturnOutcome::failed(e.into()));
            }
        };

        if !reply.success {
            info!(book_id, user_id, reason = %reply.message, "Return rejected");
            let code = GatewayError::rejected(reply.message.clone()).code();
            return Ok(ReturnOutcome::rejected(code, reply.message));
        }

        info!(
            book_id,
            user_id,
            transaction_id = ?reply.transaction_id,
            fine_amount = reply.fine_amount,
            "Book returned"
        );

        let (book, user) = self.snapshots(book_id, user_id).await;

        Ok(ReturnOutcome {
            success: true,
            message: reply.message,
            error_code: None,
            transaction_id: reply.transaction_id,
            return_date: reply
                .return_epoch
                .and_then(|epoch| Utc.timestamp_opt(epoch, 0).single())
                .or(Some(return_date)),
            fine_amount: reply.fine_amount,
            book,
            user,
        })
    }

    /// Fresh book and user records for a completed step, fetched directly.
    async fn snapshots(&self, book_id: &str, user_id: &str) -> (Option<BookRecord>, Option<UserRecord>) {
        let (book, user) = tokio::join!(
            self.clients.books.get_book(book_id),
            self.clients.users.get_user(user_id),
        );
        (
            settle(book, "book", book_id),
            settle(user, "user", user_id),
        )
    }
}

fn log_call_failure(call: &'static str, book_id: &str, user_id: &str, e: &RpcError) {
    if e.is_transient() {
        warn!(call, book_id, user_id, error = %e, "Book service unreachable");
    } else {
        error!(call, book_id, user_id, error = %e, "Book service call failed");
    }
}

fn settle<T>(result: Result<Option<T>, RpcError>, entity: &'static str, id: &str) -> Option<T> {
    match result {
        Ok(Some(record)) => Some(record),
        Ok(None) => {
            debug!(entity, id, "Snapshot not found");
            None
        }
        Err(e) => {
            warn!(entity, id, error = %e, "Could not fetch {} details for response", entity);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::rpc::memory::{Fault, InMemoryBookService, InMemoryUserService, sample};
    use crate::services::rpc::{BookRecord, LoanStatus};
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    struct Harness {
        books: Arc<InMemoryBookService>,
        users: Arc<InMemoryUserService>,
        lending: Arc<LendingService>,
    }

    fn harness() -> Harness {
        let books = Arc::new(InMemoryBookService::new(1.0));
        let users = Arc::new(InMemoryUserService::new());
        sample::seed(&books, &users);
        let lending = LendingService::new(
            BackendClients::new(books.clone(), users.clone()),
            DEFAULT_LOAN_PERIOD_DAYS,
        );
        Harness {
            books,
            users,
            lending,
        }
    }

    fn single_copy_book(h: &Harness) -> String {
        h.books.add_book(BookRecord {
            id: String::new(),
            title: "Snow Crash".to_string(),
            author: "Neal Stephenson".to_string(),
            isbn: None,
            publisher: None,
            publication_year: Some(1992),
            genre: Some("Science Fiction".to_string()),
            total_copies: 1,
            available_copies: 1,
            description: None,
            language: None,
            pages: None,
        })
    }

    #[tokio::test]
    async fn test_borrow_enriches_with_snapshots() {
        let h = harness();
        let book_id = single_copy_book(&h);

        let outcome = h.lending.borrow(&book_id, "3", None).await.unwrap();

        assert!(outcome.success);
        assert!(outcome.transaction_id.is_some());
        assert_eq!(outcome.book.map(|b| b.available_copies), Some(0));
        assert_eq!(outcome.user.map(|u| u.username), Some("carol".to_string()));
        assert_eq!(h.books.book(&book_id).unwrap().available_copies, 0);
    }

    #[tokio::test]
    async fn test_default_due_date_is_one_loan_period_out() {
        let h = harness();
        let book_id = single_copy_book(&h);

        let before = Utc::now();
        let outcome = h.lending.borrow(&book_id, "3", None).await.unwrap();

        let due = outcome.due_date.unwrap();
        let expected = before + Duration::days(DEFAULT_LOAN_PERIOD_DAYS);
        assert!((due - expected).num_seconds().abs() <= 2);
    }

    #[tokio::test]
    async fn test_borrow_without_copies_fails_and_changes_nothing() {
        let h = harness();
        let book_id = single_copy_book(&h);
        h.lending.borrow(&book_id, "1", None).await.unwrap();

        let outcome = h.lending.borrow(&book_id, "2", None).await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.message, "Book is not available for borrowing");
        assert_eq!(outcome.error_code, Some("PRECONDITION_FAILED"));
        assert!(outcome.book.is_none());
        assert_eq!(h.books.book(&book_id).unwrap().available_copies, 0);
        assert_eq!(h.books.loans().iter().filter(|l| l.book_id == book_id).count(), 1);
    }

    #[tokio::test]
    async fn test_borrow_unknown_book_reports_not_found() {
        let h = harness();

        let outcome = h.lending.borrow("999", "1", None).await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.error_code, Some("RESOURCE_NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_return_three_days_late_charges_three() {
        let h = harness();
        let book_id = single_copy_book(&h);
        let due = Utc::now() + Duration::days(2);
        h.lending.borrow(&book_id, "3", Some(due)).await.unwrap();

        let outcome = h
            .lending
            .return_book(&book_id, "3", Some(due + Duration::days(3)))
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.fine_amount, 3.0);
        assert_eq!(h.books.book(&book_id).unwrap().available_copies, 1);
        let loan = h.books.loans().into_iter().find(|l| l.book_id == book_id).unwrap();
        assert_eq!(loan.status, LoanStatus::Returned);
    }

    #[tokio::test]
    async fn test_return_on_time_is_free() {
        let h = harness();
        let book_id = single_copy_book(&h);
        h.lending.borrow(&book_id, "3", None).await.unwrap();

        let outcome = h.lending.return_book(&book_id, "3", None).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.fine_amount, 0.0);
    }

    #[tokio::test]
    async fn test_return_without_loan_is_rejected() {
        let h = harness();
        let book_id = single_copy_book(&h);

        let outcome = h.lending.return_book(&book_id, "3", None).await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.fine_amount, 0.0);
        assert_eq!(outcome.error_code, Some("PRECONDITION_FAILED"));
    }

    #[tokio::test]
    async fn test_failed_enrichment_blanks_only_that_field() {
        let h = harness();
        let book_id = single_copy_book(&h);
        h.users.inject(Fault::PointGet);

        let outcome = h.lending.borrow(&book_id, "3", None).await.unwrap();

        assert!(outcome.success);
        assert!(outcome.transaction_id.is_some());
        assert!(outcome.book.is_some());
        assert!(outcome.user.is_none());
    }

    #[tokio::test]
    async fn test_transport_failure_is_translated_not_retried() {
        let h = harness();
        let book_id = single_copy_book(&h);
        h.books.inject(Fault::Borrow);

        let outcome = h.lending.borrow(&book_id, "3", None).await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.error_code, Some("SERVICE_UNAVAILABLE"));
        assert!(outcome.message.starts_with("Service temporarily unavailable"));
        assert_eq!(h.books.book(&book_id).unwrap().available_copies, 1);
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_backend() {
        let h = harness();
        let loans_before = h.books.loans().len();

        let result = h
            .lending
            .borrow("", "1", Some(Utc::now() - Duration::days(1)))
            .await;

        assert_matches!(result, Err(GatewayError::Validation(msg)) if msg.contains("bookId") && msg.contains("dueDate"));
        assert_eq!(h.books.loans().len(), loans_before);
    }

    #[tokio::test]
    async fn test_user_counters_are_left_to_the_user_domain() {
        let h = harness();
        let book_id = single_copy_book(&h);

        h.lending.borrow(&book_id, "3", None).await.unwrap();

        let carol = h.users.user("3").unwrap();
        assert_eq!(carol.current_borrowed_books, 0);
        assert!(carol.borrowed_book_ids.is_empty());
    }
}
