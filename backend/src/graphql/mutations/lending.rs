use super::prelude::*;

#[derive(Default)]
pub struct LendingMutations;

#[Object]
impl LendingMutations {
    /// Borrow a book. Backend rejections come back as `success: false`.
    async fn borrow_book(&self, ctx: &Context<'_>, input: BorrowBookInput) -> Result<BorrowResponse> {
        let outcome = ctx
            .lending()
            .borrow(&input.book_id, &input.user_id, input.due_date)
            .await
            .map_err(|e| e.extend())?;
        Ok(outcome.into())
    }

    /// Return a book, reporting any late fine.
    async fn return_book(&self, ctx: &Context<'_>, input: ReturnBookInput) -> Result<ReturnResponse> {
        let outcome = ctx
            .lending()
            .return_book(&input.book_id, &input.user_id, input.return_date)
            .await
            .map_err(|e| e.extend())?;
        Ok(outcome.into())
    }
}
