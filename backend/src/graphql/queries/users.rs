use super::prelude::*;
use crate::services::rpc::HistoryRequest;

#[derive(Default)]
pub struct UserQueries;

#[Object]
impl UserQueries {
    /// Get a single user by ID
    async fn user(&self, ctx: &Context<'_>, id: String) -> Result<UserResponse> {
        tracing::info!(user_id = %id, "Fetching user");

        let response = match ctx.clients().users.get_user(&id).await {
            Ok(Some(record)) => UserResponse {
                success: true,
                message: "User retrieved successfully".to_string(),
                error_code: None,
                user: Some(User(record)),
            },
            Ok(None) => UserResponse::failed(&GatewayError::NotFound("User not found".to_string())),
            Err(e) => UserResponse::failed(&log_failure("user", e.into())),
        };
        Ok(response)
    }

    /// A user's loans from the book service's ledger, newest last
    async fn borrow_history(
        &self,
        ctx: &Context<'_>,
        input: BorrowHistoryInput,
    ) -> Result<BorrowHistoryResponse> {
        input.validate().map_err(|e| e.extend())?;
        tracing::info!(
            user_id = %input.user_id,
            status_filter = ?input.status_filter,
            limit = input.limit,
            offset = input.offset,
            "Fetching borrow history"
        );

        let result = ctx
            .clients()
            .books
            .borrow_history(HistoryRequest {
                user_id: input.user_id,
                status_filter: input.status_filter.map(Into::into),
                limit: input.limit,
                offset: input.offset,
            })
            .await;

        Ok(match result {
            Ok(reply) if reply.success => BorrowHistoryResponse {
                success: true,
                message: reply.message,
                error_code: None,
                history: reply.history.into_iter().map(BorrowRecord::from).collect(),
                total_count: reply.total_count,
            },
            Ok(reply) => BorrowHistoryResponse::failed(&GatewayError::rejected(reply.message)),
            Err(e) => BorrowHistoryResponse::failed(&log_failure("borrowHistory", e.into())),
        })
    }
}
