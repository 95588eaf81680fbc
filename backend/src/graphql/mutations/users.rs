use super::prelude::*;
use crate::services::rpc::RegisterRequest;

#[derive(Default)]
pub struct UserMutations;

#[Object]
impl UserMutations {
    /// Register a new member
    async fn register_user(&self, ctx: &Context<'_>, input: UserInput) -> Result<UserResponse> {
        input.validate().map_err(|e| e.extend())?;
        tracing::info!(username = %input.username, email = %input.email, "Registering new user");

        let reply = ctx
            .clients()
            .users
            .register_user(RegisterRequest {
                username: input.username,
                email: input.email,
                first_name: input.first_name,
                last_name: input.last_name,
                phone: input.phone,
                address: input.address,
                membership_type: input.membership_type.into(),
            })
            .await
            .map_err(|e| log_failure("registerUser", e.into()).extend())?;

        if !reply.success {
            tracing::info!(reason = %reply.message, "Registration rejected");
            return Ok(UserResponse::failed(&GatewayError::rejected(reply.message)));
        }

        if let Some(user) = &reply.user {
            tracing::info!(user_id = %user.id, username = %user.username, "User registered");
        }

        Ok(UserResponse {
            success: true,
            message: reply.message,
            error_code: None,
            user: reply.user.map(User),
        })
    }
}
