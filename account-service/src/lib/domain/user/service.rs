use std::sync::Arc;

use async_trait::async_trait;
use auth::Authenticator;
use chrono::Utc;

use crate::domain::user::models::CreateUserCommand;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::UpdateProfileCommand;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::user::errors::UserError;
use crate::user::ports::UserRepository;
use crate::user::ports::UserServicePort;

/// Domain service implementation for user operations.
///
/// Concrete implementation of UserServicePort with dependency injection.
pub struct UserService<UR>
where
    UR: UserRepository,
{
    repository: Arc<UR>,
    authenticator: Arc<Authenticator>,
}

impl<UR> UserService<UR>
where
    UR: UserRepository,
{
    /// Create a new user service with injected dependencies.
    ///
    /// # Arguments
    /// * `repository` - User persistence implementation
    /// * `authenticator` - Password policy, hashing and verification
    pub fn new(repository: Arc<UR>, authenticator: Arc<Authenticator>) -> Self {
        Self {
            repository,
            authenticator,
        }
    }

    async fn ensure_username_available(
        &self,
        user: &User,
        exclude: Option<&UserId>,
    ) -> Result<(), UserError> {
        match self.repository.find_by_username(&user.username).await? {
            Some(existing) if Some(&existing.id) != exclude => Err(
                UserError::UsernameAlreadyExists(user.username.as_str().to_string()),
            ),
            _ => Ok(()),
        }
    }

    async fn ensure_email_available(
        &self,
        user: &User,
        exclude: Option<&UserId>,
    ) -> Result<(), UserError> {
        match self.repository.find_by_email(&user.email).await? {
            Some(existing) if Some(&existing.id) != exclude => Err(
                UserError::EmailAlreadyExists(user.email.as_str().to_string()),
            ),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl<UR> UserServicePort for UserService<UR>
where
    UR: UserRepository,
{
    async fn register(&self, command: CreateUserCommand) -> Result<User, UserError> {
        self.authenticator.check_policy(&command.password)?;

        let mut user = User {
            id: UserId::new(),
            username: command.username,
            email: command.email,
            password_hash: String::new(),
            created_at: Utc::now(),
        };

        // Friendly field errors first; the storage constraints still decide races.
        self.ensure_username_available(&user, None).await?;
        self.ensure_email_available(&user, None).await?;

        user.password_hash = self.authenticator.hash_password(&command.password)?;

        let created_user = self.repository.create(user).await?;

        tracing::info!(user_id = %created_user.id, "User registered");

        Ok(created_user)
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<User, UserError> {
        let email = match EmailAddress::new(email.to_string()) {
            Ok(email) => email,
            Err(_) => return Err(self.authenticator.reject_unknown_account(password).into()),
        };

        let user = match self.repository.find_by_email(&email).await? {
            Some(user) => user,
            None => return Err(self.authenticator.reject_unknown_account(password).into()),
        };

        self.authenticator
            .verify_password(password, &user.password_hash)?;

        Ok(user)
    }

    async fn get_user(&self, id: &UserId) -> Result<User, UserError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id.to_string()))
    }

    async fn update_profile(
        &self,
        id: &UserId,
        command: UpdateProfileCommand,
    ) -> Result<User, UserError> {
        let mut user = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id.to_string()))?;

        if let Some(new_password) = &command.password {
            self.authenticator.check_policy(new_password)?;
        }

        user.username = command.username;
        user.email = command.email;

        self.ensure_username_available(&user, Some(id)).await?;
        self.ensure_email_available(&user, Some(id)).await?;

        if let Some(new_password) = command.password {
            user.password_hash = self.authenticator.hash_password(&new_password)?;
        }

        let updated_user = self.repository.update(user).await?;

        tracing::info!(user_id = %updated_user.id, "Profile updated");

        Ok(updated_user)
    }
}
