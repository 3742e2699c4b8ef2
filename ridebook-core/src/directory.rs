use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::auth::{hash_password, verify_password};
use crate::booking::validation::ensure_present;
use crate::error::BookingError;
use crate::models::{NewUser, Role, Signup, User};
use crate::store::UserStore;

/// Roster of registered users.
///
/// Thin service over the user store; the booking engine uses it to check
/// that the actors named in an operation exist with the expected role.
#[derive(Clone)]
pub struct Directory {
    users: Arc<dyn UserStore>,
}

impl Directory {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// All users with role driver.
    pub async fn get_drivers(&self) -> Result<Vec<User>, BookingError> {
        self.users.list_users(Some(Role::Driver)).await
    }

    pub async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>, BookingError> {
        self.users.list_users(role).await
    }

    pub async fn get_user(&self, email: &str) -> Result<Option<User>, BookingError> {
        self.users.get_user(email).await
    }

    /// Whether `email` is registered with exactly `role`.
    pub async fn user_exists(&self, email: &str, role: Role) -> Result<bool, BookingError> {
        Ok(self
            .users
            .get_user(email)
            .await?
            .is_some_and(|user| user.role == role))
    }

    /// Registers a new account with a bcrypt password digest.
    #[instrument(skip(self, signup), fields(email = %signup.email, role = %signup.role))]
    pub async fn signup(&self, signup: Signup) -> Result<User, BookingError> {
        ensure_present("email", &signup.email)?;
        ensure_present("username", &signup.username)?;
        ensure_present("password", &signup.password)?;

        let password_hash = hash_password(&signup.password)?;
        let user = self
            .users
            .create_user(NewUser {
                email: signup.email.trim().to_string(),
                username: signup.username.trim().to_string(),
                password_hash,
                role: signup.role,
                profile: signup.profile,
            })
            .await?;

        info!("Registered {} {}", user.role, user.email);
        Ok(user)
    }

    /// Checks credentials. Unknown email and wrong password both yield `None`.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, BookingError> {
        let Some(user) = self.users.get_user(email.trim()).await? else {
            warn!("Login attempt for unknown email {}", email);
            return Ok(None);
        };

        if verify_password(password, &user.password_hash) {
            Ok(Some(user))
        } else {
            warn!("Login attempt with wrong password for {}", email);
            Ok(None)
        }
    }

    /// Removes an account.
    ///
    /// Refused while the user is on a pending or accepted ride; finished
    /// rides keep the email as a historical reference.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, email: &str) -> Result<(), BookingError> {
        if self.users.delete_user(email).await? {
            info!("Deleted user {}", email);
            Ok(())
        } else {
            Err(BookingError::not_found(format!("user {} not found", email)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Profile;
    use crate::store::MemoryStore;

    fn signup(email: &str, role: Role) -> Signup {
        Signup {
            email: email.to_string(),
            username: email.split('@').next().unwrap_or_default().to_string(),
            password: "password123".to_string(),
            role,
            profile: Profile::default(),
        }
    }

    fn directory() -> Directory {
        Directory::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_signup_and_login() {
        let directory = directory();
        let user = directory.signup(signup("customer@test.com", Role::Customer)).await.unwrap();
        assert_ne!(user.password_hash, "password123");

        let found = directory
            .authenticate("customer@test.com", "password123")
            .await
            .unwrap();
        assert_eq!(found.map(|u| u.email), Some("customer@test.com".to_string()));

        assert!(directory
            .authenticate("customer@test.com", "wrong")
            .await
            .unwrap()
            .is_none());
        assert!(directory
            .authenticate("nobody@test.com", "password123")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let directory = directory();
        directory.signup(signup("driver@test.com", Role::Driver)).await.unwrap();
        let again = directory.signup(signup("driver@test.com", Role::Customer)).await;
        assert!(matches!(again, Err(BookingError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_empty_fields_rejected() {
        let directory = directory();
        let mut request = signup("x@test.com", Role::Customer);
        request.password = "  ".to_string();
        assert!(matches!(
            directory.signup(request).await,
            Err(BookingError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_roster_filters_by_role() {
        let directory = directory();
        directory.signup(signup("customer@test.com", Role::Customer)).await.unwrap();
        directory.signup(signup("driver@test.com", Role::Driver)).await.unwrap();
        directory.signup(signup("admin@test.com", Role::Admin)).await.unwrap();

        let drivers = directory.get_drivers().await.unwrap();
        assert_eq!(drivers.len(), 1);
        assert_eq!(drivers[0].email, "driver@test.com");

        assert!(directory.user_exists("driver@test.com", Role::Driver).await.unwrap());
        assert!(!directory.user_exists("driver@test.com", Role::Customer).await.unwrap());
        assert!(!directory.user_exists("ghost@test.com", Role::Driver).await.unwrap());
        assert_eq!(directory.list_users(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_unknown_user() {
        let directory = directory();
        assert!(matches!(
            directory.delete_user("ghost@test.com").await,
            Err(BookingError::NotFound(_))
        ));
    }
}
