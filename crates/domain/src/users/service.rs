//! Account service.

use auth::{PasswordHasher, validate_password_strength};
use chrono::Utc;
use common::{Role, UserId};
use store::{InventoryStore, UserQuery, UserRecord};

use crate::access::Caller;
use crate::error::DomainError;
use crate::paging::PageRequest;

use super::{NewUser, UserChanges, normalize_email, validate_full_name};

/// Service for user accounts and credentials.
pub struct UserService<S: InventoryStore> {
    store: S,
    hasher: PasswordHasher,
}

impl<S: InventoryStore> UserService<S> {
    pub fn new(store: S, hasher: PasswordHasher) -> Self {
        Self { store, hasher }
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, DomainError> {
        let email = normalize_email(&user.email)?;
        validate_full_name(&user.full_name)?;
        validate_password_strength(&user.password)?;

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(DomainError::Conflict("Email already registered".to_string()));
        }

        let now = Utc::now();
        let record = UserRecord {
            id: UserId::new(),
            email,
            hashed_password: self.hasher.hash(&user.password)?,
            full_name: user.full_name.trim().to_string(),
            role: user.role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_user(record.clone()).await?;

        tracing::info!(user_id = %record.id, role = %record.role, "User created");
        Ok(record)
    }

    /// Self-registration. The account always starts as staff.
    #[tracing::instrument(skip(self))]
    pub async fn register(&self, user: NewUser) -> Result<UserRecord, DomainError> {
        self.insert(NewUser {
            role: Role::Staff,
            ..user
        })
        .await
    }

    /// Checks a login. Unknown email and wrong password are indistinguishable.
    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserRecord, DomainError> {
        let user = self.store.find_user_by_email(email.trim()).await?;
        let Some(user) = user.filter(|u| self.hasher.verify(password, &u.hashed_password)) else {
            tracing::warn!(email, "Failed login");
            return Err(DomainError::Unauthenticated(
                "Incorrect email or password".to_string(),
            ));
        };
        if !user.is_active {
            return Err(DomainError::Validation("Inactive user".to_string()));
        }
        Ok(user)
    }

    /// Resolves the subject of a token to an active account.
    pub async fn get_active(&self, id: UserId) -> Result<UserRecord, DomainError> {
        match self.store.get_user(id).await? {
            Some(user) if user.is_active => Ok(user),
            _ => Err(DomainError::Unauthenticated(
                "Could not validate credentials".to_string(),
            )),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn list(
        &self,
        caller: &Caller,
        role: Option<Role>,
        page: PageRequest,
    ) -> Result<Vec<UserRecord>, DomainError> {
        caller.require(Role::Admin, "manage users")?;
        Ok(self
            .store
            .list_users(UserQuery {
                role,
                page: page.page(),
            })
            .await?)
    }

    /// Admin account creation with any role.
    #[tracing::instrument(skip(self))]
    pub async fn create(&self, caller: &Caller, user: NewUser) -> Result<UserRecord, DomainError> {
        caller.require(Role::Admin, "manage users")?;
        self.insert(user).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, caller: &Caller, id: UserId) -> Result<UserRecord, DomainError> {
        caller.require(Role::Admin, "manage users")?;
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| DomainError::not_found("User", id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn update(
        &self,
        caller: &Caller,
        id: UserId,
        changes: UserChanges,
    ) -> Result<UserRecord, DomainError> {
        let mut user = self.get(caller, id).await?;

        if let Some(email) = changes.email {
            let email = normalize_email(&email)?;
            if !email.eq_ignore_ascii_case(&user.email)
                && self.store.find_user_by_email(&email).await?.is_some()
            {
                return Err(DomainError::Conflict("Email already registered".to_string()));
            }
            user.email = email;
        }
        if let Some(full_name) = changes.full_name {
            validate_full_name(&full_name)?;
            user.full_name = full_name.trim().to_string();
        }
        if let Some(password) = changes.password {
            validate_password_strength(&password)?;
            user.hashed_password = self.hasher.hash(&password)?;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        if let Some(is_active) = changes.is_active {
            user.is_active = is_active;
        }
        user.updated_at = Utc::now();

        self.store.update_user(user.clone()).await?;
        tracing::info!(user_id = %id, "User updated");
        Ok(user)
    }

    /// Deletes an account. Admins cannot delete themselves, and accounts
    /// referenced by items or counts are kept.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, caller: &Caller, id: UserId) -> Result<(), DomainError> {
        caller.require(Role::Admin, "manage users")?;
        if caller.is(id) {
            return Err(DomainError::Forbidden(
                "Cannot delete your own account".to_string(),
            ));
        }
        if !self.store.delete_user(id).await? {
            return Err(DomainError::not_found("User", id));
        }
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    /// Creates the given admin account unless the email is already taken.
    ///
    /// Returns the new account, or `None` when one already existed.
    pub async fn ensure_admin(&self, admin: NewUser) -> Result<Option<UserRecord>, DomainError> {
        if self.store.find_user_by_email(admin.email.trim()).await?.is_some() {
            return Ok(None);
        }
        let created = self
            .insert(NewUser {
                role: Role::Admin,
                ..admin
            })
            .await?;
        Ok(Some(created))
    }
}
