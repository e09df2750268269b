//! Sign-in sessions and profile attributes.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use gradtrack_core::model::UserId;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use crate::error::IdentityError;

pub const MIN_PASSWORD_LEN: usize = 6;

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    /// Bearer token handed to the record store.
    pub access_token: String,
}

/// Attributes a signed-in user may change. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub email: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn current_session(&self) -> Option<Session>;

    /// Receives the new session (or `None`) on every sign-in, sign-out and
    /// profile change.
    fn subscribe(&self) -> watch::Receiver<Option<Session>>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, IdentityError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError>;

    async fn sign_out(&self) -> Result<(), IdentityError>;

    async fn update_profile(&self, update: ProfileUpdate) -> Result<Session, IdentityError>;

    async fn change_password(&self, new_password: &str) -> Result<(), IdentityError>;
}

struct Account {
    user_id: UserId,
    email: String,
    display_name: Option<String>,
    salt: String,
    password_hash: String,
}

impl Account {
    fn session(&self) -> Session {
        Session {
            user_id: self.user_id,
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            access_token: Uuid::new_v4().simple().to_string(),
        }
    }

    fn set_password(&mut self, password: &str) {
        self.salt = Uuid::new_v4().simple().to_string();
        self.password_hash = hash_password(&self.salt, password);
    }

    fn verify(&self, password: &str) -> bool {
        hash_password(&self.salt, password) == self.password_hash
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn normalize_email(raw: &str) -> Result<String, IdentityError> {
    let email = raw.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'));
    if valid {
        Ok(email)
    } else {
        Err(IdentityError::InvalidEmail(raw.trim().to_owned()))
    }
}

fn check_password(password: &str) -> Result<(), IdentityError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(IdentityError::WeakPassword {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Process-local accounts, for tests and the CLI.
pub struct InMemoryIdentityProvider {
    accounts: Mutex<HashMap<String, Account>>,
    session: watch::Sender<Option<Session>>,
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        let (session, _rx) = watch::channel(None);
        Self {
            accounts: Mutex::new(HashMap::new()),
            session,
        }
    }
}

impl InMemoryIdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn accounts(&self) -> std::sync::MutexGuard<'_, HashMap<String, Account>> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, session: Option<Session>) {
        self.session.send_replace(session);
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    fn current_session(&self) -> Option<Session> {
        self.session.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let email = normalize_email(email)?;
        check_password(password)?;
        let session = {
            let mut accounts = self.accounts();
            if accounts.contains_key(&email) {
                return Err(IdentityError::EmailTaken);
            }
            let mut account = Account {
                user_id: UserId::random(),
                email: email.clone(),
                display_name: None,
                salt: String::new(),
                password_hash: String::new(),
            };
            account.set_password(password);
            let session = account.session();
            accounts.insert(email, account);
            session
        };
        info!(user_id = %session.user_id, "account created");
        self.publish(Some(session.clone()));
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let email = normalize_email(email).map_err(|_| IdentityError::InvalidCredentials)?;
        let session = self
            .accounts()
            .get(&email)
            .filter(|account| account.verify(password))
            .map(Account::session)
            .ok_or(IdentityError::InvalidCredentials)?;
        info!(user_id = %session.user_id, "signed in");
        self.publish(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        if self.current_session().is_none() {
            return Err(IdentityError::NotSignedIn);
        }
        self.publish(None);
        Ok(())
    }

    async fn update_profile(&self, update: ProfileUpdate) -> Result<Session, IdentityError> {
        let current = self.current_session().ok_or(IdentityError::NotSignedIn)?;
        let new_email = update.email.as_deref().map(normalize_email).transpose()?;

        let session = {
            let mut accounts = self.accounts();
            if let Some(email) = &new_email {
                if *email != current.email && accounts.contains_key(email) {
                    return Err(IdentityError::EmailTaken);
                }
            }
            let mut account = accounts
                .remove(&current.email)
                .ok_or(IdentityError::NotSignedIn)?;
            if let Some(name) = update.display_name {
                let name = name.trim();
                account.display_name = (!name.is_empty()).then(|| name.to_owned());
            }
            if let Some(email) = new_email {
                account.email = email;
            }
            let session = Session {
                access_token: current.access_token,
                ..account.session()
            };
            accounts.insert(account.email.clone(), account);
            session
        };
        self.publish(Some(session.clone()));
        Ok(session)
    }

    async fn change_password(&self, new_password: &str) -> Result<(), IdentityError> {
        check_password(new_password)?;
        let current = self.current_session().ok_or(IdentityError::NotSignedIn)?;
        let mut accounts = self.accounts();
        let account = accounts
            .get_mut(&current.email)
            .ok_or(IdentityError::NotSignedIn)?;
        account.set_password(new_password);
        info!(user_id = %account.user_id, "password changed");
        Ok(())
    }
}
