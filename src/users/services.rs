use std::sync::Arc;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{Argon2Hasher, SessionKeys, TokenGenerator},
    config::AppConfig,
    error::AccountError,
    notify::{Mail, Notifier},
    users::{
        dto::{
            normalize_email, ForgotPasswordRequest, LoginRequest, LoginResponse, Profile,
            RegisterRequest, ResetPasswordRequest,
        },
        repo::{StoreError, UserStore},
        repo_types::{Lookup, NewUser, User, UserChanges, UserSummary},
        validation,
    },
};

pub const PASSWORD_CHANGED: &str = "Password changed successfully.";
pub const ACCOUNT_ACTIVATED: &str = "Account activated successfully.";

/// Same text whether or not the address belongs to an account.
pub fn reset_link_sent(email: &str) -> String {
    format!("If {email} is a valid email, a password reset link has been sent.")
}

fn unavailable(e: StoreError) -> AccountError {
    error!(error = %e, "user store failure");
    AccountError::ServiceUnavailable(e.to_string())
}

/// Orchestrates login, registration, password reset and account activation.
pub struct AccountService {
    config: Arc<AppConfig>,
    store: Arc<dyn UserStore>,
    notifier: Arc<dyn Notifier>,
    hasher: Argon2Hasher,
    tokens: TokenGenerator,
    keys: SessionKeys,
}

impl AccountService {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn UserStore>,
        notifier: Arc<dyn Notifier>,
        hasher: Argon2Hasher,
    ) -> Self {
        let keys = SessionKeys::from_config(&config.jwt);
        Self {
            config,
            store,
            notifier,
            hasher,
            tokens: TokenGenerator::default(),
            keys,
        }
    }

    pub fn keys(&self) -> &SessionKeys {
        &self.keys
    }

    async fn hash_password(&self, plain: String) -> Result<String, AccountError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&plain))
            .await?
            .map_err(|e| AccountError::Internal(e.to_string()))
    }

    async fn verify_password(&self, plain: String, hash: String) -> Result<bool, AccountError> {
        let hasher = self.hasher.clone();
        Ok(tokio::task::spawn_blocking(move || hasher.compare(&plain, &hash)).await?)
    }

    #[instrument(skip_all)]
    pub async fn login(&self, mut req: LoginRequest) -> Result<LoginResponse, AccountError> {
        normalize_email(&mut req.email);
        validation::LOGIN.validate(&req)?;
        let email = req.email.unwrap_or_default();
        let password = req.password.unwrap_or_default();

        let Some(user) = self
            .store
            .find(Lookup::Email(&email))
            .await
            .map_err(unavailable)?
        else {
            warn!("login unknown email");
            return Err(AccountError::Authentication);
        };

        if !user.active {
            warn!(user_id = %user.id, "login on unconfirmed account");
            return Err(AccountError::AccountBlocked);
        }

        if !self.verify_password(password, user.password.clone()).await? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AccountError::Authentication);
        }

        let token = self.keys.issue(user.id).map_err(|e| {
            error!(error = %e, "session token signing failed");
            AccountError::Internal(e.to_string())
        })?;

        info!(user_id = %user.id, "user logged in");
        Ok(LoginResponse {
            user: UserSummary::from(&user),
            token,
        })
    }

    #[instrument(skip_all)]
    pub async fn register(&self, mut req: RegisterRequest) -> Result<UserSummary, AccountError> {
        normalize_email(&mut req.email);
        validation::REGISTER.validate(&req)?;
        let name = req.name.unwrap_or_default().trim().to_string();
        let email = req.email.unwrap_or_default();
        let password = req.password.unwrap_or_default();

        if self
            .store
            .find(Lookup::Email(&email))
            .await
            .map_err(unavailable)?
            .is_some()
        {
            warn!("email already registered");
            return Err(AccountError::Conflict);
        }

        let password = self.hash_password(password).await?;
        let confirmation_token = self.tokens.generate();

        let user = match self
            .store
            .insert(NewUser {
                name,
                email,
                password,
                confirmation_token: confirmation_token.clone(),
            })
            .await
        {
            Ok(u) => u,
            Err(StoreError::DuplicateEmail) => {
                warn!("email registered concurrently");
                return Err(AccountError::Conflict);
            }
            Err(e) => return Err(unavailable(e)),
        };
        info!(user_id = %user.id, "user registered");

        // The account stays committed even if the mail cannot be delivered.
        let mail = Mail::confirm_creation(
            &user.name,
            &user.email,
            self.config.confirmation_url(&confirmation_token),
        );
        if let Err(e) = self.notifier.send(mail).await {
            error!(error = %e, user_id = %user.id, "confirmation mail failed");
        }

        Ok(user)
    }

    #[instrument(skip_all)]
    pub async fn forgot_password(
        &self,
        mut req: ForgotPasswordRequest,
    ) -> Result<String, AccountError> {
        normalize_email(&mut req.email);
        validation::FORGOT_PASSWORD.validate(&req)?;
        let email = req.email.unwrap_or_default();

        let user = self
            .store
            .find(Lookup::Email(&email))
            .await
            .map_err(unavailable)?;

        if user.is_some() {
            let reset_token = self.tokens.generate();
            let changes = UserChanges {
                reset_token: Some(Some(reset_token.clone())),
                ..Default::default()
            };
            let updated = self
                .store
                .update(Lookup::Email(&email), changes)
                .await
                .map_err(unavailable)?;

            if let Some(user) = updated {
                info!(user_id = %user.id, "password reset requested");
                let mail = Mail::reset_password(
                    &user.name,
                    &user.email,
                    self.config.reset_url(&reset_token),
                );
                if let Err(e) = self.notifier.send(mail).await {
                    error!(error = %e, user_id = %user.id, "reset mail failed");
                }
            }
        } else {
            warn!("password reset for unknown email");
        }

        Ok(reset_link_sent(&email))
    }

    /// Resolves an outstanding reset token; any lookup failure is `InvalidToken`.
    pub async fn find_by_reset_token(&self, token: &str) -> Result<User, AccountError> {
        match self.store.find(Lookup::ResetToken(token)).await {
            Ok(Some(u)) => Ok(u),
            Ok(None) => {
                warn!("unknown reset token");
                Err(AccountError::InvalidToken)
            }
            Err(e) => {
                error!(error = %e, "reset token lookup failed");
                Err(AccountError::InvalidToken)
            }
        }
    }

    #[instrument(skip_all)]
    pub async fn reset_password(
        &self,
        token: &str,
        req: ResetPasswordRequest,
    ) -> Result<&'static str, AccountError> {
        let user = self.find_by_reset_token(token).await?;

        validation::RESET_PASSWORD.validate(&req)?;
        let password = self
            .hash_password(req.password.unwrap_or_default())
            .await?;

        // Matching on the token inside the update makes it single-use even
        // under concurrent requests.
        let changes = UserChanges {
            password: Some(password),
            reset_token: Some(None),
            ..Default::default()
        };
        match self.store.update(Lookup::ResetToken(token), changes).await {
            Ok(Some(_)) => {
                info!(user_id = %user.id, "password reset");
                Ok(PASSWORD_CHANGED)
            }
            Ok(None) => {
                warn!(user_id = %user.id, "reset token consumed concurrently");
                Err(AccountError::InvalidToken)
            }
            Err(e) => {
                error!(error = %e, user_id = %user.id, "password update failed");
                Err(AccountError::ResetFailed(e.to_string()))
            }
        }
    }

    #[instrument(skip_all)]
    pub async fn confirm_registration(&self, token: &str) -> Result<&'static str, AccountError> {
        let changes = UserChanges {
            active: Some(true),
            confirmation_token: Some(None),
            ..Default::default()
        };
        match self
            .store
            .update(Lookup::ConfirmationToken(token), changes)
            .await
            .map_err(unavailable)?
        {
            Some(user) => {
                info!(user_id = %user.id, "account activated");
                Ok(ACCOUNT_ACTIVATED)
            }
            None => {
                warn!("unknown confirmation token");
                Err(AccountError::InvalidToken)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn profile(&self, user_id: Uuid) -> Result<Profile, AccountError> {
        self.store
            .find(Lookup::Id(user_id))
            .await
            .map_err(unavailable)?
            .map(Profile::from)
            .ok_or(AccountError::Authentication)
    }
}
