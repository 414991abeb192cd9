//! Authentication service layer
//!
//! Registration, login and principal management on top of a
//! [`UserRepository`]. Every store round-trip is bounded by the configured
//! store timeout; a timeout is reported like any other store failure.

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use uuid::Uuid;
use validator::Validate;

use super::jwt::{generate_access_token, JwtConfig};
use super::models::{
    ListUsersQuery, LoginRequest, RegisterRequest, UpdateUserRequest, UserWithToken,
};
use super::password::{hash_password_with_config, verify_password, PasswordConfig};
use crate::error::AppError;
use dex_core::{
    Pagination, RepositoryError, User, UserList, UserPublic, UserRepository, UserUpdate,
};

/// Password hashed when the username is unknown, so both login failure
/// paths spend comparable time in Argon2
const DUMMY_PASSWORD: &str = "dex-dummy-password";

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    jwt: JwtConfig,
    password: PasswordConfig,
    store_timeout: Duration,
    dummy_hash: Arc<OnceLock<Option<String>>>,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(
        users: Arc<dyn UserRepository>,
        jwt: JwtConfig,
        password: PasswordConfig,
        store_timeout: Duration,
    ) -> Self {
        Self {
            users,
            jwt,
            password,
            store_timeout,
            dummy_hash: Arc::new(OnceLock::new()),
        }
    }

    pub fn jwt_config(&self) -> &JwtConfig {
        &self.jwt
    }

    /// Run a store call under the store timeout
    async fn store<T, F>(&self, call: F) -> Result<T, RepositoryError>
    where
        F: Future<Output = Result<T, RepositoryError>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RepositoryError::Database(format!(
                "credential store did not answer within {:?}",
                self.store_timeout
            ))),
        }
    }

    fn issue(&self, user: &User) -> Result<UserWithToken, AppError> {
        let token = generate_access_token(&self.jwt, user.id, &user.username)?;
        Ok(UserWithToken {
            user: user.to_public(),
            token,
        })
    }

    /// Register a new principal and issue its first token
    ///
    /// Duplicate usernames fail with [`AppError::AlreadyExists`], whether the
    /// clash is seen by the lookup or only by the store's uniqueness check.
    pub async fn register(&self, request: RegisterRequest) -> Result<UserWithToken, AppError> {
        request.validate()?;

        let username = request.username.trim().to_string();
        if username.is_empty() {
            return Err(AppError::BadRequest("username must not be blank".to_string()));
        }

        match self.store(self.users.find_by_username(&username)).await {
            Ok(_) => return Err(AppError::AlreadyExists),
            Err(RepositoryError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let password = request.password;
        let config = self.password.clone();
        let password_hash =
            run_blocking(move || hash_password_with_config(&password, &config)).await??;
        let user = User::new(username, password_hash, request.role.as_deref());

        let created = self.store(self.users.create(user)).await?;
        tracing::info!(user_id = %created.id, username = %created.username, "User registered");

        self.issue(&created)
    }

    /// Verify credentials and issue a token
    ///
    /// Unknown username and wrong password both fail with
    /// [`AppError::InvalidCredentials`].
    pub async fn login(&self, request: LoginRequest) -> Result<UserWithToken, AppError> {
        request.validate()?;

        // Stored usernames are trimmed at registration
        let username = request.username.trim();
        let user = match self.store(self.users.find_by_username(username)).await {
            Ok(user) => user,
            Err(RepositoryError::NotFound) => {
                self.burn_dummy_verify(request.password).await?;
                return Err(AppError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        let password = request.password;
        let hash = user.password_hash.clone();
        if !run_blocking(move || verify_password(&password, &hash)).await? {
            return Err(AppError::InvalidCredentials);
        }

        self.issue(&user)
    }

    async fn burn_dummy_verify(&self, password: String) -> Result<(), AppError> {
        let dummy = self.dummy_hash.clone();
        let config = self.password.clone();
        run_blocking(move || {
            let hash = dummy.get_or_init(|| hash_password_with_config(DUMMY_PASSWORD, &config).ok());
            if let Some(hash) = hash {
                let _ = verify_password(&password, hash);
            }
        })
        .await
    }

    /// Resolve the principal named by a validated token
    pub async fn resolve_principal(&self, id: Uuid) -> Result<UserPublic, RepositoryError> {
        let user = self.store(self.users.find_by_id(id)).await?;
        Ok(user.to_public())
    }

    pub async fn get_user(&self, id: Uuid) -> Result<UserPublic, AppError> {
        let user = self.store(self.users.find_by_id(id)).await?;
        Ok(user.to_public())
    }

    /// Update the actor's own record
    ///
    /// Changing a role requires an administrator.
    pub async fn update_user(
        &self,
        actor: &UserPublic,
        request: UpdateUserRequest,
    ) -> Result<UserPublic, AppError> {
        request.validate()?;

        let update = UserUpdate {
            username: request.username,
            role: request.role,
        }
        .normalized();

        if update.role.is_some() && !actor.is_admin() {
            return Err(AppError::Forbidden);
        }

        if update.is_empty() {
            return self.get_user(actor.id).await;
        }

        let updated = self.store(self.users.update_fields(actor.id, update)).await?;
        tracing::info!(user_id = %updated.id, "User updated");
        Ok(updated.to_public())
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<(), AppError> {
        self.store(self.users.delete(id)).await?;
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    pub async fn list_users(&self, query: ListUsersQuery) -> Result<UserList, AppError> {
        let page = Pagination::new(query.page, query.size);
        let (users, total) = self.store(self.users.list(page)).await?;

        Ok(page.page_of(total, users.iter().map(User::to_public).collect()))
    }
}

/// Argon2 is CPU-bound; keep it off the async worker threads
async fn run_blocking<T, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("password task failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::validate_access_token;
    use async_trait::async_trait;
    use dex_core::MemoryUserStore;

    fn service_with(users: Arc<dyn UserRepository>, timeout: Duration) -> AuthService {
        AuthService::new(
            users,
            JwtConfig::new("service-test-secret"),
            PasswordConfig::fast(),
            timeout,
        )
    }

    fn service() -> AuthService {
        service_with(Arc::new(MemoryUserStore::new()), Duration::from_secs(5))
    }

    fn register_req(username: &str, password: &str, role: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
            role: role.map(str::to_string),
        }
    }

    fn login_req(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Store whose lookups never see existing users, so duplicates are only
    /// caught by `create`
    struct BlindLookupStore(MemoryUserStore);

    #[async_trait]
    impl UserRepository for BlindLookupStore {
        async fn find_by_id(&self, id: Uuid) -> Result<User, RepositoryError> {
            self.0.find_by_id(id).await
        }
        async fn find_by_username(&self, _username: &str) -> Result<User, RepositoryError> {
            Err(RepositoryError::NotFound)
        }
        async fn create(&self, user: User) -> Result<User, RepositoryError> {
            self.0.create(user).await
        }
        async fn update_fields(
            &self,
            id: Uuid,
            update: UserUpdate,
        ) -> Result<User, RepositoryError> {
            self.0.update_fields(id, update).await
        }
        async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
            self.0.delete(id).await
        }
        async fn list(&self, page: Pagination) -> Result<(Vec<User>, i64), RepositoryError> {
            self.0.list(page).await
        }
    }

    /// Store that never answers in time
    struct StalledStore;

    #[async_trait]
    impl UserRepository for StalledStore {
        async fn find_by_id(&self, _id: Uuid) -> Result<User, RepositoryError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(RepositoryError::NotFound)
        }
        async fn find_by_username(&self, _username: &str) -> Result<User, RepositoryError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(RepositoryError::NotFound)
        }
        async fn create(&self, user: User) -> Result<User, RepositoryError> {
            Ok(user)
        }
        async fn update_fields(
            &self,
            _id: Uuid,
            _update: UserUpdate,
        ) -> Result<User, RepositoryError> {
            Err(RepositoryError::NotFound)
        }
        async fn delete(&self, _id: Uuid) -> Result<(), RepositoryError> {
            Ok(())
        }
        async fn list(&self, _page: Pagination) -> Result<(Vec<User>, i64), RepositoryError> {
            Ok((Vec::new(), 0))
        }
    }

    #[tokio::test]
    async fn test_register_issues_token() {
        let service = service();
        let result = service
            .register(register_req("alice", "secret1", None))
            .await
            .unwrap();

        assert_eq!(result.user.username, "alice");
        assert_eq!(result.user.role.as_deref(), Some("user"));

        let claims = validate_access_token(service.jwt_config(), &result.token).unwrap();
        assert_eq!(claims.id, result.user.id.simple().to_string());
        assert_eq!(claims.username, "alice");
    }

    #[tokio::test]
    async fn test_register_keeps_requested_role() {
        let service = service();
        let result = service
            .register(register_req("root", "secret1", Some(" Admin ")))
            .await
            .unwrap();
        assert_eq!(result.user.role.as_deref(), Some("admin"));

        let result = service
            .register(register_req("bob", "secret1", Some("")))
            .await
            .unwrap();
        assert_eq!(result.user.role.as_deref(), Some("user"));
    }

    #[tokio::test]
    async fn test_register_duplicate() {
        let service = service();
        service
            .register(register_req("alice", "secret1", None))
            .await
            .unwrap();

        let result = service.register(register_req("alice", "other-pw", None)).await;
        assert!(matches!(result, Err(AppError::AlreadyExists)));
    }

    #[tokio::test]
    async fn test_register_duplicate_caught_by_store() {
        let service = service_with(
            Arc::new(BlindLookupStore(MemoryUserStore::new())),
            Duration::from_secs(5),
        );
        service
            .register(register_req("alice", "secret1", None))
            .await
            .unwrap();

        let result = service.register(register_req("alice", "secret1", None)).await;
        assert!(matches!(result, Err(AppError::AlreadyExists)));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let service = service();

        let result = service.register(register_req("alice", "abc", None)).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = service.register(register_req("   ", "secret1", None)).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_register_multibyte_password_over_byte_cap() {
        let service = service();

        let result = service.register(register_req("zoe", &"é".repeat(40), None)).await;
        let err = result.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn test_login_trims_username_like_register() {
        let service = service();
        let registered = service
            .register(register_req(" alice ", "secret1", None))
            .await
            .unwrap();
        assert_eq!(registered.user.username, "alice");

        for input in [" alice ", "alice", "alice  "] {
            let logged_in = service.login(login_req(input, "secret1")).await.unwrap();
            assert_eq!(logged_in.user.id, registered.user.id);
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_hashing_runs_off_the_runtime_thread() {
        let runtime_thread = std::thread::current().id();
        let worker = run_blocking(|| std::thread::current().id()).await.unwrap();
        assert_ne!(runtime_thread, worker);
    }

    #[tokio::test]
    async fn test_login() {
        let service = service();
        let registered = service
            .register(register_req("alice", "secret1", None))
            .await
            .unwrap();

        let logged_in = service.login(login_req("alice", "secret1")).await.unwrap();
        assert_eq!(logged_in.user.id, registered.user.id);
        assert!(validate_access_token(service.jwt_config(), &logged_in.token).is_ok());
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let service = service();
        service
            .register(register_req("alice", "secret1", None))
            .await
            .unwrap();

        let wrong_password = service.login(login_req("alice", "wrongpass")).await;
        let unknown_user = service.login(login_req("mallory", "secret1")).await;

        let wrong_password = wrong_password.unwrap_err();
        let unknown_user = unknown_user.unwrap_err();
        assert!(matches!(wrong_password, AppError::InvalidCredentials));
        assert!(matches!(unknown_user, AppError::InvalidCredentials));
        assert_eq!(
            serde_json::to_string(&wrong_password.to_api_error()).unwrap(),
            serde_json::to_string(&unknown_user.to_api_error()).unwrap()
        );
    }

    #[tokio::test]
    async fn test_store_timeout_is_internal() {
        let service = service_with(Arc::new(StalledStore), Duration::from_millis(20));

        let result = service.login(login_req("alice", "secret1")).await;
        assert!(matches!(result, Err(AppError::Internal(_))));

        let result = service.register(register_req("alice", "secret1", None)).await;
        assert!(matches!(result, Err(AppError::Internal(_))));

        let result = service.resolve_principal(Uuid::new_v4()).await;
        assert!(matches!(result, Err(RepositoryError::Database(_))));
    }

    #[tokio::test]
    async fn test_update_username() {
        let service = service();
        let alice = service
            .register(register_req("alice", "secret1", None))
            .await
            .unwrap()
            .user;

        let updated = service
            .update_user(
                &alice,
                UpdateUserRequest {
                    username: Some("alice2".to_string()),
                    role: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.username, "alice2");
        assert!(service.login(login_req("alice2", "secret1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_username_clash() {
        let service = service();
        let alice = service
            .register(register_req("alice", "secret1", None))
            .await
            .unwrap()
            .user;
        service
            .register(register_req("bob", "secret1", None))
            .await
            .unwrap();

        let result = service
            .update_user(
                &alice,
                UpdateUserRequest {
                    username: Some("bob".to_string()),
                    role: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::AlreadyExists)));
    }

    #[tokio::test]
    async fn test_role_change_requires_admin() {
        let service = service();
        let alice = service
            .register(register_req("alice", "secret1", None))
            .await
            .unwrap()
            .user;

        let escalate = UpdateUserRequest {
            username: None,
            role: Some("admin".to_string()),
        };
        let result = service.update_user(&alice, escalate).await;
        assert!(matches!(result, Err(AppError::Forbidden)));

        let root = service
            .register(register_req("root", "secret1", Some("admin")))
            .await
            .unwrap()
            .user;
        let demoted = service
            .update_user(
                &root,
                UpdateUserRequest {
                    username: None,
                    role: Some("auditor".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(demoted.role.as_deref(), Some("auditor"));
    }

    #[tokio::test]
    async fn test_get_and_delete_user() {
        let service = service();
        let alice = service
            .register(register_req("alice", "secret1", None))
            .await
            .unwrap()
            .user;

        assert_eq!(service.get_user(alice.id).await.unwrap(), alice);

        service.delete_user(alice.id).await.unwrap();
        assert!(matches!(
            service.get_user(alice.id).await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(
            service.delete_user(alice.id).await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_list_users_paging() {
        let service = service();
        for name in ["u1", "u2", "u3"] {
            service
                .register(register_req(name, "secret1", None))
                .await
                .unwrap();
        }

        let page = service
            .list_users(ListUsersQuery {
                page: Some(1),
                size: Some(2),
            })
            .await
            .unwrap();

        assert_eq!(page.total_count, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.users.len(), 2);
        assert!(page.has_more);
    }
}
