#[cfg(test)]
pub mod test_db {
    use crate::db::{CURRENT_SCHEMA, Migrator, create_user};
    use crate::error::AppError;
    use crate::models::Profile;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};
    use std::collections::HashMap;
    use std::sync::Once;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    pub struct TestUser {
        pub username: String,
        pub full_name: Option<String>,
        pub is_admin: bool,
        pub password: String,
    }

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn learner(mut self, username: &str, full_name: Option<&str>) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                full_name: full_name.map(String::from),
                is_admin: false,
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn admin(mut self, username: &str, full_name: Option<&str>) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                full_name: full_name.map(String::from),
                is_admin: true,
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn user_with_password(mut self, username: &str, password: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                full_name: None,
                is_admin: false,
                password: password.to_string(),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder()
                    .parse_filters("debug")
                    .is_test(true)
                    .try_init();
            });

            let pool = empty_pool().await?;
            Migrator::new(pool.clone(), CURRENT_SCHEMA, false)
                .migrate()
                .await?;

            let mut user_id_map: HashMap<String, i64> = HashMap::new();

            for user in &self.users {
                let profile = Profile {
                    full_name: user.full_name.clone(),
                    ..Profile::default()
                };
                let user_id =
                    create_user(&pool, &user.username, &user.password, &profile, user.is_admin)
                        .await?;
                user_id_map.insert(user.username.clone(), user_id);
            }

            Ok(TestDb { pool, user_id_map })
        }
    }

    /// A single-connection in-memory database, so every query sees the same
    /// data for the life of the pool.
    pub async fn empty_pool() -> Result<Pool<Sqlite>, AppError> {
        Ok(SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?)
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> Option<i64> {
            self.user_id_map.get(username).copied()
        }
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::test_db::{STANDARD_PASSWORD, TestDb, TestDbBuilder};
    use crate::config::AppConfig;
    use crate::content::Catalog;
    use crate::executor::CodeRunner;
    use crate::tutor::Tutor;
    use crate::{AppState, init_rocket};
    use rocket::http::{ContentType, Cookie, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::json;
    use std::time::Duration;

    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .learner("learner_user", Some("Ada Learner"))
            .learner("other_learner", None)
            .admin("admin_user", Some("Admin User"))
            .build()
            .await
            .expect("Failed to build test database")
    }

    /// Learner code runs through `sh` so the tests do not need Python.
    pub fn shell_runner() -> CodeRunner {
        CodeRunner::new("sh", vec!["-s".to_string()]).with_timeout(Duration::from_secs(5))
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        setup_test_client_with_tutor(test_db, Tutor::new(None, "TEST PERSONA")).await
    }

    pub async fn setup_test_client_with_tutor(test_db: TestDb, tutor: Tutor) -> (Client, TestDb) {
        let state = AppState {
            pool: test_db.pool.clone(),
            config: AppConfig::default(),
            catalog: Catalog::embedded().expect("Embedded catalog should parse"),
            runner: shell_runner(),
            tutor,
        };

        let client = Client::untracked(init_rocket(state))
            .await
            .expect("Failed to build Rocket client");

        (client, test_db)
    }

    pub async fn login_test_user(
        client: &Client,
        username: &str,
        password: &str,
    ) -> Vec<Cookie<'static>> {
        let response = client
            .post("/api/login")
            .header(ContentType::JSON)
            .body(json!({ "username": username, "password": password }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        let cookies: Vec<Cookie<'static>> = response.cookies().iter().cloned().collect();
        assert!(
            cookies.iter().any(|c| c.name() == "session_token"),
            "Login for {} did not set a session cookie",
            username
        );
        cookies
    }

    pub async fn login_standard(client: &Client, username: &str) -> Vec<Cookie<'static>> {
        login_test_user(client, username, STANDARD_PASSWORD).await
    }
}
