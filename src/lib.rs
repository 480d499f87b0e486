#[macro_use]
extern crate rocket;

pub mod auth;
pub mod board;
pub mod db;
pub mod error;
pub mod import;
pub mod models;
pub mod request_logger;
pub mod routes;

use crate::auth::{AuthConfig, AuthState};
use crate::board::{BoardClient, BoardConfig, board_id_from_env};
use crate::db::{EditorialDb, MIGRATOR};
use crate::import::{ImportMappings, PgContentSink, PgLookupSource};
use crate::request_logger::RequestLogger;
use crate::routes::import::ImportContext;
use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use rocket_okapi::{
    openapi_get_routes,
    rapidoc::{GeneralConfig, HideShowConfig, RapiDocConfig, make_rapidoc},
    settings::UrlObject,
    swagger_ui::{SwaggerUIConfig, make_swagger_ui},
};
use std::sync::{Arc, Once};

static LOGGER: Once = Once::new();

pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

pub fn rocket() -> Rocket<Build> {
    init_logger();

    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![Method::Get, Method::Post]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .allow_credentials(true)
        .to_cors()
        .expect("Error creating CORS");

    rocket::build()
        .attach(RequestLogger)
        .attach(EditorialDb::init())
        .attach(cors)
        .attach(AdHoc::try_on_ignite("Run Migrations", |rocket| async move {
            match EditorialDb::fetch(&rocket) {
                Some(db) => match MIGRATOR.run(&**db).await {
                    Ok(()) => {
                        log::info!("database migrations successful");
                        Ok(rocket)
                    }
                    Err(e) => {
                        log::error!("database migrations failed: {}", e);
                        Err(rocket)
                    }
                },
                None => {
                    log::error!("database pool not available for migrations");
                    Err(rocket)
                }
            }
        }))
        .attach(AdHoc::try_on_ignite("Auth State", |rocket| async move {
            match AuthConfig::from_env().and_then(AuthState::from_config) {
                Ok(state) => Ok(rocket.manage(state)),
                Err(err) => {
                    log::error!("failed to initialize auth: {}", err);
                    Err(rocket)
                }
            }
        }))
        .attach(AdHoc::try_on_ignite("Import Context", |rocket| async move {
            let pool = match EditorialDb::fetch(&rocket) {
                Some(db) => (**db).clone(),
                None => {
                    log::error!("database pool not available for import context");
                    return Err(rocket);
                }
            };

            let mappings = match ImportMappings::load(None) {
                Ok(mappings) => mappings,
                Err(err) => {
                    log::error!("{}", err);
                    return Err(rocket);
                }
            };

            // Missing credentials are reported per run, not at startup.
            let board_config = BoardConfig::from_env();
            if board_config.api_key.is_none() || board_config.api_token.is_none() {
                log::warn!("Trello credentials not configured; imports will fail until they are set");
            }
            let board = match BoardClient::new(board_config) {
                Ok(client) => client,
                Err(err) => {
                    log::error!("failed to build board client: {}", err);
                    return Err(rocket);
                }
            };

            let context = ImportContext {
                board: Arc::new(board),
                lookups: Arc::new(PgLookupSource::new(pool.clone())),
                sink: Arc::new(PgContentSink::new(pool)),
                mappings: Arc::new(mappings),
                default_board_id: board_id_from_env(),
            };

            Ok(rocket.manage(context))
        }))
        .mount(
            "/api/v1",
            openapi_get_routes![
                routes::health::health_check,
                routes::import::import_board,
                routes::import::preview_import,
            ],
        )
        .register("/", routes::catchers::all())
        .mount(
            "/api/docs/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../../v1/openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .mount(
            "/api/docs/rapidoc/",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("Editorial Importer API", "../../v1/openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use crate::auth::AuthState;
    use crate::routes::import::ImportContext;
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};

    pub use database::{TestDatabase, TestDatabaseError};

    /// In-memory stand-ins for the board, the lookup tables and the sink.
    pub mod memory {
        use crate::board::{BoardData, BoardError, BoardLabel, BoardList, BoardMember, BoardSource, RawCard};
        use crate::import::{
            ContentSink, LookupError, LookupSource, LookupTables, MappedContent, NewContent, SinkError,
        };
        use crate::models::{ContentAssignment, ContentLink, ExistingImport};
        use async_trait::async_trait;
        use parking_lot::Mutex;
        use reqwest::StatusCode;
        use std::collections::{HashMap, HashSet};
        use uuid::Uuid;

        /// Open card with no labels or members.
        pub fn card(id: &str, list_id: &str, name: &str, description: &str) -> RawCard {
            RawCard {
                id: id.to_string(),
                name: name.to_string(),
                description: description.to_string(),
                due: None,
                id_list: list_id.to_string(),
                id_labels: Vec::new(),
                labels: Vec::new(),
                id_members: Vec::new(),
                members: Vec::new(),
                closed: false,
                url: format!("https://trello.com/c/{id}"),
                short_url: None,
                date_last_activity: None,
            }
        }

        pub fn with_labels(mut card: RawCard, names: &[&str]) -> RawCard {
            card.labels = names
                .iter()
                .map(|name| BoardLabel {
                    id: format!("label-{name}"),
                    id_board: "board".into(),
                    name: name.to_string(),
                    color: None,
                })
                .collect();
            card.id_labels = card.labels.iter().map(|l| l.id.clone()).collect();
            card
        }

        pub fn with_members(mut card: RawCard, usernames: &[&str]) -> RawCard {
            card.members = usernames
                .iter()
                .map(|username| BoardMember {
                    id: format!("member-{username}"),
                    full_name: username.to_string(),
                    username: username.to_string(),
                })
                .collect();
            card.id_members = card.members.iter().map(|m| m.id.clone()).collect();
            card
        }

        pub struct MemoryBoard {
            data: BoardData,
            fail_status: Option<u16>,
        }

        impl MemoryBoard {
            pub fn new(lists: Vec<BoardList>, cards: Vec<RawCard>) -> Self {
                Self {
                    data: BoardData {
                        lists,
                        cards,
                        labels: Vec::new(),
                        members: Vec::new(),
                    },
                    fail_status: None,
                }
            }

            pub fn with_cards(cards: Vec<RawCard>) -> Self {
                Self::new(Vec::new(), cards)
            }

            /// Every card request answers with this HTTP status.
            pub fn failing(status: u16) -> Self {
                Self {
                    fail_status: Some(status),
                    ..Self::with_cards(Vec::new())
                }
            }
        }

        #[async_trait]
        impl BoardSource for MemoryBoard {
            async fn fetch_me(&self) -> Result<BoardMember, BoardError> {
                Ok(BoardMember {
                    id: "me".into(),
                    full_name: "Importer".into(),
                    username: "importer".into(),
                })
            }

            async fn fetch_lists(&self, _board_id: &str) -> Result<Vec<BoardList>, BoardError> {
                Ok(self.data.lists.clone())
            }

            async fn fetch_cards(&self, _board_id: &str) -> Result<Vec<RawCard>, BoardError> {
                match self.fail_status {
                    Some(code) => Err(BoardError::Network {
                        status: StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_GATEWAY),
                        body: "board unavailable".into(),
                    }),
                    None => Ok(self.data.cards.clone()),
                }
            }

            async fn fetch_labels(&self, _board_id: &str) -> Result<Vec<BoardLabel>, BoardError> {
                Ok(self.data.labels.clone())
            }

            async fn fetch_members(&self, _board_id: &str) -> Result<Vec<BoardMember>, BoardError> {
                Ok(self.data.members.clone())
            }
        }

        #[derive(Default)]
        pub struct StaticLookups {
            tables: LookupTables,
            fail: bool,
        }

        impl StaticLookups {
            pub fn new(tables: LookupTables) -> Self {
                Self { tables, fail: false }
            }

            pub fn failing() -> Self {
                Self {
                    tables: LookupTables::default(),
                    fail: true,
                }
            }

            /// Seeded content types and statuses plus the given users.
            pub fn seeded(users: &[(&str, Uuid)]) -> Self {
                let content_types = ["best-list", "resource", "product-page", "brand-page", "opinion"]
                    .iter()
                    .zip(1..)
                    .map(|(slug, id)| (slug.to_string(), id))
                    .collect();
                let workflow_statuses = ["draft", "in_review", "published", "archived"]
                    .iter()
                    .zip(1..)
                    .map(|(slug, id)| (slug.to_string(), id))
                    .collect();
                let users_by_email = users
                    .iter()
                    .map(|(email, id)| (email.to_lowercase(), *id))
                    .collect();

                Self::new(LookupTables {
                    content_types,
                    workflow_statuses,
                    users_by_email,
                })
            }

            fn check(&self) -> Result<(), LookupError> {
                if self.fail {
                    Err(LookupError::Database(sqlx::Error::PoolTimedOut))
                } else {
                    Ok(())
                }
            }
        }

        #[async_trait]
        impl LookupSource for StaticLookups {
            async fn content_types(&self) -> Result<HashMap<String, i32>, LookupError> {
                self.check()?;
                Ok(self.tables.content_types.clone())
            }

            async fn workflow_statuses(&self) -> Result<HashMap<String, i32>, LookupError> {
                self.check()?;
                Ok(self.tables.workflow_statuses.clone())
            }

            async fn users_by_email(&self) -> Result<HashMap<String, Uuid>, LookupError> {
                self.check()?;
                Ok(self.tables.users_by_email.clone())
            }
        }

        #[derive(Debug, Clone)]
        pub struct StoredContent {
            pub id: i64,
            pub mapped: MappedContent,
            pub content_type_id: Option<i32>,
            pub workflow_status_id: Option<i32>,
        }

        #[derive(Default)]
        struct SinkState {
            next_id: i64,
            rows: Vec<StoredContent>,
            links: Vec<(i64, ContentLink)>,
            assignments: Vec<(i64, ContentAssignment)>,
            failing_cards: HashSet<String>,
            fail_secondary: bool,
        }

        /// Sink backed by vectors, with injectable failures.
        #[derive(Default)]
        pub struct MemorySink {
            state: Mutex<SinkState>,
        }

        fn injected(message: &str) -> SinkError {
            SinkError::Database(sqlx::Error::Protocol(message.to_string()))
        }

        impl MemorySink {
            pub fn new() -> Self {
                Self::default()
            }

            /// Primary inserts for this card fail.
            pub fn fail_insert_for(&self, card_id: &str) {
                self.state.lock().failing_cards.insert(card_id.to_string());
            }

            /// Link and assignment inserts fail.
            pub fn fail_secondary_writes(&self) {
                self.state.lock().fail_secondary = true;
            }

            pub fn rows(&self) -> Vec<StoredContent> {
                self.state.lock().rows.clone()
            }

            pub fn links(&self) -> Vec<(i64, ContentLink)> {
                self.state.lock().links.clone()
            }

            pub fn assignments(&self) -> Vec<(i64, ContentAssignment)> {
                self.state.lock().assignments.clone()
            }

            /// Rows, links and assignments written so far.
            pub fn write_count(&self) -> usize {
                let state = self.state.lock();
                state.rows.len() + state.links.len() + state.assignments.len()
            }
        }

        #[async_trait]
        impl ContentSink for MemorySink {
            async fn find_imported(&self, card_id: &str) -> Result<Option<ExistingImport>, SinkError> {
                Ok(self
                    .state
                    .lock()
                    .rows
                    .iter()
                    .find(|row| row.mapped.source_card_id() == Some(card_id))
                    .map(|row| ExistingImport {
                        id: row.id,
                        stage: row.mapped.stage(),
                    }))
            }

            async fn insert_content(&self, content: &NewContent<'_>) -> Result<i64, SinkError> {
                let mut state = self.state.lock();
                if let Some(card_id) = content.mapped.source_card_id() {
                    if state.failing_cards.contains(card_id) {
                        return Err(injected("insert rejected"));
                    }
                }

                state.next_id += 1;
                let id = state.next_id;
                state.rows.push(StoredContent {
                    id,
                    mapped: content.mapped.clone(),
                    content_type_id: content.content_type_id,
                    workflow_status_id: content.workflow_status_id,
                });
                Ok(id)
            }

            async fn insert_links(&self, content_id: i64, links: &[ContentLink]) -> Result<(), SinkError> {
                let mut state = self.state.lock();
                if state.fail_secondary {
                    return Err(injected("link insert rejected"));
                }
                state
                    .links
                    .extend(links.iter().cloned().map(|link| (content_id, link)));
                Ok(())
            }

            async fn insert_assignments(
                &self,
                content_id: i64,
                assignments: &[ContentAssignment],
            ) -> Result<(), SinkError> {
                let mut state = self.state.lock();
                if state.fail_secondary {
                    return Err(injected("assignment insert rejected"));
                }
                state
                    .assignments
                    .extend(assignments.iter().cloned().map(|a| (content_id, a)));
                Ok(())
            }
        }
    }

    pub mod database {
        use crate::db::MIGRATOR;
        use log::LevelFilter;
        use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use sqlx::{ConnectOptions, PgPool};
        use testcontainers::{GenericImage, ImageExt, core::WaitFor};
        use testcontainers_modules::testcontainers::{
            ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;
        use tokio::runtime::Handle;
        use uuid::Uuid;

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("TEST_DATABASE_URL not set")]
            MissingUrl,
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("migration error: {0}")]
            Migration(#[from] sqlx::migrate::MigrateError),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Ephemeral, migrated database for integration tests.
        ///
        /// Uses `TEST_DATABASE_URL` when set, otherwise a disposable Postgres
        /// container when `TEST_DATABASE_CONTAINER=1`. Without either, tests
        /// get [`TestDatabaseError::MissingUrl`] and skip.
        pub struct TestDatabase {
            pool: Option<PgPool>,
            admin_options: PgConnectOptions,
            database_name: String,
            container: Option<ContainerAsync<GenericImage>>,
        }

        impl TestDatabase {
            pub async fn new_from_env() -> Result<Self, TestDatabaseError> {
                if let Ok(url) = std::env::var("TEST_DATABASE_URL") {
                    return Self::from_admin_url(&url, None).await;
                }

                if std::env::var("TEST_DATABASE_CONTAINER").is_ok_and(|value| value == "1") {
                    let container = GenericImage::new("postgres", "16-alpine")
                        .with_wait_for(WaitFor::message_on_stderr(
                            "database system is ready to accept connections",
                        ))
                        .with_env_var("POSTGRES_USER", "postgres")
                        .with_env_var("POSTGRES_PASSWORD", "postgres")
                        .start()
                        .await?;
                    let host = container.get_host().await?.to_string();
                    let port = container.get_host_port_ipv4(5432).await?;
                    let url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);
                    return Self::from_admin_url(&url, Some(container)).await;
                }

                Err(TestDatabaseError::MissingUrl)
            }

            async fn from_admin_url(
                url: &str,
                container: Option<ContainerAsync<GenericImage>>,
            ) -> Result<Self, TestDatabaseError> {
                let base_options: PgConnectOptions = url.parse()?;
                let base_options = base_options.log_statements(LevelFilter::Off);

                let admin_options = base_options.clone().database("postgres");
                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(admin_options.clone())
                    .await?;

                let database_name = format!("editorial_test_{}", Uuid::new_v4().simple());
                sqlx::query(&format!("CREATE DATABASE \"{}\" TEMPLATE template0", database_name))
                    .execute(&admin_pool)
                    .await?;
                admin_pool.close().await;

                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect_with(base_options.database(&database_name))
                    .await?;

                MIGRATOR.run(&pool).await?;

                Ok(Self {
                    pool: Some(pool),
                    admin_options,
                    database_name,
                    container,
                })
            }

            pub fn pool(&self) -> &PgPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            pub fn pool_clone(&self) -> PgPool {
                self.pool().clone()
            }

            /// Close pool connections and drop the ephemeral database.
            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }

                drop_database(self.admin_options.clone(), &self.database_name).await?;
                self.container.take();
                Ok(())
            }
        }

        async fn drop_database(
            admin_options: PgConnectOptions,
            database_name: &str,
        ) -> Result<(), sqlx::Error> {
            let admin_pool = PgPoolOptions::new()
                .max_connections(1)
                .connect_with(admin_options)
                .await?;

            sqlx::query(&format!("DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)", database_name))
                .execute(&admin_pool)
                .await?;
            Ok(())
        }

        impl Drop for TestDatabase {
            fn drop(&mut self) {
                if let Some(pool) = self.pool.take() {
                    let admin_options = self.admin_options.clone();
                    let database_name = self.database_name.clone();
                    if let Ok(handle) = Handle::try_current() {
                        handle.spawn(async move {
                            pool.close().await;
                            let _ = drop_database(admin_options, &database_name).await;
                        });
                    }
                }
            }
        }
    }

    /// Builder for constructing Rocket instances tailored for integration tests.
    #[derive(Default)]
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        import_context: Option<ImportContext>,
        auth_state: Option<AuthState>,
    }

    impl TestRocketBuilder {
        /// Random port, logging disabled.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                ..Self::default()
            }
        }

        /// Mount routes under `/api/v1`.
        pub fn mount_api_routes(mut self, routes: Vec<Route>) -> Self {
            self.mounts.push(("/api/v1".to_string(), routes));
            self
        }

        pub fn manage_import_context(mut self, context: ImportContext) -> Self {
            self.import_context = Some(context);
            self
        }

        pub fn manage_auth_state(mut self, state: AuthState) -> Self {
            self.auth_state = Some(state);
            self
        }

        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment).register("/", crate::routes::catchers::all());

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }
            if let Some(context) = self.import_context {
                rocket = rocket.manage(context);
            }
            if let Some(state) = self.auth_state {
                rocket = rocket.manage(state);
            }

            rocket
        }

        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }
    }
}
