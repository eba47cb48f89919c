//! SeaORM implementation of the persistence facade

use futures::FutureExt;
use futures::future::BoxFuture;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction,
    DbErr, EntityTrait, FromQueryResult, IntoActiveModel, Iterable, ModelTrait, PrimaryKeyToColumn,
    QueryFilter, Related, Select, TransactionTrait, Value,
};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use super::statistics::{ContextStatistics, StatisticsRecorder};
use super::task::Task;
use super::{DatabaseContext, ModelOf, PrimaryKeyOf};
use crate::config::DatabaseConfig;
use crate::database::migrations::{MigrationReport, MigrationRunner};
use crate::database::{Database, DatabaseType, EntityRegistry};
use crate::errors::{ContextError, ContextResult};

/// [`DatabaseContext`] backed by a SeaORM connection pool
///
/// Cloning is cheap and every clone shares the pool, the counters and the
/// shutdown state.
#[derive(Clone)]
pub struct SeaOrmDatabaseContext {
    database: Database,
    registry: EntityRegistry,
    runtime: Handle,
    statistics: Arc<StatisticsRecorder>,
    shut_down: Arc<AtomicBool>,
    startup_migrations: Option<Arc<MigrationReport>>,
    debug: bool,
}

impl SeaOrmDatabaseContext {
    /// Connect, apply the migrations below `config.migrations_path` and
    /// return a ready context
    pub async fn connect(config: &DatabaseConfig, registry: EntityRegistry) -> ContextResult<Self> {
        Self::connect_with_migrations(config, registry, MigrationRunner::from_config(config)).await
    }

    /// Like [`SeaOrmDatabaseContext::connect`] with a caller-built runner,
    /// e.g. one over embedded scripts
    pub async fn connect_with_migrations(
        config: &DatabaseConfig,
        registry: EntityRegistry,
        migrations: MigrationRunner,
    ) -> ContextResult<Self> {
        let runtime = current_runtime()?;
        let database = Database::connect(config).await?;

        let report = match Self::prepare_schema(&database, &registry, &migrations, config).await {
            Ok(report) => report,
            Err(e) => {
                error!("Database context startup failed: {}", e);
                if let Err(close_error) = database.close().await {
                    warn!("Failed to close connection pool after startup failure: {}", close_error);
                }
                return Err(e);
            }
        };

        info!(
            "Database context ready: {} backend, {} entities registered, {} migration(s) applied",
            database.database_type(),
            registry.len(),
            report.applied_count()
        );

        Ok(Self {
            database,
            registry,
            runtime,
            statistics: Arc::new(StatisticsRecorder::default()),
            shut_down: Arc::new(AtomicBool::new(false)),
            startup_migrations: Some(Arc::new(report)),
            debug: config.debug,
        })
    }

    /// Wrap an open connection without running migrations
    pub fn from_connection(connection: DatabaseConnection) -> ContextResult<Self> {
        Ok(Self {
            database: Database::from_connection(connection),
            registry: EntityRegistry::new(),
            runtime: current_runtime()?,
            statistics: Arc::new(StatisticsRecorder::default()),
            shut_down: Arc::new(AtomicBool::new(false)),
            startup_migrations: None,
            debug: false,
        })
    }

    async fn prepare_schema(
        database: &Database,
        registry: &EntityRegistry,
        migrations: &MigrationRunner,
        config: &DatabaseConfig,
    ) -> ContextResult<MigrationReport> {
        let connection = database.connection();
        let report = migrations.run(&connection).await?;
        if config.auto_create_tables {
            debug!("Creating missing tables for {:?}", registry);
            registry.create_missing_tables(connection.as_ref()).await?;
        }
        Ok(report)
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn database_type(&self) -> DatabaseType {
        self.database.database_type()
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// What the startup migration run did; `None` for [`SeaOrmDatabaseContext::from_connection`]
    pub fn startup_migrations(&self) -> Option<&MigrationReport> {
        self.startup_migrations.as_deref()
    }

    pub fn statistics(&self) -> ContextStatistics {
        self.statistics.snapshot()
    }

    pub fn log_statistics(&self) {
        self.statistics().log_summary();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Close the pool; later calls on any clone resolve to [`ContextError::ShutDown`]
    ///
    /// Operations already running may fail once their connection is gone.
    pub async fn shutdown(&self) -> ContextResult<()> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            debug!("Database context already shut down");
            return Ok(());
        }
        if self.debug {
            self.log_statistics();
        }
        self.database.close().await?;
        info!("Database context shut down");
        Ok(())
    }

    fn dispatch<T, F>(&self, operation: &'static str, future: F) -> Task<T>
    where
        T: Send + 'static,
        F: Future<Output = ContextResult<T>> + Send + 'static,
    {
        if self.is_shut_down() {
            warn!(operation, "Rejected database operation after shutdown");
            return Task::ready(Err(ContextError::ShutDown));
        }

        let statistics = self.statistics.clone();
        statistics.operation_started();
        Task::spawn(&self.runtime, async move {
            debug!(operation, "Running database operation");
            let result = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => Err(ContextError::panicked(payload)),
            };
            match &result {
                Ok(_) => statistics.operation_succeeded(),
                Err(e) => {
                    statistics.operation_failed();
                    error!(operation, "Database operation failed: {}", e);
                }
            }
            result
        })
    }

    fn read<T, F, Fut>(&self, operation: &'static str, query: F) -> Task<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<DatabaseConnection>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, DbErr>> + Send + 'static,
    {
        let connection = self.database.connection();
        self.dispatch(operation, async move { query(connection).await.map_err(ContextError::from) })
    }

    fn transaction<T, F>(&self, operation: &'static str, body: F) -> Task<T>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, ContextResult<T>> + Send + 'static,
    {
        let connection = self.database.connection();
        let statistics = self.statistics.clone();
        self.dispatch(operation, async move {
            run_in_transaction(&connection, &statistics, body).await
        })
    }
}

fn current_runtime() -> ContextResult<Handle> {
    Handle::try_current()
        .map_err(|e| ContextError::configuration(format!("database context requires a tokio runtime: {e}")))
}

async fn run_in_transaction<T, F>(
    connection: &DatabaseConnection,
    statistics: &StatisticsRecorder,
    body: F,
) -> ContextResult<T>
where
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, ContextResult<T>>,
{
    let txn = connection.begin().await?;
    let outcome = AssertUnwindSafe(async { body(&txn).await })
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(ContextError::panicked(payload)));
    match outcome {
        Ok(value) => {
            txn.commit().await?;
            statistics.transaction_committed();
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_error) = txn.rollback().await {
                warn!("Transaction rollback failed: {}", rollback_error);
            }
            statistics.transaction_rolled_back();
            Err(e)
        }
    }
}

/// Equality on every primary key column of a model
fn model_key_condition<M>(model: &M) -> Condition
where
    M: ModelTrait,
{
    <M::Entity as EntityTrait>::PrimaryKey::iter().fold(Condition::all(), |condition, key| {
        let column = key.into_column();
        condition.add(column.eq(model.get(column)))
    })
}

/// Equality on every primary key column of an active model, `None` when a key is not set
fn active_key_condition<A>(model: &A) -> Option<Condition>
where
    A: ActiveModelTrait,
{
    let mut condition = Condition::all();
    for key in <A::Entity as EntityTrait>::PrimaryKey::iter() {
        let column = key.into_column();
        let value = model.get(column).into_value()?;
        condition = condition.add(column.eq(value));
    }
    Some(condition)
}

impl DatabaseContext for SeaOrmDatabaseContext {
    fn find<E>(&self, id: PrimaryKeyOf<E>) -> Task<Option<E::Model>>
    where
        E: EntityTrait,
    {
        self.read("find", move |connection| async move {
            E::find_by_id(id).one(connection.as_ref()).await
        })
    }

    fn find_all<E>(&self) -> Task<Vec<E::Model>>
    where
        E: EntityTrait,
    {
        self.read("find_all", |connection| async move {
            E::find().all(connection.as_ref()).await
        })
    }

    fn find_all_with<E, F>(&self, modifier: F) -> Task<Vec<E::Model>>
    where
        E: EntityTrait,
        F: FnOnce(Select<E>) -> Select<E> + Send + 'static,
    {
        self.read("find_all_with", move |connection| async move {
            modifier(E::find()).all(connection.as_ref()).await
        })
    }

    fn find_all_where<E>(&self, column: E::Column, value: impl Into<Value> + Send + 'static) -> Task<Vec<E::Model>>
    where
        E: EntityTrait,
    {
        self.read("find_all_where", move |connection| async move {
            E::find()
                .filter(column.eq(value))
                .all(connection.as_ref())
                .await
        })
    }

    fn find_all_matching<E>(&self, condition: Condition) -> Task<Vec<E::Model>>
    where
        E: EntityTrait,
    {
        self.read("find_all_matching", move |connection| async move {
            E::find().filter(condition).all(connection.as_ref()).await
        })
    }

    fn find_all_with_related<E, R>(&self) -> Task<Vec<(E::Model, Vec<R::Model>)>>
    where
        E: EntityTrait + Related<R>,
        R: EntityTrait,
    {
        self.read("find_all_with_related", |connection| async move {
            E::find().find_with_related(R::default()).all(connection.as_ref()).await
        })
    }

    fn refresh<M>(&self, model: M) -> Task<Option<M>>
    where
        M: ModelTrait + FromQueryResult + 'static,
        M::Entity: EntityTrait<Model = M>,
    {
        let condition = model_key_condition(&model);
        self.read("refresh", move |connection| async move {
            <M::Entity as EntityTrait>::find()
                .filter(condition)
                .one(connection.as_ref())
                .await
        })
    }

    fn persist<A>(&self, models: Vec<A>) -> Task<Vec<ModelOf<A>>>
    where
        A: ActiveModelTrait + ActiveModelBehavior + Send + 'static,
        ModelOf<A>: IntoActiveModel<A>,
    {
        self.transaction("persist", move |txn| {
            Box::pin(async move {
                let mut inserted = Vec::with_capacity(models.len());
                for model in models {
                    inserted.push(model.reset_all().insert(txn).await?);
                }
                debug!("Persisted {} entities", inserted.len());
                Ok::<_, ContextError>(inserted)
            })
        })
    }

    fn merge<A>(&self, model: A) -> Task<ModelOf<A>>
    where
        A: ActiveModelTrait + ActiveModelBehavior + Send + 'static,
        ModelOf<A>: IntoActiveModel<A>,
    {
        self.transaction("merge", move |txn| {
            Box::pin(async move {
                let exists = match active_key_condition(&model) {
                    Some(condition) => A::Entity::find().filter(condition).one(txn).await?.is_some(),
                    None => false,
                };
                let model = model.reset_all();
                let merged = if exists {
                    model.update(txn).await?
                } else {
                    model.insert(txn).await?
                };
                Ok::<_, ContextError>(merged)
            })
        })
    }

    fn remove<A>(&self, models: Vec<A>) -> Task<u64>
    where
        A: ActiveModelTrait + ActiveModelBehavior + Send + 'static,
    {
        self.transaction("remove", move |txn| {
            Box::pin(async move {
                let mut removed = 0;
                for model in models {
                    removed += model.delete(txn).await?.rows_affected;
                }
                debug!("Removed {} rows", removed);
                Ok::<_, ContextError>(removed)
            })
        })
    }

    fn with_connection<T, F>(&self, operation: F) -> Task<T>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c DatabaseConnection) -> BoxFuture<'c, ContextResult<T>> + Send + 'static,
    {
        let connection = self.database.connection();
        self.dispatch("with_connection", async move { operation(connection.as_ref()).await })
    }

    fn with_transaction<T, F>(&self, operation: F) -> Task<T>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, ContextResult<T>> + Send + 'static,
    {
        self.transaction("with_transaction", operation)
    }
}

impl std::fmt::Debug for SeaOrmDatabaseContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeaOrmDatabaseContext")
            .field("database_type", &self.database.database_type())
            .field("registry", &self.registry)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::migrations::db_migration;
    use sea_orm::{DatabaseBackend, MockDatabase, QueryTrait};
    use tracing_test::traced_test;

    fn mock_context(database: MockDatabase) -> SeaOrmDatabaseContext {
        SeaOrmDatabaseContext::from_connection(database.into_connection()).unwrap()
    }

    #[tokio::test]
    async fn missing_row_is_none_not_an_error() {
        let context = mock_context(
            MockDatabase::new(DatabaseBackend::Sqlite)
                .append_query_results([Vec::<db_migration::Model>::new()]),
        );

        let found = context.find::<db_migration::Entity>("1.0".to_string()).await;
        assert!(matches!(found, Ok(None)));
        assert_eq!(context.statistics().operations_succeeded, 1);
    }

    #[tokio::test]
    async fn query_failure_is_an_error() {
        let context = mock_context(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_errors([DbErr::Custom("connection reset".to_string())]),
        );

        let found = context.find::<db_migration::Entity>("1.0".to_string()).await;
        assert!(matches!(found, Err(ContextError::Database(_))));
        assert_eq!(context.statistics().operations_failed, 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn failed_operations_are_logged() {
        let context = mock_context(
            MockDatabase::new(DatabaseBackend::MySql)
                .append_query_errors([DbErr::Custom("deadlock detected".to_string())]),
        );

        let result = context.find_all::<db_migration::Entity>().await;
        assert!(result.is_err());
        assert!(logs_contain("Database operation failed"));
        assert!(logs_contain("deadlock detected"));
    }

    #[tokio::test]
    async fn calls_after_shutdown_are_rejected() {
        let context = mock_context(MockDatabase::new(DatabaseBackend::Sqlite));
        context.shutdown().await.unwrap();
        context.shutdown().await.unwrap();

        let result = context.find_all::<db_migration::Entity>().await;
        assert!(matches!(result, Err(ContextError::ShutDown)));
        assert_eq!(context.statistics().operations_started, 0);
    }

    #[test]
    fn key_condition_covers_every_primary_key_column() {
        let model = db_migration::Model {
            version: "1.2".to_string(),
            name: "add_tags".to_string(),
            checksum: String::new(),
            applied_at: chrono::Utc::now(),
        };
        let sql = db_migration::Entity::find()
            .filter(model_key_condition(&model))
            .build(DatabaseBackend::Sqlite)
            .to_string();
        assert!(sql.ends_with(r#"WHERE "db_migration"."version" = '1.2'"#));
    }
}
