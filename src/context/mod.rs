//! Asynchronous persistence facade
//!
//! [`DatabaseContext`] is the capability set every backend offers: lookups,
//! filtered scans, transactional writes and two escape hatches exposing the
//! raw connection or transaction. Each call is scheduled on the runtime the
//! context was built on and returns a [`Task`] immediately.

use futures::future::BoxFuture;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, Condition, DatabaseConnection, DatabaseTransaction, EntityTrait,
    FromQueryResult, IntoActiveModel, ModelTrait, PrimaryKeyTrait, Related, Select, Value,
};

use crate::errors::ContextResult;

mod seaorm;
mod statistics;
mod task;

pub use seaorm::SeaOrmDatabaseContext;
pub use statistics::ContextStatistics;
pub use task::Task;

/// The model type an active model converts into
pub type ModelOf<A> = <<A as ActiveModelTrait>::Entity as EntityTrait>::Model;

/// The primary key value type of an entity (`i32`, `String`, tuples for composite keys)
pub type PrimaryKeyOf<E> = <<E as EntityTrait>::PrimaryKey as PrimaryKeyTrait>::ValueType;

/// Uniform asynchronous CRUD interface over a pooled database
///
/// Every method returns a [`Task`] without blocking the caller. Awaiting it
/// yields:
///
/// * `Ok(value)` - the operation completed (for lookups, `Ok(None)` means
///   nothing matched)
/// * `Err(ContextError)` - the operation failed; write operations were
///   rolled back
///
/// Reads run on a pooled connection. Writes run in one transaction per call,
/// committed on success and rolled back on any failure.
///
/// # Examples
///
/// ```rust,ignore
/// let alice = user::ActiveModel { id: Set(1), name: Set("alice".into()), ..Default::default() };
/// context.persist(vec![alice]).await?;
///
/// let found = context.find::<user::Entity>(1).await?;
/// let named = context.find_all_where::<user::Entity>(user::Column::Name, "alice").await?;
/// ```
pub trait DatabaseContext: Send + Sync {
    /// Find an entity by its primary key
    fn find<E>(&self, id: PrimaryKeyOf<E>) -> Task<Option<E::Model>>
    where
        E: EntityTrait;

    /// Every row of an entity, in the store's default order
    fn find_all<E>(&self) -> Task<Vec<E::Model>>
    where
        E: EntityTrait;

    /// Every row of an entity after the caller adjusted the query
    ///
    /// The modifier receives `E::find()` and may add filters, ordering,
    /// limits or joins.
    fn find_all_with<E, F>(&self, modifier: F) -> Task<Vec<E::Model>>
    where
        E: EntityTrait,
        F: FnOnce(Select<E>) -> Select<E> + Send + 'static;

    /// Rows whose `column` equals `value`
    fn find_all_where<E>(&self, column: E::Column, value: impl Into<Value> + Send + 'static) -> Task<Vec<E::Model>>
    where
        E: EntityTrait;

    /// Rows matching an arbitrary condition
    fn find_all_matching<E>(&self, condition: Condition) -> Task<Vec<E::Model>>
    where
        E: EntityTrait;

    /// Every `E` together with its related `R` rows, in two queries
    fn find_all_with_related<E, R>(&self) -> Task<Vec<(E::Model, Vec<R::Model>)>>
    where
        E: EntityTrait + Related<R>,
        R: EntityTrait;

    /// Re-read a model by its primary key; `None` if it was deleted meanwhile
    fn refresh<M>(&self, model: M) -> Task<Option<M>>
    where
        M: ModelTrait + FromQueryResult + 'static,
        M::Entity: EntityTrait<Model = M>;

    /// Insert every model in one transaction, all or nothing
    fn persist<A>(&self, models: Vec<A>) -> Task<Vec<ModelOf<A>>>
    where
        A: ActiveModelTrait + ActiveModelBehavior + Send + 'static,
        ModelOf<A>: IntoActiveModel<A>;

    /// Update the row with the model's primary key, or insert it if absent
    fn merge<A>(&self, model: A) -> Task<ModelOf<A>>
    where
        A: ActiveModelTrait + ActiveModelBehavior + Send + 'static,
        ModelOf<A>: IntoActiveModel<A>;

    /// Delete every model in one transaction, all or nothing
    ///
    /// Resolves to the number of deleted rows.
    fn remove<A>(&self, models: Vec<A>) -> Task<u64>
    where
        A: ActiveModelTrait + ActiveModelBehavior + Send + 'static;

    /// Run a custom operation on a pooled connection, without a transaction
    fn with_connection<T, F>(&self, operation: F) -> Task<T>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c DatabaseConnection) -> BoxFuture<'c, ContextResult<T>> + Send + 'static;

    /// Run a custom operation in a transaction
    ///
    /// The transaction commits when the operation returns `Ok` and rolls
    /// back when it returns `Err` or panics.
    fn with_transaction<T, F>(&self, operation: F) -> Task<T>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, ContextResult<T>> + Send + 'static;
}
