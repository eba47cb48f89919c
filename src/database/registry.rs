//! Caller-supplied list of the entities a context manages

use sea_orm::sea_query::TableCreateStatement;
use sea_orm::{ConnectionTrait, DbErr, EntityTrait, Schema};
use tracing::{debug, warn};

use super::DatabaseType;

#[derive(Clone)]
struct RegisteredEntity {
    table_name: String,
    create_table: fn(&Schema) -> TableCreateStatement,
}

/// Entity types known to a context
///
/// Entities are kept in registration order, which is also the order tables
/// are created in: register referenced tables before the tables that point
/// at them.
#[derive(Clone, Default)]
pub struct EntityRegistry {
    entities: Vec<RegisteredEntity>,
}

fn create_table_for<E: EntityTrait>(schema: &Schema) -> TableCreateStatement {
    schema.create_table_from_entity(E::default())
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`EntityRegistry::add`]
    pub fn register<E: EntityTrait>(mut self) -> Self {
        self.add::<E>();
        self
    }

    pub fn add<E: EntityTrait>(&mut self) {
        let table_name = E::default().table_name().to_string();
        if self.contains(&table_name) {
            warn!("Entity for table '{}' registered twice, ignoring", table_name);
            return;
        }
        debug!("Registered entity for table '{}'", table_name);
        self.entities.push(RegisteredEntity {
            table_name,
            create_table: create_table_for::<E>,
        });
    }

    pub fn contains(&self, table_name: &str) -> bool {
        self.entities.iter().any(|entity| entity.table_name == table_name)
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.entities.iter().map(|entity| entity.table_name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// `CREATE TABLE` statements for every registered entity
    pub fn create_table_statements(&self, database_type: DatabaseType) -> Vec<TableCreateStatement> {
        let schema = Schema::new(database_type.backend());
        self.entities
            .iter()
            .map(|entity| (entity.create_table)(&schema))
            .collect()
    }

    /// The statements of [`EntityRegistry::create_table_statements`] rendered as SQL
    pub fn create_table_sql(&self, database_type: DatabaseType) -> Vec<String> {
        let backend = database_type.backend();
        self.create_table_statements(database_type)
            .iter()
            .map(|statement| backend.build(statement).sql)
            .collect()
    }

    /// Create the table of every registered entity that does not exist yet
    pub async fn create_missing_tables<C: ConnectionTrait>(&self, connection: &C) -> Result<(), DbErr> {
        let backend = connection.get_database_backend();
        let database_type = DatabaseType::from_backend(backend);
        for (entity, mut statement) in self
            .entities
            .iter()
            .zip(self.create_table_statements(database_type))
        {
            statement.if_not_exists();
            connection.execute(backend.build(&statement)).await?;
            debug!("Ensured table '{}' exists", entity.table_name);
        }
        Ok(())
    }
}

impl std::fmt::Debug for EntityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityRegistry")
            .field("tables", &self.table_names())
            .finish()
    }
}
