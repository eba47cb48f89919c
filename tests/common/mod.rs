//! Entities and helpers shared by the integration tests
#![allow(dead_code)]

use brick_orm::{DatabaseConfig, EntityRegistry, SeaOrmDatabaseContext, SerializableValue};
use sea_orm::Set;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub mod user {
    use brick_orm::SerializableValue;
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "users")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: i32,
        pub name: String,
        #[sea_orm(column_type = "Text", nullable)]
        pub settings: SerializableValue,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::post::Entity")]
        Post,
    }

    impl Related<super::post::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Post.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod post {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "posts")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: i32,
        pub user_id: i32,
        pub title: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::user::Entity",
            from = "Column::UserId",
            to = "super::user::Column::Id"
        )]
        User,
    }

    impl Related<super::user::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::User.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub const SQLITE_SCHEMA: &str = r#"
-- users and their posts
CREATE TABLE users (
    id INTEGER PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    settings TEXT
);

CREATE TABLE posts (
    id INTEGER PRIMARY KEY NOT NULL,
    user_id INTEGER NOT NULL REFERENCES users (id),
    title TEXT NOT NULL
);
"#;

pub fn registry() -> EntityRegistry {
    EntityRegistry::new()
        .register::<user::Entity>()
        .register::<post::Entity>()
}

/// Write `sql` as `<root>/<platform>/<file_name>`
pub fn write_script(root: &Path, platform: &str, file_name: &str, sql: &str) -> PathBuf {
    let dir = root.join(platform);
    std::fs::create_dir_all(&dir).expect("create platform directory");
    let path = dir.join(file_name);
    std::fs::write(&path, sql).expect("write migration script");
    path
}

/// Configuration for an on-disk SQLite database inside `dir`
pub fn sqlite_config(dir: &TempDir) -> DatabaseConfig {
    DatabaseConfig {
        pool_size: 4,
        migrations_path: dir.path().join("dbmigrations"),
        ..DatabaseConfig::new(format!("sqlite://{}", dir.path().join("brick.db").display()))
    }
}

/// A context over a fresh SQLite database with the users/posts schema applied
pub async fn sqlite_context(dir: &TempDir) -> SeaOrmDatabaseContext {
    let config = sqlite_config(dir);
    write_script(&config.migrations_path, "sqlite", "1.0__initial.sql", SQLITE_SCHEMA);
    SeaOrmDatabaseContext::connect(&config, registry())
        .await
        .expect("context starts")
}

pub fn new_user(id: i32, name: &str) -> user::ActiveModel {
    user::ActiveModel {
        id: Set(id),
        name: Set(name.to_string()),
        settings: Set(SerializableValue::null()),
    }
}

pub fn new_post(id: i32, user_id: i32, title: &str) -> post::ActiveModel {
    post::ActiveModel {
        id: Set(id),
        user_id: Set(user_id),
        title: Set(title.to_string()),
    }
}
