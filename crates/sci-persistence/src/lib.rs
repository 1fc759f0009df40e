//! sci-persistence
//!
//! Implementaciones Postgres (Diesel) de los repositorios declarados en
//! `sci-domain`. La capa aísla por completo el mapeo dominio ↔ filas de
//! DB: el dominio nunca ve tipos Diesel y las filas nunca salen de este
//! crate.
//!
//! Módulos:
//! - `pg`: repositorios sobre Postgres (codes, groups, workflows).
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: carga de configuración desde .env.
//! - `schema`: tablas Diesel declaradas para compilar queries.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema; // declarado a mano, reemplazable con `diesel print-schema`

pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use pg::{build_dev_pool_from_env, build_pool, ConnectionProvider, PgCodeRepository, PgGroupRepository,
             PgPool, PgWorkflowRepository, PoolProvider};
