//! Repositorios Postgres (Diesel) de los contratos de `sci-domain`.
//!
//! Objetivo general del módulo:
//! - Paridad de comportamiento 1:1 con los repositorios en memoria del
//!   dominio (mismos no-ops, misma semántica de borrado).
//! - Escrituras multi-fila siempre dentro de una transacción: almacenar un
//!   código on-computer asegura su computador en el mismo commit, y la
//!   sincronización de membresía de un grupo es atómica.
//! - Manejo básico de errores transitorios: reintento con backoff en
//!   lecturas y escrituras.
//!
//! El mapeo dominio ↔ filas vive íntegro en este archivo; ninguna fila
//! Diesel cruza hacia el dominio.

use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use log::{debug, warn};
use serde_json::Value;
use uuid::Uuid;

use sci_domain::{Code, CodeRepository, CodeSource, Computer, DomainError, Group, GroupRepository, Workflow,
                 WorkflowRepository};

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use crate::schema::{codes, computers, group_codes, groups, workflows};
use std::path::PathBuf;

/// Alias de tipo para el pool r2d2 de conexiones Postgres.
///
/// Al construirlo se corre automáticamente el set de migraciones
/// pendientes (una sola vez, en el primer checkout).
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Permite inyectar un pool real (producción/tests de integración) o
/// simular en tests unitarios sin acoplar a r2d2.
pub trait ConnectionProvider: Send + Sync + 'static {
    /// Obtiene una conexión lista para ejecutar consultas Diesel.
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError>;
}

/// Implementación concreta de `ConnectionProvider` respaldada por un `PgPool`.
pub struct PoolProvider {
    pub pool: PgPool,
}
impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Determina si un error es transitorio (recomendado reintentar con backoff).
fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::SerializationConflict => true,
        PersistenceError::TransientIo(_) => true,
        // Algunos mensajes de error (dependen de driver/pg) pueden llegar como Unknown
        // con texto. Best-effort string match sin acoplar a SQLSTATE.
        PersistenceError::Unknown(msg) => {
            let m = msg.to_lowercase();
            m.contains("deadlock detected")
            || m.contains("could not serialize access due to concurrent update")
            || m.contains("connection closed")
            || m.contains("connection refused")
            || m.contains("timeout")
        }
        _ => false,
    }
}

/// Retry simple con backoff lineal corto (hasta 3 intentos).
fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms",
                      attempts + 1,
                      e,
                      delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

#[derive(Queryable, Debug)]
pub struct ComputerRow {
    pub id: Uuid,
    pub name: String,
    pub hostname: String,
    pub transport: String,
    pub scheduler: String,
    pub workdir: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = computers)]
pub struct NewComputerRow {
    pub id: Uuid,
    pub name: String,
    pub hostname: String,
    pub transport: String,
    pub scheduler: String,
    pub workdir: String,
}

/// Fila mapeada de la tabla `codes` para lecturas. El par de columnas de
/// variante no poblado llega como `None` (garantizado por el CHECK de la
/// tabla).
#[derive(Queryable, Debug)]
pub struct CodeRow {
    pub id: Uuid,
    pub label: String,
    pub description: String,
    pub input_handler: String,
    pub prepend_text: String,
    pub append_text: String,
    pub source_kind: String,
    pub folder: Option<String>,
    pub rel_path: Option<String>,
    pub computer_id: Option<Uuid>,
    pub remote_path: Option<String>,
    pub content_hash: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// Fila para upsert en `codes`. `treat_none_as_null` para que un cambio de
/// variante limpie las columnas del otro subconjunto.
#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = codes, treat_none_as_null = true)]
pub struct NewCodeRow {
    pub id: Uuid,
    pub label: String,
    pub description: String,
    pub input_handler: String,
    pub prepend_text: String,
    pub append_text: String,
    pub source_kind: String,
    pub folder: Option<String>,
    pub rel_path: Option<String>,
    pub computer_id: Option<Uuid>,
    pub remote_path: Option<String>,
    pub content_hash: String,
    pub metadata: Value,
}

#[derive(Queryable, Debug)]
pub struct GroupRow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub owner: String,
    pub user_defined: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = groups)]
pub struct NewGroupRow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub owner: String,
    pub user_defined: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = group_codes)]
pub struct NewGroupCodeRow {
    pub group_id: Uuid,
    pub code_id: Uuid,
}

#[derive(Queryable, Debug)]
pub struct WorkflowRow {
    pub id: Uuid,
    pub label: String,
    pub description: String,
    pub version: i32,
}

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = workflows)]
pub struct NewWorkflowRow {
    pub id: Uuid,
    pub label: String,
    pub description: String,
    pub version: i32,
}

/// Inserta el computador si su nombre aún no existe y devuelve el id de la
/// fila vigente (dedupe por UNIQUE(name), mismo truco que un upsert
/// do-nothing).
fn ensure_computer(conn: &mut PgConnection, computer: &Computer) -> Result<Uuid, diesel::result::Error> {
    diesel::insert_into(computers::table)
        .values(NewComputerRow { id: computer.id(),
                                 name: computer.name().to_string(),
                                 hostname: computer.hostname().to_string(),
                                 transport: computer.transport().to_string(),
                                 scheduler: computer.scheduler().to_string(),
                                 workdir: computer.workdir().to_string() })
        .on_conflict(computers::name)
        .do_nothing()
        .execute(conn)?;
    computers::table.filter(computers::name.eq(computer.name()))
                    .select(computers::id)
                    .first(conn)
}

fn code_to_row(code: &Code, computer_id: Option<Uuid>) -> NewCodeRow {
    let (folder, rel_path, remote_path) = match code.source() {
        CodeSource::StoreAndUpload { folder, rel_path } => {
            (Some(folder.display().to_string()), Some(rel_path.clone()), None)
        }
        CodeSource::OnComputer { remote_path, .. } => (None, None, Some(remote_path.display().to_string())),
    };
    NewCodeRow { id: code.id(),
                 label: code.label().to_string(),
                 description: code.description().to_string(),
                 input_handler: code.input_handler().to_string(),
                 prepend_text: code.prepend_text().to_string(),
                 append_text: code.append_text().to_string(),
                 source_kind: code.source_kind().as_str().to_string(),
                 folder,
                 rel_path,
                 computer_id,
                 remote_path,
                 content_hash: code.content_hash(),
                 metadata: code.metadata().clone() }
}

/// Reconstruye el objeto de dominio desde su fila (más la del computador
/// cuando la variante lo exige). Una fila que no cierra contra el dominio
/// se reporta como corrupta, nunca se devuelve a medias.
fn row_to_code(row: CodeRow, computer: Option<ComputerRow>) -> Result<Code, PersistenceError> {
    let corrupt = |what: &str| PersistenceError::Unknown(format!("corrupt code row {}: {what}", row.id));
    let source = match row.source_kind.as_str() {
        "store_and_upload" => CodeSource::StoreAndUpload { folder: PathBuf::from(row.folder
                                                                                   .as_deref()
                                                                                   .ok_or_else(|| corrupt("missing folder"))?),
                                                          rel_path: row.rel_path
                                                                       .clone()
                                                                       .ok_or_else(|| corrupt("missing rel_path"))? },
        "on_computer" => {
            let c = computer.ok_or_else(|| corrupt("missing computer"))?;
            let computer = Computer::from_stored(c.id, &c.name, &c.hostname, &c.transport, &c.scheduler, &c.workdir)
                .map_err(|e| corrupt(&e.to_string()))?;
            CodeSource::OnComputer { computer,
                                     remote_path: PathBuf::from(row.remote_path
                                                                   .as_deref()
                                                                   .ok_or_else(|| corrupt("missing remote_path"))?) }
        }
        other => return Err(corrupt(&format!("unknown source_kind \"{other}\""))),
    };
    Code::from_stored(row.id,
                      source,
                      &row.label,
                      &row.description,
                      &row.input_handler,
                      &row.prepend_text,
                      &row.append_text,
                      row.metadata.clone()).map_err(|e| corrupt(&e.to_string()))
}

/// Repositorio Postgres de códigos.
pub struct PgCodeRepository<P: ConnectionProvider> {
    pub provider: P,
}
impl<P: ConnectionProvider> PgCodeRepository<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    fn load_computer(&self, conn: &mut PgConnection, id: Uuid) -> Result<ComputerRow, PersistenceError> {
        computers::table.find(id)
                        .first(conn)
                        .map_err(PersistenceError::from)
    }
}

impl<P: ConnectionProvider> CodeRepository for PgCodeRepository<P> {
    fn save(&mut self, code: &Code) -> Result<(), DomainError> {
        debug!("save_code:start id={} kind={}", code.id(), code.source_kind());
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction().read_write().run(|tx| {
                    // Paso 1: asegurar el computador (sólo variante on-computer)
                    let computer_id = match code.source() {
                        CodeSource::OnComputer { computer, .. } => Some(ensure_computer(tx, computer)?),
                        CodeSource::StoreAndUpload { .. } => None,
                    };
                    // Paso 2: upsert de la fila del código
                    let row = code_to_row(code, computer_id);
                    diesel::insert_into(codes::table).values(&row)
                                                     .on_conflict(codes::id)
                                                     .do_update()
                                                     .set(&row)
                                                     .execute(tx)?;
                    Ok::<(), PersistenceError>(())
                })
        })?;
        debug!("save_code:done id={}", code.id());
        Ok(())
    }

    fn find(&self, id: Uuid) -> Result<Code, DomainError> {
        let code = with_retry(|| {
            let mut conn = self.provider.connection()?;
            let row: CodeRow = codes::table.find(id).first(&mut conn).map_err(PersistenceError::from)?;
            let computer = match row.computer_id {
                Some(cid) => Some(self.load_computer(&mut conn, cid)?),
                None => None,
            };
            row_to_code(row, computer)
        })?;
        Ok(code)
    }

    fn list(&self) -> Result<Vec<Code>, DomainError> {
        let result = with_retry(|| {
            let mut conn = self.provider.connection()?;
            let rows: Vec<CodeRow> = codes::table.order(codes::created_at.asc())
                                                 .load(&mut conn)
                                                 .map_err(PersistenceError::from)?;
            rows.into_iter()
                .map(|row| {
                    let computer = match row.computer_id {
                        Some(cid) => Some(self.load_computer(&mut conn, cid)?),
                        None => None,
                    };
                    row_to_code(row, computer)
                })
                .collect::<Result<Vec<Code>, PersistenceError>>()
        })?;
        Ok(result)
    }

    fn delete(&mut self, id: Uuid) -> Result<(), DomainError> {
        let deleted = with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::delete(codes::table.find(id)).execute(&mut conn)
                                                 .map_err(PersistenceError::from)
        })?;
        if deleted == 0 {
            return Err(DomainError::NotFound(format!("code {id}")));
        }
        Ok(())
    }
}

/// Repositorio Postgres de grupos. `save` sincroniza fila y membresía en
/// una transacción; los duplicados de membresía se resuelven con
/// `on_conflict_do_nothing` (el no-op del dominio, pero en el borde SQL).
pub struct PgGroupRepository<P: ConnectionProvider> {
    pub provider: P,
}
impl<P: ConnectionProvider> PgGroupRepository<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    fn member_ids(&self, conn: &mut PgConnection, group_id: Uuid) -> Result<Vec<Uuid>, PersistenceError> {
        group_codes::table.filter(group_codes::group_id.eq(group_id))
                          .select(group_codes::code_id)
                          .order(group_codes::code_id.asc())
                          .load(conn)
                          .map_err(PersistenceError::from)
    }

    fn hydrate(&self, conn: &mut PgConnection, row: GroupRow) -> Result<Group, PersistenceError> {
        let members = self.member_ids(conn, row.id)?;
        Group::from_stored(row.id, &row.name, &row.description, &row.owner, row.user_defined, members, row.created_at)
            .map_err(|e| PersistenceError::Unknown(format!("corrupt group row {}: {e}", row.id)))
    }
}

impl<P: ConnectionProvider> GroupRepository for PgGroupRepository<P> {
    fn save(&mut self, group: &mut Group) -> Result<(), DomainError> {
        debug!("save_group:start name={} members={}", group.name(), group.len());
        let row = NewGroupRow { id: group.id(),
                                name: group.name().to_string(),
                                description: group.description().to_string(),
                                owner: group.owner().to_string(),
                                user_defined: group.is_user_defined(),
                                created_at: group.created_at() };
        let members = group.members().to_vec();
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction().read_write().run(|tx| {
                    // Paso 1: upsert de la fila del grupo
                    diesel::insert_into(groups::table).values(&row)
                                                      .on_conflict(groups::id)
                                                      .do_update()
                                                      .set(&row)
                                                      .execute(tx)?;
                    // Paso 2: sincronizar membresía (borrar lo que sobró,
                    // insertar lo nuevo, dedupe por PK compuesta)
                    diesel::delete(group_codes::table.filter(group_codes::group_id.eq(row.id))
                                                     .filter(group_codes::code_id.ne_all(members.clone())))
                        .execute(tx)?;
                    for code_id in &members {
                        diesel::insert_into(group_codes::table)
                            .values(NewGroupCodeRow { group_id: row.id, code_id: *code_id })
                            .on_conflict_do_nothing()
                            .execute(tx)?;
                    }
                    Ok::<(), PersistenceError>(())
                })
        })?;
        group.mark_stored();
        debug!("save_group:done name={}", group.name());
        Ok(())
    }

    fn find_by_name(&self, name: &str) -> Result<Group, DomainError> {
        let group = with_retry(|| {
            let mut conn = self.provider.connection()?;
            let row: GroupRow = groups::table.filter(groups::name.eq(name))
                                             .first(&mut conn)
                                             .map_err(PersistenceError::from)?;
            self.hydrate(&mut conn, row)
        })?;
        Ok(group)
    }

    fn list(&self, owner: Option<&str>) -> Result<Vec<Group>, DomainError> {
        let result = with_retry(|| {
            let mut conn = self.provider.connection()?;
            let mut query = groups::table.into_boxed();
            if let Some(owner) = owner {
                query = query.filter(groups::owner.eq(owner));
            }
            let rows: Vec<GroupRow> = query.order(groups::name.asc())
                                           .load(&mut conn)
                                           .map_err(PersistenceError::from)?;
            rows.into_iter()
                .map(|row| self.hydrate(&mut conn, row))
                .collect::<Result<Vec<Group>, PersistenceError>>()
        })?;
        Ok(result)
    }

    fn delete(&mut self, group: &mut Group) -> Result<(), DomainError> {
        let deleted = with_retry(|| {
            let mut conn = self.provider.connection()?;
            // La membresía cae por ON DELETE CASCADE
            diesel::delete(groups::table.find(group.id())).execute(&mut conn)
                                                          .map_err(PersistenceError::from)
        })?;
        if deleted == 0 {
            return Err(DomainError::NotFound(format!("group {}", group.name())));
        }
        group.reset_unstored();
        Ok(())
    }
}

/// Repositorio Postgres de workflows versionados.
pub struct PgWorkflowRepository<P: ConnectionProvider> {
    pub provider: P,
}
impl<P: ConnectionProvider> PgWorkflowRepository<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: ConnectionProvider> WorkflowRepository for PgWorkflowRepository<P> {
    fn save(&mut self, workflow: &Workflow) -> Result<(), DomainError> {
        let row = NewWorkflowRow { id: workflow.id(),
                                   label: workflow.label().to_string(),
                                   description: workflow.description().to_string(),
                                   version: workflow.version() as i32 };
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(workflows::table).values(&row)
                                                 .on_conflict(workflows::id)
                                                 .do_update()
                                                 .set(&row)
                                                 .execute(&mut conn)
                                                 .map_err(PersistenceError::from)
        })?;
        Ok(())
    }

    fn find(&self, id: Uuid) -> Result<Workflow, DomainError> {
        let row: WorkflowRow = with_retry(|| {
            let mut conn = self.provider.connection()?;
            workflows::table.find(id).first(&mut conn).map_err(PersistenceError::from)
        })?;
        Ok(Workflow::from_stored(row.id, &row.label, &row.description, row.version as u32))
    }
}

/// Construye un pool Postgres r2d2 a partir de URL.
///
/// Comportamiento:
/// - Valida y ajusta tamaños (si `min_size > max_size`, usa `min_size =
///   max_size`).
/// - Ejecuta migraciones inmediatamente tras el primer `get()`.
/// - Devuelve `PersistenceError::TransientIo` ante errores del pool/manager.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = if min_size == 0 { 1 } else { min_size };
    let validated_max = if max_size == 0 { 1 } else { max_size };
    if validated_min > validated_max {
        warn!("min_size > max_size ({} > {}), ajustando min=max", validated_min, validated_max);
    }
    let final_min = validated_min.min(validated_max);
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(final_min))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    // Ejecutar migraciones una sola vez al construir (primer connection checkout).
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}

/// Helper de desarrollo: carga `.env`, lee configuración (DATABASE_URL,
/// tamaños) y construye un pool ya migrado.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    crate::config::init_dotenv();
    let cfg = crate::config::DbConfig::from_env()?;
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}
