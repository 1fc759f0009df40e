//! Driver de validación del workspace: ejercita el builder de códigos, la
//! membresía de grupos y el versionado de workflows contra los
//! repositorios en memoria. Con el feature `pg_demo` agrega una vuelta
//! completa contra Postgres (requiere DATABASE_URL).

use sci_domain::builder::{KEY_DESCRIPTION, KEY_FOLDER, KEY_INPUT_HANDLER, KEY_LABEL, KEY_REL_PATH};
use sci_domain::{BuildError, Code, CodeBuilder, CodeRepository, CodeSourceKind, Group, GroupRepository,
                 InMemoryCodeRepository, InMemoryGroupRepository, Workflow};
use std::path::PathBuf;

/// Validación del builder: reglas agregadas, rollback y detección de
/// claves sin consumir.
fn run_builder_validation() {
    let mut builder = CodeBuilder::new();
    builder.set(KEY_LABEL, "pw-6.2").expect("label");
    builder.set(KEY_DESCRIPTION, "plane wave dft").expect("description");
    builder.set(KEY_INPUT_HANDLER, "quantumespresso.pw").expect("input handler");
    builder.set(KEY_FOLDER, PathBuf::from("/home/user/codes/pw")).expect("folder");
    builder.set(KEY_REL_PATH, "pw.x").expect("rel path");

    // Una clave on-computer sobre una especificación store-and-upload debe
    // revertirse y reportar la regla violada
    let err = builder.set("remote_abs_path", PathBuf::from("/usr/bin/pw.x"))
                     .expect_err("mixed variants must be rejected");
    assert!(!err.messages().is_empty(), "el error debe listar las reglas violadas");
    assert!(builder.get("remote_abs_path").is_none(), "la mutación inválida debe revertirse");

    let mut code = builder.build().expect("valid spec must build");
    assert_eq!(code.source_kind(), CodeSourceKind::StoreAndUpload);
    code.set_metadata(serde_json::json!({"source": "validation driver"}));

    // Clave extra que nadie consume: clase de error distinta
    builder.set("labell", "typo").expect("combination rules still pass");
    match builder.build() {
        Err(BuildError::UnconsumedKeys(keys)) => assert_eq!(keys, vec!["labell".to_string()]),
        other => panic!("expected UnconsumedKeys, got {other:?}"),
    }
    println!("[ok] builder: reglas, rollback y claves sin consumir");
}

/// Validación de grupos: bloqueo antes de almacenar, no-ops de membresía.
fn run_group_validation() {
    let mut codes = InMemoryCodeRepository::new();
    let mut groups = InMemoryGroupRepository::new();

    let mut code = Code::store_and_upload("/home/user/codes", "run.sh").expect("code");
    code.set_label("run");
    codes.save(&code).expect("save code");

    let mut group = Group::new("validation", "", "user@localhost").expect("group");
    assert!(group.add_member(code.id()).is_err(), "membresía bloqueada antes de almacenar");

    groups.save(&mut group).expect("save group");
    assert!(group.add_member(code.id()).expect("add"));
    assert!(!group.add_member(code.id()).expect("duplicate add"), "duplicado es no-op");
    groups.save(&mut group).expect("save members");
    assert_eq!(groups.find_by_name("validation").expect("find").len(), 1);
    println!("[ok] groups: almacenado, membresía y no-ops");
}

/// Validación de workflows: cada mutación incrementa la versión.
fn run_workflow_validation() {
    let mut w = Workflow::new();
    w.set_label("label1");
    w.set_label("label2");
    w.set_description("desc1");
    w.set_description("desc2");
    w.set_description("desc3");
    assert_eq!(w.version(), 6);
    println!("[ok] workflows: versionado por mutación");
}

/// Vuelta completa contra Postgres (feature `pg_demo`).
#[cfg(feature = "pg_demo")]
fn run_pg_demo() {
    use sci_persistence::{build_dev_pool_from_env, PgCodeRepository, PoolProvider};

    let _ = dotenvy::dotenv();
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("[pg_demo] DATABASE_URL no definido: omitiendo demo");
        return;
    }
    let pool = build_dev_pool_from_env().expect("pool");
    let mut repo = PgCodeRepository::new(PoolProvider { pool });

    let mut code = Code::store_and_upload("/home/user/codes/pw", "pw.x").expect("code");
    code.set_label(format!("pg-demo-{}", uuid::Uuid::new_v4()));
    repo.save(&code).expect("save");
    let found = repo.find(code.id()).expect("find");
    assert_eq!(found.content_hash(), code.content_hash());
    repo.delete(code.id()).expect("delete");
    println!("[ok] pg_demo: round-trip Postgres");
}

fn main() {
    run_builder_validation();
    run_group_validation();
    run_workflow_validation();
    #[cfg(feature = "pg_demo")]
    run_pg_demo();
    println!("todas las validaciones pasaron");
}
