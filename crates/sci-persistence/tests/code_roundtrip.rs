//! Ida y vuelta de códigos por Postgres: ambas variantes, upsert y
//! reconstrucción del computador asociado. Requiere DATABASE_URL.

use sci_domain::{Code, CodeRepository, CodeSourceKind, Computer};
use sci_persistence::{build_dev_pool_from_env, PgCodeRepository, PoolProvider};
use uuid::Uuid;

fn repo() -> Option<PgCodeRepository<PoolProvider>> {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL no definido: omitiendo test");
        return None;
    }
    let pool = build_dev_pool_from_env().expect("pool");
    Some(PgCodeRepository::new(PoolProvider { pool }))
}

#[test]
fn store_and_upload_code_round_trip() {
    let Some(mut repo) = repo() else { return };

    let mut code = Code::store_and_upload("/home/user/codes/pw", "pw.x").expect("code");
    code.set_label(format!("pw-{}", Uuid::new_v4()));
    code.set_description("plane wave dft");
    code.set_input_handler("quantumespresso.pw");
    repo.save(&code).expect("save");

    let found = repo.find(code.id()).expect("find");
    assert_eq!(found.source_kind(), CodeSourceKind::StoreAndUpload);
    assert_eq!(found.label(), code.label());
    assert_eq!(found.execname(), "pw.x");
    assert_eq!(found.content_hash(), code.content_hash());

    repo.delete(code.id()).expect("delete");
    assert!(repo.find(code.id()).is_err());
}

#[test]
fn on_computer_code_round_trip_rebuilds_computer() {
    let Some(mut repo) = repo() else { return };

    // Nombre único para no chocar con el UNIQUE(name) entre corridas
    let computer_name = format!("cluster-{}", Uuid::new_v4());
    let computer = Computer::new(&computer_name, "cluster.lab", "ssh", "slurm", "/scratch").expect("computer");
    let mut code = Code::on_computer(computer.clone(), "/usr/local/bin/pw.x").expect("code");
    code.set_label("pw-remote");
    repo.save(&code).expect("save");

    let found = repo.find(code.id()).expect("find");
    assert_eq!(found.source_kind(), CodeSourceKind::OnComputer);
    assert_eq!(found.computer().map(|c| c.name().to_string()), Some(computer_name));
    assert!(found.can_run_on(&computer));

    repo.delete(code.id()).expect("delete");
}

#[test]
fn save_is_an_upsert() {
    let Some(mut repo) = repo() else { return };

    let mut code = Code::store_and_upload("/home/user/codes", "run.sh").expect("code");
    code.set_label("before");
    repo.save(&code).expect("save");

    code.set_label("after");
    code.set_description("updated");
    repo.save(&code).expect("second save");

    let found = repo.find(code.id()).expect("find");
    assert_eq!(found.label(), "after");
    assert_eq!(found.description(), "updated");

    repo.delete(code.id()).expect("delete");
}
