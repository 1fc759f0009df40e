//! Grupos contra Postgres: unicidad de nombre, sincronización de
//! membresía y semántica de borrado. Requiere DATABASE_URL.

use sci_domain::{Code, CodeRepository, DomainError, Group, GroupRepository};
use sci_persistence::{build_dev_pool_from_env, PgCodeRepository, PgGroupRepository, PgPool, PoolProvider};
use uuid::Uuid;

fn pool() -> Option<PgPool> {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL no definido: omitiendo test");
        return None;
    }
    Some(build_dev_pool_from_env().expect("pool"))
}

fn stored_code(codes: &mut PgCodeRepository<PoolProvider>, label: &str) -> Code {
    let mut code = Code::store_and_upload("/home/user/codes", "run.sh").expect("code");
    code.set_label(label);
    codes.save(&code).expect("save code");
    code
}

#[test]
fn group_membership_sync_round_trip() {
    let Some(pool) = pool() else { return };
    let mut codes = PgCodeRepository::new(PoolProvider { pool: pool.clone() });
    let mut groups = PgGroupRepository::new(PoolProvider { pool });

    let c1 = stored_code(&mut codes, "c1");
    let c2 = stored_code(&mut codes, "c2");

    let name = format!("testgroup-{}", Uuid::new_v4());
    let mut group = Group::new(&name, "integration", "user@localhost").expect("group");
    groups.save(&mut group).expect("first save");
    assert!(group.is_stored());

    group.add_member(c1.id()).expect("add c1");
    group.add_member(c2.id()).expect("add c2");
    groups.save(&mut group).expect("save members");

    let mut reloaded = groups.find_by_name(&name).expect("find");
    assert_eq!(reloaded.len(), 2);
    assert!(reloaded.contains(&c1.id()));

    // Quitar uno y re-sincronizar: la fila sobrante debe desaparecer
    reloaded.remove_member(&c2.id()).expect("remove");
    groups.save(&mut reloaded).expect("save after remove");
    let again = groups.find_by_name(&name).expect("find again");
    assert_eq!(again.members(), &[c1.id()]);

    // Limpieza: el borrado del grupo arrastra la membresía (CASCADE)
    let mut cleanup = again;
    groups.delete(&mut cleanup).expect("delete group");
    assert!(matches!(groups.find_by_name(&name), Err(DomainError::NotFound(_))));
    codes.delete(c1.id()).expect("delete c1");
    codes.delete(c2.id()).expect("delete c2");
}

#[test]
fn group_name_is_unique() {
    let Some(pool) = pool() else { return };
    let mut groups = PgGroupRepository::new(PoolProvider { pool });

    let name = format!("unique-{}", Uuid::new_v4());
    let mut g1 = Group::new(&name, "", "user@localhost").expect("g1");
    groups.save(&mut g1).expect("save g1");

    let mut g2 = Group::new(&name, "", "other@localhost").expect("g2");
    assert!(matches!(groups.save(&mut g2), Err(DomainError::Storage(_))));

    groups.delete(&mut g1).expect("cleanup");
}

#[test]
fn deleted_group_can_be_stored_again_empty() {
    let Some(pool) = pool() else { return };
    let mut codes = PgCodeRepository::new(PoolProvider { pool: pool.clone() });
    let mut groups = PgGroupRepository::new(PoolProvider { pool });

    let code = stored_code(&mut codes, "c1");
    let name = format!("revive-{}", Uuid::new_v4());
    let mut group = Group::new(&name, "some other desc", "user@localhost").expect("group");
    groups.save(&mut group).expect("save");
    group.add_member(code.id()).expect("add");
    groups.save(&mut group).expect("save members");

    groups.delete(&mut group).expect("delete");
    assert!(!group.is_stored());
    assert!(group.is_empty());

    // Volver a almacenarlo arranca sin membresía, como el dominio promete
    groups.save(&mut group).expect("re-save");
    let reloaded = groups.find_by_name(&name).expect("find");
    assert_eq!(reloaded.len(), 0);
    assert_eq!(reloaded.description(), "some other desc");

    let mut cleanup = reloaded;
    groups.delete(&mut cleanup).expect("cleanup group");
    codes.delete(code.id()).expect("cleanup code");
}
