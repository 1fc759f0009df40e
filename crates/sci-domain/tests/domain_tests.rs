use sci_domain::{Code, CodeRepository, Computer, DomainError, Group, GroupRepository, InMemoryCodeRepository,
                 InMemoryGroupRepository, InMemoryWorkflowRepository, Workflow, WorkflowRepository};
use uuid::Uuid;

fn stored_code(repo: &mut InMemoryCodeRepository, label: &str) -> Code {
    let mut code = Code::store_and_upload("/home/user/codes", "run.sh").unwrap();
    code.set_label(label);
    repo.save(&code).unwrap();
    code
}

#[test]
fn test_group_membership_lifecycle() {
    let mut codes = InMemoryCodeRepository::new();
    let mut groups = InMemoryGroupRepository::new();

    let c1 = stored_code(&mut codes, "c1");
    let c2 = stored_code(&mut codes, "c2");

    let mut group = Group::new("testgroup", "", "user@localhost").unwrap();
    // Sin almacenar, la membresía está bloqueada
    assert!(matches!(group.add_member(c1.id()), Err(DomainError::ModificationNotAllowed(_))));

    groups.save(&mut group).unwrap();
    assert!(group.is_stored());

    assert!(group.add_member(c1.id()).unwrap());
    assert!(group.add_member(c2.id()).unwrap());
    // Duplicado: sin problema, sin cambio
    assert!(!group.add_member(c1.id()).unwrap());
    assert_eq!(group.len(), 2);

    // Quitar uno ausente no hace nada
    assert!(!group.remove_member(&Uuid::new_v4()).unwrap());
    assert!(group.remove_member(&c2.id()).unwrap());
    assert_eq!(group.members(), &[c1.id()]);

    groups.save(&mut group).unwrap();
    let reloaded = groups.find_by_name("testgroup").unwrap();
    assert_eq!(reloaded.members(), &[c1.id()]);
}

#[test]
fn test_group_description_update_preserves_stored_state() {
    let mut groups = InMemoryGroupRepository::new();

    let mut g1 = Group::new("testgroupdescription1", "g1", "user@localhost").unwrap();
    groups.save(&mut g1).unwrap();
    let mut g2 = Group::new("testgroupdescription2", "g2", "user@localhost").unwrap();

    assert!(g1.is_stored());
    assert!(!g2.is_stored());

    g1.set_description("new1");
    g2.set_description("new2");

    assert!(g1.is_stored());
    assert!(!g2.is_stored());
    assert_eq!(g1.description(), "new1");
    assert_eq!(g2.description(), "new2");

    groups.save(&mut g2).unwrap();
    assert_eq!(groups.find_by_name("testgroupdescription2").unwrap().description(), "new2");
}

#[test]
fn test_group_rename_before_and_after_store() {
    let mut groups = InMemoryGroupRepository::new();
    let mut group = Group::new("groupie", "I will be renamed", "user@localhost").unwrap();

    group.rename("nogroupie").unwrap();
    assert_eq!(group.name(), "nogroupie");
    group.rename("groupie").unwrap();

    groups.save(&mut group).unwrap();
    group.rename("nogroupie").unwrap();
    groups.save(&mut group).unwrap();
    assert!(groups.find_by_name("nogroupie").is_ok());
    assert!(groups.find_by_name("groupie").is_err());
}

#[test]
fn test_group_delete_loses_members() {
    let mut codes = InMemoryCodeRepository::new();
    let mut groups = InMemoryGroupRepository::new();
    let code = stored_code(&mut codes, "c1");

    let mut group = Group::new("testgroup3", "some other desc", "user@localhost").unwrap();
    groups.save(&mut group).unwrap();
    group.add_member(code.id()).unwrap();
    groups.save(&mut group).unwrap();
    assert_eq!(group.len(), 1);

    groups.delete(&mut group).unwrap();
    assert!(matches!(groups.find_by_name("testgroup3"), Err(DomainError::NotFound(_))));

    // Se puede volver a almacenar, pero la membresía se perdió
    groups.save(&mut group).unwrap();
    assert_eq!(group.len(), 0);
    assert_eq!(group.name(), "testgroup3");
    assert_eq!(group.description(), "some other desc");
    assert!(group.is_user_defined());
}

#[test]
fn test_group_name_uniqueness() {
    let mut groups = InMemoryGroupRepository::new();
    let mut g1 = Group::new("unique-name", "", "user@localhost").unwrap();
    groups.save(&mut g1).unwrap();
    let mut g2 = Group::new("unique-name", "", "other@localhost").unwrap();
    assert!(matches!(groups.save(&mut g2), Err(DomainError::Storage(_))));
}

#[test]
fn test_group_list_filters_by_owner() {
    let mut groups = InMemoryGroupRepository::new();
    let mut mine = Group::new("mine", "", "user@localhost").unwrap();
    let mut theirs = Group::new("theirs", "", "other@localhost").unwrap();
    groups.save(&mut mine).unwrap();
    groups.save(&mut theirs).unwrap();

    assert_eq!(groups.list(None).unwrap().len(), 2);
    let filtered = groups.list(Some("user@localhost")).unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].name(), "mine");
}

#[test]
fn test_code_repository_round_trip() {
    let mut codes = InMemoryCodeRepository::new();
    let computer = Computer::new("cluster", "cluster.lab", "ssh", "slurm", "/scratch").unwrap();
    let mut code = Code::on_computer(computer, "/usr/bin/pw.x").unwrap();
    code.set_label("pw");
    codes.save(&code).unwrap();

    let found = codes.find(code.id()).unwrap();
    assert_eq!(found, code);
    assert_eq!(found.content_hash(), code.content_hash());

    codes.delete(code.id()).unwrap();
    assert!(codes.find(code.id()).is_err());
}

#[test]
fn test_workflow_versioning_round_trip() {
    let mut repo = InMemoryWorkflowRepository::new();
    let mut w = Workflow::new();
    repo.save(&w).unwrap();
    assert_eq!(repo.find(w.id()).unwrap().version(), 1);

    w.set_label("label1");
    w.set_label("label2");
    w.set_description("desc1");
    repo.save(&w).unwrap();
    assert_eq!(repo.find(w.id()).unwrap().version(), 4);
}
