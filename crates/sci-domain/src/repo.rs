//! Contratos de almacenamiento para los objetos de dominio, con
//! implementaciones en memoria de referencia. Las implementaciones
//! Postgres viven en `sci-persistence` y deben mantener paridad de
//! comportamiento con las de este módulo.

use std::collections::HashMap;
use uuid::Uuid;

use crate::{Code, DomainError, Group, Workflow};

/// Almacenamiento de códigos.
pub trait CodeRepository {
    /// Inserta o actualiza un código (upsert por id).
    fn save(&mut self, code: &Code) -> Result<(), DomainError>;
    fn find(&self, id: Uuid) -> Result<Code, DomainError>;
    fn list(&self) -> Result<Vec<Code>, DomainError>;
    fn delete(&mut self, id: Uuid) -> Result<(), DomainError>;
}

/// Almacenamiento de grupos. `save` sincroniza la fila del grupo y su
/// membresía completa en una sola operación; la primera llamada marca el
/// grupo como almacenado.
pub trait GroupRepository {
    fn save(&mut self, group: &mut Group) -> Result<(), DomainError>;
    fn find_by_name(&self, name: &str) -> Result<Group, DomainError>;
    /// Lista grupos, opcionalmente filtrados por dueño.
    fn list(&self, owner: Option<&str>) -> Result<Vec<Group>, DomainError>;
    /// Borra el grupo y su membresía; el objeto vuelve al estado
    /// no-almacenado y pierde sus miembros.
    fn delete(&mut self, group: &mut Group) -> Result<(), DomainError>;
}

/// Almacenamiento de workflows versionados.
pub trait WorkflowRepository {
    fn save(&mut self, workflow: &Workflow) -> Result<(), DomainError>;
    fn find(&self, id: Uuid) -> Result<Workflow, DomainError>;
}

pub struct InMemoryCodeRepository { pub inner: HashMap<Uuid, Code> }

impl Default for InMemoryCodeRepository { fn default() -> Self { Self { inner: HashMap::new() } } }

impl InMemoryCodeRepository {
    pub fn new() -> Self { Self::default() }
}

impl CodeRepository for InMemoryCodeRepository {
    fn save(&mut self, code: &Code) -> Result<(), DomainError> {
        self.inner.insert(code.id(), code.clone());
        Ok(())
    }
    fn find(&self, id: Uuid) -> Result<Code, DomainError> {
        self.inner.get(&id).cloned().ok_or_else(|| DomainError::NotFound(format!("code {id}")))
    }
    fn list(&self) -> Result<Vec<Code>, DomainError> {
        Ok(self.inner.values().cloned().collect())
    }
    fn delete(&mut self, id: Uuid) -> Result<(), DomainError> {
        self.inner.remove(&id).map(|_| ()).ok_or_else(|| DomainError::NotFound(format!("code {id}")))
    }
}

pub struct InMemoryGroupRepository { pub inner: HashMap<Uuid, Group> }

impl Default for InMemoryGroupRepository { fn default() -> Self { Self { inner: HashMap::new() } } }

impl InMemoryGroupRepository {
    pub fn new() -> Self { Self::default() }
}

impl GroupRepository for InMemoryGroupRepository {
    fn save(&mut self, group: &mut Group) -> Result<(), DomainError> {
        // Unicidad de nombre, igual que el UNIQUE de la tabla.
        if self.inner
               .values()
               .any(|g| g.name() == group.name() && g.id() != group.id())
        {
            return Err(DomainError::Storage(format!("group name already taken: {}", group.name())));
        }
        group.mark_stored();
        self.inner.insert(group.id(), group.clone());
        Ok(())
    }
    fn find_by_name(&self, name: &str) -> Result<Group, DomainError> {
        self.inner
            .values()
            .find(|g| g.name() == name)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(format!("group {name}")))
    }
    fn list(&self, owner: Option<&str>) -> Result<Vec<Group>, DomainError> {
        let mut groups: Vec<Group> = self.inner
                                         .values()
                                         .filter(|g| owner.map_or(true, |o| g.owner() == o))
                                         .cloned()
                                         .collect();
        groups.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(groups)
    }
    fn delete(&mut self, group: &mut Group) -> Result<(), DomainError> {
        self.inner
            .remove(&group.id())
            .ok_or_else(|| DomainError::NotFound(format!("group {}", group.name())))?;
        group.reset_unstored();
        Ok(())
    }
}

pub struct InMemoryWorkflowRepository { pub inner: HashMap<Uuid, Workflow> }

impl Default for InMemoryWorkflowRepository { fn default() -> Self { Self { inner: HashMap::new() } } }

impl InMemoryWorkflowRepository {
    pub fn new() -> Self { Self::default() }
}

impl WorkflowRepository for InMemoryWorkflowRepository {
    fn save(&mut self, workflow: &Workflow) -> Result<(), DomainError> {
        self.inner.insert(workflow.id(), workflow.clone());
        Ok(())
    }
    fn find(&self, id: Uuid) -> Result<Workflow, DomainError> {
        self.inner.get(&id).cloned().ok_or_else(|| DomainError::NotFound(format!("workflow {id}")))
    }
}
