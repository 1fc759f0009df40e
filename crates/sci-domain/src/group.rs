// group.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::DomainError;
use std::fmt;

/// Colección nombrada de códigos almacenados. A diferencia de los códigos,
/// un grupo es mutable y conserva su identidad a través de renombres; la
/// membresía sólo puede cambiar una vez que el grupo fue almacenado.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    id: Uuid,
    name: String,
    description: String,
    owner: String,
    user_defined: bool,
    stored: bool,
    members: Vec<Uuid>,
    created_at: DateTime<Utc>,
}

impl Group {
    /// Crea un grupo nuevo, todavía no almacenado.
    ///
    /// # Errores
    /// Retorna `DomainError::ValidationError` si el nombre está vacío.
    pub fn new(name: &str, description: &str, owner: &str) -> Result<Self, DomainError> {
        if name.trim().is_empty() {
            return Err(DomainError::ValidationError("group name cannot be empty".to_string()));
        }
        Ok(Group { id: Uuid::new_v4(),
                   name: name.to_string(),
                   description: description.to_string(),
                   owner: owner.to_string(),
                   user_defined: true,
                   stored: false,
                   members: Vec::new(),
                   created_at: Utc::now() })
    }

    /// Reconstrucción desde la capa de persistencia: ya almacenado, con la
    /// membresía leída de la base.
    pub fn from_stored(id: Uuid,
                       name: &str,
                       description: &str,
                       owner: &str,
                       user_defined: bool,
                       members: Vec<Uuid>,
                       created_at: DateTime<Utc>)
                       -> Result<Self, DomainError> {
        let mut group = Group::new(name, description, owner)?;
        group.id = id;
        group.user_defined = user_defined;
        group.stored = true;
        group.members = members;
        group.created_at = created_at;
        Ok(group)
    }

    /// Renombra el grupo; funciona antes y después de almacenar.
    pub fn rename(&mut self, name: &str) -> Result<(), DomainError> {
        if name.trim().is_empty() {
            return Err(DomainError::ValidationError("group name cannot be empty".to_string()));
        }
        self.name = name.to_string();
        Ok(())
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Agrega un código a la membresía. Devuelve `false` si ya estaba
    /// presente (operación idempotente).
    ///
    /// # Errores
    /// `ModificationNotAllowed` si el grupo todavía no fue almacenado.
    pub fn add_member(&mut self, code_id: Uuid) -> Result<bool, DomainError> {
        if !self.stored {
            return Err(DomainError::ModificationNotAllowed("cannot add codes to an unstored group".to_string()));
        }
        if self.members.contains(&code_id) {
            return Ok(false);
        }
        self.members.push(code_id);
        Ok(true)
    }

    /// Quita un código de la membresía. Quitar uno ausente no hace nada y
    /// devuelve `false`.
    pub fn remove_member(&mut self, code_id: &Uuid) -> Result<bool, DomainError> {
        if !self.stored {
            return Err(DomainError::ModificationNotAllowed("cannot remove codes from an unstored group".to_string()));
        }
        let before = self.members.len();
        self.members.retain(|m| m != code_id);
        Ok(self.members.len() != before)
    }

    /// La capa de persistencia lo invoca al almacenar por primera vez.
    pub fn mark_stored(&mut self) {
        self.stored = true;
    }

    /// Al borrar el grupo en la base se pierde la membresía; volver a
    /// almacenarlo arranca vacío.
    pub fn reset_unstored(&mut self) {
        self.stored = false;
        self.members.clear();
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn description(&self) -> &str { &self.description }
    pub fn owner(&self) -> &str { &self.owner }
    pub fn is_user_defined(&self) -> bool { self.user_defined }
    pub fn is_stored(&self) -> bool { self.stored }
    pub fn members(&self) -> &[Uuid] { &self.members }
    pub fn len(&self) -> usize { self.members.len() }
    pub fn is_empty(&self) -> bool { self.members.is_empty() }
    pub fn contains(&self, code_id: &Uuid) -> bool { self.members.contains(code_id) }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Group(name: {}, codes: {})", self.name, self.members.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_requires_name() {
        assert!(Group::new("", "desc", "user@localhost").is_err());
        assert!(Group::new("   ", "desc", "user@localhost").is_err());
    }

    #[test]
    fn test_unstored_group_rejects_members() {
        let mut group = Group::new("testgroup", "", "user@localhost").unwrap();
        let result = group.add_member(Uuid::new_v4());
        assert!(matches!(result, Err(DomainError::ModificationNotAllowed(_))));
    }

    #[test]
    fn test_duplicate_add_is_noop() {
        let mut group = Group::new("testgroup", "", "user@localhost").unwrap();
        group.mark_stored();
        let code_id = Uuid::new_v4();
        assert!(group.add_member(code_id).unwrap());
        assert!(!group.add_member(code_id).unwrap());
        assert_eq!(group.len(), 1);
    }
}
