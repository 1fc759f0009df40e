use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::DomainError;
use std::fmt;
use std::path::Path;

/// Referencia opaca a un host remoto donde viven códigos instalados.
/// El builder la transporta sin interpretarla; sólo la capa de
/// persistencia y el scheduler externo la consumen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Computer {
    id: Uuid,
    name: String,
    hostname: String,
    transport: String,
    scheduler: String,
    workdir: String,
}

impl Computer {
    pub fn new(name: &str,
               hostname: &str,
               transport: &str,
               scheduler: &str,
               workdir: &str)
               -> Result<Self, DomainError> {
        if name.trim().is_empty() {
            return Err(DomainError::ValidationError("computer name cannot be empty".to_string()));
        }
        if hostname.trim().is_empty() {
            return Err(DomainError::ValidationError("computer hostname cannot be empty".to_string()));
        }
        if !Path::new(workdir).is_absolute() {
            return Err(DomainError::ValidationError(format!("computer workdir must be an absolute path, got \"{workdir}\"")));
        }
        Ok(Computer { id: Uuid::new_v4(),
                      name: name.to_string(),
                      hostname: hostname.to_string(),
                      transport: transport.to_string(),
                      scheduler: scheduler.to_string(),
                      workdir: workdir.to_string() })
    }

    /// Reconstrucción desde la capa de persistencia (id ya asignado).
    pub fn from_stored(id: Uuid,
                       name: &str,
                       hostname: &str,
                       transport: &str,
                       scheduler: &str,
                       workdir: &str)
                       -> Result<Self, DomainError> {
        let mut computer = Computer::new(name, hostname, transport, scheduler, workdir)?;
        computer.id = id;
        Ok(computer)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn hostname(&self) -> &str { &self.hostname }
    pub fn transport(&self) -> &str { &self.transport }
    pub fn scheduler(&self) -> &str { &self.scheduler }
    pub fn workdir(&self) -> &str { &self.workdir }
}

impl fmt::Display for Computer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<computer: {} ({})>", self.name, self.hostname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_computer_requires_absolute_workdir() {
        let result = Computer::new("localhost", "localhost", "local", "direct", "tmp/run");
        assert!(result.is_err());
    }

    #[test]
    fn test_computer_creation() {
        let computer = Computer::new("localhost", "localhost", "local", "direct", "/tmp/run").unwrap();
        assert_eq!(computer.name(), "localhost");
        assert_eq!(computer.workdir(), "/tmp/run");
    }
}
