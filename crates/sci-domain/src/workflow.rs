use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Registro versionado de un workflow: cada mutación de atributo
/// incrementa `version`, de modo que el historial de escrituras queda
/// contabilizado aunque el contenido converja.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    id: Uuid,
    label: String,
    description: String,
    version: u32,
}

impl Workflow {
    pub fn new() -> Self {
        Workflow { id: Uuid::new_v4(),
                   label: String::new(),
                   description: String::new(),
                   version: 1 }
    }

    pub fn from_stored(id: Uuid, label: &str, description: &str, version: u32) -> Self {
        Workflow { id,
                   label: label.to_string(),
                   description: description.to_string(),
                   version }
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
        self.version += 1;
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
        self.version += 1;
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn label(&self) -> &str { &self.label }
    pub fn description(&self) -> &str { &self.description }
    pub fn version(&self) -> u32 { self.version }
}

impl Default for Workflow {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_mutation_bumps_version() {
        let mut w = Workflow::new();
        assert_eq!(w.version(), 1);

        w.set_label("label1");
        w.set_label("label2");
        assert_eq!(w.version(), 3);

        w.set_description("desc1");
        w.set_description("desc2");
        w.set_description("desc3");
        assert_eq!(w.version(), 6);
    }
}
