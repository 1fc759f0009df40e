use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{Computer, DomainError};
use std::fmt;
use std::path::{Path, PathBuf};

/// Procedencia de un código: unión cerrada de dos variantes mutuamente
/// excluyentes. Extender aquí implica extender también la tabla de reglas
/// del `CodeBuilder`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CodeSource {
    /// Los archivos se empaquetan desde una carpeta local y quedan
    /// almacenados por la capa de persistencia. `rel_path` selecciona el
    /// ejecutable dentro de la carpeta.
    StoreAndUpload { folder: PathBuf, rel_path: String },
    /// El ejecutable ya existe en una ruta absoluta de un computador
    /// remoto conocido.
    OnComputer { computer: Computer, remote_path: PathBuf },
}

/// Discriminante serializable de `CodeSource`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeSourceKind {
    StoreAndUpload,
    OnComputer,
}

impl CodeSourceKind {
    pub const ALL: [CodeSourceKind; 2] = [CodeSourceKind::StoreAndUpload, CodeSourceKind::OnComputer];

    pub fn as_str(&self) -> &'static str {
        match self {
            CodeSourceKind::StoreAndUpload => "store_and_upload",
            CodeSourceKind::OnComputer => "on_computer",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "store_and_upload" => Some(CodeSourceKind::StoreAndUpload),
            "on_computer" => Some(CodeSourceKind::OnComputer),
            _ => None,
        }
    }
}

impl fmt::Display for CodeSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Código ejecutable registrado en la base de provenance: un binario o
/// script que los cálculos invocan, junto a su metadata común.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Code {
    id: Uuid,
    source: CodeSource,
    label: String,
    description: String,
    input_handler: String,
    prepend_text: String,
    append_text: String,
    metadata: serde_json::Value,
}

impl Code {
    fn new(source: CodeSource) -> Self {
        Code { id: Uuid::new_v4(),
               source,
               label: String::new(),
               description: String::new(),
               input_handler: String::new(),
               prepend_text: String::new(),
               append_text: String::new(),
               metadata: serde_json::json!({}) }
    }

    /// Código cuyos archivos se empaquetan desde `folder` y se suben al
    /// almacén. No se toca el filesystem aquí: el empaquetado ocurre al
    /// almacenar.
    pub fn store_and_upload(folder: impl Into<PathBuf>, rel_path: &str) -> Result<Self, DomainError> {
        let folder = folder.into();
        if folder.as_os_str().is_empty() {
            return Err(DomainError::ValidationError("code folder cannot be empty".to_string()));
        }
        if rel_path.is_empty() {
            return Err(DomainError::ValidationError("executable rel_path cannot be empty".to_string()));
        }
        if Path::new(rel_path).is_absolute() {
            return Err(DomainError::ValidationError(format!("executable rel_path must be relative to the folder, got \"{rel_path}\"")));
        }
        Ok(Code::new(CodeSource::StoreAndUpload { folder, rel_path: rel_path.to_string() }))
    }

    /// Código ya instalado en un computador remoto.
    pub fn on_computer(computer: Computer, remote_path: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let remote_path = remote_path.into();
        if remote_path.as_os_str().is_empty() {
            return Err(DomainError::ValidationError("remote path cannot be empty".to_string()));
        }
        if !remote_path.is_absolute() {
            return Err(DomainError::ValidationError(format!("remote path must be absolute, got \"{}\"", remote_path.display())));
        }
        Ok(Code::new(CodeSource::OnComputer { computer, remote_path }))
    }

    /// Reconstrucción desde la capa de persistencia (id y metadata ya
    /// conocidos).
    pub fn from_stored(id: Uuid,
                       source: CodeSource,
                       label: &str,
                       description: &str,
                       input_handler: &str,
                       prepend_text: &str,
                       append_text: &str,
                       metadata: serde_json::Value)
                       -> Result<Self, DomainError> {
        let mut code = match source {
            CodeSource::StoreAndUpload { folder, rel_path } => Code::store_and_upload(folder, &rel_path)?,
            CodeSource::OnComputer { computer, remote_path } => Code::on_computer(computer, remote_path)?,
        };
        code.id = id;
        code.label = label.to_string();
        code.description = description.to_string();
        code.input_handler = input_handler.to_string();
        code.prepend_text = prepend_text.to_string();
        code.append_text = append_text.to_string();
        code.metadata = metadata;
        Ok(code)
    }

    pub fn set_label(&mut self, label: impl Into<String>) { self.label = label.into(); }
    pub fn set_description(&mut self, description: impl Into<String>) { self.description = description.into(); }
    pub fn set_input_handler(&mut self, input_handler: impl Into<String>) { self.input_handler = input_handler.into(); }
    pub fn set_prepend_text(&mut self, prepend_text: impl Into<String>) { self.prepend_text = prepend_text.into(); }
    pub fn set_append_text(&mut self, append_text: impl Into<String>) { self.append_text = append_text.into(); }
    pub fn set_metadata(&mut self, metadata: serde_json::Value) { self.metadata = metadata; }

    pub fn id(&self) -> Uuid { self.id }
    pub fn source(&self) -> &CodeSource { &self.source }
    pub fn label(&self) -> &str { &self.label }
    pub fn description(&self) -> &str { &self.description }
    pub fn input_handler(&self) -> &str { &self.input_handler }
    pub fn prepend_text(&self) -> &str { &self.prepend_text }
    pub fn append_text(&self) -> &str { &self.append_text }
    pub fn metadata(&self) -> &serde_json::Value { &self.metadata }

    pub fn source_kind(&self) -> CodeSourceKind {
        match &self.source {
            CodeSource::StoreAndUpload { .. } => CodeSourceKind::StoreAndUpload,
            CodeSource::OnComputer { .. } => CodeSourceKind::OnComputer,
        }
    }

    /// Computador remoto asociado, si el código es on-computer.
    pub fn computer(&self) -> Option<&Computer> {
        match &self.source {
            CodeSource::OnComputer { computer, .. } => Some(computer),
            CodeSource::StoreAndUpload { .. } => None,
        }
    }

    /// Nombre del ejecutable tal como lo invocaría el scheduler.
    pub fn execname(&self) -> String {
        match &self.source {
            CodeSource::StoreAndUpload { rel_path, .. } => rel_path.clone(),
            CodeSource::OnComputer { remote_path, .. } => remote_path.display().to_string(),
        }
    }

    /// Un código on-computer sólo corre en su computador; uno almacenado
    /// corre en cualquiera.
    pub fn can_run_on(&self, target: &Computer) -> bool {
        match &self.source {
            CodeSource::StoreAndUpload { .. } => true,
            CodeSource::OnComputer { computer, .. } => computer.name() == target.name(),
        }
    }

    /// Hash de contenido sobre los campos de identidad del código, para
    /// deduplicación y verificación de integridad.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.source_kind().as_str().as_bytes());
        match &self.source {
            CodeSource::StoreAndUpload { folder, rel_path } => {
                hasher.update(folder.display().to_string().as_bytes());
                hasher.update(rel_path.as_bytes());
            }
            CodeSource::OnComputer { computer, remote_path } => {
                hasher.update(computer.name().as_bytes());
                hasher.update(remote_path.display().to_string().as_bytes());
            }
        }
        hasher.update(self.label.as_bytes());
        hasher.update(self.input_handler.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Code(label: {}, kind: {})", self.label, self.source_kind())
    }
}

// Dos códigos son el mismo si sus campos de identidad coinciden.
impl PartialEq for Code {
    fn eq(&self, other: &Self) -> bool {
        self.content_hash() == other.content_hash()
    }
}
