//! Builder de códigos con validación de combinaciones de atributos.
//!
//! La especificación de construcción es un mapa ordenado clave → valor que
//! se acumula de forma incremental. Cada mutación re-valida la
//! especificación completa y revierte el cambio si la dejaría inválida.
//!
//! Notas de diseño
//! - Las reglas son independientes y se evalúan todas en cada pasada; las
//!   violaciones se acumulan en vez de cortar en la primera.
//! - `build` consume exactamente el subconjunto de claves de la variante
//!   elegida más las comunes; una clave sobrante delata un typo y se
//!   reporta como `UnconsumedKeys`, una clase de error distinta de la
//!   validación de entrada.
//! - El builder no toca el filesystem: empaquetar la carpeta es trabajo de
//!   la capa de persistencia al almacenar.

use indexmap::IndexMap;
use thiserror::Error;

use crate::code::{Code, CodeSourceKind};
use crate::Computer;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

pub const KEY_CODE_TYPE: &str = "code_type";
pub const KEY_FOLDER: &str = "folder";
pub const KEY_REL_PATH: &str = "rel_path";
pub const KEY_COMPUTER: &str = "computer";
pub const KEY_REMOTE_ABS_PATH: &str = "remote_abs_path";
pub const KEY_LABEL: &str = "label";
pub const KEY_DESCRIPTION: &str = "description";
pub const KEY_INPUT_HANDLER: &str = "input_handler";
pub const KEY_PREPEND_TEXT: &str = "prepend_text";
pub const KEY_APPEND_TEXT: &str = "append_text";

/// Claves exclusivas de cada variante, usadas por las reglas 2 y 3.
const UPLOAD_ONLY_KEYS: [&str; 2] = [KEY_FOLDER, KEY_REL_PATH];
const ON_COMPUTER_ONLY_KEYS: [&str; 2] = [KEY_COMPUTER, KEY_REMOTE_ABS_PATH];

/// Valor tipado dentro de la especificación de construcción.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecValue {
    Text(String),
    Path(PathBuf),
    Computer(Computer),
}

impl SpecValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            SpecValue::Text(_) => "text",
            SpecValue::Path(_) => "path",
            SpecValue::Computer(_) => "computer",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SpecValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<PathBuf> {
        match self {
            SpecValue::Path(p) => Some(p.clone()),
            SpecValue::Text(s) => Some(PathBuf::from(s)),
            _ => None,
        }
    }

    pub fn as_computer(&self) -> Option<&Computer> {
        match self {
            SpecValue::Computer(c) => Some(c),
            _ => None,
        }
    }
}

impl From<&str> for SpecValue {
    fn from(value: &str) -> Self { SpecValue::Text(value.to_string()) }
}
impl From<String> for SpecValue {
    fn from(value: String) -> Self { SpecValue::Text(value) }
}
impl From<&Path> for SpecValue {
    fn from(value: &Path) -> Self { SpecValue::Path(value.to_path_buf()) }
}
impl From<PathBuf> for SpecValue {
    fn from(value: PathBuf) -> Self { SpecValue::Path(value) }
}
impl From<Computer> for SpecValue {
    fn from(value: Computer) -> Self { SpecValue::Computer(value) }
}

impl fmt::Display for SpecValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecValue::Text(s) => f.write_str(s),
            SpecValue::Path(p) => write!(f, "{}", p.display()),
            SpecValue::Computer(c) => write!(f, "{c}"),
        }
    }
}

/// Errores del builder. `Validation` es recuperable: el llamador corrige
/// la especificación y reintenta. `UnconsumedKeys` señala que las reglas y
/// la lógica de construcción se desincronizaron (o un typo de clave) y no
/// se reintenta.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("{}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("unknown parameters passed to the code builder: {}", .0.join(", "))]
    UnconsumedKeys(Vec<String>),
}

impl BuildError {
    /// Lista completa de mensajes de violación.
    pub fn messages(&self) -> &[String] {
        match self {
            BuildError::Validation(msgs) => msgs,
            BuildError::UnconsumedKeys(keys) => keys,
        }
    }
}

/// Acumulador de violaciones: corre cada regla y junta todos los mensajes
/// en vez de devolver sólo el primero.
#[derive(Debug, Default)]
pub struct ErrorAccumulator {
    messages: Vec<String>,
}

impl ErrorAccumulator {
    pub fn new() -> Self { Self::default() }

    pub fn run<F>(&mut self, rule: F)
        where F: FnOnce() -> Vec<String>
    {
        self.messages.extend(rule());
    }

    pub fn is_ok(&self) -> bool { self.messages.is_empty() }

    pub fn into_messages(self) -> Vec<String> { self.messages }

    pub fn into_result(self) -> Result<(), BuildError> {
        if self.messages.is_empty() {
            Ok(())
        } else {
            Err(BuildError::Validation(self.messages))
        }
    }
}

/// Acumula parámetros de construcción de un [`Code`] y los valida como
/// conjunto antes de materializar el objeto.
#[derive(Debug, Default, Clone)]
pub struct CodeBuilder {
    spec: IndexMap<String, SpecValue>,
}

impl CodeBuilder {
    pub fn new() -> Self { Self::default() }

    /// Agrega o sobreescribe un parámetro. Si la especificación resultante
    /// viola alguna regla, la mutación se descarta (snapshot-and-restore)
    /// y se devuelven todas las violaciones.
    pub fn set(&mut self, key: &str, value: impl Into<SpecValue>) -> Result<(), BuildError> {
        let backup = self.spec.clone();
        self.spec.insert(key.to_string(), value.into());
        let messages = self.violations();
        if !messages.is_empty() {
            self.spec = backup;
            return Err(BuildError::Validation(messages));
        }
        Ok(())
    }

    /// Valor actual de una clave, o `None` si nunca se fijó. Nunca aplica
    /// defaults silenciosos.
    pub fn get(&self, key: &str) -> Option<&SpecValue> {
        self.spec.get(key)
    }

    /// Claves presentes, en orden de inserción.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.spec.keys().map(|k| k.as_str())
    }

    /// Corre todas las reglas y devuelve la lista completa de mensajes de
    /// violación (vacía si la especificación es válida).
    pub fn violations(&self) -> Vec<String> {
        let mut acc = ErrorAccumulator::new();
        acc.run(|| self.rule_code_type());
        acc.run(|| self.rule_store_and_upload());
        acc.run(|| self.rule_on_computer());
        acc.into_messages()
    }

    /// Como [`violations`](Self::violations) pero con error agregado.
    pub fn validate(&self) -> Result<(), BuildError> {
        let mut acc = ErrorAccumulator::new();
        acc.run(|| self.rule_code_type());
        acc.run(|| self.rule_store_and_upload());
        acc.run(|| self.rule_on_computer());
        acc.into_result()
    }

    /// Regla 1: el tag de variante, si está presente, debe ser uno de los
    /// dos valores reconocidos.
    fn rule_code_type(&self) -> Vec<String> {
        match self.spec.get(KEY_CODE_TYPE) {
            None => vec![],
            Some(SpecValue::Text(raw)) => {
                if CodeSourceKind::parse(raw).is_some() {
                    vec![]
                } else {
                    let expected: Vec<&str> = CodeSourceKind::ALL.iter().map(|k| k.as_str()).collect();
                    vec![format!("invalid code type: must be one of [{}], not \"{raw}\"", expected.join(", "))]
                }
            }
            Some(other) => vec![format!("\"{KEY_CODE_TYPE}\": expected text, got {}", other.kind_name())],
        }
    }

    /// Regla 2: atributos on-computer son inválidos cuando el tag es
    /// store-and-upload, o cuando no hay tag pero ya hay atributos
    /// store-and-upload presentes.
    fn rule_store_and_upload(&self) -> Vec<String> {
        let applies = match self.tag() {
            Some(CodeSourceKind::StoreAndUpload) => true,
            Some(CodeSourceKind::OnComputer) => false,
            None => !self.has_tag_key() && self.any_present(&UPLOAD_ONLY_KEYS),
        };
        if !applies {
            return vec![];
        }
        ON_COMPUTER_ONLY_KEYS.iter()
                             .filter(|key| self.spec.contains_key(**key))
                             .map(|key| format!("invalid option for store-and-upload code: \"{key}\""))
                             .collect()
    }

    /// Regla 3: atributos store-and-upload son inválidos cuando el tag es
    /// on-computer, o cuando no hay tag pero ya hay atributos on-computer
    /// presentes.
    fn rule_on_computer(&self) -> Vec<String> {
        let applies = match self.tag() {
            Some(CodeSourceKind::OnComputer) => true,
            Some(CodeSourceKind::StoreAndUpload) => false,
            None => !self.has_tag_key() && self.any_present(&ON_COMPUTER_ONLY_KEYS),
        };
        if !applies {
            return vec![];
        }
        UPLOAD_ONLY_KEYS.iter()
                        .filter(|key| self.spec.contains_key(**key))
                        .map(|key| format!("invalid option for on-computer code: \"{key}\""))
                        .collect()
    }

    fn has_tag_key(&self) -> bool {
        self.spec.contains_key(KEY_CODE_TYPE)
    }

    /// Tag parseado, o `None` si está ausente o no parsea (la regla 1 se
    /// encarga de reportar el texto inválido).
    fn tag(&self) -> Option<CodeSourceKind> {
        self.spec.get(KEY_CODE_TYPE)
                 .and_then(|v| v.as_text())
                 .and_then(CodeSourceKind::parse)
    }

    fn any_present(&self, keys: &[&str]) -> bool {
        keys.iter().any(|key| self.spec.contains_key(*key))
    }

    /// Valida la especificación completa y materializa el [`Code`]. El
    /// builder no se consume: ante un error de validación el llamador
    /// puede corregir y reintentar.
    pub fn build(&self) -> Result<Code, BuildError> {
        self.validate()?;

        // Se usa al final para detectar claves pasadas pero nunca leídas.
        let passed: BTreeSet<String> = self.spec.keys().cloned().collect();
        let mut used: BTreeSet<String> = BTreeSet::new();

        let kind = self.resolve_kind(&mut used)?;
        let mut code = match kind {
            CodeSourceKind::StoreAndUpload => {
                let folder = self.take_path(KEY_FOLDER, &mut used)?;
                let rel_path = self.take_text(KEY_REL_PATH, &mut used)?;
                Code::store_and_upload(folder, &rel_path)
            }
            CodeSourceKind::OnComputer => {
                let computer = self.take_computer(KEY_COMPUTER, &mut used)?;
                let remote_path = self.take_path(KEY_REMOTE_ABS_PATH, &mut used)?;
                Code::on_computer(computer, remote_path)
            }
        }.map_err(|e| BuildError::Validation(vec![e.to_string()]))?;

        code.set_label(self.take_text(KEY_LABEL, &mut used)?);
        code.set_description(self.take_text(KEY_DESCRIPTION, &mut used)?);
        code.set_input_handler(self.take_text(KEY_INPUT_HANDLER, &mut used)?);
        code.set_prepend_text(self.take_text_or_default(KEY_PREPEND_TEXT, &mut used)?);
        code.set_append_text(self.take_text_or_default(KEY_APPEND_TEXT, &mut used)?);

        let unconsumed: Vec<String> = passed.difference(&used).cloned().collect();
        if !unconsumed.is_empty() {
            return Err(BuildError::UnconsumedKeys(unconsumed));
        }
        Ok(code)
    }

    /// Resuelve la variante: tag explícito si existe; si no, se infiere
    /// del subconjunto poblado (la validación ya garantizó que no hay
    /// mezcla cuando el tag está ausente).
    fn resolve_kind(&self, used: &mut BTreeSet<String>) -> Result<CodeSourceKind, BuildError> {
        if self.has_tag_key() {
            let raw = self.take_text(KEY_CODE_TYPE, used)?;
            return CodeSourceKind::parse(&raw)
                .ok_or_else(|| BuildError::Validation(vec![format!("invalid code type: \"{raw}\"")]));
        }
        let upload = self.any_present(&UPLOAD_ONLY_KEYS);
        let on_computer = self.any_present(&ON_COMPUTER_ONLY_KEYS);
        match (upload, on_computer) {
            (true, false) => Ok(CodeSourceKind::StoreAndUpload),
            (false, true) => Ok(CodeSourceKind::OnComputer),
            _ => Err(BuildError::Validation(vec![format!("{KEY_CODE_TYPE} not set")])),
        }
    }

    /// Lee una clave requerida registrándola como consumida. Primero se
    /// obtiene el valor: si la lectura falla, la clave no se marca.
    fn take<'a>(&'a self, key: &str, used: &mut BTreeSet<String>) -> Result<&'a SpecValue, BuildError> {
        let value = self.spec
                        .get(key)
                        .ok_or_else(|| BuildError::Validation(vec![format!("{key} not set")]))?;
        used.insert(key.to_string());
        Ok(value)
    }

    fn take_text(&self, key: &str, used: &mut BTreeSet<String>) -> Result<String, BuildError> {
        let value = self.take(key, used)?;
        value.as_text()
             .map(str::to_string)
             .ok_or_else(|| BuildError::Validation(vec![format!("\"{key}\": expected text, got {}", value.kind_name())]))
    }

    fn take_text_or_default(&self, key: &str, used: &mut BTreeSet<String>) -> Result<String, BuildError> {
        if self.spec.contains_key(key) {
            self.take_text(key, used)
        } else {
            Ok(String::new())
        }
    }

    fn take_path(&self, key: &str, used: &mut BTreeSet<String>) -> Result<PathBuf, BuildError> {
        let value = self.take(key, used)?;
        value.as_path()
             .ok_or_else(|| BuildError::Validation(vec![format!("\"{key}\": expected path, got {}", value.kind_name())]))
    }

    fn take_computer(&self, key: &str, used: &mut BTreeSet<String>) -> Result<Computer, BuildError> {
        let value = self.take(key, used)?;
        value.as_computer()
             .cloned()
             .ok_or_else(|| BuildError::Validation(vec![format!("\"{key}\": expected a computer reference, got {}", value.kind_name())]))
    }
}
