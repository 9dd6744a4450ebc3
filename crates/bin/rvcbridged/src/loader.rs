//! Startup loaders for the two declarative input documents: the RV-C
//! spec dictionary and the entity mapping. Both are loaded exactly once,
//! before any activity starts, and are fatal on failure.

use rvcbridge_domain::entity::{EntityIndex, MappingDocument};
use rvcbridge_domain::error::{MappingError, SpecLoadError};
use rvcbridge_domain::spec::{SpecDocument, SpecRegistry};

/// Parse and validate a spec document from TOML text.
///
/// # Errors
///
/// Returns [`SpecLoadError`] on syntax errors or any registry invariant
/// violation.
pub fn parse_spec(content: &str) -> Result<SpecRegistry, SpecLoadError> {
    let doc: SpecDocument =
        toml::from_str(content).map_err(|err| SpecLoadError::Syntax(err.to_string()))?;
    SpecRegistry::from_document(doc)
}

/// Read, parse and validate the spec document at `path`.
///
/// # Errors
///
/// See [`parse_spec`]; file read failures surface as syntax errors.
pub fn load_spec(path: &str) -> Result<SpecRegistry, SpecLoadError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| SpecLoadError::Syntax(format!("{path}: {err}")))?;
    parse_spec(&content)
}

/// Parse and validate a mapping document from TOML text.
///
/// # Errors
///
/// Returns [`MappingError`] on syntax errors or index invariant
/// violations.
pub fn parse_mapping(content: &str) -> Result<EntityIndex, MappingError> {
    let doc: MappingDocument =
        toml::from_str(content).map_err(|err| MappingError::Syntax(err.to_string()))?;
    EntityIndex::from_document(doc)
}

/// Read, parse and validate the mapping document at `path`.
///
/// # Errors
///
/// See [`parse_mapping`]; file read failures surface as syntax errors.
pub fn load_mapping(path: &str) -> Result<EntityIndex, MappingError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| MappingError::Syntax(format!("{path}: {err}")))?;
    parse_mapping(&content)
}
