//! In-process registry of opened data sources and default selection.

use crate::repo::datasource::SqliteDataSource;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Data source registration/lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSourceRegistryError {
    InvalidName(String),
    DuplicateName(String),
    NotFound(String),
}

impl Display for DataSourceRegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(value) => write!(f, "data source name is invalid: {value}"),
            Self::DuplicateName(value) => {
                write!(f, "data source already registered: {value}")
            }
            Self::NotFound(value) => write!(f, "data source not found: {value}"),
        }
    }
}

impl Error for DataSourceRegistryError {}

/// Named data sources opened at runtime start.
#[derive(Debug, Default)]
pub struct DataSourceRegistry {
    data_sources: BTreeMap<String, Arc<SqliteDataSource>>,
    default_name: Option<String>,
}

impl DataSourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one opened data source under its own name.
    pub fn register(
        &mut self,
        data_source: SqliteDataSource,
    ) -> Result<Arc<SqliteDataSource>, DataSourceRegistryError> {
        let name = data_source.name().trim().to_string();
        if name.is_empty() {
            return Err(DataSourceRegistryError::InvalidName(name));
        }
        if self.data_sources.contains_key(name.as_str()) {
            return Err(DataSourceRegistryError::DuplicateName(name));
        }

        let data_source = Arc::new(data_source);
        self.data_sources.insert(name, Arc::clone(&data_source));
        Ok(data_source)
    }

    pub fn len(&self) -> usize {
        self.data_sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_sources.is_empty()
    }

    /// Returns sorted data source names.
    pub fn names(&self) -> Vec<String> {
        self.data_sources.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<SqliteDataSource>> {
        self.data_sources.get(name.trim()).cloned()
    }

    /// Like [`get`](Self::get), with a typed error for unknown names.
    pub fn require(&self, name: &str) -> Result<Arc<SqliteDataSource>, DataSourceRegistryError> {
        self.get(name)
            .ok_or_else(|| DataSourceRegistryError::NotFound(name.trim().to_string()))
    }

    /// Selects the data source returned by [`default_source`](Self::default_source).
    pub fn select_default(&mut self, name: &str) -> Result<(), DataSourceRegistryError> {
        let normalized = name.trim();
        if !self.data_sources.contains_key(normalized) {
            return Err(DataSourceRegistryError::NotFound(normalized.to_string()));
        }
        self.default_name = Some(normalized.to_string());
        Ok(())
    }

    /// Explicitly selected name, or the only registered one.
    pub fn default_name(&self) -> Option<&str> {
        match &self.default_name {
            Some(name) => Some(name.as_str()),
            None if self.data_sources.len() == 1 => {
                self.data_sources.keys().next().map(String::as_str)
            }
            None => None,
        }
    }

    pub fn default_source(&self) -> Option<Arc<SqliteDataSource>> {
        let name = self.default_name()?;
        self.get(name)
    }
}
