//! Component Registry: every component record, classified and compiled.
//!
//! A load either fully succeeds or leaves the registry empty. Pages are kept
//! as validated records and compiled when mounted; shared modules are
//! compiled at load time into the [`ModuleLookup`] other components read.

use crate::capability::{Capabilities, ModuleLookup};
use crate::compiler::Compiler;
use crate::config::ShellConfig;
use rowshell_host::{HostDocument, HostError};
use rowshell_model::{ComponentRecord, RecordError, Row};
use std::collections::{HashMap, HashSet};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no component found in table `{table}`")]
    Empty { table: String },
    #[error(transparent)]
    InvalidRecord(#[from] RecordError),
    #[error("duplicate component id `{0}`")]
    DuplicateId(String),
    #[error("cannot fetch components: {0}")]
    Fetch(#[from] HostError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub pages: usize,
    pub modules: usize,
    /// Shared modules that failed to compile and were skipped.
    pub failed_modules: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Registry {
    pages: Vec<ComponentRecord>,
    index: HashMap<String, usize>,
    module_records: Vec<ComponentRecord>,
    modules: ModuleLookup,
}

impl Registry {
    pub fn new(modules: ModuleLookup) -> Self {
        Self {
            modules,
            ..Self::default()
        }
    }

    /// Fetch the components table and rebuild the registry from it.
    /// Shared modules compile against the compiler's current base, so call
    /// [`Compiler::set_base`] first.
    pub async fn load(
        &mut self,
        document: &dyn HostDocument,
        config: &ShellConfig,
        compiler: &Compiler,
    ) -> Result<LoadSummary, RegistryError> {
        let rows = match document.fetch_rows(&config.components_table).await {
            Ok(rows) => rows,
            Err(err) => {
                self.clear();
                return Err(err.into());
            }
        };
        self.load_rows(&rows, config, compiler)
    }

    /// Rebuild from already fetched rows. Any invalid row aborts the whole
    /// load and leaves the registry empty. Same base requirement as [`Self::load`].
    pub fn load_rows(
        &mut self,
        rows: &[Row],
        config: &ShellConfig,
        compiler: &Compiler,
    ) -> Result<LoadSummary, RegistryError> {
        let result = validate(rows, config);
        let records = match result {
            Ok(records) => records,
            Err(err) => {
                self.clear();
                return Err(err);
            }
        };

        self.clear();
        let mut summary = LoadSummary::default();
        for record in records {
            if record.is_page() {
                self.index.insert(record.id.clone(), self.pages.len());
                self.pages.push(record);
                summary.pages += 1;
                continue;
            }

            let compiled = compiler.compile(
                &record.id,
                &record.source_code,
                &record.source_type,
                &Capabilities::new(),
            );
            match compiled {
                Ok(export) => self.modules.insert(&record.id, export),
                Err(err) => {
                    tracing::error!(component_id = %record.id, error = %err, "shared module failed to compile");
                    summary.failed_modules.push(record.id.clone());
                }
            }
            summary.modules += 1;
            self.module_records.push(record);
        }

        tracing::info!(
            pages = summary.pages,
            modules = summary.modules,
            failed = summary.failed_modules.len(),
            "component registry loaded"
        );
        Ok(summary)
    }

    pub fn clear(&mut self) {
        self.pages.clear();
        self.index.clear();
        self.module_records.clear();
        self.modules.clear();
    }

    pub fn page(&self, id: &str) -> Option<&ComponentRecord> {
        self.index.get(id).map(|i| &self.pages[*i])
    }

    pub fn contains_page(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Pages in load order.
    pub fn pages(&self) -> &[ComponentRecord] {
        &self.pages
    }

    /// Shared-module records in load order, compiled or not.
    pub fn module_records(&self) -> &[ComponentRecord] {
        &self.module_records
    }

    pub fn modules(&self) -> &ModuleLookup {
        &self.modules
    }

    /// The first page flagged as the public default.
    pub fn default_page(&self) -> Option<&ComponentRecord> {
        self.pages.iter().find(|p| p.is_default)
    }

    /// Every record, pages and shared modules.
    pub fn len(&self) -> usize {
        self.pages.len() + self.module_records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn validate(rows: &[Row], config: &ShellConfig) -> Result<Vec<ComponentRecord>, RegistryError> {
    if rows.is_empty() {
        return Err(RegistryError::Empty {
            table: config.components_table.clone(),
        });
    }

    let mut seen = HashSet::new();
    rows.iter()
        .map(|row| {
            let record = ComponentRecord::from_row(row, &config.components)?;
            if !seen.insert(record.id.clone()) {
                return Err(RegistryError::DuplicateId(record.id));
            }
            Ok(record)
        })
        .collect()
}
