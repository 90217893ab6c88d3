use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::models::ProjectRecord;

/// Where project rows come from. Parsing of the upstream format (the
/// spreadsheet export) happens behind this trait.
#[async_trait]
pub trait ProjectSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<ProjectRecord>>;
}

/// A fixed list of records, replaceable between fetches.
#[derive(Debug, Default)]
pub struct StaticProjectSource {
    records: Mutex<Vec<ProjectRecord>>,
}

impl StaticProjectSource {
    pub fn new(records: Vec<ProjectRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    /// Swap in the rows the next fetch returns.
    pub fn replace(&self, records: Vec<ProjectRecord>) -> Result<()> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| anyhow::anyhow!("Project source lock poisoned: {}", e))?;
        *guard = records;
        Ok(())
    }
}

#[async_trait]
impl ProjectSource for StaticProjectSource {
    async fn fetch(&self) -> Result<Vec<ProjectRecord>> {
        let guard = self
            .records
            .lock()
            .map_err(|e| anyhow::anyhow!("Project source lock poisoned: {}", e))?;
        Ok(guard.clone())
    }
}
