use chrono::NaiveDate;
use leaseline::applications::{
    ApplicantId, Application, ApplicationFilter, ApplicationId, ApplicationRepository,
    PropertyDirectory, PropertyId, PropertySnapshot, RepositoryError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local record store. Conditional writes compare the stored version
/// against the version the caller read, so racing writers lose cleanly
/// instead of overwriting each other.
#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicationRepository {
    records: Arc<Mutex<HashMap<ApplicationId, Application>>>,
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert(&self, mut record: Application) -> Result<Application, RepositoryError> {
        let mut guard = self.records.lock().map_err(poisoned)?;
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Duplicate);
        }
        record.version = 1;
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn update(
        &self,
        mut record: Application,
        expected_version: u64,
    ) -> Result<Application, RepositoryError> {
        let mut guard = self.records.lock().map_err(poisoned)?;
        let stored = guard.get(&record.id).ok_or(RepositoryError::NotFound)?;
        if stored.version != expected_version {
            return Err(RepositoryError::VersionMismatch);
        }
        record.version = expected_version + 1;
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        let guard = self.records.lock().map_err(poisoned)?;
        Ok(guard.get(id).cloned())
    }

    fn find_open(
        &self,
        applicant_id: &ApplicantId,
        property_id: &PropertyId,
    ) -> Result<Option<Application>, RepositoryError> {
        let guard = self.records.lock().map_err(poisoned)?;
        Ok(guard
            .values()
            .filter(|record| {
                record.status.is_open()
                    && &record.applicant_id == applicant_id
                    && &record.property_id == property_id
            })
            .max_by_key(|record| record.updated_at)
            .cloned())
    }

    fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>, RepositoryError> {
        let guard = self.records.lock().map_err(poisoned)?;
        let mut records: Vec<Application> = guard
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(records)
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> RepositoryError {
    RepositoryError::Unavailable("repository mutex poisoned".to_string())
}

/// Static listing catalog for local runs and demos.
#[derive(Clone)]
pub(crate) struct InMemoryPropertyDirectory {
    listings: Arc<Vec<PropertySnapshot>>,
}

impl Default for InMemoryPropertyDirectory {
    fn default() -> Self {
        Self {
            listings: Arc::new(vec![
                PropertySnapshot {
                    id: PropertyId("prop-1".to_string()),
                    title: "Riverfront Lofts A-201".to_string(),
                    address: "201 Water St, Des Moines, IA".to_string(),
                    fee_cents: 4500,
                },
                PropertySnapshot {
                    id: PropertyId("prop-2".to_string()),
                    title: "Maple Court 3B".to_string(),
                    address: "88 Maple Ct, Des Moines, IA".to_string(),
                    fee_cents: 5000,
                },
            ]),
        }
    }
}

impl PropertyDirectory for InMemoryPropertyDirectory {
    fn property(&self, id: &PropertyId) -> Option<PropertySnapshot> {
        self.listings.iter().find(|snapshot| &snapshot.id == id).cloned()
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
