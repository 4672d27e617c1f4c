use serde_json::{Map, Value};

/// Optional lifecycle callbacks for an entity's records.
///
/// Most entities do not need this; storage handles everything from the
/// descriptor and schema alone. Implement it for:
/// - Input validation beyond what the record type enforces
/// - Stamping columns on every write (e.g. a compare-and-swap version)
/// - Post-load enrichment of records before they are returned
pub trait RecordHandler: Send + Sync {
    /// Validate a record before it is persisted.
    /// Return `Err(message)` to reject the write.
    fn validate(&self, record: &Value) -> Result<(), String> {
        let _ = record;
        Ok(())
    }

    /// Called with the fields about to be written: the full record on create
    /// and update, only the patched fields on patch.
    fn before_save(&self, fields: &mut Map<String, Value>) {
        let _ = fields;
    }

    /// Called after loading a record, before returning it to the caller.
    fn after_load(&self, record: &mut Value) {
        let _ = record;
    }
}
