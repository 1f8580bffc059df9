use crate::services::record_features::RecordFeatures;
use crate::value_objects::data_set_record::DataSetRecord;
use std::path::Path;

pub trait DataSetExporter {
    /// Writes `rows` to `path`, replacing any existing file. Returns the number of rows written.
    fn write_records(
        &self,
        path: &Path,
        rows: &[(DataSetRecord, RecordFeatures)],
    ) -> Result<usize, String>;
}
