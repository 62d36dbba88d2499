use serde::Serialize;

/// Values that were present in the source but could not be coerced and were
/// replaced with null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnCoercion {
    pub column: String,
    pub coerced_to_null: usize,
}

/// What the facility normalizer degraded or discarded during one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub rows_in: usize,
    pub rows_dropped_missing_position: usize,
    pub duplicate_rows_removed: usize,
    pub rows_out: usize,
    pub missing_optional_columns: Vec<String>,
    pub state_defaulted: bool,
    pub coercions: Vec<ColumnCoercion>,
}

impl NormalizeReport {
    pub fn total_coerced(&self) -> usize {
        self.coercions.iter().map(|c| c.coerced_to_null).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitFailure {
    pub index: usize,
    pub huc: Option<String>,
    pub reason: String,
}

/// Per-unit outcome of area/centroid enrichment. Failed units keep null
/// derived values; the batch itself never fails on them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichmentReport {
    pub units: usize,
    pub enriched: usize,
    pub failures: Vec<UnitFailure>,
}
