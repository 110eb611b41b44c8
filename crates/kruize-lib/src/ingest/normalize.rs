//! Row filtering and workload identity derivation

use crate::error::Result;
use crate::models::{columns, MetricTable, NONE_PLACEHOLDER};
use tracing::{debug, warn};

/// Result of normalizing a raw export
#[derive(Debug, Clone)]
pub struct NormalizeOutcome {
    pub table: MetricTable,
    /// Rows dropped for lacking owner or workload fields
    pub dropped: usize,
}

/// Object type the service should see for a row.
///
/// Pods owned directly by a ReplicaSet or ReplicationController have no
/// workload name; the owner kind then stands in for the workload type.
pub fn derive_object_type<'a>(owner_kind: &str, workload: &str, workload_type: &'a str) -> &'a str {
    match (owner_kind, workload) {
        ("ReplicaSet", NONE_PLACEHOLDER) => "replicaset",
        ("ReplicationController", NONE_PLACEHOLDER) => "replicationcontroller",
        _ => workload_type,
    }
}

/// Object name for a row.
///
/// `owner_name` is only used when there is no workload name: a deployment
/// may have several replicasets, each with a different owner name.
pub fn derive_object_name<'a>(workload: &'a str, owner_name: &'a str) -> &'a str {
    if workload != NONE_PLACEHOLDER {
        workload
    } else {
        owner_name
    }
}

/// Drop ungroupable rows and annotate the rest with `k8_object_type` and
/// `k8_object_name`.
///
/// Running this on its own output leaves the derived columns unchanged.
pub fn normalize(mut table: MetricTable) -> Result<NormalizeOutcome> {
    let owner_kind = table.require_column(columns::OWNER_KIND)?;
    let owner_name = table.require_column(columns::OWNER_NAME)?;
    let workload = table.require_column(columns::WORKLOAD)?;
    let workload_type = table.require_column(columns::WORKLOAD_TYPE)?;

    let before = table.len();
    table.retain_rows(|row| {
        [owner_kind, owner_name, workload, workload_type]
            .iter()
            .all(|&i| !row.cell(i).trim().is_empty())
    });
    let dropped = before - table.len();

    let type_index = table.ensure_column(columns::K8_OBJECT_TYPE);
    let name_index = table.ensure_column(columns::K8_OBJECT_NAME);

    for row in table.rows_mut() {
        let object_type =
            derive_object_type(row.cell(owner_kind), row.cell(workload), row.cell(workload_type))
                .to_string();
        let object_name = derive_object_name(row.cell(workload), row.cell(owner_name)).to_string();
        row.set(type_index, object_type);
        row.set(name_index, object_name);
    }

    if dropped > 0 {
        warn!(dropped, kept = table.len(), "Dropped rows without owner or workload");
    } else {
        debug!(kept = table.len(), "All rows carry owner and workload");
    }

    Ok(NormalizeOutcome { table, dropped })
}
