//! Tests for normalization, grouping and aggregation
//!
//! Fixtures mimic the exporter's CSV: several pods of the same workload
//! reporting the same interval, plus bare pods that must be dropped.

use super::*;
use crate::error::PipelineError;
use crate::models::columns;

const HEADER: &str = "namespace,pod,owner_kind,owner_name,workload,workload_type,node,container_name,image_name,interval_start,interval_end,cpu_usage_container_avg,cpu_usage_container_min,cpu_usage_container_max,cpu_usage_container_sum";

fn fixture() -> MetricTable {
    let csv = format!(
        "{HEADER}\n\
         prod,fe-1,ReplicaSet,fe-5d8f,frontend,deployment,n1,web,img:1,t0,t1,0.2,0.1,0.4,2\n\
         prod,fe-2,ReplicaSet,fe-7a2c,frontend,deployment,n2,web,img:1,t0,t1,0.4,0.05,0.9,4\n\
         prod,fe-3,ReplicaSet,fe-7a2c,frontend,deployment,n2,web,img:1,t1,t2,0.3,0.3,0.3,3\n\
         prod,job-1,ReplicaSet,batch-66,<none>,deployment,n1,worker,img:2,t0,t1,1.5,1,2,15\n\
         prod,bare,,,,,n3,web,img:1,t0,t1,9,9,9,9\n\
         dev,fe-1,ReplicaSet,fe-5d8f,frontend,deployment,n1,web,img:1,t0,t1,0.6,0.6,0.6,6\n"
    );
    read_csv_from(csv.as_bytes()).unwrap()
}

fn column(table: &MetricTable, row: usize, name: &str) -> String {
    table.row_view(row).unwrap().get(name).unwrap().to_string()
}

mod normalize_tests {
    use super::*;

    #[test]
    fn test_drops_rows_without_owner_or_workload() {
        let outcome = normalize(fixture()).unwrap();
        assert_eq!(outcome.dropped, 1);
        assert_eq!(outcome.table.len(), 5);
        assert!(outcome.table.iter().all(|r| r.get("pod").unwrap() != "bare"));
    }

    #[test]
    fn test_derives_object_type_and_name() {
        let table = normalize(fixture()).unwrap().table;

        assert_eq!(column(&table, 0, columns::K8_OBJECT_TYPE), "deployment");
        assert_eq!(column(&table, 0, columns::K8_OBJECT_NAME), "frontend");

        // row with <none> workload takes its identity from the owner
        assert_eq!(column(&table, 3, columns::K8_OBJECT_TYPE), "replicaset");
        assert_eq!(column(&table, 3, columns::K8_OBJECT_NAME), "batch-66");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize(fixture()).unwrap().table;
        let twice = normalize(once.clone()).unwrap();

        assert_eq!(twice.dropped, 0);
        assert_eq!(twice.table, once);
    }

    #[test]
    fn test_missing_owner_column_is_fatal() {
        let table = read_csv_from("namespace,workload,workload_type\nprod,fe,deployment\n".as_bytes())
            .unwrap();
        let err = normalize(table).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn(c) if c == "owner_kind"));
    }
}

mod aggregate_tests {
    use super::*;

    fn aggregated() -> (MetricTable, Vec<crate::models::AggregatedMetric>) {
        let table = normalize(fixture()).unwrap().table;
        let aggregated = aggregate(&table).unwrap();
        (table, aggregated)
    }

    fn value(table: &MetricTable, row: &crate::models::MetricRow, name: &str) -> f64 {
        row.cell(table.column_index(name).unwrap()).parse().unwrap()
    }

    #[test]
    fn test_reduction_by_suffix() {
        assert_eq!(Reduction::for_column("cpu_usage_container_avg"), Some(Reduction::Mean));
        assert_eq!(Reduction::for_column("memory_rss_usage_container_min"), Some(Reduction::Min));
        assert_eq!(Reduction::for_column("cpu_throttle_container_max"), Some(Reduction::Max));
        assert_eq!(Reduction::for_column("cpu_request_container_sum"), Some(Reduction::Sum));
        assert_eq!(Reduction::for_column("container_name"), None);
        assert_eq!(Reduction::Mean.apply(&[]), None);
    }

    #[test]
    fn test_groups_come_out_in_key_order() {
        let (_, aggregated) = aggregated();
        let keys: Vec<_> = aggregated
            .iter()
            .map(|a| {
                (
                    a.key.namespace.as_str(),
                    a.key.k8_object_name.as_str(),
                    a.key.interval_start.as_str(),
                )
            })
            .collect();
        assert_eq!(
            keys,
            vec![
                ("dev", "frontend", "t0"),
                ("prod", "frontend", "t0"),
                ("prod", "frontend", "t1"),
                ("prod", "batch-66", "t0"),
            ]
        );
    }

    #[test]
    fn test_reduces_each_statistic() {
        let (table, aggregated) = aggregated();
        let group = aggregated
            .iter()
            .find(|a| a.key.namespace == "prod" && a.key.interval_start == "t0" && a.key.k8_object_name == "frontend")
            .unwrap();

        assert!((value(&table, &group.row, "cpu_usage_container_avg") - 0.3).abs() < 1e-9);
        assert_eq!(value(&table, &group.row, "cpu_usage_container_min"), 0.05);
        assert_eq!(value(&table, &group.row, "cpu_usage_container_max"), 0.9);
        assert_eq!(value(&table, &group.row, "cpu_usage_container_sum"), 6.0);
    }

    #[test]
    fn test_every_row_lands_in_exactly_one_group() {
        let table = normalize(fixture()).unwrap().table;
        let groups = group_rows(&table).unwrap();

        let grouped: usize = groups.iter().map(|g| g.rows.len()).sum();
        assert_eq!(grouped, table.len());
        assert!(groups.iter().all(|g| !g.rows.is_empty()));
        assert_eq!(groups.len(), aggregate(&table).unwrap().len());
    }

    #[test]
    fn test_blank_samples_are_skipped() {
        let csv = "namespace,owner_kind,owner_name,workload,workload_type,container_name,interval_start,memory_limit_container_avg,memory_usage_container_max\n\
                   prod,ReplicaSet,a,fe,deployment,web,t0,,10\n\
                   prod,ReplicaSet,b,fe,deployment,web,t0,,30\n\
                   prod,ReplicaSet,c,fe,deployment,web,t0,,\n";
        let table = normalize(read_csv_from(csv.as_bytes()).unwrap()).unwrap().table;
        let aggregated = aggregate(&table).unwrap();

        assert_eq!(aggregated.len(), 1);
        let row = &aggregated[0].row;
        assert_eq!(row.cell(table.column_index("memory_limit_container_avg").unwrap()), "");
        assert_eq!(row.cell(table.column_index("memory_usage_container_max").unwrap()), "30");
    }

    #[test]
    fn test_garbage_metric_cell_is_fatal() {
        let csv = "namespace,owner_kind,owner_name,workload,workload_type,container_name,interval_start,cpu_usage_container_avg\n\
                   prod,ReplicaSet,a,fe,deployment,web,t0,lots\n";
        let table = normalize(read_csv_from(csv.as_bytes()).unwrap()).unwrap().table;
        let err = aggregate(&table).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidNumber { column, value }
                if column == "cpu_usage_container_avg" && value == "lots"
        ));
    }

    #[test]
    fn test_missing_group_column_is_fatal() {
        let csv = "namespace,owner_kind,owner_name,workload,workload_type,interval_start\n\
                   prod,ReplicaSet,a,fe,deployment,t0\n";
        let table = normalize(read_csv_from(csv.as_bytes()).unwrap()).unwrap().table;
        assert!(matches!(
            aggregate(&table),
            Err(PipelineError::MissingColumn(c)) if c == "container_name"
        ));
    }
}

mod file_tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_group_files_and_aggregate_csv() {
        let temp_dir = TempDir::new().unwrap();
        let table = normalize(fixture()).unwrap().table;
        let groups = group_rows(&table).unwrap();

        let paths = write_group_files(&temp_dir.path().join("output"), table.columns(), &groups).unwrap();
        assert_eq!(paths.len(), 4);
        assert!(paths[0].ends_with("file_1.csv"));

        let first = read_csv(&paths[0]).unwrap();
        assert_eq!(first.columns(), table.columns());
        assert_eq!(first.len(), groups[0].rows.len());

        let aggregated = aggregate(&table).unwrap();
        let final_table = aggregated_table(table.columns(), &aggregated).unwrap();
        let metrics = final_table.without_columns(columns::POD_IDENTITY);
        let metrics_path = temp_dir.path().join("metrics.csv");
        write_csv(&metrics_path, &metrics).unwrap();

        let reread = read_csv(&metrics_path).unwrap();
        assert_eq!(reread.len(), 4);
        assert!(reread.column_index("pod").is_none());
        assert!(reread.column_index("owner_name").is_none());
        assert!(reread.column_index("node").is_none());
        assert!(reread.column_index(columns::K8_OBJECT_NAME).is_some());
    }

    #[test]
    fn test_group_files_replace_previous_run() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("groups");
        std::fs::create_dir_all(&dir).unwrap();
        for name in ["file_1.csv", "file_7.csv", "notes.csv", "file_x.csv"] {
            std::fs::write(dir.join(name), "stale\n").unwrap();
        }

        let table = normalize(fixture()).unwrap().table;
        let groups = group_rows(&table).unwrap();
        let paths = write_group_files(&dir, table.columns(), &groups).unwrap();

        assert_eq!(paths.len(), groups.len());
        assert!(!dir.join("file_7.csv").exists());
        assert!(dir.join("notes.csv").exists());
        assert!(dir.join("file_x.csv").exists());
        assert_eq!(read_csv(&dir.join("file_1.csv")).unwrap().columns(), table.columns());
    }

    #[test]
    fn test_ragged_csv_is_rejected() {
        let result = read_csv_from("a,b\n1,2\n3\n".as_bytes());
        assert!(matches!(result, Err(PipelineError::Csv(_))));
    }
}
