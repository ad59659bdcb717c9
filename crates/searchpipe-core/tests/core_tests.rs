use std::error::Error as _;

use chrono::{TimeZone, Utc};
use serde_json::json;

use searchpipe_core::error::Error;
use searchpipe_core::pipeline::{ExecutionMode, PipelineDefinition, PipelineStatus, StageConfig, StageKind};
use searchpipe_core::types::{assign_dense_ranks, sort_by_score_desc, ExecutionResult, ResultItem, ResultSet};

#[test]
fn stage_kind_tags_and_search_classification() {
    for kind in StageKind::ALL {
        let parsed: StageKind = kind.as_str().parse().expect("round trip tag");
        assert_eq!(parsed, kind);
    }
    assert!(StageKind::KeywordSearch.is_search());
    assert!(StageKind::VectorSearch.is_search());
    assert!(StageKind::HybridSearch.is_search());
    assert!(!StageKind::Merge.is_search());
    assert!(!StageKind::Rerank.is_search());

    let err = "semantic_magic".parse::<StageKind>().unwrap_err();
    assert!(matches!(err, Error::UnknownStageType(ref t) if t == "semantic_magic"));
}

#[test]
fn definition_accepts_legacy_key_names() {
    let raw = json!({
        "algorithm_id": "legacy",
        "name": "Legacy",
        "components": [
            { "type": "keyword_search", "config": { "fields": ["title"] } },
            { "type": "merge", "config": {}, "enabled": false }
        ]
    });
    let def = PipelineDefinition::from_json(&raw.to_string()).expect("parse legacy");
    assert_eq!(def.id, "legacy");
    assert_eq!(def.version, "1.0", "version defaults");
    assert_eq!(def.stages.len(), 2);
    assert_eq!(def.stages[0].parameters["fields"], json!(["title"]));
    assert!(def.stages[0].enabled, "enabled defaults to true");
    assert!(!def.stages[1].enabled);
    assert_eq!(def.metadata.status, PipelineStatus::Draft);
}

#[test]
fn definition_serializes_with_canonical_keys() {
    let def = PipelineDefinition::new(
        "p1",
        "Pipeline one",
        vec![StageConfig::new(StageKind::Rerank, json!({ "weight": 2.0 })).named("boost")],
    );
    let value: serde_json::Value = serde_json::from_str(&def.to_json_pretty().expect("json")).expect("reparse");
    assert_eq!(value["id"], "p1");
    assert_eq!(value["stages"][0]["type"], "rerank");
    assert_eq!(value["stages"][0]["parameters"]["weight"], 2.0);
    assert_eq!(value["stages"][0]["name"], "boost");
    assert_eq!(value["metadata"]["status"], "draft");
}

#[test]
fn unknown_stage_tag_is_a_config_error() {
    let raw = json!({ "id": "x", "name": "x", "stages": [{ "type": "teleport" }] });
    let err = PipelineDefinition::from_json(&raw.to_string()).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)), "got {err:?}");
}

#[test]
fn enabled_stages_keep_declared_positions() {
    let def = PipelineDefinition::new(
        "p",
        "p",
        vec![
            StageConfig::new(StageKind::KeywordSearch, json!({})).disabled(),
            StageConfig::new(StageKind::VectorSearch, json!({ "field": "v" })),
            StageConfig::new(StageKind::Merge, json!({})),
        ],
    );
    let positions: Vec<usize> = def.enabled_stages().iter().map(|(p, _)| *p).collect();
    assert_eq!(positions, vec![1, 2]);
}

#[test]
fn non_object_parameters_become_empty() {
    let cfg = StageConfig::new(StageKind::Merge, json!("rrf"));
    assert!(cfg.parameters.is_empty());
}

#[test]
fn execution_mode_parsing() {
    assert_eq!("sequential".parse::<ExecutionMode>().expect("mode"), ExecutionMode::Sequential);
    assert_eq!("parallel".parse::<ExecutionMode>().expect("mode"), ExecutionMode::Phased);
    assert_eq!(ExecutionMode::default(), ExecutionMode::Phased);
    assert!("sideways".parse::<ExecutionMode>().is_err());
}

#[test]
fn dense_ranks_follow_score_order() {
    let mut items = vec![ResultItem::new("a", 1.0), ResultItem::new("b", 3.0), ResultItem::new("c", 3.0)];
    sort_by_score_desc(&mut items);
    assign_dense_ranks(&mut items);
    let order: Vec<(&str, Option<u32>)> = items.iter().map(|i| (i.id.as_str(), i.rank)).collect();
    // ties keep their relative order
    assert_eq!(order, vec![("b", Some(1)), ("c", Some(2)), ("a", Some(3))]);
}

#[test]
fn result_set_helpers() {
    let mut set = ResultSet::new(vec![ResultItem::new("x", 2.0), ResultItem::new("y", 1.0)]);
    assert_eq!(set.total_matched, 2);
    assert_eq!(set.ids(), vec!["x", "y"]);
    assert_eq!(set.stage_type(), "unknown");
    set.metadata.insert("stage_type".into(), json!("merge"));
    assert_eq!(set.stage_type(), "merge");
    assert!(set.get("y").is_some());
    assert!(set.get("z").is_none());
}

#[test]
fn execution_summary_reports_hits_and_timings() {
    let mut search = ResultSet::new(vec![ResultItem::new("a", 1.5).with_rank(1)]);
    search.elapsed_ms = Some(4.0);
    search.metadata.insert("stage_type".into(), json!("keyword_search"));
    let result = ExecutionResult {
        pipeline_id: "p".into(),
        query: "chair".into(),
        final_result: search.clone(),
        stage_results: vec![search],
        total_elapsed_ms: 5.0,
        metadata: serde_json::Map::new(),
    };
    let summary = result.summary();
    assert_eq!(summary["pipeline_id"], "p");
    assert_eq!(summary["hits"][0]["id"], "a");
    assert_eq!(summary["hits"][0]["rank"], 1);
    assert_eq!(summary["total"], 1);
    assert_eq!(summary["metadata"]["num_stages"], 1);
    assert_eq!(summary["metadata"]["stage_timings"][0]["stage_type"], "keyword_search");
    assert_eq!(summary["metadata"]["stage_timings"][0]["elapsed_ms"], 4.0);
}

#[test]
fn stage_wrapping_keeps_root_cause() {
    let err = Error::InvalidInput("no vector".into()).at_stage(3, StageKind::VectorSearch);
    assert_eq!(err.stage(), Some((3, StageKind::VectorSearch)));
    assert!(matches!(err.root(), Error::InvalidInput(_)));
    let msg = err.to_string();
    assert!(msg.contains("Stage 3 (vector_search)"), "{msg}");
    assert!(msg.contains("no vector"), "{msg}");
}

#[test]
fn definition_accepts_offset_less_timestamps() {
    let raw = r#"{
        "algorithm_id": "saved-by-api",
        "name": "Saved by the API",
        "components": [{ "type": "keyword_search", "config": {} }],
        "metadata": {
            "created_by": "ops",
            "created_at": "2024-01-15 10:30:00.123456",
            "updated_at": "2024-01-16T08:00:00",
            "status": "production"
        }
    }"#;
    let def = PipelineDefinition::from_json(raw).expect("parse saved definition");
    let created = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).single().expect("date")
        + chrono::Duration::microseconds(123_456);
    assert_eq!(def.metadata.created_at, created);
    assert_eq!(def.metadata.updated_at, Utc.with_ymd_and_hms(2024, 1, 16, 8, 0, 0).single().expect("date"));
    assert_eq!(def.metadata.status, PipelineStatus::Production);
}

#[test]
fn definition_timestamps_honour_offsets() {
    let raw = json!({
        "id": "p",
        "name": "p",
        "stages": [],
        "metadata": { "created_at": "2024-01-15T12:30:00+02:00", "updated_at": "2024-01-15 10:30:00+00:00" }
    });
    let def = PipelineDefinition::from_json(&raw.to_string()).expect("parse");
    let expected = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).single().expect("date");
    assert_eq!(def.metadata.created_at, expected);
    assert_eq!(def.metadata.updated_at, expected);

    let raw = json!({ "id": "p", "name": "p", "stages": [], "metadata": { "created_at": "last tuesday" } });
    let err = PipelineDefinition::from_json(&raw.to_string()).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(ref m) if m.contains("last tuesday")), "got {err:?}");
}

#[test]
fn wrapped_errors_render_their_cause_once() {
    let backend = Error::Backend(anyhow::anyhow!("shard failure").context("query products"));
    assert_eq!(backend.to_string(), "Backend failure: query products: shard failure");
    assert!(backend.source().is_none());

    let staged = backend.at_stage(0, StageKind::KeywordSearch);
    assert_eq!(staged.to_string(), "Stage 0 (keyword_search) failed: Backend failure: query products: shard failure");
    assert!(staged.source().is_none());
    assert_eq!(format!("{:#}", anyhow::Error::new(staged)).matches("shard failure").count(), 1);
}
