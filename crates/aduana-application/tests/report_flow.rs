//! End-to-end flows over the in-memory context store: save → pick →
//! filter/classify, TTL boundaries and ambiguity resolution.

use aduana_application::{
    FuzzyFilterPlanner, ReportFollowUpEngine, ReportLifecycleManager, SalesFilter,
    SalesReportQueryEngine,
};
use aduana_core::plan::{PlanAction, PlanContext};
use aduana_core::report::{Lineage, Report, ReportDraft, ReportKind, TtlConfig};
use aduana_infrastructure::{MemoryContextStore, ReportStore};
use chrono::{Duration, Utc};
use serde_json::{Map, json};
use std::sync::Arc;

fn setup() -> (ReportStore, Arc<ReportLifecycleManager>) {
    let store = ReportStore::new(Arc::new(MemoryContextStore::new()));
    let lifecycle = Arc::new(ReportLifecycleManager::new(
        store.clone(),
        TtlConfig::default(),
    ));
    (store, lifecycle)
}

/// Plants a report with a controlled creation time, as the lifecycle
/// manager would have stored it that long ago.
async fn plant_report(
    store: &ReportStore,
    session: &str,
    id: &str,
    kind: ReportKind,
    ttl_min: i64,
    age_min: i64,
) -> Report {
    let report = Report {
        id: id.to_string(),
        kind,
        category: None,
        rendered_text: format!("report {id}"),
        payload: None,
        filters_applied: Map::new(),
        created_at: Utc::now() - Duration::minutes(age_min),
        ttl_min,
        lineage: None,
    };
    store.save_report(session, &report).await.unwrap();
    report
}

#[tokio::test]
async fn pick_honors_the_ttl_window() {
    let (store, lifecycle) = setup();

    // just inside the 120-minute window: still fresh
    plant_report(&store, "s1", "rpt-old", ReportKind::DayClosing, 120, 119).await;
    let outcome = lifecycle.pick("s1", "send the closing report").await.unwrap();
    assert_eq!(outcome.report.map(|r| r.id), Some("rpt-old".to_string()));

    // one minute past the boundary: stale, ask for regeneration
    let (store, lifecycle) = setup();
    plant_report(&store, "s1", "rpt-older", ReportKind::DayClosing, 120, 121).await;
    let outcome = lifecycle.pick("s1", "send the closing report").await.unwrap();
    assert!(outcome.needs_refresh);
    assert!(outcome.report.is_none());
}

#[tokio::test]
async fn explicit_kind_mention_never_falls_back_to_another_kind() {
    let (_, lifecycle) = setup();
    lifecycle
        .save(
            "s1",
            ReportDraft::new(ReportKind::DailyDashboard, "## Dashboard"),
        )
        .await
        .unwrap();

    // a fresh dashboard exists, but the user asked for the closing report
    let outcome = lifecycle.pick("s1", "send the closing report").await.unwrap();
    assert!(outcome.needs_refresh);
    assert!(!outcome.ambiguous);
}

#[tokio::test]
async fn two_fresh_reports_with_no_signal_are_ambiguous() {
    let (_, lifecycle) = setup();
    lifecycle
        .save("s1", ReportDraft::new(ReportKind::DayClosing, "## Closing"))
        .await
        .unwrap();
    lifecycle
        .save(
            "s1",
            ReportDraft::new(ReportKind::SalesByInvoice, "## Sales"),
        )
        .await
        .unwrap();

    // neutral wording: no kind, processes domain, no processes pointer
    let outcome = lifecycle.pick("s1", "send it again").await.unwrap();
    assert!(outcome.ambiguous);
    assert_eq!(outcome.candidates.len(), 2);
    assert!(outcome.report.is_none());

    // the consumer surfaces the candidates; resolving one works by id
    let chosen = &outcome.candidates[1];
    let resolved = lifecycle.find_by_id("s1", &chosen.id).await.unwrap();
    assert_eq!(resolved.id, chosen.id);
}

#[tokio::test]
async fn a_single_fresh_report_is_picked_directly() {
    let (_, lifecycle) = setup();
    let closing = lifecycle
        .save("s1", ReportDraft::new(ReportKind::DayClosing, "## Closing"))
        .await
        .unwrap();

    let outcome = lifecycle.pick("s1", "send it again").await.unwrap();
    assert!(!outcome.ambiguous);
    assert!(!outcome.needs_refresh);
    assert_eq!(outcome.report.map(|r| r.id), Some(closing.id));
}

#[tokio::test]
async fn no_reports_at_all_asks_for_regeneration() {
    let (_, lifecycle) = setup();
    let outcome = lifecycle.pick("s1", "send it again").await.unwrap();
    assert!(outcome.needs_refresh);
    assert!(outcome.candidates.is_empty());
}

#[tokio::test]
async fn planner_plus_filter_flow_tracks_lineage() {
    let (_, lifecycle) = setup();
    let engine = SalesReportQueryEngine::new(lifecycle.clone());

    let base = lifecycle
        .save(
            "s1",
            ReportDraft::new(ReportKind::SalesByInvoice, "## Sales").with_payload(json!({
                "sections": {
                    "invoices": [
                        {"invoice": "1", "client": "Acme", "operation": "SALE", "value": 100.0},
                        {"invoice": "2", "client": "Beta", "operation": "SALE", "value": 40.0},
                    ]
                }
            })),
        )
        .await
        .unwrap();

    // the heuristic tier translates the follow-up without any LLM
    let planner = FuzzyFilterPlanner::heuristic_only();
    let context = PlanContext::for_report(&base);
    let plan = planner
        .plan("group by channel please", &context)
        .await
        .unwrap();
    assert_eq!(plan.action, PlanAction::GroupByChannel);

    let criteria = SalesFilter {
        client_contains: Some("acme".into()),
        ..Default::default()
    };
    let derived = engine.filter("s1", &base, &criteria).await.unwrap();
    assert_eq!(
        derived.lineage,
        Some(Lineage {
            base_id: base.id.clone()
        })
    );

    // the derived report is last-visible, the base stays active
    let picked = lifecycle.pick("s1", "revenue please").await.unwrap();
    assert_eq!(picked.report.map(|r| r.id), Some(base.id));
}

#[tokio::test]
async fn free_text_follow_up_runs_through_pick_plan_and_apply() {
    let (_, lifecycle) = setup();
    let follow_up = ReportFollowUpEngine::new(lifecycle.clone());

    lifecycle
        .save(
            "s1",
            ReportDraft::new(ReportKind::DailyDashboard, "## Dashboard").with_payload(json!({
                "sections": {
                    "review_queue": [
                        {"processo": "DMD.0001/26", "channel": "green"},
                        {"processo": "DMD.0002/26", "channel": "red"},
                    ]
                }
            })),
        )
        .await
        .unwrap();

    // which report? the dashboard, via the explicit kind mention
    let outcome = lifecycle
        .pick("s1", "from today's dashboard, just the green ones")
        .await
        .unwrap();
    let base = outcome.report.expect("dashboard should be picked");

    // what does the user want? the heuristic tier resolves it
    let planner = FuzzyFilterPlanner::heuristic_only();
    let plan = planner
        .plan("just the green ones", &PlanContext::for_report(&base))
        .await
        .unwrap();
    assert_eq!(plan.action, PlanAction::FetchSection);

    // apply and persist with lineage
    let derived = follow_up.apply("s1", &base, &plan).await.unwrap();
    assert_eq!(derived.base_id(), Some(base.id.as_str()));
    let rows = derived.payload.as_ref().unwrap()["sections"]["review_queue"]
        .as_array()
        .unwrap()
        .clone();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["item_reference"], "DMD.0001/26");
}

#[tokio::test]
async fn identity_tag_survives_the_rendered_text_round_trip() {
    let (_, lifecycle) = setup();
    let saved = lifecycle
        .save(
            "s1",
            ReportDraft::new(ReportKind::LegislationLookup, "IN 680 summary …"),
        )
        .await
        .unwrap();

    // a consumer that only kept the rendered text can still resolve it
    let meta = aduana_core::report::parse_tag(&saved.rendered_text).unwrap();
    assert_eq!(meta.id, saved.id);
    let resolved = lifecycle.find_by_id("s1", &meta.id).await.unwrap();
    assert_eq!(resolved.id, saved.id);
}
