pub mod follow_up;
pub mod lifecycle;
pub mod planner;
pub mod sales_query;

pub use follow_up::ReportFollowUpEngine;
pub use lifecycle::ReportLifecycleManager;
pub use planner::{FuzzyFilterPlanner, HeuristicPlanStrategy, LlmPlanStrategy, PlanStrategy};
pub use sales_query::{AbcResult, SalesFilter, SalesReportQueryEngine, SalesSortKey};
