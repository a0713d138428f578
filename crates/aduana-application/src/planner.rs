//! Natural-language instruction → structured plan.
//!
//! The planner is an explicit strategy chain: two LLM tiers over different
//! client paths, then the local keyword heuristic. Tiers are tried in
//! order and the first success wins; tier failures (network, unparseable
//! output) are absorbed and logged, surfacing only when the terminal
//! heuristic fails too.

use aduana_core::error::{AduanaError, Result};
use aduana_core::plan::{FilterPlan, PlanContext, heuristic_plan, parse_plan_response};
use aduana_infrastructure::PlannerConfig;
use aduana_interaction::{CompletionAgent, GeminiApiAgent, OpenAiApiAgent};
use async_trait::async_trait;
use tracing::debug;

const PLANNER_SYSTEM_PROMPT: &str = "\
You translate follow-up requests about a cached customs-brokerage report \
into one JSON object and nothing else. The object has an \"action\" field \
with exactly one of: \"filter_by_category\", \"fetch_section\", \
\"group_by_channel\". Optional fields: \"category\", \"section\", \
\"channel\", \"pendency_type\", \"change_type\" (DELAY or EARLY), \
\"min_days\". No markdown, no prose.";

/// One tier of the planner chain.
#[async_trait]
pub trait PlanStrategy: Send + Sync {
    /// Short name used in fallback logging.
    fn name(&self) -> &str;

    /// Produces a plan, or an error that sends the chain to the next tier.
    async fn plan(&self, instruction: &str, context: &PlanContext) -> Result<FilterPlan>;
}

/// LLM-backed tier: one constrained completion, defensively parsed.
pub struct LlmPlanStrategy<A: CompletionAgent> {
    agent: A,
}

impl<A: CompletionAgent> LlmPlanStrategy<A> {
    pub fn new(agent: A) -> Self {
        Self { agent }
    }

    fn user_prompt(instruction: &str, context: &PlanContext) -> String {
        let sections = if context.sections.is_empty() {
            "(unknown)".to_string()
        } else {
            context.sections.join(", ")
        };
        format!(
            "Report kind: {}\nSections: {}\nDefault category: {}\n\nInstruction: {}",
            context.kind,
            sections,
            context.default_category.as_deref().unwrap_or("(none)"),
            instruction,
        )
    }
}

#[async_trait]
impl<A: CompletionAgent> PlanStrategy for LlmPlanStrategy<A> {
    fn name(&self) -> &str {
        self.agent.name()
    }

    async fn plan(&self, instruction: &str, context: &PlanContext) -> Result<FilterPlan> {
        let user = Self::user_prompt(instruction, context);
        let raw = self
            .agent
            .complete(PLANNER_SYSTEM_PROMPT, &user)
            .await
            .map_err(|e| AduanaError::planner_parse(format!("{} call failed: {e}", self.name())))?;
        parse_plan_response(&raw)
    }
}

/// Terminal tier: the pure keyword heuristic.
pub struct HeuristicPlanStrategy;

#[async_trait]
impl PlanStrategy for HeuristicPlanStrategy {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn plan(&self, instruction: &str, context: &PlanContext) -> Result<FilterPlan> {
        heuristic_plan(instruction, context)
    }
}

/// Tiered free-text planner.
pub struct FuzzyFilterPlanner {
    strategies: Vec<Box<dyn PlanStrategy>>,
}

impl FuzzyFilterPlanner {
    pub fn new(strategies: Vec<Box<dyn PlanStrategy>>) -> Self {
        Self { strategies }
    }

    /// Chain with only the local heuristic: no network, fully
    /// deterministic. The default for tests and offline deployments.
    pub fn heuristic_only() -> Self {
        Self::new(vec![Box::new(HeuristicPlanStrategy)])
    }

    /// Builds the full chain from the environment: whichever LLM agents
    /// are configured, in order, then the heuristic.
    pub fn from_env(config: &PlannerConfig) -> Self {
        let mut strategies: Vec<Box<dyn PlanStrategy>> = Vec::new();
        match OpenAiApiAgent::try_from_env() {
            Ok(agent) => {
                let agent = match &config.openai_model {
                    Some(model) => agent.with_model(model.clone()),
                    None => agent,
                };
                strategies.push(Box::new(LlmPlanStrategy::new(agent)));
            }
            Err(e) => debug!(error = %e, "openai planner tier not configured"),
        }
        match GeminiApiAgent::try_from_env() {
            Ok(agent) => {
                let agent = match &config.gemini_model {
                    Some(model) => agent.with_model(model.clone()),
                    None => agent,
                };
                strategies.push(Box::new(LlmPlanStrategy::new(agent)));
            }
            Err(e) => debug!(error = %e, "gemini planner tier not configured"),
        }
        strategies.push(Box::new(HeuristicPlanStrategy));
        Self::new(strategies)
    }

    /// Runs the chain; the first tier returning a plan wins.
    pub async fn plan(&self, instruction: &str, context: &PlanContext) -> Result<FilterPlan> {
        let mut last_error = AduanaError::planner_parse("no planner strategies configured");
        for strategy in &self.strategies {
            match strategy.plan(instruction, context).await {
                Ok(plan) => {
                    debug!(strategy = strategy.name(), "planner tier produced a plan");
                    return Ok(plan);
                }
                Err(e) => {
                    debug!(
                        strategy = strategy.name(),
                        error = %e,
                        "planner tier failed, falling through"
                    );
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aduana_core::plan::PlanAction;
    use aduana_core::report::ReportKind;
    use aduana_interaction::AgentError;

    fn context() -> PlanContext {
        PlanContext {
            kind: ReportKind::DailyDashboard,
            sections: vec!["review_queue".into(), "pendencies".into()],
            default_category: None,
        }
    }

    /// Canned agent: either answers with fixed text or fails.
    struct CannedAgent {
        name: &'static str,
        response: Option<&'static str>,
    }

    #[async_trait]
    impl CompletionAgent for CannedAgent {
        fn name(&self) -> &str {
            self.name
        }

        async fn complete(
            &self,
            _system: &str,
            _user: &str,
        ) -> std::result::Result<String, AgentError> {
            match self.response {
                Some(text) => Ok(text.to_string()),
                None => Err(AgentError::ExecutionFailed("canned failure".into())),
            }
        }
    }

    #[tokio::test]
    async fn test_first_successful_tier_wins() {
        let planner = FuzzyFilterPlanner::new(vec![
            Box::new(LlmPlanStrategy::new(CannedAgent {
                name: "primary",
                response: Some(r#"{"action": "group_by_channel"}"#),
            })),
            Box::new(HeuristicPlanStrategy),
        ]);
        // the instruction alone would heuristically resolve to a category
        // filter; the LLM tier answers first
        let plan = planner.plan("only the DMD ones", &context()).await.unwrap();
        assert_eq!(plan.action, PlanAction::GroupByChannel);
    }

    #[tokio::test]
    async fn test_unparseable_tier_falls_through() {
        let planner = FuzzyFilterPlanner::new(vec![
            Box::new(LlmPlanStrategy::new(CannedAgent {
                name: "primary",
                response: Some("I'd rather write prose than JSON."),
            })),
            Box::new(LlmPlanStrategy::new(CannedAgent {
                name: "secondary",
                response: None,
            })),
            Box::new(HeuristicPlanStrategy),
        ]);
        let plan = planner
            .plan("just the green channel ones", &context())
            .await
            .unwrap();
        assert_eq!(plan.action, PlanAction::FetchSection);
        assert_eq!(plan.channel.as_deref(), Some("green"));
    }

    #[tokio::test]
    async fn test_total_failure_surfaces_planner_parse() {
        let planner = FuzzyFilterPlanner::heuristic_only();
        let err = planner
            .plan("write me a haiku", &context())
            .await
            .unwrap_err();
        assert!(err.is_planner_parse());
    }

    #[tokio::test]
    async fn test_fenced_llm_output_is_parsed() {
        let planner = FuzzyFilterPlanner::new(vec![Box::new(LlmPlanStrategy::new(
            CannedAgent {
                name: "primary",
                response: Some(
                    "```json\n{\"action\": \"fetch_section\", \"section\": \"pendencies\"}\n```",
                ),
            },
        ))]);
        let plan = planner.plan("pendencies please", &context()).await.unwrap();
        assert_eq!(plan.action, PlanAction::FetchSection);
        assert_eq!(plan.section.as_deref(), Some("pendencies"));
    }
}
