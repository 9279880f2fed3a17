//! Task plans, results, and dependency leveling.
//!
//! The planning model returns JSON that is parsed leniently: anything that
//! does not yield at least one subtask becomes a single-task fallback plan,
//! so a run never fails because of a malformed plan.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use super::message::TokenUsage;

/// Worker type used when a subtask names none.
pub const GENERAL_WORKER: &str = "general";

/// A single unit of planned work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    /// Identifier, unique within its plan.
    pub id: String,
    /// What this subtask accomplishes.
    #[serde(default)]
    pub description: String,
    /// Name of the worker profile to dispatch to.
    #[serde(default = "default_worker_type", deserialize_with = "null_as_general")]
    pub worker_type: String,
    /// Input handed to the worker.
    #[serde(default)]
    pub input: String,
}

fn default_worker_type() -> String {
    GENERAL_WORKER.to_string()
}

fn null_as_general<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let value = Option::<String>::deserialize(d)?;
    Ok(value
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(default_worker_type))
}

fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// Decomposition of a query into subtasks with dependency edges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPlan {
    /// The planner's analysis of the task.
    #[serde(default)]
    pub analysis: String,
    /// Subtasks in plan order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub subtasks: Vec<Subtask>,
    /// Subtask id → ids it depends on.
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, Vec<String>>,
}

impl TaskPlan {
    /// Single-subtask plan that runs `query` on the general worker.
    #[must_use]
    pub fn fallback(query: &str) -> Self {
        Self {
            analysis: "Direct execution".to_string(),
            subtasks: vec![Subtask {
                id: "task_1".to_string(),
                description: query.to_string(),
                worker_type: GENERAL_WORKER.to_string(),
                input: query.to_string(),
            }],
            dependencies: BTreeMap::new(),
        }
    }

    /// Dependencies of `id` (empty if none).
    #[must_use]
    pub fn dependencies_of(&self, id: &str) -> &[String] {
        self.dependencies
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Drops duplicate subtask ids (first wins) and dependency references
    /// to ids that name no subtask.
    fn normalize(&mut self) {
        let mut seen = BTreeSet::new();
        self.subtasks.retain(|t| seen.insert(t.id.clone()));

        self.dependencies.retain(|id, _| seen.contains(id));
        for deps in self.dependencies.values_mut() {
            let mut unique = BTreeSet::new();
            deps.retain(|d| seen.contains(d) && unique.insert(d.clone()));
        }
        self.dependencies.retain(|_, deps| !deps.is_empty());
    }
}

/// Outcome of one subtask execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubtaskResult {
    /// Subtask id.
    pub id: String,
    /// Whether the worker produced an answer.
    pub success: bool,
    /// Worker output (empty on failure).
    pub output: String,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock execution time.
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl SubtaskResult {
    /// Successful result.
    #[must_use]
    pub fn succeeded(id: impl Into<String>, output: impl Into<String>, duration: Duration) -> Self {
        Self {
            id: id.into(),
            success: true,
            output: output.into(),
            error: None,
            duration,
        }
    }

    /// Failed result.
    #[must_use]
    pub fn failed(id: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            id: id.into(),
            success: false,
            output: String::new(),
            error: Some(error.into()),
            duration,
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Kind of a reasoning step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Plan creation; content is the plan analysis.
    Planning,
    /// A subtask that succeeded.
    Observation,
    /// A subtask that failed.
    Error,
    /// Final synthesis; content is the answer.
    Synthesis,
}

/// One entry of the run's step trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    /// Step kind.
    #[serde(rename = "type")]
    pub kind: StepKind,
    /// Step text (analysis, error message, or answer).
    #[serde(skip_serializing_if = "String::is_empty")]
    pub content: String,
    /// Subtask id for observation and error steps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Subtask output for observation and error steps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_output: Option<String>,
}

impl Step {
    /// Planning or synthesis step.
    #[must_use]
    pub fn text(kind: StepKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            tool_name: None,
            tool_output: None,
        }
    }

    /// Observation or error step for a subtask result.
    #[must_use]
    pub fn for_result(result: &SubtaskResult) -> Self {
        Self {
            kind: if result.success {
                StepKind::Observation
            } else {
                StepKind::Error
            },
            content: result.error.clone().unwrap_or_default(),
            tool_name: Some(result.id.clone()),
            tool_output: Some(result.output.clone()),
        }
    }
}

/// Result of a full orchestration run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResponse {
    /// Synthesized answer.
    pub output: String,
    /// Planning, per-subtask, and synthesis steps.
    pub steps: Vec<Step>,
    /// Token usage across every call of the run.
    pub usage: TokenUsage,
    /// Subtask results in plan order.
    pub results: Vec<SubtaskResult>,
    /// Subtask ids per execution level.
    pub levels: Vec<Vec<String>>,
    /// The plan that was executed.
    pub plan: TaskPlan,
    /// Whether the plan is the single-task fallback.
    pub plan_fallback: bool,
    /// Total wall-clock time.
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

/// Outcome of parsing a planning response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedPlan {
    /// The response contained a usable plan.
    Parsed(TaskPlan),
    /// The response was unusable; a single-task plan was substituted.
    Fallback {
        /// Substituted plan.
        plan: TaskPlan,
        /// Why parsing failed.
        reason: String,
    },
}

impl ParsedPlan {
    /// The plan to execute.
    #[must_use]
    pub const fn plan(&self) -> &TaskPlan {
        match self {
            Self::Parsed(plan) | Self::Fallback { plan, .. } => plan,
        }
    }

    /// Consumes self, returning the plan and whether it is a fallback.
    #[must_use]
    pub fn into_parts(self) -> (TaskPlan, bool) {
        match self {
            Self::Parsed(plan) => (plan, false),
            Self::Fallback { plan, .. } => (plan, true),
        }
    }

    /// Returns `true` for the fallback variant.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Extracts the JSON payload from a model response.
///
/// Looks for a fenced code block first, then the outermost `{...}` span.
#[must_use]
pub fn extract_json(content: &str) -> &str {
    for fence in ["```json", "```"] {
        if let Some(start) = content.find(fence) {
            let rest = &content[start + fence.len()..];
            if let Some(end) = rest.find("```") {
                return rest[..end].trim();
            }
        }
    }
    match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if end > start => &content[start..=end],
        _ => content.trim(),
    }
}

/// Parses a planning response, substituting [`TaskPlan::fallback`] when the
/// response has no usable plan.
#[must_use]
pub fn parse_plan(content: &str, query: &str) -> ParsedPlan {
    match serde_json::from_str::<TaskPlan>(extract_json(content)) {
        Ok(mut plan) => {
            plan.normalize();
            if plan.subtasks.is_empty() {
                ParsedPlan::Fallback {
                    plan: TaskPlan::fallback(query),
                    reason: "plan contained no subtasks".to_string(),
                }
            } else {
                ParsedPlan::Parsed(plan)
            }
        }
        Err(e) => ParsedPlan::Fallback {
            plan: TaskPlan::fallback(query),
            reason: format!("invalid plan JSON: {e}"),
        },
    }
}

/// Groups subtasks into execution levels.
///
/// A subtask joins the first level after all of its dependencies. Ids that
/// name no subtask are ignored. When no remaining subtask is ready (a
/// cycle), every remaining subtask is flushed into one final level. Order
/// within a level follows plan order.
#[must_use]
pub fn group_by_level(plan: &TaskPlan) -> Vec<Vec<Subtask>> {
    if plan.subtasks.is_empty() {
        return Vec::new();
    }

    let known: BTreeSet<&str> = plan.subtasks.iter().map(|t| t.id.as_str()).collect();
    let mut leveled: BTreeSet<&str> = BTreeSet::new();
    let mut levels = Vec::new();

    while leveled.len() < known.len() {
        let mut current: Vec<&Subtask> = plan
            .subtasks
            .iter()
            .filter(|t| !leveled.contains(t.id.as_str()))
            .filter(|t| {
                plan.dependencies_of(&t.id)
                    .iter()
                    .filter(|d| known.contains(d.as_str()))
                    .all(|d| leveled.contains(d.as_str()))
            })
            .collect();

        if current.is_empty() {
            current = plan
                .subtasks
                .iter()
                .filter(|t| !leveled.contains(t.id.as_str()))
                .collect();
        }

        // Duplicate ids in an unnormalized plan share one level slot.
        let mut level = Vec::with_capacity(current.len());
        for task in current {
            if leveled.insert(task.id.as_str()) {
                level.push(task.clone());
            }
        }
        levels.push(level);
    }

    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn task(id: &str) -> Subtask {
        Subtask {
            id: id.to_string(),
            description: String::new(),
            worker_type: GENERAL_WORKER.to_string(),
            input: format!("input {id}"),
        }
    }

    fn plan(ids: &[&str], deps: &[(&str, &[&str])]) -> TaskPlan {
        TaskPlan {
            analysis: String::new(),
            subtasks: ids.iter().map(|id| task(id)).collect(),
            dependencies: deps
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.iter().map(|s| (*s).to_string()).collect()))
                .collect(),
        }
    }

    fn ids(levels: &[Vec<Subtask>]) -> Vec<Vec<&str>> {
        levels
            .iter()
            .map(|l| l.iter().map(|t| t.id.as_str()).collect())
            .collect()
    }

    #[test]
    fn test_no_dependencies_single_level() {
        let p = plan(&["a", "b", "c"], &[]);
        assert_eq!(ids(&group_by_level(&p)), vec![vec!["a", "b", "c"]]);
    }

    #[test]
    fn test_chain() {
        let p = plan(&["task_1", "task_2"], &[("task_2", &["task_1"])]);
        assert_eq!(ids(&group_by_level(&p)), vec![vec!["task_1"], vec!["task_2"]]);
    }

    #[test]
    fn test_diamond() {
        let p = plan(
            &["a", "b", "c", "d"],
            &[("b", &["a"]), ("c", &["a"]), ("d", &["b", "c"])],
        );
        assert_eq!(ids(&group_by_level(&p)), vec![vec!["a"], vec!["b", "c"], vec!["d"]]);
    }

    #[test]
    fn test_unknown_dependency_ignored() {
        let p = plan(&["a", "b"], &[("b", &["ghost"])]);
        assert_eq!(ids(&group_by_level(&p)), vec![vec!["a", "b"]]);
    }

    #[test]
    fn test_cycle_flushes_remaining() {
        let p = plan(&["a", "b", "c"], &[("b", &["c"]), ("c", &["b"])]);
        assert_eq!(ids(&group_by_level(&p)), vec![vec!["a"], vec!["b", "c"]]);
    }

    #[test]
    fn test_empty_plan() {
        assert!(group_by_level(&TaskPlan::default()).is_empty());
    }

    #[test]
    fn test_parse_plan_valid_fenced() {
        let content = "Here you go:\n```json\n{\"analysis\":\"two steps\",\"subtasks\":[\
            {\"id\":\"task_1\",\"description\":\"d\",\"worker_type\":\"calculator\",\"input\":\"2+3\"},\
            {\"id\":\"task_2\",\"description\":\"d\",\"input\":\"explain\"}],\
            \"dependencies\":{\"task_2\":[\"task_1\"]}}\n```";
        let parsed = parse_plan(content, "q");
        assert!(!parsed.is_fallback());
        let p = parsed.plan();
        assert_eq!(p.analysis, "two steps");
        assert_eq!(p.subtasks[0].worker_type, "calculator");
        assert_eq!(p.subtasks[1].worker_type, GENERAL_WORKER);
        assert_eq!(p.dependencies_of("task_2"), ["task_1".to_string()]);
    }

    #[test]
    fn test_parse_plan_raw_json_with_prose() {
        let content = r#"Plan: {"analysis":"a","subtasks":[{"id":"x","input":"i"}],"dependencies":null} done"#;
        let parsed = parse_plan(content, "q");
        assert!(!parsed.is_fallback());
        assert!(parsed.plan().dependencies.is_empty());
    }

    #[test]
    fn test_parse_plan_garbage_falls_back() {
        let parsed = parse_plan("I cannot do that", "what is 2+2");
        assert!(parsed.is_fallback());
        let (p, fallback) = parsed.into_parts();
        assert!(fallback);
        assert_eq!(p.analysis, "Direct execution");
        assert_eq!(p.subtasks.len(), 1);
        assert_eq!(p.subtasks[0].id, "task_1");
        assert_eq!(p.subtasks[0].input, "what is 2+2");
        assert_eq!(p.subtasks[0].worker_type, GENERAL_WORKER);
    }

    #[test]
    fn test_parse_plan_empty_subtasks_falls_back() {
        let parsed = parse_plan(r#"{"analysis":"nothing","subtasks":[]}"#, "q");
        assert!(matches!(parsed, ParsedPlan::Fallback { ref reason, .. } if reason.contains("no subtasks")));
    }

    #[test]
    fn test_parse_plan_dedupes_and_prunes() {
        let content = r#"{"subtasks":[{"id":"a","input":"1"},{"id":"a","input":"2"},{"id":"b"}],
            "dependencies":{"b":["a","a","ghost"],"ghost":["a"]}}"#;
        let p = parse_plan(content, "q").into_parts().0;
        assert_eq!(p.subtasks.len(), 2);
        assert_eq!(p.subtasks[0].input, "1");
        assert_eq!(p.dependencies.len(), 1);
        assert_eq!(p.dependencies_of("b"), ["a".to_string()]);
    }

    #[test]
    fn test_step_for_result() {
        let ok = SubtaskResult::succeeded("t", "out", Duration::ZERO);
        let step = Step::for_result(&ok);
        assert_eq!(step.kind, StepKind::Observation);
        assert_eq!(step.tool_name.as_deref(), Some("t"));

        let bad = SubtaskResult::failed("t", "boom", Duration::ZERO);
        let step = Step::for_result(&bad);
        assert_eq!(step.kind, StepKind::Error);
        assert_eq!(step.content, "boom");
    }

    #[test]
    fn test_result_serialization() {
        let r = SubtaskResult::succeeded("t", "out", Duration::from_millis(1500));
        let json = serde_json::to_value(&r).unwrap_or_default();
        assert_eq!(json["duration_ms"], 1500);
        assert!(json.get("error").is_none());
    }

    fn arbitrary_plan(acyclic: bool) -> impl Strategy<Value = TaskPlan> {
        prop::collection::vec(prop::collection::vec(any::<prop::sample::Index>(), 0..4), 1..12)
            .prop_map(move |edges| {
                let n = edges.len();
                let subtasks: Vec<Subtask> = (0..n).map(|i| task(&format!("t{i}"))).collect();
                let mut dependencies = BTreeMap::new();
                for (i, targets) in edges.iter().enumerate() {
                    let deps: Vec<String> = targets
                        .iter()
                        .filter_map(|idx| {
                            if acyclic {
                                (i > 0).then(|| format!("t{}", idx.index(i)))
                            } else {
                                Some(format!("t{}", idx.index(n)))
                            }
                        })
                        .collect();
                    if !deps.is_empty() {
                        dependencies.insert(format!("t{i}"), deps);
                    }
                }
                TaskPlan {
                    analysis: String::new(),
                    subtasks,
                    dependencies,
                }
            })
    }

    fn level_index(levels: &[Vec<Subtask>]) -> BTreeMap<String, usize> {
        let mut index = BTreeMap::new();
        for (lvl, tasks) in levels.iter().enumerate() {
            for t in tasks {
                index.insert(t.id.clone(), lvl);
            }
        }
        index
    }

    proptest! {
        #[test]
        fn prop_dag_levels_respect_edges(p in arbitrary_plan(true)) {
            let levels = group_by_level(&p);
            let total: usize = levels.iter().map(Vec::len).sum();
            prop_assert_eq!(total, p.subtasks.len());

            let index = level_index(&levels);
            prop_assert_eq!(index.len(), p.subtasks.len());
            for (task, deps) in &p.dependencies {
                for dep in deps {
                    prop_assert!(index[task] > index[dep]);
                }
            }
        }

        #[test]
        fn prop_cyclic_plans_terminate_without_drops(p in arbitrary_plan(false)) {
            let levels = group_by_level(&p);
            let total: usize = levels.iter().map(Vec::len).sum();
            prop_assert_eq!(total, p.subtasks.len());
            prop_assert_eq!(level_index(&levels).len(), p.subtasks.len());
            prop_assert!(levels.iter().all(|l| !l.is_empty()));
        }
    }
}
