//! The fixed story workflow graph
//!
//! ```text
//!                input_moderator
//!               /               \
//!   mark_auto_rejected      story_writer
//!                          /            \
//!              image_prompter        video_prompter
//!                │ (fan-out)            │ (fan-out)
//!      generate_single_image[*]  generate_single_video[*]
//!                └──────────┬───────────┘
//!                       assembler (fan-in)
//!                │ (fan-out over evaluation cluster)
//!   story_evaluator  story_guardrail  image_guardrail[*]  video_guardrail[*]
//!                └──────────┬───────────┘
//!                 guardrail_aggregator (fan-in)
//!               /                      \
//!   mark_auto_rejected         human_review_gate (suspends)
//!                              /                \
//!                         publisher         mark_rejected
//! ```
//!
//! Topology is static per engine version; all runtime variation flows
//! through the routers, which only read state.

use crate::config::PipelineConfig;
use crate::nodes::{self, *};
use crate::providers::Providers;
use crate::state::{self, story_schema};
use serde_json::{json, Value};
use std::sync::Arc;
use storyloom_core::dispatch::{DispatchUnit, RouteOutcome};
use storyloom_core::node::END;
use storyloom_core::WorkflowGraph;

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Fan a prompt list out over a generator node, or route straight to the
/// join when there is nothing to dispatch
fn media_fan_out(state: &Value, prompts_field: &str, target: &'static str) -> RouteOutcome {
    let prompts = string_list(&state[prompts_field]);
    if prompts.is_empty() {
        return RouteOutcome::Next(ASSEMBLER.to_string());
    }
    RouteOutcome::Dispatch(
        prompts
            .iter()
            .enumerate()
            .map(|(i, prompt)| {
                DispatchUnit::new(target, json!({"_index": i, "_prompt": prompt}))
            })
            .collect(),
    )
}

/// Build the complete story workflow over the injected providers and config
pub fn build_story_graph(providers: Arc<Providers>, config: Arc<PipelineConfig>) -> WorkflowGraph {
    let mut graph = WorkflowGraph::new(story_schema());

    for constructor in [
        nodes::input_moderator,
        nodes::story_writer,
        nodes::image_prompter,
        nodes::video_prompter,
        nodes::generate_single_image,
        nodes::generate_single_video,
        nodes::assembler,
        nodes::story_evaluator,
        nodes::story_guardrail,
        nodes::image_guardrail,
        nodes::video_guardrail,
        nodes::guardrail_aggregator,
        nodes::human_review_gate,
        nodes::publisher,
        nodes::mark_rejected,
        nodes::mark_auto_rejected,
    ] {
        graph.add_node(constructor(providers.clone(), config.clone()));
    }

    graph.set_entry(INPUT_MODERATOR);

    // A flagged prompt short-circuits to auto-rejection.
    graph.add_conditional_edge(
        INPUT_MODERATOR,
        Arc::new(|state| {
            if state[state::INPUT_FLAGGED].as_bool().unwrap_or(false) {
                RouteOutcome::Next(MARK_AUTO_REJECTED.to_string())
            } else {
                RouteOutcome::Next(STORY_WRITER.to_string())
            }
        }),
        vec![MARK_AUTO_REJECTED.to_string(), STORY_WRITER.to_string()],
    );

    // Both prompters run concurrently off the finished story.
    graph.add_conditional_edge(
        STORY_WRITER,
        Arc::new(|_| {
            RouteOutcome::Parallel(vec![
                IMAGE_PROMPTER.to_string(),
                VIDEO_PROMPTER.to_string(),
            ])
        }),
        vec![IMAGE_PROMPTER.to_string(), VIDEO_PROMPTER.to_string()],
    );

    graph.add_conditional_edge(
        IMAGE_PROMPTER,
        Arc::new(|state| media_fan_out(state, state::IMAGE_PROMPTS, GENERATE_SINGLE_IMAGE)),
        vec![GENERATE_SINGLE_IMAGE.to_string(), ASSEMBLER.to_string()],
    );
    graph.add_conditional_edge(
        VIDEO_PROMPTER,
        Arc::new(|state| media_fan_out(state, state::VIDEO_PROMPTS, GENERATE_SINGLE_VIDEO)),
        vec![GENERATE_SINGLE_VIDEO.to_string(), ASSEMBLER.to_string()],
    );

    graph.add_edge(GENERATE_SINGLE_IMAGE, ASSEMBLER);
    graph.add_edge(GENERATE_SINGLE_VIDEO, ASSEMBLER);

    // The assembler fans out over the whole evaluation cluster: the story
    // evaluator and guardrail once each, one guardrail unit per artifact.
    graph.add_conditional_edge(
        ASSEMBLER,
        Arc::new(|state| {
            let mut units = vec![
                DispatchUnit::new(STORY_EVALUATOR, json!({})),
                DispatchUnit::new(STORY_GUARDRAIL, json!({})),
            ];

            let image_prompts = string_list(&state[state::IMAGE_PROMPTS]);
            let image_urls = string_list(&state[state::IMAGE_URLS]);
            for (i, (prompt, url)) in image_prompts.iter().zip(image_urls.iter()).enumerate() {
                units.push(DispatchUnit::new(
                    IMAGE_GUARDRAIL,
                    json!({"_index": i, "_prompt": prompt, "_url": url}),
                ));
            }

            let video_prompts = string_list(&state[state::VIDEO_PROMPTS]);
            let video_urls = string_list(&state[state::VIDEO_URLS]);
            for (i, (prompt, url)) in video_prompts.iter().zip(video_urls.iter()).enumerate() {
                units.push(DispatchUnit::new(
                    VIDEO_GUARDRAIL,
                    json!({"_index": i, "_prompt": prompt, "_url": url}),
                ));
            }

            RouteOutcome::Dispatch(units)
        }),
        vec![
            STORY_EVALUATOR.to_string(),
            STORY_GUARDRAIL.to_string(),
            IMAGE_GUARDRAIL.to_string(),
            VIDEO_GUARDRAIL.to_string(),
        ],
    );

    graph.add_edge(STORY_EVALUATOR, GUARDRAIL_AGGREGATOR);
    graph.add_edge(STORY_GUARDRAIL, GUARDRAIL_AGGREGATOR);
    graph.add_edge(IMAGE_GUARDRAIL, GUARDRAIL_AGGREGATOR);
    graph.add_edge(VIDEO_GUARDRAIL, GUARDRAIL_AGGREGATOR);

    // Hard failures auto-reject when the policy says so; everything else
    // goes to human review.
    let aggregator_config = config.clone();
    graph.add_conditional_edge(
        GUARDRAIL_AGGREGATOR,
        Arc::new(move |state| {
            let passed = state[state::GUARDRAIL_PASSED].as_bool().unwrap_or(false);
            if !passed && aggregator_config.auto_reject_on_hard_fail {
                RouteOutcome::Next(MARK_AUTO_REJECTED.to_string())
            } else {
                RouteOutcome::Next(HUMAN_REVIEW_GATE.to_string())
            }
        }),
        vec![
            MARK_AUTO_REJECTED.to_string(),
            HUMAN_REVIEW_GATE.to_string(),
        ],
    );

    graph.add_conditional_edge(
        HUMAN_REVIEW_GATE,
        Arc::new(|state| {
            let decision = state[state::REVIEW_DECISION]["decision"]
                .as_str()
                .unwrap_or("rejected");
            if decision == "approved" {
                RouteOutcome::Next(PUBLISHER.to_string())
            } else {
                RouteOutcome::Next(MARK_REJECTED.to_string())
            }
        }),
        vec![PUBLISHER.to_string(), MARK_REJECTED.to_string()],
    );

    graph.add_edge(PUBLISHER, END);
    graph.add_edge(MARK_REJECTED, END);
    graph.add_edge(MARK_AUTO_REJECTED, END);

    graph
}
