//! Test case step markup decoding
//!
//! Step markup looks like:
//!
//! ```xml
//! <steps id="0" last="5">
//!   <step id="2" type="ActionStep">...</step>
//!   <compref id="3" ref="1234">
//!     <step id="5" type="ValidateStep">...</step>
//!   </compref>
//! </steps>
//! ```
//!
//! A `compref` only names the shared step it invokes; the steps nested inside
//! it are the steps that follow the invocation. Decoding is done in two
//! passes: [`decode_steps`] builds a flat list of unresolved [`StepNode`]s,
//! then [`resolve`] attaches fetched shared step bodies to produce [`Step`]s.

use super::xml::{parse_markup, MarkupError, XmlNode};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StepParseError {
    #[error(transparent)]
    Markup(#[from] MarkupError),

    #[error("<{element}> has no numeric id attribute")]
    MissingId { element: String },

    #[error("shared step reference {id} has no numeric ref attribute")]
    MissingRef { id: u32 },

    #[error("shared step {id}: {source}")]
    SharedStep {
        id: u32,
        #[source]
        source: Box<StepParseError>,
    },
}

/// Step as written in markup, before shared steps are fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepNode {
    Action { id: u32 },
    SharedStepRef { id: u32, shared_step_id: u32 },
}

impl StepNode {
    pub fn id(&self) -> u32 {
        match self {
            StepNode::Action { id } | StepNode::SharedStepRef { id, .. } => *id,
        }
    }
}

/// Fetched definition of a shared step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedStepBody {
    pub revision: i32,
    pub steps: Vec<StepNode>,
}

/// Step of a test case after shared step resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Action {
        id: u32,
    },
    /// `body` is `None` when the shared step could not be fetched
    SharedStep {
        id: u32,
        shared_step_id: u32,
        body: Option<SharedStepBody>,
    },
}

impl Step {
    pub fn id(&self) -> u32 {
        match self {
            Step::Action { id } | Step::SharedStep { id, .. } => *id,
        }
    }
}

/// Resolved steps keyed by test case id
pub type StepMap = HashMap<String, Vec<Step>>;

/// Decode step markup into its ordered steps.
///
/// Blank markup (a test case without steps) decodes to no steps.
pub fn decode_steps(markup: &str) -> Result<Vec<StepNode>, StepParseError> {
    if markup.trim().is_empty() {
        return Ok(Vec::new());
    }

    let root = parse_markup(markup)?;
    let mut steps = Vec::new();
    visit(&root, &mut steps)?;
    Ok(steps)
}

fn visit(node: &XmlNode, steps: &mut Vec<StepNode>) -> Result<(), StepParseError> {
    match node.name.as_str() {
        "step" => steps.push(StepNode::Action {
            id: numeric_id(node)?,
        }),
        "compref" => {
            let id = numeric_id(node)?;
            let shared_step_id = node
                .attribute("ref")
                .and_then(|r| r.trim().parse().ok())
                .ok_or(StepParseError::MissingRef { id })?;
            steps.push(StepNode::SharedStepRef { id, shared_step_id });
            for child in &node.children {
                visit(child, steps)?;
            }
        }
        _ => {
            for child in &node.children {
                visit(child, steps)?;
            }
        }
    }
    Ok(())
}

fn numeric_id(node: &XmlNode) -> Result<u32, StepParseError> {
    node.attribute("id")
        .and_then(|id| id.trim().parse().ok())
        .ok_or_else(|| StepParseError::MissingId {
            element: node.name.clone(),
        })
}

/// Decode the markup of a fetched shared step work item
pub fn decode_shared_step(
    id: u32,
    revision: i32,
    markup: &str,
) -> Result<SharedStepBody, StepParseError> {
    let steps = decode_steps(markup).map_err(|source| StepParseError::SharedStep {
        id,
        source: Box::new(source),
    })?;
    Ok(SharedStepBody { revision, steps })
}

/// Distinct shared step ids referenced anywhere in `forest`, ascending
pub fn referenced_shared_steps(forest: &HashMap<String, Vec<StepNode>>) -> Vec<u32> {
    forest
        .values()
        .flatten()
        .filter_map(|node| match node {
            StepNode::SharedStepRef { shared_step_id, .. } => Some(*shared_step_id),
            StepNode::Action { .. } => None,
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Attach shared step bodies to every reference that names them
pub fn resolve(
    forest: HashMap<String, Vec<StepNode>>,
    shared_steps: &HashMap<u32, SharedStepBody>,
) -> StepMap {
    forest
        .into_iter()
        .map(|(test_case_id, nodes)| {
            let steps = nodes
                .into_iter()
                .map(|node| match node {
                    StepNode::Action { id } => Step::Action { id },
                    StepNode::SharedStepRef { id, shared_step_id } => Step::SharedStep {
                        id,
                        shared_step_id,
                        body: shared_steps.get(&shared_step_id).cloned(),
                    },
                })
                .collect();
            (test_case_id, steps)
        })
        .collect()
}
