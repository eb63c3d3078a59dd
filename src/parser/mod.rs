pub mod steps;
pub mod xml;

pub use steps::{decode_steps, resolve, SharedStepBody, Step, StepMap, StepNode, StepParseError};
pub use xml::{parse_markup, XmlNode};
