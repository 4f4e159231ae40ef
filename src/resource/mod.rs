// ABOUTME: Resource module - the exclusive units agents contend for.
// ABOUTME: Contains the resource lock and the agent/resource identifiers.

mod resource;

pub use resource::{AgentId, Resource, ResourceId};
