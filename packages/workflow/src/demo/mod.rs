// ABOUTME: Interactive demo generation: streamed page code and page-level operations
// ABOUTME: Event definitions, code clean-up and the pipeline driving the demo agent

pub mod code;
pub mod events;
pub mod mutations;
pub mod pipeline;

pub use code::strip_code_fences;
pub use events::{DemoEvent, DemoEventStream};
pub use mutations::DemoStatusSummary;
pub use pipeline::DemoPipeline;
