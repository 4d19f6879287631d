pub mod framing;
pub mod pipeline;
