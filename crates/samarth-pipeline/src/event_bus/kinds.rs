/// Standard topics (namespace-prefixed)
///
/// Topics follow the format: `<category>.<action>`. The names are a stable
/// contract between adjacent stages and the executor.
///
/// Categories:
/// - query: Question lifecycle
/// - data: Dataset loading
/// - analysis: Numeric analysis
/// - response: Final formatted answer
/// - pipeline: Failures raised by any stage

pub struct Topic;

impl Topic {
    // ========================================================================
    // Query lifecycle
    // ========================================================================
    pub const QUERY_RECEIVED: &'static str = "query.received";
    pub const QUERY_PARSED: &'static str = "query.parsed";

    // ========================================================================
    // Data + analysis
    // ========================================================================
    pub const DATA_LOADED: &'static str = "data.loaded";
    pub const ANALYSIS_COMPLETE: &'static str = "analysis.complete";

    // ========================================================================
    // Terminal
    // ========================================================================
    pub const RESPONSE_READY: &'static str = "response.ready";
    pub const PIPELINE_ERROR: &'static str = "pipeline.error";
}
