use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FindMatchesParams {
    #[schemars(
        description = "Reference track: numeric id, exact title, file path, or file name"
    )]
    pub track: String,
    #[schemars(description = "Maximum results per bucket (default from config, usually 40)")]
    pub max_results: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct HarmonicCodesParams {
    #[schemars(description = "Camelot code (e.g. '8A', '08B') or musical key (e.g. 'Am', 'F# major')")]
    pub code: String,
}
