/// Arrow schema definitions for prediction reports.
pub mod report {
    use arrow::datatypes::{DataType, Field, Schema};

    /// Outcome of one file in a batch run.
    pub const STATUS_OK: &str = "ok";
    pub const STATUS_DECODE_ERROR: &str = "decode_error";
    pub const STATUS_READ_ERROR: &str = "read_error";

    /// One row per input image: the winning label and its probability, or
    /// the reason it could not be classified.
    pub fn prediction_schema() -> Schema {
        Schema::new(vec![
            Field::new("file", DataType::Utf8, false),
            Field::new("label", DataType::Utf8, true),
            Field::new("confidence", DataType::Float64, true),
            Field::new("status", DataType::Utf8, false),
            Field::new("error", DataType::Utf8, true),
        ])
    }
}
