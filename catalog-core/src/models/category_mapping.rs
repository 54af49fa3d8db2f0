use serde::{Deserialize, Serialize};

/// A DB-backed `type_id`/`type_name` mapping for one upstream source family,
/// loaded into the Classifier's 5-minute cache (§4.C).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryMapping {
    pub source_family: String,
    pub upstream_type_id: i32,
    pub upstream_type_name: String,
    pub internal_type_id: i16,
}

/// A sub-category attached to an internal parent type (§3, §4.C).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubCategory {
    pub id: i32,
    pub parent_type_id: i16,
    pub name: String,
}
