use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

use super::schema::{gcal_mappings, steps};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = steps)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[allow(dead_code)] // Some fields used only for database operations
pub struct StepRow {
    pub observation_id: i64,
    pub location: String,
    pub step_type: String,
    pub step_json: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = steps)]
pub struct NewStepRow {
    pub observation_id: i64,
    pub location: String,
    pub step_type: String,
    pub step_json: Value,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = gcal_mappings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[allow(dead_code)] // Some fields used only for database operations
pub struct GcalMappingRow {
    pub mapping_id: i64,
    pub search_key: Value,
    pub lamp_type: String,
    pub baseline: String,
    pub ordinal: i32,
    pub gcal_config: Value,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = gcal_mappings)]
pub struct NewGcalMappingRow {
    pub search_key: Value,
    pub lamp_type: String,
    pub baseline: String,
    pub ordinal: i32,
    pub gcal_config: Value,
}
