//! Core data models for ADS retrieval.

mod document;
mod harvest;
mod query;
mod request;

pub use document::Document;
pub use harvest::{Harvest, HarvestStats, PageResult, PageStatus, UnitFailure, WorkUnit};
pub use query::{BoolOp, Field, Query};
pub use request::{
    FieldList, PageRequest, SortKey, SortOrder, SortSpec, IDENTITY_FIELD, PAGE_CAP,
};
