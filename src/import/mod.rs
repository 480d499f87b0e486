//! Board card import pipeline.
//!
//! - [`parser`] recovers labeled fields, keywords and URLs from descriptions
//! - [`mapper`] turns a card into a stage-specific record
//! - [`mapping`] holds the list/label/roster tables the mapper is driven by
//! - [`lookups`] resolves slugs and emails to store ids
//! - [`sink`] persists records
//! - [`engine`] runs a whole board through the above

pub mod engine;
pub mod lookups;
pub mod mapper;
pub mod mapping;
pub mod parser;
pub mod results;
pub mod sink;

pub use engine::{ImportEngine, ImportError, ImportOptions, ImportPhase};
pub use lookups::{LookupError, LookupSource, LookupTables, PgLookupSource};
pub use mapper::{ContentMapper, MapError, MappedContent, StageDetail};
pub use mapping::{ImportMappings, ListRoute, MappingConfigError};
pub use parser::{DescriptionParser, ParsedDescription, parse_description};
pub use results::{CardImportResult, DRY_RUN_ENTITY_ID, ImportResult, SkipReason};
pub use sink::{ContentSink, NewContent, PgContentSink, SinkError};
