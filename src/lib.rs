//! Data pipeline behind a global drug-use statistics dashboard.
//!
//! Raw tabular records (seizures, prevalence, prices, individual
//! trafficking seizures) are normalized once at the ingestion boundary,
//! filtered by a mutable [`filter::FilterState`], and folded into the
//! shapes the charts consume: geographic rollups, percentage bars, a
//! trafficking Sankey graph, year series and price bands. Rendering is
//! someone else's job; everything here is a pure transform over in-memory
//! data, and bad input degrades to sentinels and empty outputs rather
//! than errors.

pub mod aggregate;
pub mod filter;
pub mod flatten;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod sankey;
pub mod types;
pub mod util;

pub use filter::{FilterState, FilterStore, FilterUpdate};
pub use loader::{LoadError, LoadReport};
pub use pipeline::ChartData;
pub use types::{Dataset, Record};
