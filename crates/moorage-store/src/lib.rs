//! Store side of moorage.
//!
//! - [`StoreExecutor`]: the async seam to a document store
//! - [`MemoryStore`]: an in-process executor evaluating native filters and
//!   `$match` / `$group` pipelines
//! - [`Adapter`]: runs stage-three queries (`find`, `count`, `sum`, `avg`,
//!   `min`, `max`, `create`) end to end
//! - [`plan`]: the same translation without executing anything
//!
//! ```rust,ignore
//! let adapter = Adapter::new(Arc::new(MemoryStore::new()), Arc::new(registry));
//! let query = StageThreeQuery::new(QueryMethod::Sum, "pet").with_numeric_attr("price");
//! let total = adapter.sum(&query).await?;
//! ```

pub mod adapter;
pub mod error;
pub mod executor;
pub mod memory;
pub mod plan;
pub mod query;

pub use adapter::{Adapter, QueryOutput};
pub use error::{AdapterError, AdapterResult, ExecutorError, ExecutorResult};
pub use executor::StoreExecutor;
pub use memory::MemoryStore;
pub use plan::{plan, NativeRequest};
pub use query::{Criteria, QueryMethod, StageThreeQuery};
