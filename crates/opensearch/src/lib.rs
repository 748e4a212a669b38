//! # Toolbelt OpenSearch client
//!
//! A small async client over the OpenSearch REST API, covering what the
//! OpenSearch toolset needs: index management, document CRUD, search and a
//! raw request passthrough.
//!
//! ```rust,no_run
//! use toolbelt_opensearch::{OpenSearchClient, OpenSearchResult};
//! use toolbelt_core::ProcessEnv;
//!
//! # async fn example() -> OpenSearchResult<()> {
//! let client = OpenSearchClient::from_env(&ProcessEnv)?;
//!
//! if !client.index_exists("articles").await? {
//!     client.create_index("articles", &serde_json::json!({})).await?;
//! }
//!
//! let response = client
//!     .search("articles", &toolbelt_opensearch::query::multi_match("rust"))
//!     .await?;
//! println!("{}", response);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod query;
pub mod transport;

pub use client::OpenSearchClient;
pub use config::ClientConfig;
pub use error::{OpenSearchError, OpenSearchResult};
pub use query::{SearchHit, SearchResults};
