//! Stratus definition model and parser
//!
//! A definition file is KDL:
//!
//! ```kdl
//! project "demo"
//!
//! engine {
//!     poll-interval "5s"
//!     timeout "20m"
//! }
//!
//! backend "azure" {
//!     location "westeurope"
//! }
//!
//! resource "instance" "web" {
//!     backend "azure"
//!     size "small"
//! }
//! ```

pub mod error;
pub mod model;
pub mod parser;

pub use error::{DefinitionError, Result};
pub use model::{BackendSettings, Definition, EngineSettings, ResourceDecl};
pub use parser::{parse_definition_file, parse_definition_string};
