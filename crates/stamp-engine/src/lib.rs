//! Comment-directive templating engine for `WordprocessingML` documents.
//!
//! A template is an ordinary document. Data goes in through two channels:
//!
//! - `${expression}` placeholders in paragraph text are replaced by the
//!   resolved value, whatever runs the author's formatting split them into
//! - directives, written either as the text of a comment anchored on a range
//!   of the document (`repeatTableRow(people)`) or inline as `#{...}`, remove,
//!   repeat or rewrite the paragraphs, rows and tables they are attached to
//!
//! # Architecture
//!
//! - [`Stamper`] drives a pass: preprocess, discover comments, record
//!   directives, resolve placeholders, commit
//! - [`processor`] holds the two-phase [`Processor`](processor::Processor) /
//!   [`Recording`](processor::Recording) traits and the built-in directives
//! - [`resolver`] turns evaluated values into text or images
//! - repeated document parts are stamped as standalone sub-documents, one per
//!   item, piped between threads and spliced back
//!
//! # Example
//!
//! ```ignore
//! use serde_json::json;
//! use stamp_engine::Stamper;
//!
//! let template = std::fs::read("invoice.xml")?;
//! let output = Stamper::new().stamp(&template, &json!({"customer": "Homer"}))?;
//! std::fs::write("invoice-homer.xml", output)?;
//! ```

mod comment;
mod error;
mod inspect;
mod paragraph;
mod pipe;
mod placeholder;
mod policy;
mod preprocess;
pub mod processor;
pub mod resolver;
mod stamper;
mod subdoc;
#[cfg(test)]
mod testing;
mod walker;

pub use comment::Comment;
pub use error::{StampError, StampErrorKind};
pub use inspect::{CommentSummary, PlaceholderSummary, TemplateReport};
pub use placeholder::{Placeholder, PlaceholderForm, PlaceholderMatcher};
pub use policy::{ResolutionPolicy, UnhandledNodes};
pub use preprocess::{MergeSameStyleRuns, Preprocessor, RemoveProofErrors};
pub use resolver::{ImageRef, Replacement, ValueResolver};
pub use stamper::Stamper;
