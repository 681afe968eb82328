//! Error types for document parsing and package handling.

/// Error while reading or writing a document package.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DomError {
    /// XML parsing error.
    #[error("XML parse error")]
    Xml(#[from] quick_xml::Error),

    /// XML attribute error.
    #[error("XML attribute error")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    /// Encoding error during XML parsing.
    #[error("encoding error")]
    Encoding(#[from] quick_xml::encoding::EncodingError),

    /// Well-formed XML that does not describe a usable tree.
    #[error("malformed document: {0}")]
    Malformed(String),

    /// Binary part content is not valid base64.
    #[error("invalid base64 content in part {part}")]
    Base64 {
        /// Part name.
        part: String,
        /// Decoder error.
        #[source]
        source: base64::DecodeError,
    },

    /// A required package part is absent.
    #[error("package has no {0} part")]
    MissingPart(String),

    /// I/O error while streaming a package.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}
