//! lithos-annotate - Clients for the two external text services
//!
//! The pipeline treats text extraction and linguistic annotation as
//! external collaborators reached over HTTP:
//! - the document-conversion service turns a source file into raw text plus
//!   a metadata map;
//! - the annotation service splits cleaned text into sentences and tokens
//!   and assigns NER labels.
//!
//! Wire formats are deserialized into the typed core models here, at the
//! boundary, so the rest of the pipeline never sees loosely-shaped maps.

pub mod annotation;
pub mod conversion;

pub use annotation::AnnotationClient;
pub use conversion::{document_metadata_from_map, ConversionClient, ConvertedDocument};
