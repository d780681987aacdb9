//! Pipeline orchestration for invoicematch.
//!
//! Wires the document service, the two assistants, the prompt builder, and
//! the report writer into one linear run: OCR → extraction → matching →
//! workbook.

pub mod artifacts;
pub mod pipeline;
pub mod prompt;
