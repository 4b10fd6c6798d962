pub mod prevost_parser;

use crate::model::{ParserError, RawListing};

pub use prevost_parser::{DetailPage, PrevostParser};

pub trait Parser {
    fn parse(&self, html: &str) -> Result<Vec<RawListing>, ParserError>;
}
