pub mod connectivity;
pub mod identifiers;
