//! API endpoint handlers. Handlers only translate between HTTP and
//! `CoreState`; all validation and state live behind it.

pub mod documents;
pub mod health;
pub mod stages;
