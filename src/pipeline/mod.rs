pub mod decode;
pub mod error;
pub mod extraction;
pub mod feedback; // Advisory weight hints from analyst outcomes
pub mod ingest;
pub mod normalize;
pub mod processor; // Document processing orchestrator
pub mod reasoning;
pub mod scoring;
pub mod strategy;
pub mod validation; // Boundary payload checks
