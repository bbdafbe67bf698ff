/// Users and decks: the collaborator surface of the quiz flows.
pub mod catalog_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Two-player invitation lifecycle.
pub mod invitation_service;
/// Quiz lifecycle and answer processing.
pub mod quiz_service;
/// Running count of correct answers per player.
pub mod score_ledger;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Finalized per-player statistics and outcomes.
pub mod statistics_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
