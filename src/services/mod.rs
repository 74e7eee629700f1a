/// Instructor control panel operations.
pub mod admin_service;
/// Buzzer hit recording and penalties.
pub mod berserk_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// OTP delivery seam.
pub mod mailer;
/// Read-only projections for teams and the projector.
pub mod public_service;
/// Question bank parsing and import.
pub mod question_bank;
/// Multiple-choice round delivery and scoring.
pub mod quiz_service;
/// OTP login and session resolution.
pub mod session_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervisor and state hydration.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;
