/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Push-channel event fan-out.
pub mod push_events;
/// Background eviction of finished and abandoned rooms.
pub mod room_janitor;
/// Room control operations: create, join, start, submit, leave, connect.
pub mod room_service;
/// Round deadline and scoreboard dwell timers.
pub mod round_service;
/// Portfolio returns, points and leaderboard ordering.
pub mod scoring;
/// WebSocket connection and message handling service.
pub mod websocket_service;
