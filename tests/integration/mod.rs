//! Integration tests for command routing and event orchestration

mod command_hub;
mod event_store;
mod support;
