//! Chat: command dispatch, GitLab tools for the model, and the turn service.

pub mod dispatcher;
pub mod service;
pub mod tools;
