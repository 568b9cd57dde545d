use flowtrack_tracker::JobService;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: the service holds its clients behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Job submission, lookup and tracking, plus the application registry.
    pub service: JobService,
}
