//! Rate limiting middleware
//!
//! Fixed-window request budgets per (route, client). The window state map is
//! owned by the [`AdmissionController`]; read-check-increment for one entry
//! happens under a single lock so concurrent requests cannot both slip under
//! the limit.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{AppResult, RateLimitExceeded};
use crate::AppState;

// ============================================================================
// ROUTES & BUDGETS
// ============================================================================

/// Budgeted routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteId {
    Test,
    Predict,
    Backup,
}

impl RouteId {
    pub fn path(&self) -> &'static str {
        match self {
            RouteId::Test => "/test",
            RouteId::Predict => "/predict",
            RouteId::Backup => "/backup",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/test" => Some(RouteId::Test),
            "/predict" => Some(RouteId::Predict),
            "/backup" => Some(RouteId::Backup),
            _ => None,
        }
    }
}

/// Requests allowed per window for one route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitBudget {
    pub route: RouteId,
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitBudget {
    pub fn new(route: RouteId, max_requests: u32, window: Duration) -> Self {
        Self { route, max_requests, window }
    }
}

// ============================================================================
// CLOCK
// ============================================================================

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

// ============================================================================
// ADMISSION CONTROLLER
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct ClientWindow {
    count: u32,
    window_start: Instant,
}

#[derive(Default)]
struct WindowTable {
    entries: HashMap<(RouteId, String), ClientWindow>,
    last_sweep: Option<Instant>,
}

pub struct AdmissionController {
    budgets: HashMap<RouteId, RateLimitBudget>,
    windows: Mutex<WindowTable>,
    clock: Arc<dyn Clock>,
    max_tracked: usize,
    /// Shortest budget window; nothing can expire faster than this
    sweep_interval: Duration,
}

impl AdmissionController {
    pub fn new(budgets: impl IntoIterator<Item = RateLimitBudget>) -> Self {
        Self::with_clock(budgets, Arc::new(SystemClock))
    }

    pub fn with_clock(budgets: impl IntoIterator<Item = RateLimitBudget>, clock: Arc<dyn Clock>) -> Self {
        let budgets: HashMap<RouteId, RateLimitBudget> =
            budgets.into_iter().map(|b| (b.route, b)).collect();
        let sweep_interval = budgets.values().map(|b| b.window).min().unwrap_or_default();

        Self {
            budgets,
            windows: Mutex::new(WindowTable::default()),
            clock,
            max_tracked: 10_000,
            sweep_interval,
        }
    }

    /// Entries kept before expired windows are swept
    pub fn with_max_tracked(mut self, max: usize) -> Self {
        self.max_tracked = max.max(1);
        self
    }

    /// Admit or reject one request. Routes without a budget are always admitted.
    pub fn admit(&self, route: RouteId, client: &str) -> Result<(), RateLimitExceeded> {
        let Some(budget) = self.budgets.get(&route) else {
            return Ok(());
        };

        let now = self.clock.now();
        let mut table = self.windows.lock();

        let window = table
            .entries
            .entry((route, client.to_string()))
            .or_insert(ClientWindow { count: 0, window_start: now });

        if now.saturating_duration_since(window.window_start) >= budget.window {
            window.count = 0;
            window.window_start = now;
        }

        if window.count >= budget.max_requests {
            let elapsed = now.saturating_duration_since(window.window_start);
            return Err(RateLimitExceeded {
                route,
                limit: budget.max_requests,
                window: budget.window,
                retry_after: budget.window.saturating_sub(elapsed),
            });
        }

        window.count += 1;

        // Over capacity: sweep at most once per interval, so a table full of
        // live windows is not rescanned on every request
        let sweep_due = table
            .last_sweep
            .map_or(true, |last| now.saturating_duration_since(last) >= self.sweep_interval);
        if table.entries.len() > self.max_tracked && sweep_due {
            self.sweep_expired(&mut table, now);
        }

        Ok(())
    }

    /// Number of tracked (route, client) windows
    pub fn tracked(&self) -> usize {
        self.windows.lock().entries.len()
    }

    fn sweep_expired(&self, table: &mut WindowTable, now: Instant) {
        let before = table.entries.len();
        table.entries.retain(|(route, _), w| {
            self.budgets
                .get(route)
                .map(|b| now.saturating_duration_since(w.window_start) < b.window)
                .unwrap_or(false)
        });
        table.last_sweep = Some(now);
        tracing::debug!(evicted = before - table.entries.len(), "Swept expired rate limit windows");
    }
}

// ============================================================================
// MIDDLEWARE
// ============================================================================

/// Middleware: enforce the matched route's budget before the handler runs
pub async fn enforce_budget(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> AppResult<Response> {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .and_then(|p| RouteId::from_path(p.as_str()));

    let Some(route) = route else {
        return Ok(next.run(req).await);
    };

    let client = client_identity(&req, state.config.trust_forwarded_for);

    if let Err(rejection) = state.admission.admit(route, &client) {
        tracing::warn!(route = rejection.route.path(), client = %client, "{}", rejection);
        return Err(rejection.into());
    }

    Ok(next.run(req).await)
}

/// Client identity: peer IP, or the first `X-Forwarded-For` hop when trusted
fn client_identity(req: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty());

        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
