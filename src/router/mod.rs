//! Request router
//!
//! Maps method and path onto the handful of routes the signer serves.

use crate::config::HEALTH_PATH;
use thiserror::Error;

/// Router errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RouterError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method {method} not allowed, expected {allowed}")]
    MethodNotAllowed {
        method: String,
        allowed: &'static str,
    },
}

/// Routes served by the signer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// GET /health
    Health,
    /// POST {sign_path}
    Sign,
}

/// Resolves requests against a configured sign path
#[derive(Debug, Clone)]
pub struct Router {
    sign_path: String,
}

impl Router {
    pub fn new(sign_path: &str) -> Self {
        Self {
            sign_path: normalize(sign_path).to_string(),
        }
    }

    /// Resolve a request to a route
    ///
    /// A trailing slash is ignored, so `/sign` and `/sign/` are the same path.
    pub fn resolve(&self, method: &str, path: &str) -> Result<Route, RouterError> {
        let route = self
            .route_for_path(path)
            .ok_or_else(|| RouterError::NotFound(normalize(path).to_string()))?;

        let allowed = Self::allowed_method(route);
        if method != allowed {
            return Err(RouterError::MethodNotAllowed {
                method: method.to_string(),
                allowed,
            });
        }

        Ok(route)
    }

    /// Method the given route accepts, for `Allow` headers
    pub fn allowed_method(route: Route) -> &'static str {
        match route {
            Route::Health => "GET",
            Route::Sign => "POST",
        }
    }

    /// Route a path belongs to regardless of method
    pub fn route_for_path(&self, path: &str) -> Option<Route> {
        let path = normalize(path);
        if path == self.sign_path {
            Some(Route::Sign)
        } else if path == HEALTH_PATH {
            Some(Route::Health)
        } else {
            None
        }
    }
}

fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}
